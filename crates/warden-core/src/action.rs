use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of actions the Core may ask the Gateway to perform.
///
/// Every variant maps to exactly one [`Domain`] and one [`Risk`] via
/// the exhaustive match tables below. Adding a variant without
/// extending both tables is a compile error, never a runtime
/// fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    // ── Email ──────────────────────────────────────────────────
    EmailRead,
    EmailDraft,
    EmailSend,

    // ── Calendar ───────────────────────────────────────────────
    CalendarRead,
    CalendarCreateEvent,
    CalendarSendInvite,

    // ── Finances ───────────────────────────────────────────────
    FinanceReadBalance,
    FinanceReadTransactions,
    FinanceTransfer,

    // ── Health ─────────────────────────────────────────────────
    HealthRead,
    HealthLogEntry,

    // ── Contacts ───────────────────────────────────────────────
    ContactsRead,
    ContactsUpdate,

    // ── Services ───────────────────────────────────────────────
    ServiceStatus,
    ServiceConnect,

    // ── Web ────────────────────────────────────────────────────
    WebFetch,
    WebSearch,

    // ── Reminders ──────────────────────────────────────────────
    ReminderRead,
    ReminderCreate,
    ReminderComplete,

    // ── Messaging ──────────────────────────────────────────────
    MessageRead,
    MessageDraft,
    MessageSend,

    // ── Clipboard ──────────────────────────────────────────────
    ClipboardRead,
    ClipboardWrite,

    // ── Location ───────────────────────────────────────────────
    LocationRead,

    // ── System ─────────────────────────────────────────────────
    SystemNotify,
    SystemOpenApp,
}

/// Coarse action category sharing one autonomy tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Email,
    Calendar,
    Finances,
    Health,
    Contacts,
    Services,
    Web,
    Reminders,
    Messaging,
    Clipboard,
    Location,
    System,
}

/// Blast-radius classification of an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Risk {
    Read,
    Write,
    Execute,
}

impl ActionType {
    /// Every recognized action, in declaration order.
    pub const ALL: &'static [ActionType] = &[
        ActionType::EmailRead,
        ActionType::EmailDraft,
        ActionType::EmailSend,
        ActionType::CalendarRead,
        ActionType::CalendarCreateEvent,
        ActionType::CalendarSendInvite,
        ActionType::FinanceReadBalance,
        ActionType::FinanceReadTransactions,
        ActionType::FinanceTransfer,
        ActionType::HealthRead,
        ActionType::HealthLogEntry,
        ActionType::ContactsRead,
        ActionType::ContactsUpdate,
        ActionType::ServiceStatus,
        ActionType::ServiceConnect,
        ActionType::WebFetch,
        ActionType::WebSearch,
        ActionType::ReminderRead,
        ActionType::ReminderCreate,
        ActionType::ReminderComplete,
        ActionType::MessageRead,
        ActionType::MessageDraft,
        ActionType::MessageSend,
        ActionType::ClipboardRead,
        ActionType::ClipboardWrite,
        ActionType::LocationRead,
        ActionType::SystemNotify,
        ActionType::SystemOpenApp,
    ];

    /// Execute actions that always require human approval regardless
    /// of tier — a permanent carve-out, even at alter-ego.
    pub const SENSITIVE_EXECUTE: &'static [ActionType] = &[
        ActionType::EmailSend,
        ActionType::MessageSend,
        ActionType::FinanceTransfer,
    ];

    /// The domain this action belongs to. Total over the enum.
    pub fn domain(&self) -> Domain {
        match self {
            Self::EmailRead | Self::EmailDraft | Self::EmailSend => Domain::Email,
            Self::CalendarRead | Self::CalendarCreateEvent | Self::CalendarSendInvite => {
                Domain::Calendar
            }
            Self::FinanceReadBalance | Self::FinanceReadTransactions | Self::FinanceTransfer => {
                Domain::Finances
            }
            Self::HealthRead | Self::HealthLogEntry => Domain::Health,
            Self::ContactsRead | Self::ContactsUpdate => Domain::Contacts,
            Self::ServiceStatus | Self::ServiceConnect => Domain::Services,
            Self::WebFetch | Self::WebSearch => Domain::Web,
            Self::ReminderRead | Self::ReminderCreate | Self::ReminderComplete => Domain::Reminders,
            Self::MessageRead | Self::MessageDraft | Self::MessageSend => Domain::Messaging,
            Self::ClipboardRead | Self::ClipboardWrite => Domain::Clipboard,
            Self::LocationRead => Domain::Location,
            Self::SystemNotify | Self::SystemOpenApp => Domain::System,
        }
    }

    /// The risk classification of this action. Total over the enum.
    pub fn risk(&self) -> Risk {
        match self {
            Self::EmailRead
            | Self::CalendarRead
            | Self::FinanceReadBalance
            | Self::FinanceReadTransactions
            | Self::HealthRead
            | Self::ContactsRead
            | Self::ServiceStatus
            | Self::WebFetch
            | Self::WebSearch
            | Self::ReminderRead
            | Self::MessageRead
            | Self::ClipboardRead
            | Self::LocationRead => Risk::Read,

            Self::EmailDraft
            | Self::CalendarCreateEvent
            | Self::HealthLogEntry
            | Self::ContactsUpdate
            | Self::ReminderCreate
            | Self::ReminderComplete
            | Self::MessageDraft
            | Self::ClipboardWrite
            | Self::SystemNotify => Risk::Write,

            Self::EmailSend
            | Self::CalendarSendInvite
            | Self::FinanceTransfer
            | Self::ServiceConnect
            | Self::MessageSend
            | Self::SystemOpenApp => Risk::Execute,
        }
    }

    /// Whether this action sits on the permanent always-approve
    /// carve-out list.
    pub fn is_sensitive_execute(&self) -> bool {
        Self::SENSITIVE_EXECUTE.contains(self)
    }

    /// Wire name, identical to the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailRead => "email_read",
            Self::EmailDraft => "email_draft",
            Self::EmailSend => "email_send",
            Self::CalendarRead => "calendar_read",
            Self::CalendarCreateEvent => "calendar_create_event",
            Self::CalendarSendInvite => "calendar_send_invite",
            Self::FinanceReadBalance => "finance_read_balance",
            Self::FinanceReadTransactions => "finance_read_transactions",
            Self::FinanceTransfer => "finance_transfer",
            Self::HealthRead => "health_read",
            Self::HealthLogEntry => "health_log_entry",
            Self::ContactsRead => "contacts_read",
            Self::ContactsUpdate => "contacts_update",
            Self::ServiceStatus => "service_status",
            Self::ServiceConnect => "service_connect",
            Self::WebFetch => "web_fetch",
            Self::WebSearch => "web_search",
            Self::ReminderRead => "reminder_read",
            Self::ReminderCreate => "reminder_create",
            Self::ReminderComplete => "reminder_complete",
            Self::MessageRead => "message_read",
            Self::MessageDraft => "message_draft",
            Self::MessageSend => "message_send",
            Self::ClipboardRead => "clipboard_read",
            Self::ClipboardWrite => "clipboard_write",
            Self::LocationRead => "location_read",
            Self::SystemNotify => "system_notify",
            Self::SystemOpenApp => "system_open_app",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = crate::WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionType::ALL
            .iter()
            .copied()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| crate::WardenError::Config(format!("unknown action type: {s}")))
    }
}

impl Domain {
    /// The fixed, closed list of domains — including any that have
    /// no action mappings yet. Resolved tier config covers all of
    /// these.
    pub const ALL: &'static [Domain] = &[
        Domain::Email,
        Domain::Calendar,
        Domain::Finances,
        Domain::Health,
        Domain::Contacts,
        Domain::Services,
        Domain::Web,
        Domain::Reminders,
        Domain::Messaging,
        Domain::Clipboard,
        Domain::Location,
        Domain::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Calendar => "calendar",
            Self::Finances => "finances",
            Self::Health => "health",
            Self::Contacts => "contacts",
            Self::Services => "services",
            Self::Web => "web",
            Self::Reminders => "reminders",
            Self::Messaging => "messaging",
            Self::Clipboard => "clipboard",
            Self::Location => "location",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = crate::WardenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .iter()
            .copied()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| crate::WardenError::Config(format!("unknown domain: {s}")))
    }
}

impl fmt::Display for Risk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Execute => "execute",
        })
    }
}
