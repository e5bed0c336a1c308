use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, warn};
use uuid::Uuid;

use warden_codec::{FrameCodec, SigningKey};
use warden_core::{
    ActionRequest, ActionResponse, ActionType, REQUEST_SOURCE, Result, WardenError,
};

use crate::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::pending::PendingTable;

type BoxedWriter = FramedWrite<WriteHalf<Box<dyn Transport>>, FrameCodec>;

/// Marker for the byte streams the client runs over: TCP, a Unix
/// socket, or an in-process duplex in tests. Reconnect policy lives
/// with whoever owns the stream.
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}
impl<T: AsyncRead + AsyncWrite + Send + Unpin + 'static> Transport for T {}

/// The Core-side IPC client.
///
/// Many `send_action` calls may be outstanding at once over the one
/// connection; responses correlate by request id, not arrival order.
/// Exactly one of {matched response, timeout, connection failure}
/// settles each request.
pub struct IpcClient {
    key: Arc<SigningKey>,
    writer: Arc<Mutex<BoxedWriter>>,
    pending: Arc<PendingTable>,
    connected: Arc<AtomicBool>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
    timeout: Duration,
}

impl IpcClient {
    /// Establish the channel over an already-connected byte stream.
    /// The signing key must be loaded by the caller; failure to do
    /// so fails connection setup, not individual sends.
    pub fn connect(transport: impl Transport, key: SigningKey) -> Self {
        let boxed: Box<dyn Transport> = Box::new(transport);
        let (read_half, write_half) = tokio::io::split(boxed);

        let pending = Arc::new(PendingTable::new());
        let connected = Arc::new(AtomicBool::new(true));

        let reader = tokio::spawn(read_loop(
            FramedRead::new(read_half, FrameCodec),
            Arc::clone(&pending),
            Arc::clone(&connected),
        ));

        Self {
            key: Arc::new(key),
            writer: Arc::new(Mutex::new(FramedWrite::new(write_half, FrameCodec))),
            pending,
            connected,
            reader_task: Mutex::new(Some(reader)),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    /// Like [`IpcClient::connect`], but loads the signing key from a
    /// hex file (or the `WARDEN_SIGNING_KEY` env var when no path is
    /// given). A missing or malformed key fails connection setup
    /// here, before anything is sent.
    pub fn connect_with_key_file(
        transport: impl Transport,
        key_path: Option<&std::path::Path>,
    ) -> Result<Self> {
        let key = SigningKey::load_or_env(key_path)?;
        Ok(Self::connect(transport, key))
    }

    /// Override the per-request timeout (default 30 s).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build, sign, and send a request, then wait for its response.
    pub async fn send_action(
        &self,
        action: ActionType,
        payload: Map<String, Value>,
    ) -> Result<ActionResponse> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(WardenError::NotConnected);
        }

        let id = Uuid::new_v4();
        let timestamp = Utc::now();
        let signature = self.key.sign(&id, &timestamp, action, &payload);
        let request = ActionRequest {
            id,
            timestamp,
            action,
            payload,
            source: REQUEST_SOURCE.into(),
            signature,
        };
        let body = serde_json::to_vec(&request)?;

        // Register before writing so a fast response can never race
        // past an unregistered id.
        let mut rx = self.pending.register(id);

        if let Err(e) = self.writer.lock().await.send(body.as_slice()).await {
            self.pending
                .settle(id, Err(WardenError::ConnectionLost(e.to_string())));
        }

        let sleep = tokio::time::sleep(self.timeout);
        tokio::pin!(sleep);
        tokio::select! {
            settled = &mut rx => match settled {
                Ok(outcome) => outcome,
                Err(_) => Err(WardenError::NotConnected),
            },
            _ = &mut sleep => {
                // Either we settle the entry with a timeout, or a
                // response won the race and its outcome is already
                // in the channel. Both paths read from rx.
                let _ = self.pending.settle(
                    id,
                    Err(WardenError::Timeout {
                        action: action.to_string(),
                        secs: self.timeout.as_secs(),
                    }),
                );
                match rx.await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(WardenError::NotConnected),
                }
            }
        }
    }

    /// Number of requests currently awaiting settlement.
    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Tear down the channel and reject anything still pending.
    /// Idempotent: further calls are no-ops.
    pub async fn disconnect(&self) {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self.reader_task.lock().await.take() {
            task.abort();
        }
        self.pending
            .reject_all(|| WardenError::ConnectionLost("client disconnected".into()));
    }
}

/// Background read loop: routes responses to their pending entries,
/// skips malformed envelopes, and on any terminal failure rejects
/// everything pending so callers never hang.
async fn read_loop(
    mut reader: FramedRead<ReadHalf<Box<dyn Transport>>, FrameCodec>,
    pending: Arc<PendingTable>,
    connected: Arc<AtomicBool>,
) {
    loop {
        match reader.next().await {
            Some(Ok(frame)) => {
                let response: ActionResponse = match serde_json::from_slice(&frame) {
                    Ok(r) => r,
                    Err(e) => {
                        // One bad envelope does not kill the stream.
                        warn!(error = %e, "skipping malformed response envelope");
                        continue;
                    }
                };
                let request_id = response.request_id;
                if !pending.settle(request_id, Ok(response)) {
                    // Unmatched, late, or duplicate: dropped, never errored.
                    debug!(%request_id, "dropping unmatched response");
                }
            }
            Some(Err(WardenError::FrameTooLarge { declared, max })) => {
                error!(declared, max, "peer declared an oversized frame, dropping connection");
                break;
            }
            Some(Err(e)) => {
                error!(error = %e, "ipc read failed, dropping connection");
                break;
            }
            None => {
                debug!("ipc stream closed by peer");
                break;
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
    pending.reject_all(|| WardenError::ConnectionLost("connection closed".into()));
}
