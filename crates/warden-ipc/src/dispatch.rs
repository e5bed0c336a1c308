use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use warden_audit::{AuditDirection, AuditEntry, AuditTrail, payload_digest};
use warden_autonomy::DecisionEngine;
use warden_codec::{FrameCodec, SigningKey};
use warden_core::{
    ActionRequest, ActionResponse, ActionType, Decision, ResponseStatus, Result, WardenError,
};

/// The privileged side's hook for actually performing an effect.
/// Concrete service adapters live behind this seam.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, action: ActionType, payload: &Map<String, Value>) -> Result<Value>;
}

/// Gateway-side request loop: verify signature, consult the
/// decision engine, execute or refuse, audit both directions.
///
/// Signature verification happens before anything else — a request
/// that fails it never reaches the decision engine, let alone an
/// executor.
pub struct GatewayDispatcher {
    key: Arc<SigningKey>,
    decisions: Arc<DecisionEngine>,
    trail: Arc<AuditTrail>,
    executor: Arc<dyn ActionExecutor>,
}

impl GatewayDispatcher {
    pub fn new(
        key: Arc<SigningKey>,
        decisions: Arc<DecisionEngine>,
        trail: Arc<AuditTrail>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        Self {
            key,
            decisions,
            trail,
            executor,
        }
    }

    /// Serve one connection until the peer hangs up or misbehaves.
    /// Returns `Err` only for connection-fatal conditions (corrupt
    /// length, I/O failure); per-request problems are answered on
    /// the wire and the loop continues.
    pub async fn serve_connection(
        &self,
        transport: impl AsyncRead + AsyncWrite + Send + Unpin,
    ) -> Result<()> {
        let (read_half, write_half) = tokio::io::split(transport);
        let mut reader = FramedRead::new(read_half, FrameCodec);
        let mut writer = FramedWrite::new(write_half, FrameCodec);

        while let Some(frame) = reader.next().await {
            let frame = match frame {
                Ok(f) => f,
                Err(e @ WardenError::FrameTooLarge { .. }) => {
                    error!(error = %e, "corrupt frame length, dropping connection");
                    return Err(e);
                }
                Err(e) => {
                    error!(error = %e, "ipc read failed, dropping connection");
                    return Err(e);
                }
            };

            let request: ActionRequest = match serde_json::from_slice(&frame) {
                Ok(r) => r,
                Err(e) => {
                    // Skip this envelope only; the stream stays up.
                    warn!(error = %e, "skipping malformed request envelope");
                    continue;
                }
            };

            let response = self.handle(request).await;
            let body = serde_json::to_vec(&response)?;
            writer.send(body.as_slice()).await?;
        }

        debug!("gateway connection closed");
        Ok(())
    }

    /// Process one verified-or-rejected request into a response.
    pub async fn handle(&self, request: ActionRequest) -> ActionResponse {
        if !self.key.verify_request(&request) {
            warn!(request_id = %request.id, action = %request.action, "rejecting request with bad signature");
            self.trail.record(&AuditEntry::new(
                request.action,
                AuditDirection::Request,
                "rejected",
                payload_digest(&request.payload),
                request.signature.clone(),
                json!({"reason": "signature_mismatch"}),
            ));
            return ActionResponse::failure(
                request.id,
                ResponseStatus::Rejected,
                "signature verification failed",
            );
        }

        let decision = self.decisions.decide(request.action);
        let request_entry = AuditEntry::new(
            request.action,
            AuditDirection::Request,
            decision.to_string(),
            payload_digest(&request.payload),
            request.signature.clone(),
            json!({"source": request.source}),
        );
        let audit_ref = request_entry.id.to_string();
        self.trail.record(&request_entry);

        let response = match decision {
            Decision::Blocked => {
                info!(request_id = %request.id, action = %request.action, "action blocked by policy");
                ActionResponse::failure(request.id, ResponseStatus::Blocked, "action is blocked")
            }
            Decision::RequiresApproval => {
                debug!(request_id = %request.id, action = %request.action, "action requires human approval");
                ActionResponse {
                    request_id: request.id,
                    timestamp: chrono::Utc::now(),
                    status: ResponseStatus::RequiresApproval,
                    data: None,
                    error: None,
                    audit_ref: Some(audit_ref.clone()),
                }
            }
            Decision::AutoApprove => {
                match self.executor.execute(request.action, &request.payload).await {
                    Ok(data) => ActionResponse::ok(request.id, data, Some(audit_ref.clone())),
                    Err(e) => {
                        warn!(request_id = %request.id, action = %request.action, error = %e, "executor failed");
                        ActionResponse::failure(request.id, ResponseStatus::Error, e.to_string())
                    }
                }
            }
        };

        self.trail.record(&AuditEntry::new(
            request.action,
            AuditDirection::Response,
            response.status.as_str(),
            payload_digest(&request.payload),
            request.signature.clone(),
            json!({"audit_ref": audit_ref}),
        ));

        response
    }
}
