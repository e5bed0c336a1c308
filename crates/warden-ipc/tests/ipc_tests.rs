#[cfg(test)]
mod tests {
    use futures::{SinkExt, StreamExt};
    use serde_json::{Map, Value, json};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::codec::{FramedRead, FramedWrite};

    use async_trait::async_trait;
    use warden_autonomy::DecisionEngine;
    use warden_audit::AuditTrail;
    use warden_codec::{FrameCodec, SigningKey};
    use warden_core::{
        ActionRequest, ActionResponse, ActionType, AutonomyTier, EventBus, ResponseStatus,
        WardenError,
    };
    use warden_ipc::{ActionExecutor, GatewayDispatcher, IpcClient};
    use warden_store::Store;

    const TEST_KEY: [u8; 32] = [42u8; 32];

    fn key() -> SigningKey {
        SigningKey::from_bytes(&TEST_KEY).unwrap()
    }

    fn payload(i: usize) -> Map<String, Value> {
        match json!({"i": i}) {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    // ── Client correlation & settlement ────────────────────────

    mod client {
        use super::*;

        /// A hand-rolled gateway double: collects all requests
        /// first, then answers them in reverse arrival order.
        async fn scrambling_server(stream: tokio::io::DuplexStream, expected: usize) {
            let (r, w) = tokio::io::split(stream);
            let mut reader = FramedRead::new(r, FrameCodec);
            let mut writer = FramedWrite::new(w, FrameCodec);

            let mut requests = Vec::new();
            while requests.len() < expected {
                let frame = reader.next().await.unwrap().unwrap();
                let req: ActionRequest = serde_json::from_slice(&frame).unwrap();
                requests.push(req);
            }
            for req in requests.into_iter().rev() {
                let resp = ActionResponse::ok(req.id, json!({"echo": req.payload}), None);
                let body = serde_json::to_vec(&resp).unwrap();
                writer.send(body.as_slice()).await.unwrap();
            }
        }

        #[tokio::test]
        async fn concurrent_requests_correlate_by_id_not_order() {
            let (client_io, server_io) = tokio::io::duplex(64 * 1024);
            let server = tokio::spawn(scrambling_server(server_io, 8));
            let client = Arc::new(IpcClient::connect(client_io, key()));

            let mut handles = Vec::new();
            for i in 0..8 {
                let c = Arc::clone(&client);
                handles.push(tokio::spawn(async move {
                    let resp = c.send_action(ActionType::WebFetch, payload(i)).await.unwrap();
                    (i, resp)
                }));
            }

            for handle in handles {
                let (i, resp) = handle.await.unwrap();
                assert_eq!(resp.status, ResponseStatus::Ok);
                // Each caller got the response to *its* request.
                assert_eq!(resp.data.unwrap()["echo"]["i"], i);
            }
            assert_eq!(client.pending_requests(), 0);
            server.await.unwrap();
        }

        #[tokio::test]
        async fn unanswered_request_times_out_and_cleans_up() {
            let (client_io, server_io) = tokio::io::duplex(64 * 1024);
            let (r, w) = tokio::io::split(server_io);
            let mut reader = FramedRead::new(r, FrameCodec);
            let mut writer = FramedWrite::new(w, FrameCodec);

            let client = Arc::new(
                IpcClient::connect(client_io, key()).with_timeout(Duration::from_millis(100)),
            );

            let c = Arc::clone(&client);
            let inflight =
                tokio::spawn(async move { c.send_action(ActionType::EmailRead, Map::new()).await });

            // Read the request but do not answer until after the
            // client has given up.
            let frame = reader.next().await.unwrap().unwrap();
            let req: ActionRequest = serde_json::from_slice(&frame).unwrap();

            let err = inflight.await.unwrap().unwrap_err();
            assert!(matches!(err, WardenError::Timeout { secs: _, ref action } if action.as_str() == "email_read"));
            assert_eq!(client.pending_requests(), 0);

            // Now answer anyway: the late response must be a silent
            // no-op, never a crash.
            let resp = ActionResponse::ok(req.id, Value::Null, None);
            let body = serde_json::to_vec(&resp).unwrap();
            writer.send(body.as_slice()).await.unwrap();

            tokio::time::sleep(Duration::from_millis(50)).await;
            assert!(client.is_connected());
            assert_eq!(client.pending_requests(), 0);
        }

        #[tokio::test]
        async fn connection_loss_rejects_all_pending() {
            let (client_io, server_io) = tokio::io::duplex(64 * 1024);
            let client = Arc::new(IpcClient::connect(client_io, key()));

            let c = Arc::clone(&client);
            let inflight = tokio::spawn(async move {
                c.send_action(ActionType::CalendarRead, Map::new()).await
            });

            // Give the request time to land in the pending table,
            // then hang up without answering.
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(server_io);

            let err = inflight.await.unwrap().unwrap_err();
            assert!(matches!(err, WardenError::ConnectionLost(_)));
            assert_eq!(client.pending_requests(), 0);
            assert!(!client.is_connected());

            // The client refuses further sends instead of hanging.
            let err = client
                .send_action(ActionType::CalendarRead, Map::new())
                .await
                .unwrap_err();
            assert!(matches!(err, WardenError::NotConnected));
        }

        #[tokio::test]
        async fn disconnect_is_idempotent() {
            let (client_io, _server_io) = tokio::io::duplex(4096);
            let client = IpcClient::connect(client_io, key());
            client.disconnect().await;
            client.disconnect().await;
            assert!(!client.is_connected());
            let err = client
                .send_action(ActionType::WebFetch, Map::new())
                .await
                .unwrap_err();
            assert!(matches!(err, WardenError::NotConnected));
        }
    }

    // ── Gateway dispatcher ─────────────────────────────────────

    mod dispatcher {
        use super::*;

        struct EchoExecutor;

        #[async_trait]
        impl ActionExecutor for EchoExecutor {
            async fn execute(
                &self,
                action: ActionType,
                payload: &Map<String, Value>,
            ) -> warden_core::Result<Value> {
                Ok(json!({"action": action.as_str(), "echo": payload}))
            }
        }

        fn dispatcher(default_tier: AutonomyTier) -> (GatewayDispatcher, Arc<Store>) {
            let store = Arc::new(Store::open_in_memory().unwrap());
            let decisions = Arc::new(
                DecisionEngine::new(Arc::clone(&store), default_tier, EventBus::default())
                    .unwrap(),
            );
            let trail = Arc::new(AuditTrail::new(Arc::clone(&store)));
            (
                GatewayDispatcher::new(
                    Arc::new(key()),
                    decisions,
                    trail,
                    Arc::new(EchoExecutor),
                ),
                store,
            )
        }

        fn signed_request(action: ActionType, payload: Map<String, Value>) -> ActionRequest {
            let id = uuid::Uuid::new_v4();
            let timestamp = chrono::Utc::now();
            let signature = key().sign(&id, &timestamp, action, &payload);
            ActionRequest {
                id,
                timestamp,
                action,
                payload,
                source: "core".into(),
                signature,
            }
        }

        #[tokio::test]
        async fn tampered_signature_is_rejected_before_execution() {
            let (dispatcher, store) = dispatcher(AutonomyTier::Partner);
            let mut req = signed_request(ActionType::WebFetch, payload(1));
            let mut sig = req.signature.clone().into_bytes();
            sig[0] = if sig[0] == b'0' { b'1' } else { b'0' };
            req.signature = String::from_utf8(sig).unwrap();

            let resp = dispatcher.handle(req).await;
            assert_eq!(resp.status, ResponseStatus::Rejected);
            // The rejection itself is audited.
            assert_eq!(store.audit_count().unwrap(), 1);
        }

        #[tokio::test]
        async fn decision_matrix_is_enforced_on_the_wire() {
            let (dispatcher, _) = dispatcher(AutonomyTier::Partner);

            // Partner: reads auto-approve and execute.
            let resp = dispatcher
                .handle(signed_request(ActionType::WebFetch, payload(1)))
                .await;
            assert_eq!(resp.status, ResponseStatus::Ok);
            assert_eq!(resp.data.unwrap()["echo"]["i"], 1);
            assert!(resp.audit_ref.is_some());

            // Partner: execute risk asks first.
            let resp = dispatcher
                .handle(signed_request(ActionType::EmailSend, payload(2)))
                .await;
            assert_eq!(resp.status, ResponseStatus::RequiresApproval);
        }

        #[tokio::test]
        async fn malformed_envelope_skipped_stream_survives() {
            let (dispatcher, _) = dispatcher(AutonomyTier::Partner);
            let (client_io, server_io) = tokio::io::duplex(64 * 1024);
            let serve = tokio::spawn(async move { dispatcher.serve_connection(server_io).await });

            let (r, w) = tokio::io::split(client_io);
            let mut reader = FramedRead::new(r, FrameCodec);
            let mut writer = FramedWrite::new(w, FrameCodec);

            // A frame that is not JSON, then a valid request.
            writer.send(b"this is not json".as_slice()).await.unwrap();
            let req = signed_request(ActionType::WebSearch, payload(7));
            let body = serde_json::to_vec(&req).unwrap();
            writer.send(body.as_slice()).await.unwrap();

            // Exactly one response comes back — for the valid request.
            let frame = reader.next().await.unwrap().unwrap();
            let resp: ActionResponse = serde_json::from_slice(&frame).unwrap();
            assert_eq!(resp.request_id, req.id);
            assert_eq!(resp.status, ResponseStatus::Ok);

            drop(reader);
            drop(writer);
            serve.await.unwrap().unwrap();
        }

        #[tokio::test]
        async fn oversized_declared_length_drops_the_connection() {
            let (dispatcher, _) = dispatcher(AutonomyTier::Partner);
            let (mut client_io, server_io) = tokio::io::duplex(4096);
            let serve = tokio::spawn(async move { dispatcher.serve_connection(server_io).await });

            use tokio::io::AsyncWriteExt;
            client_io.write_all(&10_000_001u32.to_be_bytes()).await.unwrap();
            client_io.write_all(b"junk").await.unwrap();

            let result = serve.await.unwrap();
            assert!(matches!(result, Err(WardenError::FrameTooLarge { .. })));
        }

        #[tokio::test]
        async fn client_and_dispatcher_end_to_end() {
            let (dispatcher, store) = dispatcher(AutonomyTier::Guardian);
            let (client_io, server_io) = tokio::io::duplex(64 * 1024);
            let _serve = tokio::spawn(async move { dispatcher.serve_connection(server_io).await });

            let client = IpcClient::connect(client_io, key());

            // Guardian gates everything.
            let resp = client
                .send_action(ActionType::WebFetch, payload(3))
                .await
                .unwrap();
            assert_eq!(resp.status, ResponseStatus::RequiresApproval);
            assert_eq!(client.pending_requests(), 0);

            // Both directions were audited.
            assert_eq!(store.audit_count().unwrap(), 2);

            client.disconnect().await;
        }
    }
}
