//! Inbound frame routing
//!
//! Turns frames received from the Central System into [`StationEvent`]s.
//! Responses are matched against the pending calls recorded by the
//! outbound channel; server-initiated calls the engine understands are
//! forwarded, the rest are answered here with a CallError.

use rust_ocpp::v1_6::messages::authorize::AuthorizeResponse;
use rust_ocpp::v1_6::messages::boot_notification::BootNotificationResponse;
use rust_ocpp::v1_6::messages::change_availability::ChangeAvailabilityRequest;
use rust_ocpp::v1_6::messages::remote_start_transaction::RemoteStartTransactionRequest;
use rust_ocpp::v1_6::messages::remote_stop_transaction::RemoteStopTransactionRequest;
use rust_ocpp::v1_6::messages::reset::ResetRequest;
use rust_ocpp::v1_6::messages::start_transaction::StartTransactionResponse;
use rust_ocpp::v1_6::types::{AvailabilityType, RegistrationStatus};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::outbound::{PendingCall, PendingCalls};
use crate::application::events::{ServerRequest, StationEvent};
use crate::domain::Availability;
use crate::support::ocpp_frame::OcppFrame;

pub struct InboundRouter {
    station_id: String,
    pending: PendingCalls,
    events: mpsc::UnboundedSender<StationEvent>,
}

impl InboundRouter {
    pub fn new(
        station_id: impl Into<String>,
        pending: PendingCalls,
        events: mpsc::UnboundedSender<StationEvent>,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            pending,
            events,
        }
    }

    /// Handle one text frame. Returns a frame to send straight back, if any.
    pub fn route(&self, text: &str) -> Option<String> {
        let frame = match OcppFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                error!(
                    station_id = self.station_id.as_str(),
                    error = %e,
                    "Dropping malformed frame"
                );
                return None;
            }
        };

        match frame {
            OcppFrame::Call {
                unique_id,
                action,
                payload,
            } => self.on_call(unique_id, &action, payload),
            OcppFrame::CallResult { unique_id, payload } => {
                self.on_result(&unique_id, payload);
                None
            }
            OcppFrame::CallError {
                unique_id,
                error_code,
                error_description,
                ..
            } => {
                let action = self
                    .pending
                    .remove(&unique_id)
                    .map(|(_, call)| call.action)
                    .unwrap_or("unknown");
                warn!(
                    station_id = self.station_id.as_str(),
                    action,
                    error_code = error_code.as_str(),
                    "Central System rejected call: {}",
                    error_description
                );
                None
            }
        }
    }

    fn on_call(&self, unique_id: String, action: &str, payload: Value) -> Option<String> {
        let request = match action {
            "ChangeAvailability" => decode::<ChangeAvailabilityRequest>(payload).map(|req| {
                ServerRequest::ChangeAvailability {
                    connector_id: req.connector_id,
                    availability: match req.kind {
                        AvailabilityType::Operative => Availability::Operative,
                        AvailabilityType::Inoperative => Availability::Inoperative,
                    },
                }
            }),
            "RemoteStartTransaction" => decode::<RemoteStartTransactionRequest>(payload).map(
                |req| ServerRequest::RemoteStartTransaction {
                    connector_id: req.connector_id,
                    id_tag: req.id_tag,
                },
            ),
            "RemoteStopTransaction" => decode::<RemoteStopTransactionRequest>(payload).map(|req| {
                ServerRequest::RemoteStopTransaction {
                    transaction_id: req.transaction_id,
                }
            }),
            "Reset" => decode::<ResetRequest>(payload).map(|_| ServerRequest::Reset),
            other => {
                warn!(
                    station_id = self.station_id.as_str(),
                    action = other,
                    "Unsupported action from Central System"
                );
                return Some(
                    OcppFrame::error(
                        unique_id,
                        "NotImplemented",
                        format!("Action {} is not supported", other),
                    )
                    .serialize(),
                );
            }
        };

        match request {
            Ok(request) => {
                self.emit(StationEvent::ServerCall { unique_id, request });
                None
            }
            Err(e) => {
                error!(
                    station_id = self.station_id.as_str(),
                    action,
                    error = %e,
                    "Invalid payload from Central System"
                );
                Some(OcppFrame::error(unique_id, "FormationViolation", e.to_string()).serialize())
            }
        }
    }

    fn on_result(&self, unique_id: &str, payload: Value) {
        let Some((_, call)) = self.pending.remove(unique_id) else {
            warn!(
                station_id = self.station_id.as_str(),
                unique_id, "Response for unknown call"
            );
            return;
        };

        match call {
            PendingCall {
                action: "BootNotification",
                ..
            } => match decode::<BootNotificationResponse>(payload) {
                Ok(conf) => match conf.status {
                    RegistrationStatus::Accepted => self.emit(StationEvent::BootAccepted {
                        interval: i64::from(conf.interval),
                    }),
                    status => warn!(
                        station_id = self.station_id.as_str(),
                        ?status,
                        "BootNotification not accepted"
                    ),
                },
                Err(e) => self.invalid_response("BootNotification", e),
            },
            PendingCall {
                action: "StartTransaction",
                connector_id: Some(connector_id),
            } => match decode::<StartTransactionResponse>(payload) {
                Ok(conf) => {
                    info!(
                        station_id = self.station_id.as_str(),
                        connector_id,
                        transaction_id = conf.transaction_id,
                        status = ?conf.id_tag_info.status,
                        "StartTransaction confirmed"
                    );
                    self.emit(StationEvent::TransactionAccepted {
                        connector_id,
                        transaction_id: conf.transaction_id,
                    });
                }
                Err(e) => self.invalid_response("StartTransaction", e),
            },
            PendingCall {
                action: "Authorize",
                ..
            } => match decode::<AuthorizeResponse>(payload) {
                Ok(conf) => info!(
                    station_id = self.station_id.as_str(),
                    status = ?conf.id_tag_info.status,
                    "Authorize confirmed"
                ),
                Err(e) => self.invalid_response("Authorize", e),
            },
            PendingCall { action, .. } => {
                debug!(station_id = self.station_id.as_str(), action, "Call confirmed")
            }
        }
    }

    fn invalid_response(&self, action: &str, e: serde_json::Error) {
        error!(
            station_id = self.station_id.as_str(),
            action,
            error = %e,
            "Failed to parse response"
        );
    }

    fn emit(&self, event: StationEvent) {
        if self.events.send(event).is_err() {
            warn!(
                station_id = self.station_id.as_str(),
                "Station event loop is gone"
            );
        }
    }
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, serde_json::Error> {
    serde_json::from_value(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn router() -> (InboundRouter, PendingCalls, mpsc::UnboundedReceiver<StationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = PendingCalls::default();
        (InboundRouter::new("CP001", pending.clone(), tx), pending, rx)
    }

    fn track(pending: &PendingCalls, id: &str, action: &'static str, connector_id: Option<u32>) {
        pending.insert(id.to_string(), PendingCall { action, connector_id });
    }

    #[test]
    fn accepted_boot_emits_interval() {
        let (router, pending, mut rx) = router();
        track(&pending, "m1", "BootNotification", None);

        let reply = router.route(
            r#"[3,"m1",{"status":"Accepted","currentTime":"2024-01-01T00:00:00Z","interval":60}]"#,
        );

        assert!(reply.is_none());
        assert_eq!(rx.try_recv().unwrap(), StationEvent::BootAccepted { interval: 60 });
        assert!(pending.is_empty());
    }

    #[test]
    fn rejected_boot_emits_nothing() {
        let (router, pending, mut rx) = router();
        track(&pending, "m1", "BootNotification", None);

        router.route(
            r#"[3,"m1",{"status":"Rejected","currentTime":"2024-01-01T00:00:00Z","interval":60}]"#,
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn start_transaction_conf_carries_connector() {
        let (router, pending, mut rx) = router();
        track(&pending, "m2", "StartTransaction", Some(2));

        router.route(r#"[3,"m2",{"idTagInfo":{"status":"Accepted"},"transactionId":4711}]"#);
        assert_eq!(
            rx.try_recv().unwrap(),
            StationEvent::TransactionAccepted {
                connector_id: 2,
                transaction_id: 4711
            }
        );
    }

    #[test]
    fn unknown_response_is_ignored() {
        let (router, _, mut rx) = router();
        assert!(router.route(r#"[3,"nope",{}]"#).is_none());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn call_error_clears_pending() {
        let (router, pending, _) = router();
        track(&pending, "m3", "Heartbeat", None);
        router.route(r#"[4,"m3","InternalError","boom",{}]"#);
        assert!(pending.is_empty());
    }

    #[test]
    fn change_availability_becomes_server_call() {
        let (router, _, mut rx) = router();
        router.route(r#"[2,"cs-1","ChangeAvailability",{"connectorId":0,"type":"Inoperative"}]"#);

        assert_eq!(
            rx.try_recv().unwrap(),
            StationEvent::ServerCall {
                unique_id: "cs-1".to_string(),
                request: ServerRequest::ChangeAvailability {
                    connector_id: 0,
                    availability: Availability::Inoperative
                }
            }
        );
    }

    #[test]
    fn remote_start_without_connector() {
        let (router, _, mut rx) = router();
        router.route(r#"[2,"cs-2","RemoteStartTransaction",{"idTag":"TAG-9"}]"#);

        assert_eq!(
            rx.try_recv().unwrap(),
            StationEvent::ServerCall {
                unique_id: "cs-2".to_string(),
                request: ServerRequest::RemoteStartTransaction {
                    connector_id: None,
                    id_tag: "TAG-9".to_string()
                }
            }
        );
    }

    #[test]
    fn unsupported_action_is_answered_here() {
        let (router, _, mut rx) = router();
        let reply = router
            .route(r#"[2,"cs-3","UnlockConnector",{"connectorId":1}]"#)
            .expect("CallError reply");

        match OcppFrame::parse(&reply).unwrap() {
            OcppFrame::CallError {
                unique_id,
                error_code,
                ..
            } => {
                assert_eq!(unique_id, "cs-3");
                assert_eq!(error_code, "NotImplemented");
            }
            other => panic!("Expected CallError, got {:?}", other),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn malformed_payload_is_a_formation_violation() {
        let (router, _, _) = router();
        let reply = router
            .route(&json!([2, "cs-4", "RemoteStopTransaction", {"transactionId": "x"}]).to_string())
            .expect("CallError reply");
        assert!(reply.contains("FormationViolation"));
    }

    #[test]
    fn garbage_is_dropped() {
        let (router, _, _) = router();
        assert!(router.route("not json").is_none());
    }
}
