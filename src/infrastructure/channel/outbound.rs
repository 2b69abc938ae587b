//! OCPP-J implementation of the outbound message port

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use rust_ocpp::v1_6::messages::authorize::AuthorizeRequest;
use rust_ocpp::v1_6::messages::boot_notification::BootNotificationRequest;
use rust_ocpp::v1_6::messages::heart_beat::HeartbeatRequest;
use rust_ocpp::v1_6::messages::start_transaction::StartTransactionRequest;
use rust_ocpp::v1_6::messages::status_notification::StatusNotificationRequest;
use rust_ocpp::v1_6::messages::stop_transaction::StopTransactionRequest;
use rust_ocpp::v1_6::types::{ChargePointErrorCode, ChargePointStatus};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::ports::MessageChannel;
use crate::domain::{BootPayload, ConnectorStatus, TelemetrySnapshot, Transaction};
use crate::support::ocpp_frame::OcppFrame;

/// A station call waiting for its CallResult/CallError
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall {
    pub action: &'static str,
    pub connector_id: Option<u32>,
}

/// Calls in flight, keyed by message id. Shared with the inbound router.
pub type PendingCalls = Arc<DashMap<String, PendingCall>>;

/// Serialises station calls into OCPP-J frames and queues them for the
/// live connection.
pub struct OcppMessageChannel {
    station_id: String,
    outbox: mpsc::UnboundedSender<String>,
    pending: PendingCalls,
}

impl OcppMessageChannel {
    pub fn new(
        station_id: impl Into<String>,
        outbox: mpsc::UnboundedSender<String>,
        pending: PendingCalls,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            outbox,
            pending,
        }
    }

    fn call<T: Serialize>(&self, action: &'static str, connector_id: Option<u32>, request: &T) {
        let payload = match serde_json::to_value(request) {
            Ok(payload) => payload,
            Err(e) => {
                error!(
                    station_id = self.station_id.as_str(),
                    action,
                    error = %e,
                    "Failed to serialize request"
                );
                return;
            }
        };

        let unique_id = Uuid::new_v4().to_string();
        self.pending.insert(
            unique_id.clone(),
            PendingCall {
                action,
                connector_id,
            },
        );
        self.push(OcppFrame::call(unique_id, action, payload));
    }

    fn push(&self, frame: OcppFrame) {
        let text = frame.serialize();
        debug!(station_id = self.station_id.as_str(), "-> {}", text);
        if self.outbox.send(text).is_err() {
            warn!(
                station_id = self.station_id.as_str(),
                unique_id = frame.unique_id(),
                "Outbox closed, frame dropped"
            );
            self.pending.remove(frame.unique_id());
        }
    }
}

fn to_ocpp_status(status: ConnectorStatus) -> ChargePointStatus {
    match status {
        ConnectorStatus::Available => ChargePointStatus::Available,
        ConnectorStatus::Preparing => ChargePointStatus::Preparing,
        ConnectorStatus::Charging => ChargePointStatus::Charging,
        ConnectorStatus::SuspendedEVSE => ChargePointStatus::SuspendedEVSE,
        ConnectorStatus::SuspendedEV => ChargePointStatus::SuspendedEV,
        ConnectorStatus::Finishing => ChargePointStatus::Finishing,
        ConnectorStatus::Reserved => ChargePointStatus::Reserved,
        ConnectorStatus::Unavailable => ChargePointStatus::Unavailable,
        ConnectorStatus::Faulted => ChargePointStatus::Faulted,
    }
}

/// OCPP 1.6 carries meter readings as `i32`; larger readings are clamped.
fn meter_reading(wh: u64) -> i32 {
    i32::try_from(wh).unwrap_or(i32::MAX)
}

impl MessageChannel for OcppMessageChannel {
    fn send_boot_notification(&self, payload: &BootPayload) {
        let request = BootNotificationRequest {
            charge_box_serial_number: payload.charge_box_serial_number.clone(),
            charge_point_model: payload.model.clone(),
            charge_point_serial_number: payload.serial_number.clone(),
            charge_point_vendor: payload.vendor.clone(),
            firmware_version: payload.firmware_version.clone(),
            iccid: payload.iccid.clone(),
            imsi: payload.imsi.clone(),
            meter_serial_number: payload.meter_serial_number.clone(),
            meter_type: payload.meter_type.clone(),
        };
        self.call("BootNotification", None, &request);
    }

    fn authorize(&self, id_tag: &str) {
        let request = AuthorizeRequest {
            id_tag: id_tag.to_string(),
        };
        self.call("Authorize", None, &request);
    }

    fn start_transaction(&self, transaction: &Transaction, connector_id: u32) {
        let request = StartTransactionRequest {
            connector_id,
            id_tag: transaction.tag_id.clone(),
            meter_start: meter_reading(transaction.meter_start),
            reservation_id: None,
            timestamp: transaction.start_time,
        };
        self.call("StartTransaction", Some(connector_id), &request);
    }

    fn stop_transaction(&self, transaction: &Transaction, connector_id: u32) {
        let request = StopTransactionRequest {
            id_tag: Some(transaction.tag_id.clone()),
            meter_stop: meter_reading(transaction.meter_stop.unwrap_or(transaction.meter_start)),
            timestamp: transaction.stop_time.unwrap_or_else(Utc::now),
            transaction_id: transaction.id,
            reason: None,
            transaction_data: None,
        };
        self.call("StopTransaction", Some(connector_id), &request);
    }

    fn send_heartbeat(&self) {
        self.call("Heartbeat", None, &HeartbeatRequest {});
    }

    fn send_status_notification(&self, connector_id: u32, status: ConnectorStatus) {
        let request = StatusNotificationRequest {
            connector_id,
            error_code: ChargePointErrorCode::NoError,
            info: None,
            status: to_ocpp_status(status),
            timestamp: Some(Utc::now()),
            vendor_id: None,
            vendor_error_code: None,
        };
        self.call("StatusNotification", Some(connector_id), &request);
    }

    fn send_meter_value(
        &self,
        transaction_id: Option<i32>,
        connector_id: u32,
        telemetry: &TelemetrySnapshot,
    ) {
        let mut request = json!({
            "connectorId": connector_id,
            "meterValue": [telemetry],
        });
        if let (Some(id), Some(fields)) = (transaction_id, request.as_object_mut()) {
            fields.insert("transactionId".to_string(), json!(id));
        }
        self.call("MeterValues", Some(connector_id), &request);
    }

    fn reply(&self, unique_id: &str, payload: Value) {
        self.push(OcppFrame::result(unique_id, payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{telemetry, MeterValueFormat};

    fn channel() -> (OcppMessageChannel, mpsc::UnboundedReceiver<String>, PendingCalls) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = PendingCalls::default();
        (OcppMessageChannel::new("CP001", tx, pending.clone()), rx, pending)
    }

    fn next_call(rx: &mut mpsc::UnboundedReceiver<String>) -> (String, String, Value) {
        let text = rx.try_recv().expect("frame queued");
        match OcppFrame::parse(&text).expect("valid frame") {
            OcppFrame::Call {
                unique_id,
                action,
                payload,
            } => (unique_id, action, payload),
            other => panic!("expected Call, got {:?}", other),
        }
    }

    #[test]
    fn boot_notification_is_tracked_as_pending() {
        let (channel, mut rx, pending) = channel();
        channel.send_boot_notification(
            &BootPayload::new("Acme", "Wallbox").with_firmware_version("1.2.0"),
        );

        let (unique_id, action, payload) = next_call(&mut rx);
        assert_eq!(action, "BootNotification");
        assert_eq!(payload["chargePointVendor"], "Acme");
        assert_eq!(payload["chargePointModel"], "Wallbox");
        assert_eq!(payload["firmwareVersion"], "1.2.0");
        assert_eq!(
            pending.get(&unique_id).map(|p| p.action),
            Some("BootNotification")
        );
    }

    #[test]
    fn start_transaction_sends_zero_meter_start() {
        let (channel, mut rx, pending) = channel();
        let transaction = Transaction::new(2, "TAG-1");
        channel.start_transaction(&transaction, 2);

        let (unique_id, action, payload) = next_call(&mut rx);
        assert_eq!(action, "StartTransaction");
        assert_eq!(payload["connectorId"], 2);
        assert_eq!(payload["idTag"], "TAG-1");
        assert_eq!(payload["meterStart"], 0);
        assert_eq!(pending.get(&unique_id).and_then(|p| p.connector_id), Some(2));
    }

    #[test]
    fn stop_transaction_carries_meter_stop() {
        let (channel, mut rx, _) = channel();
        let mut transaction = Transaction::new(1, "TAG-1");
        transaction.id = 77;
        transaction.stop(500);
        channel.stop_transaction(&transaction, 1);

        let (_, action, payload) = next_call(&mut rx);
        assert_eq!(action, "StopTransaction");
        assert_eq!(payload["transactionId"], 77);
        assert_eq!(payload["meterStop"], 500);
    }

    #[test]
    fn status_notification_reports_no_error() {
        let (channel, mut rx, _) = channel();
        channel.send_status_notification(1, ConnectorStatus::SuspendedEVSE);

        let (_, action, payload) = next_call(&mut rx);
        assert_eq!(action, "StatusNotification");
        assert_eq!(payload["status"], "SuspendedEVSE");
        assert_eq!(payload["errorCode"], "NoError");
    }

    #[test]
    fn meter_values_include_transaction_id_only_when_known() {
        let (channel, mut rx, _) = channel();
        let snapshot = telemetry::generate(1500, MeterValueFormat::Simple);

        channel.send_meter_value(Some(9), 1, &snapshot);
        let (_, action, payload) = next_call(&mut rx);
        assert_eq!(action, "MeterValues");
        assert_eq!(payload["transactionId"], 9);
        assert_eq!(payload["meterValue"][0]["sampledValue"][0]["value"], "1.500");

        channel.send_meter_value(None, 1, &snapshot);
        let (_, _, payload) = next_call(&mut rx);
        assert!(payload.get("transactionId").is_none());
    }

    #[test]
    fn replies_are_not_pending() {
        let (channel, mut rx, pending) = channel();
        channel.reply("srv-1", json!({"status": "Accepted"}));

        let text = rx.try_recv().expect("frame queued");
        assert_eq!(text, r#"[3,"srv-1",{"status":"Accepted"}]"#);
        assert!(pending.is_empty());
    }

    #[test]
    fn closed_outbox_drops_pending_entry() {
        let (channel, rx, pending) = channel();
        drop(rx);
        channel.send_heartbeat();
        assert!(pending.is_empty());
    }
}
