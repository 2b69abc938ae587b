//! Transaction domain entity

use chrono::{DateTime, Utc};

/// One charging session on a connector
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Server-assigned transaction id (0 until the server answers)
    pub id: i32,
    /// Connector the session runs on
    pub connector_id: u32,
    /// ID tag that started the transaction
    pub tag_id: String,
    /// Meter value at start (Wh)
    pub meter_start: u64,
    /// Meter value at stop (Wh)
    pub meter_stop: Option<u64>,
    /// When the transaction started
    pub start_time: DateTime<Utc>,
    /// When the transaction stopped
    pub stop_time: Option<DateTime<Utc>>,
    /// A stop-telemetry send is waiting for acknowledgement
    pub meter_sent: bool,
}

impl Transaction {
    /// Start a session. The meter start is always 0 and the id stays 0
    /// until the server assigns one.
    pub fn new(connector_id: u32, tag_id: impl Into<String>) -> Self {
        Self {
            id: 0,
            connector_id,
            tag_id: tag_id.into(),
            meter_start: 0,
            meter_stop: None,
            start_time: Utc::now(),
            stop_time: None,
            meter_sent: false,
        }
    }

    pub fn stop(&mut self, meter_stop: u64) {
        self.meter_stop = Some(meter_stop);
        self.stop_time = Some(Utc::now());
    }

    pub fn is_active(&self) -> bool {
        self.stop_time.is_none()
    }

    /// Energy consumed in Wh, once stopped
    pub fn energy_consumed(&self) -> Option<u64> {
        self.meter_stop
            .map(|stop| stop.saturating_sub(self.meter_start))
    }
}
