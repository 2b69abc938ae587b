//! Station events
//!
//! Everything asynchronous reaches the engine as a [`StationEvent`]: the
//! transport reports open/close, the scheduler reports ticks, the inbound
//! router reports server responses and server-initiated calls, and the
//! operator front-end posts commands. The runtime loop hands them to the
//! engine one at a time.

use crate::application::ports::TimerTick;
use crate::domain::{Availability, ConnectorStatus, MeterValueFormat};

#[derive(Debug, Clone, PartialEq)]
pub enum StationEvent {
    /// WebSocket session established
    Opened,
    /// WebSocket session ended
    Closed { code: u16, reason: String },
    /// A recurring timer fired
    Tick(TimerTick),
    /// BootNotification.conf with status Accepted
    BootAccepted { interval: i64 },
    /// StartTransaction.conf carrying the server transaction id
    TransactionAccepted { connector_id: u32, transaction_id: i32 },
    /// Call initiated by the Central System, to be answered with `reply`
    ServerCall { unique_id: String, request: ServerRequest },
    /// Operator command
    Command(StationCommand),
}

/// Central System requests handled by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum ServerRequest {
    ChangeAvailability {
        connector_id: u32,
        availability: Availability,
    },
    RemoteStartTransaction {
        connector_id: Option<u32>,
        id_tag: String,
    },
    RemoteStopTransaction {
        transaction_id: i32,
    },
    Reset,
}

impl ServerRequest {
    pub fn action(&self) -> &'static str {
        match self {
            Self::ChangeAvailability { .. } => "ChangeAvailability",
            Self::RemoteStartTransaction { .. } => "RemoteStartTransaction",
            Self::RemoteStopTransaction { .. } => "RemoteStopTransaction",
            Self::Reset => "Reset",
        }
    }
}

/// Operator commands, mirroring the engine's command API
#[derive(Debug, Clone, PartialEq)]
pub enum StationCommand {
    Connect,
    Disconnect,
    Reset,
    Authorize { id_tag: String },
    StartTransaction { connector_id: u32, id_tag: String },
    StopTransaction { connector_id: u32 },
    SetAvailability { connector_id: u32, availability: Availability },
    UpdateStatus { connector_id: u32, status: ConnectorStatus },
    SetMeterValue { connector_id: u32, value: u64 },
    SendMeterValue { connector_id: u32 },
    StartAutoMeterValue { connector_id: u32, interval: u64, step: u64 },
    StopAutoMeterValue { connector_id: u32 },
    SetMeterValueFormat(MeterValueFormat),
    StartHeartbeat { period: u64 },
    StopHeartbeat,
}
