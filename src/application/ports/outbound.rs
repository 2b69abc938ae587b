//! Outbound ports: the collaborators the station engine drives
//!
//! The engine never performs I/O itself. It talks to the Central System
//! through a [`MessageChannel`], opens and closes the session through a
//! [`Transport`], and arms recurring timers through a [`Scheduler`].
//! Asynchronous outcomes (connection opened/closed, timer ticks, server
//! responses) come back as [`StationEvent`](crate::application::StationEvent)s.

use std::time::Duration;

use serde_json::Value;

use crate::domain::{BootPayload, ConnectorStatus, TelemetrySnapshot, Transaction};

// ── Transport ──────────────────────────────────────────────────

/// Persistent connection to the Central System.
///
/// `connect` returns immediately; the outcome arrives later as
/// `StationEvent::Opened` or `StationEvent::Closed { code, reason }`.
pub trait Transport: Send {
    /// Connection URL (including the station id path segment)
    fn url(&self) -> &str;

    fn connect(&mut self);

    /// Request a close. Completion is reported through `StationEvent::Closed`.
    fn disconnect(&mut self);
}

/// Close code meaning "closed without an explicit status" (RFC 6455 1005).
/// Closes carrying it are ordinary disconnects, not faults.
pub const CLOSE_CODE_NO_STATUS: u16 = 1005;

// ── MessageChannel ─────────────────────────────────────────────

/// Fire-and-forget OCPP calls from the station to the Central System.
///
/// Correlating responses and retrying are the channel's concern.
pub trait MessageChannel: Send {
    fn send_boot_notification(&self, payload: &BootPayload);

    fn authorize(&self, id_tag: &str);

    fn start_transaction(&self, transaction: &Transaction, connector_id: u32);

    fn stop_transaction(&self, transaction: &Transaction, connector_id: u32);

    fn send_heartbeat(&self);

    fn send_status_notification(&self, connector_id: u32, status: ConnectorStatus);

    fn send_meter_value(
        &self,
        transaction_id: Option<i32>,
        connector_id: u32,
        telemetry: &TelemetrySnapshot,
    );

    /// Answer a server-initiated call.
    fn reply(&self, unique_id: &str, payload: Value);
}

// ── Scheduler ──────────────────────────────────────────────────

/// Opaque identifier of an armed timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(pub(crate) u64);

/// What a recurring timer is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    Heartbeat,
    AutoMeterValue { connector_id: u32 },
}

/// One firing of a recurring timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    pub handle: TimerHandle,
    pub kind: TimerKind,
}

/// Start-after / cancel timer service owned by the engine.
///
/// Ticks are delivered as `StationEvent::Tick`; the first one fires one
/// period after scheduling.
pub trait Scheduler: Send {
    fn schedule_repeating(&mut self, kind: TimerKind, period: Duration) -> TimerHandle;

    /// Cancel a timer. Unknown or already-cancelled handles are ignored.
    fn cancel(&mut self, handle: TimerHandle);
}
