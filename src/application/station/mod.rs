//! Station engine
//!
//! Owns the connectors, the boot payload and every timer handle. All
//! mutations happen through `&mut self`, driven one event at a time by
//! [`StationEngine::run`], so no two operations on a connector interleave.
//!
//! Commands that reference an unknown connector are logged and otherwise
//! ignored; the engine keeps serving the remaining connectors.

mod lifecycle;
mod remote;
mod runner;
mod scheduling;
mod status;
mod transactions;


use std::collections::{BTreeMap, HashMap};

use crate::application::events::{StationCommand, StationEvent};
use crate::application::logger::{LogLine, StationLogger};
use crate::application::observers::StationObservers;
use crate::application::ports::{MessageChannel, Scheduler, TimerHandle, Transport};
use crate::domain::{
    Availability, BootPayload, Connector, ConnectorStatus, MeterValueFormat, StationError,
    StationStatus,
};

/// Heartbeat period used when the Central System does not provide one
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 300;

/// Auto-telemetry parameters applied to every started transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoMeterValueSetting {
    /// Seconds between ticks
    pub interval: u64,
    /// Wh added to the meter on every tick
    pub value: u64,
}

impl AutoMeterValueSetting {
    pub fn is_enabled(&self) -> bool {
        self.interval != 0 && self.value != 0
    }
}

/// The collaborators an engine is wired to
pub struct StationIo {
    pub transport: Box<dyn Transport>,
    pub channel: Box<dyn MessageChannel>,
    pub scheduler: Box<dyn Scheduler>,
}

#[derive(Debug, Clone, Copy)]
struct AutoMeterTimer {
    handle: TimerHandle,
    step: u64,
}

pub struct StationEngine {
    id: String,
    boot_notification: BootPayload,
    status: StationStatus,
    error: String,
    connectors: BTreeMap<u32, Connector>,
    meter_value_format: MeterValueFormat,
    auto_meter_value: Option<AutoMeterValueSetting>,
    heartbeat_interval: u64,
    heartbeat_timer: Option<TimerHandle>,
    meter_value_timers: HashMap<u32, AutoMeterTimer>,
    observers: StationObservers,
    logger: StationLogger,
    transport: Box<dyn Transport>,
    channel: Box<dyn MessageChannel>,
    scheduler: Box<dyn Scheduler>,
}

impl StationEngine {
    /// Build a station with connectors `1..=connector_count`, all
    /// `Unavailable` and `Operative` with an empty meter.
    pub fn new(
        id: impl Into<String>,
        connector_count: u32,
        boot_notification: BootPayload,
        io: StationIo,
    ) -> Self {
        let id = id.into();
        let connectors = (1..=connector_count)
            .map(|connector_id| (connector_id, Connector::new(connector_id)))
            .collect();

        Self {
            logger: StationLogger::new(id.clone()),
            id,
            boot_notification,
            status: StationStatus::default(),
            error: String::new(),
            connectors,
            meter_value_format: MeterValueFormat::default(),
            auto_meter_value: None,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL_SECS,
            heartbeat_timer: None,
            meter_value_timers: HashMap::new(),
            observers: StationObservers::default(),
            transport: io.transport,
            channel: io.channel,
            scheduler: io.scheduler,
        }
    }

    pub fn with_auto_meter_value(mut self, setting: AutoMeterValueSetting) -> Self {
        self.auto_meter_value = Some(setting);
        self
    }

    pub fn with_meter_value_format(mut self, format: MeterValueFormat) -> Self {
        self.meter_value_format = format;
        self
    }

    /// Heartbeat period used when BootNotification.conf carries no usable interval
    pub fn with_heartbeat_interval(mut self, seconds: u64) -> Self {
        self.heartbeat_interval = seconds;
        self
    }

    // ── Getters ────────────────────────────────────────────

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> StationStatus {
        self.status
    }

    /// Last surfaced error, empty when there is none
    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn connector_number(&self) -> usize {
        self.connectors.len()
    }

    pub fn connector(&self, connector_id: u32) -> Option<&Connector> {
        self.connectors.get(&connector_id)
    }

    /// Copy of the connector map; later engine changes do not show up in it.
    pub fn connectors(&self) -> BTreeMap<u32, Connector> {
        self.connectors.clone()
    }

    pub fn boot_notification(&self) -> &BootPayload {
        &self.boot_notification
    }

    pub fn auto_meter_value_setting(&self) -> Option<AutoMeterValueSetting> {
        self.auto_meter_value
    }

    pub fn url(&self) -> &str {
        self.transport.url()
    }

    // ── Subscribers ────────────────────────────────────────

    pub fn set_on_status_change(&mut self, cb: impl FnMut(StationStatus) + Send + 'static) {
        self.observers.on_status = Some(Box::new(cb));
    }

    pub fn set_on_error(&mut self, cb: impl FnMut(&str) + Send + 'static) {
        self.observers.on_error = Some(Box::new(cb));
    }

    pub fn set_on_log(&mut self, cb: impl FnMut(&LogLine) + Send + 'static) {
        self.logger.set_subscriber(cb);
    }

    pub fn set_connector_on_status_change(
        &mut self,
        connector_id: u32,
        cb: impl FnMut(ConnectorStatus) + Send + 'static,
    ) {
        if self.ensure_connector(connector_id) {
            self.observers.connector_mut(connector_id).on_status = Some(Box::new(cb));
        }
    }

    pub fn set_connector_on_meter_value(
        &mut self,
        connector_id: u32,
        cb: impl FnMut(u64) + Send + 'static,
    ) {
        if self.ensure_connector(connector_id) {
            self.observers.connector_mut(connector_id).on_meter_value = Some(Box::new(cb));
        }
    }

    pub fn set_connector_on_transaction_id(
        &mut self,
        connector_id: u32,
        cb: impl FnMut(i32) + Send + 'static,
    ) {
        if self.ensure_connector(connector_id) {
            self.observers.connector_mut(connector_id).on_transaction_id = Some(Box::new(cb));
        }
    }

    pub fn set_connector_on_availability(
        &mut self,
        connector_id: u32,
        cb: impl FnMut(Availability) + Send + 'static,
    ) {
        if self.ensure_connector(connector_id) {
            self.observers.connector_mut(connector_id).on_availability = Some(Box::new(cb));
        }
    }

    // ── Event dispatch ─────────────────────────────────────

    /// Apply one event to the station.
    pub fn handle_event(&mut self, event: StationEvent) {
        match event {
            StationEvent::Opened => self.on_opened(),
            StationEvent::Closed { code, reason } => self.on_closed(code, reason),
            StationEvent::Tick(tick) => self.on_tick(tick),
            StationEvent::BootAccepted { interval } => self.on_boot_accepted(interval),
            StationEvent::TransactionAccepted {
                connector_id,
                transaction_id,
            } => self.set_transaction_id(connector_id, transaction_id),
            StationEvent::ServerCall { unique_id, request } => {
                self.handle_server_call(&unique_id, request)
            }
            StationEvent::Command(command) => self.handle_command(command),
        }
    }

    fn handle_command(&mut self, command: StationCommand) {
        match command {
            StationCommand::Connect => self.connect(),
            StationCommand::Disconnect => self.disconnect(),
            StationCommand::Reset => self.reset(),
            StationCommand::Authorize { id_tag } => self.authorize(&id_tag),
            StationCommand::StartTransaction {
                connector_id,
                id_tag,
            } => self.start_transaction(&id_tag, connector_id),
            StationCommand::StopTransaction { connector_id } => {
                self.stop_transaction(connector_id)
            }
            StationCommand::SetAvailability {
                connector_id,
                availability,
            } => {
                // failure is already logged
                let _ = self.update_connector_availability(connector_id, availability);
            }
            StationCommand::UpdateStatus {
                connector_id,
                status,
            } => self.update_connector_status(connector_id, status),
            StationCommand::SetMeterValue {
                connector_id,
                value,
            } => self.set_meter_value(connector_id, value),
            StationCommand::SendMeterValue { connector_id } => self.send_meter_value(connector_id),
            StationCommand::StartAutoMeterValue {
                connector_id,
                interval,
                step,
            } => self.start_auto_meter_value(connector_id, interval, step),
            StationCommand::StopAutoMeterValue { connector_id } => {
                self.stop_auto_meter_value(connector_id)
            }
            StationCommand::SetMeterValueFormat(format) => self.set_meter_value_format(format),
            StationCommand::StartHeartbeat { period } => self.start_heartbeat(period),
            StationCommand::StopHeartbeat => self.stop_heartbeat(),
        }
    }

    // ── Internal helpers ───────────────────────────────────

    /// Log an error and, for connection-level faults, surface it on `error`.
    fn report(&mut self, err: StationError) {
        self.logger.error(err.to_string());
        if err.is_surfaced() {
            self.set_error(err.to_string());
        }
    }

    fn set_error(&mut self, error: String) {
        self.error = error;
        self.observers.error(&self.error);
    }

    fn set_station_status(&mut self, status: StationStatus) {
        self.status = status;
        self.observers.station_status(status);
    }

    /// `true` if the connector exists; otherwise logs a not-found error.
    fn ensure_connector(&mut self, connector_id: u32) -> bool {
        if self.connectors.contains_key(&connector_id) {
            true
        } else {
            self.report(StationError::ConnectorNotFound(connector_id));
            false
        }
    }
}
