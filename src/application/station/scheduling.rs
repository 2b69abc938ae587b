//! Heartbeat and meter value scheduling

use std::time::Duration;

use tracing::debug;

use super::{AutoMeterTimer, StationEngine};
use crate::application::ports::{TimerKind, TimerTick};
use crate::domain::{telemetry, MeterValueFormat, StationError};

impl StationEngine {
    /// (Re)arm the heartbeat. A previous heartbeat timer is cancelled first.
    pub fn start_heartbeat(&mut self, period_secs: u64) {
        if period_secs == 0 {
            self.logger.error("Heartbeat period must be positive");
            return;
        }

        self.stop_heartbeat();
        let handle = self
            .scheduler
            .schedule_repeating(TimerKind::Heartbeat, Duration::from_secs(period_secs));
        self.heartbeat_timer = Some(handle);
        self.logger
            .info(format!("Heartbeat started ({}s)", period_secs));
    }

    pub fn stop_heartbeat(&mut self) {
        if let Some(handle) = self.heartbeat_timer.take() {
            self.scheduler.cancel(handle);
            self.logger.info("Heartbeat stopped");
        }
    }

    pub fn is_heartbeat_running(&self) -> bool {
        self.heartbeat_timer.is_some()
    }

    /// Every `interval_secs`, add `step` Wh to the connector's meter and
    /// send a fresh snapshot. Replaces an existing timer for the connector.
    pub fn start_auto_meter_value(&mut self, connector_id: u32, interval_secs: u64, step: u64) {
        if !self.ensure_connector(connector_id) {
            return;
        }
        if interval_secs == 0 {
            self.logger
                .error(format!("Auto meter value interval for connector {} must be positive", connector_id));
            return;
        }

        self.stop_auto_meter_value(connector_id);
        let handle = self.scheduler.schedule_repeating(
            TimerKind::AutoMeterValue { connector_id },
            Duration::from_secs(interval_secs),
        );
        self.meter_value_timers
            .insert(connector_id, AutoMeterTimer { handle, step });
        self.logger.info(format!(
            "Auto meter values on connector {}: +{} Wh every {}s",
            connector_id, step, interval_secs
        ));
    }

    /// Cancel the connector's auto-telemetry; no-op when none is running.
    pub fn stop_auto_meter_value(&mut self, connector_id: u32) {
        if let Some(timer) = self.meter_value_timers.remove(&connector_id) {
            self.scheduler.cancel(timer.handle);
            self.logger
                .info(format!("Auto meter values on connector {} stopped", connector_id));
        }
    }

    pub(super) fn stop_all_auto_meter_values(&mut self) {
        let connectors: Vec<u32> = self.meter_value_timers.keys().copied().collect();
        for connector_id in connectors {
            self.stop_auto_meter_value(connector_id);
        }
    }

    pub fn is_auto_meter_value_running(&self, connector_id: u32) -> bool {
        self.meter_value_timers.contains_key(&connector_id)
    }

    /// Send a snapshot of the connector's current reading.
    pub fn send_meter_value(&mut self, connector_id: u32) {
        let Some(connector) = self.connectors.get(&connector_id) else {
            self.report(StationError::ConnectorNotFound(connector_id));
            return;
        };

        let snapshot = telemetry::generate(connector.meter_value, self.meter_value_format);
        self.channel
            .send_meter_value(connector.active_transaction_id(), connector_id, &snapshot);
    }

    /// Like [`send_meter_value`](Self::send_meter_value), and also writes
    /// every sampled reading to the station log.
    pub fn send_current_detailed_meter_value(&mut self, connector_id: u32) {
        let Some(connector) = self.connectors.get(&connector_id) else {
            self.report(StationError::ConnectorNotFound(connector_id));
            return;
        };

        let transaction_id = connector.active_transaction_id();
        let snapshot = telemetry::generate(connector.meter_value, self.meter_value_format);
        for sample in &snapshot.sampled_value {
            self.logger.info(format!(
                "Connector {} {:?}{} = {} {}",
                connector_id,
                sample.measurand,
                sample.phase.map(|p| format!(" {:?}", p)).unwrap_or_default(),
                sample.value,
                sample.unit.map(|u| format!("{:?}", u)).unwrap_or_default(),
            ));
        }
        self.channel
            .send_meter_value(transaction_id, connector_id, &snapshot);
    }

    pub fn set_meter_value_format(&mut self, format: MeterValueFormat) {
        self.meter_value_format = format;
        self.logger.info(format!("Meter value format set to {}", format));
    }

    pub fn meter_value_format(&self) -> MeterValueFormat {
        self.meter_value_format
    }

    pub(super) fn on_tick(&mut self, tick: TimerTick) {
        // A tick can still be queued after its timer was cancelled or replaced.
        match tick.kind {
            TimerKind::Heartbeat if self.heartbeat_timer == Some(tick.handle) => {
                self.channel.send_heartbeat();
            }
            TimerKind::AutoMeterValue { connector_id } => {
                let live_step = self
                    .meter_value_timers
                    .get(&connector_id)
                    .filter(|timer| timer.handle == tick.handle)
                    .map(|timer| timer.step);
                match live_step {
                    Some(step) => self.auto_meter_value_tick(connector_id, step),
                    None => debug!(station_id = self.id.as_str(), ?tick, "Stale timer tick ignored"),
                }
            }
            TimerKind::Heartbeat => {
                debug!(station_id = self.id.as_str(), ?tick, "Stale timer tick ignored")
            }
        }
    }

    fn auto_meter_value_tick(&mut self, connector_id: u32, step: u64) {
        let Some(connector) = self.connectors.get_mut(&connector_id) else {
            self.stop_auto_meter_value(connector_id);
            return;
        };

        connector.meter_value = connector.meter_value.saturating_add(step);
        let value = connector.meter_value;
        let transaction_id = connector.active_transaction_id();

        self.observers.meter_value(connector_id, value);
        let snapshot = telemetry::generate(value, self.meter_value_format);
        self.channel
            .send_meter_value(transaction_id, connector_id, &snapshot);
    }
}
