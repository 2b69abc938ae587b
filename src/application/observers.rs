//! Change subscribers
//!
//! Every observable field has exactly one subscriber slot; registering a
//! new callback replaces the previous one. Callbacks run synchronously on
//! the engine's thread, right after the field changes.

use std::collections::HashMap;

use crate::domain::{Availability, ConnectorStatus};

pub type StatusCallback = Box<dyn FnMut(ConnectorStatus) + Send>;
pub type ErrorCallback = Box<dyn FnMut(&str) + Send>;
pub type MeterValueCallback = Box<dyn FnMut(u64) + Send>;
pub type TransactionIdCallback = Box<dyn FnMut(i32) + Send>;
pub type AvailabilityCallback = Box<dyn FnMut(Availability) + Send>;

/// Subscribers for a single connector
#[derive(Default)]
pub struct ConnectorObservers {
    pub on_status: Option<StatusCallback>,
    pub on_meter_value: Option<MeterValueCallback>,
    pub on_transaction_id: Option<TransactionIdCallback>,
    pub on_availability: Option<AvailabilityCallback>,
}

/// Station-wide subscribers plus the per-connector slots
#[derive(Default)]
pub struct StationObservers {
    pub on_status: Option<StatusCallback>,
    pub on_error: Option<ErrorCallback>,
    connectors: HashMap<u32, ConnectorObservers>,
}

impl StationObservers {
    pub fn connector_mut(&mut self, connector_id: u32) -> &mut ConnectorObservers {
        self.connectors.entry(connector_id).or_default()
    }

    pub(crate) fn station_status(&mut self, status: ConnectorStatus) {
        if let Some(cb) = self.on_status.as_mut() {
            cb(status);
        }
    }

    pub(crate) fn error(&mut self, error: &str) {
        if let Some(cb) = self.on_error.as_mut() {
            cb(error);
        }
    }

    pub(crate) fn connector_status(&mut self, connector_id: u32, status: ConnectorStatus) {
        if let Some(cb) = self.slot(connector_id).and_then(|o| o.on_status.as_mut()) {
            cb(status);
        }
    }

    pub(crate) fn meter_value(&mut self, connector_id: u32, value: u64) {
        if let Some(cb) = self.slot(connector_id).and_then(|o| o.on_meter_value.as_mut()) {
            cb(value);
        }
    }

    pub(crate) fn transaction_id(&mut self, connector_id: u32, transaction_id: i32) {
        if let Some(cb) = self
            .slot(connector_id)
            .and_then(|o| o.on_transaction_id.as_mut())
        {
            cb(transaction_id);
        }
    }

    pub(crate) fn availability(&mut self, connector_id: u32, availability: Availability) {
        if let Some(cb) = self
            .slot(connector_id)
            .and_then(|o| o.on_availability.as_mut())
        {
            cb(availability);
        }
    }

    fn slot(&mut self, connector_id: u32) -> Option<&mut ConnectorObservers> {
        self.connectors.get_mut(&connector_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn last_registration_wins() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut observers = StationObservers::default();

        let counter = first.clone();
        observers.connector_mut(1).on_status = Some(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let counter = second.clone();
        observers.connector_mut(1).on_status = Some(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        observers.connector_status(1, ConnectorStatus::Charging);

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unregistered_slots_are_skipped() {
        let mut observers = StationObservers::default();
        observers.connector_status(4, ConnectorStatus::Available);
        observers.meter_value(4, 10);
        observers.station_status(ConnectorStatus::Available);
        observers.error("boom");
    }
}
