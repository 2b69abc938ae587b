//! Transaction lifecycle

use super::StationEngine;
use crate::domain::{Connector, ConnectorStatus, StationError, Transaction};

impl StationEngine {
    /// Start a session on `connector_id` for `id_tag`.
    ///
    /// Any transaction still attached to the connector is detached. Starts
    /// auto-telemetry when the station has an enabled auto setting.
    pub fn start_transaction(&mut self, id_tag: &str, connector_id: u32) {
        let Some(connector) = self.connectors.get_mut(&connector_id) else {
            self.report(StationError::ConnectorNotFound(connector_id));
            return;
        };

        let transaction = Transaction::new(connector_id, id_tag);
        connector.attach_transaction(transaction.clone());

        self.logger.info(format!(
            "Starting transaction on connector {} for tag {}",
            connector_id, id_tag
        ));
        self.channel.start_transaction(&transaction, connector_id);
        self.update_connector_status(connector_id, ConnectorStatus::Preparing);

        if let Some(setting) = self.auto_meter_value.filter(|s| s.is_enabled()) {
            self.start_auto_meter_value(connector_id, setting.interval, setting.value);
        }
    }

    /// Stop the session on `connector_id`, report it, clean up and return
    /// the connector to `Available`.
    ///
    /// The connector passes through `Finishing` during cleanup; subscribers
    /// and the Central System see both transitions.
    pub fn stop_transaction(&mut self, connector_id: u32) {
        let Some(connector) = self.connectors.get_mut(&connector_id) else {
            self.report(StationError::ConnectorNotFound(connector_id));
            return;
        };

        let meter_stop = connector.meter_value;
        let Some(transaction) = connector.transaction.as_mut() else {
            self.logger.error(format!(
                "No transaction to stop on connector {}",
                connector_id
            ));
            return;
        };

        transaction.stop(meter_stop);
        transaction.meter_sent = true;
        let transaction = transaction.clone();

        self.logger.info(format!(
            "Stopping transaction {} on connector {} at {} Wh",
            transaction.id, connector_id, meter_stop
        ));
        self.channel.stop_transaction(&transaction, connector_id);

        self.clean_transaction(connector_id);
        self.update_connector_status(connector_id, ConnectorStatus::Available);
    }

    /// [`stop_transaction`](Self::stop_transaction) for a connector obtained
    /// from a snapshot.
    pub fn stop_transaction_for(&mut self, connector: &Connector) {
        self.stop_transaction(connector.id());
    }

    /// Reset the stop-telemetry flag, move the connector to `Finishing` and
    /// cancel its auto-telemetry when auto-telemetry is configured.
    pub fn clean_transaction(&mut self, connector_id: u32) {
        let Some(connector) = self.connectors.get_mut(&connector_id) else {
            self.report(StationError::ConnectorNotFound(connector_id));
            return;
        };

        if let Some(transaction) = connector.transaction.as_mut() {
            transaction.meter_sent = false;
        }

        self.update_connector_status(connector_id, ConnectorStatus::Finishing);

        if self.auto_meter_value.is_some() {
            self.stop_auto_meter_value(connector_id);
        }
    }

    pub fn clean_transaction_for(&mut self, connector: &Connector) {
        self.clean_transaction(connector.id());
    }

    /// Record the id the Central System assigned to the connector's
    /// transaction. Ignored when the connector has no transaction.
    pub fn set_transaction_id(&mut self, connector_id: u32, transaction_id: i32) {
        let Some(connector) = self.connectors.get_mut(&connector_id) else {
            self.report(StationError::ConnectorNotFound(connector_id));
            return;
        };
        let Some(transaction) = connector.transaction.as_mut() else {
            return;
        };

        transaction.id = transaction_id;
        connector.transaction_id = Some(transaction_id);

        self.logger.info(format!(
            "Connector {} transaction id is {}",
            connector_id, transaction_id
        ));
        self.observers.transaction_id(connector_id, transaction_id);
    }

    pub fn authorize(&mut self, id_tag: &str) {
        self.logger.info(format!("Authorizing tag {}", id_tag));
        self.channel.authorize(id_tag);
    }

    /// Overwrite a connector's cumulative reading (Wh).
    pub fn set_meter_value(&mut self, connector_id: u32, value: u64) {
        let Some(connector) = self.connectors.get_mut(&connector_id) else {
            self.report(StationError::ConnectorNotFound(connector_id));
            return;
        };

        connector.meter_value = value;
        self.observers.meter_value(connector_id, value);
    }
}
