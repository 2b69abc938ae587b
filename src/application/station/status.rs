//! Status and availability propagation

use super::StationEngine;
use crate::domain::{Availability, ConnectorStatus, StationError, StationResult};

impl StationEngine {
    /// Set one connector's status and send a StatusNotification for it.
    pub fn update_connector_status(&mut self, connector_id: u32, status: ConnectorStatus) {
        let Some(connector) = self.connectors.get_mut(&connector_id) else {
            self.report(StationError::ConnectorNotFound(connector_id));
            return;
        };

        connector.status = status;
        self.channel.send_status_notification(connector_id, status);
        self.observers.connector_status(connector_id, status);
    }

    /// Set the station and every connector to `status`: one write and one
    /// StatusNotification per connector.
    pub fn update_all_connectors_status(&mut self, status: ConnectorStatus) {
        self.set_station_status(status);

        for (connector_id, connector) in self.connectors.iter_mut() {
            connector.status = status;
            self.channel.send_status_notification(*connector_id, status);
            self.observers.connector_status(*connector_id, status);
        }
    }

    /// Record a new availability and force the matching status
    /// (`Inoperative` → `Unavailable`, `Operative` → `Available`).
    pub fn update_connector_availability(
        &mut self,
        connector_id: u32,
        availability: Availability,
    ) -> StationResult<()> {
        let Some(connector) = self.connectors.get_mut(&connector_id) else {
            let err = StationError::ConnectorNotFound(connector_id);
            self.logger.error(err.to_string());
            return Err(err);
        };

        connector.availability = availability;
        self.logger.info(format!(
            "Connector {} availability set to {}",
            connector_id, availability
        ));

        let status = match availability {
            Availability::Inoperative => ConnectorStatus::Unavailable,
            Availability::Operative => ConnectorStatus::Available,
        };
        self.update_connector_status(connector_id, status);
        self.observers.availability(connector_id, availability);
        Ok(())
    }

    /// Connection loss: everything goes `Unavailable` locally. No
    /// notifications are sent since there is no session to carry them.
    pub(super) fn mark_all_unavailable(&mut self) {
        let status = ConnectorStatus::Unavailable;
        self.set_station_status(status);

        for (connector_id, connector) in self.connectors.iter_mut() {
            connector.status = status;
            self.observers.connector_status(*connector_id, status);
        }
    }
}
