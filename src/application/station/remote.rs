//! Calls initiated by the Central System

use serde_json::json;

use super::StationEngine;
use crate::application::events::ServerRequest;
use crate::domain::{ConnectorStatus, StationError};

const ACCEPTED: &str = "Accepted";
const REJECTED: &str = "Rejected";

impl StationEngine {
    pub(super) fn handle_server_call(&mut self, unique_id: &str, request: ServerRequest) {
        self.logger
            .info(format!("{} requested by Central System", request.action()));

        match request {
            ServerRequest::ChangeAvailability {
                connector_id: 0,
                availability,
            } => {
                let ids: Vec<u32> = self.connectors.keys().copied().collect();
                for connector_id in ids {
                    let _ = self.update_connector_availability(connector_id, availability);
                }
                self.reply_status(unique_id, ACCEPTED);
            }
            ServerRequest::ChangeAvailability {
                connector_id,
                availability,
            } => {
                let status = match self.update_connector_availability(connector_id, availability) {
                    Ok(()) => ACCEPTED,
                    Err(_) => REJECTED,
                };
                self.reply_status(unique_id, status);
            }
            ServerRequest::RemoteStartTransaction {
                connector_id,
                id_tag,
            } => match self.remote_start_target(connector_id) {
                Some(connector_id) => {
                    self.reply_status(unique_id, ACCEPTED);
                    self.start_transaction(&id_tag, connector_id);
                }
                None => self.reply_status(unique_id, REJECTED),
            },
            ServerRequest::RemoteStopTransaction { transaction_id } => {
                let target = self
                    .connectors
                    .values()
                    .find(|c| c.active_transaction_id() == Some(transaction_id))
                    .map(|c| c.id());
                match target {
                    Some(connector_id) => {
                        self.reply_status(unique_id, ACCEPTED);
                        self.stop_transaction(connector_id);
                    }
                    None => self.reply_status(unique_id, REJECTED),
                }
            }
            ServerRequest::Reset => {
                self.reply_status(unique_id, ACCEPTED);
                self.reset();
            }
        }
    }

    /// The requested connector when it is `Available`. Without a request,
    /// the first `Available` connector.
    fn remote_start_target(&mut self, connector_id: Option<u32>) -> Option<u32> {
        match connector_id {
            Some(id) => {
                let status = match self.connectors.get(&id) {
                    Some(connector) => connector.status,
                    None => {
                        self.report(StationError::ConnectorNotFound(id));
                        return None;
                    }
                };
                if status != ConnectorStatus::Available {
                    self.logger.info(format!(
                        "Connector {} is {}, remote start rejected",
                        id, status
                    ));
                    return None;
                }
                Some(id)
            }
            None => self
                .connectors
                .values()
                .find(|c| c.status == ConnectorStatus::Available)
                .map(|c| c.id()),
        }
    }

    fn reply_status(&self, unique_id: &str, status: &str) {
        self.channel.reply(unique_id, json!({ "status": status }));
    }
}
