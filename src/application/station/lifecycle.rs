//! Connection lifecycle: connect, boot, disconnect, reset

use tracing::warn;

use super::StationEngine;
use crate::application::ports::CLOSE_CODE_NO_STATUS;
use crate::domain::{ConnectorStatus, StationError};

impl StationEngine {
    /// Ask the transport to open the session. `boot` runs once it opens.
    pub fn connect(&mut self) {
        let url = self.transport.url().to_string();
        self.logger.info(format!("Connecting to {}", url));
        self.transport.connect();
    }

    /// Announce the station and bring every connector to `Available`.
    pub fn boot(&mut self) {
        self.logger.info(format!(
            "Sending BootNotification ({} {})",
            self.boot_notification.vendor, self.boot_notification.model
        ));
        self.channel.send_boot_notification(&self.boot_notification);
        self.update_all_connectors_status(ConnectorStatus::Available);
        self.set_error(String::new());
    }

    /// Mark the station unavailable and ask the transport to close.
    /// Connectors follow once the close is reported.
    pub fn disconnect(&mut self) {
        self.logger.info("Disconnecting");
        self.set_station_status(ConnectorStatus::Unavailable);
        self.transport.disconnect();
    }

    pub fn reset(&mut self) {
        self.logger.info("Resetting station");
        self.disconnect();
        self.connect();
    }

    pub(super) fn on_opened(&mut self) {
        self.logger.info("Connection opened");
        self.boot();
    }

    pub(super) fn on_closed(&mut self, code: u16, reason: String) {
        self.logger
            .info(format!("Connection closed (code {}): {}", code, reason));

        self.stop_heartbeat();
        self.stop_all_auto_meter_values();
        self.mark_all_unavailable();

        if code != CLOSE_CODE_NO_STATUS {
            self.report(StationError::ConnectionClosed { code, reason });
        }
    }

    pub(super) fn on_boot_accepted(&mut self, interval: i64) {
        let period = u64::try_from(interval)
            .ok()
            .filter(|secs| *secs > 0)
            .unwrap_or_else(|| {
                warn!(
                    station_id = self.id.as_str(),
                    interval, "Unusable heartbeat interval, using configured default"
                );
                self.heartbeat_interval
            });
        self.logger
            .info(format!("BootNotification accepted, heartbeat every {}s", period));
        self.start_heartbeat(period);
    }
}
