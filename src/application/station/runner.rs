//! Event loop driving the engine

use std::future::Future;

use tokio::sync::mpsc;
use tracing::info;

use super::StationEngine;
use crate::application::events::StationEvent;

impl StationEngine {
    /// Process events until the channel closes or `shutdown` completes.
    ///
    /// Events are applied strictly in arrival order, each one to completion.
    /// On shutdown the station disconnects.
    pub async fn run(
        &mut self,
        events: &mut mpsc::UnboundedReceiver<StationEvent>,
        shutdown: impl Future<Output = ()>,
    ) {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        info!(station_id = self.id.as_str(), "Event channel closed");
                        break;
                    }
                },
                _ = &mut shutdown => {
                    info!(station_id = self.id.as_str(), "🛑 Station received shutdown signal");
                    self.stop_heartbeat();
                    self.stop_all_auto_meter_values();
                    self.disconnect();
                    break;
                }
            }
        }
    }
}
