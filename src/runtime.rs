//! Station runtime
//!
//! [`StationHandle`] wires an [`AppConfig`] into a [`StationEngine`] with
//! the production collaborators (WebSocket transport, OCPP-J channel,
//! tokio scheduler) and drives it on a background task.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::application::events::{StationCommand, StationEvent};
use crate::application::station::{StationEngine, StationIo};
use crate::config::AppConfig;
use crate::domain::{StationError, StationResult};
use crate::infrastructure::{
    listen_for_ctrl_c, InboundRouter, OcppMessageChannel, PendingCalls, ShutdownSignal,
    TokioScheduler, WsTransport,
};

/// How long a stopping station waits for the close handshake
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Initialize tracing (logging) from the application config.
///
/// `RUST_LOG` wins over the configured level. Call once at startup.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

/// Build an engine wired to the production collaborators. Every
/// asynchronous outcome is posted to `events`.
pub fn build_station(
    config: &AppConfig,
    events: mpsc::UnboundedSender<StationEvent>,
) -> StationEngine {
    let station_id = config.station.id.clone();
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    let pending = PendingCalls::default();

    let channel = OcppMessageChannel::new(station_id.clone(), outbox_tx, pending.clone());
    let router = InboundRouter::new(station_id.clone(), pending, events.clone());
    let transport = WsTransport::new(
        &config.server.url,
        station_id.clone(),
        config.password(),
        events.clone(),
        outbox_rx,
        router,
    );

    let mut engine = StationEngine::new(
        station_id,
        config.station.connectors,
        config.boot_payload(),
        StationIo {
            transport: Box::new(transport),
            channel: Box::new(channel),
            scheduler: Box::new(TokioScheduler::new(events)),
        },
    )
    .with_meter_value_format(config.meter_values.format)
    .with_heartbeat_interval(config.server.heartbeat_interval);

    if let Some(setting) = config.auto_meter_value() {
        engine = engine.with_auto_meter_value(setting);
    }
    engine
}

/// Handle to a running station.
pub struct StationHandle {
    /// The configuration the station was started with.
    pub config: AppConfig,
    /// Connection URL including the station id.
    pub url: String,

    events: mpsc::UnboundedSender<StationEvent>,
    shutdown: ShutdownSignal,
    task: JoinHandle<()>,
}

impl StationHandle {
    /// Start the station and connect it to the Central System.
    pub fn start(config: AppConfig) -> Self {
        Self::start_with(config, |_| {})
    }

    /// Like [`start`](Self::start); `configure` runs before the first event,
    /// e.g. to install subscribers.
    pub fn start_with(config: AppConfig, configure: impl FnOnce(&mut StationEngine)) -> Self {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let mut engine = build_station(&config, events_tx.clone());
        configure(&mut engine);

        let url = engine.url().to_string();
        let shutdown = ShutdownSignal::new();

        info!(
            station_id = engine.id(),
            connectors = engine.connector_number(),
            url = url.as_str(),
            "Starting station"
        );

        let signal = shutdown.clone();
        let task = tokio::spawn(async move {
            engine.run(&mut events_rx, signal.wait()).await;

            // keep the transport alive until its close is reported
            let closed = tokio::time::timeout(CLOSE_GRACE, async {
                while let Some(event) = events_rx.recv().await {
                    if let StationEvent::Closed { .. } = event {
                        engine.handle_event(event);
                        break;
                    }
                }
            })
            .await;
            if closed.is_err() {
                warn!(station_id = engine.id(), "No close confirmation from transport");
            }
            info!(station_id = engine.id(), "✅ Station stopped");
        });

        let handle = Self {
            config,
            url,
            events: events_tx,
            shutdown,
            task,
        };
        // events are processed in order, so the connect runs after `configure`
        let _ = handle.send(StationCommand::Connect);
        handle
    }

    /// Queue an operator command.
    pub fn send(&self, command: StationCommand) -> StationResult<()> {
        self.events
            .send(StationEvent::Command(command))
            .map_err(|_| StationError::Transport("station is not running".into()))
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Stop the station on Ctrl+C.
    pub fn install_signal_handler(&self) {
        tokio::spawn(listen_for_ctrl_c(self.shutdown.clone()));
    }

    /// Disconnect and wait for the event loop to finish.
    pub async fn shutdown(self) {
        self.shutdown.trigger();
        self.wait().await;
    }

    /// Wait for the event loop to finish.
    pub async fn wait(self) {
        if let Err(e) = self.task.await {
            warn!(error = %e, "Station task ended abnormally");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use futures_util::StreamExt;
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
    use tokio_tungstenite::tungstenite::http::HeaderValue;

    use crate::domain::ConnectorStatus;
    use crate::infrastructure::transport::OCPP_SUBPROTOCOL;

    /// Feed events to the engine until one matches `done`.
    async fn apply_until(
        engine: &mut StationEngine,
        events: &mut mpsc::UnboundedReceiver<StationEvent>,
        done: impl Fn(&StationEvent) -> bool,
    ) {
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .expect("event in time")
                .expect("event channel open");
            let finished = done(&event);
            engine.handle_event(event);
            if finished {
                break;
            }
        }
    }

    #[tokio::test]
    async fn build_station_applies_config() {
        let mut config = AppConfig::default();
        config.station.id = "CP042".into();
        config.station.connectors = 3;
        config.server.url = "ws://cs.example:9000/ocpp/".into();
        config.meter_values.auto_interval = 5;
        config.meter_values.auto_value = 50;

        let (tx, _rx) = mpsc::unbounded_channel();
        let engine = build_station(&config, tx);

        assert_eq!(engine.id(), "CP042");
        assert_eq!(engine.connector_number(), 3);
        assert_eq!(engine.url(), "ws://cs.example:9000/ocpp/CP042");
        assert_eq!(
            engine.auto_meter_value_setting().map(|s| (s.interval, s.value)),
            Some((5, 50))
        );
    }

    #[tokio::test]
    async fn shutdown_stops_event_loop() {
        let mut config = AppConfig::default();
        // nothing listens here; the connect attempt just fails
        config.server.url = "ws://127.0.0.1:1".into();

        let handle = StationHandle::start(config);
        assert!(handle.send(StationCommand::StopHeartbeat).is_ok());

        let events = handle.events.clone();
        handle.shutdown().await;
        assert!(events
            .send(StationEvent::Command(StationCommand::StopHeartbeat))
            .is_err());
    }

    #[tokio::test]
    async fn operator_disconnect_leaves_no_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_hdr_async(
                stream,
                |_: &Request, mut response: Response| {
                    response.headers_mut().insert(
                        "Sec-WebSocket-Protocol",
                        HeaderValue::from_static(OCPP_SUBPROTOCOL),
                    );
                    Ok(response)
                },
            )
            .await
            .unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        });

        let mut config = AppConfig::default();
        config.server.url = format!("ws://{}", addr);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut engine = build_station(&config, tx);
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = errors.clone();
        engine.set_on_error(move |e| sink.lock().unwrap().push(e.to_string()));

        engine.connect();
        apply_until(&mut engine, &mut rx, |e| *e == StationEvent::Opened).await;
        assert_eq!(engine.status(), ConnectorStatus::Available);

        engine.disconnect();
        apply_until(&mut engine, &mut rx, |e| matches!(e, StationEvent::Closed { .. })).await;

        assert_eq!(engine.error(), "");
        assert!(errors.lock().unwrap().iter().all(String::is_empty));
        assert_eq!(engine.status(), ConnectorStatus::Unavailable);
    }
}
