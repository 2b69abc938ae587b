//! WebSocket transport to the Central System
//!
//! Each `connect` spawns a connection task. The task owns the socket,
//! pumps queued outbound frames, routes inbound text frames and reports
//! the session's open/close through the station event channel.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::application::events::StationEvent;
use crate::application::ports::{Transport, CLOSE_CODE_NO_STATUS};
use crate::domain::StationError;
use crate::infrastructure::channel::InboundRouter;

/// OCPP 1.6 WebSocket subprotocol
pub const OCPP_SUBPROTOCOL: &str = "ocpp1.6";

/// Close code reported when the socket dropped without a close handshake
pub const CLOSE_CODE_ABNORMAL: u16 = 1006;

/// Reason posted with a station-initiated close, which carries no status code
const LOCAL_CLOSE_REASON: &str = "disconnected by station";

struct Connection {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl Connection {
    fn is_live(&self) -> bool {
        self.stop.is_some() && !self.task.is_finished()
    }
}

pub struct WsTransport {
    url: String,
    station_id: String,
    password: Option<String>,
    events: mpsc::UnboundedSender<StationEvent>,
    outbox: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    router: Arc<InboundRouter>,
    connection: Option<Connection>,
}

impl WsTransport {
    /// `server_url` is the Central System endpoint; the station id is
    /// appended as the last path segment.
    pub fn new(
        server_url: &str,
        station_id: impl Into<String>,
        password: Option<String>,
        events: mpsc::UnboundedSender<StationEvent>,
        outbox: mpsc::UnboundedReceiver<String>,
        router: InboundRouter,
    ) -> Self {
        let station_id = station_id.into();
        Self {
            url: format!("{}/{}", server_url.trim_end_matches('/'), station_id),
            station_id,
            password: password.filter(|p| !p.is_empty()),
            events,
            outbox: Arc::new(Mutex::new(outbox)),
            router: Arc::new(router),
            connection: None,
        }
    }

    fn client_request(&self) -> Result<Request, StationError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| StationError::Transport(e.to_string()))?;

        let headers = request.headers_mut();
        headers.insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(OCPP_SUBPROTOCOL),
        );
        if let Some(password) = &self.password {
            let credentials = STANDARD.encode(format!("{}:{}", self.station_id, password));
            let value = HeaderValue::from_str(&format!("Basic {}", credentials))
                .map_err(|e| StationError::Transport(e.to_string()))?;
            headers.insert("Authorization", value);
        }
        Ok(request)
    }
}

impl Transport for WsTransport {
    fn url(&self) -> &str {
        &self.url
    }

    fn connect(&mut self) {
        if self.connection.as_ref().is_some_and(Connection::is_live) {
            warn!(station_id = self.station_id.as_str(), "Already connected");
            return;
        }

        let request = match self.client_request() {
            Ok(request) => request,
            Err(e) => {
                let _ = self.events.send(StationEvent::Closed {
                    code: CLOSE_CODE_ABNORMAL,
                    reason: e.to_string(),
                });
                return;
            }
        };

        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(run_connection(
            self.station_id.clone(),
            request,
            self.events.clone(),
            self.outbox.clone(),
            self.router.clone(),
            stop_rx,
        ));
        self.connection = Some(Connection {
            stop: Some(stop_tx),
            task,
        });
    }

    fn disconnect(&mut self) {
        let stop = self.connection.as_mut().and_then(|c| c.stop.take());
        match stop {
            Some(stop) => {
                let _ = stop.send(());
            }
            None => debug!(station_id = self.station_id.as_str(), "Not connected"),
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.task.abort();
        }
    }
}

async fn run_connection(
    station_id: String,
    request: Request,
    events: mpsc::UnboundedSender<StationEvent>,
    outbox: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    router: Arc<InboundRouter>,
    mut stop: oneshot::Receiver<()>,
) {
    // waits for a previous connection task to release the queue
    let mut outbox = outbox.lock().await;

    let mut stale = 0usize;
    while outbox.try_recv().is_ok() {
        stale += 1;
    }
    if stale > 0 {
        debug!(station_id = station_id.as_str(), stale, "Discarded frames queued while offline");
    }

    let ws_stream = match tokio_tungstenite::connect_async(request).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            error!(station_id = station_id.as_str(), error = %e, "WebSocket connect failed");
            let _ = events.send(StationEvent::Closed {
                code: CLOSE_CODE_ABNORMAL,
                reason: e.to_string(),
            });
            return;
        }
    };

    info!(station_id = station_id.as_str(), "🔌 Connected to Central System");
    let _ = events.send(StationEvent::Opened);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let (code, reason) = loop {
        tokio::select! {
            frame = outbox.recv() => match frame {
                Some(text) => {
                    debug!(station_id = station_id.as_str(), "-> {}", text);
                    if let Err(e) = ws_sender.send(Message::Text(text)).await {
                        break (CLOSE_CODE_ABNORMAL, e.to_string());
                    }
                }
                None => break (CLOSE_CODE_NO_STATUS, "message channel closed".to_string()),
            },
            msg = ws_receiver.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    debug!(station_id = station_id.as_str(), "<- {}", text);
                    if let Some(reply) = router.route(&text) {
                        if let Err(e) = ws_sender.send(Message::Text(reply)).await {
                            break (CLOSE_CODE_ABNORMAL, e.to_string());
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(station_id = station_id.as_str(), "Close frame received: {:?}", frame);
                    break match frame {
                        Some(frame) => (u16::from(frame.code), frame.reason.into_owned()),
                        None => (CLOSE_CODE_NO_STATUS, String::new()),
                    };
                }
                Some(Ok(Message::Binary(data))) => {
                    warn!(station_id = station_id.as_str(), "Binary message received ({} bytes), ignoring", data.len());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break (CLOSE_CODE_ABNORMAL, e.to_string()),
                None => break (CLOSE_CODE_ABNORMAL, "connection dropped".to_string()),
            },
            _ = &mut stop => {
                while let Ok(text) = outbox.try_recv() {
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender
                    .send(Message::Close(Some(CloseFrame {
                        code: CloseCode::Normal,
                        reason: LOCAL_CLOSE_REASON.into(),
                    })))
                    .await;
                break (CLOSE_CODE_NO_STATUS, LOCAL_CLOSE_REASON.to_string());
            }
        }
    };

    info!(station_id = station_id.as_str(), code, reason = reason.as_str(), "Disconnected");
    let _ = events.send(StationEvent::Closed { code, reason });
}
