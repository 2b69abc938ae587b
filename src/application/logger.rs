//! Station logger
//!
//! Writes through `tracing` and forwards every line to one optional
//! subscriber (e.g. a UI log pane).

use chrono::{DateTime, Utc};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
}

/// A forwarded log line
#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

pub type LogSubscriber = Box<dyn FnMut(&LogLine) + Send>;

pub struct StationLogger {
    station_id: String,
    subscriber: Option<LogSubscriber>,
}

impl StationLogger {
    pub fn new(station_id: impl Into<String>) -> Self {
        Self {
            station_id: station_id.into(),
            subscriber: None,
        }
    }

    /// Replace the forwarding hook. Only one subscriber is kept.
    pub fn set_subscriber(&mut self, subscriber: impl FnMut(&LogLine) + Send + 'static) {
        self.subscriber = Some(Box::new(subscriber));
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(station_id = self.station_id.as_str(), "{}", message);
        self.forward(LogLevel::Info, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!(station_id = self.station_id.as_str(), "{}", message);
        self.forward(LogLevel::Error, message);
    }

    fn forward(&mut self, level: LogLevel, message: String) {
        if let Some(subscriber) = self.subscriber.as_mut() {
            subscriber(&LogLine {
                level,
                message,
                timestamp: Utc::now(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn forwards_lines_to_subscriber() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut logger = StationLogger::new("CP001");
        logger.set_subscriber(move |line| {
            let _ = tx.send(line.clone());
        });

        logger.info("booted");
        logger.error("connector 9 not found");

        let first = rx.try_recv().unwrap();
        assert_eq!(first.level, LogLevel::Info);
        assert_eq!(first.message, "booted");
        let second = rx.try_recv().unwrap();
        assert_eq!(second.level, LogLevel::Error);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn logging_without_subscriber_is_fine() {
        let mut logger = StationLogger::new("CP001");
        logger.info("nobody listening");
    }
}
