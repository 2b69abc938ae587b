//! # OCPP Station
//!
//! OCPP 1.6-J charge point runtime: a station engine that models the
//! connectors, transactions and telemetry of a charging station and
//! keeps a Central System informed over WebSocket.
//!
//! ## Architecture
//!
//! - **domain**: connectors, transactions, boot payload, telemetry generation
//! - **application**: the station engine, its events and outbound ports
//! - **infrastructure**: WebSocket transport, OCPP-J channel, schedulers
//! - **support**: OCPP-J frame codec
//! - **config** / **runtime**: TOML configuration and process wiring

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod runtime;
pub mod support;

pub use application::{StationCommand, StationEngine, StationEvent};
pub use config::{default_config_path, AppConfig, ConfigError};
pub use domain::{Availability, ConnectorStatus, MeterValueFormat, StationError};
pub use runtime::{init_tracing, StationHandle};
