//! Transports to the Central System

pub mod websocket;

pub use websocket::{WsTransport, CLOSE_CODE_ABNORMAL, OCPP_SUBPROTOCOL};
