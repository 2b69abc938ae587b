//! OCPP-J message channel
//!
//! [`OcppMessageChannel`] frames the station's calls and records them as
//! pending; [`InboundRouter`] matches responses against that record and
//! forwards server-initiated calls to the engine.

pub mod inbound;
pub mod outbound;

pub use inbound::InboundRouter;
pub use outbound::{OcppMessageChannel, PendingCall, PendingCalls};
