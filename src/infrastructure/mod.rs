//! Infrastructure layer - external concerns

pub mod channel;
pub mod scheduler;
pub mod shutdown;
pub mod transport;

pub use channel::{InboundRouter, OcppMessageChannel, PendingCall, PendingCalls};
pub use scheduler::{TokioScheduler, VirtualScheduler};
pub use shutdown::{listen_for_ctrl_c, ShutdownSignal};
pub use transport::WsTransport;
