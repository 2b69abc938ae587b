pub mod outbound;

pub use outbound::{
    MessageChannel, Scheduler, TimerHandle, TimerKind, TimerTick, Transport, CLOSE_CODE_NO_STATUS,
};
