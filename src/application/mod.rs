pub mod events;
pub mod logger;
pub mod observers;
pub mod ports;
pub mod station;

// Re-export key types for convenience
pub use events::{ServerRequest, StationCommand, StationEvent};
pub use logger::{LogLevel, LogLine, StationLogger};
pub use ports::{
    MessageChannel, Scheduler, TimerHandle, TimerKind, TimerTick, Transport, CLOSE_CODE_NO_STATUS,
};
pub use station::{AutoMeterValueSetting, StationEngine, StationIo, DEFAULT_HEARTBEAT_INTERVAL_SECS};
