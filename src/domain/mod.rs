pub mod boot;
pub mod connector;
pub mod error;
pub mod telemetry;
pub mod transaction;

// Re-export commonly used types
pub use boot::BootPayload;
pub use connector::{Availability, Connector, ConnectorStatus, StationStatus};
pub use error::{StationError, StationResult};
pub use telemetry::{generate, MeterValueFormat, TelemetrySnapshot};
pub use transaction::Transaction;
