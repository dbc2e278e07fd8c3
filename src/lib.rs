pub mod config;
pub mod error;
pub mod kernel;
pub mod services;

// Re-export the pieces a caller needs to stand up a device.
pub use config::DeviceConfig;
pub use error::DeviceError;
pub use kernel::event::{AttendanceAction, AttendanceEvent, BrokerEvent};
pub use kernel::reactor::{PublishedEvent, SimulatedDevice};
pub use kernel::registry::BadgeRegistry;
