pub mod simulator;
pub mod source;
pub mod types;

pub use simulator::{HealthHandle, HealthSimulator, DEFAULT_HEALTH_INTERVAL};
pub use source::{HealthSource, RandomHealthSource};
pub use types::{HealthSample, HealthSnapshot, StreamStats};
