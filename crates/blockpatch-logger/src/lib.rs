pub mod log;
pub mod severity;
pub mod systime;

pub use crate::log::{init, SeverityLogger};
pub use severity::LogSeverity;
