pub mod format;
pub mod log;
pub mod model;

pub use format::{format_bytes, format_duration};
pub use log::{EventLog, DEFAULT_LOG_CAPACITY};
pub use model::{order_by_started, ConnectionView, ServerState, StateError};
