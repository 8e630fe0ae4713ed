//! Shared configuration and utilities for the wellness sync engine.

mod clock;
mod config;
mod error;
mod logging;
mod paths;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{Config, SyncTuning, DEFAULT_LOG_LEVEL};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, init_logging_for_service};
pub use paths::Paths;
