//! Utility module: errors and logging.

pub mod errors;
pub mod logging;

pub use errors::{HarnessError, Result};
pub use logging::{init_logging, init_test_logging};
