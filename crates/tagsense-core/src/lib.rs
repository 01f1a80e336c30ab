pub mod constants;
pub mod error;
pub mod types;
pub mod verdict;

pub use error::{Error, Result, TransferPhase};
pub use types::*;
pub use verdict::evaluate_global_status;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
