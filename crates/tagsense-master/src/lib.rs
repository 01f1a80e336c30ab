//! Master side of the tagsense reader network.
//!
//! The master combines its own RFID readers with those of every satellite on
//! the bus into one global verdict: are all tags present, and are they the
//! right ones?
//!
//! # Components
//!
//! - **SlaveProxy**: one satellite, spoken to through a [`BusTransport`]
//! - **SlaveRegistry**: registered satellites in order, keyed by address
//! - **Aggregator**: polling loop, verdict and change notifications
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use tagsense_core::SlaveAddress;
//! use tagsense_hardware::mock::{LoopbackBus, MockReaderBank};
//! use tagsense_master::{Aggregator, MasterConfig, RetryPolicy};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> tagsense_core::Result<()> {
//! let config = MasterConfig {
//!     poll_interval: Duration::from_millis(100),
//!     retry: RetryPolicy::forever(),
//! };
//!
//! let (local, _handle) = MockReaderBank::new(2);
//! let mut master = Aggregator::new(LoopbackBus::new(), local, config)?;
//! master.add_slave(SlaveAddress::new(0x10)?)?;
//! let offline = master.initialize_all(&CancellationToken::new()).await?;
//! println!("{} satellites did not answer", offline.len());
//!
//! if let Some(verdict) = master.poll_cycle().await {
//!     println!("Verdict is now {}", verdict);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`BusTransport`]: tagsense_hardware::BusTransport

mod aggregator;
mod config;
mod proxy;
mod registry;

pub use aggregator::{Aggregator, VerdictChange};
pub use config::{MasterConfig, RetryPolicy};
pub use proxy::{SlaveProxy, SlaveRecord};
pub use registry::SlaveRegistry;
