//! Collaborator abstraction layer for the tagsense reader network.
//!
//! This crate provides trait-based abstractions for the two things the
//! protocol core depends on but does not implement: the RFID reader driver
//! and the addressed bus between master and satellites. Mock implementations
//! let the whole system run in one process for development and testing.
//!
//! # Design Philosophy
//!
//! - **Async where the master waits**: [`BusTransport`] uses native `async fn`
//!   in traits (Rust 1.90 + Edition 2024 RPITIT).
//! - **Sync where the satellite must answer now**: [`BusTarget`] and
//!   [`ReaderStatusProvider`] are plain methods, callable from an
//!   interrupt-like bus callback.
//! - **Thread-safe**: all traits require `Send` (and `Sync` where shared).
//! - **Error-aware**: adapter failures are [`HardwareError`]s; protocol-level
//!   judgement (byte counts, link status) is left to the caller.
//!
//! # Traits
//!
//! ## Reader Status Provider
//!
//! ```
//! use tagsense_core::ReaderStatus;
//! use tagsense_hardware::mock::MockReaderBank;
//! use tagsense_hardware::traits::ReaderStatusProvider;
//!
//! let (bank, handle) = MockReaderBank::new(2);
//! handle.present_known_tag(0).unwrap();
//!
//! let snapshot = bank.snapshot_statuses();
//! assert_eq!(snapshot.len(), usize::from(bank.reader_count()));
//! assert_eq!(snapshot[0], ReaderStatus::PresentKnownTag);
//! ```
//!
//! ## Bus Transport
//!
//! ```no_run
//! use tagsense_core::SlaveAddress;
//! use tagsense_hardware::traits::BusTransport;
//! use tagsense_hardware::Result;
//!
//! async fn read_one<B: BusTransport>(bus: &mut B, address: SlaveAddress) -> Result<Vec<u8>> {
//!     bus.write(address, &[0x00]).await?;
//!     bus.read(address, 1).await
//! }
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`][error::Result] using
//! [`HardwareError`], which converts into `tagsense_core::Error::Transport`.
//!
//! [`BusTransport`]: traits::BusTransport
//! [`BusTarget`]: traits::BusTarget
//! [`ReaderStatusProvider`]: traits::ReaderStatusProvider

pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{HardwareError, Result};
pub use traits::{BusTarget, BusTransport, ReaderStatusProvider};
pub use types::{StatusChange, WriteReport};
