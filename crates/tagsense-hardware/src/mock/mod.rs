//! Mock collaborator implementations for testing and development.
//!
//! This module provides simulated readers and an in-process bus that can be
//! controlled programmatically without requiring physical hardware.

pub mod bus;
pub mod readers;

// Re-export commonly used types
pub use bus::{BusFault, LoopbackBus, Transaction};
pub use readers::{MockReaderBank, MockReaderBankHandle};
