//! Satellite side of the reader bus.
//!
//! A satellite owns some readers and answers the master's requests about
//! them. All of the protocol logic lives in [`SatelliteResponder`]; wiring it
//! to a bus is a matter of handing an `Arc` of it to the bus as a
//! [`BusTarget`](tagsense_hardware::BusTarget).
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use tagsense_core::SlaveAddress;
//! use tagsense_hardware::mock::{LoopbackBus, MockReaderBank};
//! use tagsense_satellite::SatelliteResponder;
//!
//! let address = SlaveAddress::new(0x10).unwrap();
//! let (readers, _handle) = MockReaderBank::new(3);
//! let responder = Arc::new(SatelliteResponder::new(address, readers));
//!
//! let mut bus = LoopbackBus::new();
//! bus.attach(address, responder.clone());
//! ```

pub mod responder;

pub use responder::{ResponderStats, SatelliteResponder};
