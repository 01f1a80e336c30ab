//! Common test utilities for aggregator integration tests.
//!
//! A [`Rig`] is one master with its local readers plus any number of
//! satellites, all wired through an in-process loopback bus. Each satellite
//! keeps its reader handle so a test can move tags around between polls.
//!
//! ```ignore
//! let mut rig = common::Rig::new(vec![ReaderStatus::Absent]);
//! let a = rig.satellite(0x10, vec![ReaderStatus::PresentKnownTag]);
//! rig.init().await;
//! assert_eq!(rig.master.poll_cycle().await, None);
//! ```

#![allow(dead_code)]

use std::sync::Arc;
use tagsense_core::{ReaderStatus, SlaveAddress};
use tagsense_hardware::mock::{LoopbackBus, MockReaderBank, MockReaderBankHandle};
use tagsense_master::{Aggregator, MasterConfig, RetryPolicy};
use tagsense_satellite::SatelliteResponder;
use tokio_util::sync::CancellationToken;

pub type Master = Aggregator<LoopbackBus, MockReaderBank>;

pub fn addr(value: u8) -> SlaveAddress {
    SlaveAddress::new(value).expect("test address in range")
}

/// Retry quickly and give up after three attempts.
pub fn fast_config() -> MasterConfig {
    MasterConfig {
        retry: RetryPolicy::default()
            .with_max_attempts(3)
            .with_interval(std::time::Duration::from_millis(10)),
        ..MasterConfig::default()
    }
}

pub struct Rig {
    pub master: Master,
    pub local: MockReaderBankHandle,
}

impl Rig {
    pub fn new(local: Vec<ReaderStatus>) -> Self {
        let (readers, handle) = MockReaderBank::with_statuses(local);
        Self {
            master: Aggregator::new(LoopbackBus::new(), readers, fast_config())
                .expect("fast config is valid"),
            local: handle,
        }
    }

    /// Attach a satellite to the bus and register it with the master.
    pub fn satellite(&mut self, address: u8, statuses: Vec<ReaderStatus>) -> MockReaderBankHandle {
        let (readers, handle) = MockReaderBank::with_statuses(statuses);
        self.master.bus_mut().attach(
            addr(address),
            Arc::new(SatelliteResponder::new(addr(address), readers)),
        );
        self.master.add_slave(addr(address)).expect("fresh address");
        handle
    }

    /// Register an address nothing answers on.
    pub fn unreachable(&mut self, address: u8) {
        self.master.add_slave(addr(address)).expect("fresh address");
    }

    /// Initialize every registered satellite.
    pub async fn init(&mut self) {
        let failures = self
            .master
            .initialize_all(&CancellationToken::new())
            .await
            .expect("not cancelled");
        assert!(failures.is_empty(), "satellites did not answer: {:?}", failures);
    }
}
