//! In-process loopback bus for testing and simulation.
//!
//! [`LoopbackBus`] implements the master side of the bus by calling straight
//! into registered [`BusTarget`]s, so a master and any number of satellites
//! can run in one process. Faults can be injected per address to exercise the
//! master's framing and link checks.
//!
//! ```text
//!   Aggregator ──► LoopbackBus ──┬─► 0x10  SatelliteResponder
//!                                ├─► 0x11  SatelliteResponder
//!                                └─► 0x12  (nothing: NACK on address)
//! ```

use crate::{
    HardwareError, Result,
    traits::{BusTarget, BusTransport},
    types::WriteReport,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tagsense_core::{
    SlaveAddress,
    constants::{LINK_NACK_ADDRESS, LINK_NACK_DATA},
};
use tracing::trace;

/// Misbehaviour to inject on one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum BusFault {
    /// Address is never acknowledged, as if the device were unplugged.
    Offline,

    /// The next `remaining` writes are not acknowledged, then the device
    /// recovers.
    OfflineFor { remaining: u32 },

    /// Writes end with this link status.
    LinkStatus(u8),

    /// Writes report zero bytes queued.
    DroppedWrite,

    /// Responses lose their last byte.
    TruncateResponse,

    /// Responses gain one trailing `0xFF` byte.
    PadResponse,

    /// Every response byte reads back as `0xFF` (a floating bus).
    FloatingBus,

    /// The adapter itself fails on any transaction.
    AdapterFailure,

    /// The adapter has been unplugged.
    AdapterDisconnected,

    /// The adapter gives up after `after_ms` without finishing a transaction.
    AdapterTimeout { after_ms: u64 },
}

/// One recorded bus operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transaction {
    /// Write of `payload` to `address`.
    Write {
        address: SlaveAddress,
        payload: Vec<u8>,
    },
    /// Read of `len` bytes from `address`.
    Read { address: SlaveAddress, len: usize },
}

/// In-process bus connecting a master to satellite responders.
///
/// A read returns exactly the bytes the target produced (after faults), not
/// `len` bytes, so a target that answers with the wrong length is visible to
/// the caller's framing checks.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use tagsense_core::SlaveAddress;
/// use tagsense_hardware::mock::LoopbackBus;
/// use tagsense_hardware::traits::{BusTarget, BusTransport};
///
/// struct Echo;
///
/// impl BusTarget for Echo {
///     fn on_receive(&self, _payload: &[u8]) {}
///     fn on_request(&self) -> Vec<u8> {
///         vec![42]
///     }
/// }
///
/// #[tokio::main]
/// async fn main() -> tagsense_hardware::Result<()> {
///     let address = SlaveAddress::new(0x10).unwrap();
///     let mut bus = LoopbackBus::new();
///     bus.attach(address, Arc::new(Echo));
///
///     let report = bus.write(address, &[0x00]).await?;
///     assert!(report.is_acknowledged());
///     assert_eq!(bus.read(address, 1).await?, vec![42]);
///     Ok(())
/// }
/// ```
#[derive(Default)]
pub struct LoopbackBus {
    /// Attached satellites by address.
    targets: HashMap<SlaveAddress, Arc<dyn BusTarget>>,

    /// Injected faults by address.
    faults: HashMap<SlaveAddress, BusFault>,

    /// Every operation, in order.
    log: Vec<Transaction>,
}

impl LoopbackBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a target at `address`, replacing any previous one.
    pub fn attach(&mut self, address: SlaveAddress, target: Arc<dyn BusTarget>) {
        self.targets.insert(address, target);
    }

    /// Detach the target at `address`. Returns `true` if one was attached.
    pub fn detach(&mut self, address: SlaveAddress) -> bool {
        self.targets.remove(&address).is_some()
    }

    /// Inject a fault on `address`, replacing any previous one.
    pub fn inject_fault(&mut self, address: SlaveAddress, fault: BusFault) {
        self.faults.insert(address, fault);
    }

    /// Remove any fault on `address`.
    pub fn clear_fault(&mut self, address: SlaveAddress) {
        self.faults.remove(&address);
    }

    /// Every operation so far.
    pub fn transactions(&self) -> &[Transaction] {
        &self.log
    }

    /// Number of operations addressed to `address`.
    pub fn transactions_with(&self, address: SlaveAddress) -> usize {
        self.log
            .iter()
            .filter(|t| match t {
                Transaction::Write { address: a, .. } | Transaction::Read { address: a, .. } => {
                    *a == address
                }
            })
            .count()
    }

    /// Forget recorded operations.
    pub fn clear_log(&mut self) {
        self.log.clear();
    }

    fn adapter_check(&self, address: SlaveAddress) -> Result<()> {
        match self.faults.get(&address) {
            Some(BusFault::AdapterFailure) => Err(HardwareError::communication(format!(
                "adapter failed addressing {}",
                address
            ))),
            Some(BusFault::AdapterDisconnected) => {
                Err(HardwareError::disconnected("loopback bus adapter"))
            }
            Some(BusFault::AdapterTimeout { after_ms }) => Err(HardwareError::timeout(*after_ms)),
            _ => Ok(()),
        }
    }
}

impl fmt::Debug for LoopbackBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut addresses: Vec<_> = self.targets.keys().collect();
        addresses.sort();
        f.debug_struct("LoopbackBus")
            .field("targets", &addresses)
            .field("faults", &self.faults)
            .field("transactions", &self.log.len())
            .finish()
    }
}

impl BusTransport for LoopbackBus {
    async fn write(&mut self, address: SlaveAddress, payload: &[u8]) -> Result<WriteReport> {
        self.log.push(Transaction::Write {
            address,
            payload: payload.to_vec(),
        });
        self.adapter_check(address)?;

        let Some(target) = self.targets.get(&address) else {
            trace!("No target at {}", address);
            return Ok(WriteReport::failed(payload.len(), LINK_NACK_ADDRESS));
        };

        match self.faults.get_mut(&address) {
            Some(BusFault::Offline) => {
                return Ok(WriteReport::failed(payload.len(), LINK_NACK_ADDRESS));
            }
            Some(BusFault::OfflineFor { remaining }) => {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Ok(WriteReport::failed(payload.len(), LINK_NACK_ADDRESS));
                }
                self.faults.remove(&address);
            }
            Some(BusFault::LinkStatus(status)) => {
                return Ok(WriteReport::failed(payload.len(), *status));
            }
            Some(BusFault::DroppedWrite) => {
                return Ok(WriteReport::failed(0, LINK_NACK_DATA));
            }
            _ => {}
        }

        target.on_receive(payload);
        Ok(WriteReport::acknowledged(payload.len()))
    }

    async fn read(&mut self, address: SlaveAddress, len: usize) -> Result<Vec<u8>> {
        self.log.push(Transaction::Read { address, len });
        self.adapter_check(address)?;

        let Some(target) = self.targets.get(&address) else {
            return Ok(Vec::new());
        };

        let fault = self.faults.get(&address).copied();
        if matches!(fault, Some(BusFault::Offline)) {
            return Ok(Vec::new());
        }

        let mut response = target.on_request();
        match fault {
            Some(BusFault::TruncateResponse) => {
                response.pop();
            }
            Some(BusFault::PadResponse) => response.push(0xFF),
            Some(BusFault::FloatingBus) => response.iter_mut().for_each(|b| *b = 0xFF),
            _ => {}
        }

        trace!("Read {} of {} bytes from {}", response.len(), len, address);
        Ok(response)
    }
}
