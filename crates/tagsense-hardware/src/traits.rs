//! Collaborator trait definitions.
//!
//! These traits are the seams between the protocol core and the things it
//! does not own: the RFID reader driver and the addressed bus. The core only
//! ever talks to hardware through them, so the mocks in [`crate::mock`] and a
//! real driver are interchangeable.
//!
//! [`BusTransport`] uses native `async fn` methods (Rust 1.90 + Edition 2024
//! RPITIT). [`ReaderStatusProvider`] and [`BusTarget`] are synchronous on
//! purpose: satellite bus callbacks run in an interrupt-like context and must
//! answer without yielding.

#![allow(async_fn_in_trait)]

use std::sync::Arc;

use tagsense_core::{ReaderStatus, SlaveAddress};
use tokio::sync::broadcast;

use crate::error::Result;
use crate::types::{StatusChange, WriteReport};

/// Source of per-reader tag status.
///
/// Implemented by whatever drives the physical readers. The provider runs its
/// own background work (polling readers, debouncing, comparing UIDs) and
/// exposes the latest result here.
///
/// # Consistency
///
/// [`snapshot_statuses`](Self::snapshot_statuses) must return a consistent
/// copy: never a mix of values from before and after a concurrent update.
///
/// # Examples
///
/// ```
/// use tagsense_core::{GlobalTagStatus, evaluate_global_status};
/// use tagsense_hardware::traits::ReaderStatusProvider;
///
/// fn local_verdict<P: ReaderStatusProvider>(readers: &P) -> GlobalTagStatus {
///     evaluate_global_status(&readers.snapshot_statuses())
/// }
/// ```
pub trait ReaderStatusProvider: Send + Sync {
    /// Number of registered readers.
    fn reader_count(&self) -> u8;

    /// Current status of every reader, in registration order.
    ///
    /// The returned vector always has `reader_count()` entries.
    fn snapshot_statuses(&self) -> Vec<ReaderStatus>;

    /// Forget cached tag UIDs so the next read re-identifies every tag.
    fn clear_cache(&self);

    /// Subscribe to per-reader change notifications.
    ///
    /// Notifications are fired by the provider's background work. Slow
    /// receivers may observe `RecvError::Lagged`.
    fn subscribe(&self) -> broadcast::Receiver<StatusChange>;
}

impl<P: ReaderStatusProvider + ?Sized> ReaderStatusProvider for Arc<P> {
    fn reader_count(&self) -> u8 {
        (**self).reader_count()
    }

    fn snapshot_statuses(&self) -> Vec<ReaderStatus> {
        (**self).snapshot_statuses()
    }

    fn clear_cache(&self) {
        (**self).clear_cache()
    }

    fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        (**self).subscribe()
    }
}

/// Master side of an addressed, half-duplex bus.
///
/// A transaction is a [`write`](Self::write) of the request followed by a
/// [`read`](Self::read) of the response. Implementations report what
/// actually happened on the wire and leave judging it to the caller: a short
/// write or a response of unexpected length is returned, not rejected.
///
/// Only hard failures of the adapter itself (device gone, driver timeout)
/// are `Err`.
///
/// # Object Safety
///
/// **NOTE**: This trait is NOT object-safe (`async fn` returns an opaque
/// future). Use it through generic type parameters:
///
/// ```no_run
/// use tagsense_core::SlaveAddress;
/// use tagsense_hardware::traits::BusTransport;
/// use tagsense_hardware::Result;
///
/// async fn ping<B: BusTransport>(bus: &mut B, address: SlaveAddress) -> Result<bool> {
///     let report = bus.write(address, &[0x00]).await?;
///     Ok(report.is_acknowledged())
/// }
/// ```
pub trait BusTransport: Send {
    /// Addressed write. Returns the byte count and link status.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus adapter itself failed.
    async fn write(&mut self, address: SlaveAddress, payload: &[u8]) -> Result<WriteReport>;

    /// Addressed read of `len` bytes. Returns the bytes actually received,
    /// which may be fewer (or, on a misbehaving adapter, more) than asked.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus adapter itself failed.
    async fn read(&mut self, address: SlaveAddress, len: usize) -> Result<Vec<u8>>;
}

/// Slave side of the bus: the two events a satellite receives.
///
/// Both callbacks may fire concurrently with the satellite's own background
/// work, so implementations keep their shared state behind atomics or locks.
/// This trait is object-safe and can be stored as `Arc<dyn BusTarget>`.
pub trait BusTarget: Send + Sync {
    /// The master wrote `payload` to this address.
    fn on_receive(&self, payload: &[u8]);

    /// The master is clocking out a response; return the bytes to send.
    fn on_request(&self) -> Vec<u8>;
}
