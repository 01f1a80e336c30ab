//! Mock reader bank for testing and development.
//!
//! This module provides a simulated set of RFID readers whose tag status can
//! be driven programmatically, standing in for the real reader driver on
//! either side of the bus.

use crate::{
    HardwareError, Result,
    traits::ReaderStatusProvider,
    types::StatusChange,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tagsense_core::{ReaderStatus, constants::EVENT_CHANNEL_CAPACITY};
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// State shared between the bank and its handles.
#[derive(Debug)]
struct BankState {
    /// Reader statuses in registration order.
    statuses: RwLock<Vec<ReaderStatus>>,

    /// Number of cache clears requested.
    cache_clears: AtomicUsize,

    /// Change notifications.
    events: broadcast::Sender<StatusChange>,
}

/// Mock reader bank for testing and development.
///
/// Holds any number of simulated readers, all starting `Absent`. The paired
/// [`MockReaderBankHandle`] plays the role of the driver's background task:
/// it changes statuses and fires notifications.
///
/// # Examples
///
/// ```
/// use tagsense_core::ReaderStatus;
/// use tagsense_hardware::mock::MockReaderBank;
/// use tagsense_hardware::traits::ReaderStatusProvider;
///
/// let (bank, handle) = MockReaderBank::new(2);
/// assert_eq!(bank.reader_count(), 2);
///
/// handle.present_known_tag(1).unwrap();
/// assert_eq!(
///     bank.snapshot_statuses(),
///     vec![ReaderStatus::Absent, ReaderStatus::PresentKnownTag]
/// );
/// ```
#[derive(Debug, Clone)]
pub struct MockReaderBank {
    state: Arc<BankState>,
}

impl MockReaderBank {
    /// Create a bank of `reader_count` readers with no tags present.
    pub fn new(reader_count: u8) -> (Self, MockReaderBankHandle) {
        Self::with_statuses(vec![ReaderStatus::Absent; usize::from(reader_count)])
    }

    /// Create a bank with explicit initial statuses.
    ///
    /// Statuses beyond the 255th are ignored; the bus cannot address them.
    pub fn with_statuses(mut statuses: Vec<ReaderStatus>) -> (Self, MockReaderBankHandle) {
        statuses.truncate(usize::from(u8::MAX));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let state = Arc::new(BankState {
            statuses: RwLock::new(statuses),
            cache_clears: AtomicUsize::new(0),
            events,
        });

        let bank = Self {
            state: Arc::clone(&state),
        };
        let handle = MockReaderBankHandle { state };

        (bank, handle)
    }

    /// Number of times `clear_cache()` has been called.
    ///
    /// This is useful for testing cache clear propagation.
    pub fn cache_clear_count(&self) -> usize {
        self.state.cache_clears.load(Ordering::SeqCst)
    }
}

impl Default for MockReaderBank {
    fn default() -> Self {
        Self::new(0).0
    }
}

impl ReaderStatusProvider for MockReaderBank {
    fn reader_count(&self) -> u8 {
        let statuses = self
            .state
            .statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        // with_statuses/add_reader cap the length at u8::MAX
        statuses.len() as u8
    }

    fn snapshot_statuses(&self) -> Vec<ReaderStatus> {
        self.state
            .statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear_cache(&self) {
        let clears = self.state.cache_clears.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Reader UID cache cleared ({} total)", clears);
    }

    fn subscribe(&self) -> broadcast::Receiver<StatusChange> {
        self.state.events.subscribe()
    }
}

/// Handle for driving a mock reader bank.
///
/// Cloning the handle shares the same readers.
///
/// # Examples
///
/// ```
/// use tagsense_core::ReaderStatus;
/// use tagsense_hardware::mock::MockReaderBank;
/// use tagsense_hardware::traits::ReaderStatusProvider;
///
/// let (bank, handle) = MockReaderBank::new(1);
/// let mut changes = bank.subscribe();
///
/// handle.present_unknown_tag(0).unwrap();
///
/// let change = changes.try_recv().unwrap();
/// assert_eq!(change.reader_index, 0);
/// assert_eq!(change.status, ReaderStatus::PresentUnknownTag);
/// ```
#[derive(Debug, Clone)]
pub struct MockReaderBankHandle {
    state: Arc<BankState>,
}

impl MockReaderBankHandle {
    /// Set the status of one reader.
    ///
    /// A notification is sent only if the status actually changed.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` does not name a registered reader.
    pub fn set_status(&self, index: u8, status: ReaderStatus) -> Result<()> {
        let changed = {
            let mut statuses = self
                .state
                .statuses
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let slot = statuses.get_mut(usize::from(index)).ok_or_else(|| {
                HardwareError::invalid_data(format!("Reader index {} out of range", index))
            })?;
            let changed = *slot != status;
            *slot = status;
            changed
        };

        if changed {
            trace!("Reader {} -> {}", index, status);
            // No subscribers is fine
            let _ = self.state.events.send(StatusChange::new(index, status));
        }
        Ok(())
    }

    /// Replace every status at once.
    ///
    /// The swap happens under one write lock, so no snapshot can observe a
    /// partial update. Notifications are sent for each reader that changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the length differs from the reader count.
    pub fn set_all(&self, statuses: &[ReaderStatus]) -> Result<()> {
        let changes: Vec<StatusChange> = {
            let mut current = self
                .state
                .statuses
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if current.len() != statuses.len() {
                return Err(HardwareError::invalid_data(format!(
                    "Expected {} statuses, got {}",
                    current.len(),
                    statuses.len()
                )));
            }
            let changes = current
                .iter()
                .zip(statuses)
                .enumerate()
                .filter(|(_, (old, new))| old != new)
                .map(|(index, (_, new))| StatusChange::new(index as u8, *new))
                .collect();
            current.copy_from_slice(statuses);
            changes
        };

        for change in changes {
            let _ = self.state.events.send(change);
        }
        Ok(())
    }

    /// Register one more reader, returning its index.
    ///
    /// # Errors
    ///
    /// Returns an error if the bank already has 255 readers.
    pub fn add_reader(&self, status: ReaderStatus) -> Result<u8> {
        let mut statuses = self
            .state
            .statuses
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let index = u8::try_from(statuses.len())
            .ok()
            .filter(|&i| i < u8::MAX)
            .ok_or_else(|| HardwareError::unsupported("more than 255 readers"))?;
        statuses.push(status);
        Ok(index)
    }

    /// Place the reader's companion tag in its field.
    pub fn present_known_tag(&self, index: u8) -> Result<()> {
        self.set_status(index, ReaderStatus::PresentKnownTag)
    }

    /// Place a foreign tag in the reader's field.
    pub fn present_unknown_tag(&self, index: u8) -> Result<()> {
        self.set_status(index, ReaderStatus::PresentUnknownTag)
    }

    /// Remove whatever tag the reader sees.
    pub fn remove_tag(&self, index: u8) -> Result<()> {
        self.set_status(index, ReaderStatus::Absent)
    }

    /// Number of times the bank's cache has been cleared.
    pub fn cache_clear_count(&self) -> usize {
        self.state.cache_clears.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_bank_is_all_absent() {
        let (bank, _handle) = MockReaderBank::new(3);
        assert_eq!(bank.reader_count(), 3);
        assert_eq!(bank.snapshot_statuses(), vec![ReaderStatus::Absent; 3]);
    }

    #[test]
    fn test_default_bank_is_empty() {
        let bank = MockReaderBank::default();
        assert_eq!(bank.reader_count(), 0);
        assert!(bank.snapshot_statuses().is_empty());
    }

    #[test]
    fn test_set_status_out_of_range() {
        let (_bank, handle) = MockReaderBank::new(2);
        let result = handle.set_status(2, ReaderStatus::PresentKnownTag);
        assert!(matches!(result, Err(HardwareError::InvalidData { .. })));
    }

    #[tokio::test]
    async fn test_change_notifications() {
        let (bank, handle) = MockReaderBank::new(2);
        let mut rx = bank.subscribe();

        handle.present_known_tag(0).unwrap();
        // Same status again: no notification
        handle.present_known_tag(0).unwrap();
        handle.present_unknown_tag(1).unwrap();

        let first = rx.recv().await.unwrap();
        assert_eq!(first.reader_index, 0);
        assert_eq!(first.status, ReaderStatus::PresentKnownTag);

        let second = rx.recv().await.unwrap();
        assert_eq!(second.reader_index, 1);
        assert_eq!(second.status, ReaderStatus::PresentUnknownTag);

        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_set_all() {
        let (bank, handle) = MockReaderBank::new(2);
        let mut rx = bank.subscribe();

        handle
            .set_all(&[ReaderStatus::Absent, ReaderStatus::PresentKnownTag])
            .unwrap();
        assert_eq!(
            bank.snapshot_statuses(),
            vec![ReaderStatus::Absent, ReaderStatus::PresentKnownTag]
        );

        // Only reader 1 changed
        let change = rx.try_recv().unwrap();
        assert_eq!(change.reader_index, 1);
        assert!(rx.try_recv().is_err());

        assert!(handle.set_all(&[ReaderStatus::Absent]).is_err());
    }

    #[test]
    fn test_add_reader() {
        let (bank, handle) = MockReaderBank::new(1);
        let index = handle.add_reader(ReaderStatus::PresentKnownTag).unwrap();
        assert_eq!(index, 1);
        assert_eq!(bank.reader_count(), 2);
    }

    #[test]
    fn test_add_reader_capped() {
        let (_bank, handle) = MockReaderBank::new(u8::MAX);
        assert!(handle.add_reader(ReaderStatus::Absent).is_err());
    }

    #[test]
    fn test_clear_cache_counts() {
        let (bank, handle) = MockReaderBank::new(1);
        bank.clear_cache();
        bank.clear_cache();
        assert_eq!(bank.cache_clear_count(), 2);
        assert_eq!(handle.cache_clear_count(), 2);
    }

    #[test]
    fn test_provider_through_arc() {
        let (bank, handle) = MockReaderBank::new(1);
        let shared = Arc::new(bank);
        handle.present_known_tag(0).unwrap();
        assert_eq!(
            ReaderStatusProvider::snapshot_statuses(&shared),
            vec![ReaderStatus::PresentKnownTag]
        );
    }
}
