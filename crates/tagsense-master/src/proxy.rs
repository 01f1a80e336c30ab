//! Master-side stand-in for one satellite.
//!
//! Every command is one addressed write of the command byte followed by one
//! addressed read of the expected response length. Both halves run for every
//! command, including the zero-length read that completes a cache clear.

use crate::config::RetryPolicy;
use serde::Serialize;
use tagsense_core::{
    Error, ReaderStatus, Result, SlaveAddress, TransferPhase, constants::REQUEST_LEN,
};
use tagsense_hardware::traits::BusTransport;
use tagsense_protocol::{
    Command, decode_reader_count, decode_statuses, encode_request, expect_response_len,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// What the master knows about one registered satellite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlaveRecord {
    /// Bus address.
    pub address: SlaveAddress,

    /// Position in the registry, which is also the satellite's place in the
    /// global status vector.
    pub ordinal: usize,

    /// Last reader count the satellite reported; `None` until it answers.
    pub reader_count: Option<u8>,
}

impl SlaveRecord {
    fn new(address: SlaveAddress, ordinal: usize) -> Self {
        Self {
            address,
            ordinal,
            reader_count: None,
        }
    }
}

/// Proxy for one satellite on the bus.
///
/// The proxy does not own the bus; each operation borrows it mutably, which
/// serializes transactions on a shared bus.
///
/// # Example
///
/// ```no_run
/// use tagsense_core::SlaveAddress;
/// use tagsense_hardware::mock::LoopbackBus;
/// use tagsense_master::SlaveProxy;
///
/// # async fn example() -> tagsense_core::Result<()> {
/// let mut bus = LoopbackBus::new();
/// let mut slave = SlaveProxy::new(SlaveAddress::new(0x10)?, 0);
///
/// let count = slave.query_reader_count(&mut bus).await?;
/// let statuses = slave.query_status(&mut bus).await?;
/// assert_eq!(statuses.len(), usize::from(count));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SlaveProxy {
    record: SlaveRecord,
}

impl SlaveProxy {
    /// Create a proxy with an unknown reader count.
    pub fn new(address: SlaveAddress, ordinal: usize) -> Self {
        Self {
            record: SlaveRecord::new(address, ordinal),
        }
    }

    pub fn address(&self) -> SlaveAddress {
        self.record.address
    }

    pub fn ordinal(&self) -> usize {
        self.record.ordinal
    }

    /// Cached reader count, `0` until the satellite has answered.
    pub fn reader_count(&self) -> u8 {
        self.record.reader_count.unwrap_or(0)
    }

    /// True once a reader-count query has succeeded.
    pub fn is_initialized(&self) -> bool {
        self.record.reader_count.is_some()
    }

    pub fn record(&self) -> &SlaveRecord {
        &self.record
    }

    /// Ask the satellite how many readers it has and cache the answer.
    ///
    /// # Errors
    ///
    /// Returns a framing, link or transport error if the exchange fails. The
    /// cached count is left untouched in that case.
    pub async fn query_reader_count<B: BusTransport>(&mut self, bus: &mut B) -> Result<u8> {
        let response = self
            .transact(bus, Command::QueryReaderCount, Command::QueryReaderCount.response_len(0))
            .await?;
        let count = decode_reader_count(&response)?;

        if self.record.reader_count != Some(count) {
            debug!("Slave {} reader count is now {}", self.address(), count);
        }
        self.record.reader_count = Some(count);
        Ok(count)
    }

    /// Read one status per reader, in the satellite's reader order.
    ///
    /// A satellite with no known readers yields an empty list without
    /// touching the bus.
    ///
    /// # Errors
    ///
    /// Returns a framing error if the response length differs from the cached
    /// reader count, or [`Error::InvalidReaderStatus`] if any byte is not a
    /// valid status. No partial list is ever returned.
    pub async fn query_status<B: BusTransport>(&self, bus: &mut B) -> Result<Vec<ReaderStatus>> {
        let count = self.reader_count();
        if count == 0 {
            trace!("Slave {} has no readers, skipping status query", self.address());
            return Ok(Vec::new());
        }

        let response = self
            .transact(bus, Command::QueryStatus, Command::QueryStatus.response_len(count))
            .await?;
        decode_statuses(&response, count)
    }

    /// Tell the satellite to forget which tags its readers have seen.
    ///
    /// # Errors
    ///
    /// Returns a framing, link or transport error if the exchange fails.
    pub async fn clear_tag_cache<B: BusTransport>(&self, bus: &mut B) -> Result<()> {
        self.transact(bus, Command::ClearTagCache, Command::ClearTagCache.response_len(0))
            .await?;
        debug!("Slave {} tag cache cleared", self.address());
        Ok(())
    }

    /// Query the reader count until the satellite answers.
    ///
    /// Communication failures are logged and retried after
    /// `policy.interval`. Cancellation is honoured between attempts and
    /// during the wait.
    ///
    /// # Errors
    ///
    /// * [`Error::Cancelled`] if `cancel` fires first.
    /// * [`Error::InitializationFailed`] once the policy's attempt limit is
    ///   used up.
    pub async fn initialize<B: BusTransport>(
        &mut self,
        bus: &mut B,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<u8> {
        let mut attempts = 0u32;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            attempts = attempts.saturating_add(1);

            match self.query_reader_count(bus).await {
                Ok(count) => {
                    info!(
                        "Slave {} online with {} readers after {} attempt(s)",
                        self.address(),
                        count,
                        attempts
                    );
                    return Ok(count);
                }
                Err(e) if e.is_comms() => {
                    warn!(
                        "Slave {} not answering (attempt {}): {}",
                        self.address(),
                        attempts,
                        e
                    );
                }
                Err(e) => return Err(e),
            }

            if policy.is_exhausted(attempts) {
                error!(
                    "Giving up on slave {} after {} attempts",
                    self.address(),
                    attempts
                );
                return Err(Error::InitializationFailed {
                    address: self.address(),
                    attempts,
                });
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(policy.interval) => {}
            }
        }
    }

    /// One write-then-read exchange with the framing and link checks.
    async fn transact<B: BusTransport>(
        &self,
        bus: &mut B,
        command: Command,
        response_len: usize,
    ) -> Result<Vec<u8>> {
        let address = self.address();
        let request = encode_request(command);

        let report = bus.write(address, &request).await?;
        if report.bytes_written != REQUEST_LEN {
            return Err(Error::framing(
                command.name(),
                TransferPhase::Write,
                REQUEST_LEN,
                report.bytes_written,
            ));
        }
        if !report.is_acknowledged() {
            return Err(Error::Link {
                address,
                status: report.link_status,
            });
        }

        let response = bus.read(address, response_len).await?;
        expect_response_len(command, response_len, response.len())?;

        trace!("{} to {}: {:02x?}", command, address, response);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;
    use tagsense_core::constants::{LINK_NACK_ADDRESS, LINK_OTHER};
    use tagsense_hardware::mock::{BusFault, LoopbackBus, MockReaderBank, Transaction};
    use tagsense_satellite::SatelliteResponder;

    fn addr(value: u8) -> SlaveAddress {
        SlaveAddress::new(value).unwrap()
    }

    fn bus_with(address: u8, statuses: Vec<ReaderStatus>) -> (LoopbackBus, MockReaderBank) {
        let (readers, _handle) = MockReaderBank::with_statuses(statuses);
        let mut bus = LoopbackBus::new();
        bus.attach(
            addr(address),
            Arc::new(SatelliteResponder::new(addr(address), readers.clone())),
        );
        (bus, readers)
    }

    #[tokio::test]
    async fn test_query_reader_count_caches() {
        let (mut bus, _readers) = bus_with(0x10, vec![ReaderStatus::Absent; 3]);
        let mut slave = SlaveProxy::new(addr(0x10), 0);
        assert!(!slave.is_initialized());
        assert_eq!(slave.reader_count(), 0);

        assert_eq!(slave.query_reader_count(&mut bus).await.unwrap(), 3);
        assert!(slave.is_initialized());
        assert_eq!(slave.reader_count(), 3);
    }

    #[tokio::test]
    async fn test_query_status_in_order() {
        let statuses = vec![
            ReaderStatus::PresentKnownTag,
            ReaderStatus::Absent,
            ReaderStatus::PresentUnknownTag,
        ];
        let (mut bus, _readers) = bus_with(0x10, statuses.clone());
        let mut slave = SlaveProxy::new(addr(0x10), 0);
        slave.query_reader_count(&mut bus).await.unwrap();

        assert_eq!(slave.query_status(&mut bus).await.unwrap(), statuses);
    }

    #[tokio::test]
    async fn test_query_status_without_readers_skips_bus() {
        let (mut bus, _readers) = bus_with(0x10, Vec::new());
        let mut slave = SlaveProxy::new(addr(0x10), 0);
        slave.query_reader_count(&mut bus).await.unwrap();
        bus.clear_log();

        assert!(slave.query_status(&mut bus).await.unwrap().is_empty());
        assert!(bus.transactions().is_empty());
    }

    #[tokio::test]
    async fn test_clear_tag_cache_runs_both_phases() {
        let (mut bus, readers) = bus_with(0x10, vec![ReaderStatus::Absent]);
        let slave = SlaveProxy::new(addr(0x10), 0);

        slave.clear_tag_cache(&mut bus).await.unwrap();

        assert_eq!(
            bus.transactions(),
            &[
                Transaction::Write {
                    address: addr(0x10),
                    payload: vec![Command::ClearTagCache.as_byte()],
                },
                Transaction::Read {
                    address: addr(0x10),
                    len: 0,
                },
            ]
        );
        assert_eq!(readers.cache_clear_count(), 1);
    }

    #[tokio::test]
    async fn test_link_error_skips_read() {
        let mut bus = LoopbackBus::new();
        let mut slave = SlaveProxy::new(addr(0x30), 0);

        let err = slave.query_reader_count(&mut bus).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Link { status, .. } if status == LINK_NACK_ADDRESS
        ));
        assert_eq!(bus.transactions().len(), 1);
        assert_eq!(slave.reader_count(), 0);
    }

    #[tokio::test]
    async fn test_custom_link_status_reported() {
        let (mut bus, _readers) = bus_with(0x10, vec![ReaderStatus::Absent]);
        bus.inject_fault(addr(0x10), BusFault::LinkStatus(LINK_OTHER));
        let mut slave = SlaveProxy::new(addr(0x10), 0);

        let err = slave.query_reader_count(&mut bus).await.unwrap_err();
        assert!(matches!(err, Error::Link { status: LINK_OTHER, .. }));
    }

    #[tokio::test]
    async fn test_dropped_write_is_framing() {
        let (mut bus, _readers) = bus_with(0x10, vec![ReaderStatus::Absent]);
        bus.inject_fault(addr(0x10), BusFault::DroppedWrite);
        let mut slave = SlaveProxy::new(addr(0x10), 0);

        let err = slave.query_reader_count(&mut bus).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Framing {
                phase: TransferPhase::Write,
                expected: 1,
                actual: 0,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_padded_count_is_framing() {
        let (mut bus, _readers) = bus_with(0x10, vec![ReaderStatus::Absent]);
        bus.inject_fault(addr(0x10), BusFault::PadResponse);
        let mut slave = SlaveProxy::new(addr(0x10), 0);

        let err = slave.query_reader_count(&mut bus).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Framing {
                phase: TransferPhase::Read,
                expected: 1,
                actual: 2,
                ..
            }
        ));
        assert!(!slave.is_initialized());
    }

    #[tokio::test]
    async fn test_short_status_is_framing() {
        let (mut bus, _readers) = bus_with(0x10, vec![ReaderStatus::PresentKnownTag; 2]);
        let mut slave = SlaveProxy::new(addr(0x10), 0);
        slave.query_reader_count(&mut bus).await.unwrap();
        bus.inject_fault(addr(0x10), BusFault::TruncateResponse);

        let err = slave.query_status(&mut bus).await.unwrap_err();
        assert!(matches!(err, Error::Framing { actual: 1, .. }));
    }

    #[tokio::test]
    async fn test_floating_bus_rejects_whole_status() {
        let (mut bus, _readers) = bus_with(0x10, vec![ReaderStatus::PresentKnownTag; 2]);
        let mut slave = SlaveProxy::new(addr(0x10), 0);
        slave.query_reader_count(&mut bus).await.unwrap();
        bus.inject_fault(addr(0x10), BusFault::FloatingBus);

        let err = slave.query_status(&mut bus).await.unwrap_err();
        assert!(matches!(err, Error::InvalidReaderStatus(0xFF)));
    }

    #[tokio::test]
    async fn test_adapter_failure_is_transport() {
        let (mut bus, _readers) = bus_with(0x10, vec![ReaderStatus::Absent]);
        bus.inject_fault(addr(0x10), BusFault::AdapterFailure);
        let mut slave = SlaveProxy::new(addr(0x10), 0);

        let err = slave.query_reader_count(&mut bus).await.unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_retries_until_online() {
        let (mut bus, _readers) = bus_with(0x10, vec![ReaderStatus::Absent; 4]);
        bus.inject_fault(addr(0x10), BusFault::OfflineFor { remaining: 3 });
        let mut slave = SlaveProxy::new(addr(0x10), 0);
        let started = tokio::time::Instant::now();

        let count = slave
            .initialize(&mut bus, &RetryPolicy::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(count, 4);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_gives_up() {
        let mut bus = LoopbackBus::new();
        let mut slave = SlaveProxy::new(addr(0x10), 0);
        let policy = RetryPolicy::default()
            .with_max_attempts(3)
            .with_interval(Duration::from_millis(100));

        let err = slave
            .initialize(&mut bus, &policy, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InitializationFailed { attempts: 3, .. }));
        assert_eq!(bus.transactions_with(addr(0x10)), 3);
    }

    #[tokio::test]
    async fn test_initialize_already_cancelled() {
        let mut bus = LoopbackBus::new();
        let mut slave = SlaveProxy::new(addr(0x10), 0);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = slave
            .initialize(&mut bus, &RetryPolicy::forever(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(bus.transactions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initialize_cancelled_while_waiting() {
        let mut bus = LoopbackBus::new();
        let mut slave = SlaveProxy::new(addr(0x10), 0);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            trigger.cancel();
        });

        let err = slave
            .initialize(&mut bus, &RetryPolicy::forever(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert_eq!(bus.transactions_with(addr(0x10)), 3);
    }
}
