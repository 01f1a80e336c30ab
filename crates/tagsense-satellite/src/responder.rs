//! Bus responder for a satellite controller.
//!
//! The responder is a two-event state machine. The only state is the
//! *pending command*: the last valid command byte the master wrote.
//!
//! # Events
//!
//! - **Receive** (`on_receive`): the master wrote a payload. Exactly one valid
//!   command byte becomes the pending command. Anything else (a different
//!   length, an unassigned code) is logged and clears the pending command so
//!   a stale request is never answered for a garbled one.
//! - **Request** (`on_request`): the master is reading. The answer is built
//!   from the pending command and the local readers:
//!
//! | Pending            | Response                                  |
//! |--------------------|-------------------------------------------|
//! | `QueryReaderCount` | `[count]`                                 |
//! | `QueryStatus`      | one status byte per reader                |
//! | `ClearTagCache`    | nothing (the cache is cleared)            |
//! | unset              | nothing (logged as an unknown command)    |
//!
//! The pending command is not consumed by a response: a master that reads
//! twice gets two answers to the same question.
//!
//! # Concurrency
//!
//! Both events arrive from the bus while the reader driver keeps updating
//! statuses in the background. The pending command is an atomic, and status
//! snapshots are taken through the provider's lock, so a response never sees
//! a half-written status array.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use serde::Serialize;
use tagsense_core::{Error, Result, SlaveAddress, TransferPhase, constants::REQUEST_LEN};
use tagsense_hardware::{BusTarget, ReaderStatusProvider};
use tagsense_protocol::{Command, encode_statuses};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Stored in the pending cell when no valid command is pending. Not a
/// command code.
const NO_COMMAND: u8 = 0xFF;

/// Counters describing what the responder has done.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResponderStats {
    /// Valid commands received.
    pub commands_received: u64,

    /// Payloads rejected on receive (wrong length or unassigned code).
    pub rejected_payloads: u64,

    /// Responses built from a valid pending command.
    pub responses_sent: u64,

    /// Reads answered with nothing because no command was pending.
    pub unknown_requests: u64,
}

#[derive(Debug, Default)]
struct Counters {
    commands_received: AtomicU64,
    rejected_payloads: AtomicU64,
    responses_sent: AtomicU64,
    unknown_requests: AtomicU64,
}

/// Answers master requests on behalf of one satellite's readers.
///
/// # Examples
///
/// ```
/// use tagsense_core::{ReaderStatus, SlaveAddress};
/// use tagsense_hardware::mock::MockReaderBank;
/// use tagsense_protocol::Command;
/// use tagsense_satellite::SatelliteResponder;
///
/// let (readers, handle) = MockReaderBank::new(2);
/// handle.present_known_tag(0).unwrap();
///
/// let responder = SatelliteResponder::new(SlaveAddress::new(0x10).unwrap(), readers);
///
/// responder.handle_receive(&[Command::QueryStatus.as_byte()]).unwrap();
/// assert_eq!(responder.handle_request().unwrap(), vec![1, 0]);
/// ```
#[derive(Debug)]
pub struct SatelliteResponder<P> {
    /// Address this satellite answers on.
    address: SlaveAddress,

    /// Local readers.
    provider: P,

    /// Raw code of the pending command, or `NO_COMMAND`.
    pending: AtomicU8,

    counters: Counters,
}

impl<P: ReaderStatusProvider> SatelliteResponder<P> {
    /// Create a responder with no pending command.
    pub fn new(address: SlaveAddress, provider: P) -> Self {
        info!(
            "Satellite {} serving {} readers",
            address,
            provider.reader_count()
        );
        Self {
            address,
            provider,
            pending: AtomicU8::new(NO_COMMAND),
            counters: Counters::default(),
        }
    }

    /// Address this satellite answers on.
    pub fn address(&self) -> SlaveAddress {
        self.address
    }

    /// Number of local readers.
    pub fn reader_count(&self) -> u8 {
        self.provider.reader_count()
    }

    /// The local reader provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The command the next read will answer, if any.
    pub fn pending_command(&self) -> Option<Command> {
        match self.pending.load(Ordering::Acquire) {
            NO_COMMAND => None,
            code => Command::from_byte(code).ok(),
        }
    }

    /// Counter snapshot.
    pub fn stats(&self) -> ResponderStats {
        ResponderStats {
            commands_received: self.counters.commands_received.load(Ordering::Relaxed),
            rejected_payloads: self.counters.rejected_payloads.load(Ordering::Relaxed),
            responses_sent: self.counters.responses_sent.load(Ordering::Relaxed),
            unknown_requests: self.counters.unknown_requests.load(Ordering::Relaxed),
        }
    }

    /// Process a payload written by the master.
    ///
    /// # Errors
    /// - `Error::Framing` if the payload is not exactly one byte
    /// - `Error::UnknownCommand` if the byte is not a command code
    ///
    /// Either way the pending command is cleared.
    pub fn handle_receive(&self, payload: &[u8]) -> Result<Command> {
        let parsed = match payload {
            [byte] => Command::from_byte(*byte),
            _ => Err(Error::framing(
                "request",
                TransferPhase::Write,
                REQUEST_LEN,
                payload.len(),
            )),
        };

        match parsed {
            Ok(command) => {
                self.pending.store(command.as_byte(), Ordering::Release);
                self.counters
                    .commands_received
                    .fetch_add(1, Ordering::Relaxed);
                debug!("Satellite {} pending {}", self.address, command);
                Ok(command)
            }
            Err(e) => {
                self.pending.store(NO_COMMAND, Ordering::Release);
                self.counters
                    .rejected_payloads
                    .fetch_add(1, Ordering::Relaxed);
                Err(e)
            }
        }
    }

    /// Build the response for the pending command.
    ///
    /// # Errors
    /// Returns `Error::NoPendingCommand` if no valid command is pending.
    pub fn handle_request(&self) -> Result<Vec<u8>> {
        let Some(command) = self.pending_command() else {
            self.counters
                .unknown_requests
                .fetch_add(1, Ordering::Relaxed);
            return Err(Error::NoPendingCommand);
        };

        let response = match command {
            Command::QueryReaderCount => vec![self.provider.reader_count()],
            Command::QueryStatus => encode_statuses(&self.provider.snapshot_statuses()),
            Command::ClearTagCache => {
                info!("Satellite {} clearing tag cache", self.address);
                if self.provider.reader_count() > 0 {
                    self.provider.clear_cache();
                }
                Vec::new()
            }
        };

        self.counters.responses_sent.fetch_add(1, Ordering::Relaxed);
        debug!(
            "Satellite {} answered {} with {} bytes",
            self.address,
            command,
            response.len()
        );
        Ok(response)
    }

    /// Log every status change from the local readers until cancelled.
    ///
    /// This is the satellite's view of the driver's on-change callback. It
    /// does not feed responses; those always read a fresh snapshot.
    pub async fn watch_changes(&self, cancel: CancellationToken) {
        let mut changes = self.provider.subscribe();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = changes.recv() => match received {
                    Ok(change) => info!(
                        "Satellite {} reader {} is now {}",
                        self.address, change.reader_index, change.status
                    ),
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Satellite {} missed {} status changes", self.address, missed);
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        debug!("Satellite {} stopped watching readers", self.address);
    }
}

impl<P: ReaderStatusProvider> BusTarget for SatelliteResponder<P> {
    fn on_receive(&self, payload: &[u8]) {
        if let Err(e) = self.handle_receive(payload) {
            warn!("Satellite {} rejected payload {:02X?}: {}", self.address, payload, e);
        }
    }

    fn on_request(&self) -> Vec<u8> {
        self.handle_request().unwrap_or_else(|e| {
            warn!("Satellite {} has nothing to answer: {}", self.address, e);
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagsense_core::ReaderStatus;
    use tagsense_hardware::mock::{MockReaderBank, MockReaderBankHandle};

    fn responder(readers: u8) -> (SatelliteResponder<MockReaderBank>, MockReaderBankHandle) {
        let (bank, handle) = MockReaderBank::new(readers);
        let address = SlaveAddress::new(0x10).unwrap();
        (SatelliteResponder::new(address, bank), handle)
    }

    #[test]
    fn test_starts_with_nothing_pending() {
        let (responder, _handle) = responder(2);
        assert_eq!(responder.pending_command(), None);
        assert!(matches!(
            responder.handle_request(),
            Err(Error::NoPendingCommand)
        ));
        assert_eq!(responder.stats().unknown_requests, 1);
    }

    #[test]
    fn test_stats_serialize() {
        let (responder, _handle) = responder(1);
        responder.handle_receive(&[0x00]).unwrap();
        responder.handle_request().unwrap();
        assert!(responder.handle_receive(&[0x42]).is_err());
        assert!(responder.handle_request().is_err());

        let json = serde_json::to_value(responder.stats()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "commands_received": 1,
                "rejected_payloads": 1,
                "responses_sent": 1,
                "unknown_requests": 1,
            })
        );
    }

    #[test]
    fn test_reader_count_response() {
        let (responder, _handle) = responder(3);
        responder.handle_receive(&[0x00]).unwrap();
        assert_eq!(responder.handle_request().unwrap(), vec![3]);
    }

    #[test]
    fn test_status_response_in_reader_order() {
        let (responder, handle) = responder(3);
        handle.present_unknown_tag(0).unwrap();
        handle.present_known_tag(2).unwrap();

        responder.handle_receive(&[0x01]).unwrap();
        assert_eq!(responder.handle_request().unwrap(), vec![2, 0, 1]);
    }

    #[test]
    fn test_status_response_reflects_latest_values() {
        let (responder, handle) = responder(1);
        responder.handle_receive(&[0x01]).unwrap();
        assert_eq!(responder.handle_request().unwrap(), vec![0]);

        handle.present_known_tag(0).unwrap();
        // Pending command survives the previous answer
        assert_eq!(responder.handle_request().unwrap(), vec![1]);
    }

    #[test]
    fn test_clear_cache_is_a_valid_command() {
        let (responder, handle) = responder(2);
        responder.handle_receive(&[0x02]).unwrap();

        assert!(responder.handle_request().unwrap().is_empty());
        assert_eq!(handle.cache_clear_count(), 1);

        let stats = responder.stats();
        assert_eq!(stats.unknown_requests, 0);
        assert_eq!(stats.responses_sent, 1);
    }

    #[test]
    fn test_clear_cache_without_readers_skips_provider() {
        let (responder, handle) = responder(0);
        responder.handle_receive(&[0x02]).unwrap();
        assert!(responder.handle_request().unwrap().is_empty());
        assert_eq!(handle.cache_clear_count(), 0);
    }

    #[test]
    fn test_unknown_byte_clears_pending() {
        let (responder, _handle) = responder(1);
        responder.handle_receive(&[0x01]).unwrap();

        let result = responder.handle_receive(&[0x42]);
        assert!(matches!(result, Err(Error::UnknownCommand(0x42))));
        assert_eq!(responder.pending_command(), None);
        assert!(responder.handle_request().is_err());
    }

    #[test]
    fn test_wrong_payload_length_rejected() {
        let (responder, _handle) = responder(1);
        assert!(matches!(
            responder.handle_receive(&[0x00, 0x01]),
            Err(Error::Framing { .. })
        ));
        assert!(matches!(
            responder.handle_receive(&[]),
            Err(Error::Framing { .. })
        ));
        assert_eq!(responder.stats().rejected_payloads, 2);
        assert_eq!(responder.pending_command(), None);
    }

    #[test]
    fn test_bus_target_swallows_errors() {
        let (responder, _handle) = responder(1);
        responder.on_receive(&[0x99]);
        assert!(responder.on_request().is_empty());
    }

    #[tokio::test]
    async fn test_watch_changes_stops_on_cancel() {
        let (responder, handle) = responder(1);
        let cancel = CancellationToken::new();

        let watcher = responder.watch_changes(cancel.clone());
        let driver = async {
            handle.set_status(0, ReaderStatus::PresentKnownTag).unwrap();
            tokio::task::yield_now().await;
            cancel.cancel();
        };

        tokio::join!(watcher, driver);
        assert!(cancel.is_cancelled());
    }
}
