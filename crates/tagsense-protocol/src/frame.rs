//! Byte-level framing for requests and responses.
//!
//! There are no headers, delimiters or checksums on this bus: a frame is
//! valid if and only if it has exactly the expected number of bytes and every
//! byte decodes. A response of the wrong length is never interpreted
//! positionally; it is rejected whole.
//!
//! # Wire Format
//!
//! ```text
//! request           [cmd]
//! reader count      [n]
//! status (n = 3)    [s0][s1][s2]      s = 0 absent, 1 known tag, 2 unknown tag
//! cache clear       (empty)
//! ```
//!
//! # Basic Usage
//! ```
//! use tagsense_core::ReaderStatus;
//! use tagsense_protocol::{Command, decode_statuses, encode_request, encode_statuses};
//!
//! assert_eq!(encode_request(Command::QueryStatus), [0x01]);
//!
//! let wire = encode_statuses(&[ReaderStatus::PresentKnownTag, ReaderStatus::Absent]);
//! assert_eq!(wire, vec![0x01, 0x00]);
//!
//! let decoded = decode_statuses(&wire, 2).unwrap();
//! assert_eq!(decoded[1], ReaderStatus::Absent);
//!
//! // Three bytes when two were requested is a framing error, not a partial result
//! assert!(decode_statuses(&[1, 1, 1], 2).is_err());
//! ```

use crate::commands::Command;
use tagsense_core::{Error, ReaderStatus, Result, TransferPhase, constants::REQUEST_LEN};

/// Build the single-byte request for a command.
#[inline]
pub fn encode_request(command: Command) -> [u8; REQUEST_LEN] {
    [command.as_byte()]
}

/// Check that a response carries exactly `expected` bytes.
///
/// # Errors
/// Returns `Error::Framing` (read phase) on any mismatch.
pub fn expect_response_len(command: Command, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::framing(
            command.name(),
            TransferPhase::Read,
            expected,
            actual,
        ));
    }
    Ok(())
}

/// Decode the response to `QueryReaderCount`.
///
/// # Errors
/// Returns `Error::Framing` unless the response is exactly one byte.
pub fn decode_reader_count(response: &[u8]) -> Result<u8> {
    let command = Command::QueryReaderCount;
    expect_response_len(command, command.response_len(0), response.len())?;
    Ok(response[0])
}

/// Decode the response to `QueryStatus`.
///
/// # Errors
/// - `Error::Framing` if the length differs from `expected_readers`
/// - `Error::InvalidReaderStatus` if any byte is not a status code; the
///   statuses that did decode are discarded too
pub fn decode_statuses(response: &[u8], expected_readers: u8) -> Result<Vec<ReaderStatus>> {
    let command = Command::QueryStatus;
    expect_response_len(
        command,
        command.response_len(expected_readers),
        response.len(),
    )?;

    response
        .iter()
        .map(|&byte| ReaderStatus::from_u8(byte))
        .collect()
}

/// Encode a status snapshot, one byte per reader in ordinal order.
pub fn encode_statuses(statuses: &[ReaderStatus]) -> Vec<u8> {
    statuses.iter().map(|status| status.to_u8()).collect()
}
