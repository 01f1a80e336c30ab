//! Property-based tests for response framing.
//!
//! The bus carries no length prefix, so the only defence against a truncated
//! or padded response is the byte-count check. These properties make sure it
//! never lets a wrong-sized response through.

use proptest::prelude::*;
use tagsense_core::{Error, ReaderStatus};
use tagsense_protocol::{Command, decode_reader_count, decode_statuses, encode_statuses};

/// Strategy for generating statuses a satellite can legitimately report.
fn valid_status() -> impl Strategy<Value = ReaderStatus> {
    prop_oneof![
        Just(ReaderStatus::Absent),
        Just(ReaderStatus::PresentKnownTag),
        Just(ReaderStatus::PresentUnknownTag),
    ]
}

proptest! {
    /// Property: a status response of any length other than the requested
    /// one is a framing error.
    #[test]
    fn prop_status_length_mismatch_is_framing_error(
        response in prop::collection::vec(0u8..=2, 0..64),
        expected in any::<u8>(),
    ) {
        prop_assume!(response.len() != usize::from(expected));
        let is_framing = matches!(
            decode_statuses(&response, expected),
            Err(Error::Framing { .. })
        );
        prop_assert!(is_framing);
    }

    /// Property: a count response of any length other than one is rejected.
    #[test]
    fn prop_reader_count_length_mismatch_is_framing_error(
        response in prop::collection::vec(any::<u8>(), 0..8),
    ) {
        prop_assume!(response.len() != 1);
        let is_framing = matches!(decode_reader_count(&response), Err(Error::Framing { .. }));
        prop_assert!(is_framing);
    }

    /// Property: whatever a satellite encodes, a master expecting that many
    /// readers decodes to the same snapshot.
    #[test]
    fn prop_snapshot_survives_the_wire(
        snapshot in prop::collection::vec(valid_status(), 0..=255),
    ) {
        let wire = encode_statuses(&snapshot);
        let count = u8::try_from(snapshot.len()).unwrap();
        prop_assert_eq!(decode_statuses(&wire, count).unwrap(), snapshot);
    }

    /// Property: every byte either decodes to a command that encodes back to
    /// it, or is reported as unknown.
    #[test]
    fn prop_command_byte_is_total(byte in any::<u8>()) {
        match Command::from_byte(byte) {
            Ok(command) => prop_assert_eq!(command.as_byte(), byte),
            Err(Error::UnknownCommand(b)) => prop_assert_eq!(b, byte),
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }
}
