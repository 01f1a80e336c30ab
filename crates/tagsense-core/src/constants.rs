//! Core constants for the reader bus protocol.
//!
//! This module centralizes the wire codes and timing defaults shared by the
//! master, the satellites and the simulator. Both ends of the bus must agree
//! on these values; changing one side without the other breaks the protocol.
//!
//! # Transaction Shape
//!
//! Every bus transaction is a one-byte addressed write followed by an
//! addressed read whose length depends on the command:
//!
//! ```text
//! master ── [cmd] ──────────────────────► satellite @ addr
//! master ◄────────── [K response bytes] ── satellite @ addr
//!
//!   cmd 0x00 QueryReaderCount   K = 1
//!   cmd 0x01 QueryStatus        K = known reader count
//!   cmd 0x02 ClearTagCache      K = 0
//! ```
//!
//! # Usage
//!
//! ```
//! use tagsense_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(REQUEST_LEN, 1);
//! let retry = Duration::from_millis(DEFAULT_RETRY_INTERVAL_MS);
//! assert_eq!(retry.as_secs(), 1);
//! ```

// ============================================================================
// Command Codes
// ============================================================================

/// Ask a satellite how many readers it owns.
pub const CMD_QUERY_READER_COUNT: u8 = 0x00;

/// Ask a satellite for one status byte per reader.
pub const CMD_QUERY_STATUS: u8 = 0x01;

/// Ask a satellite to forget its cached tag UIDs.
pub const CMD_CLEAR_TAG_CACHE: u8 = 0x02;

// ============================================================================
// Reader Status Codes
// ============================================================================

/// No tag in the reader's field.
pub const STATUS_ABSENT: u8 = 0x00;

/// A tag is present and matches the reader's companion UID.
pub const STATUS_PRESENT_KNOWN_TAG: u8 = 0x01;

/// A tag is present but does not match the companion UID.
pub const STATUS_PRESENT_UNKNOWN_TAG: u8 = 0x02;

// ============================================================================
// Framing
// ============================================================================

/// Every request is exactly one command byte.
pub const REQUEST_LEN: usize = 1;

/// Response length for a reader count query.
pub const READER_COUNT_RESPONSE_LEN: usize = 1;

/// Response length for a cache clear.
pub const CLEAR_CACHE_RESPONSE_LEN: usize = 0;

// ============================================================================
// Bus Addressing
// ============================================================================

/// Lowest usable 7-bit address. 0x00-0x07 are reserved (general call, CBUS, HS mode).
pub const MIN_SLAVE_ADDRESS: u8 = 0x08;

/// Highest usable 7-bit address. 0x78-0x7F are reserved (10-bit addressing).
pub const MAX_SLAVE_ADDRESS: u8 = 0x77;

// ============================================================================
// Link Status Codes
// ============================================================================

/// Write phase acknowledged.
pub const LINK_OK: u8 = 0;

/// Data did not fit the transmit buffer.
pub const LINK_DATA_TOO_LONG: u8 = 1;

/// Address byte was not acknowledged (nobody home).
pub const LINK_NACK_ADDRESS: u8 = 2;

/// Data byte was not acknowledged.
pub const LINK_NACK_DATA: u8 = 3;

/// Any other link failure.
pub const LINK_OTHER: u8 = 4;

// ============================================================================
// Timing Defaults
// ============================================================================

/// Delay between reader count attempts while initializing a satellite.
pub const DEFAULT_RETRY_INTERVAL_MS: u64 = 1000;

/// Attempts per satellite before initialization gives up.
pub const DEFAULT_MAX_INIT_ATTEMPTS: u32 = 10;

/// Period of the master poll loop.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

/// Capacity of status/verdict broadcast channels.
pub const EVENT_CHANNEL_CAPACITY: usize = 32;
