//! Command codes for the master/satellite bus protocol.
//!
//! Each request on the bus is a single byte naming one of three operations.
//! The master writes the byte to a satellite's address, then reads back a
//! response whose length is fixed by the command:
//!
//! | Command            | Code   | Response length            |
//! |--------------------|--------|----------------------------|
//! | `QueryReaderCount` | `0x00` | 1 byte (the count)         |
//! | `QueryStatus`      | `0x01` | N bytes, one per reader    |
//! | `ClearTagCache`    | `0x02` | 0 bytes                    |
//!
//! N is the reader count the *master* last learned for that satellite, not
//! something the satellite announces in the status response itself.
//!
//! # Usage Examples
//!
//! ```
//! use tagsense_protocol::Command;
//!
//! let cmd = Command::from_byte(0x01).unwrap();
//! assert_eq!(cmd, Command::QueryStatus);
//! assert_eq!(cmd.as_byte(), 0x01);
//! assert_eq!(cmd.response_len(4), 4);
//!
//! assert!(Command::from_byte(0x7F).is_err());
//! ```

use std::fmt;
use tagsense_core::{
    Error, Result,
    constants::{
        CLEAR_CACHE_RESPONSE_LEN, CMD_CLEAR_TAG_CACHE, CMD_QUERY_READER_COUNT, CMD_QUERY_STATUS,
        READER_COUNT_RESPONSE_LEN,
    },
};

/// Operations a master can request from a satellite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    QueryReaderCount,
    QueryStatus,
    ClearTagCache,
}

impl Command {
    /// All commands, in code order.
    pub const ALL: [Command; 3] = [
        Command::QueryReaderCount,
        Command::QueryStatus,
        Command::ClearTagCache,
    ];

    /// Decode a command byte.
    ///
    /// # Errors
    /// Returns `Error::UnknownCommand` for any unassigned code.
    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            CMD_QUERY_READER_COUNT => Ok(Command::QueryReaderCount),
            CMD_QUERY_STATUS => Ok(Command::QueryStatus),
            CMD_CLEAR_TAG_CACHE => Ok(Command::ClearTagCache),
            _ => Err(Error::UnknownCommand(byte)),
        }
    }

    pub fn as_byte(&self) -> u8 {
        match self {
            Command::QueryReaderCount => CMD_QUERY_READER_COUNT,
            Command::QueryStatus => CMD_QUERY_STATUS,
            Command::ClearTagCache => CMD_CLEAR_TAG_CACHE,
        }
    }

    /// Stable name used in logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Command::QueryReaderCount => "QueryReaderCount",
            Command::QueryStatus => "QueryStatus",
            Command::ClearTagCache => "ClearTagCache",
        }
    }

    /// Number of bytes the master must read back for this command.
    ///
    /// `known_reader_count` only matters for `QueryStatus`.
    ///
    /// # Example
    /// ```
    /// use tagsense_protocol::Command;
    ///
    /// assert_eq!(Command::QueryReaderCount.response_len(7), 1);
    /// assert_eq!(Command::QueryStatus.response_len(7), 7);
    /// assert_eq!(Command::ClearTagCache.response_len(7), 0);
    /// ```
    #[inline]
    pub fn response_len(&self, known_reader_count: u8) -> usize {
        match self {
            Command::QueryReaderCount => READER_COUNT_RESPONSE_LEN,
            Command::QueryStatus => usize::from(known_reader_count),
            Command::ClearTagCache => CLEAR_CACHE_RESPONSE_LEN,
        }
    }

    /// Returns `true` if the command only reads satellite state.
    #[inline]
    pub fn is_query(&self) -> bool {
        matches!(self, Command::QueryReaderCount | Command::QueryStatus)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl TryFrom<u8> for Command {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self> {
        Command::from_byte(byte)
    }
}
