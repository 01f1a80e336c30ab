use crate::{
    Result,
    constants::{
        MAX_SLAVE_ADDRESS, MIN_SLAVE_ADDRESS, STATUS_ABSENT, STATUS_PRESENT_KNOWN_TAG,
        STATUS_PRESENT_UNKNOWN_TAG,
    },
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 7-bit bus address of a satellite controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlaveAddress(u8);

impl SlaveAddress {
    /// Create a new slave address with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidAddress` if the address is reserved or does not
    /// fit in 7 bits (valid range 0x08-0x77).
    pub fn new(address: u8) -> Result<Self> {
        if !(MIN_SLAVE_ADDRESS..=MAX_SLAVE_ADDRESS).contains(&address) {
            return Err(Error::InvalidAddress(address));
        }
        Ok(SlaveAddress(address))
    }

    /// Get the raw address as u8.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for SlaveAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

impl TryFrom<u8> for SlaveAddress {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        SlaveAddress::new(value)
    }
}

impl From<SlaveAddress> for u8 {
    fn from(address: SlaveAddress) -> Self {
        address.0
    }
}

impl std::str::FromStr for SlaveAddress {
    type Err = Error;

    /// Accepts decimal (`16`) or hex (`0x10`).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => u8::from_str_radix(hex, 16),
            None => s.parse(),
        };
        let value = parsed.map_err(|_| Error::Config(format!("Invalid slave address: {s}")))?;
        SlaveAddress::new(value)
    }
}

/// Tag state of one physical reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ReaderStatus {
    /// No tag in the field.
    #[default]
    Absent = STATUS_ABSENT,
    /// The companion tag is present.
    PresentKnownTag = STATUS_PRESENT_KNOWN_TAG,
    /// Some other tag is present.
    PresentUnknownTag = STATUS_PRESENT_UNKNOWN_TAG,
}

impl ReaderStatus {
    /// Decode a status byte as sent on the bus.
    ///
    /// # Errors
    /// Returns `Error::InvalidReaderStatus` for any byte other than 0, 1 or 2.
    #[inline]
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            STATUS_ABSENT => Ok(ReaderStatus::Absent),
            STATUS_PRESENT_KNOWN_TAG => Ok(ReaderStatus::PresentKnownTag),
            STATUS_PRESENT_UNKNOWN_TAG => Ok(ReaderStatus::PresentUnknownTag),
            _ => Err(Error::InvalidReaderStatus(value)),
        }
    }

    /// Encode the status as a bus byte.
    #[inline]
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Returns `true` if any tag is in the field.
    #[inline]
    #[must_use]
    pub fn is_present(self) -> bool {
        !matches!(self, ReaderStatus::Absent)
    }
}

impl fmt::Display for ReaderStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReaderStatus::Absent => write!(f, "Absent"),
            ReaderStatus::PresentKnownTag => write!(f, "PresentKnownTag"),
            ReaderStatus::PresentUnknownTag => write!(f, "PresentUnknownTag"),
        }
    }
}

/// System-wide verdict over every reader the master can see.
///
/// Only ever produced by [`evaluate_global_status`](crate::evaluate_global_status).
/// Starts as `Missing` because nothing has been seen yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlobalTagStatus {
    /// At least one reader has no tag, or there are no readers at all.
    #[default]
    Missing,
    /// Every reader has a tag, but at least one is the wrong tag.
    Incorrect,
    /// Every reader holds its companion tag.
    Correct,
}

impl GlobalTagStatus {
    /// Returns `true` if the verdict is `Correct`.
    #[inline]
    #[must_use]
    pub fn is_correct(self) -> bool {
        matches!(self, GlobalTagStatus::Correct)
    }
}

impl fmt::Display for GlobalTagStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GlobalTagStatus::Missing => write!(f, "Missing"),
            GlobalTagStatus::Incorrect => write!(f, "Incorrect"),
            GlobalTagStatus::Correct => write!(f, "Correct"),
        }
    }
}
