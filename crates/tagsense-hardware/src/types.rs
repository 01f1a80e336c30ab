//! Common types shared across collaborator implementations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tagsense_core::{ReaderStatus, constants::LINK_OK};

/// Outcome of the write phase of a bus transaction.
///
/// Mirrors what a two-wire driver reports: how many bytes it queued and the
/// link status returned when the transmission ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    /// Bytes accepted by the transmit buffer.
    pub bytes_written: usize,

    /// Link status code (0 = acknowledged).
    pub link_status: u8,
}

impl WriteReport {
    /// A fully acknowledged write of `bytes_written` bytes.
    pub fn acknowledged(bytes_written: usize) -> Self {
        Self {
            bytes_written,
            link_status: LINK_OK,
        }
    }

    /// A write that ended with a non-zero link status.
    pub fn failed(bytes_written: usize, link_status: u8) -> Self {
        Self {
            bytes_written,
            link_status,
        }
    }

    /// Returns `true` if the link acknowledged the write.
    pub fn is_acknowledged(&self) -> bool {
        self.link_status == LINK_OK
    }
}

/// Notification that one reader's status changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    /// Ordinal of the reader within its provider.
    pub reader_index: u8,

    /// Status after the change.
    pub status: ReaderStatus,

    /// When the provider observed the change.
    pub timestamp: DateTime<Utc>,
}

impl StatusChange {
    /// Create a change stamped with the current time.
    pub fn new(reader_index: u8, status: ReaderStatus) -> Self {
        Self {
            reader_index,
            status,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_report() {
        assert!(WriteReport::acknowledged(1).is_acknowledged());

        let nack = WriteReport::failed(1, 2);
        assert!(!nack.is_acknowledged());
        assert_eq!(nack.bytes_written, 1);
    }

    #[test]
    fn test_status_change_serialization() {
        let change = StatusChange::new(3, ReaderStatus::PresentUnknownTag);
        let json = serde_json::to_string(&change).unwrap();
        assert!(json.contains("\"reader_index\":3"));
        assert!(json.contains("\"present_unknown_tag\""));

        let back: StatusChange = serde_json::from_str(&json).unwrap();
        assert_eq!(back, change);
    }
}
