//! Reduction of per-reader states into one system-wide verdict.
//!
//! The rules, in order of precedence:
//!
//! 1. Any `Absent` reader makes the whole system `Missing`. The scan stops at
//!    the first one, and it overrides an `Incorrect` seen earlier.
//! 2. Otherwise any `PresentUnknownTag` makes it `Incorrect`.
//! 3. Otherwise every reader holds its companion tag: `Correct`.
//!
//! An empty reading set (no local readers and no answering satellites) is
//! `Missing`: with nothing observed the system cannot claim a correct setup.
//!
//! ```
//! use tagsense_core::{GlobalTagStatus, ReaderStatus, evaluate_global_status};
//!
//! let readings = [ReaderStatus::PresentUnknownTag, ReaderStatus::Absent];
//! assert_eq!(evaluate_global_status(&readings), GlobalTagStatus::Missing);
//! ```

use crate::types::{GlobalTagStatus, ReaderStatus};

/// Classify a sequence of reader states.
#[must_use]
pub fn evaluate_global_status(readings: &[ReaderStatus]) -> GlobalTagStatus {
    if readings.is_empty() {
        return GlobalTagStatus::Missing;
    }

    let mut verdict = GlobalTagStatus::Correct;
    for reading in readings {
        match reading {
            ReaderStatus::Absent => return GlobalTagStatus::Missing,
            ReaderStatus::PresentUnknownTag => verdict = GlobalTagStatus::Incorrect,
            ReaderStatus::PresentKnownTag => {}
        }
    }
    verdict
}
