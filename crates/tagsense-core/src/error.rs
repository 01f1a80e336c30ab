use std::fmt;

use thiserror::Error;

use crate::types::SlaveAddress;

/// Which half of a bus transaction went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    /// Master to satellite (the command byte).
    Write,
    /// Satellite to master (the response bytes).
    Read,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransferPhase::Write => write!(f, "write"),
            TransferPhase::Read => write!(f, "read"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    // Bus errors
    #[error("Framing error on {phase} of {command}: expected {expected} bytes, got {actual}")]
    Framing {
        command: &'static str,
        phase: TransferPhase,
        expected: usize,
        actual: usize,
    },

    #[error("Link error talking to slave {address}: status {status}")]
    Link { address: SlaveAddress, status: u8 },

    #[error("Invalid reader status byte: {0:#04x}")]
    InvalidReaderStatus(u8),

    #[error("Transport error: {0}")]
    Transport(String),

    // Protocol errors
    #[error("Unknown command code: {0:#04x}")]
    UnknownCommand(u8),

    #[error("No command pending")]
    NoPendingCommand,

    // Registry errors
    #[error("Slave {0} is not registered")]
    UnregisteredSlave(SlaveAddress),

    #[error("Slave {0} is already registered")]
    DuplicateSlave(SlaveAddress),

    #[error("Invalid slave address: {0:#04x}")]
    InvalidAddress(u8),

    // Initialization errors
    #[error("Slave {address} did not answer after {attempts} attempts")]
    InitializationFailed { address: SlaveAddress, attempts: u32 },

    #[error("Operation cancelled")]
    Cancelled,

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for a byte-count mismatch.
    pub fn framing(
        command: &'static str,
        phase: TransferPhase,
        expected: usize,
        actual: usize,
    ) -> Self {
        Self::Framing {
            command,
            phase,
            expected,
            actual,
        }
    }

    /// Returns `true` for failures of a single bus transaction.
    ///
    /// These are the errors a poll cycle absorbs by dropping the affected
    /// slave's contribution, and the ones initialization retries on.
    #[must_use]
    pub fn is_comms(&self) -> bool {
        matches!(
            self,
            Error::Framing { .. }
                | Error::Link { .. }
                | Error::InvalidReaderStatus(_)
                | Error::Transport(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
