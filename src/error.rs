//! # Error Types
//!
//! This module defines the error type used throughout the thermoprint library.
//!
//! The first four variants form the print pipeline's taxonomy and are always
//! surfaced to the caller unmodified. Nothing in the library retries.

use thiserror::Error;

/// Main error type for thermoprint operations
#[derive(Debug, Error)]
pub enum PrintError {
    /// Malformed surface dimensions or pixel buffer
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Device discovery or handshake failed (no matching service, no
    /// writable characteristic, no bulk OUT endpoint, pairing declined)
    #[error("Connection error: {0}")]
    Connection(String),

    /// A print was attempted with no active, ready connection
    #[error("Printer not connected")]
    NotConnected,

    /// A chunk write failed mid-stream. Bytes before `offset` may already
    /// have reached the printer.
    #[error("Transport error at byte {offset} of {total}: {reason}")]
    Transport {
        offset: usize,
        total: usize,
        reason: String,
    },

    /// Image decoding or encoding error
    #[error("Image error: {0}")]
    Image(String),

    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PrintError {
    /// Whether this error left the printer connection unusable.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}
