//! # Printer Transport Layer
//!
//! This module provides the communication backends that deliver an encoded
//! payload to a printer.
//!
//! ## Available Transports
//!
//! - [`bluetooth`]: BLE GATT characteristic writes, 20-byte chunks with a
//!   pacing pause
//! - [`usb`]: USB bulk OUT transfers, 64-byte chunks, no pause
//! - [`mock`]: In-memory recorder for tests and dry runs
//!
//! Every backend implements [`PrinterTransport`]. Callers only ever see the
//! trait, never the concrete kind.
//!
//! ## Chunking and Pacing
//!
//! Both backends cut the payload into fixed-size chunks and write them one
//! at a time through [`write_paced`]. The next chunk is never started before
//! the previous write completes, and the first failed write aborts the rest.
//!
//! ```text
//! payload ──► [c0][c1][c2] ... [c19][c20] ... [cN]
//!              │                      │
//!              └─ pause after c0      └─ pause after c20 (offset 400)
//! ```
//!
//! Cheap BLE printer modules have tiny receive buffers and silently drop
//! bytes under sustained back-to-back writes, hence the periodic pause. USB
//! bulk transfers are flow-controlled by the host controller and need none.

pub mod bluetooth;
pub mod mock;
pub mod usb;

pub use bluetooth::BluetoothTransport;
pub use mock::MockTransport;
pub use usb::UsbTransport;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use crate::error::PrintError;

/// Which physical link a connection uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    Bluetooth,
    Usb,
    None,
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bluetooth => write!(f, "bluetooth"),
            Self::Usb => write!(f, "usb"),
            Self::None => write!(f, "none"),
        }
    }
}

/// # Printer Transport
///
/// The capability set every backend offers. Methods take `&mut self`, so a
/// single transport can never have two sends in flight.
#[async_trait]
pub trait PrinterTransport: Send {
    /// Which link this transport drives.
    fn kind(&self) -> ConnectionKind;

    /// Find and open a printer. Returns its display name.
    async fn connect(&mut self) -> Result<String, PrintError>;

    /// Deliver a payload in order, chunk by chunk.
    ///
    /// Runs to completion or to the first failed chunk. There is no rollback:
    /// bytes written before the failure may already have been printed.
    async fn send(&mut self, payload: &[u8]) -> Result<(), PrintError>;

    /// Whether the transport currently holds a writable channel.
    fn is_connected(&self) -> bool;

    /// Release the channel. Safe to call when not connected.
    async fn disconnect(&mut self) -> Result<(), PrintError>;
}

// ============================================================================
// PACING
// ============================================================================

/// Chunk size and pause cadence for one transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Bytes per write
    pub chunk_size: usize,
    /// Pause after the chunk whose starting offset is a multiple of this
    pub pause_every: Option<usize>,
    /// How long each pause lasts
    pub pause: Duration,
}

impl Pacing {
    /// 20-byte writes, 15ms pause after the chunks at offsets 0, 400, 800, ...
    pub const BLUETOOTH: Self = Self {
        chunk_size: 20,
        pause_every: Some(400),
        pause: Duration::from_millis(15),
    };

    /// 64-byte bulk transfers back to back.
    pub const USB: Self = Self {
        chunk_size: 64,
        pause_every: None,
        pause: Duration::ZERO,
    };

    /// Number of writes needed for a payload of `len` bytes.
    #[inline]
    pub fn chunk_count(&self, len: usize) -> usize {
        len.div_ceil(self.chunk_len())
    }

    /// Bytes per write, never zero.
    #[inline]
    pub fn chunk_len(&self) -> usize {
        self.chunk_size.max(1)
    }

    /// Whether to pause after writing the chunk that starts at `offset`.
    #[inline]
    pub fn pauses_after(&self, offset: usize) -> bool {
        match self.pause_every {
            Some(every) if every > 0 && !self.pause.is_zero() => offset % every == 0,
            _ => false,
        }
    }

    /// Starting offsets of every chunk followed by a pause.
    pub fn pause_offsets(&self, len: usize) -> Vec<usize> {
        (0..len)
            .step_by(self.chunk_len())
            .filter(|&offset| self.pauses_after(offset))
            .collect()
    }
}

/// Something that accepts one chunk at a time.
#[async_trait]
pub trait ChunkSink: Send {
    /// Write a single chunk, returning once the link has accepted it.
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), String>;
}

/// Write `payload` to `sink` in order according to `pacing`.
///
/// Returns the number of bytes written. The first failing chunk aborts the
/// loop with [`PrintError::Transport`] carrying that chunk's offset.
pub async fn write_paced<S>(
    sink: &mut S,
    payload: &[u8],
    pacing: &Pacing,
) -> Result<usize, PrintError>
where
    S: ChunkSink + ?Sized,
{
    let total = payload.len();
    let chunk_size = pacing.chunk_len();

    for (index, chunk) in payload.chunks(chunk_size).enumerate() {
        let offset = index * chunk_size;

        sink.write_chunk(chunk)
            .await
            .map_err(|reason| PrintError::Transport {
                offset,
                total,
                reason,
            })?;

        if pacing.pauses_after(offset) {
            debug!("Pacing pause after byte {} of {}", offset + chunk.len(), total);
            tokio::time::sleep(pacing.pause).await;
        }
    }

    Ok(total)
}

// ============================================================================
// TESTS
// ============================================================================
