//! # Thermal Payload Encoder
//!
//! Packs a [`MonochromeBitmap`] into the complete command sequence for one
//! print:
//!
//! ```text
//! ┌─────────┬────────────────────────┬──────────────────────┬──────────────────┐
//! │ ESC @   │ GS v 0 0 xL xH yL yH   │ packed rows          │ LF LF LF GS V 0  │
//! │ 2 bytes │ 8 bytes                │ (width/8) × height   │ 6 bytes          │
//! └─────────┴────────────────────────┴──────────────────────┴──────────────────┘
//! ```
//!
//! Encoding is pure: the same bitmap always yields the same bytes.

use std::ops::Range;

use super::graphics::{self, RASTER_HEADER_LEN};
use super::commands;
use crate::render::MonochromeBitmap;

/// Length of the initialize command
pub const INIT_LEN: usize = 2;

/// Length of the feed-and-cut trailer
pub const FEED_CUT_LEN: usize = 6;

/// Fixed framing overhead around the packed rows
pub const FRAMING_LEN: usize = INIT_LEN + RASTER_HEADER_LEN + FEED_CUT_LEN;

/// # Thermal Payload
///
/// An immutable, complete printer command sequence. Handed to a transport
/// exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThermalPayload {
    bytes: Vec<u8>,
    width_bytes: u16,
    height: u16,
}

impl ThermalPayload {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Bytes per raster row declared in the header
    #[inline]
    pub fn width_bytes(&self) -> u16 {
        self.width_bytes
    }

    /// Raster rows declared in the header
    #[inline]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Byte range of the packed rows within the payload.
    pub fn raster_range(&self) -> Range<usize> {
        let start = INIT_LEN + RASTER_HEADER_LEN;
        start..self.bytes.len() - FEED_CUT_LEN
    }
}

impl AsRef<[u8]> for ThermalPayload {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Encode a bitmap as `init ++ raster header ++ packed rows ++ feed/cut`.
///
/// ## Example
///
/// ```
/// use thermoprint::printer::PaperWidth;
/// use thermoprint::protocol::payload::encode;
/// use thermoprint::render::MonochromeBitmap;
///
/// let bitmap = MonochromeBitmap::filled(PaperWidth::Mm58, 100, false);
/// let payload = encode(&bitmap);
///
/// assert_eq!(payload.len(), 2 + 8 + 48 * 100 + 6); // 4816
/// assert_eq!(&payload.as_bytes()[2..10], &[0x1D, 0x76, 0x30, 0x00, 48, 0, 100, 0]);
/// ```
pub fn encode(bitmap: &MonochromeBitmap) -> ThermalPayload {
    let width_bytes = bitmap.width_bytes();
    let height = bitmap.height();
    let raster_len = width_bytes as usize * height as usize;

    let mut rows = Vec::with_capacity(raster_len);
    for row in bitmap.packed_rows() {
        rows.extend_from_slice(&row);
    }

    let mut bytes = Vec::with_capacity(FRAMING_LEN + raster_len);
    bytes.extend(commands::init());
    bytes.extend(graphics::raster(width_bytes, height, &rows));
    bytes.extend(commands::feed_cut());

    debug_assert_eq!(bytes.len(), FRAMING_LEN + raster_len);

    ThermalPayload {
        bytes,
        width_bytes,
        height,
    }
}

// ============================================================================
// TESTS
// ============================================================================
