//! # ESC/POS Raster Graphics
//!
//! This module implements the raster bit image command (`GS v 0`).
//!
//! ## Coordinate System
//!
//! ```text
//! (0,0) ──────────────────────► X (384 or 576 dots)
//!   │
//!   │   ████████  ← Each dot is ~0.125mm (203 DPI)
//!   │   ████████
//!   ▼
//!   Y (vertical, paper feed direction)
//! ```
//!
//! ## Bit Packing
//!
//! Graphics data is packed as bytes where each bit represents one dot:
//! - Bit 7 (MSB) = leftmost dot
//! - Bit 0 (LSB) = rightmost dot
//! - 1 = black (print), 0 = white (no print)
//!
//! ```text
//! Byte value 0xF0 = 11110000 = ████░░░░
//! Byte value 0x0F = 00001111 = ░░░░████
//! Byte value 0xAA = 10101010 = █░█░█░█░
//! ```

use super::commands::{GS, u16_le};

/// Length of the `GS v 0` header in bytes
pub const RASTER_HEADER_LEN: usize = 8;

/// # Raster Image Header (GS v 0 m xL xH yL yH)
///
/// ## Protocol Details
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | GS v 0 m xL xH yL yH |
/// | Hex     | 1D 76 30 m xL xH yL yH |
/// | Decimal | 29 118 48 m xL xH yL yH |
///
/// ## Parameters
///
/// - `m`: Scaling mode (0 = normal, no double width/height)
/// - `xL, xH`: Width in **bytes**, little-endian
/// - `yL, yH`: Height in dots, little-endian
///
/// The printer then consumes exactly `width_bytes × height` data bytes. A
/// short transfer leaves it waiting for the remainder, swallowing whatever
/// is sent next as pixel data until it is re-initialized.
///
/// ## Example
///
/// ```
/// use thermoprint::protocol::graphics;
///
/// let header = graphics::raster_header(48, 100);
/// assert_eq!(header, [0x1D, 0x76, 0x30, 0x00, 48, 0, 100, 0]);
/// ```
pub fn raster_header(width_bytes: u16, height: u16) -> [u8; RASTER_HEADER_LEN] {
    let [xl, xh] = u16_le(width_bytes);
    let [yl, yh] = u16_le(height);
    [GS, b'v', b'0', 0, xl, xh, yl, yh]
}

/// # Print Raster Bit Image
///
/// Header followed by the packed rows.
///
/// ## Data Layout
///
/// ```text
/// Row 0:    d[0]      d[1]       ... d[width-1]
/// Row 1:    d[width]  d[width+1] ... d[2*width-1]
/// ...
/// Row h-1:  d[(h-1)*width] ... d[h*width-1]
/// ```
pub fn raster(width_bytes: u16, height: u16, data: &[u8]) -> Vec<u8> {
    let expected_len = width_bytes as usize * height as usize;

    debug_assert!(
        data.len() == expected_len,
        "Raster data length mismatch. Expected {} ({} bytes × {} rows), got {}",
        expected_len,
        width_bytes,
        height,
        data.len()
    );

    let mut cmd = Vec::with_capacity(RASTER_HEADER_LEN + data.len());
    cmd.extend_from_slice(&raster_header(width_bytes, height));
    cmd.extend_from_slice(data);
    cmd
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_header() {
        let header = raster_header(72, 100);
        assert_eq!(header[0], 0x1D); // GS
        assert_eq!(header[1], 0x76); // 'v'
        assert_eq!(header[2], 0x30); // '0'
        assert_eq!(header[3], 0x00); // m = normal
        assert_eq!(header[4], 72); // xL
        assert_eq!(header[5], 0); // xH
        assert_eq!(header[6], 100); // yL
        assert_eq!(header[7], 0); // yH
    }

    #[test]
    fn test_raster_large_height() {
        // 500 = 0x01F4 -> [0xF4, 0x01] in little-endian
        let header = raster_header(48, 500);
        assert_eq!(header[6], 0xF4);
        assert_eq!(header[7], 0x01);
    }

    #[test]
    fn test_raster_total_length() {
        let data = vec![0x00; 48 * 10];
        let cmd = raster(48, 10, &data);
        assert_eq!(cmd.len(), RASTER_HEADER_LEN + 48 * 10);
    }

    #[test]
    fn test_raster_preserves_data() {
        let data: Vec<u8> = (0..72 * 50).map(|i| (i % 256) as u8).collect();
        let cmd = raster(72, 50, &data);
        assert_eq!(&cmd[RASTER_HEADER_LEN..], &data[..]);
    }
}
