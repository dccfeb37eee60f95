//! # ESC/POS Lifecycle Commands
//!
//! This module implements the framing commands that wrap every print job:
//! initialize before the image, feed and cut after it.
//!
//! ## Escape Sequence Structure
//!
//! Commands follow these patterns:
//! - Single byte: `LF`
//! - Two bytes: `ESC @`
//! - Multi-byte with parameters: `GS V m`, `GS v 0 m xL xH yL yH data...`
//!
//! ## Byte Order
//!
//! Multi-byte integers use **little-endian** encoding:
//! - `u16` value 0x1234 is sent as bytes `[0x34, 0x12]`

// ============================================================================
// ESCAPE SEQUENCE CONSTANTS
// ============================================================================

/// ESC (Escape) - Command prefix byte
pub const ESC: u8 = 0x1B;

/// GS (Group Separator) - Extended command prefix
///
/// Used for graphics and cutter commands.
/// - Hex: 0x1D, Decimal: 29
pub const GS: u8 = 0x1D;

/// LF (Line Feed) - Print and advance one line
///
/// Prints any data in the line buffer and advances paper by the current
/// line spacing.
pub const LF: u8 = 0x0A;

// ============================================================================
// INITIALIZATION COMMANDS
// ============================================================================

/// # Initialize Printer (ESC @)
///
/// Resets the printer to its power-on default state. Sent at the start of
/// every job; it is also the only way to resynchronise a printer left halfway
/// through a raster image by an aborted transfer.
///
/// ## Protocol Details
///
/// | Format  | Bytes |
/// |---------|-------|
/// | ASCII   | ESC @ |
/// | Hex     | 1B 40 |
/// | Decimal | 27 64 |
///
/// ## Example
///
/// ```
/// use thermoprint::protocol::commands;
///
/// assert_eq!(commands::init(), vec![0x1B, 0x40]);
/// ```
#[inline]
pub fn init() -> Vec<u8> {
    vec![ESC, b'@']
}

// ============================================================================
// PAPER FEED AND CUTTER COMMANDS
// ============================================================================

/// # Feed Lines (LF × n)
///
/// Advances the paper by `n` blank lines.
#[inline]
pub fn feed_lines(n: usize) -> Vec<u8> {
    vec![LF; n]
}

/// # Full Cut (GS V 0)
///
/// ## Protocol Details
///
/// | Format  | Bytes    |
/// |---------|----------|
/// | ASCII   | GS V NUL |
/// | Hex     | 1D 56 00 |
/// | Decimal | 29 86 0  |
///
/// Printers without a cutter ignore it.
#[inline]
pub fn cut_full() -> Vec<u8> {
    vec![GS, b'V', 0]
}

/// # Feed Past the Tear Bar, Then Cut
///
/// Three line feeds move the last printed row past the cutter (or the tear
/// bar on cutterless printers), then a full cut.
///
/// ```
/// use thermoprint::protocol::commands;
///
/// assert_eq!(
///     commands::feed_cut(),
///     vec![0x0A, 0x0A, 0x0A, 0x1D, 0x56, 0x00]
/// );
/// ```
pub fn feed_cut() -> Vec<u8> {
    let mut cmd = feed_lines(3);
    cmd.extend(cut_full());
    cmd
}

// ============================================================================
// HELPERS
// ============================================================================

/// Encode a `u16` as little-endian `[low, high]`.
///
/// ```
/// use thermoprint::protocol::commands::u16_le;
///
/// assert_eq!(u16_le(0x1234), [0x34, 0x12]);
/// assert_eq!(u16_le(576), [0x40, 0x02]); // 576 = 0x0240
/// ```
#[inline]
pub const fn u16_le(value: u16) -> [u8; 2] {
    [value as u8, (value >> 8) as u8]
}

// ============================================================================
// TESTS
// ============================================================================
