//! # Printer Configuration
//!
//! This module defines paper widths and the tunables for a print run.
//!
//! ## Supported Paper
//!
//! | Paper | Width (dots) | Width (bytes) | Resolution |
//! |-------|--------------|---------------|------------|
//! | 58mm  | 384 | 48 | 203 DPI |
//! | 80mm  | 576 | 72 | 203 DPI |
//!
//! ## Usage
//!
//! ```
//! use thermoprint::printer::PaperWidth;
//!
//! let paper: PaperWidth = "58".parse().unwrap();
//! assert_eq!(paper.dots(), 384);
//! assert_eq!(paper.bytes(), 48);
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PrintError;
use crate::transport::Pacing;

/// # Paper Width
///
/// The logical paper width selected by the caller. The pipeline never
/// derives it; it only maps it to a dot count.
///
/// ```text
/// 58mm roll ── 48mm printable ── 384 dots
/// 80mm roll ── 72mm printable ── 576 dots
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PaperWidth {
    #[default]
    Mm58,
    Mm80,
}

impl PaperWidth {
    /// Printable width in dots. Always a multiple of 8.
    #[inline]
    pub const fn dots(self) -> u16 {
        match self {
            Self::Mm58 => 384,
            Self::Mm80 => 576,
        }
    }

    /// Printable width in bytes (one bit per dot)
    #[inline]
    pub const fn bytes(self) -> u16 {
        self.dots() / 8
    }

    /// Nominal roll width in millimeters
    #[inline]
    pub const fn millimeters(self) -> u8 {
        match self {
            Self::Mm58 => 58,
            Self::Mm80 => 80,
        }
    }

    /// Look up the paper width for a dot count, if it is one we support.
    pub fn from_dots(dots: u16) -> Option<Self> {
        match dots {
            384 => Some(Self::Mm58),
            576 => Some(Self::Mm80),
            _ => None,
        }
    }
}

impl fmt::Display for PaperWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}mm", self.millimeters())
    }
}

impl FromStr for PaperWidth {
    type Err = String;

    /// Accepts `"58"`, `"58mm"`, `"80"` or `"80mm"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_lowercase();
        match trimmed.strip_suffix("mm").unwrap_or(trimmed.as_str()) {
            "58" => Ok(Self::Mm58),
            "80" => Ok(Self::Mm80),
            _ => Err(format!("Unknown paper width '{}'. Use '58' or '80'", s)),
        }
    }
}

impl Serialize for PaperWidth {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.millimeters().to_string())
    }
}

impl<'de> Deserialize<'de> for PaperWidth {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// PRINT SETTINGS
// ============================================================================

/// BLE chunking and discovery tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BluetoothSettings {
    /// Bytes per characteristic write
    pub chunk_size: usize,
    /// Pause after the chunk starting at every multiple of this offset
    pub pause_every: usize,
    /// Length of each pacing pause
    pub pause_ms: u64,
    /// How long to scan for a printer advertising the print service
    pub scan_timeout_ms: u64,
}

impl Default for BluetoothSettings {
    fn default() -> Self {
        Self {
            chunk_size: 20,
            pause_every: 400,
            pause_ms: 15,
            scan_timeout_ms: 5000,
        }
    }
}

impl BluetoothSettings {
    pub fn pacing(&self) -> Pacing {
        Pacing {
            chunk_size: self.chunk_size.max(1),
            pause_every: (self.pause_every > 0).then_some(self.pause_every),
            pause: Duration::from_millis(self.pause_ms),
        }
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }
}

/// USB bulk transfer tunables and an optional device filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UsbSettings {
    /// Bytes per bulk transfer
    pub chunk_size: usize,
    /// Per-transfer timeout handed to libusb
    pub timeout_ms: u64,
    /// Only consider devices with this vendor ID
    pub vendor_id: Option<u16>,
    /// Only consider devices with this product ID
    pub product_id: Option<u16>,
}

impl Default for UsbSettings {
    fn default() -> Self {
        Self {
            chunk_size: 64,
            timeout_ms: 5000,
            vendor_id: None,
            product_id: None,
        }
    }
}

impl UsbSettings {
    pub fn pacing(&self) -> Pacing {
        Pacing {
            chunk_size: self.chunk_size.max(1),
            pause_every: None,
            pause: Duration::ZERO,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// # Print Settings
///
/// Everything a print run can be tuned with. Loaded from a JSON file by the
/// CLI; every key is optional.
///
/// ```json
/// {
///   "paper": "80",
///   "contrast": 1.2,
///   "bluetooth": { "pause_ms": 20 },
///   "usb": { "vendor_id": 1046 }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PrintSettings {
    pub paper: PaperWidth,
    /// Contrast multiplier applied before rasterizing (1.0 = unchanged)
    pub contrast: f32,
    /// Brightness multiplier applied before rasterizing (1.0 = unchanged)
    pub brightness: f32,
    pub bluetooth: BluetoothSettings,
    pub usb: UsbSettings,
}

impl Default for PrintSettings {
    fn default() -> Self {
        Self {
            paper: PaperWidth::Mm58,
            contrast: 1.2,
            brightness: 1.0,
            bluetooth: BluetoothSettings::default(),
            usb: UsbSettings::default(),
        }
    }
}

impl PrintSettings {
    /// Parse settings from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, PrintError> {
        serde_json::from_str(json).map_err(|e| PrintError::Config(e.to_string()))
    }

    /// Load settings from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, PrintError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PrintError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }
}

// ============================================================================
// TESTS
// ============================================================================
