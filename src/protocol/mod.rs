//! # ESC/POS Protocol Implementation
//!
//! This module provides the command builders and payload encoder for
//! ESC/POS thermal receipt printers.
//!
//! ## Module Structure
//!
//! - [`commands`]: Lifecycle commands (initialize, feed, cut)
//! - [`graphics`]: Raster bit image command (`GS v 0`)
//! - [`payload`]: Full print payload from a dithered bitmap
//!
//! ## Usage Example
//!
//! ```
//! use thermoprint::protocol::{commands, graphics};
//!
//! // Build a 48-byte wide, 2-row all-black image by hand
//! let mut data = Vec::new();
//! data.extend(commands::init());
//! data.extend(graphics::raster(48, 2, &[0xFF; 96]));
//! data.extend(commands::feed_cut());
//!
//! assert_eq!(data.len(), 2 + 8 + 96 + 6);
//! ```

pub mod commands;
pub mod graphics;
pub mod payload;

pub use payload::{ThermalPayload, encode};
