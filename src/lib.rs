//! # Thermoprint - Thermal Receipt Printer Pipeline
//!
//! Thermoprint turns captured images into ESC/POS raster jobs and delivers
//! them to thermal receipt printers. It provides:
//!
//! - **Rasterizing**: Nearest-neighbour scaling to paper width and
//!   Floyd-Steinberg error diffusion
//! - **Protocol implementation**: ESC/POS initialize, `GS v 0` raster image,
//!   feed and cut
//! - **Transport**: BLE GATT and USB bulk drivers with chunked, paced writes
//! - **Orchestration**: A single guarded printer connection and the print
//!   state machine
//!
//! ## Quick Start
//!
//! ```no_run
//! use thermoprint::{
//!     connection::PrinterConnection,
//!     print::print,
//!     printer::PaperWidth,
//!     render::{PixelSurface, surface::load_image},
//!     transport::BluetoothTransport,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), thermoprint::PrintError> {
//! // Connect to the first BLE printer advertising the print service
//! let connection = PrinterConnection::new();
//! connection.connect(Box::new(BluetoothTransport::new())).await?;
//!
//! // Load a capture and print it on 58mm paper
//! let image = load_image("receipt.png")?;
//! let surface = PixelSurface::from_rgba_image(&image);
//! let report = print(&surface, PaperWidth::Mm58, &connection).await?;
//!
//! println!("Sent {} bytes to {}", report.bytes_sent, report.device_name);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`render`] | Pixel surfaces, pre-adjustment and dithering |
//! | [`protocol`] | ESC/POS command builders and payload encoder |
//! | [`transport`] | BLE, USB and mock backends |
//! | [`connection`] | The single active printer connection |
//! | [`print`] | Print orchestrator |
//! | [`printer`] | Paper widths and settings |
//! | [`error`] | Error types |
//!
//! ## Supported Printers
//!
//! Generic 58mm and 80mm ESC/POS printers at 203 DPI, reachable either over
//! BLE (service `0x18F0`) or as a USB printer-class device.

pub mod connection;
pub mod error;
pub mod print;
pub mod printer;
pub mod protocol;
pub mod render;
pub mod transport;

// Re-exports for convenience
pub use connection::PrinterConnection;
pub use error::PrintError;
pub use print::{PrintReport, PrintStage, print};
pub use printer::{PaperWidth, PrintSettings};
pub use protocol::{ThermalPayload, encode};
pub use render::{MonochromeBitmap, PixelSurface, rasterize};
