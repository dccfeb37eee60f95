//! # Rendering Module
//!
//! This module turns captured images into printable monochrome bitmaps.
//!
//! ## Modules
//!
//! - [`surface`]: Pixel surfaces and image-file loading
//! - [`adjust`]: Contrast/brightness pre-adjustment for captures
//! - [`dither`]: Nearest-neighbour resampling and Floyd-Steinberg dithering
//!
//! ## Usage Example
//!
//! ```
//! use thermoprint::printer::PaperWidth;
//! use thermoprint::render::{dither, surface::PixelSurface};
//!
//! let capture = image::RgbaImage::from_pixel(120, 60, image::Rgba([255, 255, 255, 255]));
//! let surface = PixelSurface::from_rgba_image(&capture);
//!
//! let bitmap = dither::rasterize(&surface, PaperWidth::Mm80)?;
//! assert_eq!((bitmap.width(), bitmap.height()), (576, 288));
//! # Ok::<(), thermoprint::PrintError>(())
//! ```

pub mod adjust;
pub mod dither;
pub mod surface;

pub use dither::{MonochromeBitmap, rasterize};
pub use surface::{PixelFormat, PixelSurface};
