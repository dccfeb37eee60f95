//! # Pixel Surfaces
//!
//! A [`PixelSurface`] is a read-only view of an RGBA or RGB pixel grid. It is
//! the only image input the rasterizer accepts. Whoever captured the image
//! owns the buffer; the pipeline never writes to it.
//!
//! ## Loading Images
//!
//! [`load_image`] decodes an image file with the `image` crate (or libheif
//! for HEIC photos when the `heif` feature is enabled) and returns an RGBA
//! buffer a surface can borrow:
//!
//! ```no_run
//! use thermoprint::render::surface::{self, PixelSurface};
//!
//! let rgba = surface::load_image("receipt.png")?;
//! let surface = PixelSurface::from_rgba_image(&rgba);
//! assert_eq!(surface.width(), rgba.width());
//! # Ok::<(), thermoprint::PrintError>(())
//! ```

use std::path::Path;

use image::{DynamicImage, RgbaImage};

use crate::error::PrintError;

/// Sample layout of a pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 4 bytes per pixel, straight (non-premultiplied) alpha
    Rgba,
    /// 3 bytes per pixel, fully opaque
    Rgb,
}

impl PixelFormat {
    #[inline]
    pub const fn channels(self) -> usize {
        match self {
            Self::Rgba => 4,
            Self::Rgb => 3,
        }
    }
}

/// An immutable view of a 2D grid of RGBA or RGB samples.
#[derive(Debug, Clone, Copy)]
pub struct PixelSurface<'a> {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: &'a [u8],
}

impl<'a> PixelSurface<'a> {
    /// Wrap a row-major pixel buffer.
    ///
    /// ## Errors
    ///
    /// Returns [`PrintError::InvalidInput`] if the width is zero or the
    /// buffer length does not equal `width × height × channels`.
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: &'a [u8],
    ) -> Result<Self, PrintError> {
        if width == 0 {
            return Err(PrintError::InvalidInput(
                "Surface width must be greater than zero".to_string(),
            ));
        }

        let expected = width as usize * height as usize * format.channels();
        if data.len() != expected {
            return Err(PrintError::InvalidInput(format!(
                "Surface buffer is {} bytes, expected {} ({}x{} {:?})",
                data.len(),
                expected,
                width,
                height,
                format
            )));
        }

        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Borrow an `image` RGBA buffer as a surface.
    pub fn from_rgba_image(image: &'a RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            format: PixelFormat::Rgba,
            data: image.as_raw(),
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    /// RGB at (x, y) with any alpha composited onto white.
    ///
    /// Transparent regions print as paper, never as black.
    #[inline]
    pub fn rgb_on_white(&self, x: u32, y: u32) -> [f32; 3] {
        let channels = self.format.channels();
        let idx = (y as usize * self.width as usize + x as usize) * channels;
        let px = &self.data[idx..idx + channels];

        match self.format {
            PixelFormat::Rgb => [px[0] as f32, px[1] as f32, px[2] as f32],
            PixelFormat::Rgba => {
                let alpha = px[3] as f32 / 255.0;
                let over_white = |c: u8| c as f32 * alpha + 255.0 * (1.0 - alpha);
                [over_white(px[0]), over_white(px[1]), over_white(px[2])]
            }
        }
    }
}

// ============================================================================
// IMAGE LOADING
// ============================================================================

/// Decode an image file into an RGBA buffer.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<RgbaImage, PrintError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;
    decode_image(&bytes, &path.to_string_lossy())
}

/// Decode image bytes into an RGBA buffer.
///
/// `filename` is only used to recognise HEIC photos whose header is unusual.
pub fn decode_image(bytes: &[u8], filename: &str) -> Result<RgbaImage, PrintError> {
    let lower = filename.to_lowercase();
    let looks_heic = is_heic(bytes) || lower.ends_with(".heic") || lower.ends_with(".heif");

    let img = if looks_heic {
        decode_heic(bytes)?
    } else {
        image::load_from_memory(bytes)
            .map_err(|e| PrintError::Image(format!("Failed to decode image: {}", e)))?
    };

    Ok(img.to_rgba8())
}

/// Check for an ISO-BMFF `ftyp` box with a HEIF-family brand.
fn is_heic(data: &[u8]) -> bool {
    if data.len() < 12 || &data[4..8] != b"ftyp" {
        return false;
    }

    matches!(
        &data[8..12],
        b"heic" | b"heix" | b"hevc" | b"hevx" | b"heim" | b"heis" | b"hevm" | b"hevs" | b"mif1"
            | b"msf1"
    )
}

#[cfg(feature = "heif")]
fn decode_heic(data: &[u8]) -> Result<DynamicImage, PrintError> {
    use image::RgbImage;
    use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

    let lib_heif = LibHeif::new();
    let ctx = HeifContext::read_from_bytes(data)
        .map_err(|e| PrintError::Image(format!("Failed to read HEIC: {}", e)))?;
    let handle = ctx
        .primary_image_handle()
        .map_err(|e| PrintError::Image(format!("Failed to get primary image: {}", e)))?;
    let image = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(|e| PrintError::Image(format!("Failed to decode HEIC image: {}", e)))?;

    let planes = image.planes();
    let interleaved = planes
        .interleaved
        .ok_or_else(|| PrintError::Image("No interleaved RGB data in HEIC".to_string()))?;

    let width = image.width();
    let height = image.height();
    let stride = interleaved.stride;
    let data = interleaved.data;

    let mut rgb_image = RgbImage::new(width, height);
    for y in 0..height {
        let row = y as usize * stride;
        for x in 0..width {
            let offset = row + x as usize * 3;
            if offset + 2 < data.len() {
                rgb_image.put_pixel(
                    x,
                    y,
                    image::Rgb([data[offset], data[offset + 1], data[offset + 2]]),
                );
            }
        }
    }

    Ok(DynamicImage::ImageRgb8(rgb_image))
}

#[cfg(not(feature = "heif"))]
fn decode_heic(_data: &[u8]) -> Result<DynamicImage, PrintError> {
    Err(PrintError::Image(
        "HEIC support not compiled in (enable the `heif` feature)".to_string(),
    ))
}

// ============================================================================
// TESTS
// ============================================================================
