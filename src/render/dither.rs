//! # Rasterizing and Floyd-Steinberg Dithering
//!
//! This module turns an arbitrary [`PixelSurface`] into a [`MonochromeBitmap`]
//! exactly as wide as the paper, ready for the raster command encoder.
//!
//! ## Pipeline
//!
//! ```text
//! PixelSurface (any size, RGBA/RGB)
//!     │  nearest-neighbour resample to paper width
//!     ▼
//! luminance buffer (f32, BT.601 weights)
//!     │  Floyd-Steinberg error diffusion, row-major
//!     ▼
//! MonochromeBitmap (0 = black, 255 = white)
//! ```
//!
//! ## Why Nearest-Neighbour?
//!
//! Barcodes, QR modules, hairline rules and small text must keep hard edges.
//! Any smoothing filter produces gray fringes, which the ditherer then turns
//! into speckle along every edge.
//!
//! ## Floyd-Steinberg
//!
//! Each pixel is thresholded at 128 and its quantization error is pushed to
//! the neighbours that have not been visited yet:
//!
//! ```text
//!            X   7/16
//!    3/16  5/16  1/16
//! ```
//!
//! Error accumulates in place, so every pixel depends on all pixels before it
//! in scan order. The scan is strictly sequential; splitting it across rows or
//! threads changes the output.
//!
//! Pixels on the left, right and bottom edges drop the contributions that
//! would fall outside the image. Nothing wraps around.
//!
//! ## Usage Example
//!
//! ```
//! use thermoprint::printer::PaperWidth;
//! use thermoprint::render::dither::rasterize;
//! use thermoprint::render::surface::{PixelFormat, PixelSurface};
//!
//! // A 2x1 surface: one black pixel, one white pixel
//! let data = [0, 0, 0, 255, 255, 255, 255, 255];
//! let surface = PixelSurface::new(2, 1, PixelFormat::Rgba, &data)?;
//!
//! let bitmap = rasterize(&surface, PaperWidth::Mm58)?;
//! assert_eq!(bitmap.width(), 384);
//! assert_eq!(bitmap.height(), 192);
//! assert!(bitmap.is_black(0, 0));
//! assert!(!bitmap.is_black(383, 0));
//! # Ok::<(), thermoprint::PrintError>(())
//! ```

use std::path::Path;

use image::{GrayImage, Luma};
use log::debug;

use super::surface::PixelSurface;
use crate::error::PrintError;
use crate::printer::PaperWidth;

/// Stored value of a black (printed) pixel
pub const BLACK: u8 = 0;

/// Stored value of a white (paper) pixel
pub const WHITE: u8 = 255;

/// Luminance at or above this is white
pub const THRESHOLD: f32 = 128.0;

/// Floyd-Steinberg kernel as `(dx, dy, weight)`.
///
/// Weights sum to exactly 1, so no error is created or lost away from the
/// image edges.
pub const FLOYD_STEINBERG: [(isize, usize, f32); 4] = [
    (1, 0, 7.0 / 16.0),
    (-1, 1, 3.0 / 16.0),
    (0, 1, 5.0 / 16.0),
    (1, 1, 1.0 / 16.0),
];

/// ITU-R BT.601 luma.
#[inline]
pub fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.299 * r + 0.587 * g + 0.114 * b
}

// ============================================================================
// MONOCHROME BITMAP
// ============================================================================

/// # Monochrome Bitmap
///
/// A `width × height` grid where every sample is exactly [`BLACK`] or
/// [`WHITE`]. `width` is always a supported paper width in dots (384 or
/// 576), so rows pack into whole bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonochromeBitmap {
    width: u16,
    height: u16,
    pixels: Vec<u8>,
}

impl MonochromeBitmap {
    /// Build a bitmap from row-major samples.
    ///
    /// ## Errors
    ///
    /// Returns [`PrintError::InvalidInput`] if the width is not 384 or 576
    /// dots, the buffer length is wrong, or any sample is not 0 or 255.
    pub fn new(width: u16, height: u16, pixels: Vec<u8>) -> Result<Self, PrintError> {
        if PaperWidth::from_dots(width).is_none() {
            return Err(PrintError::InvalidInput(format!(
                "Bitmap width {} is not a paper width (384 or 576 dots)",
                width
            )));
        }
        if pixels.len() != width as usize * height as usize {
            return Err(PrintError::InvalidInput(format!(
                "Bitmap buffer is {} samples, expected {}x{}",
                pixels.len(),
                width,
                height
            )));
        }
        if pixels.iter().any(|&p| p != BLACK && p != WHITE) {
            return Err(PrintError::InvalidInput(
                "Bitmap samples must be 0 or 255".to_string(),
            ));
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A bitmap filled with a single value.
    pub fn filled(paper: PaperWidth, height: u16, black: bool) -> Self {
        let value = if black { BLACK } else { WHITE };
        Self {
            width: paper.dots(),
            height,
            pixels: vec![value; paper.dots() as usize * height as usize],
        }
    }

    #[inline]
    pub fn width(&self) -> u16 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Bytes per packed row
    #[inline]
    pub fn width_bytes(&self) -> u16 {
        self.width / 8
    }

    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn get(&self, x: u16, y: u16) -> u8 {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub fn is_black(&self, x: u16, y: u16) -> bool {
        self.get(x, y) < 128
    }

    /// Samples of one row.
    pub fn row(&self, y: u16) -> &[u8] {
        let start = y as usize * self.width as usize;
        &self.pixels[start..start + self.width as usize]
    }

    /// Number of black pixels in the whole bitmap.
    pub fn black_count(&self) -> usize {
        self.pixels.iter().filter(|&&p| p < 128).count()
    }

    /// Iterate rows packed MSB-first, set bit = black.
    pub fn packed_rows(&self) -> impl Iterator<Item = Vec<u8>> + '_ {
        self.pixels
            .chunks_exact(self.width as usize)
            .map(pack_row)
    }

    /// Render as an 8-bit grayscale image for previews.
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            Luma([self.get(x as u16, y as u16)])
        })
    }

    /// Save the bitmap as a PNG preview.
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<(), PrintError> {
        self.to_gray_image()
            .save(path.as_ref())
            .map_err(|e| PrintError::Image(format!("Failed to save PNG: {}", e)))
    }
}

/// Pack a row of luminance samples into bytes.
///
/// ## Bit Packing
///
/// - Bit 7 (MSB) = leftmost pixel
/// - Bit 0 (LSB) = rightmost pixel
/// - 1 = black (`< 128`, fire the heating element), 0 = white
///
/// This is the inverse of the stored convention where black is 0.
///
/// ## Padding
///
/// If the row length is not a multiple of 8, the last byte is padded
/// with zeros (white) on the right.
///
/// ## Example
///
/// ```
/// use thermoprint::render::dither::pack_row;
///
/// let row = [0, 0, 0, 0, 255, 255, 255, 255];
/// assert_eq!(pack_row(&row), vec![0xF0]); // 11110000
/// ```
pub fn pack_row(pixels: &[u8]) -> Vec<u8> {
    let num_bytes = pixels.len().div_ceil(8);
    let mut bytes = vec![0u8; num_bytes];

    for (i, &pixel) in pixels.iter().enumerate() {
        if pixel < 128 {
            let byte_idx = i / 8;
            let bit_idx = 7 - (i % 8); // MSB first
            bytes[byte_idx] |= 1 << bit_idx;
        }
    }

    bytes
}

// ============================================================================
// RASTERIZER
// ============================================================================

/// Rasterize a surface to a dithered bitmap as wide as the paper.
///
/// `height = floor(surface.height × paper.dots() / surface.width)`.
///
/// ## Errors
///
/// Returns [`PrintError::InvalidInput`] if the surface has zero width or the
/// scaled height does not fit the raster command's 16-bit height field.
pub fn rasterize(
    surface: &PixelSurface<'_>,
    paper: PaperWidth,
) -> Result<MonochromeBitmap, PrintError> {
    if surface.width() == 0 {
        return Err(PrintError::InvalidInput(
            "Surface width must be greater than zero".to_string(),
        ));
    }

    let width = paper.dots() as usize;
    let scaled = surface.height() as u64 * width as u64 / surface.width() as u64;
    let height = u16::try_from(scaled).map_err(|_| {
        PrintError::InvalidInput(format!(
            "Scaled height {} exceeds the 65535-row raster limit",
            scaled
        ))
    })?;

    debug!(
        "Rasterizing {}x{} surface to {}x{} ({})",
        surface.width(),
        surface.height(),
        width,
        height,
        paper
    );

    let luma = resample_luminance(surface, width, height as usize);
    let pixels = floyd_steinberg(luma, width, height as usize);

    Ok(MonochromeBitmap {
        width: paper.dots(),
        height,
        pixels,
    })
}

/// Nearest-neighbour resample straight into a luminance buffer.
///
/// Samples at pixel centres: `sx = floor((x + 0.5) × sw / tw)`.
fn resample_luminance(surface: &PixelSurface<'_>, width: usize, height: usize) -> Vec<f32> {
    let src_w = surface.width() as u64;
    let src_h = surface.height() as u64;
    let mut luma = Vec::with_capacity(width * height);

    if width == 0 || height == 0 {
        return luma;
    }

    let columns: Vec<u32> = (0..width as u64)
        .map(|x| nearest(x, src_w, width as u64))
        .collect();

    for y in 0..height as u64 {
        let sy = nearest(y, src_h, height as u64);
        for &sx in &columns {
            let [r, g, b] = surface.rgb_on_white(sx, sy);
            luma.push(luminance(r, g, b));
        }
    }

    luma
}

#[inline]
fn nearest(dst: u64, src_len: u64, dst_len: u64) -> u32 {
    (((2 * dst + 1) * src_len) / (2 * dst_len)).min(src_len - 1) as u32
}

/// Floyd-Steinberg dither a luminance buffer in place and return the binary
/// samples.
///
/// The buffer is consumed because it doubles as the error accumulator.
pub fn floyd_steinberg(mut luma: Vec<f32>, width: usize, height: usize) -> Vec<u8> {
    debug_assert_eq!(luma.len(), width * height);

    let mut out = vec![WHITE; width * height];

    for y in 0..height {
        for x in 0..width {
            let i = y * width + x;
            let old = luma[i];
            let new = if old < THRESHOLD { BLACK } else { WHITE };
            out[i] = new;
            diffuse_error(&mut luma, width, height, x, y, old - new as f32);
        }
    }

    out
}

/// Push `error` from (x, y) into the unvisited neighbours.
#[inline]
fn diffuse_error(luma: &mut [f32], width: usize, height: usize, x: usize, y: usize, error: f32) {
    if error == 0.0 {
        return;
    }

    for &(dx, dy, weight) in &FLOYD_STEINBERG {
        let nx = x as isize + dx;
        let ny = y + dy;
        if nx < 0 || nx as usize >= width || ny >= height {
            continue;
        }
        luma[ny * width + nx as usize] += error * weight;
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::surface::PixelFormat;

    fn solid_rgba(width: u32, height: u32, value: u8) -> Vec<u8> {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            data.extend_from_slice(&[value, value, value, 255]);
        }
        data
    }

    #[test]
    fn test_kernel_weights_sum_to_one() {
        let sum: f32 = FLOYD_STEINBERG.iter().map(|&(_, _, w)| w).sum();
        assert!((sum - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_diffuse_error_interior() {
        // 3x2 buffer, error of 16 at the top-middle pixel
        let mut luma = vec![0.0; 6];
        diffuse_error(&mut luma, 3, 2, 1, 0, 16.0);
        assert_eq!(luma, vec![0.0, 0.0, 7.0, 3.0, 5.0, 1.0]);
    }

    #[test]
    fn test_diffuse_error_left_edge_no_wrap() {
        let mut luma = vec![0.0; 6];
        diffuse_error(&mut luma, 3, 2, 0, 0, 16.0);
        // Bottom-left contribution is dropped, not wrapped to the row above
        assert_eq!(luma, vec![0.0, 7.0, 0.0, 5.0, 1.0, 0.0]);
    }

    #[test]
    fn test_diffuse_error_right_edge_no_wrap() {
        let mut luma = vec![0.0; 6];
        diffuse_error(&mut luma, 3, 2, 2, 0, 16.0);
        // Right and bottom-right fall off the edge
        assert_eq!(luma, vec![0.0, 0.0, 0.0, 0.0, 3.0, 5.0]);
    }

    #[test]
    fn test_diffuse_error_bottom_row() {
        let mut luma = vec![0.0; 6];
        diffuse_error(&mut luma, 3, 2, 0, 1, 16.0);
        assert_eq!(luma, vec![0.0, 0.0, 0.0, 0.0, 7.0, 0.0]);

        // Bottom-right corner has nowhere to send error
        let mut luma = vec![0.0; 6];
        diffuse_error(&mut luma, 3, 2, 2, 1, 16.0);
        assert!(luma.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_threshold_boundary() {
        assert_eq!(floyd_steinberg(vec![128.0], 1, 1), vec![WHITE]);
        assert_eq!(floyd_steinberg(vec![127.9], 1, 1), vec![BLACK]);
    }

    #[test]
    fn test_floyd_steinberg_small_known_output() {
        // 100 -> black (err 100), right neighbour 143.75 -> white (err -111.25),
        // bottom-left 100 + 31.25 - 20.86 -> black, last pixel -> black
        let out = floyd_steinberg(vec![100.0; 4], 2, 2);
        assert_eq!(out, vec![BLACK, WHITE, BLACK, BLACK]);
    }

    #[test]
    fn test_output_is_binary() {
        let luma: Vec<f32> = (0..64 * 16).map(|i| (i % 256) as f32).collect();
        let out = floyd_steinberg(luma, 64, 16);
        assert!(out.iter().all(|&p| p == BLACK || p == WHITE));
    }

    #[test]
    fn test_luminance_weights() {
        assert!((luminance(255.0, 255.0, 255.0) - 255.0).abs() < 0.01);
        assert_eq!(luminance(0.0, 0.0, 0.0), 0.0);
        assert!((luminance(255.0, 0.0, 0.0) - 76.245).abs() < 0.01);
        assert!((luminance(0.0, 255.0, 0.0) - 149.685).abs() < 0.01);
        assert!((luminance(0.0, 0.0, 255.0) - 29.07).abs() < 0.01);
    }

    #[test]
    fn test_rasterize_dimensions() {
        let cases = [(100u32, 50u32), (7, 3), (1000, 1), (384, 384), (1152, 2000)];
        for paper in [PaperWidth::Mm58, PaperWidth::Mm80] {
            for &(w, h) in &cases {
                let data = solid_rgba(w, h, 200);
                let surface = PixelSurface::new(w, h, PixelFormat::Rgba, &data).unwrap();
                let bitmap = rasterize(&surface, paper).unwrap();

                assert_eq!(bitmap.width(), paper.dots());
                assert_eq!(bitmap.width() % 8, 0);
                let expected = (h as u64 * paper.dots() as u64 / w as u64) as u16;
                assert_eq!(bitmap.height(), expected, "{}x{} on {}", w, h, paper);
                assert_eq!(
                    bitmap.pixels().len(),
                    bitmap.width() as usize * bitmap.height() as usize
                );
            }
        }
    }

    #[test]
    fn test_rasterize_height_floors() {
        let data = solid_rgba(7, 3, 255);
        let surface = PixelSurface::new(7, 3, PixelFormat::Rgba, &data).unwrap();
        // 3 * 384 / 7 = 164.57
        assert_eq!(rasterize(&surface, PaperWidth::Mm58).unwrap().height(), 164);
    }

    #[test]
    fn test_rasterize_all_white() {
        let data = solid_rgba(50, 20, 255);
        let surface = PixelSurface::new(50, 20, PixelFormat::Rgba, &data).unwrap();
        let bitmap = rasterize(&surface, PaperWidth::Mm58).unwrap();
        assert_eq!(bitmap.black_count(), 0);
        assert!(bitmap.packed_rows().all(|row| row.iter().all(|&b| b == 0x00)));
    }

    #[test]
    fn test_rasterize_all_black() {
        let data = solid_rgba(50, 20, 0);
        let surface = PixelSurface::new(50, 20, PixelFormat::Rgba, &data).unwrap();
        let bitmap = rasterize(&surface, PaperWidth::Mm80).unwrap();
        assert_eq!(bitmap.black_count(), bitmap.pixels().len());
        assert!(bitmap.packed_rows().all(|row| row.iter().all(|&b| b == 0xFF)));
    }

    #[test]
    fn test_rasterize_keeps_hard_edges() {
        // One black and one white source pixel scale up without any gray fringe
        let data = [0, 0, 0, 255, 255, 255, 255, 255];
        let surface = PixelSurface::new(2, 1, PixelFormat::Rgba, &data).unwrap();
        let bitmap = rasterize(&surface, PaperWidth::Mm58).unwrap();

        assert_eq!(bitmap.height(), 192);
        for y in 0..bitmap.height() {
            for x in 0..bitmap.width() {
                assert_eq!(bitmap.is_black(x, y), x < 192, "pixel ({},{})", x, y);
            }
        }
    }

    #[test]
    fn test_rasterize_transparent_prints_as_paper() {
        let data = vec![0u8; 16 * 16 * 4];
        let surface = PixelSurface::new(16, 16, PixelFormat::Rgba, &data).unwrap();
        let bitmap = rasterize(&surface, PaperWidth::Mm58).unwrap();
        assert_eq!(bitmap.black_count(), 0);
    }

    #[test]
    fn test_rasterize_rgb_surface() {
        let data = vec![0u8; 4 * 2 * 3];
        let surface = PixelSurface::new(4, 2, PixelFormat::Rgb, &data).unwrap();
        let bitmap = rasterize(&surface, PaperWidth::Mm58).unwrap();
        assert_eq!(bitmap.height(), 192);
        assert_eq!(bitmap.black_count(), bitmap.pixels().len());
    }

    #[test]
    fn test_rasterize_is_deterministic() {
        let data: Vec<u8> = (0..37 * 23 * 4).map(|i| (i * 31 % 256) as u8).collect();
        let surface = PixelSurface::new(37, 23, PixelFormat::Rgba, &data).unwrap();
        let a = rasterize(&surface, PaperWidth::Mm80).unwrap();
        let b = rasterize(&surface, PaperWidth::Mm80).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_mid_gray_preserves_average_tone() {
        for level in [32u8, 64, 128, 192, 224] {
            let data = solid_rgba(384, 100, level);
            let surface = PixelSurface::new(384, 100, PixelFormat::Rgba, &data).unwrap();
            let bitmap = rasterize(&surface, PaperWidth::Mm58).unwrap();

            let black_ratio = bitmap.black_count() as f32 / bitmap.pixels().len() as f32;
            let expected = 1.0 - level as f32 / 255.0;
            assert!(
                (black_ratio - expected).abs() < 0.02,
                "level {}: expected ~{:.3} black, got {:.3}",
                level,
                expected,
                black_ratio
            );
        }
    }

    #[test]
    fn test_mid_gray_differs_from_plain_threshold() {
        // A plain threshold maps uniform 128 to all white; diffusion must not
        let data = solid_rgba(384, 100, 128);
        let surface = PixelSurface::new(384, 100, PixelFormat::Rgba, &data).unwrap();
        let bitmap = rasterize(&surface, PaperWidth::Mm58).unwrap();

        let total = bitmap.pixels().len();
        let black = bitmap.black_count();
        assert!(black > total * 45 / 100 && black < total * 55 / 100);
    }

    #[test]
    fn test_zero_height_surface() {
        let surface = PixelSurface::new(10, 0, PixelFormat::Rgba, &[]).unwrap();
        let bitmap = rasterize(&surface, PaperWidth::Mm58).unwrap();
        assert_eq!(bitmap.height(), 0);
        assert!(bitmap.pixels().is_empty());
    }

    #[test]
    fn test_oversized_height_rejected() {
        // 1 wide, 200 tall -> 76800 rows at 384 dots
        let data = solid_rgba(1, 200, 255);
        let surface = PixelSurface::new(1, 200, PixelFormat::Rgba, &data).unwrap();
        let err = rasterize(&surface, PaperWidth::Mm58).unwrap_err();
        assert!(matches!(err, PrintError::InvalidInput(_)));
    }

    #[test]
    fn test_empty_image_rejected() {
        let img = image::RgbaImage::new(0, 0);
        let surface = PixelSurface::from_rgba_image(&img);
        assert!(matches!(
            rasterize(&surface, PaperWidth::Mm58),
            Err(PrintError::InvalidInput(_))
        ));
    }

    // ========== Bitmap Tests ==========

    #[test]
    fn test_pack_row_8_pixels() {
        assert_eq!(pack_row(&[BLACK; 8]), vec![0xFF]);
        assert_eq!(pack_row(&[WHITE; 8]), vec![0x00]);
        assert_eq!(
            pack_row(&[BLACK, WHITE, BLACK, WHITE, BLACK, WHITE, BLACK, WHITE]),
            vec![0xAA]
        );
        assert_eq!(
            pack_row(&[BLACK, BLACK, BLACK, BLACK, WHITE, WHITE, WHITE, WHITE]),
            vec![0xF0]
        );
    }

    #[test]
    fn test_pack_row_padding() {
        assert_eq!(pack_row(&[BLACK; 4]), vec![0xF0]);
        let packed = pack_row(&[BLACK; 9]);
        assert_eq!(packed, vec![0xFF, 0x80]);
    }

    #[test]
    fn test_pack_row_empty() {
        assert_eq!(pack_row(&[]), Vec::<u8>::new());
    }

    #[test]
    fn test_bitmap_new_validates() {
        assert!(MonochromeBitmap::new(12, 1, vec![WHITE; 12]).is_err());
        assert!(MonochromeBitmap::new(0, 0, vec![]).is_err());
        assert!(MonochromeBitmap::new(384, 2, vec![WHITE; 384]).is_err());
        assert!(MonochromeBitmap::new(384, 1, vec![7; 384]).is_err());
        assert!(MonochromeBitmap::new(384, 1, vec![BLACK; 384]).is_ok());
        assert!(MonochromeBitmap::new(576, 1, vec![WHITE; 576]).is_ok());
    }

    #[test]
    fn test_bitmap_rejects_non_paper_widths() {
        // Multiples of 8 that are not a supported paper width
        for width in [8u16, 16, 400, 512, 640] {
            let pixels = vec![WHITE; width as usize];
            assert!(
                matches!(
                    MonochromeBitmap::new(width, 1, pixels),
                    Err(PrintError::InvalidInput(_))
                ),
                "width {} accepted",
                width
            );
        }
    }

    #[test]
    fn test_bitmap_rows() {
        let mut pixels = vec![WHITE; 384 * 2];
        pixels[384] = BLACK;
        let bitmap = MonochromeBitmap::new(384, 2, pixels).unwrap();
        assert_eq!(bitmap.width_bytes(), 48);
        assert_eq!(bitmap.row(1)[0], BLACK);
        let rows: Vec<Vec<u8>> = bitmap.packed_rows().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].iter().all(|&b| b == 0x00));
        assert_eq!(rows[1][0], 0x80);
        assert!(rows[1][1..].iter().all(|&b| b == 0x00));
    }

    #[test]
    fn test_to_gray_image() {
        let bitmap = MonochromeBitmap::filled(PaperWidth::Mm58, 3, true);
        let img = bitmap.to_gray_image();
        assert_eq!(img.dimensions(), (384, 3));
        assert!(img.pixels().all(|p| p.0[0] == 0));
    }
}
