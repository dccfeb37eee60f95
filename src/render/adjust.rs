//! Producer-side tone adjustments.
//!
//! Captures usually look washed out on thermal paper, so the capture step
//! bumps contrast slightly before handing the surface to the rasterizer.
//! These run on a private copy; [`rasterize`](super::dither::rasterize)
//! itself only ever dithers the luminance it is given.

use image::RgbaImage;

use super::surface::PixelSurface;

/// Clamp a value to [0, 1] range.
#[inline]
fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Adjust contrast around a center point.
#[inline]
pub fn contrast(value: f32, center: f32, amount: f32) -> f32 {
    clamp01(center + (value - center) * amount)
}

/// Scale brightness by a multiplier.
#[inline]
pub fn brightness(value: f32, amount: f32) -> f32 {
    clamp01(value * amount)
}

/// Contrast and brightness multipliers, with CSS `filter` semantics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adjustments {
    pub contrast: f32,
    pub brightness: f32,
}

impl Default for Adjustments {
    /// `contrast(1.2) brightness(1.0)`
    fn default() -> Self {
        Self {
            contrast: 1.2,
            brightness: 1.0,
        }
    }
}

impl Adjustments {
    /// No change at all.
    pub const IDENTITY: Self = Self {
        contrast: 1.0,
        brightness: 1.0,
    };

    pub fn is_identity(&self) -> bool {
        self.contrast == 1.0 && self.brightness == 1.0
    }

    /// Adjust a single 8-bit channel.
    #[inline]
    pub fn channel(&self, value: u8) -> u8 {
        let v = value as f32 / 255.0;
        let v = contrast(v, 0.5, self.contrast);
        let v = brightness(v, self.brightness);
        (v * 255.0).round() as u8
    }

    /// Produce an adjusted RGBA copy of a surface. Alpha is left untouched.
    pub fn apply(&self, surface: &PixelSurface<'_>) -> RgbaImage {
        let mut lut = [0u8; 256];
        for (i, slot) in lut.iter_mut().enumerate() {
            *slot = self.channel(i as u8);
        }

        let channels = surface.format().channels();
        let mut out = RgbaImage::new(surface.width(), surface.height());
        let pixels: &mut [u8] = &mut out;
        for (dst, src) in pixels
            .chunks_exact_mut(4)
            .zip(surface.as_bytes().chunks_exact(channels))
        {
            dst[0] = lut[src[0] as usize];
            dst[1] = lut[src[1] as usize];
            dst[2] = lut[src[2] as usize];
            dst[3] = if channels == 4 { src[3] } else { 255 };
        }
        out
    }
}
