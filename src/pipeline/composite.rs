//! Applies the requested background treatment to a raster.

use image::{Rgb, Rgba, RgbaImage};

use super::style::BackgroundTarget;
use crate::error::PipelineError;

/// Produces the raster to encode for `target`.
///
/// `None` and `Transparent` pass the raster through, `SolidColor` places it
/// over an opaque fill and the result is fully opaque.
pub fn composite(raster: RgbaImage, target: BackgroundTarget) -> Result<RgbaImage, PipelineError> {
    if raster.width() == 0 || raster.height() == 0 {
        return Err(PipelineError::Composition(
            "raster has no pixels".to_string(),
        ));
    }
    match target {
        BackgroundTarget::None | BackgroundTarget::Transparent => Ok(raster),
        BackgroundTarget::SolidColor(fill) => Ok(over_fill(&raster, fill)),
    }
}

/// Straight-alpha "over" against an opaque fill of the same size.
fn over_fill(foreground: &RgbaImage, fill: Rgb<u8>) -> RgbaImage {
    let mut output = RgbaImage::from_pixel(
        foreground.width(),
        foreground.height(),
        Rgba([fill.0[0], fill.0[1], fill.0[2], 255]),
    );
    for (dst, src) in output.pixels_mut().zip(foreground.pixels()) {
        let alpha = u32::from(src.0[3]);
        for channel in 0..3 {
            dst.0[channel] = blend(src.0[channel], dst.0[channel], alpha);
        }
    }
    output
}

/// `src * a + dst * (1 - a)` in 8-bit, rounded. Exact at a = 0 and a = 255.
fn blend(src: u8, dst: u8, alpha: u32) -> u8 {
    let value = (u32::from(src) * alpha + u32::from(dst) * (255 - alpha) + 127) / 255;
    u8::try_from(value).unwrap_or(u8::MAX)
}
