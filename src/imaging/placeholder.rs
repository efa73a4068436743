//! Blur placeholder generation for progressive loading.
//!
//! Produces a tiny, heavily blurred, low-quality JPEG of the source — a few
//! hundred bytes that a frontend can inline and stretch over the real
//! image's box while the full variant loads.

use super::calculations::{aspect_height, clamp_width};
use super::codec::{flatten_onto_white, CodecError, OutputFormat};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::ImageEncoder;
use serde::{Deserialize, Serialize};

/// Knobs for placeholder generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaceholderConfig {
    /// Whether the pipeline generates a placeholder at all.
    pub enabled: bool,
    /// Target width in pixels. Small on purpose.
    pub width: u32,
    /// Gaussian blur strength.
    pub blur_sigma: f32,
    /// JPEG quality. Low on purpose; artifacts vanish under the blur.
    pub quality: u32,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 20,
            blur_sigma: 4.0,
            quality: 60,
        }
    }
}

/// Shrink, blur, and encode the raster as a low-quality JPEG.
///
/// Transparency is flattened onto white (JPEG has no alpha). The raster is
/// never upscaled: a source narrower than the configured width is kept at
/// its own size.
pub fn generate_placeholder(
    raster: &super::raster::Raster,
    config: &PlaceholderConfig,
) -> Result<Vec<u8>, CodecError> {
    let source = raster.dimensions();
    let width = clamp_width(source.0, config.width.max(1), false);
    let height = aspect_height(source, width);

    let tiny = raster
        .image
        .resize_exact(width, height, FilterType::Lanczos3)
        .blur(config.blur_sigma);
    let rgb = flatten_onto_white(&tiny);

    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, config.quality.clamp(1, 100) as u8);
    encoder
        .write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|source| CodecError::Encode {
            format: OutputFormat::Jpeg,
            source,
        })?;
    Ok(out)
}
