//! Byte-size optimization on top of plain encoding.
//!
//! [`optimize`] encodes the naive way, additionally tries format-appropriate
//! tuned settings, and keeps whichever result is smallest:
//!
//! - **PNG**: maximum zlib compression with adaptive filtering.
//! - **WebP**: a lossless candidate alongside the lossy encode — flat
//!   graphics often compress smaller losslessly.
//! - **AVIF**: a slower encoder speed (more search effort, smaller output).
//! - **JPEG**: no distinct tuned pass exists; the naive encode stands.
//!
//! The tuned passes never trade away visual quality below the requested
//! setting, and the result is never larger than the naive encode: the naive
//! bytes are the fallback whenever a candidate loses.

use super::codec::{self, CodecError, OutputFormat, Quality};
use super::raster::Raster;
use image::codecs::png::CompressionType;

/// rav1e speed for the optimizer's extra AVIF pass.
const AVIF_TUNED_SPEED: u8 = 4;

/// Encode at the smallest achievable byte size for the format and quality.
///
/// Guaranteed to return at most as many bytes as [`codec::encode`] would for
/// the same inputs.
pub fn optimize(
    raster: &Raster,
    format: OutputFormat,
    quality: Quality,
) -> Result<Vec<u8>, CodecError> {
    let naive = codec::encode(raster, format, quality)?;

    let tuned: Option<Vec<u8>> = match format {
        OutputFormat::Png => codec::encode_png(raster, CompressionType::Best).ok(),
        OutputFormat::Webp if !quality.is_max() => lossless_webp(raster),
        OutputFormat::Webp => None,
        OutputFormat::Avif => codec::encode_avif(raster, quality, AVIF_TUNED_SPEED).ok(),
        OutputFormat::Jpeg => None,
    };

    Ok(match tuned {
        Some(candidate) if candidate.len() < naive.len() => candidate,
        _ => naive,
    })
}

fn lossless_webp(raster: &Raster) -> Option<Vec<u8>> {
    let data = if raster.has_alpha() {
        let rgba = raster.image.to_rgba8();
        webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height()).encode_lossless()
    } else {
        let rgb = raster.image.to_rgb8();
        webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height()).encode_lossless()
    };
    Some(data.to_vec())
}
