//! Byte-stream decoding and multi-format encoding.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Sniff + decode (JPEG, PNG, WebP, BMP) | `image` crate (`ImageReader::with_guessed_format`) |
//! | Encode → WebP (lossy/lossless) | `webp` crate (libwebp; the `image` encoder is lossless-only) |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, behind the `avif` feature) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder`, alpha flattened onto white |
//!
//! Decoding distinguishes two failure classes: a byte stream whose container
//! cannot be identified at all ([`CodecError::UnsupportedFormat`]) and one
//! that sniffs fine but whose pixel data cannot be read
//! ([`CodecError::CorruptImage`]). Encoding to AVIF without the `avif`
//! feature compiled in fails with [`CodecError::FormatUnavailable`], which
//! callers treat as a recoverable per-variant condition rather than a hard
//! stop.

use super::raster::Raster;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::{DynamicImage, ImageDecoder, ImageEncoder, ImageFormat, ImageReader, RgbImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("corrupt image data: {0}")]
    CorruptImage(String),
    #[error("{0} encoding is not available in this build")]
    FormatUnavailable(OutputFormat),
    #[error("{format} encoding failed: {source}")]
    Encode {
        format: OutputFormat,
        source: image::ImageError,
    },
}

/// Output container formats the pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webp,
    Avif,
    Png,
    Jpeg,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Webp,
        OutputFormat::Avif,
        OutputFormat::Png,
        OutputFormat::Jpeg,
    ];

    /// File extension, which doubles as the canonical lowercase name.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
        }
    }

    pub fn media_type(self) -> &'static str {
        match self {
            OutputFormat::Webp => "image/webp",
            OutputFormat::Avif => "image/avif",
            OutputFormat::Png => "image/png",
            OutputFormat::Jpeg => "image/jpeg",
        }
    }

    /// PNG is the only lossless-by-definition output; quality is ignored for it.
    pub fn is_lossless(self) -> bool {
        matches!(self, OutputFormat::Png)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "webp" => Ok(OutputFormat::Webp),
            "avif" => Ok(OutputFormat::Avif),
            "png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Quality setting for lossy encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(pub u32);

impl Quality {
    /// Clamp into the valid range. For values that come from internal
    /// defaults; request-supplied values go through [`Quality::checked`].
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    /// `None` if the value is outside 1-100. Used at the request boundary,
    /// where an out-of-range quality rejects the request instead of being
    /// silently adjusted.
    pub fn checked(value: u32) -> Option<Self> {
        (1..=100).contains(&value).then_some(Self(value))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// True when the caller asked for the top of the scale, which WebP
    /// interprets as a request for lossless encoding.
    pub fn is_max(self) -> bool {
        self.0 >= 100
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(95)
    }
}

/// Sniff and decode a byte stream into a raster, capturing ICC/EXIF.
///
/// Returns the raster together with the sniffed container format.
pub fn decode(bytes: &[u8]) -> Result<(Raster, ImageFormat), CodecError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| CodecError::UnsupportedFormat(e.to_string()))?;

    let Some(format) = reader.format() else {
        return Err(CodecError::UnsupportedFormat(
            "could not identify container format".into(),
        ));
    };

    let mut decoder = reader
        .into_decoder()
        .map_err(|e| CodecError::CorruptImage(e.to_string()))?;

    // Metadata extraction is best-effort: a broken EXIF segment should not
    // fail an otherwise decodable image.
    let icc = decoder.icc_profile().ok().flatten();
    let exif = decoder.exif_metadata().ok().flatten();

    let image = DynamicImage::from_decoder(decoder)
        .map_err(|e| CodecError::CorruptImage(e.to_string()))?;

    Ok((Raster { image, icc, exif }, format))
}

/// Encode a raster into the target format at the given quality.
///
/// Quality is ignored for PNG. JPEG has no alpha channel, so transparent
/// rasters are flattened onto a white background first. PNG and JPEG
/// re-embed the raster's ICC profile when one is present.
pub fn encode(raster: &Raster, format: OutputFormat, quality: Quality) -> Result<Vec<u8>, CodecError> {
    match format {
        OutputFormat::Webp => encode_webp(raster, quality),
        OutputFormat::Avif => encode_avif(raster, quality, AVIF_DEFAULT_SPEED),
        OutputFormat::Png => encode_png(raster, CompressionType::Default),
        OutputFormat::Jpeg => encode_jpeg(raster, quality),
    }
}

fn encode_webp(raster: &Raster, quality: Quality) -> Result<Vec<u8>, CodecError> {
    let data = if raster.has_alpha() {
        let rgba = raster.image.to_rgba8();
        let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
        if quality.is_max() {
            encoder.encode_lossless()
        } else {
            encoder.encode(quality.value() as f32)
        }
    } else {
        let rgb = raster.image.to_rgb8();
        let encoder = webp::Encoder::from_rgb(rgb.as_raw(), rgb.width(), rgb.height());
        if quality.is_max() {
            encoder.encode_lossless()
        } else {
            encoder.encode(quality.value() as f32)
        }
    };
    Ok(data.to_vec())
}

/// rav1e speed for ordinary encodes. Lower is slower and smaller; the
/// optimizer tries a slower pass on top of this.
pub(crate) const AVIF_DEFAULT_SPEED: u8 = 6;

#[cfg(feature = "avif")]
pub(crate) fn encode_avif(
    raster: &Raster,
    quality: Quality,
    speed: u8,
) -> Result<Vec<u8>, CodecError> {
    use image::codecs::avif::AvifEncoder;

    // The AVIF encoder wants 8-bit RGB(A) input.
    let normalized = if raster.has_alpha() {
        DynamicImage::ImageRgba8(raster.image.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(raster.image.to_rgb8())
    };

    let mut out = Vec::new();
    let encoder = AvifEncoder::new_with_speed_quality(&mut out, speed, quality.value() as u8);
    normalized
        .write_with_encoder(encoder)
        .map_err(|source| CodecError::Encode {
            format: OutputFormat::Avif,
            source,
        })?;
    Ok(out)
}

#[cfg(not(feature = "avif"))]
pub(crate) fn encode_avif(
    _raster: &Raster,
    _quality: Quality,
    _speed: u8,
) -> Result<Vec<u8>, CodecError> {
    Err(CodecError::FormatUnavailable(OutputFormat::Avif))
}

pub(crate) fn encode_png(
    raster: &Raster,
    compression: CompressionType,
) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    let mut encoder = PngEncoder::new_with_quality(&mut out, compression, PngFilterType::Adaptive);
    if let Some(icc) = &raster.icc {
        // Profile embedding is best-effort; an encoder without support skips it
        encoder.set_icc_profile(icc.clone()).ok();
    }
    raster
        .image
        .write_with_encoder(encoder)
        .map_err(|source| CodecError::Encode {
            format: OutputFormat::Png,
            source,
        })?;
    Ok(out)
}

fn encode_jpeg(raster: &Raster, quality: Quality) -> Result<Vec<u8>, CodecError> {
    let rgb = flatten_onto_white(&raster.image);
    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality.value() as u8);
    if let Some(icc) = &raster.icc {
        encoder.set_icc_profile(icc.clone()).ok();
    }
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

/// Composite an image over a solid white background, discarding alpha.
///
/// Required for JPEG output; also used for the blur placeholder.
pub(crate) fn flatten_onto_white(image: &DynamicImage) -> RgbImage {
    if !image.color().has_alpha() {
        return image.to_rgb8();
    }
    let rgba = image.to_rgba8();
    let mut rgb = RgbImage::new(rgba.width(), rgba.height());
    for (src, dst) in rgba.pixels().zip(rgb.pixels_mut()) {
        let a = src[3] as u16;
        for c in 0..3 {
            // out = src * a + white * (1 - a), rounded
            dst[c] = ((src[c] as u16 * a + 255 * (255 - a) + 127) / 255) as u8;
        }
    }
    rgb
}
