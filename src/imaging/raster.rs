//! The in-memory raster type passed between pipeline stages.
//!
//! A [`Raster`] is a decoded pixel grid plus the ancillary metadata blocks
//! (ICC profile, raw EXIF) captured from the source container at decode time.
//! Pixels and metadata travel together so that stages which re-encode can
//! decide whether to carry the metadata forward, and the scrubbing stage can
//! drop it without touching pixels.
//!
//! Every stage that transforms pixels returns a new owned `Raster`; nothing
//! mutates a raster another stage still holds.

use image::DynamicImage;

/// Decoded pixel buffer with dimensions, color mode, and captured metadata.
#[derive(Debug, Clone)]
pub struct Raster {
    /// Pixel data. Color mode is whatever the decoder produced.
    pub image: DynamicImage,
    /// ICC color profile from the source container, if any.
    pub icc: Option<Vec<u8>>,
    /// Raw EXIF blob from the source container, if any.
    pub exif: Option<Vec<u8>>,
}

impl Raster {
    /// Wrap a freshly produced image with no attached metadata.
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            icc: None,
            exif: None,
        }
    }

    /// Replace the pixel data while carrying the metadata blocks forward.
    ///
    /// Used by stages (resize, background removal) whose output is still
    /// "the same photograph" as far as color management is concerned.
    pub fn with_image(&self, image: DynamicImage) -> Self {
        Self {
            image,
            icc: self.icc.clone(),
            exif: self.exif.clone(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    /// Color mode label in the conventional short form (`RGB`, `RGBA`, `L`, ...).
    pub fn mode(&self) -> &'static str {
        use image::ColorType::*;
        match self.image.color() {
            L8 => "L",
            La8 => "LA",
            Rgb8 => "RGB",
            Rgba8 => "RGBA",
            L16 => "L16",
            La16 => "LA16",
            Rgb16 => "RGB16",
            Rgba16 => "RGBA16",
            Rgb32F => "RGB32F",
            Rgba32F => "RGBA32F",
            _ => "unknown",
        }
    }
}
