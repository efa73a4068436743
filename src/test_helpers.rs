//! Shared test utilities for the pixelmill test suite.
//!
//! Synthetic raster and encoded-image builders used across the unit tests.
//! Gradients compress like photographs (poorly) and flat fills compress
//! like graphics (extremely well), which is exactly the spread the
//! optimizer and codec tests need.

use crate::imaging::Raster;
use image::{DynamicImage, ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};

/// An RGB raster with a smooth-ish two-axis gradient.
pub fn gradient_raster(width: u32, height: u32) -> Raster {
    let image = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    Raster::new(DynamicImage::ImageRgb8(image))
}

/// An RGB raster filled with a single color.
pub fn flat_raster(width: u32, height: u32) -> Raster {
    let image = RgbImage::from_pixel(width, height, Rgb([90, 120, 150]));
    Raster::new(DynamicImage::ImageRgb8(image))
}

/// An RGBA raster filled with one pixel value (alpha included).
pub fn rgba_raster(width: u32, height: u32, pixel: [u8; 4]) -> Raster {
    let image = RgbaImage::from_pixel(width, height, Rgba(pixel));
    Raster::new(DynamicImage::ImageRgba8(image))
}

/// In-memory JPEG bytes for a gradient image of the given dimensions.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let raster = gradient_raster(width, height);
    let rgb = raster.image.to_rgb8();
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, 90)
        .write_image(
            rgb.as_raw(),
            width,
            height,
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
    out
}

/// In-memory PNG bytes for a gradient image of the given dimensions.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let raster = gradient_raster(width, height);
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(
            raster.image.as_bytes(),
            width,
            height,
            image::ExtendedColorType::Rgb8,
        )
        .unwrap();
    out
}
