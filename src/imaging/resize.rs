//! Resampling to target dimensions under a resize mode.
//!
//! Three modes, matching the conventional CSS `object-fit` vocabulary:
//!
//! - [`ResizeMode::Contain`] — scale to the target width, height derived from
//!   the aspect ratio (or, when an explicit height is given, fit inside the
//!   box). Never distorts, never crops. The default.
//! - [`ResizeMode::Cover`] — scale so the target box is completely filled,
//!   then center-crop the excess.
//! - [`ResizeMode::Fill`] — stretch to the exact dimensions, ignoring aspect
//!   ratio.
//!
//! Resampling always uses Lanczos3. Upscaling past the source width is
//! refused by clamping the target to the source width, unless the caller
//! passes `allow_upscale`.

use super::calculations::{aspect_height, center_crop_origin, clamp_width, cover_scale, fit_within};
use super::raster::Raster;
use image::imageops::FilterType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResizeError {
    #[error("invalid target dimension: {0}")]
    InvalidDimension(u32),
}

/// How a raster is mapped onto the target dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    #[default]
    Contain,
    Cover,
    Fill,
}

impl fmt::Display for ResizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResizeMode::Contain => "contain",
            ResizeMode::Cover => "cover",
            ResizeMode::Fill => "fill",
        };
        f.write_str(name)
    }
}

impl FromStr for ResizeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "contain" => Ok(ResizeMode::Contain),
            "cover" => Ok(ResizeMode::Cover),
            "fill" => Ok(ResizeMode::Fill),
            other => Err(format!("unknown resize mode: {other}")),
        }
    }
}

/// Resample a raster to the requested width (and optional height).
///
/// With `height = None` the height is derived from the source aspect ratio,
/// which makes all three modes produce the same dimensions; the modes only
/// diverge when an explicit height is requested. Returns a new raster; the
/// input is untouched.
pub fn resize(
    raster: &Raster,
    width: u32,
    height: Option<u32>,
    mode: ResizeMode,
    allow_upscale: bool,
) -> Result<Raster, ResizeError> {
    if width == 0 {
        return Err(ResizeError::InvalidDimension(width));
    }
    if height == Some(0) {
        return Err(ResizeError::InvalidDimension(0));
    }

    let source = raster.dimensions();
    let clamped_w = clamp_width(source.0, width, allow_upscale);
    // If the width was clamped, scale any explicit height by the same factor
    // so the requested box keeps its shape.
    let target_h = height.map(|h| {
        if clamped_w == width {
            h
        } else {
            (h as f64 * clamped_w as f64 / width as f64).round().max(1.0) as u32
        }
    });

    let image = match (mode, target_h) {
        (ResizeMode::Contain, None) | (ResizeMode::Cover, None) | (ResizeMode::Fill, None) => {
            let h = aspect_height(source, clamped_w);
            raster.image.resize_exact(clamped_w, h, FilterType::Lanczos3)
        }
        (ResizeMode::Contain, Some(h)) => {
            let (w, h) = fit_within(source, (clamped_w, h));
            raster.image.resize_exact(w, h, FilterType::Lanczos3)
        }
        (ResizeMode::Cover, Some(h)) => {
            let scaled_dims = cover_scale(source, (clamped_w, h));
            let scaled = raster
                .image
                .resize_exact(scaled_dims.0, scaled_dims.1, FilterType::Lanczos3);
            let (x, y) = center_crop_origin(scaled_dims, (clamped_w, h));
            scaled.crop_imm(x, y, clamped_w, h)
        }
        (ResizeMode::Fill, Some(h)) => {
            raster.image.resize_exact(clamped_w, h, FilterType::Lanczos3)
        }
    };

    Ok(raster.with_image(image))
}
