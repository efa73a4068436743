//! Background removal behind an opaque segmentation capability.
//!
//! The [`Segmenter`] trait is the seam: given a raster, produce an alpha
//! matte (a grayscale image where 255 means foreground and 0 means
//! background). Everything about *how* the matte is produced — which model,
//! which runtime — stays behind the trait, so the pipeline and its tests
//! never depend on model accuracy or availability.
//!
//! The production implementation, [`CommandSegmenter`], hands the raster to
//! an external pretrained-model tool (by default the `rembg` CLI in
//! mask-only mode) via temporary PNG files. Tests substitute a fake that
//! marks a fixed border region as background.
//!
//! [`remove_background`] applies a matte to a raster: the output is always
//! RGBA, only the alpha channel is written, and color channels are never
//! modified. A refinement pass then zeroes stray near-transparent alpha so
//! matting halos do not survive encoding.

use super::raster::Raster;
use image::imageops::FilterType;
use image::{imageops, DynamicImage, GrayImage, RgbaImage};
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SegmentationError {
    #[error("segmentation command failed: {0}")]
    Command(String),
    #[error("segmentation produced an unusable matte: {0}")]
    BadMatte(String),
    #[error("IO error during segmentation: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-pixel alpha coverage: 255 = keep, 0 = background.
pub type AlphaMatte = GrayImage;

/// An opaque foreground/background segmentation capability.
pub trait Segmenter: Sync {
    /// Produce an alpha matte for the raster, ideally at its exact
    /// dimensions. A matte at a different scale is resampled by the caller.
    fn matte(&self, raster: &Raster) -> Result<AlphaMatte, SegmentationError>;
}

/// Alpha values below this after matting are treated as matting noise and
/// zeroed, so faint halos around the subject do not survive encoding.
const ALPHA_FLOOR: u8 = 20;

/// Segmenter backed by an external command-line tool.
///
/// The tool is invoked as `<command> <args...> <input.png> <matte.png>` with
/// both paths inside a private temporary directory. The default wiring runs
/// `rembg i -om`, which writes the mask alone rather than a composited
/// image.
pub struct CommandSegmenter {
    command: PathBuf,
    args: Vec<String>,
}

impl CommandSegmenter {
    pub fn new(command: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// The default external engine: `rembg i -om input output`.
    pub fn rembg() -> Self {
        Self::new("rembg", vec!["i".into(), "-om".into()])
    }
}

impl Segmenter for CommandSegmenter {
    fn matte(&self, raster: &Raster) -> Result<AlphaMatte, SegmentationError> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("input.png");
        let output = dir.path().join("matte.png");

        raster
            .image
            .save_with_format(&input, image::ImageFormat::Png)
            .map_err(|e| SegmentationError::Command(format!("staging input failed: {e}")))?;

        let status = Command::new(&self.command)
            .args(&self.args)
            .arg(&input)
            .arg(&output)
            .output()
            .map_err(|e| {
                SegmentationError::Command(format!("{}: {e}", self.command.display()))
            })?;
        if !status.status.success() {
            return Err(SegmentationError::Command(format!(
                "{} exited with {}: {}",
                self.command.display(),
                status.status,
                String::from_utf8_lossy(&status.stderr).trim()
            )));
        }

        let matte = image::open(&output)
            .map_err(|e| SegmentationError::BadMatte(e.to_string()))?
            .to_luma8();
        debug!(
            width = matte.width(),
            height = matte.height(),
            "external segmenter produced matte"
        );
        Ok(matte)
    }
}

/// Apply the segmenter's matte to the raster.
///
/// The output raster is RGBA regardless of the input mode. Detected
/// background becomes transparent; foreground color values pass through
/// unchanged. Existing transparency is respected — the matte can only make
/// pixels more transparent, never less.
pub fn remove_background(
    segmenter: &dyn Segmenter,
    raster: &Raster,
) -> Result<Raster, SegmentationError> {
    let matte = segmenter.matte(raster)?;
    let matte = conform_matte(matte, raster.dimensions())?;

    let mut rgba: RgbaImage = raster.image.to_rgba8();
    for (pixel, coverage) in rgba.pixels_mut().zip(matte.pixels()) {
        let combined = pixel[3] as u16 * coverage[0] as u16 / 255;
        pixel[3] = combined as u8;
    }
    refine_alpha(&mut rgba, ALPHA_FLOOR);

    Ok(raster.with_image(DynamicImage::ImageRgba8(rgba)))
}

/// Resample the matte to the raster's dimensions if the model returned a
/// different scale; reject empty mattes outright.
fn conform_matte(matte: AlphaMatte, target: (u32, u32)) -> Result<AlphaMatte, SegmentationError> {
    if matte.width() == 0 || matte.height() == 0 {
        return Err(SegmentationError::BadMatte("matte has zero area".into()));
    }
    if matte.dimensions() == target {
        return Ok(matte);
    }
    Ok(imageops::resize(
        &matte,
        target.0,
        target.1,
        FilterType::Lanczos3,
    ))
}

/// Zero out alpha below the floor. Matting models leave faint coverage in
/// background areas; once encoded and composited those show up as halos.
fn refine_alpha(image: &mut RgbaImage, floor: u8) {
    for pixel in image.pixels_mut() {
        if pixel[3] < floor {
            pixel[3] = 0;
        }
    }
}
