//! Image operations: decode/encode, resize, scrub, optimize, matte, blur.
//!
//! | Operation | Module | Crate / function |
//! |---|---|---|
//! | Sniff + decode | [`codec`] | `image` (`ImageReader::with_guessed_format`) |
//! | Encode WebP / AVIF / PNG / JPEG | [`codec`] | `webp`, `image` (rav1e behind `avif`) |
//! | Resize (contain / cover / fill) | [`resize`] | Lanczos3 via `image::imageops` |
//! | Metadata scrub | [`scrub`] | pure |
//! | Size optimization | [`optimize`] | tuned re-encode, never worse than naive |
//! | Background matte | [`segmentation`] | external model tool behind [`Segmenter`] |
//! | Blur placeholder | [`placeholder`] | `image` blur + JPEG |
//!
//! The module is split into:
//! - **Calculations**: pure functions for dimension math (unit testable)
//! - **Raster**: the owned pixels + metadata value passed between stages
//! - **Codec / Resize / Scrub / Optimize / Placeholder**: one concern each
//! - **Segmentation**: the [`Segmenter`] trait seam plus its production
//!   implementation

pub mod calculations;
pub mod codec;
pub mod optimize;
pub mod placeholder;
pub mod raster;
pub mod resize;
pub mod scrub;
pub mod segmentation;

pub use calculations::{aspect_height, clamp_width};
pub use codec::{decode, encode, CodecError, OutputFormat, Quality};
pub use optimize::optimize;
pub use placeholder::{generate_placeholder, PlaceholderConfig};
pub use raster::Raster;
pub use resize::{resize, ResizeError, ResizeMode};
pub use scrub::strip_metadata;
pub use segmentation::{
    remove_background, AlphaMatte, CommandSegmenter, SegmentationError, Segmenter,
};
