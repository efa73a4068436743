//! Pure calculation functions for resize geometry.
//!
//! All functions here are pure and testable without any I/O or pixel data.
//! The resizer calls these to turn a requested width (and optional height)
//! into exact output dimensions, then hands the numbers to the resampler.

/// Height that preserves the source aspect ratio at the given width.
///
/// ```
/// # use pixelmill::imaging::aspect_height;
/// // 3000x2000 source at width 800 → height 533
/// assert_eq!(aspect_height((3000, 2000), 800), 533);
/// ```
pub fn aspect_height(source: (u32, u32), width: u32) -> u32 {
    let (src_w, src_h) = source;
    (src_h as f64 * width as f64 / src_w as f64).round().max(1.0) as u32
}

/// Clamp a requested width to the source width unless upscaling is allowed.
pub fn clamp_width(source_width: u32, requested: u32, allow_upscale: bool) -> u32 {
    if allow_upscale {
        requested
    } else {
        requested.min(source_width)
    }
}

/// Largest dimensions that fit inside `bounds` while preserving the source
/// aspect ratio. At least one output dimension matches its bound.
pub fn fit_within(source: (u32, u32), bounds: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (max_w, max_h) = bounds;

    let src_aspect = src_w as f64 / src_h as f64;
    let bound_aspect = max_w as f64 / max_h as f64;

    if src_aspect > bound_aspect {
        // Source is wider: width is the limit
        (max_w, aspect_height(source, max_w))
    } else {
        // Source is taller (or equal): height is the limit
        let w = (src_w as f64 * max_h as f64 / src_h as f64).round().max(1.0) as u32;
        (w, max_h)
    }
}

/// Smallest dimensions that completely cover `target` while preserving the
/// source aspect ratio. One dimension matches the target, the other may
/// exceed it; the excess is cropped away afterwards.
pub fn cover_scale(source: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    let (src_w, src_h) = source;
    let (tgt_w, tgt_h) = target;

    let src_aspect = src_w as f64 / src_h as f64;
    let tgt_aspect = tgt_w as f64 / tgt_h as f64;

    if src_aspect > tgt_aspect {
        // Source is wider: height matches, width exceeds
        let w = (tgt_h as f64 * src_aspect).round().max(1.0) as u32;
        (w.max(tgt_w), tgt_h)
    } else {
        // Source is taller: width matches, height exceeds
        let h = (tgt_w as f64 / src_aspect).round().max(1.0) as u32;
        (tgt_w, h.max(tgt_h))
    }
}

/// Top-left origin of a centered crop of `target` out of `scaled`.
pub fn center_crop_origin(scaled: (u32, u32), target: (u32, u32)) -> (u32, u32) {
    (
        scaled.0.saturating_sub(target.0) / 2,
        scaled.1.saturating_sub(target.1) / 2,
    )
}
