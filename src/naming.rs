//! Centralized filename handling for uploads and variants.
//!
//! Upload filenames come from untrusted collaborators, so they are sanitized
//! before any use: path components are dropped and unsafe characters are
//! removed. Every generated variant then follows the same derived pattern:
//!
//! - `photo.jpg`, width 800, WebP → `photo_800.webp`
//! - `my vacation pic.png`, width 400, AVIF → `my_vacation_pic_400.avif`
//!
//! This module is the single place that knows the pattern; the pipeline and
//! any storage collaborator both derive names through it.

use crate::imaging::OutputFormat;

/// Sanitize an upload filename.
///
/// Drops any directory components, removes characters outside
/// `[A-Za-z0-9._-]` and whitespace, then collapses whitespace runs into a
/// single underscore. An input with nothing usable left becomes `"image"`.
pub fn sanitize_filename(filename: &str) -> String {
    // Last path component only, whichever separator the client used
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    let kept: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') || c.is_whitespace())
        .collect();

    let mut out = String::with_capacity(kept.len());
    let mut in_whitespace = false;
    for c in kept.chars() {
        if c.is_whitespace() {
            if !in_whitespace && !out.is_empty() {
                out.push('_');
            }
            in_whitespace = true;
        } else {
            out.push(c);
            in_whitespace = false;
        }
    }
    let out = out.trim_matches('_').to_string();

    if out.is_empty() || out.chars().all(|c| c == '.') {
        "image".to_string()
    } else {
        out
    }
}

/// Filename stem: everything before the final `.extension`.
pub fn file_stem(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    }
}

/// Lowercased extension, if the filename has one.
pub fn extension(filename: &str) -> Option<String> {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            Some(ext.to_ascii_lowercase())
        }
        _ => None,
    }
}

/// Derived output name for one variant: `{stem}_{size}.{format}`.
pub fn variant_filename(stem: &str, size: u32, format: OutputFormat) -> String {
    format!("{stem}_{size}.{}", format.extension())
}
