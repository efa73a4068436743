//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Output is information-centric: the header line is the source image's
//! identity (name, dimensions, mode, size), each variant line leads with the
//! requested width and format, and failures are listed inline where the
//! variant would have been, so the cross-product remains visible.
//!
//! ```text
//! photo.jpg (3000x2000 RGB, 2.4 MB)
//!     400 webp: photo_400.webp — 18.2 KB (99.2% smaller)
//!     800 webp: photo_800.webp — 54.1 KB (97.8% smaller)
//!     800 avif: failed (format unavailable) — avif encoding is not available in this build
//!     placeholder: inline (412 B)
//! Processed 2 variants, 1 failure in 1.2s
//! ```
//!
//! # Architecture
//!
//! Each entity has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure — no I/O, no side effects.

use crate::pipeline::{FailureKind, ProcessingResult};
use std::time::Duration;

/// Format a byte count in the conventional human-readable form.
///
/// `512` → `"512 B"`, `126_976` → `"124.0 KB"`, `2_516_582` → `"2.4 MB"`.
pub fn format_file_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: f64 = 1024.0 * 1024.0;
    let b = bytes as f64;
    if b < KIB {
        format!("{bytes} B")
    } else if b < MIB {
        format!("{:.1} KB", b / KIB)
    } else {
        format!("{:.1} MB", b / MIB)
    }
}

/// Format a duration as `"340ms"` below one second, `"3.2s"` above.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else {
        format!("{secs:.1}s")
    }
}

/// Render a processing result as display lines.
pub fn format_result(result: &ProcessingResult) -> Vec<String> {
    let mut lines = Vec::new();

    let original = &result.original;
    lines.push(format!(
        "{} ({} {}, {})",
        original.filename, original.dimensions, original.mode, original.size
    ));

    for variant in &result.processed {
        lines.push(format!(
            "    {} {}: {} — {} ({} smaller)",
            variant.size, variant.format, variant.filename, variant.filesize, variant.reduction
        ));
    }

    for failure in &result.failures {
        lines.push(format!(
            "    {} {}: failed ({}) — {}",
            failure.size,
            failure.format,
            failure_label(failure.kind),
            failure.message
        ));
    }

    if let Some(placeholder) = &result.placeholder {
        lines.push(format!(
            "    placeholder: inline ({})",
            format_file_size(placeholder.bytes.len() as u64)
        ));
    }

    let failures = result.failures.len();
    lines.push(format!(
        "Processed {} variant{}, {} failure{} in {}",
        result.processed.len(),
        plural(result.processed.len()),
        failures,
        plural(failures),
        result.processing_time
    ));

    lines
}

/// Print a processing result to stdout.
pub fn print_result(result: &ProcessingResult) {
    for line in format_result(result) {
        println!("{line}");
    }
}

fn failure_label(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::FormatUnavailable => "format unavailable",
        FailureKind::InvalidDimension => "invalid dimension",
        FailureKind::EncodeFailed => "encode failed",
        FailureKind::StorageWrite => "storage write failed",
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_sizes_match_convention() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.0 KB");
        assert_eq!(format_file_size(126_976), "124.0 KB");
        assert_eq!(format_file_size(2_516_582), "2.4 MB");
    }

    #[test]
    fn durations_switch_units_at_one_second() {
        assert_eq!(format_duration(Duration::from_millis(340)), "340ms");
        assert_eq!(format_duration(Duration::from_millis(3200)), "3.2s");
        assert_eq!(format_duration(Duration::from_secs(2)), "2.0s");
    }
}
