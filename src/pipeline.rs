//! Request orchestration: validate → decode → (remove background) → expand
//! variants → (placeholder) → aggregate.
//!
//! One call to [`process`] handles one upload. The stages run in a fixed
//! order; the interesting policy is what happens when something fails:
//!
//! - **Validation and decode failures are fatal.** Nothing has been
//!   produced yet, so the whole request errors.
//! - **Background removal failures are fatal** — but only because the stage
//!   only runs when explicitly requested. Silently skipping it would change
//!   what the caller asked for.
//! - **Per-variant failures are recorded, not propagated.** Each (size,
//!   format) cell of the cross-product is independent; one cell failing
//!   (say, AVIF support not compiled in) must not cost the caller their
//!   WebP outputs. Even *all* cells failing still yields a success envelope
//!   with an empty variant list and a populated failure list.
//! - **Placeholder failures just omit the placeholder.**
//!
//! ## Variant expansion
//!
//! The cross-product is expanded **size-major**: all formats for the first
//! requested size, then all formats for the second, and so on. That order
//! is part of the response contract — results always appear in it, no
//! matter how the parallel encode jobs interleave. Each size is resized
//! exactly once and the resized raster is shared across that size's
//! formats; resampling is the expensive shared step, encoding is the
//! format-specific one.
//!
//! Sizes fan out over rayon's pool. Cells are independent and their outputs
//! immutable, so there is nothing to lock; the per-size result vectors are
//! collected in request order and flattened.
//!
//! ## Deadline
//!
//! A request-level deadline (config `timeout_secs`) is checked between
//! stages and before each size starts. Cancellation is cooperative: cells
//! already encoding run to completion, no new cells start, and the request
//! reports [`ProcessError::Timeout`].

use crate::config::PipelineConfig;
use crate::imaging::segmentation::{self, Segmenter};
use crate::imaging::{
    codec, optimize, placeholder, resize, scrub, CodecError, CommandSegmenter, OutputFormat,
    Raster, ResizeError, SegmentationError,
};
use crate::naming;
use crate::output;
use crate::request::{ProcessingRequest, RequestError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rayon::prelude::*;
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("invalid request: {0}")]
    Request(#[from] RequestError),
    #[error(transparent)]
    Decode(#[from] CodecError),
    #[error(transparent)]
    Segmentation(#[from] SegmentationError),
    #[error("request deadline of {0:?} exceeded")]
    Timeout(Duration),
}

/// Metadata about the upload, echoed back in the result.
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    /// Sanitized upload filename.
    pub filename: String,
    /// Filename stem used to derive variant names.
    pub stem: String,
    /// Sniffed container format (`jpeg`, `png`, ...).
    pub format: String,
    pub size: String,
    pub size_bytes: u64,
    pub width: u32,
    pub height: u32,
    /// `"3000x2000"` convenience form.
    pub dimensions: String,
    /// Color mode (`RGB`, `RGBA`, `L`, ...).
    pub mode: String,
}

impl SourceInfo {
    fn new(filename: &str, format: image::ImageFormat, byte_len: u64, raster: &Raster) -> Self {
        let filename = naming::sanitize_filename(filename);
        let stem = naming::file_stem(&filename).to_string();
        let (width, height) = raster.dimensions();
        Self {
            filename,
            stem,
            format: format!("{format:?}").to_ascii_lowercase(),
            size: output::format_file_size(byte_len),
            size_bytes: byte_len,
            width,
            height,
            dimensions: format!("{width}x{height}"),
            mode: raster.mode().to_string(),
        }
    }
}

/// One successfully produced (format, size) output.
///
/// The encoded bytes are carried for the storage collaborator but skipped
/// during serialization; the JSON envelope carries names and statistics.
#[derive(Debug, Clone, Serialize)]
pub struct Variant {
    pub format: OutputFormat,
    /// Requested target width.
    pub size: u32,
    /// Actual output width (differs from `size` when upscale clamping hit).
    pub width: u32,
    pub height: u32,
    /// `{stem}_{size}.{format}` — where the collaborator should persist it.
    pub filename: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub filesize: String,
    pub filesize_bytes: u64,
    /// Size reduction vs the source upload, e.g. `"97.8%"`. Floored at 0.
    pub reduction: String,
}

/// One failed (format, size) cell, recorded alongside its siblings.
#[derive(Debug, Clone, Serialize)]
pub struct VariantFailure {
    pub format: OutputFormat,
    pub size: u32,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    FormatUnavailable,
    InvalidDimension,
    EncodeFailed,
    StorageWrite,
}

impl VariantFailure {
    fn from_codec(format: OutputFormat, size: u32, error: &CodecError) -> Self {
        let kind = match error {
            CodecError::FormatUnavailable(_) => FailureKind::FormatUnavailable,
            _ => FailureKind::EncodeFailed,
        };
        Self {
            format,
            size,
            kind,
            message: error.to_string(),
        }
    }

    fn from_resize(format: OutputFormat, size: u32, error: &ResizeError) -> Self {
        Self {
            format,
            size,
            kind: FailureKind::InvalidDimension,
            message: error.to_string(),
        }
    }

    /// For storage collaborators: a variant that encoded fine but could not
    /// be persisted.
    pub fn storage(format: OutputFormat, size: u32, message: String) -> Self {
        Self {
            format,
            size,
            kind: FailureKind::StorageWrite,
            message,
        }
    }
}

/// Inline blur placeholder: raw JPEG bytes plus the ready-made data URI.
///
/// Serializes as the bare data-URI string.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct Placeholder {
    pub data_uri: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

impl Placeholder {
    fn from_jpeg_bytes(bytes: Vec<u8>) -> Self {
        Self {
            data_uri: format!("data:image/jpeg;base64,{}", BASE64.encode(&bytes)),
            bytes,
        }
    }
}

/// Echo of the options the run actually used.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedOptions {
    pub background_removed: bool,
    pub optimized: bool,
    pub quality: u32,
    pub formats: Vec<OutputFormat>,
    pub sizes: Vec<u32>,
}

/// Aggregate outcome of one processing run.
#[derive(Debug, Serialize)]
pub struct ProcessingResult {
    pub original: SourceInfo,
    /// Successful variants in canonical (size-major) order.
    pub processed: Vec<Variant>,
    /// Failed cells in the same canonical order.
    pub failures: Vec<VariantFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<Placeholder>,
    /// Human-readable elapsed time, e.g. `"1.2s"`.
    pub processing_time: String,
    #[serde(skip)]
    pub elapsed: Duration,
    pub options: ResolvedOptions,
}

/// Process an upload with the default (external-tool) segmenter.
pub fn process(
    bytes: &[u8],
    filename: &str,
    request: &ProcessingRequest,
    config: &PipelineConfig,
) -> Result<ProcessingResult, ProcessError> {
    let segmenter = CommandSegmenter::rembg();
    process_with_segmenter(bytes, filename, request, config, &segmenter)
}

/// Process an upload using a specific segmenter (allows testing with a fake).
pub fn process_with_segmenter(
    bytes: &[u8],
    filename: &str,
    request: &ProcessingRequest,
    config: &PipelineConfig,
    segmenter: &dyn Segmenter,
) -> Result<ProcessingResult, ProcessError> {
    let started = Instant::now();
    let timeout = Duration::from_secs(config.timeout_secs);
    let deadline = started + timeout;

    request.validate(filename, bytes.len() as u64, config)?;

    let (decoded, format) = codec::decode(bytes)?;
    let source = SourceInfo::new(filename, format, bytes.len() as u64, &decoded);
    debug!(
        filename = %source.filename,
        format = %source.format,
        dimensions = %source.dimensions,
        "decoded upload"
    );

    let working = if config.strip_exif {
        scrub::strip_metadata(&decoded)
    } else {
        decoded
    };
    check_deadline(deadline, timeout)?;

    let working = if request.remove_bg {
        let matted = segmentation::remove_background(segmenter, &working)?;
        debug!("background removed");
        matted
    } else {
        working
    };
    check_deadline(deadline, timeout)?;

    // Fan out one job per requested size; each job resizes once and encodes
    // every requested format from the shared resized raster. Collection
    // preserves request order, which *is* the canonical order.
    let per_size: Vec<Vec<Result<Variant, VariantFailure>>> = request
        .sizes
        .par_iter()
        .map(|&size| expand_size(size, &working, request, &source, deadline))
        .collect();
    check_deadline(deadline, timeout)?;

    let mut processed = Vec::new();
    let mut failures = Vec::new();
    for outcome in per_size.into_iter().flatten() {
        match outcome {
            Ok(variant) => processed.push(variant),
            Err(failure) => failures.push(failure),
        }
    }

    let placeholder = if request.generate_placeholder {
        match placeholder::generate_placeholder(&working, &config.placeholder) {
            Ok(bytes) => Some(Placeholder::from_jpeg_bytes(bytes)),
            Err(error) => {
                warn!(%error, "placeholder generation failed, omitting");
                None
            }
        }
    } else {
        None
    };

    let elapsed = started.elapsed();
    Ok(ProcessingResult {
        original: source,
        processed,
        failures,
        placeholder,
        processing_time: output::format_duration(elapsed),
        elapsed,
        options: ResolvedOptions {
            background_removed: request.remove_bg,
            optimized: request.optimize,
            quality: request.quality.value(),
            formats: request.formats.clone(),
            sizes: request.sizes.clone(),
        },
    })
}

/// Produce every requested format at one target size.
///
/// Returns an empty vector when the deadline has already passed — the caller
/// notices and converts the whole run into a timeout.
fn expand_size(
    size: u32,
    raster: &Raster,
    request: &ProcessingRequest,
    source: &SourceInfo,
    deadline: Instant,
) -> Vec<Result<Variant, VariantFailure>> {
    if Instant::now() >= deadline {
        return Vec::new();
    }

    let resized = match resize::resize(
        raster,
        size,
        None,
        request.resize_mode,
        request.allow_upscale,
    ) {
        Ok(resized) => resized,
        Err(error) => {
            return request
                .formats
                .iter()
                .map(|&format| Err(VariantFailure::from_resize(format, size, &error)))
                .collect();
        }
    };

    request
        .formats
        .iter()
        .map(|&format| {
            let encoded = if request.optimize {
                optimize::optimize(&resized, format, request.quality)
            } else {
                codec::encode(&resized, format, request.quality)
            };
            match encoded {
                Ok(bytes) => Ok(build_variant(source, format, size, &resized, bytes)),
                Err(error) => {
                    warn!(%format, size, %error, "variant failed");
                    Err(VariantFailure::from_codec(format, size, &error))
                }
            }
        })
        .collect()
}

fn build_variant(
    source: &SourceInfo,
    format: OutputFormat,
    size: u32,
    resized: &Raster,
    bytes: Vec<u8>,
) -> Variant {
    let filesize_bytes = bytes.len() as u64;
    Variant {
        format,
        size,
        width: resized.width(),
        height: resized.height(),
        filename: naming::variant_filename(&source.stem, size, format),
        filesize: output::format_file_size(filesize_bytes),
        filesize_bytes,
        reduction: format!(
            "{:.1}%",
            reduction_percent(source.size_bytes, filesize_bytes)
        ),
        bytes,
    }
}

/// Percentage saved vs the original upload, floored at zero.
fn reduction_percent(original: u64, new: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    ((original as f64 - new as f64) / original as f64 * 100.0).max(0.0)
}

fn check_deadline(deadline: Instant, timeout: Duration) -> Result<(), ProcessError> {
    if Instant::now() >= deadline {
        Err(ProcessError::Timeout(timeout))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::segmentation::tests::{BorderSegmenter, FailingSegmenter};
    use crate::test_helpers::jpeg_bytes;

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    fn request(config: &PipelineConfig) -> ProcessingRequest {
        ProcessingRequest::from_defaults(config)
    }

    fn run(
        bytes: &[u8],
        filename: &str,
        request: &ProcessingRequest,
        config: &PipelineConfig,
    ) -> ProcessingResult {
        process_with_segmenter(bytes, filename, request, config, &BorderSegmenter { border: 2 })
            .unwrap()
    }

    #[test]
    fn end_to_end_two_webp_sizes() {
        let source = jpeg_bytes(3000, 2000);
        let config = config();
        let mut req = request(&config).with_quality(85).unwrap();
        req.sizes = vec![400, 800];
        req.formats = vec![OutputFormat::Webp];

        let result = run(&source, "photo.jpg", &req, &config);

        assert_eq!(result.processed.len(), 2);
        assert!(result.failures.is_empty());

        let first = &result.processed[0];
        assert_eq!(first.format, OutputFormat::Webp);
        assert_eq!((first.size, first.width, first.height), (400, 400, 267));
        assert_eq!(first.filename, "photo_400.webp");

        let second = &result.processed[1];
        assert_eq!((second.size, second.width, second.height), (800, 800, 533));
        assert_eq!(second.filename, "photo_800.webp");

        for variant in &result.processed {
            assert!(variant.filesize_bytes < result.original.size_bytes);
            assert!(!variant.bytes.is_empty());
            assert!(variant.reduction.ends_with('%'));
        }

        assert_eq!(result.original.width, 3000);
        assert_eq!(result.original.format, "jpeg");
        assert_eq!(result.options.sizes, vec![400, 800]);
    }

    #[test]
    fn variant_order_is_size_major_and_deterministic() {
        let source = jpeg_bytes(1600, 1200);
        let config = config();
        let mut req = request(&config);
        req.sizes = vec![800, 400];
        req.formats = vec![OutputFormat::Webp, OutputFormat::Jpeg];
        req.generate_placeholder = false;

        let names = |result: &ProcessingResult| -> Vec<String> {
            result
                .processed
                .iter()
                .map(|v| v.filename.clone())
                .collect()
        };

        let first = run(&source, "a.jpg", &req, &config);
        assert_eq!(
            names(&first),
            vec![
                "a_800.webp".to_string(),
                "a_800.jpeg".to_string(),
                "a_400.webp".to_string(),
                "a_400.jpeg".to_string(),
            ]
        );

        // Repeated runs come back in the identical order regardless of how
        // the parallel cells interleaved.
        for _ in 0..3 {
            let again = run(&source, "a.jpg", &req, &config);
            assert_eq!(names(&again), names(&first));
        }
    }

    #[cfg(not(feature = "avif"))]
    #[test]
    fn avif_unavailable_fails_per_variant_not_per_request() {
        let source = jpeg_bytes(1000, 800);
        let config = config();
        let mut req = request(&config);
        req.sizes = vec![400, 800];
        req.formats = vec![OutputFormat::Webp, OutputFormat::Avif];

        let result = run(&source, "photo.jpg", &req, &config);

        // One webp success and one avif failure per size.
        assert_eq!(result.processed.len(), 2);
        assert_eq!(result.failures.len(), 2);
        assert!(result
            .processed
            .iter()
            .all(|v| v.format == OutputFormat::Webp));
        for failure in &result.failures {
            assert_eq!(failure.format, OutputFormat::Avif);
            assert_eq!(failure.kind, FailureKind::FormatUnavailable);
        }
        // Cross-product accounting holds.
        assert_eq!(result.processed.len() + result.failures.len(), 4);
    }

    #[cfg(not(feature = "avif"))]
    #[test]
    fn all_variants_failing_is_still_a_success_envelope() {
        let source = jpeg_bytes(600, 400);
        let config = config();
        let mut req = request(&config);
        req.formats = vec![OutputFormat::Avif];
        req.sizes = vec![200, 300];

        let result = run(&source, "photo.png", &req, &config);
        assert!(result.processed.is_empty());
        assert_eq!(result.failures.len(), 2);
        assert!(result.placeholder.is_some());
    }

    #[test]
    fn background_removal_adds_alpha_to_png_output() {
        let source = jpeg_bytes(200, 160);
        let config = config();
        let mut req = request(&config);
        req.remove_bg = true;
        req.formats = vec![OutputFormat::Png];
        req.sizes = vec![100];

        // Wide border: stays solidly transparent through the halving resize.
        let result = process_with_segmenter(
            &source,
            "photo.jpg",
            &req,
            &config,
            &BorderSegmenter { border: 40 },
        )
        .unwrap();
        assert!(result.options.background_removed);

        let variant = &result.processed[0];
        let (decoded, _) = codec::decode(&variant.bytes).unwrap();
        assert!(decoded.has_alpha(), "png output should carry alpha");
        // The faked border background must actually be transparent.
        assert_eq!(decoded.image.to_rgba8().get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn background_removal_failure_is_fatal() {
        let source = jpeg_bytes(100, 100);
        let config = config();
        let mut req = request(&config);
        req.remove_bg = true;

        let err =
            process_with_segmenter(&source, "photo.jpg", &req, &config, &FailingSegmenter)
                .unwrap_err();
        assert!(matches!(err, ProcessError::Segmentation(_)));
    }

    #[test]
    fn segmenter_not_invoked_when_not_requested() {
        // FailingSegmenter would error if consulted.
        let source = jpeg_bytes(100, 100);
        let config = config();
        let req = request(&config);
        process_with_segmenter(&source, "photo.jpg", &req, &config, &FailingSegmenter).unwrap();
    }

    #[test]
    fn validation_rejects_before_decoding() {
        let config = config();
        let req = request(&config);
        // Not an image at all, but the extension check fires first.
        let err = process(b"not an image", "file.txt", &req, &config).unwrap_err();
        assert!(matches!(
            err,
            ProcessError::Request(RequestError::DisallowedExtension { .. })
        ));
    }

    #[test]
    fn corrupt_payload_with_valid_extension_fails_decode() {
        let config = config();
        let req = request(&config);
        let err = process(b"not an image", "file.png", &req, &config).unwrap_err();
        assert!(matches!(err, ProcessError::Decode(_)));
    }

    #[test]
    fn placeholder_is_a_jpeg_data_uri() {
        let source = jpeg_bytes(800, 600);
        let config = config();
        let req = request(&config);

        let result = run(&source, "photo.jpg", &req, &config);
        let placeholder = result.placeholder.expect("placeholder requested");
        assert!(placeholder.data_uri.starts_with("data:image/jpeg;base64,"));
        assert!(!placeholder.bytes.is_empty());
    }

    #[test]
    fn placeholder_can_be_disabled() {
        let source = jpeg_bytes(400, 300);
        let config = config();
        let mut req = request(&config);
        req.generate_placeholder = false;

        let result = run(&source, "photo.jpg", &req, &config);
        assert!(result.placeholder.is_none());
    }

    #[test]
    fn oversize_request_widths_clamp_to_source() {
        let source = jpeg_bytes(500, 400);
        let config = config();
        let mut req = request(&config);
        req.sizes = vec![400, 1200];
        req.formats = vec![OutputFormat::Webp];

        let result = run(&source, "photo.jpg", &req, &config);
        assert_eq!(result.processed.len(), 2);
        assert_eq!(result.processed[0].width, 400);
        // Requested 1200 exceeds the 500px source → clamped, name keeps the
        // requested size.
        assert_eq!(result.processed[1].width, 500);
        assert_eq!(result.processed[1].size, 1200);
        assert_eq!(result.processed[1].filename, "photo_1200.webp");
    }

    #[test]
    fn zero_timeout_reports_timeout() {
        let source = jpeg_bytes(400, 300);
        let mut config = config();
        config.timeout_secs = 0;
        let req = request(&config);

        let err = process(&source, "photo.jpg", &req, &config).unwrap_err();
        assert!(matches!(err, ProcessError::Timeout(_)));
    }

    #[test]
    fn strip_exif_clears_metadata_before_encoding() {
        // A PNG with an embedded ICC profile: after a strip-enabled run, the
        // PNG variant must come back without one.
        let mut raster = crate::test_helpers::gradient_raster(64, 48);
        raster.icc = Some(vec![0u8; 128]);
        let source = codec::encode(&raster, OutputFormat::Png, crate::imaging::Quality::default())
            .unwrap();

        let config = config();
        let mut req = request(&config);
        req.formats = vec![OutputFormat::Png];
        req.sizes = vec![32];
        req.optimize = false;

        let result = run(&source, "art.png", &req, &config);
        let (decoded, _) = codec::decode(&result.processed[0].bytes).unwrap();
        assert_eq!(decoded.icc, None);
    }

    #[test]
    fn result_serializes_without_raw_bytes() {
        let source = jpeg_bytes(300, 200);
        let config = config();
        let req = request(&config);

        let result = run(&source, "photo.jpg", &req, &config);
        let json = serde_json::to_value(&result).unwrap();

        assert!(json["processed"][0]["filename"].is_string());
        assert!(json["processed"][0].get("bytes").is_none());
        assert!(json["placeholder"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
        assert_eq!(json["options"]["quality"], 95);
    }
}
