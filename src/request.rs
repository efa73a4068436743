//! Request options: parsing and validation.
//!
//! A [`ProcessingRequest`] is the validated set of options for one pipeline
//! run. Collaborators (HTTP form fields, CLI flags) often carry formats and
//! sizes as comma-separated strings — [`parse_formats`] and [`parse_sizes`]
//! accept that form, trimming whitespace, dropping empty segments, and
//! de-duplicating while preserving first-seen order.
//!
//! Validation is all-or-nothing and happens before any pixel work: an
//! out-of-range quality, an empty format or size set, a disallowed upload
//! extension, or an oversized payload rejects the whole request.

use crate::config::PipelineConfig;
use crate::imaging::{OutputFormat, Quality, ResizeMode};
use crate::naming;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RequestError {
    #[error("quality must be between 1 and 100, got {0}")]
    InvalidQuality(u32),
    #[error("no output formats requested")]
    EmptyFormats,
    #[error("no output sizes requested")]
    EmptySizes,
    #[error("unknown output format: {0}")]
    UnknownFormat(String),
    #[error("invalid size value: {0}")]
    InvalidSize(String),
    #[error("file extension not allowed: .{extension} (allowed: {allowed})")]
    DisallowedExtension { extension: String, allowed: String },
    #[error("file too large: {actual} bytes (maximum {limit})")]
    FileTooLarge { actual: u64, limit: u64 },
}

/// Validated options for one processing run.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingRequest {
    /// Run the segmentation stage and emit transparency.
    pub remove_bg: bool,
    /// Output formats, de-duplicated, first-seen order.
    pub formats: Vec<OutputFormat>,
    /// Target widths, de-duplicated, first-seen order.
    pub sizes: Vec<u32>,
    pub quality: Quality,
    /// Use size-optimized encoding.
    pub optimize: bool,
    pub generate_placeholder: bool,
    pub resize_mode: ResizeMode,
    /// Permit target widths beyond the source's native width.
    pub allow_upscale: bool,
}

impl ProcessingRequest {
    /// A request carrying the configured defaults.
    pub fn from_defaults(config: &PipelineConfig) -> Self {
        Self {
            remove_bg: false,
            formats: dedup(config.formats.clone()),
            sizes: dedup(config.sizes.clone()),
            quality: Quality::new(config.quality),
            optimize: config.optimize,
            generate_placeholder: config.placeholder.enabled,
            resize_mode: config.resize.mode,
            allow_upscale: config.resize.allow_upscale,
        }
    }

    /// Replace the quality, rejecting out-of-range values.
    pub fn with_quality(mut self, quality: u32) -> Result<Self, RequestError> {
        self.quality = Quality::checked(quality).ok_or(RequestError::InvalidQuality(quality))?;
        Ok(self)
    }

    /// Check the request and the upload it applies to against config limits.
    ///
    /// Called by the pipeline before any decoding happens.
    pub fn validate(
        &self,
        filename: &str,
        byte_len: u64,
        config: &PipelineConfig,
    ) -> Result<(), RequestError> {
        if self.formats.is_empty() {
            return Err(RequestError::EmptyFormats);
        }
        if self.sizes.is_empty() {
            return Err(RequestError::EmptySizes);
        }
        if let Some(&bad) = self.sizes.iter().find(|&&s| s == 0) {
            return Err(RequestError::InvalidSize(bad.to_string()));
        }
        if Quality::checked(self.quality.value()).is_none() {
            return Err(RequestError::InvalidQuality(self.quality.value()));
        }

        let extension = naming::extension(filename).unwrap_or_default();
        if !config
            .allowed_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&extension))
        {
            return Err(RequestError::DisallowedExtension {
                extension,
                allowed: config.allowed_extensions.join(", "),
            });
        }

        if byte_len > config.max_file_size {
            return Err(RequestError::FileTooLarge {
                actual: byte_len,
                limit: config.max_file_size,
            });
        }
        Ok(())
    }
}

/// Parse a comma-separated format list (`"webp, avif"`).
pub fn parse_formats(input: &str) -> Result<Vec<OutputFormat>, RequestError> {
    let formats: Vec<OutputFormat> = input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<OutputFormat>()
                .map_err(|_| RequestError::UnknownFormat(s.to_string()))
        })
        .collect::<Result<_, _>>()?;
    if formats.is_empty() {
        return Err(RequestError::EmptyFormats);
    }
    Ok(dedup(formats))
}

/// Parse a comma-separated size list (`"400, 800"`).
pub fn parse_sizes(input: &str) -> Result<Vec<u32>, RequestError> {
    let sizes: Vec<u32> = input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<u32>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(RequestError::InvalidSize(s.to_string())),
        })
        .collect::<Result<_, _>>()?;
    if sizes.is_empty() {
        return Err(RequestError::EmptySizes);
    }
    Ok(dedup(sizes))
}

/// Drop duplicates, keeping first-seen order.
fn dedup<T: PartialEq>(values: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[test]
    fn defaults_mirror_config() {
        let request = ProcessingRequest::from_defaults(&config());
        assert!(!request.remove_bg);
        assert_eq!(request.formats, vec![OutputFormat::Webp]);
        assert_eq!(request.sizes, vec![400, 800, 1200]);
        assert_eq!(request.quality.value(), 95);
        assert!(request.optimize);
        assert!(request.generate_placeholder);
    }

    #[test]
    fn parse_formats_trims_and_dedups() {
        let formats = parse_formats(" webp, avif ,webp,, jpg").unwrap();
        assert_eq!(
            formats,
            vec![OutputFormat::Webp, OutputFormat::Avif, OutputFormat::Jpeg]
        );
    }

    #[test]
    fn parse_formats_rejects_unknown() {
        let err = parse_formats("webp,tiff").unwrap_err();
        assert!(matches!(err, RequestError::UnknownFormat(s) if s == "tiff"));
    }

    #[test]
    fn parse_formats_rejects_empty() {
        assert!(matches!(parse_formats(" , "), Err(RequestError::EmptyFormats)));
    }

    #[test]
    fn parse_sizes_trims_and_dedups() {
        assert_eq!(parse_sizes("400, 800,400,,1200").unwrap(), vec![400, 800, 1200]);
    }

    #[test]
    fn parse_sizes_rejects_zero_and_garbage() {
        assert!(matches!(
            parse_sizes("400,0"),
            Err(RequestError::InvalidSize(_))
        ));
        assert!(matches!(
            parse_sizes("400,huge"),
            Err(RequestError::InvalidSize(_))
        ));
    }

    #[test]
    fn with_quality_rejects_out_of_range() {
        let request = ProcessingRequest::from_defaults(&config());
        assert!(matches!(
            request.clone().with_quality(0),
            Err(RequestError::InvalidQuality(0))
        ));
        assert!(matches!(
            request.clone().with_quality(101),
            Err(RequestError::InvalidQuality(101))
        ));
        assert_eq!(request.with_quality(85).unwrap().quality.value(), 85);
    }

    #[test]
    fn validate_rejects_disallowed_extension() {
        let request = ProcessingRequest::from_defaults(&config());
        let err = request.validate("photo.tiff", 100, &config()).unwrap_err();
        assert!(matches!(err, RequestError::DisallowedExtension { .. }));
    }

    #[test]
    fn validate_rejects_missing_extension() {
        let request = ProcessingRequest::from_defaults(&config());
        assert!(request.validate("photo", 100, &config()).is_err());
    }

    #[test]
    fn validate_accepts_uppercase_extension() {
        let request = ProcessingRequest::from_defaults(&config());
        request.validate("PHOTO.JPG", 100, &config()).unwrap();
    }

    #[test]
    fn validate_rejects_oversize_payload() {
        let request = ProcessingRequest::from_defaults(&config());
        let limit = config().max_file_size;
        let err = request
            .validate("photo.jpg", limit + 1, &config())
            .unwrap_err();
        assert!(matches!(err, RequestError::FileTooLarge { .. }));
    }

    #[test]
    fn validate_rejects_empty_sets() {
        let mut request = ProcessingRequest::from_defaults(&config());
        request.formats.clear();
        assert!(matches!(
            request.validate("a.png", 10, &config()),
            Err(RequestError::EmptyFormats)
        ));

        let mut request = ProcessingRequest::from_defaults(&config());
        request.sizes.clear();
        assert!(matches!(
            request.validate("a.png", 10, &config()),
            Err(RequestError::EmptySizes)
        ));
    }
}
