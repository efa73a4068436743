//! Pipeline configuration.
//!
//! Handles loading and validating `pixelmill.toml`. Configuration is an
//! explicit immutable value handed into the pipeline entry point — nothing
//! reads ambient global state, so tests can run with any configuration they
//! like.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! quality = 95                   # Default encode quality (1-100)
//! sizes = [400, 800, 1200]       # Default target widths
//! formats = ["webp"]             # Default output formats
//! allowed_extensions = ["png", "jpg", "jpeg", "webp", "bmp"]
//! max_file_size = 10485760       # Upload ceiling in bytes (10 MiB)
//! strip_exif = true              # Scrub EXIF/ICC before encoding
//! optimize = true                # Size-optimized encoding by default
//! timeout_secs = 30              # Per-request deadline
//!
//! [resize]
//! mode = "contain"               # contain | cover | fill
//! allow_upscale = false          # Permit widths beyond the source width
//!
//! [placeholder]
//! enabled = true                 # Generate a blur placeholder
//! width = 20                     # Placeholder width in pixels
//! blur_sigma = 4.0               # Gaussian blur strength
//! quality = 60                   # Placeholder JPEG quality
//!
//! [processing]
//! max_processes = 4              # Max parallel workers (omit for auto = CPU cores)
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse — override just the values you want:
//!
//! ```toml
//! # Only lower the default quality
//! quality = 85
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::imaging::{OutputFormat, PlaceholderConfig, ResizeMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline defaults and limits loaded from `pixelmill.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Default encode quality for requests that don't specify one.
    pub quality: u32,
    /// Default target widths.
    pub sizes: Vec<u32>,
    /// Default output formats.
    pub formats: Vec<OutputFormat>,
    /// Upload extensions accepted at validation time.
    pub allowed_extensions: Vec<String>,
    /// Upload size ceiling in bytes.
    pub max_file_size: u64,
    /// Scrub embedded metadata before encoding.
    pub strip_exif: bool,
    /// Use size-optimized encoding by default.
    pub optimize: bool,
    /// Per-request deadline in seconds.
    pub timeout_secs: u64,
    /// Resize behavior.
    pub resize: ResizeConfig,
    /// Blur placeholder settings.
    pub placeholder: PlaceholderConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quality: 95,
            sizes: vec![400, 800, 1200],
            formats: vec![OutputFormat::Webp],
            allowed_extensions: ["png", "jpg", "jpeg", "webp", "bmp"]
                .map(String::from)
                .to_vec(),
            max_file_size: 10 * 1024 * 1024,
            strip_exif: true,
            optimize: true,
            timeout_secs: 30,
            resize: ResizeConfig::default(),
            placeholder: PlaceholderConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=100).contains(&self.quality) {
            return Err(ConfigError::Validation("quality must be 1-100".into()));
        }
        if self.sizes.is_empty() {
            return Err(ConfigError::Validation("sizes must not be empty".into()));
        }
        if self.sizes.contains(&0) {
            return Err(ConfigError::Validation("sizes must be positive".into()));
        }
        if self.formats.is_empty() {
            return Err(ConfigError::Validation("formats must not be empty".into()));
        }
        if self.allowed_extensions.is_empty() {
            return Err(ConfigError::Validation(
                "allowed_extensions must not be empty".into(),
            ));
        }
        if self.max_file_size == 0 {
            return Err(ConfigError::Validation(
                "max_file_size must be positive".into(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be positive".into(),
            ));
        }
        if self.placeholder.width == 0 {
            return Err(ConfigError::Validation(
                "placeholder.width must be positive".into(),
            ));
        }
        if !(1..=100).contains(&self.placeholder.quality) {
            return Err(ConfigError::Validation(
                "placeholder.quality must be 1-100".into(),
            ));
        }
        Ok(())
    }
}

/// Resize behavior shared by all requests unless overridden.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResizeConfig {
    /// Default resize mode.
    pub mode: ResizeMode,
    /// Permit target widths beyond the source's native width.
    pub allow_upscale: bool,
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel encode workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

/// Load and validate a config file.
pub fn load(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: PipelineConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.quality, 95);
        assert_eq!(config.sizes, vec![400, 800, 1200]);
        assert_eq!(config.formats, vec![OutputFormat::Webp]);
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert!(config.strip_exif);
        assert!(config.optimize);
        assert!(config.placeholder.enabled);
        assert_eq!(config.placeholder.width, 20);
        config.validate().unwrap();
    }

    #[test]
    fn sparse_toml_overrides() {
        let config: PipelineConfig = toml::from_str(
            r#"
            quality = 85
            formats = ["webp", "avif"]

            [resize]
            allow_upscale = true
            "#,
        )
        .unwrap();

        assert_eq!(config.quality, 85);
        assert_eq!(
            config.formats,
            vec![OutputFormat::Webp, OutputFormat::Avif]
        );
        assert!(config.resize.allow_upscale);
        // Untouched values keep their defaults
        assert_eq!(config.sizes, vec![400, 800, 1200]);
        assert_eq!(config.resize.mode, ResizeMode::Contain);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let result = toml::from_str::<PipelineConfig>("qualty = 85");
        assert!(result.is_err());
    }

    #[test]
    fn out_of_range_quality_fails_validation() {
        let config = PipelineConfig {
            quality: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn empty_sizes_fail_validation() {
        let config = PipelineConfig {
            sizes: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_size_fails_validation() {
        let config = PipelineConfig {
            sizes: vec![400, 0],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn effective_threads_clamps_to_cores() {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let auto = ProcessingConfig { max_processes: None };
        assert_eq!(effective_threads(&auto), cores);

        let constrained = ProcessingConfig {
            max_processes: Some(1),
        };
        assert_eq!(effective_threads(&constrained), 1);

        let oversized = ProcessingConfig {
            max_processes: Some(cores + 100),
        };
        assert_eq!(effective_threads(&oversized), cores);
    }

    #[test]
    fn load_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixelmill.toml");
        std::fs::write(&path, "quality = 70\nsizes = [320]\n").unwrap();

        let config = load(&path).unwrap();
        assert_eq!(config.quality, 70);
        assert_eq!(config.sizes, vec![320]);
    }

    #[test]
    fn load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pixelmill.toml");
        std::fs::write(&path, "quality = 400\n").unwrap();
        assert!(matches!(load(&path), Err(ConfigError::Validation(_))));
    }
}
