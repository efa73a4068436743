//! # Pixelmill
//!
//! An image processing pipeline: one upload in, a set of optimized,
//! responsive variants out. Optional AI background removal, resizing to
//! multiple target widths, re-encoding to multiple formats, byte-size
//! optimization, metadata stripping, and a blurred inline placeholder —
//! with per-variant size and reduction statistics in the result.
//!
//! # Architecture: One Request, Staged
//!
//! Each call to [`pipeline::process`] runs a fixed stage order:
//!
//! ```text
//! validate → decode → scrub → (remove background) → expand variants → (placeholder)
//! ```
//!
//! The variant expansion is the cross-product of requested sizes and
//! formats. Cells are independent encode jobs sharing only the read-only
//! post-segmentation raster, so they fan out across a bounded rayon pool;
//! results are re-assembled in a canonical size-major order, making the
//! response deterministic regardless of scheduling.
//!
//! Failure policy is layered on purpose: request validation, decoding, and
//! an explicitly requested background removal fail the whole run; a single
//! variant failing (an encoder not compiled in, say) is recorded next to
//! its successful siblings and the run carries on.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Orchestration: stage order, fan-out/fan-in, partial-failure accumulation, the result envelope |
//! | [`request`] | Option parsing (comma-list forms included) and all-or-nothing validation |
//! | [`config`] | `pixelmill.toml` defaults and limits, validation, worker-count resolution |
//! | [`imaging`] | The pixel work: codec, resize, scrub, optimize, segmentation, placeholder |
//! | [`naming`] | Upload filename sanitization and the `{stem}_{size}.{format}` variant pattern |
//! | [`output`] | CLI presentation — pure `format_*` functions over the result |
//!
//! # Design Decisions
//!
//! ## Explicit Configuration, No Ambient State
//!
//! The pipeline entry point takes the configuration as an immutable value.
//! Nothing reads globals, so two requests with different configs can run in
//! the same process and tests can exercise any configuration directly.
//!
//! ## The Segmenter Seam
//!
//! Background removal is a trait ([`imaging::Segmenter`]) with a single
//! production implementation that shells out to an external pretrained
//! model tool. The pipeline only ever sees "raster in, alpha matte out",
//! which keeps model choice swappable and lets tests use a deterministic
//! fake instead of a 170 MB network download.
//!
//! ## Lossy WebP via libwebp
//!
//! The `image` crate's WebP encoder is lossless-only. Lossy WebP with a
//! quality knob is the single most common output of this pipeline, so
//! encoding goes through the `webp` crate (libwebp bindings) instead.
//!
//! ## AVIF Behind a Feature Gate
//!
//! AVIF encoding (rav1e via the `image` crate) costs minutes of build time.
//! It is compiled in only with the `avif` feature; without it, AVIF
//! variants fail with a recoverable per-variant error while the rest of the
//! request proceeds — the same path a deployment with a broken optional
//! codec would take.

pub mod config;
pub mod imaging;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod request;

#[cfg(test)]
pub(crate) mod test_helpers;
