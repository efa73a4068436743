use clap::{Parser, Subcommand};
use pixelmill::config::{self, PipelineConfig};
use pixelmill::imaging::{CommandSegmenter, ResizeMode};
use pixelmill::pipeline::{self, VariantFailure};
use pixelmill::request::{self, ProcessingRequest};
use pixelmill::output;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup — trivial, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "pixelmill")]
#[command(about = "Image pipeline: background removal, responsive sizes, optimized formats")]
#[command(long_about = "\
Image pipeline: background removal, responsive sizes, optimized formats

Takes one source image and produces a variant per requested (size, format)
combination, each resized with Lanczos3 and encoded at the smallest byte
size the format allows at the requested quality. Optionally removes the
background via an external segmentation tool and emits a tiny blurred
placeholder for progressive loading.

Output files follow the {name}_{width}.{format} pattern:

  photo.jpg --sizes 400,800 --formats webp
  → processed/photo_400.webp
  → processed/photo_800.webp

A variant that cannot be produced (e.g. AVIF support not compiled in) is
reported as a failure next to its successful siblings; the run still
succeeds.

Run 'pixelmill gen-config' to generate a documented pixelmill.toml.")]
#[command(version = version_string())]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process one image into optimized variants
    Process(ProcessArgs),
    /// Print a stock pixelmill.toml with all options documented
    GenConfig,
}

#[derive(clap::Args)]
struct ProcessArgs {
    /// Source image file
    input: PathBuf,

    /// Directory for variant outputs
    #[arg(long, default_value = "processed")]
    output: PathBuf,

    /// Config file (built-in defaults apply when absent)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Comma-separated output formats (webp,avif,png,jpeg)
    #[arg(long)]
    formats: Option<String>,

    /// Comma-separated target widths
    #[arg(long)]
    sizes: Option<String>,

    /// Encode quality 1-100
    #[arg(long)]
    quality: Option<u32>,

    /// Remove the background before encoding
    #[arg(long)]
    remove_bg: bool,

    /// Skip size-optimized encoding
    #[arg(long)]
    no_optimize: bool,

    /// Skip the blur placeholder
    #[arg(long)]
    no_placeholder: bool,

    /// Resize mode: contain, cover, or fill
    #[arg(long)]
    resize_mode: Option<ResizeMode>,

    /// Allow target widths beyond the source width
    #[arg(long)]
    allow_upscale: bool,

    /// Print the full result envelope as JSON instead of the summary
    #[arg(long)]
    json: bool,

    /// External segmentation command (default: rembg)
    #[arg(long)]
    segmenter: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Process(args) => run_process(args),
        Command::GenConfig => {
            print!("{}", toml::to_string_pretty(&PipelineConfig::default())?);
            Ok(())
        }
    }
}

fn run_process(args: ProcessArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => config::load(path)?,
        None => PipelineConfig::default(),
    };
    init_thread_pool(&config.processing);

    let bytes = std::fs::read(&args.input)?;
    let filename = args
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let request = build_request(&args, &config)?;
    let segmenter = match &args.segmenter {
        Some(command) => CommandSegmenter::new(command.clone(), vec![]),
        None => CommandSegmenter::rembg(),
    };

    let mut result =
        pipeline::process_with_segmenter(&bytes, &filename, &request, &config, &segmenter)?;

    // Persist variants; a write failure demotes that variant to a failure
    // entry without touching its siblings.
    std::fs::create_dir_all(&args.output)?;
    let mut persisted = Vec::with_capacity(result.processed.len());
    for variant in result.processed.drain(..) {
        let path = args.output.join(&variant.filename);
        match std::fs::write(&path, &variant.bytes) {
            Ok(()) => persisted.push(variant),
            Err(e) => result.failures.push(VariantFailure::storage(
                variant.format,
                variant.size,
                format!("{}: {e}", path.display()),
            )),
        }
    }
    result.processed = persisted;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        output::print_result(&result);
    }
    Ok(())
}

fn build_request(
    args: &ProcessArgs,
    config: &PipelineConfig,
) -> Result<ProcessingRequest, Box<dyn std::error::Error>> {
    let mut request = ProcessingRequest::from_defaults(config);
    if let Some(formats) = &args.formats {
        request.formats = request::parse_formats(formats)?;
    }
    if let Some(sizes) = &args.sizes {
        request.sizes = request::parse_sizes(sizes)?;
    }
    if let Some(quality) = args.quality {
        request = request.with_quality(quality)?;
    }
    if let Some(mode) = args.resize_mode {
        request.resize_mode = mode;
    }
    request.remove_bg = args.remove_bg;
    request.allow_upscale = args.allow_upscale || config.resize.allow_upscale;
    if args.no_optimize {
        request.optimize = false;
    }
    if args.no_placeholder {
        request.generate_placeholder = false;
    }
    Ok(request)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores — user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
