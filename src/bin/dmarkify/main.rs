mod logging;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::Parser;

use dmarkify::{
    is_supported_image, Anchor, Bundle, Config, FontCatalog, ImageWatermark, TextWatermark,
    WatermarkRequest, Watermarker,
};

#[derive(Parser)]
#[command(
    name = "dmarkify",
    about = "Composite text and image watermarks onto images and bundle the results",
    version,
    after_help = "Colors: any CSS color (#rrggbb, rgb(), hsl(), names) or gradient(<start>, <end>).\n\
                  Positions: center, top-left, top-right, bottom-left, bottom-right."
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Input image files or directories
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Text to draw on every image
    #[arg(long)]
    text: Option<String>,

    /// Font name, looked up in the configured fonts directory
    #[arg(long)]
    font: Option<String>,

    /// Font size in pixels
    #[arg(long)]
    font_size: Option<u32>,

    /// Font size as a percentage of each image's width
    #[arg(long, conflicts_with = "font_size", value_parser = parse_percent)]
    font_size_percent: Option<f32>,

    /// Text rotation in degrees, clockwise
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    rotation: f32,

    /// Text color or gradient
    #[arg(long, default_value = "#000000")]
    color: String,

    /// Text opacity percentage (0-100)
    #[arg(long, default_value_t = 50.0, value_parser = parse_percent)]
    text_opacity: f32,

    /// Text position
    #[arg(long, default_value = "center")]
    text_position: Anchor,

    /// Image to overlay on every input
    #[arg(long)]
    image: Option<PathBuf>,

    /// Overlay width as a percentage of each image's width (may exceed 100)
    #[arg(long, default_value_t = 20.0, value_parser = parse_scale)]
    image_scale: f32,

    /// Overlay opacity percentage (0-100)
    #[arg(long, default_value_t = 50.0, value_parser = parse_percent)]
    image_opacity: f32,

    /// Overlay position
    #[arg(long, default_value = "center")]
    image_position: Anchor,

    /// Output directory (overrides the config file)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop at the first image that fails and keep nothing
    #[arg(long)]
    fail_fast: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn parse_percent(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not between 0 and 100"))
    }
}

fn parse_scale(s: &str) -> Result<f32, String> {
    let value: f32 = s.parse().map_err(|e| format!("{e}"))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("{value} is not a non-negative number"))
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet, cli.json_logs);

    match run(&cli) {
        Ok(bundle) => {
            print_bundle(&bundle, cli.quiet);
            if bundle.is_complete() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<Bundle> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(dir) = &cli.output_dir {
        config.output_dir.clone_from(dir);
    }
    config.fail_fast |= cli.fail_fast;

    let text = cli
        .text
        .as_ref()
        .map(|text| text_watermark(cli, &config, text))
        .transpose()?;
    let image = cli
        .image
        .as_ref()
        .map(|path| {
            let data = std::fs::read(path)
                .with_context(|| format!("failed to read watermark image {}", path.display()))?;
            anyhow::Ok(ImageWatermark {
                data,
                scale: cli.image_scale,
                opacity: cli.image_opacity,
                anchor: cli.image_position,
            })
        })
        .transpose()?;
    if text.is_none() && image.is_none() {
        tracing::warn!("no --text or --image given, images are re-encoded unchanged");
    }

    let mut requests = Vec::new();
    for path in collect_inputs(&cli.inputs)? {
        let data =
            std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
        let name = path.file_name().map_or_else(
            || path.display().to_string(),
            |f| f.to_string_lossy().into_owned(),
        );
        requests.push(WatermarkRequest {
            name,
            data,
            text: text.clone(),
            image: image.clone(),
        });
    }
    if requests.is_empty() {
        bail!("no supported images found in the given inputs");
    }

    let engine = Watermarker::new(config)?;
    Ok(engine.composite(&requests)?)
}

fn text_watermark(cli: &Cli, config: &Config, text: &str) -> anyhow::Result<TextWatermark> {
    let fonts = FontCatalog::new(&config.fonts_dir, &config.default_font);
    let font = fonts.resolve(cli.font.as_deref().unwrap_or(&config.default_font))?;
    Ok(TextWatermark {
        text: text.to_string(),
        font,
        font_size: cli.font_size,
        font_size_percent: cli.font_size_percent,
        rotation: cli.rotation,
        color: cli.color.clone(),
        opacity: cli.text_opacity,
        anchor: cli.text_position,
    })
}

/// Expand directories into their supported images, sorted by name.
fn collect_inputs(inputs: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("failed to read directory {}", input.display()))?
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().is_ok_and(|ft| ft.is_file()))
                .map(|e| e.path())
                .filter(|p| is_supported_image(p))
                .collect();
            found.sort();
            files.extend(found);
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            bail!("input path does not exist: {}", input.display());
        }
    }
    Ok(files)
}

fn print_bundle(bundle: &Bundle, quiet: bool) {
    for failure in &bundle.failures {
        eprintln!("[FAIL] {}: {}", failure.name, failure.error);
    }
    if !quiet {
        for result in &bundle.results {
            eprintln!("[OK] {} -> {}", result.source_name, file_name(&result.path));
        }
        eprintln!(
            "[Summary] Watermarked: {}, Failed: {} (Total: {})",
            bundle.results.len(),
            bundle.failures.len(),
            bundle.results.len() + bundle.failures.len()
        );
    }
    println!("{}", bundle.archive.display());
}

fn file_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().into_owned(),
    )
}
