use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;

use qirust_artistic::background::Background;
use qirust_artistic::color::{ColorTable, ModuleColor};
use qirust_artistic::compose::ArtisticOptions;
use qirust_artistic::helper::{generate_matrix, render_artistic};
use qirust_artistic::matrix::ModuleMatrix;
use qirust_artistic::output::{encode_still, ColorMode, OutputKind};
use qirust_artistic::qrcode::QrCodeEcc;
use qirust_artistic::raster::{rasterize, scale_from_f64, PixelMode};
use qirust_artistic::svg::to_svg_string;

#[derive(Parser, Debug)]
#[command(name = "qirust-artistic", version, about = "Render QR codes, optionally over a background image")]
struct Cli {
    /// Text to encode.
    content: String,

    /// Output path; the extension selects the image kind (`.svg` writes a vector image).
    #[arg(long)]
    out: PathBuf,

    /// Background image (PNG, JPEG, GIF, WebP, SVG, ...). Animated backgrounds stay animated.
    #[arg(long)]
    background: Option<PathBuf>,

    /// Pixels per module; fractions are truncated.
    #[arg(long, default_value_t = 3.0)]
    scale: f64,

    /// Quiet zone in modules (default: 4).
    #[arg(long)]
    border: Option<u32>,

    /// Color of dark modules.
    #[arg(long)]
    dark: Option<ModuleColor>,

    /// Color of light modules.
    #[arg(long)]
    light: Option<ModuleColor>,

    /// JSON file with per-kind colors, e.g. `{"finder_dark": "#c00", "quiet_zone": null}`.
    #[arg(long)]
    colors: Option<PathBuf>,

    /// Pixel mode: 1, P or RGBA without background; 1, L, LA, RGB or RGBA with one.
    #[arg(long)]
    mode: Option<String>,

    /// Output image kind, overriding the extension of `--out`.
    #[arg(long)]
    kind: Option<OutputKind>,

    /// Deprecated alias of `--kind`.
    #[arg(long, hide = true, conflicts_with = "kind")]
    format: Option<OutputKind>,

    /// Error correction level (default: high with a background, low without).
    #[arg(long)]
    ecc: Option<QrCodeEcc>,

    /// Enable debug logging.
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let scale = scale_from_f64(cli.scale)?;
    let colors = load_colors(&cli)?;
    let kind = match (cli.kind, cli.format) {
        (Some(kind), _) => Some(kind),
        (None, Some(kind)) => {
            tracing::warn!("`--format` is deprecated, use `--kind` instead");
            Some(kind)
        }
        (None, None) => None,
    };

    let default_ecc = if cli.background.is_some() {
        QrCodeEcc::High
    } else {
        QrCodeEcc::Low
    };
    let matrix = generate_matrix(&cli.content, cli.ecc.unwrap_or(default_ecc))
        .context("encode content")?;

    if let Some(parent) = cli.out.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    match &cli.background {
        Some(background) => {
            let mut options = ArtisticOptions::new().scale(scale).colors(colors);
            options.border = cli.border;
            options.kind = kind;
            options.mode = cli.mode.as_deref().map(str::parse::<ColorMode>).transpose()?;
            render_artistic(
                &matrix,
                &Background::from_path(background),
                cli.out.as_path(),
                &options,
            )
            .with_context(|| format!("render '{}'", cli.out.display()))?;
        }
        None => write_plain(&cli, &matrix, scale, &colors, kind)?,
    }

    eprintln!("wrote {}", cli.out.display());
    Ok(())
}

fn load_colors(cli: &Cli) -> anyhow::Result<ColorTable> {
    let mut colors = match &cli.colors {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("read color table '{}'", path.display()))?;
            ColorTable::from_json(&json)?
        }
        None => ColorTable::default(),
    };
    if let Some(dark) = cli.dark {
        colors = colors.dark(dark);
    }
    if let Some(light) = cli.light {
        colors = colors.light(light);
    }
    Ok(colors)
}

fn write_plain(
    cli: &Cli,
    matrix: &ModuleMatrix,
    scale: u32,
    colors: &ColorTable,
    kind: Option<OutputKind>,
) -> anyhow::Result<()> {
    if kind.is_none() && is_svg(&cli.out) {
        let svg = to_svg_string(matrix, scale, cli.border, colors)?;
        std::fs::write(&cli.out, svg)
            .with_context(|| format!("write svg '{}'", cli.out.display()))?;
        return Ok(());
    }

    let mode = cli.mode.as_deref().map(str::parse::<PixelMode>).transpose()?;
    let img = rasterize(matrix, scale, cli.border, colors, mode)?;
    let kind = match kind {
        Some(kind) => kind,
        None => OutputKind::from_path(&cli.out)?,
    };
    if kind == OutputKind::Png {
        img.save_png(&cli.out)?;
    } else {
        let data = encode_still(&img.into_dynamic(), kind)?;
        std::fs::write(&cli.out, data)
            .with_context(|| format!("write image '{}'", cli.out.display()))?;
    }
    Ok(())
}

fn is_svg(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("svg"))
}
