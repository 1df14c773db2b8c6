//! Convenience entry points.
//!
//! [`render_to_image`] and [`render_artistic`] work on a ready [`ModuleMatrix`]; the
//! `generate_*` functions encode text first.

use std::path::Path;

use crate::background::Background;
use crate::color::ColorTable;
use crate::compose::{compose, load_background, ArtisticOptions};
use crate::error::{ArtisticError, ArtisticResult};
use crate::matrix::ModuleMatrix;
use crate::output::OutputTarget;
use crate::qrcode::{QrCode, QrCodeEcc};
use crate::raster::{rasterize, validate_scale, RasterImage};
use crate::svg::to_svg_string;

/// Renders a module matrix into a plain image.
///
/// # Arguments
///
/// * `matrix` - The symbol to render.
/// * `scale` - Pixels per module, at least 1.
/// * `border` - Quiet zone in modules. `None` uses 4 for QR and 2 for Micro QR symbols.
/// * `colors` - Colors per module kind.
///
/// # Errors
///
/// Returns [`ArtisticError::InvalidParameter`] if `scale` is 0.
///
/// # Example
///
/// ```
/// use qirust_artistic::color::ColorTable;
/// use qirust_artistic::helper::render_to_image;
/// use qirust_artistic::matrix::ModuleMatrix;
/// use qirust_artistic::qrcode::{QrCode, QrCodeEcc};
///
/// let qr = QrCode::encode_text("Hello, World!", QrCodeEcc::Low).unwrap();
/// let img = render_to_image(&ModuleMatrix::from(&qr), 4, None, &ColorTable::default()).unwrap();
/// assert_eq!(img.dimensions(), (116, 116));
/// ```
pub fn render_to_image(
    matrix: &ModuleMatrix,
    scale: u32,
    border: Option<u32>,
    colors: &ColorTable,
) -> ArtisticResult<RasterImage> {
    rasterize(matrix, scale, border, colors, None)
}

/// Renders a module matrix over a background image and writes the result.
///
/// Animated GIF, APNG and WebP backgrounds produce an animation when the output kind can hold
/// one. The output is encoded completely before anything is written.
///
/// # Arguments
///
/// * `matrix` - The symbol to render.
/// * `background` - Path or bytes of the background image.
/// * `target` - A path (the kind is inferred from its extension) or an `io::Write`.
/// * `options` - Scale, quiet zone, colors, pixel mode and output kind.
///
/// # Errors
///
/// Returns [`ArtisticError::InvalidParameter`] for a zero scale or when the output kind is
/// neither given nor inferable, and [`ArtisticError::UnsupportedFormat`] when the background
/// cannot be decoded or the kind cannot hold the result.
///
/// # Example
///
/// ```no_run
/// use qirust_artistic::background::Background;
/// use qirust_artistic::compose::ArtisticOptions;
/// use qirust_artistic::helper::render_artistic;
/// use qirust_artistic::matrix::ModuleMatrix;
/// use qirust_artistic::qrcode::{QrCode, QrCodeEcc};
/// use std::path::Path;
///
/// let qr = QrCode::encode_text("https://example.com", QrCodeEcc::High).unwrap();
/// render_artistic(
///     &ModuleMatrix::from(&qr),
///     &Background::from_path("background.gif"),
///     Path::new("artistic.gif"),
///     &ArtisticOptions::new().scale(8),
/// )
/// .unwrap();
/// ```
#[tracing::instrument(skip_all, fields(scale = options.scale))]
pub fn render_artistic<'a>(
    matrix: &ModuleMatrix,
    background: &Background,
    target: impl Into<OutputTarget<'a>>,
    options: &ArtisticOptions,
) -> ArtisticResult<()> {
    validate_scale(options.scale)?;
    let target = target.into();
    let kind = match (options.kind, target.inferred_kind()) {
        (Some(kind), _) => kind,
        (None, Some(inferred)) => inferred?,
        (None, None) => {
            return Err(ArtisticError::invalid_parameter(
                "the output kind must be given when writing to a stream",
            ))
        }
    };

    let data = background.read()?;
    let frames = load_background(matrix, &data, kind, options)?;
    let composition = compose(matrix, &frames, options)?;
    let encoded = composition.encode(kind)?;
    tracing::debug!(%kind, bytes = encoded.len(), animated = composition.is_animated(), "encoded artistic QR code");
    target.write_all(&encoded)
}

/// Encodes `content` into a module matrix.
pub fn generate_matrix(content: &str, ecc: QrCodeEcc) -> ArtisticResult<ModuleMatrix> {
    let qr = QrCode::encode_text(content, ecc)?;
    Ok(ModuleMatrix::from(&qr))
}

/// Generates a QR Code image from the provided content.
///
/// The error correction level starts at low and is raised as far as the version allows.
///
/// # Example
///
/// ```
/// use qirust_artistic::color::ColorTable;
/// use qirust_artistic::helper::generate_image;
///
/// let img = generate_image("Hello, World!", 1, None, &ColorTable::default()).unwrap();
/// assert_eq!(img.dimensions(), (29, 29));
/// ```
pub fn generate_image(
    content: &str,
    scale: u32,
    border: Option<u32>,
    colors: &ColorTable,
) -> ArtisticResult<RasterImage> {
    validate_scale(scale)?;
    let matrix = generate_matrix(content, QrCodeEcc::Low)?;
    render_to_image(&matrix, scale, border, colors)
}

/// Generates an artistic QR Code from the provided content.
///
/// Uses error correction level high, which leaves the most room for the background.
pub fn generate_artistic<'a>(
    content: &str,
    background: &Background,
    target: impl Into<OutputTarget<'a>>,
    options: &ArtisticOptions,
) -> ArtisticResult<()> {
    validate_scale(options.scale)?;
    let matrix = generate_matrix(content, QrCodeEcc::High)?;
    render_artistic(&matrix, background, target, options)
}

/// Generates a QR Code SVG from the provided content.
pub fn generate_svg_string(content: &str) -> ArtisticResult<String> {
    let matrix = generate_matrix(content, QrCodeEcc::Low)?;
    to_svg_string(&matrix, 1, None, &ColorTable::default())
}

/// Generates a QR Code PNG file from the provided content.
pub fn generate_png(content: &str, scale: u32, path: &Path) -> ArtisticResult<()> {
    generate_image(content, scale, None, &ColorTable::default())?.save_png(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputKind;
    use image::{Rgba, RgbaImage};
    use std::io::Cursor;

    fn png_background(width: u32, height: u32) -> Background {
        let img = RgbaImage::from_fn(width, height, |x, y| {
            Rgba([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 128, 255])
        });
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        Background::from_bytes(buf)
    }

    #[test]
    fn test_generate_image() {
        let img = generate_image("Hello, world!", 1, None, &ColorTable::default()).unwrap();
        // Version 1 with a border of 4.
        assert_eq!(img.dimensions(), (29, 29));
    }

    #[test]
    fn test_generate_svg_string() {
        let svg = generate_svg_string("Hello, world!").unwrap();
        assert!(svg.contains("viewBox=\"0 0 29 29\""));
    }

    #[test]
    fn test_render_artistic_to_writer() {
        let matrix = generate_matrix("artistic", QrCodeEcc::High).unwrap();
        let mut out = Vec::new();
        render_artistic(
            &matrix,
            &png_background(40, 40),
            &mut out,
            &ArtisticOptions::new().scale(5).kind(OutputKind::Png),
        )
        .unwrap();
        let img = image::load_from_memory(&out).unwrap();
        assert_eq!((img.width(), img.height()), matrix.symbol_size(5, 4));
    }

    #[test]
    fn test_writer_needs_kind() {
        let matrix = generate_matrix("artistic", QrCodeEcc::High).unwrap();
        let mut out = Vec::new();
        let err = render_artistic(&matrix, &png_background(4, 4), &mut out, &ArtisticOptions::new())
            .unwrap_err();
        assert!(matches!(err, ArtisticError::InvalidParameter(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_zero_scale_fails_before_reading() {
        let matrix = generate_matrix("artistic", QrCodeEcc::High).unwrap();
        let err = render_artistic(
            &matrix,
            &Background::from_path("/nonexistent/background.png"),
            Path::new("/nonexistent/out.png"),
            &ArtisticOptions::new().scale(0),
        )
        .unwrap_err();
        assert!(matches!(err, ArtisticError::InvalidParameter(_)));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let matrix = generate_matrix("artistic", QrCodeEcc::High).unwrap();
        let err = render_artistic(
            &matrix,
            &png_background(4, 4),
            Path::new("out.xyz"),
            &ArtisticOptions::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ArtisticError::InvalidParameter(_)));
    }
}
