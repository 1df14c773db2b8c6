//! Rasterization of module matrices into plain images.
//!
//! The pixel mode of the result is chosen once per call from the colors that are actually used,
//! see [`rasterize`].

use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};

use crate::color::{ColorTable, BLACK, WHITE};
use crate::error::{ArtisticError, ArtisticResult};
use crate::matrix::{ModuleKind, ModuleMatrix};

/// Pixel representation of a [`RasterImage`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PixelMode {
    /// One bit per pixel, black and white only.
    Monochrome,
    /// Indexed colors, one palette entry per distinct module color.
    Palette,
    Rgba,
}

impl FromStr for PixelMode {
    type Err = ArtisticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(PixelMode::Monochrome),
            "P" => Ok(PixelMode::Palette),
            "RGBA" => Ok(PixelMode::Rgba),
            other => match other.to_ascii_lowercase().as_str() {
                "monochrome" => Ok(PixelMode::Monochrome),
                "palette" => Ok(PixelMode::Palette),
                "rgba" => Ok(PixelMode::Rgba),
                _ => Err(ArtisticError::invalid_parameter(format!(
                    "unsupported pixel mode \"{other}\", use one of: 1, P, RGBA"
                ))),
            },
        }
    }
}

/// A rasterized symbol.
#[derive(Clone, PartialEq, Debug)]
pub enum RasterImage {
    /// Gray values are 0 (black) or 255 (white).
    Monochrome(GrayImage),
    Palette {
        indices: GrayImage,
        palette: Vec<Rgba<u8>>,
    },
    Rgba(RgbaImage),
}

impl RasterImage {
    pub fn mode(&self) -> PixelMode {
        match self {
            RasterImage::Monochrome(_) => PixelMode::Monochrome,
            RasterImage::Palette { .. } => PixelMode::Palette,
            RasterImage::Rgba(_) => PixelMode::Rgba,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            RasterImage::Monochrome(img) => img.dimensions(),
            RasterImage::Palette { indices, .. } => indices.dimensions(),
            RasterImage::Rgba(img) => img.dimensions(),
        }
    }

    /// The palette of an indexed image.
    pub fn palette(&self) -> Option<&[Rgba<u8>]> {
        match self {
            RasterImage::Palette { palette, .. } => Some(palette),
            _ => None,
        }
    }

    /// Returns the color of the pixel at `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics if `(x, y)` is outside the image.
    pub fn get_pixel(&self, x: u32, y: u32) -> Rgba<u8> {
        match self {
            RasterImage::Monochrome(img) => {
                if img.get_pixel(x, y)[0] == 0 {
                    BLACK
                } else {
                    WHITE
                }
            }
            RasterImage::Palette { indices, palette } => {
                palette[usize::from(indices.get_pixel(x, y)[0])]
            }
            RasterImage::Rgba(img) => *img.get_pixel(x, y),
        }
    }

    pub fn to_rgba8(&self) -> RgbaImage {
        match self {
            RasterImage::Rgba(img) => img.clone(),
            _ => {
                let (width, height) = self.dimensions();
                RgbaImage::from_fn(width, height, |x, y| self.get_pixel(x, y))
            }
        }
    }

    /// Converts into an `image` crate image without losing colors.
    pub fn into_dynamic(self) -> DynamicImage {
        match self {
            RasterImage::Monochrome(img) => DynamicImage::ImageLuma8(img),
            RasterImage::Rgba(img) => DynamicImage::ImageRgba8(img),
            palette @ RasterImage::Palette { .. } => DynamicImage::ImageRgba8(palette.to_rgba8()),
        }
    }

    /// Encodes the image as PNG, keeping its pixel mode (1-bit, indexed or RGBA).
    pub fn write_png<W: Write>(&self, writer: W) -> ArtisticResult<()> {
        let (width, height) = self.dimensions();
        let mut encoder = png::Encoder::new(writer, width, height);
        encoder.set_depth(png::BitDepth::Eight);
        let data: Vec<u8> = match self {
            RasterImage::Monochrome(img) => {
                encoder.set_color(png::ColorType::Grayscale);
                encoder.set_depth(png::BitDepth::One);
                pack_bits(img)
            }
            RasterImage::Palette { indices, palette } => {
                encoder.set_color(png::ColorType::Indexed);
                let rgb: Vec<u8> = palette.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
                encoder.set_palette(rgb);
                if palette.iter().any(|c| c[3] != 255) {
                    let alpha: Vec<u8> = palette.iter().map(|c| c[3]).collect();
                    encoder.set_trns(alpha);
                }
                indices.as_raw().clone()
            }
            RasterImage::Rgba(img) => {
                encoder.set_color(png::ColorType::Rgba);
                img.as_raw().clone()
            }
        };
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&data)?;
        writer.finish()?;
        Ok(())
    }

    /// Writes the image as PNG to `path`. Nothing is written if encoding fails.
    pub fn save_png(&self, path: impl AsRef<Path>) -> ArtisticResult<()> {
        let mut buf = Vec::new();
        self.write_png(&mut buf)?;
        std::fs::write(path, buf)?;
        Ok(())
    }
}

fn pack_bits(img: &GrayImage) -> Vec<u8> {
    let (width, height) = img.dimensions();
    let stride = width.div_ceil(8) as usize;
    let mut data = vec![0u8; stride * height as usize];
    for (x, y, pixel) in img.enumerate_pixels() {
        if pixel[0] != 0 {
            data[y as usize * stride + (x / 8) as usize] |= 0x80 >> (x % 8);
        }
    }
    data
}

/// Validates a module pitch in pixels.
pub fn validate_scale(scale: u32) -> ArtisticResult<u32> {
    if scale == 0 {
        return Err(ArtisticError::invalid_parameter(
            "scale must be a positive integer, got 0",
        ));
    }
    Ok(scale)
}

/// Converts a fractional scale by truncating toward zero, then validates it.
///
/// `2.5` becomes `2`; `0.9` and negative values are rejected.
pub fn scale_from_f64(scale: f64) -> ArtisticResult<u32> {
    let truncated = scale.trunc();
    if !truncated.is_finite() || truncated < 1.0 || truncated > f64::from(u32::MAX) {
        return Err(ArtisticError::invalid_parameter(format!(
            "scale must be a positive integer, got {scale}"
        )));
    }
    Ok(truncated as u32)
}

/// Picks the pixel mode for the given colors.
///
/// Explicit RGBA wins, then any translucent color forces RGBA, then an explicit palette; plain
/// black and white becomes monochrome and everything else an indexed palette.
pub fn select_mode(
    colors: &ColorTable,
    kinds: &[ModuleKind],
    requested: Option<PixelMode>,
) -> ArtisticResult<PixelMode> {
    let resolved: Vec<Option<Rgba<u8>>> = kinds.iter().map(|&kind| colors.resolve(kind)).collect();
    let has_alpha = resolved.iter().flatten().any(|c| c[3] != 255);
    let black_and_white = resolved
        .iter()
        .all(|c| matches!(c, Some(c) if *c == BLACK || *c == WHITE));
    match requested {
        Some(PixelMode::Rgba) => Ok(PixelMode::Rgba),
        Some(PixelMode::Monochrome) if black_and_white => Ok(PixelMode::Monochrome),
        Some(PixelMode::Monochrome) => Err(ArtisticError::invalid_parameter(
            "monochrome output needs black and white modules",
        )),
        _ if has_alpha => Ok(PixelMode::Rgba),
        Some(PixelMode::Palette) => Ok(PixelMode::Palette),
        None if black_and_white => Ok(PixelMode::Monochrome),
        None => Ok(PixelMode::Palette),
    }
}

/// Renders `matrix` with `scale` pixels per module and a quiet zone of `border` modules.
///
/// A `border` of `None` uses the matrix's recommended quiet zone. The output is
/// `matrix.symbol_size(scale, border)` pixels large.
///
/// # Errors
///
/// [`ArtisticError::InvalidParameter`] for a zero scale or a monochrome request the colors
/// cannot satisfy.
#[tracing::instrument(skip(matrix, colors))]
pub fn rasterize(
    matrix: &ModuleMatrix,
    scale: u32,
    border: Option<u32>,
    colors: &ColorTable,
    requested: Option<PixelMode>,
) -> ArtisticResult<RasterImage> {
    let scale = validate_scale(scale)?;
    let border = border.unwrap_or(matrix.default_border());
    let (width, height) = matrix.symbol_size(scale, border);

    let used: Vec<ModuleKind> = ModuleKind::ALL
        .iter()
        .copied()
        .filter(|&kind| matrix.contains(kind) || (kind == ModuleKind::QuietZone && border > 0))
        .collect();
    let mode = select_mode(colors, &used, requested)?;
    tracing::debug!(?mode, width, height, "rasterizing module matrix");

    let kind_at = |x: u32, y: u32| {
        matrix.kind(
            i64::from(x / scale) - i64::from(border),
            i64::from(y / scale) - i64::from(border),
        )
    };

    let image = match mode {
        PixelMode::Rgba => {
            RasterImage::Rgba(RgbaImage::from_fn(width, height, |x, y| colors.pixel(kind_at(x, y))))
        }
        PixelMode::Monochrome => RasterImage::Monochrome(GrayImage::from_fn(width, height, |x, y| {
            Luma([if colors.pixel(kind_at(x, y)) == BLACK { 0 } else { 255 }])
        })),
        PixelMode::Palette => {
            // The light color comes first so index 0 is the background.
            let mut ordered = used.clone();
            ordered.sort_by_key(|kind| kind.is_dark());
            let mut palette: Vec<Rgba<u8>> = Vec::new();
            let mut lookup = [0u8; ModuleKind::COUNT];
            for kind in ordered {
                let color = colors.pixel(kind);
                let index = match palette.iter().position(|&c| c == color) {
                    Some(index) => index,
                    None => {
                        palette.push(color);
                        palette.len() - 1
                    }
                };
                lookup[kind.ordinal()] = index as u8;
            }
            let indices =
                GrayImage::from_fn(width, height, |x, y| Luma([lookup[kind_at(x, y).ordinal()]]));
            RasterImage::Palette { indices, palette }
        }
    };
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::ModuleColor;
    use crate::qrcode::{QrCode, QrCodeEcc};

    fn matrix(text: &str) -> ModuleMatrix {
        ModuleMatrix::from(&QrCode::encode_text(text, QrCodeEcc::Low).unwrap())
    }

    #[test]
    fn default_is_monochrome_with_recommended_border() {
        let m = matrix("A");
        let img = rasterize(&m, 1, None, &ColorTable::new(), None).unwrap();
        assert_eq!(img.dimensions(), m.symbol_size(1, 4));
        assert_eq!(img.mode(), PixelMode::Monochrome);
        assert_eq!(img.get_pixel(0, 0), WHITE);
        assert_eq!(img.get_pixel(4, 4), BLACK);
    }

    #[test]
    fn dimensions_follow_scale_and_border() {
        let m = matrix("Segno");
        for (scale, border) in [(1, 0), (3, 2), (7, 4)] {
            let img = rasterize(&m, scale, Some(border), &ColorTable::new(), None).unwrap();
            let expected = (m.width() + 2 * border) * scale;
            assert_eq!(img.dimensions(), (expected, expected));
        }
    }

    #[test]
    fn colored_dark_is_palette() {
        let colors = ColorTable::new().dark("green".parse().unwrap());
        let img = rasterize(&matrix("A"), 2, None, &colors, None).unwrap();
        assert_eq!(img.mode(), PixelMode::Palette);
        assert_eq!(img.palette().unwrap(), &[WHITE, Rgba([0, 128, 0, 255])]);
    }

    #[test]
    fn mirrored_is_monochrome() {
        let colors = ColorTable::new()
            .dark(ModuleColor::rgb(255, 255, 255))
            .light(ModuleColor::rgb(0, 0, 0));
        let img = rasterize(&matrix("A"), 1, None, &colors, None).unwrap();
        assert_eq!(img.mode(), PixelMode::Monochrome);
        assert_eq!(img.get_pixel(0, 0), BLACK);
    }

    #[test]
    fn forced_palette_and_rgba() {
        let m = matrix("A");
        let img = rasterize(&m, 1, None, &ColorTable::new(), Some(PixelMode::Palette)).unwrap();
        assert_eq!(img.mode(), PixelMode::Palette);
        let img = rasterize(&m, 1, None, &ColorTable::new(), Some(PixelMode::Rgba)).unwrap();
        assert_eq!(img.mode(), PixelMode::Rgba);
    }

    #[test]
    fn transparent_light_uses_palette_with_inverse_entry() {
        let colors = ColorTable::new().light(ModuleColor::Transparent);
        let img = rasterize(&matrix("A"), 1, None, &colors, None).unwrap();
        assert_eq!(img.mode(), PixelMode::Palette);
        assert_eq!(img.palette().unwrap(), &[Rgba([255, 255, 255, 0]), BLACK]);
    }

    #[test]
    fn translucent_dark_is_rgba() {
        let colors = ColorTable::new()
            .dark("#00fc".parse().unwrap())
            .light(ModuleColor::Transparent);
        let img = rasterize(&matrix("Segno"), 1, Some(0), &colors, None).unwrap();
        assert_eq!(img.mode(), PixelMode::Rgba);
        assert_eq!(img.get_pixel(0, 0), Rgba([0, 0, 255, 204]));
        assert_eq!(img.get_pixel(1, 1), Rgba([255, 255, 0, 0]));
    }

    #[test]
    fn per_kind_colors_are_used() {
        let colors = ColorTable::new()
            .with(ModuleKind::FinderDark, ModuleColor::rgb(255, 0, 0))
            .with(ModuleKind::QuietZone, ModuleColor::rgb(0, 0, 255));
        let img = rasterize(&matrix("A"), 2, Some(1), &colors, None).unwrap();
        assert_eq!(img.get_pixel(0, 0), Rgba([0, 0, 255, 255]));
        assert_eq!(img.get_pixel(2, 2), Rgba([255, 0, 0, 255]));
        assert_eq!(img.palette().unwrap().len(), 4);
    }

    #[test]
    fn illegal_scale_and_mode() {
        let m = matrix("A");
        let err = rasterize(&m, 0, None, &ColorTable::new(), None).unwrap_err();
        assert!(matches!(err, ArtisticError::InvalidParameter(_)));
        let colors = ColorTable::new().dark(ModuleColor::rgb(0, 0, 128));
        assert!(rasterize(&m, 1, None, &colors, Some(PixelMode::Monochrome)).is_err());
        assert!("U".parse::<PixelMode>().is_err());
        assert!("RGB".parse::<PixelMode>().is_err());
    }

    #[test]
    fn fractional_scale_truncates() {
        assert_eq!(scale_from_f64(2.5).unwrap(), 2);
        assert_eq!(scale_from_f64(3.0).unwrap(), 3);
        assert!(scale_from_f64(0.9).is_err());
        assert!(scale_from_f64(-1.0).is_err());
        assert!(scale_from_f64(f64::NAN).is_err());
    }

    #[test]
    fn png_round_trip_keeps_pixels() {
        let colors = ColorTable::new().dark("navy".parse().unwrap());
        for requested in [None, Some(PixelMode::Rgba)] {
            let img = rasterize(&matrix("A"), 3, Some(2), &colors, requested).unwrap();
            let mut buf = Vec::new();
            img.write_png(&mut buf).unwrap();
            let decoded = image::load_from_memory(&buf).unwrap().to_rgba8();
            assert_eq!(decoded, img.to_rgba8());
        }

        let mono = rasterize(&matrix("A"), 3, Some(2), &ColorTable::new(), None).unwrap();
        let mut buf = Vec::new();
        mono.write_png(&mut buf).unwrap();
        let decoded = image::load_from_memory(&buf).unwrap().to_rgba8();
        assert_eq!(decoded, mono.to_rgba8());
    }
}
