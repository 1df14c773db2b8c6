//! Compositing of a QR symbol over a background image.
//!
//! The symbol is rendered at a scale divisible by three so every module splits into a 3x3 grid
//! of blocks. Background pixels replace everything except protected modules (finder, separator,
//! alignment and timing patterns) and the center block of each module, which keeps the symbol
//! decodable while the background shows through.

use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgba, RgbaImage};
use rayon::prelude::*;

use crate::background::{default_vector_rasterizer, FrameSequence, LoopCount, VectorRasterizer};
use crate::color::ColorTable;
use crate::error::{ArtisticError, ArtisticResult};
use crate::matrix::ModuleMatrix;
use crate::output::{encode_animation, encode_still, ColorMode, OutputKind};
use crate::raster::{rasterize, validate_scale, PixelMode};

/// Options of an artistic rendering.
#[derive(Clone, Debug)]
pub struct ArtisticOptions {
    /// Pixels per module of the final image.
    pub scale: u32,
    /// Quiet zone in modules; `None` uses the matrix's recommendation.
    pub border: Option<u32>,
    pub colors: ColorTable,
    /// Pixel mode of the result; `None` keeps the background's mode.
    pub mode: Option<ColorMode>,
    /// Output kind; `None` infers it from the target path.
    pub kind: Option<OutputKind>,
    /// Renders backgrounds the raster decoders do not understand.
    pub rasterizer: Option<Arc<dyn VectorRasterizer>>,
}

impl Default for ArtisticOptions {
    fn default() -> Self {
        Self {
            scale: 3,
            border: None,
            colors: ColorTable::default(),
            mode: None,
            kind: None,
            rasterizer: default_vector_rasterizer(),
        }
    }
}

impl ArtisticOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scale(mut self, scale: u32) -> Self {
        self.scale = scale;
        self
    }

    pub fn border(mut self, border: u32) -> Self {
        self.border = Some(border);
        self
    }

    pub fn colors(mut self, colors: ColorTable) -> Self {
        self.colors = colors;
        self
    }

    pub fn mode(mut self, mode: ColorMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn kind(mut self, kind: OutputKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Old name of [`ArtisticOptions::kind`].
    #[deprecated(note = "use `kind` instead")]
    pub fn format(self, kind: OutputKind) -> Self {
        tracing::warn!("the `format` option is deprecated, use `kind` instead");
        self.kind(kind)
    }

    pub fn rasterizer(mut self, rasterizer: Option<Arc<dyn VectorRasterizer>>) -> Self {
        self.rasterizer = rasterizer;
        self
    }
}

/// Composited frames ready to be encoded.
#[derive(Clone, Debug)]
pub struct Composition {
    frames: Vec<DynamicImage>,
    delays: Vec<u32>,
    loop_count: LoopCount,
    animated: bool,
    mode: ColorMode,
}

impl Composition {
    pub fn frames(&self) -> &[DynamicImage] {
        &self.frames
    }

    /// Frame durations in milliseconds.
    pub fn delays(&self) -> &[u32] {
        &self.delays
    }

    pub fn loop_count(&self) -> LoopCount {
        self.loop_count
    }

    pub fn is_animated(&self) -> bool {
        self.animated
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.frames
            .first()
            .map_or((0, 0), |frame| (frame.width(), frame.height()))
    }

    /// Encodes the composition completely in memory.
    ///
    /// # Errors
    ///
    /// [`ArtisticError::UnsupportedFormat`] for an animation `kind` cannot hold; codec errors
    /// are returned unchanged.
    pub fn encode(&self, kind: OutputKind) -> ArtisticResult<Vec<u8>> {
        if self.animated {
            encode_animation(&self.frames, &self.delays, self.loop_count, kind)
        } else {
            let frame = self
                .frames
                .first()
                .ok_or_else(|| ArtisticError::invalid_parameter("composition without frames"))?;
            encode_still(frame, kind)
        }
    }
}

/// The scale the symbol is composited at: the smallest multiple of three `>= scale`.
pub fn internal_scale(scale: u32) -> u32 {
    scale.div_ceil(3) * 3
}

/// Canvas size a background is fitted into: the symbol without quiet zone at `internal_scale`.
pub fn background_canvas(matrix: &ModuleMatrix, scale: u32) -> (u32, u32) {
    matrix.symbol_size(internal_scale(scale), 0)
}

/// Decodes a background for compositing into `kind`.
///
/// Animations are only kept when `kind` can store them.
pub fn load_background(
    matrix: &ModuleMatrix,
    data: &[u8],
    kind: OutputKind,
    options: &ArtisticOptions,
) -> ArtisticResult<FrameSequence> {
    let scale = validate_scale(options.scale)?;
    FrameSequence::decode(
        data,
        kind.supports_animation(),
        background_canvas(matrix, scale),
        options.rasterizer.as_deref(),
    )
}

/// Composites `matrix` over every frame of `background`.
///
/// # Errors
///
/// [`ArtisticError::InvalidParameter`] for a zero scale.
#[tracing::instrument(skip_all, fields(scale = options.scale, frames = background.len()))]
pub fn compose(
    matrix: &ModuleMatrix,
    background: &FrameSequence,
    options: &ArtisticOptions,
) -> ArtisticResult<Composition> {
    let scale = validate_scale(options.scale)?;
    let internal = internal_scale(scale);
    let border = options.border.unwrap_or(matrix.default_border());

    let symbol = rasterize(matrix, internal, Some(border), &options.colors, Some(PixelMode::Rgba))?
        .to_rgba8();
    let (canvas_width, canvas_height) = background_canvas(matrix, scale);
    let mask = bleed_mask(matrix, internal);
    let offset = border * internal;
    let target = matrix.symbol_size(scale, border);
    tracing::debug!(internal, ?target, "compositing background");

    let composited: Vec<RgbaImage> = background
        .frames()
        .par_iter()
        .map(|frame| {
            let fitted = fit_to_canvas(frame, canvas_width, canvas_height);
            let mut result = symbol.clone();
            overlay(&mut result, &fitted, &mask, offset);
            if scale != internal {
                rescale_modules(&result, internal, scale, target)
            } else {
                result
            }
        })
        .collect();

    let mode = match options.mode {
        Some(mode) => mode,
        None => {
            let source = background.source_mode();
            let transparent = composited
                .iter()
                .any(|img| img.pixels().any(|px| px[3] != 255));
            if !source.has_alpha() && transparent {
                ColorMode::Rgba
            } else {
                source
            }
        }
    };

    Ok(Composition {
        frames: composited.iter().map(|img| mode.convert(img)).collect(),
        delays: background.delays().to_vec(),
        loop_count: background.loop_count(),
        animated: background.is_animated(),
        mode,
    })
}

/// Scales `frame` to fit the canvas, keeping its aspect ratio, and centers it on a transparent
/// canvas.
fn fit_to_canvas(frame: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let (w, h) = frame.dimensions();
    let ratio = (f64::from(width) / f64::from(w)).min(f64::from(height) / f64::from(h));
    let fitted_w = ((f64::from(w) * ratio) as u32).clamp(1, width);
    let fitted_h = ((f64::from(h) * ratio) as u32).clamp(1, height);
    let resized = if (fitted_w, fitted_h) == (w, h) {
        frame.clone()
    } else {
        imageops::resize(frame, fitted_w, fitted_h, FilterType::Lanczos3)
    };

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 0, 0, 0]));
    imageops::replace(
        &mut canvas,
        &resized,
        i64::from((width - fitted_w).div_ceil(2)),
        i64::from((height - fitted_h).div_ceil(2)),
    );
    canvas
}

/// Resizes a symbol rendered at `from` pixels per module to `to` pixels per module.
///
/// Every output pixel samples the input module it belongs to, block by block: the edge blocks
/// are `to / 3` pixels wide and the center block takes the rest, so module centers stay sharp.
fn rescale_modules(img: &RgbaImage, from: u32, to: u32, (width, height): (u32, u32)) -> RgbaImage {
    let offsets: Vec<u32> = (0..to).map(|j| block_offset(j, from, to)).collect();
    let sample = |v: u32| v / to * from + offsets[(v % to) as usize];
    RgbaImage::from_fn(width, height, |x, y| *img.get_pixel(sample(x), sample(y)))
}

/// Source offset inside a `from`-pixel module for output offset `j` of a `to`-pixel module.
fn block_offset(j: u32, from: u32, to: u32) -> u32 {
    let block = from / 3;
    let edge = to / 3;
    let center = to - 2 * edge;
    if j < edge {
        j * block / edge
    } else if j < edge + center {
        block + (j - edge) * block / center
    } else {
        2 * block + (j - edge - center) * block / edge
    }
}

/// Row-major flags over the symbol area: `true` where the background may replace the symbol.
fn bleed_mask(matrix: &ModuleMatrix, scale: u32) -> Vec<bool> {
    let block = scale / 3;
    let (width, height) = matrix.symbol_size(scale, 0);
    (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| {
            let kind = matrix.kind(i64::from(x / scale), i64::from(y / scale));
            let center = (x % scale) / block == 1 && (y % scale) / block == 1;
            !kind.is_protected() && !center
        })
        .collect()
}

/// Copies non-transparent background pixels onto the symbol. No blending takes place.
fn overlay(result: &mut RgbaImage, background: &RgbaImage, mask: &[bool], offset: u32) {
    for (i, (x, y, px)) in background.enumerate_pixels().enumerate() {
        if mask[i] && px[3] != 0 {
            result.put_pixel(x + offset, y + offset, *px);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{ModuleColor, WHITE};
    use crate::matrix::ModuleKind;
    use crate::qrcode::{QrCode, QrCodeEcc};

    fn matrix() -> ModuleMatrix {
        ModuleMatrix::from(&QrCode::encode_text("A", QrCodeEcc::Low).unwrap())
    }

    fn still(color: Rgba<u8>, width: u32, height: u32) -> FrameSequence {
        FrameSequence::still(RgbaImage::from_pixel(width, height, color), ColorMode::Rgb)
    }

    #[test]
    fn test_internal_scale() {
        assert_eq!(internal_scale(1), 3);
        assert_eq!(internal_scale(3), 3);
        assert_eq!(internal_scale(5), 6);
        assert_eq!(internal_scale(9), 9);
    }

    #[test]
    fn test_output_size_uses_requested_scale() {
        let m = matrix();
        let bg = still(Rgba([200, 10, 10, 255]), 50, 50);
        let out = compose(&m, &bg, &ArtisticOptions::new().scale(5)).unwrap();
        assert_eq!(out.dimensions(), m.symbol_size(5, 4));
        assert_eq!(out.dimensions(), (145, 145));
        assert_eq!(out.mode(), ColorMode::Rgb);
    }

    #[test]
    fn test_zero_scale_is_rejected() {
        let bg = still(WHITE, 4, 4);
        let err = compose(&matrix(), &bg, &ArtisticOptions::new().scale(0)).unwrap_err();
        assert!(matches!(err, ArtisticError::InvalidParameter(_)));
    }

    #[test]
    fn test_protected_modules_and_centers_survive() {
        let m = matrix();
        let red = Rgba([255, 0, 0, 255]);
        let out = compose(&m, &still(red, 63, 63), &ArtisticOptions::new().scale(3).mode(ColorMode::Rgba))
            .unwrap();
        let img = out.frames()[0].to_rgba8();
        let plain = rasterize(&m, 3, None, &ColorTable::default(), Some(PixelMode::Rgba))
            .unwrap()
            .to_rgba8();
        let border = 4 * 3;
        for y in 0..63 {
            for x in 0..63 {
                let kind = m.kind(i64::from(x / 3), i64::from(y / 3));
                let center = x % 3 == 1 && y % 3 == 1;
                let got = img.get_pixel(x + border, y + border);
                if kind.is_protected() || center {
                    assert_eq!(got, plain.get_pixel(x + border, y + border), "({x}, {y})");
                } else {
                    assert_eq!(got, &red, "({x}, {y})");
                }
            }
        }
        // The quiet zone is never touched.
        assert_eq!(img.get_pixel(0, 0), &WHITE);
    }

    #[test]
    fn test_opaque_light_background_keeps_light_modules() {
        let m = matrix();
        let out = compose(&m, &still(WHITE, 10, 10), &ArtisticOptions::new().scale(6)).unwrap();
        let img = out.frames()[0].to_rgba8();
        let plain = rasterize(&m, 6, None, &ColorTable::default(), Some(PixelMode::Rgba))
            .unwrap()
            .to_rgba8();
        for (x, y, px) in plain.enumerate_pixels() {
            let module = m.kind(i64::from(x / 6) - 4, i64::from(y / 6) - 4);
            let center = (x % 6) / 2 == 1 && (y % 6) / 2 == 1;
            if !module.is_dark() || module.is_protected() || center {
                assert_eq!(img.get_pixel(x, y), px, "({x}, {y})");
            }
        }
    }

    #[test]
    fn test_transparent_background_pixels_are_skipped() {
        let m = matrix();
        // A wide background leaves transparent bars above and below.
        let bg = still(Rgba([0, 0, 255, 255]), 40, 10);
        let out = compose(&m, &bg, &ArtisticOptions::new().scale(3).mode(ColorMode::Rgba)).unwrap();
        let img = out.frames()[0].to_rgba8();
        let plain = rasterize(&m, 3, None, &ColorTable::default(), Some(PixelMode::Rgba))
            .unwrap()
            .to_rgba8();
        // The top module row lies in the transparent bar.
        for x in 0..img.width() {
            assert_eq!(img.get_pixel(x, 12), plain.get_pixel(x, 12));
        }
    }

    #[test]
    fn test_mode_switches_to_rgba_for_transparency() {
        let m = matrix();
        let colors = ColorTable::new().with(ModuleKind::QuietZone, ModuleColor::Transparent);
        let out = compose(&m, &still(WHITE, 8, 8), &ArtisticOptions::new().colors(colors)).unwrap();
        assert_eq!(out.mode(), ColorMode::Rgba);
        assert_eq!(out.frames()[0].to_rgba8().get_pixel(0, 0)[3], 0);

        let out = compose(
            &m,
            &still(WHITE, 8, 8),
            &ArtisticOptions::new().colors(colors).mode(ColorMode::Rgb),
        )
        .unwrap();
        assert_eq!(out.frames()[0].color(), image::ColorType::Rgb8);
    }

    #[test]
    fn test_animation_is_composited_per_frame() {
        let m = matrix();
        let frames = vec![
            RgbaImage::from_pixel(20, 20, Rgba([255, 0, 0, 255])),
            RgbaImage::from_pixel(20, 20, Rgba([0, 255, 0, 255])),
        ];
        let bg = FrameSequence::animation(frames, vec![70, 90], LoopCount::Finite(3)).unwrap();
        let out = compose(&m, &bg, &ArtisticOptions::new().scale(3)).unwrap();
        assert!(out.is_animated());
        assert_eq!(out.frames().len(), 2);
        assert_eq!(out.delays(), &[70, 90]);
        assert_eq!(out.loop_count(), LoopCount::Finite(3));
        assert_ne!(out.frames()[0], out.frames()[1]);

        let webp = out.encode(OutputKind::WebP).unwrap();
        assert_eq!(image::guess_format(&webp).unwrap(), image::ImageFormat::WebP);
        let err = out.encode(OutputKind::Bmp).unwrap_err();
        assert!(matches!(err, ArtisticError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_block_offsets() {
        // 6 -> 5: edge blocks of one pixel, a three pixel center block
        let offsets: Vec<u32> = (0..5).map(|j| block_offset(j, 6, 5)).collect();
        assert_eq!(offsets, vec![0, 2, 2, 3, 4]);
        let offsets: Vec<u32> = (0..4).map(|j| block_offset(j, 6, 4)).collect();
        assert_eq!(offsets, vec![0, 2, 3, 4]);
        // Below three pixels only the center block is left
        assert_eq!(block_offset(0, 3, 1), 1);
        let offsets: Vec<u32> = (0..2).map(|j| block_offset(j, 3, 2)).collect();
        assert_eq!(offsets, vec![1, 1]);
        let offsets: Vec<u32> = (0..8).map(|j| block_offset(j, 9, 8)).collect();
        assert_eq!(offsets, vec![0, 1, 3, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_downscaled_module_centers_stay_sharp() {
        let m = matrix();
        let red = Rgba([255, 0, 0, 255]);
        let out = compose(&m, &still(red, 63, 63), &ArtisticOptions::new().scale(5).mode(ColorMode::Rgba))
            .unwrap();
        let img = out.frames()[0].to_rgba8();
        let plain = rasterize(&m, 5, None, &ColorTable::default(), Some(PixelMode::Rgba))
            .unwrap()
            .to_rgba8();
        let border = 4 * 5;
        for my in 0..21u32 {
            for mx in 0..21u32 {
                let kind = m.kind(i64::from(mx), i64::from(my));
                let (x0, y0) = (border + mx * 5, border + my * 5);
                for (dx, dy) in [(1, 1), (2, 2), (3, 3), (1, 3)] {
                    let (x, y) = (x0 + dx, y0 + dy);
                    assert_eq!(img.get_pixel(x, y), plain.get_pixel(x, y), "center of ({mx}, {my})");
                }
                let corner = img.get_pixel(x0, y0);
                if kind.is_protected() {
                    assert_eq!(corner, plain.get_pixel(x0, y0), "protected ({mx}, {my})");
                } else {
                    assert_eq!(corner, &red, "edge of ({mx}, {my})");
                }
            }
        }
    }

    #[test]
    fn test_fit_to_canvas_centers() {
        let frame = RgbaImage::from_pixel(10, 5, Rgba([1, 2, 3, 255]));
        let canvas = fit_to_canvas(&frame, 20, 20);
        assert_eq!(canvas.get_pixel(0, 0)[3], 0);
        assert_eq!(canvas.get_pixel(0, 5), &Rgba([1, 2, 3, 255]));
        assert_eq!(canvas.get_pixel(19, 14), &Rgba([1, 2, 3, 255]));
        assert_eq!(canvas.get_pixel(0, 15)[3], 0);
    }

    #[test]
    #[allow(deprecated)]
    fn test_deprecated_format_sets_kind() {
        let options = ArtisticOptions::new().format(OutputKind::Gif);
        assert_eq!(options.kind, Some(OutputKind::Gif));
    }
}
