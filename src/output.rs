//! Output kinds, pixel modes and encoders for composited images.

use std::fmt;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use image::codecs::gif::GifEncoder;
use image::error::{EncodingError, ImageFormatHint};
use image::{ColorType, Delay, DynamicImage, Frame, ImageError, ImageFormat, Luma, RgbaImage};

use crate::background::LoopCount;
use crate::error::{ArtisticError, ArtisticResult};

/// Image file kinds the compositor can write.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum OutputKind {
    Png,
    Gif,
    WebP,
    Jpeg,
    Bmp,
    Tiff,
    Ico,
    Tga,
    Pnm,
}

impl OutputKind {
    pub fn from_extension(ext: &str) -> ArtisticResult<Self> {
        ext.parse()
    }

    /// Infers the kind from the extension of `path`.
    pub fn from_path(path: &Path) -> ArtisticResult<Self> {
        let ext = path.extension().and_then(|ext| ext.to_str()).ok_or_else(|| {
            ArtisticError::invalid_parameter(format!(
                "cannot infer the image kind of {}",
                path.display()
            ))
        })?;
        Self::from_extension(ext)
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            OutputKind::Png => ImageFormat::Png,
            OutputKind::Gif => ImageFormat::Gif,
            OutputKind::WebP => ImageFormat::WebP,
            OutputKind::Jpeg => ImageFormat::Jpeg,
            OutputKind::Bmp => ImageFormat::Bmp,
            OutputKind::Tiff => ImageFormat::Tiff,
            OutputKind::Ico => ImageFormat::Ico,
            OutputKind::Tga => ImageFormat::Tga,
            OutputKind::Pnm => ImageFormat::Pnm,
        }
    }

    /// Whether the kind can carry more than one frame.
    pub fn supports_animation(self) -> bool {
        matches!(self, OutputKind::Gif | OutputKind::Png | OutputKind::WebP)
    }

    /// Whether the kind stores an alpha channel.
    pub fn supports_alpha(self) -> bool {
        !matches!(self, OutputKind::Jpeg | OutputKind::Pnm)
    }
}

impl FromStr for OutputKind {
    type Err = ArtisticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "png" | "apng" => Ok(OutputKind::Png),
            "gif" => Ok(OutputKind::Gif),
            "webp" => Ok(OutputKind::WebP),
            "jpg" | "jpeg" => Ok(OutputKind::Jpeg),
            "bmp" => Ok(OutputKind::Bmp),
            "tif" | "tiff" => Ok(OutputKind::Tiff),
            "ico" => Ok(OutputKind::Ico),
            "tga" => Ok(OutputKind::Tga),
            "pbm" | "pgm" | "ppm" | "pnm" => Ok(OutputKind::Pnm),
            other => Err(ArtisticError::invalid_parameter(format!(
                "unknown image kind {other:?}"
            ))),
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputKind::Png => "png",
            OutputKind::Gif => "gif",
            OutputKind::WebP => "webp",
            OutputKind::Jpeg => "jpeg",
            OutputKind::Bmp => "bmp",
            OutputKind::Tiff => "tiff",
            OutputKind::Ico => "ico",
            OutputKind::Tga => "tga",
            OutputKind::Pnm => "pnm",
        };
        f.write_str(name)
    }
}

/// Pixel mode of a composited image.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ColorMode {
    /// Black and white, one bit per pixel.
    Monochrome,
    Grayscale,
    GrayscaleAlpha,
    Rgb,
    Rgba,
}

impl ColorMode {
    pub fn from_color_type(color: ColorType) -> Self {
        match color {
            ColorType::L8 | ColorType::L16 => ColorMode::Grayscale,
            ColorType::La8 | ColorType::La16 => ColorMode::GrayscaleAlpha,
            ColorType::Rgb8 | ColorType::Rgb16 | ColorType::Rgb32F => ColorMode::Rgb,
            _ => ColorMode::Rgba,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, ColorMode::GrayscaleAlpha | ColorMode::Rgba)
    }

    /// Converts an RGBA image into this mode.
    pub fn convert(self, img: &RgbaImage) -> DynamicImage {
        match self {
            ColorMode::Monochrome => {
                let gray = DynamicImage::ImageRgba8(img.clone()).into_luma8();
                let bw = image::GrayImage::from_fn(gray.width(), gray.height(), |x, y| {
                    if gray.get_pixel(x, y)[0] >= 128 {
                        Luma([255])
                    } else {
                        Luma([0])
                    }
                });
                DynamicImage::ImageLuma8(bw)
            }
            ColorMode::Grayscale => {
                DynamicImage::ImageLuma8(DynamicImage::ImageRgba8(img.clone()).into_luma8())
            }
            ColorMode::GrayscaleAlpha => {
                DynamicImage::ImageLumaA8(DynamicImage::ImageRgba8(img.clone()).into_luma_alpha8())
            }
            ColorMode::Rgb => {
                DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(img.clone()).into_rgb8())
            }
            ColorMode::Rgba => DynamicImage::ImageRgba8(img.clone()),
        }
    }
}

impl FromStr for ColorMode {
    type Err = ArtisticError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" => return Ok(ColorMode::Monochrome),
            "L" => return Ok(ColorMode::Grayscale),
            "LA" => return Ok(ColorMode::GrayscaleAlpha),
            "RGB" => return Ok(ColorMode::Rgb),
            "RGBA" => return Ok(ColorMode::Rgba),
            _ => {}
        }
        match s.to_ascii_lowercase().as_str() {
            "monochrome" | "bw" => Ok(ColorMode::Monochrome),
            "grayscale" | "gray" | "l" => Ok(ColorMode::Grayscale),
            "grayscale-alpha" | "gray-alpha" | "la" => Ok(ColorMode::GrayscaleAlpha),
            "rgb" => Ok(ColorMode::Rgb),
            "rgba" => Ok(ColorMode::Rgba),
            _ => Err(ArtisticError::invalid_parameter(format!(
                "unknown color mode {s:?}"
            ))),
        }
    }
}

/// Destination of an encoded image.
pub enum OutputTarget<'a> {
    Path(&'a Path),
    Writer(&'a mut dyn Write),
}

impl OutputTarget<'_> {
    /// The kind implied by a path target.
    pub fn inferred_kind(&self) -> Option<ArtisticResult<OutputKind>> {
        match self {
            OutputTarget::Path(path) => Some(OutputKind::from_path(path)),
            OutputTarget::Writer(_) => None,
        }
    }

    /// Writes the fully encoded image in one go.
    pub fn write_all(self, data: &[u8]) -> ArtisticResult<()> {
        match self {
            OutputTarget::Path(path) => std::fs::write(path, data)?,
            OutputTarget::Writer(writer) => {
                writer.write_all(data)?;
                writer.flush()?;
            }
        }
        Ok(())
    }
}

impl<'a> From<&'a Path> for OutputTarget<'a> {
    fn from(path: &'a Path) -> Self {
        OutputTarget::Path(path)
    }
}

impl<'a> From<&'a PathBuf> for OutputTarget<'a> {
    fn from(path: &'a PathBuf) -> Self {
        OutputTarget::Path(path.as_path())
    }
}

impl<'a, W: Write> From<&'a mut W> for OutputTarget<'a> {
    fn from(writer: &'a mut W) -> Self {
        OutputTarget::Writer(writer)
    }
}

/// Encodes a single image.
pub fn encode_still(img: &DynamicImage, kind: OutputKind) -> ArtisticResult<Vec<u8>> {
    let mut buf = Vec::new();
    let img = match kind {
        _ if !kind.supports_alpha() && img.color().has_alpha() => {
            DynamicImage::ImageRgb8(img.to_rgb8())
        }
        OutputKind::Gif => DynamicImage::ImageRgba8(img.to_rgba8()),
        _ => img.clone(),
    };
    img.write_to(&mut Cursor::new(&mut buf), kind.image_format())?;
    Ok(buf)
}

/// Encodes an animation as GIF, APNG or WebP; `delays` are in milliseconds.
///
/// # Errors
///
/// [`ArtisticError::UnsupportedFormat`] for kinds without animation support.
pub fn encode_animation(
    frames: &[DynamicImage],
    delays: &[u32],
    loop_count: LoopCount,
    kind: OutputKind,
) -> ArtisticResult<Vec<u8>> {
    if frames.is_empty() || frames.len() != delays.len() {
        return Err(ArtisticError::invalid_parameter(
            "animation needs one delay per frame",
        ));
    }
    match kind {
        OutputKind::Gif => encode_gif(frames, delays, loop_count),
        OutputKind::Png => encode_apng(frames, delays, loop_count),
        OutputKind::WebP => encode_webp(frames, delays, loop_count),
        other => Err(ArtisticError::unsupported_format(format!(
            "animated {other} output"
        ))),
    }
}

fn encode_gif(frames: &[DynamicImage], delays: &[u32], loop_count: LoopCount) -> ArtisticResult<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut buf);
        if let Some(repeat) = loop_count.gif_repeat() {
            encoder.set_repeat(repeat)?;
        }
        encoder.encode_frames(frames.iter().zip(delays).map(|(frame, &ms)| {
            Frame::from_parts(frame.to_rgba8(), 0, 0, Delay::from_numer_denom_ms(ms, 1))
        }))?;
    }
    Ok(buf)
}

fn encode_apng(frames: &[DynamicImage], delays: &[u32], loop_count: LoopCount) -> ArtisticResult<Vec<u8>> {
    let (width, height) = (frames[0].width(), frames[0].height());
    let color = png_layout(&frames[0]).0;
    let plays = loop_count.plays();

    let mut buf = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut buf, width, height);
        encoder.set_color(color);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_animated(frames.len() as u32, plays)?;
        let mut writer = encoder.write_header()?;
        for (frame, &ms) in frames.iter().zip(delays) {
            let (frame_color, data) = png_layout(frame);
            if frame_color != color || frame.width() != width || frame.height() != height {
                return Err(ArtisticError::invalid_parameter(
                    "animation frames differ in size or mode",
                ));
            }
            match u16::try_from(ms) {
                Ok(ms) => writer.set_frame_delay(ms, 1000)?,
                Err(_) => writer.set_frame_delay(u16::try_from(ms / 10).unwrap_or(u16::MAX), 100)?,
            }
            writer.write_image_data(&data)?;
        }
        writer.finish()?;
    }
    Ok(buf)
}

fn encode_webp(frames: &[DynamicImage], delays: &[u32], loop_count: LoopCount) -> ArtisticResult<Vec<u8>> {
    let webp_error = |err: webp_animation::Error| {
        ArtisticError::Image(ImageError::Encoding(EncodingError::new(
            ImageFormatHint::Exact(ImageFormat::WebP),
            format!("{err:?}"),
        )))
    };
    let (width, height) = (frames[0].width(), frames[0].height());
    let options = webp_animation::EncoderOptions {
        anim_params: webp_animation::AnimParams {
            loop_count: i32::try_from(loop_count.plays()).unwrap_or(i32::MAX),
        },
        encoding_config: Some(webp_animation::EncodingConfig {
            encoding_type: webp_animation::EncodingType::Lossless,
            ..Default::default()
        }),
        ..Default::default()
    };
    let mut encoder =
        webp_animation::Encoder::new_with_options((width, height), options).map_err(webp_error)?;

    // Frames are placed by start timestamp and need strictly increasing times.
    let mut timestamp: i32 = 0;
    for (frame, &ms) in frames.iter().zip(delays) {
        if frame.width() != width || frame.height() != height {
            return Err(ArtisticError::invalid_parameter("animation frames differ in size"));
        }
        encoder
            .add_frame(frame.to_rgba8().as_raw(), timestamp)
            .map_err(webp_error)?;
        let duration = i32::try_from(ms.max(1)).map_err(|_| {
            ArtisticError::invalid_parameter(format!("frame delay of {ms} ms is too long"))
        })?;
        timestamp = timestamp.checked_add(duration).ok_or_else(|| {
            ArtisticError::invalid_parameter("animation is too long for WebP")
        })?;
    }
    let data = encoder.finalize(timestamp).map_err(webp_error)?;
    Ok(data.to_vec())
}

fn png_layout(img: &DynamicImage) -> (png::ColorType, Vec<u8>) {
    match img {
        DynamicImage::ImageLuma8(buf) => (png::ColorType::Grayscale, buf.as_raw().clone()),
        DynamicImage::ImageLumaA8(buf) => (png::ColorType::GrayscaleAlpha, buf.as_raw().clone()),
        DynamicImage::ImageRgb8(buf) => (png::ColorType::Rgb, buf.as_raw().clone()),
        other => (png::ColorType::Rgba, other.to_rgba8().into_raw()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifDecoder;
    use image::codecs::png::PngDecoder;
    use image::codecs::webp::WebPDecoder;
    use image::{AnimationDecoder, Rgba};

    fn frames(n: u8) -> Vec<DynamicImage> {
        (0..n)
            .map(|i| {
                DynamicImage::ImageRgba8(RgbaImage::from_pixel(6, 4, Rgba([i * 70, 10, 200, 255])))
            })
            .collect()
    }

    #[test]
    fn kind_from_path_and_name() {
        assert_eq!(OutputKind::from_path(Path::new("out.PNG")).unwrap(), OutputKind::Png);
        assert_eq!(OutputKind::from_path(Path::new("a/b.jpg")).unwrap(), OutputKind::Jpeg);
        assert_eq!("webp".parse::<OutputKind>().unwrap(), OutputKind::WebP);
        assert!(OutputKind::from_path(Path::new("noext")).is_err());
        assert!(matches!(
            "svgz".parse::<OutputKind>(),
            Err(ArtisticError::InvalidParameter(_))
        ));
    }

    #[test]
    fn animation_support() {
        assert!(OutputKind::Gif.supports_animation());
        assert!(OutputKind::Png.supports_animation());
        assert!(OutputKind::WebP.supports_animation());
        assert!(!OutputKind::Jpeg.supports_animation());
    }

    #[test]
    fn color_mode_names() {
        assert_eq!("1".parse::<ColorMode>().unwrap(), ColorMode::Monochrome);
        assert_eq!("L".parse::<ColorMode>().unwrap(), ColorMode::Grayscale);
        assert_eq!("LA".parse::<ColorMode>().unwrap(), ColorMode::GrayscaleAlpha);
        assert_eq!("rgb".parse::<ColorMode>().unwrap(), ColorMode::Rgb);
        assert_eq!("RGBA".parse::<ColorMode>().unwrap(), ColorMode::Rgba);
        assert!("CMYK".parse::<ColorMode>().is_err());
    }

    #[test]
    fn convert_drops_alpha_and_thresholds() {
        let img = RgbaImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgba([250, 250, 250, 0])
            } else {
                Rgba([20, 20, 20, 255])
            }
        });
        let rgb = ColorMode::Rgb.convert(&img);
        assert_eq!(rgb.color(), ColorType::Rgb8);
        let bw = ColorMode::Monochrome.convert(&img).into_luma8();
        assert_eq!(bw.get_pixel(0, 0), &Luma([255]));
        assert_eq!(bw.get_pixel(1, 0), &Luma([0]));
    }

    #[test]
    fn still_jpeg_drops_alpha() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 128])));
        let data = encode_still(&img, OutputKind::Jpeg).unwrap();
        assert_eq!(image::guess_format(&data).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn gif_animation_keeps_timing() {
        let data = encode_animation(&frames(3), &[40, 80, 120], LoopCount::Finite(5), OutputKind::Gif)
            .unwrap();
        let decoded = GifDecoder::new(Cursor::new(&data))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap();
        assert_eq!(decoded.len(), 3);
        let (numer, denom) = decoded[1].delay().numer_denom_ms();
        assert_eq!(numer / denom, 80);
        assert_eq!(crate::background::gif_loop_count(&data).unwrap(), LoopCount::Finite(5));
    }

    #[test]
    fn gif_single_play_has_no_loop_extension() {
        let data = encode_animation(&frames(2), &[40, 40], LoopCount::Finite(1), OutputKind::Gif)
            .unwrap();
        assert!(!data.windows(8).any(|w| w == b"NETSCAPE"));
        assert_eq!(crate::background::gif_loop_count(&data).unwrap(), LoopCount::Finite(1));
    }

    #[test]
    fn apng_play_count_carries_over_to_gif() {
        let apng = encode_animation(&frames(2), &[40, 40], LoopCount::Finite(2), OutputKind::Png)
            .unwrap();
        let plays = crate::background::apng_loop_count(&apng).unwrap();
        assert_eq!(plays, LoopCount::Finite(2));
        let gif = encode_animation(&frames(2), &[40, 40], plays, OutputKind::Gif).unwrap();
        assert_eq!(crate::background::gif_loop_count(&gif).unwrap(), LoopCount::Finite(2));
    }

    #[test]
    fn apng_animation_keeps_frames() {
        let data = encode_animation(&frames(2), &[100, 250], LoopCount::Infinite, OutputKind::Png)
            .unwrap();
        let decoder = PngDecoder::new(Cursor::new(&data)).unwrap();
        assert!(decoder.is_apng().unwrap());
        let decoded = decoder.apng().unwrap().into_frames().collect_frames().unwrap();
        assert_eq!(decoded.len(), 2);
        let (numer, denom) = decoded[1].delay().numer_denom_ms();
        assert_eq!(numer / denom, 250);
        assert_eq!(crate::background::apng_loop_count(&data).unwrap(), LoopCount::Infinite);
    }

    #[test]
    fn webp_animation_keeps_frames_and_loop() {
        let data = encode_animation(&frames(3), &[50, 0, 120], LoopCount::Finite(3), OutputKind::WebP)
            .unwrap();
        assert_eq!(image::guess_format(&data).unwrap(), ImageFormat::WebP);
        let decoder = WebPDecoder::new(Cursor::new(&data)).unwrap();
        assert!(decoder.has_animation());
        let decoded = decoder.into_frames().collect_frames().unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded[0].buffer().dimensions(), (6, 4));
        let (numer, denom) = decoded[0].delay().numer_denom_ms();
        assert_eq!(numer / denom, 50);
        let (numer, denom) = decoded[2].delay().numer_denom_ms();
        assert_eq!(numer / denom, 120);
        assert_eq!(crate::background::webp_loop_count(&data).unwrap(), LoopCount::Finite(3));
    }

    #[test]
    fn animation_into_still_kind_is_unsupported() {
        let err = encode_animation(&frames(2), &[10, 10], LoopCount::Infinite, OutputKind::Jpeg)
            .unwrap_err();
        assert!(matches!(err, ArtisticError::UnsupportedFormat(_)));
    }

    #[test]
    fn writer_target_receives_bytes() {
        let mut out = Vec::new();
        OutputTarget::from(&mut out).write_all(b"qr").unwrap();
        assert_eq!(out, b"qr");
    }
}
