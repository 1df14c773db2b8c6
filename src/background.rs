//! Background images for artistic QR codes.
//!
//! Backgrounds are decoded into a [`FrameSequence`]: one RGBA frame for still images, every
//! frame with its display duration and the loop count for animated GIF, APNG and WebP images.
//! Sources the `image` crate cannot decode (SVG) go through a [`VectorRasterizer`].

use std::borrow::Cow;
use std::fmt::Debug;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use image::codecs::gif::{GifDecoder, Repeat};
use image::codecs::png::PngDecoder;
use image::codecs::webp::WebPDecoder;
use image::error::{DecodingError, ImageFormatHint};
use image::{AnimationDecoder, Frame, ImageDecoder, ImageError, ImageFormat, RgbaImage};

use crate::error::{ArtisticError, ArtisticResult};
use crate::output::ColorMode;

/// Where the background comes from.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Background {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl Background {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Background::Path(path.into())
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Background::Bytes(bytes.into())
    }

    /// Reads the whole source into memory.
    pub fn read(&self) -> ArtisticResult<Cow<'_, [u8]>> {
        match self {
            Background::Path(path) => Ok(Cow::Owned(std::fs::read(path)?)),
            Background::Bytes(bytes) => Ok(Cow::Borrowed(bytes)),
        }
    }
}

/// How often an animation plays.
///
/// The value means the same for every format; the encoders and the loop readers below convert
/// it to what each container stores.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum LoopCount {
    #[default]
    Infinite,
    /// Total number of plays. `Finite(0)` plays once like `Finite(1)`.
    Finite(u16),
}

impl LoopCount {
    /// From a play count where `0` means forever (APNG `num_plays`, WebP `loop_count`).
    pub fn from_plays(plays: u32) -> Self {
        match plays {
            0 => LoopCount::Infinite,
            n => LoopCount::Finite(u16::try_from(n).unwrap_or(u16::MAX)),
        }
    }

    /// Play count where `0` means forever.
    pub fn plays(self) -> u32 {
        match self {
            LoopCount::Infinite => 0,
            LoopCount::Finite(n) => u32::from(n.max(1)),
        }
    }

    /// From a GIF NETSCAPE repeat count, which excludes the first play.
    pub(crate) fn from_gif_repeat(repeat: gif::Repeat) -> Self {
        match repeat {
            gif::Repeat::Infinite => LoopCount::Infinite,
            gif::Repeat::Finite(n) => LoopCount::Finite(n.saturating_add(1)),
        }
    }

    /// The NETSCAPE repeat count to write; `None` for a single play, which needs no extension.
    pub(crate) fn gif_repeat(self) -> Option<Repeat> {
        match self {
            LoopCount::Infinite => Some(Repeat::Infinite),
            LoopCount::Finite(n) if n > 1 => Some(Repeat::Finite(n - 1)),
            LoopCount::Finite(_) => None,
        }
    }
}

/// Converts vector image data into a raster image of (at most) the given size.
///
/// Implementations keep the aspect ratio of the source.
pub trait VectorRasterizer: Send + Sync + Debug {
    fn rasterize(&self, data: &[u8], width: u32, height: u32) -> ArtisticResult<RgbaImage>;
}

/// SVG rasterizer backed by resvg.
#[cfg(feature = "svg")]
#[derive(Clone, Copy, Debug, Default)]
pub struct SvgRasterizer;

#[cfg(feature = "svg")]
impl VectorRasterizer for SvgRasterizer {
    fn rasterize(&self, data: &[u8], width: u32, height: u32) -> ArtisticResult<RgbaImage> {
        let opts = usvg::Options::default();
        let tree = usvg::Tree::from_data(data, &opts).map_err(|err| {
            ArtisticError::unsupported_format(format!(
                "background is neither a raster image nor SVG: {err}"
            ))
        })?;

        let size = tree.size();
        let scale = (width as f32 / size.width()).min(height as f32 / size.height());
        let w = ((size.width() * scale).round() as u32).clamp(1, width.max(1));
        let h = ((size.height() * scale).round() as u32).clamp(1, height.max(1));
        let mut pixmap = resvg::tiny_skia::Pixmap::new(w, h)
            .ok_or_else(|| ArtisticError::unsupported_format("failed to allocate svg pixmap"))?;
        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::from_scale(scale, scale),
            &mut pixmap.as_mut(),
        );

        let rgba: Vec<u8> = pixmap
            .pixels()
            .iter()
            .flat_map(|px| {
                let c = px.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        RgbaImage::from_raw(w, h, rgba)
            .ok_or_else(|| ArtisticError::unsupported_format("svg pixmap has an unexpected size"))
    }
}

/// The vector rasterizer compiled into this build, if any.
pub fn default_vector_rasterizer() -> Option<Arc<dyn VectorRasterizer>> {
    #[cfg(feature = "svg")]
    {
        Some(Arc::new(SvgRasterizer))
    }
    #[cfg(not(feature = "svg"))]
    {
        None
    }
}

/// Decoded background frames, all of the same size.
#[derive(Clone, Debug)]
pub struct FrameSequence {
    frames: Vec<RgbaImage>,
    delays: Vec<u32>,
    loop_count: LoopCount,
    source_mode: ColorMode,
    animated: bool,
}

impl FrameSequence {
    /// A single still frame.
    pub fn still(frame: RgbaImage, source_mode: ColorMode) -> Self {
        Self {
            frames: vec![frame],
            delays: vec![0],
            loop_count: LoopCount::Infinite,
            source_mode,
            animated: false,
        }
    }

    /// An animation; `delays` are in milliseconds, one per frame.
    ///
    /// # Errors
    ///
    /// [`ArtisticError::InvalidParameter`] if there are no frames, the delays do not match the
    /// frames or the frames differ in size.
    pub fn animation(
        frames: Vec<RgbaImage>,
        delays: Vec<u32>,
        loop_count: LoopCount,
    ) -> ArtisticResult<Self> {
        let Some(first) = frames.first() else {
            return Err(ArtisticError::invalid_parameter("animation without frames"));
        };
        if delays.len() != frames.len() {
            return Err(ArtisticError::invalid_parameter(format!(
                "{} frames but {} delays",
                frames.len(),
                delays.len()
            )));
        }
        let dimensions = first.dimensions();
        if frames.iter().any(|frame| frame.dimensions() != dimensions) {
            return Err(ArtisticError::invalid_parameter("animation frames differ in size"));
        }
        let animated = frames.len() > 1;
        Ok(Self {
            frames,
            delays,
            loop_count,
            source_mode: ColorMode::Rgba,
            animated,
        })
    }

    /// Records the pixel mode the frames were decoded from (RGBA unless set).
    pub fn with_source_mode(mut self, source_mode: ColorMode) -> Self {
        self.source_mode = source_mode;
        self
    }

    /// Decodes a background.
    ///
    /// Animations are only extracted when `allow_animation` is set; otherwise the first frame is
    /// used. Data the raster decoders do not recognize is handed to `rasterizer`, which renders
    /// it to fit `(width, height)`.
    ///
    /// # Errors
    ///
    /// [`ArtisticError::UnsupportedFormat`] if the data is not a known raster format and no
    /// rasterizer is available. Decoder failures are returned unchanged.
    pub fn decode(
        data: &[u8],
        allow_animation: bool,
        (width, height): (u32, u32),
        rasterizer: Option<&dyn VectorRasterizer>,
    ) -> ArtisticResult<Self> {
        match image::guess_format(data) {
            Ok(format) => Self::decode_raster(data, format, allow_animation),
            Err(_) => match rasterizer {
                Some(rasterizer) => {
                    tracing::debug!(width, height, "rasterizing vector background");
                    let frame = rasterizer.rasterize(data, width, height)?;
                    Ok(Self::still(frame, ColorMode::Rgba))
                }
                None => Err(ArtisticError::unsupported_format(
                    "background is not a raster image and no vector rasterizer is available",
                )),
            },
        }
    }

    fn decode_raster(data: &[u8], format: ImageFormat, allow_animation: bool) -> ArtisticResult<Self> {
        if allow_animation {
            let animation = match format {
                ImageFormat::Gif => {
                    let decoder = GifDecoder::new(Cursor::new(data))?;
                    let color = decoder.color_type();
                    Some((decoder.into_frames().collect_frames()?, color))
                }
                ImageFormat::Png => {
                    let decoder = PngDecoder::new(Cursor::new(data))?;
                    let color = decoder.color_type();
                    if decoder.is_apng()? {
                        Some((decoder.apng()?.into_frames().collect_frames()?, color))
                    } else {
                        None
                    }
                }
                ImageFormat::WebP => {
                    let decoder = WebPDecoder::new(Cursor::new(data))?;
                    let color = decoder.color_type();
                    if decoder.has_animation() {
                        Some((decoder.into_frames().collect_frames()?, color))
                    } else {
                        None
                    }
                }
                _ => None,
            };
            if let Some((frames, color)) = animation.filter(|(frames, _)| frames.len() > 1) {
                let loop_count = match format {
                    ImageFormat::Gif => gif_loop_count(data)?,
                    ImageFormat::Png => apng_loop_count(data)?,
                    _ => webp_loop_count(data)?,
                };
                let source_mode = ColorMode::from_color_type(color);
                tracing::debug!(
                    ?format,
                    frames = frames.len(),
                    ?loop_count,
                    ?source_mode,
                    "decoded animated background"
                );
                return Ok(Self::from_frames(frames, loop_count)?.with_source_mode(source_mode));
            }
        }

        let image = image::load_from_memory_with_format(data, format)?;
        let source_mode = ColorMode::from_color_type(image.color());
        Ok(Self::still(image.to_rgba8(), source_mode))
    }

    fn from_frames(frames: Vec<Frame>, loop_count: LoopCount) -> ArtisticResult<Self> {
        let delays = frames
            .iter()
            .map(|frame| {
                let (numer, denom) = frame.delay().numer_denom_ms();
                if denom == 0 {
                    0
                } else {
                    numer / denom
                }
            })
            .collect();
        let frames = frames.into_iter().map(Frame::into_buffer).collect();
        Self::animation(frames, delays, loop_count)
    }

    pub fn frames(&self) -> &[RgbaImage] {
        &self.frames
    }

    /// Display duration of every frame, in milliseconds.
    pub fn delays(&self) -> &[u32] {
        &self.delays
    }

    pub fn loop_count(&self) -> LoopCount {
        self.loop_count
    }

    /// Pixel mode of the decoded source.
    pub fn source_mode(&self) -> ColorMode {
        self.source_mode
    }

    pub fn is_animated(&self) -> bool {
        self.animated
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Reads the NETSCAPE loop extension of a GIF; without one the GIF plays once.
pub fn gif_loop_count(data: &[u8]) -> ArtisticResult<LoopCount> {
    let gif_error = |err: gif::DecodingError| {
        ArtisticError::Image(ImageError::Decoding(DecodingError::new(
            ImageFormatHint::Exact(ImageFormat::Gif),
            err,
        )))
    };
    let mut options = gif::DecodeOptions::new();
    options.set_color_output(gif::ColorOutput::Indexed);
    let mut decoder = options.read_info(Cursor::new(data)).map_err(gif_error)?;
    // The extension may follow the first frame, so walk the whole stream.
    while decoder.read_next_frame().map_err(gif_error)?.is_some() {}
    Ok(LoopCount::from_gif_repeat(decoder.repeat()))
}

/// Reads the play count of an APNG; `0` plays means forever.
pub fn apng_loop_count(data: &[u8]) -> ArtisticResult<LoopCount> {
    let reader = png::Decoder::new(Cursor::new(data)).read_info().map_err(|err| {
        ArtisticError::Image(ImageError::Decoding(DecodingError::new(
            ImageFormatHint::Exact(ImageFormat::Png),
            err,
        )))
    })?;
    Ok(reader
        .info()
        .animation_control
        .map_or(LoopCount::Infinite, |control| LoopCount::from_plays(control.num_plays)))
}

/// Reads the loop count of an animated WebP; `0` means forever.
pub fn webp_loop_count(data: &[u8]) -> ArtisticResult<LoopCount> {
    let decoder = image_webp::WebPDecoder::new(Cursor::new(data)).map_err(|err| {
        ArtisticError::Image(ImageError::Decoding(DecodingError::new(
            ImageFormatHint::Exact(ImageFormat::WebP),
            err,
        )))
    })?;
    Ok(match decoder.loop_count() {
        image_webp::LoopCount::Forever => LoopCount::Infinite,
        image_webp::LoopCount::Times(n) => LoopCount::Finite(n.get()),
    })
}
