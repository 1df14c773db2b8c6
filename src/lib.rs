//! # qirust-artistic
//!
//! A Rust library for rendering QR codes as images, plain or blended into a background picture.
//!
//! `qirust-artistic` consumes a module matrix in which every module is tagged with its role in the
//! symbol (finder pattern, timing pattern, data, quiet zone, ...). Plain renderings pick the
//! smallest fitting pixel representation. Artistic renderings composite the symbol over a still
//! or animated background while keeping the function patterns and the center of every module
//! intact, so the result stays scannable.
//!
//! ## Features
//!
//! - Encode text or binary data into QR codes (versions 1 to 40, four error correction levels).
//! - Color every module kind separately, including transparency.
//! - Write monochrome, palette or RGBA PNGs and SVGs.
//! - Blend symbols into PNG, JPEG, GIF, WebP or SVG backgrounds.
//! - Keep animated GIF, APNG and WebP backgrounds animated, with their timing and loop count,
//!   and write the result as an animated GIF, APNG or WebP.
//!
//! ## Installation
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! qirust-artistic = "0.2" # Replace with the latest version
//! ```
//!
//! The default `svg` feature enables SVG backgrounds through resvg.
//!
//! ## Example
//!
//! Render a symbol with colored finder patterns:
//!
//! ```rust
//! use qirust_artistic::color::{ColorTable, ModuleColor};
//! use qirust_artistic::helper::{generate_matrix, render_to_image};
//! use qirust_artistic::matrix::ModuleKind;
//! use qirust_artistic::qrcode::QrCodeEcc;
//!
//! let matrix = generate_matrix("Hello, World!", QrCodeEcc::Medium).unwrap();
//! let colors = ColorTable::new().with(ModuleKind::FinderDark, ModuleColor::rgb(200, 30, 30));
//! let img = render_to_image(&matrix, 4, None, &colors).unwrap();
//! let mut png = Vec::new();
//! img.write_png(&mut png).unwrap();
//! ```
//!
//! Blend a symbol into an animated background:
//!
//! ```no_run
//! use qirust_artistic::background::Background;
//! use qirust_artistic::compose::ArtisticOptions;
//! use qirust_artistic::helper::generate_artistic;
//! use std::path::Path;
//!
//! generate_artistic(
//!     "https://example.com",
//!     &Background::from_path("waves.gif"),
//!     Path::new("output/qr.gif"),
//!     &ArtisticOptions::new().scale(8),
//! )
//! .unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`qrcode`]: Core QR code encoding functionality.
//! - [`matrix`]: Module matrices with module kinds.
//! - [`color`]: Module colors and color tables.
//! - [`raster`]: Plain rasterization and PNG output.
//! - [`svg`]: SVG output.
//! - [`background`]: Background decoding and vector rasterization.
//! - [`compose`]: Compositing over backgrounds.
//! - [`output`]: Output kinds, pixel modes and encoders.
//! - [`helper`]: Convenience entry points.

pub mod background;
pub mod color;
pub mod compose;
pub mod error;
pub mod helper;
pub mod matrix;
pub mod output;
pub mod qrcode;
pub mod raster;
pub mod svg;

pub use background::{Background, FrameSequence, LoopCount, VectorRasterizer};
pub use color::{ColorTable, ModuleColor};
pub use compose::{compose, ArtisticOptions, Composition};
pub use error::{ArtisticError, ArtisticResult};
pub use helper::{render_artistic, render_to_image};
pub use matrix::{ModuleKind, ModuleMatrix};
pub use output::{ColorMode, OutputKind, OutputTarget};
pub use raster::{rasterize, PixelMode, RasterImage};
