//! Composite text and image watermarks onto batches of images.
//!
//! Each base image gets at most one image watermark and one text watermark.
//! The image watermark is scaled relative to the base width and given a
//! uniform transparency; the text is rendered with a real font, optionally
//! filled with a horizontal gradient and rotated. Both are collected on a
//! transparent overlay the size of the base image, text above image, and the
//! overlay is alpha-blended onto the base.
//!
//! A batch writes one output per image plus a zip archive of all outputs.
//! [`RetentionScheduler`] deletes those artifacts again after a delay.
//!
//! # Quick Start
//!
//! ```no_run
//! use dmarkify::{Config, FontCatalog, TextWatermark, Watermarker, WatermarkRequest};
//!
//! # fn main() -> dmarkify::Result<()> {
//! let config = Config::default();
//! let fonts = FontCatalog::new(&config.fonts_dir, &config.default_font);
//! let engine = Watermarker::new(config)?;
//!
//! let mut text = TextWatermark::new("SAMPLE", fonts.resolve("Roboto-Regular")?);
//! text.color = "gradient(red, blue)".to_string();
//! text.rotation = 30.0;
//!
//! let request = WatermarkRequest::new("photo.jpg", std::fs::read("photo.jpg")?).with_text(text);
//! let bundle = engine.composite(&[request])?;
//! println!("{}", bundle.archive.display());
//! # Ok(())
//! # }
//! ```
//!
//! # Colors
//!
//! Text colors are any CSS color: hex (`#rgb`, `#rrggbb`, with optional alpha
//! digits that are ignored), `rgb()`, `hsl()` or a name. `gradient(<start>, <end>)`
//! fills the text left to right. An unreadable solid color falls back to
//! white; an unreadable gradient is an error.

#![deny(missing_docs)]

pub mod blending;
pub mod bundle;
pub mod color;
pub mod config;
mod engine;
pub mod error;
pub mod fonts;
pub mod gradient;
pub mod image_overlay;
pub mod position;
pub mod retention;
pub mod storage;
pub mod text;

pub use config::Config;
pub use engine::{
    encode_image, is_supported_image, output_format, Bundle, CompositeResult, ItemFailure,
    WatermarkRequest, Watermarker,
};
pub use error::{Error, Result};
pub use fonts::{Font, FontCatalog};
pub use image_overlay::ImageWatermark;
pub use position::Anchor;
pub use retention::{RetentionScheduler, ShutdownMode};
pub use storage::StorageAllocator;
pub use text::TextWatermark;
