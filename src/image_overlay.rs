//! Image watermark rendering: proportional scaling and uniform transparency.

use image::imageops::{self, FilterType};

use crate::blending::{alpha_from_percent, Layer};
use crate::error::{Error, Result};
use crate::position::{self, Anchor};

/// An image watermark request.
#[derive(Clone)]
pub struct ImageWatermark {
    /// Encoded watermark image (any format the `image` crate can decode).
    pub data: Vec<u8>,
    /// Target width as a percentage of the base image width.
    pub scale: f32,
    /// Opacity percentage applied uniformly, 0 (invisible) to 100 (opaque).
    pub opacity: f32,
    /// Where the watermark goes on the base image.
    pub anchor: Anchor,
}

impl ImageWatermark {
    /// A centered watermark at 20% of the base width and 50% opacity.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            scale: 20.0,
            opacity: 50.0,
            anchor: Anchor::Center,
        }
    }
}

impl std::fmt::Debug for ImageWatermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageWatermark")
            .field("bytes", &self.data.len())
            .field("scale", &self.scale)
            .field("opacity", &self.opacity)
            .field("anchor", &self.anchor)
            .finish()
    }
}

/// Size of the watermark once scaled for a base image `base_width` pixels wide.
///
/// Width is `floor(base_width * scale / 100)`; height keeps the source aspect
/// ratio, rounded to the nearest pixel.
#[must_use]
pub fn scaled_size(source: (u32, u32), base_width: u32, scale: f32) -> (u32, u32) {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        let width = (f64::from(base_width) * f64::from(scale) / 100.0)
            .floor()
            .max(0.0) as u32;
        let aspect = f64::from(source.1) / f64::from(source.0.max(1));
        let height = (f64::from(width) * aspect).round() as u32;
        (width, height)
    }
}

/// Render `spec` for a base image of `base` dimensions.
///
/// Returns `Ok(None)` when the scaled watermark would have no pixels.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the watermark image cannot be decoded.
pub fn render(spec: &ImageWatermark, base: (u32, u32)) -> Result<Option<Layer>> {
    let source = image::load_from_memory(&spec.data)
        .map_err(|source| Error::Decode {
            name: "watermark image".to_string(),
            source,
        })?
        .to_rgba8();

    let (width, height) = scaled_size(source.dimensions(), base.0, spec.scale);
    if width == 0 || height == 0 {
        tracing::debug!(scale = spec.scale, "image watermark scales to nothing, skipping");
        return Ok(None);
    }

    let mut image = imageops::resize(&source, width, height, FilterType::CatmullRom);

    // Replace, not multiply, any alpha the source carried
    let alpha = alpha_from_percent(spec.opacity);
    for px in image.pixels_mut() {
        px[3] = alpha;
    }

    let origin = position::resolve(spec.anchor, (width, height), base);
    tracing::debug!(width, height, ?origin, "rendered image watermark");

    Ok(Some(Layer { image, origin }))
}
