//! Alpha blending math for watermark compositing.
//!
//! Watermarks are applied with the straight-alpha Porter-Duff "over" operator:
//! `out_a = src_a + dst_a * (1 - src_a)` and
//! `out_c = (src_c * src_a + dst_c * dst_a * (1 - src_a)) / out_a`.
//!
//! Over an opaque base this reduces to the familiar
//! `result = overlay * alpha + base * (1 - alpha)`.

use image::{Rgba, RgbaImage};

use crate::position::Placement;

/// An owned RGBA buffer positioned on a larger canvas.
#[derive(Clone)]
pub struct Layer {
    /// Layer pixels, straight alpha.
    pub image: RgbaImage,
    /// Where the layer's top-left pixel lands on the canvas.
    pub origin: Placement,
}

impl std::fmt::Debug for Layer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layer")
            .field("dimensions", &self.image.dimensions())
            .field("origin", &self.origin)
            .finish()
    }
}

/// Transparent sheet the size of a base image that collects watermark layers.
///
/// The sheet can only be created from, and applied to, images of the same
/// dimensions.
#[derive(Debug, Clone)]
pub struct Overlay {
    sheet: RgbaImage,
}

impl Overlay {
    /// A fully transparent overlay matching `base`.
    #[must_use]
    pub fn for_base(base: &RgbaImage) -> Self {
        Self {
            sheet: RgbaImage::new(base.width(), base.height()),
        }
    }

    /// Composite `layer` on top of everything added so far.
    pub fn add(&mut self, layer: &Layer) {
        composite_over(&mut self.sheet, &layer.image, layer.origin);
    }

    /// Whether no pixel of the overlay is visible.
    #[must_use]
    pub fn is_transparent(&self) -> bool {
        self.sheet.pixels().all(|p| p[3] == 0)
    }

    /// Blend the overlay onto `base` and return the result.
    #[must_use]
    pub fn apply(&self, mut base: RgbaImage) -> RgbaImage {
        debug_assert_eq!(base.dimensions(), self.sheet.dimensions());
        composite_over(&mut base, &self.sheet, Placement::default());
        base
    }

    /// The accumulated overlay pixels.
    #[must_use]
    pub fn as_image(&self) -> &RgbaImage {
        &self.sheet
    }
}

/// Blend `src` over `dst` with `src`'s top-left at `at`.
///
/// Pixels of `src` that fall outside `dst` are dropped.
pub fn composite_over(dst: &mut RgbaImage, src: &RgbaImage, at: Placement) {
    let dst_w = i64::from(dst.width());
    let dst_h = i64::from(dst.height());

    // Clip to destination bounds
    let x1 = at.x.max(0);
    let y1 = at.y.max(0);
    let x2 = (at.x + i64::from(src.width())).min(dst_w);
    let y2 = (at.y + i64::from(src.height())).min(dst_h);

    if x1 >= x2 || y1 >= y2 {
        return;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    for ty in y1..y2 {
        for tx in x1..x2 {
            let fg = *src.get_pixel((tx - at.x) as u32, (ty - at.y) as u32);
            if fg[3] == 0 {
                continue;
            }
            let px = dst.get_pixel_mut(tx as u32, ty as u32);
            *px = blend_pixel(*px, fg);
        }
    }
}

/// Blend a single `fg` pixel over `bg` using the "over" operator.
#[must_use]
pub fn blend_pixel(bg: Rgba<u8>, fg: Rgba<u8>) -> Rgba<u8> {
    if fg[3] == 0 {
        return bg;
    }
    if fg[3] == 255 || bg[3] == 0 {
        return fg;
    }

    let fg_a = f32::from(fg[3]) / 255.0;
    let bg_a = f32::from(bg[3]) / 255.0;
    let out_a = fg_a + bg_a * (1.0 - fg_a);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let channel = |c: usize| -> u8 {
        let v = (f32::from(fg[c]) * fg_a + f32::from(bg[c]) * bg_a * (1.0 - fg_a)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Rgba([
        channel(0),
        channel(1),
        channel(2),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Convert an opacity percentage (0-100) to an 8-bit alpha, rounding to nearest.
#[must_use]
pub fn alpha_from_percent(percent: f32) -> u8 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        (255.0 * percent / 100.0).round().clamp(0.0, 255.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(color))
    }

    #[test]
    fn half_alpha_over_opaque_matches_lerp() {
        let out = blend_pixel(Rgba([0, 0, 0, 255]), Rgba([255, 255, 255, 128]));
        // 255 * 128/255 = 128
        assert_eq!(out, Rgba([128, 128, 128, 255]));

        let out = blend_pixel(Rgba([255, 255, 255, 255]), Rgba([0, 0, 0, 128]));
        assert_eq!(out, Rgba([127, 127, 127, 255]));
    }

    #[test]
    fn transparent_foreground_is_identity() {
        let bg = Rgba([12, 34, 56, 255]);
        assert_eq!(blend_pixel(bg, Rgba([255, 0, 0, 0])), bg);
    }

    #[test]
    fn over_transparent_background_keeps_foreground() {
        let fg = Rgba([10, 200, 30, 77]);
        assert_eq!(blend_pixel(Rgba([0, 0, 0, 0]), fg), fg);
    }

    #[test]
    fn alpha_accumulates() {
        let out = blend_pixel(Rgba([255, 0, 0, 128]), Rgba([0, 0, 255, 128]));
        // 0.502 + 0.502 * 0.498 = 0.752
        assert_eq!(out[3], 192);
        assert!(out[2] > out[0]);
    }

    #[test]
    fn composite_clips_at_edges() {
        let mut dst = solid(50, 50, [255, 255, 255, 255]);
        let src = solid(30, 30, [255, 0, 0, 255]);

        composite_over(&mut dst, &src, Placement::new(40, 40));
        assert_eq!(*dst.get_pixel(45, 45), Rgba([255, 0, 0, 255]));
        assert_eq!(*dst.get_pixel(30, 30), Rgba([255, 255, 255, 255]));

        composite_over(&mut dst, &src, Placement::new(-20, -20));
        assert_eq!(*dst.get_pixel(5, 5), Rgba([255, 0, 0, 255]));
        assert_eq!(*dst.get_pixel(20, 20), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn composite_fully_outside_is_noop() {
        let mut dst = solid(10, 10, [1, 2, 3, 255]);
        let before = dst.clone();
        let src = solid(5, 5, [255, 0, 0, 255]);
        composite_over(&mut dst, &src, Placement::new(10, 0));
        composite_over(&mut dst, &src, Placement::new(-5, -5));
        assert_eq!(dst, before);
    }

    #[test]
    fn empty_overlay_is_idempotent() {
        let base = RgbaImage::from_fn(17, 9, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            Rgba([(x * 15) as u8, (y * 28) as u8, 99, 255])
        });
        let overlay = Overlay::for_base(&base);
        assert!(overlay.is_transparent());
        assert_eq!(overlay.apply(base.clone()), base);
    }

    #[test]
    fn later_layers_sit_on_top() {
        let base = solid(20, 20, [255, 255, 255, 255]);
        let mut overlay = Overlay::for_base(&base);
        overlay.add(&Layer {
            image: solid(10, 10, [255, 0, 0, 255]),
            origin: Placement::new(0, 0),
        });
        overlay.add(&Layer {
            image: solid(10, 10, [0, 0, 255, 255]),
            origin: Placement::new(5, 5),
        });

        let out = overlay.apply(base);
        assert_eq!(*out.get_pixel(2, 2), Rgba([255, 0, 0, 255]));
        assert_eq!(*out.get_pixel(7, 7), Rgba([0, 0, 255, 255]));
        assert_eq!(*out.get_pixel(18, 18), Rgba([255, 255, 255, 255]));
    }

    #[test]
    fn alpha_from_percent_rounds() {
        assert_eq!(alpha_from_percent(0.0), 0);
        assert_eq!(alpha_from_percent(50.0), 128);
        assert_eq!(alpha_from_percent(100.0), 255);
        assert_eq!(alpha_from_percent(150.0), 255);
    }
}
