//! Text watermark rendering.
//!
//! Text is laid out with the font's own metrics, drawn into a transparent
//! layer with [`PADDING`] pixels on every side of the tight ink box, filled
//! with either a flat color or a horizontal gradient, then rotated with the
//! canvas expanded so no corner is clipped.
//!
//! Placement is computed from the *visible* pixels of the final layer, so the
//! ink (not the padding) lands exactly on the anchor point.

use ab_glyph::{point, Font as _, OutlinedGlyph, PxScale, Rect, ScaleFont};
use image::{GrayImage, Luma, Rgba, RgbaImage};

use crate::blending::{alpha_from_percent, blend_pixel, composite_over, Layer};
use crate::color::ColorSpec;
use crate::error::Result;
use crate::fonts::Font;
use crate::gradient::horizontal_gradient;
use crate::position::{self, Anchor, Placement};

/// Transparent border around the tight ink box, absorbing antialiasing overshoot.
pub const PADDING: u32 = 5;

/// Font size used when a request specifies neither pixels nor a percentage.
pub const DEFAULT_FONT_SIZE: u32 = 20;

/// A text watermark request.
#[derive(Debug, Clone)]
pub struct TextWatermark {
    /// Text to draw. Newlines start additional lines.
    pub text: String,
    /// Font used for layout and glyph outlines.
    pub font: Font,
    /// Explicit font size in pixels. Takes precedence over `font_size_percent`.
    pub font_size: Option<u32>,
    /// Font size as a percentage of the base image width.
    pub font_size_percent: Option<f32>,
    /// Rotation in degrees, clockwise on screen.
    pub rotation: f32,
    /// Color specification, see [`ColorSpec::parse`].
    pub color: String,
    /// Opacity percentage, 0 (invisible) to 100 (opaque).
    pub opacity: f32,
    /// Where the text goes on the base image.
    pub anchor: Anchor,
}

impl TextWatermark {
    /// Black, unrotated, half-opaque, centered text at the default size.
    pub fn new(text: impl Into<String>, font: Font) -> Self {
        Self {
            text: text.into(),
            font,
            font_size: None,
            font_size_percent: None,
            rotation: 0.0,
            color: "#000000".to_string(),
            opacity: 50.0,
            anchor: Anchor::Center,
        }
    }
}

/// Tight box around the visible pixels of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Pick the font size for a base image `base_width` pixels wide.
///
/// Explicit pixels win; otherwise a positive percentage of the width is used
/// (at least 1px); otherwise `default`.
#[must_use]
pub fn effective_font_size(
    pixels: Option<u32>,
    percent: Option<f32>,
    base_width: u32,
    default: u32,
) -> u32 {
    match (pixels, percent) {
        (Some(px), _) => px,
        (None, Some(pct)) if pct > 0.0 => {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let size = (f64::from(base_width) * f64::from(pct) / 100.0).floor() as u32;
            size.max(1)
        }
        _ => default,
    }
}

/// Tight ink size `(width, height)` of `text` at `size` pixels.
///
/// Returns `None` when the text has no visible glyphs (empty or whitespace).
#[must_use]
pub fn measure_text(font: &Font, text: &str, size: u32) -> Option<(u32, u32)> {
    let glyphs = layout(font, text, size);
    ink_bounds(&glyphs).map(|ink| ink_size(&ink))
}

/// Render `spec` for a base image of `base` dimensions.
///
/// Returns `Ok(None)` when nothing would be visible (no glyphs, zero opacity).
///
/// # Errors
///
/// Returns [`crate::Error::InvalidGradient`] if the color is a malformed gradient.
pub fn render(spec: &TextWatermark, base: (u32, u32), default_size: u32) -> Result<Option<Layer>> {
    let fill = ColorSpec::parse(&spec.color)?;
    let size = effective_font_size(spec.font_size, spec.font_size_percent, base.0, default_size);

    let glyphs = layout(&spec.font, &spec.text, size);
    let Some(ink) = ink_bounds(&glyphs) else {
        tracing::debug!("text {:?} has no visible glyphs, skipping", spec.text);
        return Ok(None);
    };

    let alpha = alpha_from_percent(spec.opacity);
    let padded = draw_padded(&glyphs, &ink, fill, alpha);
    let rotated = rotate_expanded(padded, spec.rotation);

    let Some(visible) = visible_bounds(&rotated) else {
        tracing::debug!("text layer fully transparent, skipping");
        return Ok(None);
    };

    let at = position::resolve(spec.anchor, (visible.width, visible.height), base);
    let origin = Placement::new(at.x - i64::from(visible.x), at.y - i64::from(visible.y));

    tracing::debug!(
        font = spec.font.name(),
        size,
        layer = ?rotated.dimensions(),
        ?origin,
        "rendered text watermark"
    );

    Ok(Some(Layer {
        image: rotated,
        origin,
    }))
}

/// Lay `text` out on baselines starting at the font's ascent, with kerning.
fn layout(font: &Font, text: &str, size: u32) -> Vec<OutlinedGlyph> {
    let font = font.glyphs();
    #[allow(clippy::cast_precision_loss)]
    let scale = PxScale::from(size as f32);
    let scaled = font.as_scaled(scale);
    let line_height = scaled.height() + scaled.line_gap();

    let mut outlined = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let baseline = scaled.ascent() + line_height * line_no as f32;
        let mut caret = 0.0f32;
        let mut prev = None;

        for c in line.chars() {
            let id = scaled.glyph_id(c);
            if let Some(prev) = prev {
                caret += scaled.kern(prev, id);
            }
            let glyph = id.with_scale_and_position(scale, point(caret, baseline));
            caret += scaled.h_advance(id);
            prev = Some(id);

            if let Some(o) = font.outline_glyph(glyph) {
                outlined.push(o);
            }
        }
    }
    outlined
}

fn ink_bounds(glyphs: &[OutlinedGlyph]) -> Option<Rect> {
    glyphs
        .iter()
        .map(OutlinedGlyph::px_bounds)
        .filter(|b| b.width() > 0.0 && b.height() > 0.0)
        .reduce(|a, b| Rect {
            min: point(a.min.x.min(b.min.x), a.min.y.min(b.min.y)),
            max: point(a.max.x.max(b.max.x), a.max.y.max(b.max.y)),
        })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn ink_size(ink: &Rect) -> (u32, u32) {
    (ink.width().ceil() as u32, ink.height().ceil() as u32)
}

/// Call `plot(x, y, coverage)` for every covered pixel, with the ink box's
/// top-left mapped to `(offset, offset)`.
fn rasterize(
    glyphs: &[OutlinedGlyph],
    ink: &Rect,
    offset: u32,
    mut plot: impl FnMut(i64, i64, f32),
) {
    for glyph in glyphs {
        let bounds = glyph.px_bounds();
        // px_bounds are pixel aligned, so these are exact integers
        #[allow(clippy::cast_possible_truncation)]
        let dx = (bounds.min.x - ink.min.x).round() as i64 + i64::from(offset);
        #[allow(clippy::cast_possible_truncation)]
        let dy = (bounds.min.y - ink.min.y).round() as i64 + i64::from(offset);
        glyph.draw(|x, y, coverage| {
            plot(i64::from(x) + dx, i64::from(y) + dy, coverage.clamp(0.0, 1.0));
        });
    }
}

/// Draw the glyphs into a `(tw + 2P) x (th + 2P)` transparent layer.
fn draw_padded(glyphs: &[OutlinedGlyph], ink: &Rect, fill: ColorSpec, alpha: u8) -> RgbaImage {
    let (tw, th) = ink_size(ink);
    let mut layer = RgbaImage::new(tw + 2 * PADDING, th + 2 * PADDING);

    match fill {
        ColorSpec::Solid(rgb) => {
            let (w, h) = (i64::from(layer.width()), i64::from(layer.height()));
            rasterize(glyphs, ink, PADDING, |x, y, coverage| {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let a = (f32::from(alpha) * coverage).round() as u8;
                if a == 0 || x < 0 || y < 0 || x >= w || y >= h {
                    return;
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let px = layer.get_pixel_mut(x as u32, y as u32);
                *px = blend_pixel(*px, Rgba([rgb[0], rgb[1], rgb[2], a]));
            });
        }
        ColorSpec::Gradient(start, end) => {
            let mask = coverage_mask(glyphs, ink, tw, th);
            let gradient = horizontal_gradient(start, end, tw, th, alpha);
            let masked = RgbaImage::from_fn(tw, th, |x, y| {
                let g = gradient.get_pixel(x, y);
                let m = u16::from(mask.get_pixel(x, y)[0]);
                #[allow(clippy::cast_possible_truncation)]
                let a = ((u16::from(g[3]) * m + 127) / 255) as u8;
                Rgba([g[0], g[1], g[2], a])
            });
            let pad = i64::from(PADDING);
            composite_over(&mut layer, &masked, Placement::new(pad, pad));
        }
    }
    layer
}

/// Single-channel glyph coverage over the tight ink box.
fn coverage_mask(glyphs: &[OutlinedGlyph], ink: &Rect, tw: u32, th: u32) -> GrayImage {
    let mut mask = GrayImage::new(tw, th);
    let (w, h) = (i64::from(tw), i64::from(th));
    rasterize(glyphs, ink, 0, |x, y, coverage| {
        if x < 0 || y < 0 || x >= w || y >= h {
            return;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let value = (coverage * 255.0).round() as u8;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let px = mask.get_pixel_mut(x as u32, y as u32);
        *px = Luma([px[0].max(value)]);
    });
    mask
}

/// Rotate `layer` clockwise by `degrees`, growing the canvas to fit every corner.
///
/// Exposed area is transparent. Sampling is bilinear on premultiplied color so
/// transparent neighbours do not darken edges. Whole turns return the layer as is.
#[must_use]
pub fn rotate_expanded(layer: RgbaImage, degrees: f32) -> RgbaImage {
    if f64::from(degrees).rem_euclid(360.0) == 0.0 {
        return layer;
    }

    let theta = f64::from(degrees).to_radians();
    let (sin, cos) = theta.sin_cos();
    let (w, h) = (f64::from(layer.width()), f64::from(layer.height()));

    let dst_w = expanded(w * cos.abs() + h * sin.abs());
    let dst_h = expanded(w * sin.abs() + h * cos.abs());
    let (cx, cy) = (w / 2.0, h / 2.0);
    let (dcx, dcy) = (f64::from(dst_w) / 2.0, f64::from(dst_h) / 2.0);

    RgbaImage::from_fn(dst_w, dst_h, |dx, dy| {
        // inverse-map destination pixel centers into the source
        let rx = f64::from(dx) + 0.5 - dcx;
        let ry = f64::from(dy) + 0.5 - dcy;
        let sx = rx * cos + ry * sin + cx - 0.5;
        let sy = -rx * sin + ry * cos + cy - 0.5;
        sample_bilinear(&layer, sx, sy)
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn expanded(extent: f64) -> u32 {
    (extent - 1e-6).ceil().max(1.0) as u32
}

fn sample_bilinear(img: &RgbaImage, sx: f64, sy: f64) -> Rgba<u8> {
    let (w, h) = (i64::from(img.width()), i64::from(img.height()));
    let (x0, y0) = (sx.floor(), sy.floor());
    let (fx, fy) = (sx - x0, sy - y0);

    #[allow(clippy::cast_possible_truncation)]
    let (x0, y0) = (x0 as i64, y0 as i64);
    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];

    let mut acc = [0.0f64; 4];
    for (x, y, weight) in taps {
        if weight <= 0.0 || x < 0 || y < 0 || x >= w || y >= h {
            continue;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let p = img.get_pixel(x as u32, y as u32);
        let a = f64::from(p[3]) * weight;
        for c in 0..3 {
            acc[c] += f64::from(p[c]) * a;
        }
        acc[3] += a;
    }

    if acc[3] < 0.5 {
        return Rgba([0, 0, 0, 0]);
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let channel = |c: usize| (acc[c] / acc[3]).round().clamp(0.0, 255.0) as u8;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Rgba([channel(0), channel(1), channel(2), acc[3].round().min(255.0) as u8])
}

/// Tight box around pixels with non-zero alpha, or `None` if there are none.
#[must_use]
pub fn visible_bounds(img: &RgbaImage) -> Option<Bounds> {
    let mut min = (u32::MAX, u32::MAX);
    let mut max = (0u32, 0u32);
    let mut any = false;

    for (x, y, px) in img.enumerate_pixels() {
        if px[3] == 0 {
            continue;
        }
        any = true;
        min = (min.0.min(x), min.1.min(y));
        max = (max.0.max(x), max.1.max(y));
    }

    any.then(|| Bounds {
        x: min.0,
        y: min.1,
        width: max.0 - min.0 + 1,
        height: max.1 - min.1 + 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::test_support::system_font;

    macro_rules! font_or_skip {
        () => {
            match system_font() {
                Some(font) => font,
                None => {
                    eprintln!("no system font installed, skipping");
                    return;
                }
            }
        };
    }

    fn spec(font: Font, text: &str) -> TextWatermark {
        TextWatermark {
            font_size: Some(48),
            opacity: 100.0,
            ..TextWatermark::new(text, font)
        }
    }

    #[test]
    fn font_size_precedence() {
        assert_eq!(effective_font_size(Some(33), Some(50.0), 1000, 20), 33);
        assert_eq!(effective_font_size(None, Some(5.0), 1000, 20), 50);
        assert_eq!(effective_font_size(None, Some(2.5), 999, 20), 24);
        assert_eq!(effective_font_size(None, Some(0.0), 1000, 20), 20);
        assert_eq!(effective_font_size(None, Some(0.01), 10, 20), 1);
        assert_eq!(effective_font_size(None, None, 1000, 20), 20);
    }

    #[test]
    fn rotate_whole_turn_is_identity() {
        let img = RgbaImage::from_fn(7, 3, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            Rgba([x as u8, y as u8, 9, 255])
        });
        assert_eq!(rotate_expanded(img.clone(), 0.0), img);
        assert_eq!(rotate_expanded(img.clone(), 360.0), img);
        assert_eq!(rotate_expanded(img.clone(), -720.0), img);
    }

    #[test]
    fn rotate_quarter_turn_is_clockwise() {
        // red column on the left; clockwise it ends up as the top row
        let img = RgbaImage::from_fn(4, 2, |x, _| {
            if x == 0 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 255, 255])
            }
        });
        let rotated = rotate_expanded(img, 90.0);
        assert_eq!(rotated.dimensions(), (2, 4));
        assert_eq!(*rotated.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*rotated.get_pixel(1, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*rotated.get_pixel(0, 3), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn rotate_diagonal_expands_canvas() {
        let img = RgbaImage::from_pixel(100, 20, Rgba([0, 0, 0, 255]));
        let rotated = rotate_expanded(img, 45.0);
        // 100 * cos45 + 20 * sin45 = 84.85
        assert_eq!(rotated.dimensions(), (85, 85));
        assert_eq!(rotated.get_pixel(0, 0)[3], 0);
        assert_eq!(rotated.get_pixel(42, 42)[3], 255);
    }

    #[test]
    fn visible_bounds_trims_transparency() {
        let mut img = RgbaImage::new(10, 10);
        assert_eq!(visible_bounds(&img), None);
        img.put_pixel(2, 3, Rgba([0, 0, 0, 1]));
        img.put_pixel(6, 4, Rgba([0, 0, 0, 255]));
        assert_eq!(
            visible_bounds(&img),
            Some(Bounds { x: 2, y: 3, width: 5, height: 2 })
        );
    }

    #[test]
    fn measure_grows_with_size() {
        let font = font_or_skip!();
        let (w1, h1) = measure_text(&font, "Hello", 12).unwrap();
        let (w2, h2) = measure_text(&font, "Hello", 24).unwrap();
        let (w3, h3) = measure_text(&font, "Hello", 48).unwrap();
        assert!(w1 < w2 && w2 < w3);
        assert!(h1 < h2 && h2 < h3);
        assert_eq!(measure_text(&font, "   ", 48), None);
        assert_eq!(measure_text(&font, "", 48), None);
    }

    #[test]
    fn multiline_text_is_taller() {
        let font = font_or_skip!();
        let (w1, h1) = measure_text(&font, "Hello", 30).unwrap();
        let (w2, h2) = measure_text(&font, "Hello\nHello", 30).unwrap();
        assert_eq!(w1, w2);
        assert!(h2 > 2 * h1);
    }

    #[test]
    fn unrotated_layer_is_padded_ink_box() {
        let font = font_or_skip!();
        let s = spec(font.clone(), "Watermark");
        let (tw, th) = measure_text(&font, "Watermark", 48).unwrap();

        let layer = render(&s, (800, 600), DEFAULT_FONT_SIZE).unwrap().unwrap();
        assert_eq!(layer.image.dimensions(), (tw + 2 * PADDING, th + 2 * PADDING));

        // ink stays inside the padding
        let visible = visible_bounds(&layer.image).unwrap();
        assert!(visible.x >= PADDING && visible.y >= PADDING);
        assert!(visible.x + visible.width <= PADDING + tw);
        assert!(visible.y + visible.height <= PADDING + th);
    }

    #[test]
    fn visible_ink_lands_on_anchor() {
        let font = font_or_skip!();
        for (anchor, rotation) in [
            (Anchor::TopLeft, 0.0),
            (Anchor::TopLeft, 30.0),
            (Anchor::BottomRight, -15.0),
        ] {
            let s = TextWatermark {
                anchor,
                rotation,
                ..spec(font.clone(), "Anchored")
            };
            let layer = render(&s, (800, 600), DEFAULT_FONT_SIZE).unwrap().unwrap();
            let visible = visible_bounds(&layer.image).unwrap();
            let left = layer.origin.x + i64::from(visible.x);
            let top = layer.origin.y + i64::from(visible.y);
            match anchor {
                Anchor::TopLeft => assert_eq!((left, top), (10, 10)),
                _ => {
                    let right = left + i64::from(visible.width);
                    let bottom = top + i64::from(visible.height);
                    assert_eq!((right, bottom), (790, 590));
                }
            }
        }
    }

    #[test]
    fn opacity_scales_alpha() {
        let font = font_or_skip!();
        let full = render(&spec(font.clone(), "HH"), (400, 400), 20)
            .unwrap()
            .unwrap();
        let half = TextWatermark {
            opacity: 50.0,
            ..spec(font.clone(), "HH")
        };
        let half = render(&half, (400, 400), 20).unwrap().unwrap();

        let max_alpha = |l: &Layer| l.image.pixels().map(|p| p[3]).max().unwrap_or(0);
        assert_eq!(max_alpha(&full), 255);
        assert_eq!(max_alpha(&half), 128);

        let invisible = TextWatermark {
            opacity: 0.0,
            ..spec(font, "HH")
        };
        assert!(render(&invisible, (400, 400), 20).unwrap().is_none());
    }

    #[test]
    fn gradient_runs_red_to_blue() {
        let font = font_or_skip!();
        let s = TextWatermark {
            color: "gradient(#ff0000, #0000ff)".to_string(),
            ..spec(font, "WWWWWW")
        };
        let layer = render(&s, (800, 600), DEFAULT_FONT_SIZE).unwrap().unwrap();

        let opaque: Vec<(u32, Rgba<u8>)> = layer
            .image
            .enumerate_pixels()
            .filter(|(_, _, p)| p[3] > 0)
            .map(|(x, _, p)| (x, *p))
            .collect();
        let leftmost = opaque.iter().min_by_key(|(x, _)| *x).unwrap().1;
        let rightmost = opaque.iter().max_by_key(|(x, _)| *x).unwrap().1;
        assert!(leftmost[0] > leftmost[2], "left {leftmost:?}");
        assert!(rightmost[2] > rightmost[0], "right {rightmost:?}");
    }

    #[test]
    fn malformed_gradient_fails() {
        let font = font_or_skip!();
        let s = TextWatermark {
            color: "gradient(red, bogus)".to_string(),
            ..spec(font, "Oops")
        };
        assert!(render(&s, (100, 100), 20).is_err());
    }

    #[test]
    fn whitespace_text_renders_nothing() {
        let font = font_or_skip!();
        assert!(render(&spec(font, " \n "), (100, 100), 20).unwrap().is_none());
    }
}
