//! Horizontal linear gradient rasters.

use image::{Rgb, Rgba, RgbaImage};

/// Generate a `width` x `height` left-to-right gradient from `start` to `end`.
///
/// Column `x` is interpolated with `ratio = x / (width - 1)` (or `0` for a
/// single column), each channel truncated toward zero. Every row is identical
/// and every pixel carries the same `alpha`.
///
/// Zero dimensions produce an empty image.
#[must_use]
pub fn horizontal_gradient(
    start: Rgb<u8>,
    end: Rgb<u8>,
    width: u32,
    height: u32,
    alpha: u8,
) -> RgbaImage {
    let columns: Vec<Rgba<u8>> = (0..width)
        .map(|x| {
            let ratio = if width > 1 {
                f64::from(x) / f64::from(width - 1)
            } else {
                0.0
            };
            let lerp = |ch: usize| {
                let from = f64::from(start[ch]);
                let to = f64::from(end[ch]);
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                {
                    (from + (to - from) * ratio).trunc().clamp(0.0, 255.0) as u8
                }
            };
            Rgba([lerp(0), lerp(1), lerp(2), alpha])
        })
        .collect();

    RgbaImage::from_fn(width, height, |x, _| columns[x as usize])
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

    #[test]
    fn single_column_is_start_color() {
        let img = horizontal_gradient(RED, BLUE, 1, 7, 200);
        assert_eq!(img.dimensions(), (1, 7));
        for px in img.pixels() {
            assert_eq!(*px, Rgba([255, 0, 0, 200]));
        }
    }

    #[test]
    fn endpoints_match_stops() {
        let img = horizontal_gradient(RED, BLUE, 11, 3, 255);
        assert_eq!(*img.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*img.get_pixel(10, 2), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn interior_values_truncate_toward_zero() {
        // ratio 1/4: red 191.25, blue 63.75
        let img = horizontal_gradient(RED, BLUE, 5, 1, 10);
        assert_eq!(*img.get_pixel(1, 0), Rgba([191, 0, 63, 10]));

        // ratio 1/2 of 0..=255 is 127.5, truncated
        let img = horizontal_gradient(Rgb([0, 0, 0]), Rgb([255, 255, 255]), 3, 1, 0);
        assert_eq!(*img.get_pixel(1, 0), Rgba([127, 127, 127, 0]));
    }

    #[test]
    fn rows_are_identical() {
        let img = horizontal_gradient(RED, BLUE, 16, 5, 128);
        for x in 0..16 {
            let top = *img.get_pixel(x, 0);
            for y in 1..5 {
                assert_eq!(*img.get_pixel(x, y), top);
            }
        }
    }
}
