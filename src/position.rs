//! Anchor-based watermark placement.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Distance in pixels kept between a corner-anchored watermark and the canvas edge.
pub const MARGIN: i64 = 10;

/// Named placement rule for a watermark layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// Centered on both axes.
    #[default]
    Center,
    /// Top-left corner, inset by [`MARGIN`].
    TopLeft,
    /// Top-right corner, inset by [`MARGIN`].
    TopRight,
    /// Bottom-left corner, inset by [`MARGIN`].
    BottomLeft,
    /// Bottom-right corner, inset by [`MARGIN`].
    BottomRight,
}

impl Anchor {
    /// All supported anchors.
    pub const ALL: [Anchor; 5] = [
        Anchor::Center,
        Anchor::TopLeft,
        Anchor::TopRight,
        Anchor::BottomLeft,
        Anchor::BottomRight,
    ];

    /// Keyword form, as accepted by [`FromStr`].
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Anchor::Center => "center",
            Anchor::TopLeft => "top-left",
            Anchor::TopRight => "top-right",
            Anchor::BottomLeft => "bottom-left",
            Anchor::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Anchor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Anchor::ALL
            .into_iter()
            .find(|a| a.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| Error::UnknownAnchor(s.to_string()))
    }
}

/// Top-left coordinate at which a layer is pasted. May be negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Placement {
    /// Horizontal offset from the canvas' left edge.
    pub x: i64,
    /// Vertical offset from the canvas' top edge.
    pub y: i64,
}

impl Placement {
    /// Create a placement at `(x, y)`.
    #[must_use]
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }
}

/// Resolve where content of `content` size goes on a canvas of `canvas` size.
///
/// Coordinates are not clamped: content larger than the canvas yields
/// negative offsets and is clipped at blend time.
#[must_use]
pub fn resolve(anchor: Anchor, content: (u32, u32), canvas: (u32, u32)) -> Placement {
    let (w, h) = (i64::from(content.0), i64::from(content.1));
    let (cw, ch) = (i64::from(canvas.0), i64::from(canvas.1));

    match anchor {
        // floor division, also for oversized content
        Anchor::Center => Placement::new((cw - w).div_euclid(2), (ch - h).div_euclid(2)),
        Anchor::TopLeft => Placement::new(MARGIN, MARGIN),
        Anchor::TopRight => Placement::new(cw - w - MARGIN, MARGIN),
        Anchor::BottomLeft => Placement::new(MARGIN, ch - h - MARGIN),
        Anchor::BottomRight => Placement::new(cw - w - MARGIN, ch - h - MARGIN),
    }
}
