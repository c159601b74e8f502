//! Color and gradient specification parsing.
//!
//! A text watermark color is either a single CSS color (`"navy"`, `"#1e90ff"`,
//! `"rgb(10, 20, 30)"`, `"hsl(200, 80%, 40%)"`) or a two-stop horizontal
//! gradient written as `gradient(<color>, <color>)`.
//!
//! The two forms have different failure policies: an unresolvable solid color
//! silently becomes white, while a malformed gradient stop is an error.

use image::Rgb;

use crate::error::{Error, Result};

/// Fallback for solid colors that cannot be resolved.
pub const FALLBACK: Rgb<u8> = Rgb([255, 255, 255]);

/// A resolved text fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpec {
    /// A single flat color.
    Solid(Rgb<u8>),
    /// A left-to-right linear gradient between two stops.
    Gradient(Rgb<u8>, Rgb<u8>),
}

impl ColorSpec {
    /// Parse a color specification.
    ///
    /// Solid colors never fail: anything unresolvable becomes [`FALLBACK`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidGradient`] if the input uses the `gradient(...)`
    /// form and does not contain exactly two resolvable stops.
    pub fn parse(spec: &str) -> Result<Self> {
        let trimmed = spec.trim();
        let lowered = trimmed.to_ascii_lowercase();

        if let Some(inner) = lowered.strip_prefix("gradient(") {
            let inner = inner.trim_end();
            let inner = inner.strip_suffix(')').unwrap_or(inner);
            let invalid = |reason: String| Error::InvalidGradient {
                spec: trimmed.to_string(),
                reason,
            };

            let [first, second] = split_stops(inner)
                .ok_or_else(|| invalid("expected two comma-separated color stops".to_string()))?;
            let start = resolve_token(first).map_err(|e| invalid(e.to_string()))?;
            let end = resolve_token(second).map_err(|e| invalid(e.to_string()))?;
            return Ok(Self::Gradient(start, end));
        }

        let rgb = resolve_token(trimmed).unwrap_or_else(|e| {
            tracing::debug!("{e}, falling back to white");
            FALLBACK
        });
        Ok(Self::Solid(rgb))
    }

    /// Whether this spec fills text with a gradient.
    #[must_use]
    pub fn is_gradient(&self) -> bool {
        matches!(self, Self::Gradient(..))
    }
}

/// Resolve a single color token to RGB.
///
/// Accepts any CSS color: keywords, `#rgb`/`#rrggbb` hex (with optional alpha
/// digits), `rgb()`, `hsl()`, `hwb()` and the like. Alpha is dropped.
///
/// # Errors
///
/// Returns [`Error::InvalidColor`] if the token is not a CSS color.
pub fn resolve_token(token: &str) -> Result<Rgb<u8>> {
    let token = token.trim().to_ascii_lowercase();
    let color = csscolorparser::parse(&token)
        .map_err(|e| Error::InvalidColor(format!("{token} ({e})")))?;
    let [r, g, b, _] = color.to_rgba8();
    Ok(Rgb([r, g, b]))
}

/// Split gradient arguments on top-level commas, leaving `hsl(a, b, c)` intact.
fn split_stops(args: &str) -> Option<[&str; 2]> {
    let mut depth = 0usize;
    let mut parts = Vec::with_capacity(2);
    let mut from = 0;
    for (i, c) in args.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&args[from..i]);
                from = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&args[from..]);
    match parts.as_slice() {
        [first, second] => Some([*first, *second]),
        _ => None,
    }
}
