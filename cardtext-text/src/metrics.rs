//! The measuring seam between layout and fonts.
//!
//! Layout never talks to a font stack directly. It asks a [`TextMeasurer`]
//! for vertical metrics, per-character advances and glyph outlines, and
//! applies the typographic knobs of [`FontSpec`] (stretch and letter
//! spacing) on top through the provided trait methods.

use cardtext_core::document::{LINE_SEPARATOR, OBJECT_REPLACEMENT, WORD_JOINER};
use cardtext_core::font::FontSpec;
use kurbo::{Affine, BezPath, Vec2};
use serde::{Deserialize, Serialize};

/// Vertical metrics of a resolved face, in layout units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FontMetrics {
    pub ascent: f32,
    /// Distance below the baseline, positive.
    pub descent: f32,
    pub leading: f32,
    pub x_height: f32,
}

impl FontMetrics {
    /// Proportions used when no face answers a request.
    pub fn approximate(pixel_size: f32) -> Self {
        Self {
            ascent: pixel_size * 0.8,
            descent: pixel_size * 0.2,
            leading: 0.0,
            x_height: pixel_size * 0.5,
        }
    }

    /// Ascent plus descent.
    pub fn height(&self) -> f32 {
        self.ascent + self.descent
    }

    /// Distance between consecutive baselines.
    pub fn line_spacing(&self) -> f32 {
        self.height() + self.leading
    }
}

/// Characters that occupy a position but no horizontal space.
pub fn is_zero_width(ch: char) -> bool {
    matches!(
        ch,
        WORD_JOINER | LINE_SEPARATOR | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' | '\u{00AD}'
    ) || ch.is_control()
}

pub trait TextMeasurer {
    fn metrics(&mut self, font: &FontSpec) -> FontMetrics;

    /// Natural advance of `ch`, before stretch and letter spacing.
    fn advance(&mut self, font: &FontSpec, ch: char) -> f32;

    /// Outline of `ch` with its origin on the baseline, y growing down,
    /// at the natural (unstretched) width. `None` for blank glyphs.
    fn glyph_outline(&mut self, font: &FontSpec, ch: char) -> Option<BezPath>;

    /// Advance after stretch and letter spacing.
    fn styled_advance(&mut self, font: &FontSpec, ch: char) -> f32 {
        if is_zero_width(ch) || ch == OBJECT_REPLACEMENT {
            return 0.0;
        }
        self.advance(font, ch) * font.advance_scale()
    }

    fn text_width(&mut self, font: &FontSpec, text: &str) -> f32 {
        text.chars().map(|ch| self.styled_advance(font, ch)).sum()
    }

    /// Outline of a whole string starting at `origin` (baseline left).
    /// Glyphs are squeezed horizontally by the stretch factor.
    fn text_outline(&mut self, font: &FontSpec, text: &str, origin: (f64, f64)) -> BezPath {
        let stretch = font.stretch.max(1) as f64 / 100.0;
        let mut path = BezPath::new();
        let mut x = origin.0;
        for ch in text.chars() {
            let advance = self.styled_advance(font, ch) as f64;
            if advance > 0.0 {
                if let Some(glyph) = self.glyph_outline(font, ch) {
                    let transform = Affine::translate(Vec2::new(x, origin.1)) * Affine::scale_non_uniform(stretch, 1.0);
                    path.extend(transform * glyph);
                }
            }
            x += advance;
        }
        path
    }
}
