//! Font description shared by the document model, the measurers and the
//! auto-fit controller.
//!
//! A [`FontSpec`] is a request, not a resolved face: the family is a CSS-style
//! fallback chain and the measurer decides which face actually answers it.

use serde::{Deserialize, Serialize};

/// Logical dots per inch used to turn point sizes into layout units.
pub const LOGICAL_DPI: f32 = 96.0;

pub const WEIGHT_NORMAL: u16 = 400;
pub const WEIGHT_DEMI_BOLD: u16 = 600;
pub const WEIGHT_BOLD: u16 = 700;

// ── Font stretch ────────────────────────────────────────────────────

/// Font stretch / width class, expressed as a percentage of the normal width.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FontStretch {
    UltraCondensed,
    ExtraCondensed,
    Condensed,
    SemiCondensed,
    Normal,
    SemiExpanded,
    Expanded,
    ExtraExpanded,
    UltraExpanded,
}

impl Default for FontStretch {
    fn default() -> Self {
        Self::Normal
    }
}

impl FontStretch {
    pub const fn percent(self) -> i32 {
        match self {
            Self::UltraCondensed => 50,
            Self::ExtraCondensed => 62,
            Self::Condensed => 75,
            Self::SemiCondensed => 87,
            Self::Normal => 100,
            Self::SemiExpanded => 112,
            Self::Expanded => 125,
            Self::ExtraExpanded => 150,
            Self::UltraExpanded => 200,
        }
    }

    /// The named class closest to `percent` without exceeding it.
    pub fn classify(percent: i32) -> Self {
        const ALL: [FontStretch; 9] = [
            FontStretch::UltraExpanded,
            FontStretch::ExtraExpanded,
            FontStretch::Expanded,
            FontStretch::SemiExpanded,
            FontStretch::Normal,
            FontStretch::SemiCondensed,
            FontStretch::Condensed,
            FontStretch::ExtraCondensed,
            FontStretch::UltraCondensed,
        ];
        ALL.into_iter()
            .find(|s| percent >= s.percent())
            .unwrap_or(FontStretch::UltraCondensed)
    }
}

// ── Font spec ───────────────────────────────────────────────────────

/// Requested font: family chain, size and the three knobs the auto-fit
/// controller turns (point size, letter spacing, stretch).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSpec {
    /// CSS-style family chain (e.g. `"Georgia, serif"`).
    pub family: String,
    /// Size in points.
    pub point_size: i32,
    /// Weight (100–900).
    pub weight: u16,
    pub italic: bool,
    /// Letter spacing as a percentage of the natural advance (100 = normal).
    pub letter_spacing: i32,
    /// Horizontal stretch as a percentage (100 = normal).
    pub stretch: i32,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: String::from("serif"),
            point_size: 32,
            weight: WEIGHT_NORMAL,
            italic: false,
            letter_spacing: 100,
            stretch: FontStretch::Normal.percent(),
        }
    }
}

impl FontSpec {
    pub fn new(family: impl Into<String>, point_size: i32) -> Self {
        Self {
            family: family.into(),
            point_size,
            ..Default::default()
        }
    }

    pub fn with_weight(mut self, weight: u16) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_italic(mut self, italic: bool) -> Self {
        self.italic = italic;
        self
    }

    pub fn with_letter_spacing(mut self, percent: i32) -> Self {
        self.letter_spacing = percent;
        self
    }

    pub fn with_stretch(mut self, percent: i32) -> Self {
        self.stretch = percent;
        self
    }

    /// Em size in layout units.
    pub fn pixel_size(&self) -> f32 {
        self.point_size.max(0) as f32 * LOGICAL_DPI / 72.0
    }

    /// Ordered, lowercased family names with quotes stripped.
    pub fn families(&self) -> Vec<String> {
        let families: Vec<String> = self
            .family
            .split(',')
            .map(|s| s.trim().trim_matches('"').trim_matches('\'').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if families.is_empty() {
            vec!["serif".into()]
        } else {
            families
        }
    }

    /// Horizontal scale applied to every advance: stretch × letter spacing.
    pub fn advance_scale(&self) -> f32 {
        (self.stretch.max(1) as f32 / 100.0) * (self.letter_spacing.max(1) as f32 / 100.0)
    }

    pub fn stretch_class(&self) -> FontStretch {
        FontStretch::classify(self.stretch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stretch_classes() {
        assert_eq!(FontStretch::SemiCondensed.percent(), 87);
        assert_eq!(FontStretch::classify(100), FontStretch::Normal);
        assert_eq!(FontStretch::classify(88), FontStretch::SemiCondensed);
        assert_eq!(FontStretch::classify(85), FontStretch::Condensed);
        assert_eq!(FontStretch::classify(10), FontStretch::UltraCondensed);
    }

    #[test]
    fn test_families_parsing() {
        let f = FontSpec::new("'Ryo Text', Georgia , serif", 12);
        assert_eq!(f.families(), vec!["ryo text", "georgia", "serif"]);
        assert_eq!(FontSpec::new(" , ", 12).families(), vec!["serif"]);
    }

    #[test]
    fn test_pixel_size_and_scale() {
        let f = FontSpec::new("serif", 36).with_letter_spacing(90).with_stretch(94);
        assert!((f.pixel_size() - 48.0).abs() < 1e-4);
        assert!((f.advance_scale() - 0.846).abs() < 1e-3);
    }
}
