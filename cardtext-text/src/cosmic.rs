//! Measurer backed by `cosmic-text`.
//!
//! Faces come from the system font database (plus any font files loaded
//! explicitly). Advances are taken from shaping a single character, so
//! family fallback behaves exactly like it does for full text runs.
//! Everything expensive is memoised in LRU caches keyed by the face
//! request and the character.

use std::num::NonZeroUsize;
use std::path::Path;

use cardtext_core::font::FontSpec;
use cosmic_text::{
    fontdb, Attrs, Buffer, CacheKey, Command, Family, FontSystem, Metrics, Shaping, Style,
    SwashCache, Weight,
};
use kurbo::BezPath;
use lru::LruCache;

use crate::metrics::{FontMetrics, TextMeasurer};

pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("the font database contains no faces")]
    NoFaces,
    #[error("no face matches family chain \"{0}\"")]
    NoMatch(String),
    #[error("failed to load font file: {0}")]
    Io(#[from] std::io::Error),
}

// ── Family resolution ───────────────────────────────────────────────

/// An owned family choice; borrowed into a [`Family`] at use sites.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum FamilyChoice {
    Serif,
    SansSerif,
    Monospace,
    Cursive,
    Fantasy,
    Named(String),
}

impl FamilyChoice {
    fn parse(name: &str) -> Self {
        match name {
            "serif" => Self::Serif,
            "sans-serif" => Self::SansSerif,
            "monospace" => Self::Monospace,
            "cursive" => Self::Cursive,
            "fantasy" => Self::Fantasy,
            other => Self::Named(other.to_string()),
        }
    }

    fn as_family(&self) -> Family<'_> {
        match self {
            Self::Serif => Family::Serif,
            Self::SansSerif => Family::SansSerif,
            Self::Monospace => Family::Monospace,
            Self::Cursive => Family::Cursive,
            Self::Fantasy => Family::Fantasy,
            Self::Named(name) => Family::Name(name),
        }
    }
}

/// Face request used as a cache key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct FaceKey {
    family: FamilyChoice,
    weight: u16,
    italic: bool,
    /// `f32::to_bits` of the pixel size.
    size: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct GlyphKey {
    face: FaceKey,
    ch: char,
}

// ── Measurer ────────────────────────────────────────────────────────

pub struct CosmicMeasurer {
    font_system: FontSystem,
    swash_cache: SwashCache,
    /// Family chain → resolved family.
    families: LruCache<String, FamilyChoice>,
    metrics: LruCache<FaceKey, FontMetrics>,
    advances: LruCache<GlyphKey, f32>,
    outlines: LruCache<GlyphKey, Option<BezPath>>,
}

impl CosmicMeasurer {
    /// Creates a measurer over the system font database.
    pub fn new() -> Result<Self, FontError> {
        Self::with_font_system(FontSystem::new(), DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_font_system(font_system: FontSystem, capacity: usize) -> Result<Self, FontError> {
        let faces = font_system.db().faces().count();
        if faces == 0 {
            return Err(FontError::NoFaces);
        }
        log::info!("CosmicMeasurer: {} faces available", faces);
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            font_system,
            swash_cache: SwashCache::new(),
            families: LruCache::new(capacity),
            metrics: LruCache::new(capacity),
            advances: LruCache::new(capacity),
            outlines: LruCache::new(capacity),
        })
    }

    /// Adds a font file to the database. Cached measurements are dropped
    /// since fallback may now resolve differently.
    pub fn load_font_file(&mut self, path: impl AsRef<Path>) -> Result<(), FontError> {
        self.font_system.db_mut().load_font_file(path)?;
        self.clear_caches();
        Ok(())
    }

    pub fn load_font_data(&mut self, data: Vec<u8>) {
        self.font_system.db_mut().load_font_data(data);
        self.clear_caches();
    }

    pub fn clear_caches(&mut self) {
        self.families.clear();
        self.metrics.clear();
        self.advances.clear();
        self.outlines.clear();
    }

    pub fn face_count(&self) -> usize {
        self.font_system.db().faces().count()
    }

    /// The database's own spelling of a family name.
    fn find_family(&self, name: &str) -> Option<String> {
        self.font_system.db().faces().find_map(|face| {
            face.families
                .iter()
                .find(|(n, _)| n.eq_ignore_ascii_case(name))
                .map(|(n, _)| n.clone())
        })
    }

    /// First entry of the family chain the database can answer; generic
    /// families are always accepted.
    fn resolve_family(&mut self, font: &FontSpec) -> FamilyChoice {
        if let Some(choice) = self.families.get(&font.family) {
            return choice.clone();
        }
        let mut resolved = None;
        for name in font.families() {
            match FamilyChoice::parse(&name) {
                FamilyChoice::Named(n) => {
                    if let Some(found) = self.find_family(&n) {
                        resolved = Some(FamilyChoice::Named(found));
                        break;
                    }
                }
                generic => {
                    resolved = Some(generic);
                    break;
                }
            }
        }
        let choice = resolved.unwrap_or_else(|| {
            log::warn!("CosmicMeasurer: no family of \"{}\" is installed", font.family);
            FamilyChoice::Serif
        });
        self.families.put(font.family.clone(), choice.clone());
        choice
    }

    fn face_key(&mut self, font: &FontSpec) -> FaceKey {
        FaceKey {
            family: self.resolve_family(font),
            weight: font.weight,
            italic: font.italic,
            size: font.pixel_size().max(1.0).to_bits(),
        }
    }

    /// Vertical metrics of the face answering `font`.
    pub fn try_metrics(&mut self, font: &FontSpec) -> Result<FontMetrics, FontError> {
        let key = self.face_key(font);
        if let Some(m) = self.metrics.get(&key) {
            return Ok(*m);
        }

        let style = if key.italic { fontdb::Style::Italic } else { fontdb::Style::Normal };
        let families = [key.family.as_family()];
        let query = fontdb::Query {
            families: &families,
            weight: fontdb::Weight(key.weight),
            stretch: fontdb::Stretch::Normal,
            style,
        };
        let id = self
            .font_system
            .db()
            .query(&query)
            .or_else(|| {
                let fallback = fontdb::Query {
                    families: &[fontdb::Family::Serif],
                    ..query
                };
                self.font_system.db().query(&fallback)
            })
            .ok_or_else(|| FontError::NoMatch(font.family.clone()))?;
        let face = self
            .font_system
            .get_font(id)
            .ok_or_else(|| FontError::NoMatch(font.family.clone()))?;

        let px = f32::from_bits(key.size);
        let scaled = face.as_swash().metrics(&[]).scale(px);
        let x_height = if scaled.x_height > 0.0 { scaled.x_height } else { scaled.ascent * 0.5 };
        let metrics = FontMetrics {
            ascent: scaled.ascent,
            descent: scaled.descent.abs(),
            leading: scaled.leading,
            x_height,
        };
        self.metrics.put(key, metrics);
        Ok(metrics)
    }

    /// Shapes a single character, returning its advance and the cache key
    /// of its first glyph.
    fn shape_char(&mut self, key: &FaceKey, ch: char) -> Option<(f32, CacheKey)> {
        let px = f32::from_bits(key.size);
        let style = if key.italic { Style::Italic } else { Style::Normal };
        let attrs = Attrs::new()
            .family(key.family.as_family())
            .weight(Weight(key.weight))
            .style(style);

        let mut utf8 = [0u8; 4];
        let text: &str = ch.encode_utf8(&mut utf8);

        let mut buffer = Buffer::new(&mut self.font_system, Metrics::new(px, px));
        buffer.set_size(&mut self.font_system, None, None);
        buffer.set_text(&mut self.font_system, text, attrs, Shaping::Advanced);
        buffer.shape_until_scroll(&mut self.font_system, false);

        let run = buffer.layout_runs().next()?;
        let first = run.glyphs.first()?;
        let advance = run.glyphs.iter().map(|g| g.w).sum();
        Some((advance, first.physical((0.0, 0.0), 1.0).cache_key))
    }
}

impl TextMeasurer for CosmicMeasurer {
    fn metrics(&mut self, font: &FontSpec) -> FontMetrics {
        match self.try_metrics(font) {
            Ok(m) => m,
            Err(err) => {
                log::warn!("CosmicMeasurer: {}; using approximate metrics", err);
                FontMetrics::approximate(font.pixel_size())
            }
        }
    }

    fn advance(&mut self, font: &FontSpec, ch: char) -> f32 {
        let key = GlyphKey { face: self.face_key(font), ch };
        if let Some(a) = self.advances.get(&key) {
            return *a;
        }
        let advance = match self.shape_char(&key.face, ch) {
            Some((advance, _)) => advance,
            None => {
                log::debug!("CosmicMeasurer: no glyph for {:?}", ch);
                0.0
            }
        };
        self.advances.put(key, advance);
        advance
    }

    fn glyph_outline(&mut self, font: &FontSpec, ch: char) -> Option<BezPath> {
        if ch.is_whitespace() || ch.is_control() {
            return None;
        }
        let key = GlyphKey { face: self.face_key(font), ch };
        if let Some(path) = self.outlines.get(&key) {
            return path.clone();
        }
        let path = self.shape_char(&key.face, ch).and_then(|(_, cache_key)| {
            let commands = self
                .swash_cache
                .get_outline_commands(&mut self.font_system, cache_key)?;
            Some(commands_to_path(commands))
        });
        self.outlines.put(key, path.clone());
        path
    }
}

/// Converts swash outline commands (y up) into a y-down kurbo path.
fn commands_to_path(commands: &[Command]) -> BezPath {
    let p = |v: &swash::zeno::Vector| (v.x as f64, -(v.y as f64));
    let mut path = BezPath::new();
    for command in commands {
        match command {
            Command::MoveTo(v) => path.move_to(p(v)),
            Command::LineTo(v) => path.line_to(p(v)),
            Command::QuadTo(c, v) => path.quad_to(p(c), p(v)),
            Command::CurveTo(c1, c2, v) => path.curve_to(p(c1), p(c2), p(v)),
            Command::Close => path.close_path(),
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use kurbo::Shape;

    // Machines without system fonts cannot build a measurer; the tests
    // below then have nothing to check.
    fn measurer() -> Option<CosmicMeasurer> {
        CosmicMeasurer::new().ok()
    }

    #[test]
    fn test_empty_database_is_an_error() {
        let db = fontdb::Database::new();
        let fs = FontSystem::new_with_locale_and_db("en-US".into(), db);
        assert!(matches!(
            CosmicMeasurer::with_font_system(fs, 16),
            Err(FontError::NoFaces)
        ));
    }

    #[test]
    fn test_metrics_are_positive() {
        let Some(mut m) = measurer() else { return };
        let metrics = m.metrics(&FontSpec::new("serif", 32));
        assert!(metrics.ascent > 0.0);
        assert!(metrics.descent >= 0.0);
        assert!(metrics.x_height > 0.0);
    }

    #[test]
    fn test_advance_cached_and_scaled() {
        let Some(mut m) = measurer() else { return };
        let font = FontSpec::new("serif", 32);
        let a = m.advance(&font, 'M');
        assert_eq!(m.advance(&font, 'M'), a);
        let spaced = font.clone().with_letter_spacing(50);
        assert!((m.styled_advance(&spaced, 'M') - a * 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_larger_font_is_wider() {
        let Some(mut m) = measurer() else { return };
        let small = m.text_width(&FontSpec::new("serif", 12), "Draw a card");
        let large = m.text_width(&FontSpec::new("serif", 48), "Draw a card");
        assert!(large > small);
    }

    #[test]
    fn test_outline_sits_above_baseline() {
        let Some(mut m) = measurer() else { return };
        let font = FontSpec::new("serif", 48);
        if let Some(path) = m.glyph_outline(&font, 'H') {
            let bbox = path.bounding_box();
            assert!(bbox.y0 < 0.0);
            assert!(bbox.y1 <= 1.0);
        }
        assert!(m.glyph_outline(&font, ' ').is_none());
    }

    #[test]
    fn test_unknown_family_falls_back() {
        let Some(mut m) = measurer() else { return };
        let font = FontSpec::new("NoSuchFamily, serif", 20);
        assert!(m.text_width(&font, "abc") > 0.0);
    }
}
