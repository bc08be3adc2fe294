//! Inline objects: pictorial items that occupy one document position and
//! are sized and painted by a registered handler.
//!
//! ```text
//!   Run::Object(InlinePlaceholder) ──kind()──► ObjectRegistry
//!                                                 ├── Keyword → KeywordBadge
//!                                                 └── Symbol  → SymbolIcon (SymbolAssets)
//! ```

pub mod keyword;
pub mod symbol;

use cardtext_core::document::{CharFormat, Document, InlinePlaceholder, ObjectKind, VerticalAlignment};
use cardtext_core::geometry::{Rect, Size};
use cardtext_core::paint::Painter;
use cardtext_text::TextMeasurer;
use rustc_hash::FxHashMap;

pub use keyword::KeywordBadge;
pub use symbol::{SymbolAssets, SymbolIcon};

/// Everything a handler may look at for one placeholder.
pub struct ObjectContext<'a> {
    pub document: &'a Document,
    /// Document position of the placeholder character.
    pub position: usize,
    pub placeholder: &'a InlinePlaceholder,
    /// Format in effect while sizing or painting. Differs from the stored
    /// placeholder format when the painter overrides outlines.
    pub format: &'a CharFormat,
}

pub trait InlineObject {
    fn intrinsic_size(&self, measurer: &mut dyn TextMeasurer, ctx: &ObjectContext<'_>) -> Size;

    fn draw(&self, painter: &mut dyn Painter, measurer: &mut dyn TextMeasurer, rect: Rect, ctx: &ObjectContext<'_>);
}

/// Vertical extent of an inline object around the baseline.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ObjectMetrics {
    pub width: f32,
    pub ascent: f32,
    pub descent: f32,
}

/// Handlers keyed by placeholder kind.
#[derive(Default)]
pub struct ObjectRegistry {
    handlers: FxHashMap<ObjectKind, Box<dyn InlineObject>>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the keyword badge and symbol icon handlers.
    pub fn with_defaults(assets: SymbolAssets) -> Self {
        let mut registry = Self::new();
        registry.register(ObjectKind::Keyword, Box::new(KeywordBadge));
        registry.register(ObjectKind::Symbol, Box::new(SymbolIcon::new(assets)));
        registry
    }

    /// Installs `handler` for `kind`, returning the handler it replaces.
    pub fn register(&mut self, kind: ObjectKind, handler: Box<dyn InlineObject>) -> Option<Box<dyn InlineObject>> {
        self.handlers.insert(kind, handler)
    }

    pub fn handler(&self, kind: ObjectKind) -> Option<&dyn InlineObject> {
        self.handlers.get(&kind).map(|h| h.as_ref())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Width and baseline split of a placeholder as it sits in a line.
    /// Unregistered kinds take no space.
    pub fn metrics(&self, measurer: &mut dyn TextMeasurer, ctx: &ObjectContext<'_>) -> ObjectMetrics {
        let Some(handler) = self.handler(ctx.placeholder.kind()) else {
            log::warn!("no inline object handler for {:?}", ctx.placeholder.kind());
            return ObjectMetrics::default();
        };
        let size = handler.intrinsic_size(measurer, ctx);
        match ctx.format.vertical_alignment {
            VerticalAlignment::Middle => {
                let font = ctx.format.resolve_font(&ctx.document.default_font);
                let fm = measurer.metrics(&font);
                let text_middle = fm.height() / 2.0 - fm.descent;
                ObjectMetrics {
                    width: size.width,
                    ascent: size.height / 2.0 + text_middle,
                    descent: size.height / 2.0 - text_middle,
                }
            }
            VerticalAlignment::Baseline => ObjectMetrics {
                width: size.width,
                ascent: size.height,
                descent: 0.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardtext_core::document::CharFormat;
    use cardtext_text::TableMeasurer;

    struct Square(f32);

    impl InlineObject for Square {
        fn intrinsic_size(&self, _m: &mut dyn TextMeasurer, _ctx: &ObjectContext<'_>) -> Size {
            Size::new(self.0, self.0)
        }

        fn draw(&self, painter: &mut dyn Painter, _m: &mut dyn TextMeasurer, rect: Rect, _ctx: &ObjectContext<'_>) {
            painter.fill_rect(rect, cardtext_core::geometry::Color::BLACK);
        }
    }

    #[test]
    fn test_register_replaces_handler() {
        let mut registry = ObjectRegistry::new();
        assert!(registry.register(ObjectKind::Keyword, Box::new(Square(10.0))).is_none());
        assert!(registry.register(ObjectKind::Keyword, Box::new(Square(20.0))).is_some());
        assert_eq!(registry.len(), 1);
        assert!(registry.handler(ObjectKind::Symbol).is_none());
    }

    #[test]
    fn test_middle_alignment_splits_around_text_middle() {
        let mut registry = ObjectRegistry::new();
        registry.register(ObjectKind::Keyword, Box::new(Square(40.0)));
        let doc = Document::new();
        let placeholder = InlinePlaceholder::keyword("Kw", false, CharFormat::default());
        let ctx = ObjectContext {
            document: &doc,
            position: 0,
            placeholder: &placeholder,
            format: &placeholder.format,
        };
        let mut m = TableMeasurer::new();
        let fm = m.metrics(&doc.default_font);
        let metrics = registry.metrics(&mut m, &ctx);
        let text_middle = fm.height() / 2.0 - fm.descent;
        assert_eq!(metrics.width, 40.0);
        assert!((metrics.ascent - (20.0 + text_middle)).abs() < 1e-4);
        assert!((metrics.ascent + metrics.descent - 40.0).abs() < 1e-4);
    }

    #[test]
    fn test_baseline_alignment_and_missing_handler() {
        let mut registry = ObjectRegistry::new();
        registry.register(ObjectKind::Symbol, Box::new(Square(12.0)));
        let doc = Document::new();
        let mut placeholder = InlinePlaceholder::symbol("attribute-fire", None, None, None, CharFormat::default());
        placeholder.format.vertical_alignment = VerticalAlignment::Baseline;
        let ctx = ObjectContext {
            document: &doc,
            position: 0,
            placeholder: &placeholder,
            format: &placeholder.format,
        };
        let mut m = TableMeasurer::new();
        assert_eq!(
            registry.metrics(&mut m, &ctx),
            ObjectMetrics { width: 12.0, ascent: 12.0, descent: 0.0 }
        );
        let keyword = InlinePlaceholder::keyword("Kw", false, CharFormat::default());
        let ctx = ObjectContext { placeholder: &keyword, format: &keyword.format, ..ctx };
        assert_eq!(registry.metrics(&mut m, &ctx), ObjectMetrics::default());
    }
}
