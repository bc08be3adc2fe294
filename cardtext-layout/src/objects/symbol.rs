//! Symbol icon: a square pictogram, optionally carrying a cost numeral.

use std::sync::Arc;

use cardtext_core::document::ObjectPayload;
use cardtext_core::font::WEIGHT_DEMI_BOLD;
use cardtext_core::geometry::{Pen, Rect, Size};
use cardtext_core::paint::{Brush, Painter};
use cardtext_text::TextMeasurer;
use image::RgbaImage;
use kurbo::{Affine, Shape, Vec2};
use rustc_hash::FxHashMap;

use super::{InlineObject, ObjectContext};

/// Numerals are drawn this many points above the document size before
/// being squeezed to the icon.
const NUMERAL_SIZE_BOOST: i32 = 6;
/// Share of the icon height the numeral occupies.
const NUMERAL_HEIGHT_RATIO: f64 = 0.75;

/// Decoded symbol bitmaps keyed by asset name (e.g. `attribute-fire`).
#[derive(Clone, Debug, Default)]
pub struct SymbolAssets {
    images: FxHashMap<String, Arc<RgbaImage>>,
}

impl SymbolAssets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, image: RgbaImage) {
        self.images.insert(name.into(), Arc::new(image));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RgbaImage>> {
        self.images.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.images.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }
}

pub struct SymbolIcon {
    assets: SymbolAssets,
}

impl SymbolIcon {
    pub fn new(assets: SymbolAssets) -> Self {
        Self { assets }
    }

    pub fn assets(&self) -> &SymbolAssets {
        &self.assets
    }
}

struct Payload<'a> {
    symbol: &'a str,
    overlay: Option<&'a str>,
    overlay_family: Option<&'a str>,
    outline_width: Option<f32>,
}

fn payload<'a>(ctx: &'a ObjectContext<'_>) -> Option<Payload<'a>> {
    match &ctx.placeholder.payload {
        ObjectPayload::Symbol {
            symbol,
            overlay,
            overlay_family,
            outline_width,
        } => Some(Payload {
            symbol,
            overlay: overlay.as_deref(),
            overlay_family: overlay_family.as_deref(),
            outline_width: *outline_width,
        }),
        ObjectPayload::Keyword { .. } => None,
    }
}

impl InlineObject for SymbolIcon {
    fn intrinsic_size(&self, measurer: &mut dyn TextMeasurer, ctx: &ObjectContext<'_>) -> Size {
        let fm = measurer.metrics(&ctx.document.default_font);
        let margin = fm.x_height / 4.0;
        let outline = payload(ctx).and_then(|p| p.outline_width).unwrap_or(0.0);
        let side = fm.height() + margin + outline;
        Size::new(side, side)
    }

    fn draw(&self, painter: &mut dyn Painter, measurer: &mut dyn TextMeasurer, rect: Rect, ctx: &ObjectContext<'_>) {
        let color = ctx.format.resolve_color(ctx.document.text_color);
        if color.is_transparent() {
            return;
        }
        let Some(payload) = payload(ctx) else {
            return;
        };
        let fm = measurer.metrics(&ctx.document.default_font);
        let margin = fm.x_height / 4.0;
        let outlined = payload.outline_width.is_some();
        let format_outline = ctx.format.outline.filter(Pen::is_visible).is_some();

        let mut dest = rect;
        let image = self.assets.get(payload.symbol);
        if image.is_none() {
            log::warn!("missing symbol asset {:?}", payload.symbol);
        }
        if format_outline && outlined {
            if let Some(image) = image {
                painter.draw_image(dest, image);
            }
        } else if !outlined {
            dest = rect.inset(margin / 2.0, margin / 2.0, margin / 2.0, margin / 2.0);
            if let Some(image) = image {
                painter.draw_image(dest, image);
            }
        }

        if format_outline && outlined {
            return;
        }
        let Some(text) = payload.overlay.filter(|t| !t.is_empty()) else {
            return;
        };
        let mut font = ctx.format.resolve_font(&ctx.document.default_font);
        if let Some(family) = payload.overlay_family {
            font.family = family.to_string();
        }
        font.point_size += NUMERAL_SIZE_BOOST;
        font.italic = true;
        font.weight = WEIGHT_DEMI_BOLD;
        font.letter_spacing = 100;
        font.stretch = 100;

        let path = measurer.text_outline(&font, text, (0.0, 0.0));
        let height = path.bounding_box().height();
        if height <= f64::EPSILON {
            return;
        }
        let scale = dest.height as f64 * NUMERAL_HEIGHT_RATIO / height;
        let scaled = Affine::scale_non_uniform(1.0, scale) * path;
        let cbox = scaled.control_box();
        let center = dest.to_kurbo().center();
        let offset = Vec2::new(center.x - cbox.center().x, center.y - cbox.center().y);
        let placed = Affine::translate(offset) * scaled;
        painter.fill_path(&placed, &Brush::Solid(color));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardtext_core::document::{CharFormat, Document, InlinePlaceholder};
    use cardtext_core::geometry::Color;
    use cardtext_core::paint::RecordingPainter;
    use cardtext_text::TableMeasurer;

    fn icon() -> SymbolIcon {
        let mut assets = SymbolAssets::new();
        assets.insert("attribute-fire", RgbaImage::new(8, 8));
        assets.insert("symbol-voidcost", RgbaImage::new(8, 8));
        SymbolIcon::new(assets)
    }

    fn draw(p: &InlinePlaceholder, format: &CharFormat) -> RecordingPainter {
        let doc = Document::new();
        let ctx = ObjectContext {
            document: &doc,
            position: 0,
            placeholder: p,
            format,
        };
        let mut m = TableMeasurer::new();
        let mut painter = RecordingPainter::new();
        icon().draw(&mut painter, &mut m, Rect::new(0.0, 0.0, 40.0, 40.0), &ctx);
        painter
    }

    #[test]
    fn test_size_includes_outline_width() {
        let doc = Document::new();
        let mut m = TableMeasurer::new();
        let plain = InlinePlaceholder::symbol("attribute-fire", None, None, None, CharFormat::default());
        let outlined = InlinePlaceholder::symbol("attribute-fire", None, None, Some(10.0), CharFormat::default());
        let size_of = |p: &InlinePlaceholder, m: &mut TableMeasurer| {
            let ctx = ObjectContext {
                document: &doc,
                position: 0,
                placeholder: p,
                format: &p.format,
            };
            icon().intrinsic_size(m, &ctx)
        };
        let a = size_of(&plain, &mut m);
        let b = size_of(&outlined, &mut m);
        let fm = m.metrics(&doc.default_font);
        assert!((a.width - (fm.height() + fm.x_height / 4.0)).abs() < 1e-4);
        assert_eq!(a.width, a.height);
        assert!((b.width - a.width - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_unoutlined_symbol_is_inset_and_numbered() {
        let p = InlinePlaceholder::symbol("symbol-voidcost", Some("3".into()), None, None, CharFormat::default());
        let painter = draw(&p, &p.format);
        let dest = painter.images().next().copied().unwrap();
        assert!(dest.x > 0.0 && dest.width < 40.0);
        let (bounds, _) = painter.fills().next().unwrap();
        // 75% of the inset icon height, centered
        assert!((bounds.height() - dest.height as f64 * 0.75).abs() < 1e-3);
        assert!((bounds.center().y - 20.0).abs() < 1e-3);
    }

    #[test]
    fn test_outlined_symbol_two_passes() {
        let p = InlinePlaceholder::symbol("symbol-voidcost", Some("3".into()), None, Some(10.0), CharFormat::default());
        let outline_pass = CharFormat {
            outline: Some(Pen::new(Color::BLACK, 10.0)),
            ..p.format.clone()
        };
        let painter = draw(&p, &outline_pass);
        assert_eq!(painter.image_count(), 1);
        assert_eq!(painter.images().next().copied(), Some(Rect::new(0.0, 0.0, 40.0, 40.0)));
        assert_eq!(painter.fills().count(), 0);

        let painter = draw(&p, &p.format);
        assert_eq!(painter.image_count(), 0);
        assert_eq!(painter.fills().count(), 1);
    }

    #[test]
    fn test_missing_asset_still_draws_numeral() {
        let p = InlinePlaceholder::symbol("symbol-unknown", Some("7".into()), None, None, CharFormat::default());
        let painter = draw(&p, &p.format);
        assert_eq!(painter.image_count(), 0);
        assert_eq!(painter.fills().count(), 1);
    }
}
