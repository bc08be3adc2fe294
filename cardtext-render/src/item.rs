//! A self-fitting, cached block of card text.
//!
//! [`TextItem`] owns a document, its flow layout and a render cache. Text
//! goes in as markup, the item lays it out at the width of its target
//! rectangle, shrinks it until it fits and centers it vertically in the
//! target. [`TextItem::paint`] hands out a cached bitmap of the result.

use std::time::Instant;

use cardtext_core::document::{
    Alignment, CharFormat, ContentChange, Document, LineHeight, ObjectPayload, WrapMode,
};
use cardtext_core::font::FontSpec;
use cardtext_core::geometry::{Color, Pen, Point, Rect, Size};
use cardtext_core::markup::{insert_markup, InsertContext, SymbolTable};
use cardtext_layout::{
    block_margin, fit, FitConfig, FitOutcome, FitPolicy, FitRequest, FlowLayout, LayoutContext, LayoutResult, ObjectRegistry,
    SymbolAssets,
};
use cardtext_text::TextMeasurer;
use image::RgbaImage;

use crate::cache::{CacheStats, RenderCache};

pub const DEFAULT_MINIMUM_POINT_SIZE: i32 = 9;
pub const DEFAULT_POINT_SIZE: i32 = 32;
pub const DEFAULT_BLOCK_MARGIN: f32 = 20.0;
/// Proportional line height, in percent.
pub const DEFAULT_LINE_HEIGHT: i32 = 90;
pub const DEFAULT_COST_FAMILY: &str = "Georgia";

pub struct TextItem {
    document: Document,
    layout: FlowLayout,
    measurer: Box<dyn TextMeasurer>,
    objects: ObjectRegistry,
    symbols: SymbolTable,
    insert: InsertContext,
    cache: RenderCache,

    text: String,
    paragraphs: Vec<String>,
    base_font: FontSpec,
    target: Option<Rect>,
    policy: FitPolicy,
    fit_config: FitConfig,
    minimum_point_size: i32,
    calculated_point_size: i32,
    outline: Option<Pen>,
    show_outline: bool,
    position: Point,
}

impl TextItem {
    pub fn new(measurer: Box<dyn TextMeasurer>, assets: SymbolAssets) -> Self {
        let mut document = Document::new();
        document.wrap_mode = WrapMode::WordWrap;
        document.default_font = FontSpec {
            point_size: DEFAULT_POINT_SIZE,
            ..FontSpec::default()
        };
        document.set_block_margins(DEFAULT_BLOCK_MARGIN, DEFAULT_BLOCK_MARGIN);
        document.update_block_formats(|f| f.line_height = LineHeight::Proportional(DEFAULT_LINE_HEIGHT));

        let mut item = Self {
            base_font: document.default_font.clone(),
            document,
            layout: FlowLayout::new(),
            measurer,
            objects: ObjectRegistry::with_defaults(assets),
            symbols: SymbolTable::default(),
            insert: InsertContext {
                format: CharFormat::default(),
                outline: None,
                cost_family: Some(DEFAULT_COST_FAMILY.to_string()),
            },
            cache: RenderCache::new(),
            text: String::new(),
            paragraphs: Vec::new(),
            target: None,
            policy: FitPolicy::default(),
            fit_config: FitConfig::default(),
            minimum_point_size: DEFAULT_MINIMUM_POINT_SIZE,
            calculated_point_size: DEFAULT_POINT_SIZE,
            outline: None,
            show_outline: false,
            position: Point::default(),
        };
        let change = ContentChange::full(&item.document);
        item.relayout(change);
        item
    }

    // ── Layout plumbing ──

    fn relayout(&mut self, change: ContentChange) -> LayoutResult {
        let mut ctx = LayoutContext::new(&self.document, self.measurer.as_mut(), &self.objects);
        self.layout.document_changed(&mut ctx, change)
    }

    fn finish_layout(&mut self) -> Size {
        let mut ctx = LayoutContext::new(&self.document, self.measurer.as_mut(), &self.objects);
        self.layout.document_size(&mut ctx)
    }

    fn recenter(&mut self, size: Size) {
        if let Some(target) = self.target {
            self.position.y = target.y + target.height / 2.0 - size.height / 2.0;
        }
    }

    /// Marks the cache dirty at `size` and re-centers.
    fn refresh(&mut self, size: Size) {
        self.cache.invalidate(size);
        self.recenter(size);
    }

    fn overflows(&self, size: Size) -> bool {
        self.target
            .filter(Rect::is_valid)
            .is_some_and(|t| size.width > t.width || size.height > t.height)
    }

    // ── Text ──

    /// Replaces the content with parsed `text` and refits.
    pub fn set_text(&mut self, text: &str) {
        self.clear();
        self.text = text.to_string();
        insert_markup(&mut self.document, text, &self.symbols, &self.insert);
        let change = ContentChange::full(&self.document);
        self.relayout(change);
        if self.target.is_some_and(|t| t.is_valid()) {
            self.fit_to_rect();
        } else {
            self.check_update(true);
        }
    }

    pub fn set_plain_text(&mut self, text: &str) {
        self.set_text(text);
    }

    /// The markup last passed to [`TextItem::set_text`].
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Appends `text` as a new paragraph. The first paragraph goes into the
    /// existing empty block. Layout is incremental and no refit happens;
    /// call [`TextItem::check_update`] once all paragraphs are in.
    pub fn insert_text_block(&mut self, text: &str) {
        self.paragraphs.push(text.to_string());
        if self.paragraphs.len() > 1 {
            let change = self.document.push_block();
            self.relayout(change);
        }
        let change = insert_markup(&mut self.document, text, &self.symbols, &self.insert);
        self.relayout(change);
        let size = self.bounding_rect().size();
        self.cache.invalidate(size);
    }

    pub fn paragraphs(&self) -> &[String] {
        &self.paragraphs
    }

    pub fn clear(&mut self) {
        self.paragraphs.clear();
        let change = self.document.clear();
        self.relayout(change);
        let size = self.bounding_rect().size();
        self.cache.invalidate(size);
    }

    pub fn add_replacement(&mut self, word: &str, asset: &str) {
        self.symbols.add_replacement(word, asset);
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    // ── Fitting ──

    /// Lays the text out at the target width and moves the item to the
    /// target's top-left. A new target size refits; a moved target only
    /// re-centers.
    pub fn set_target_rect(&mut self, rect: Rect) {
        self.document.text_width = (rect.width > 0.0).then_some(rect.width);
        self.position = Point::new(rect.x, rect.y);
        let resized = self.target.map_or(true, |t| t.size() != rect.size());
        self.target = Some(rect);
        if resized {
            self.fit_to_rect();
        } else {
            let size = self.bounding_rect().size();
            self.recenter(size);
        }
    }

    pub fn target_rect(&self) -> Option<Rect> {
        self.target
    }

    pub fn set_fit_policy(&mut self, policy: FitPolicy) {
        if self.policy != policy {
            self.policy = policy;
            self.fit_to_rect();
        }
    }

    pub fn fit_policy(&self) -> FitPolicy {
        self.policy
    }

    pub fn set_fit_config(&mut self, config: FitConfig) {
        self.fit_config = config;
    }

    /// A minimum above the current fitted size forces a refit.
    pub fn set_minimum_point_size(&mut self, size: i32) {
        let raise = size > self.calculated_point_size;
        self.minimum_point_size = size;
        if raise {
            self.fit_to_rect();
        }
    }

    pub fn minimum_point_size(&self) -> i32 {
        self.minimum_point_size
    }

    pub fn calculated_point_size(&self) -> i32 {
        self.calculated_point_size
    }

    /// Resets to the base font and shrinks until the text fits the target.
    pub fn fit_to_rect(&mut self) -> FitOutcome {
        let request = FitRequest {
            base_font: self.base_font.clone(),
            target: self.target.unwrap_or_default(),
            policy: self.policy,
            minimum_point_size: self.minimum_point_size,
            previous_point_size: self.calculated_point_size,
            config: self.fit_config,
        };
        let outcome = fit::fit_to_rect(
            &mut self.document,
            &mut self.layout,
            self.measurer.as_mut(),
            &self.objects,
            &request,
        );
        self.calculated_point_size = outcome.state.point_size;
        self.refresh(outcome.size);
        outcome
    }

    /// Refits when the text overflows the target (and `allow_fitting` is
    /// set); otherwise only refreshes the cache and vertical position.
    pub fn check_update(&mut self, allow_fitting: bool) {
        let size = self.finish_layout();
        if allow_fitting && self.overflows(size) {
            self.fit_to_rect();
        } else {
            self.refresh(size);
        }
    }

    // ── Fonts and styling ──

    /// Sets the base font. Block margins become half the point size.
    pub fn set_font(&mut self, font: FontSpec) {
        let margin = block_margin(font.point_size);
        self.document.set_block_margins(margin, margin);
        self.calculated_point_size = font.point_size;
        self.base_font = font.clone();
        let change = self.document.set_default_font(font);
        self.relayout(change);
        self.check_update(true);
    }

    pub fn set_font_family(&mut self, family: &str) {
        let font = FontSpec {
            family: family.to_string(),
            ..self.base_font.clone()
        };
        self.set_font(font);
    }

    pub fn base_font(&self) -> &FontSpec {
        &self.base_font
    }

    /// Family of cost numerals, for new and existing symbols.
    pub fn set_cost_font(&mut self, family: &str) {
        self.insert.cost_family = Some(family.to_string());
        let change = self.document.for_each_placeholder_mut(|p| {
            if let ObjectPayload::Symbol { overlay_family, .. } = &mut p.payload {
                *overlay_family = Some(family.to_string());
            }
        });
        self.relayout(change);
        let size = self.bounding_rect().size();
        self.cache.invalidate(size);
    }

    /// Pen for the outline pass. Symbols inserted afterwards reserve room
    /// for its width.
    pub fn set_outline_pen(&mut self, pen: Option<Pen>) {
        self.outline = pen;
        self.insert.outline = pen;
        let size = self.bounding_rect().size();
        self.cache.invalidate(size);
    }

    pub fn show_outline(&mut self, show: bool) {
        self.show_outline = show;
        let size = self.bounding_rect().size();
        self.cache.invalidate(size);
    }

    pub fn set_text_color(&mut self, color: Color) {
        self.document.text_color = color;
        let size = self.bounding_rect().size();
        self.cache.invalidate(size);
    }

    pub fn set_alignment(&mut self, alignment: Alignment) {
        let change = self.document.update_block_formats(|f| f.alignment = alignment);
        self.relayout(change);
        let size = self.bounding_rect().size();
        self.cache.invalidate(size);
    }

    // ── Geometry and painting ──

    /// Item-local bounds of the laid-out text so far.
    pub fn bounding_rect(&self) -> Rect {
        let size = self.layout.dynamic_document_size(&self.document);
        Rect::new(0.0, 0.0, size.width, size.height)
    }

    /// Top-left of the item in card coordinates.
    pub fn position(&self) -> Point {
        self.position
    }

    /// Advances lazy layout once its timer is due.
    pub fn poll(&mut self, now: Instant) -> LayoutResult {
        let mut ctx = LayoutContext::new(&self.document, self.measurer.as_mut(), &self.objects);
        let result = self.layout.poll(&mut ctx, now);
        if let Some(size) = result.size_changed {
            self.refresh(size);
        }
        result
    }

    pub fn is_layout_pending(&self) -> bool {
        self.layout.is_layout_pending()
    }

    /// Bitmap of the text, sized to [`TextItem::bounding_rect`].
    pub fn paint(&mut self) -> &RgbaImage {
        let size = self.finish_layout();
        if !self.cache.fits(size) {
            self.cache.invalidate(size);
        }
        let outline = self.outline.filter(|_| self.show_outline);
        let mut ctx = LayoutContext::new(&self.document, self.measurer.as_mut(), &self.objects);
        self.cache.paint(&mut self.layout, &mut ctx, outline)
    }

    pub fn is_dirty(&self) -> bool {
        self.cache.is_dirty()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn layout(&self) -> &FlowLayout {
        &self.layout
    }

    /// Gives the measurer back, keeping its caches for the next item.
    pub fn into_measurer(self) -> Box<dyn TextMeasurer> {
        self.measurer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardtext_core::document::{ObjectKind, Run};
    use cardtext_text::TableMeasurer;

    const ABILITY: &str = "[Enter] Produce [w][w]. Other light units you control gain two power. \
                           As long as four or more cards are revealed, they gain four power instead.";

    fn item() -> TextItem {
        TextItem::new(Box::new(TableMeasurer::new()), SymbolAssets::new())
    }

    #[test]
    fn test_defaults() {
        let item = item();
        assert_eq!(item.minimum_point_size(), 9);
        assert_eq!(item.calculated_point_size(), 32);
        assert_eq!(item.fit_policy(), FitPolicy::SpacingStretchSize);
        let doc = item.document();
        assert_eq!(doc.wrap_mode, WrapMode::WordWrap);
        assert_eq!(doc.block_format.top_margin, 20.0);
        assert_eq!(doc.block_format.bottom_margin, 20.0);
        assert_eq!(doc.block_format.line_height, LineHeight::Proportional(90));
        assert!(doc.blocks().all(|b| b.format.top_margin == 20.0));
    }

    #[test]
    fn test_set_text_parses_markup() {
        let mut item = item();
        item.set_text("[w][w]. Draw a card.");
        assert_eq!(item.text(), "[w][w]. Draw a card.");
        let block = item.document().blocks().next().unwrap();
        let kinds: Vec<_> = block
            .runs
            .iter()
            .map(|r| match r {
                Run::Object(p) => Some(p.kind()),
                Run::Text(_) => None,
            })
            .collect();
        assert_eq!(kinds, vec![Some(ObjectKind::Symbol), Some(ObjectKind::Symbol), None]);
        assert!(item.bounding_rect().height > 0.0);
    }

    #[test]
    fn test_target_rect_fits_and_centers() {
        let mut item = item();
        item.set_target_rect(Rect::new(50.0, 100.0, 500.0, 200.0));
        item.set_text(ABILITY);
        let size = item.bounding_rect().size();
        assert!(
            (size.width <= 500.0 && size.height <= 200.0) || item.calculated_point_size() == item.minimum_point_size()
        );
        assert!(item.calculated_point_size() < 32);
        let pos = item.position();
        assert_eq!(pos.x, 50.0);
        assert!((pos.y - (200.0 - size.height / 2.0)).abs() < 1e-3);
        assert_eq!(item.document().default_font.point_size, item.calculated_point_size());
        let margin = (item.calculated_point_size() / 2) as f32;
        assert_eq!(item.document().block_format.top_margin, margin);
    }

    #[test]
    fn test_moved_target_only_recenters() {
        let mut item = item();
        item.set_target_rect(Rect::new(0.0, 0.0, 500.0, 200.0));
        item.set_text(ABILITY);
        let fitted = item.calculated_point_size();
        let y = item.position().y;
        item.set_target_rect(Rect::new(10.0, 300.0, 500.0, 200.0));
        assert_eq!(item.calculated_point_size(), fitted);
        assert_eq!(item.position().x, 10.0);
        assert!((item.position().y - (y + 300.0)).abs() < 1e-3);
    }

    #[test]
    fn test_minimum_above_fitted_size_refits() {
        let mut item = item();
        item.set_target_rect(Rect::new(0.0, 0.0, 200.0, 40.0));
        item.set_text(ABILITY);
        assert_eq!(item.calculated_point_size(), 9);
        item.set_minimum_point_size(14);
        assert_eq!(item.calculated_point_size(), 14);
        item.set_minimum_point_size(10);
        assert_eq!(item.calculated_point_size(), 14);
    }

    #[test]
    fn test_policy_change_refits() {
        let mut item = item();
        item.set_target_rect(Rect::new(0.0, 0.0, 500.0, 200.0));
        item.set_text(ABILITY);
        let spacing_first = item.document().default_font.clone();
        assert!(spacing_first.letter_spacing <= 90);
        item.set_fit_policy(FitPolicy::SizeSpacingStretch);
        let size_first = item.document().default_font.clone();
        assert_eq!(size_first.letter_spacing, 100);
        assert!(size_first.point_size < 32);
    }

    #[test]
    fn test_insert_text_block_appends_paragraphs() {
        let mut item = item();
        item.insert_text_block("[Judgement][3]");
        assert_eq!(item.document().block_count(), 1);
        item.insert_text_block("Draw a card.");
        item.insert_text_block("[Energize!][u]");
        assert_eq!(item.document().block_count(), 3);
        assert_eq!(item.paragraphs().len(), 3);
        assert!(item.is_dirty());
        item.check_update(true);
        assert!(item.bounding_rect().height > 100.0);
    }

    #[test]
    fn test_cost_font_reaches_existing_numerals() {
        let mut item = item();
        item.set_text("[3] and [w]");
        let families = |item: &TextItem| -> Vec<Option<String>> {
            item.document()
                .blocks()
                .flat_map(|b| b.runs.iter())
                .filter_map(|r| match r {
                    Run::Object(p) => match &p.payload {
                        ObjectPayload::Symbol { overlay_family, .. } => Some(overlay_family.clone()),
                        ObjectPayload::Keyword { .. } => None,
                    },
                    Run::Text(_) => None,
                })
                .collect()
        };
        assert_eq!(families(&item)[0].as_deref(), Some("Georgia"));
        item.set_cost_font("Palatino");
        assert!(families(&item).iter().all(|f| f.as_deref() == Some("Palatino")));
    }

    #[test]
    fn test_set_font_sets_margins() {
        let mut item = item();
        item.set_font(FontSpec::new("serif", 36).with_letter_spacing(105));
        assert_eq!(item.document().block_format.top_margin, 18.0);
        assert_eq!(item.calculated_point_size(), 36);
        item.set_font_family("Georgia");
        assert_eq!(item.base_font().family, "Georgia");
        assert_eq!(item.base_font().letter_spacing, 105);
    }

    #[test]
    fn test_paint_is_cached() {
        let mut item = item();
        item.set_target_rect(Rect::new(0.0, 0.0, 400.0, 300.0));
        item.set_text("Draw a card.");
        let rect = item.bounding_rect();
        let (w, h) = item.paint().dimensions();
        assert_eq!((w, h), (rect.width.ceil() as u32, rect.height.ceil() as u32));
        item.paint();
        assert_eq!(item.cache_stats(), CacheStats { renders: 1, hits: 1 });
        item.set_text_color(Color::WHITE);
        assert!(item.is_dirty());
    }
}
