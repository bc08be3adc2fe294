//! Painting a laid-out document through a [`Painter`].
//!
//! ```text
//!  draw(clip) ─► ensure_layouted(clip.bottom)
//!      └── draw_frame(root)
//!            ├── decoration: background, border bars (split per page)
//!            └── draw_flow
//!                  ├── blocks → background, lines → text runs / objects
//!                  ├── frames → draw_frame (recursive)
//!                  └── object floats → handler
//! ```

use std::borrow::Cow;

use cardtext_core::document::{Alignment, Block, CharFormat, Direction, Document, FlowItem, Run};
use cardtext_core::fixed::Fixed;
use cardtext_core::geometry::{Color, Pen, Rect};
use cardtext_core::paint::{Brush, Painter};

use crate::block::{BlockLayout, LineLayout};
use crate::flow::{FlowLayout, FrameData, FrameRef, LayoutContext};
use crate::objects::ObjectContext;

/// How character outlines are treated during one paint pass.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum OutlineMode {
    /// Use the outline stored in each format.
    #[default]
    AsFormatted,
    /// Stroke every run and object with this pen.
    Apply(Pen),
    /// Ignore stored outlines.
    Clear,
}

impl OutlineMode {
    pub fn resolve<'f>(&self, format: &'f CharFormat) -> Cow<'f, CharFormat> {
        match self {
            OutlineMode::AsFormatted => Cow::Borrowed(format),
            OutlineMode::Apply(pen) => Cow::Owned(CharFormat {
                outline: Some(*pen),
                ..format.clone()
            }),
            OutlineMode::Clear if format.outline.is_some() => Cow::Owned(CharFormat {
                outline: None,
                ..format.clone()
            }),
            OutlineMode::Clear => Cow::Borrowed(format),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DrawOptions {
    /// Only content intersecting this rectangle is painted. Invalid clips
    /// are ignored.
    pub clip: Option<Rect>,
    pub outline: OutlineMode,
}

impl DrawOptions {
    fn clip(&self) -> Option<Rect> {
        self.clip.filter(Rect::is_valid)
    }
}

fn outside_clip(clip: Option<Rect>, rect: Rect) -> bool {
    clip.is_some_and(|c| rect.y > c.bottom() || rect.bottom() < c.y || rect.x > c.right() || rect.right() < c.x)
}

impl FlowLayout {
    /// Paints the document. Layout is completed as far as the clip reaches
    /// first; nothing is painted before the first layout.
    pub fn draw(&mut self, ctx: &mut LayoutContext<'_>, painter: &mut dyn Painter, options: &DrawOptions) {
        let doc = ctx.document;
        if self.frames.get(&doc.root_id).map_or(true, |d| d.size_dirty) {
            return;
        }
        match options.clip() {
            Some(clip) => self.ensure_layouted(ctx, Fixed::from_f32(clip.bottom())),
            None => self.ensure_layout_finished(ctx),
        }
        let root = FrameRef::root(doc);
        self.draw_frame(ctx, painter, options, (0.0, 0.0), &root);
    }

    fn draw_frame(
        &self,
        ctx: &mut LayoutContext<'_>,
        painter: &mut dyn Painter,
        options: &DrawOptions,
        offset: (f32, f32),
        frame: &FrameRef<'_>,
    ) {
        let Some(data) = self.frames.get(&frame.id) else {
            return;
        };
        if data.layout_dirty {
            return;
        }
        let rect = data.rect().translate(offset.0, offset.1);
        if outside_clip(options.clip(), rect) {
            return;
        }
        draw_decoration(ctx.document, painter, options, frame, data, rect);

        let start = match options.clip() {
            Some(clip) if frame.is_root() => self.root_item_for_y(frame, clip.y),
            _ => 0,
        };
        self.draw_flow(ctx, painter, options, (rect.x, rect.y), frame, start);
    }

    fn draw_flow(
        &self,
        ctx: &mut LayoutContext<'_>,
        painter: &mut dyn Painter,
        options: &DrawOptions,
        origin: (f32, f32),
        frame: &FrameRef<'_>,
        start_index: usize,
    ) {
        let doc = ctx.document;
        // stop at the end of the laid-out part and past the visible one
        let (laid_out_end, last_visible) = match (frame.is_root(), options.clip()) {
            (false, _) => (None, None),
            (true, clip) => {
                let visible = clip.and_then(|clip| {
                    let idx = self.checkpoints.partition_point(|cp| cp.y.to_f32() < clip.bottom());
                    self.checkpoints.get(idx).map(|cp| cp.position)
                });
                (self.checkpoints.last().map(|cp| cp.position), visible)
            }
        };

        let mut position = frame.item_start(start_index);
        for item in frame.items.iter().skip(start_index) {
            if laid_out_end.is_some_and(|end| position >= end) || last_visible.is_some_and(|end| position >= end) {
                break;
            }
            match item {
                FlowItem::Frame(child) => {
                    let child = FrameRef::child(child, position, frame.id);
                    self.draw_frame(ctx, painter, options, origin, &child);
                }
                FlowItem::Block(block) => {
                    self.draw_block(ctx, painter, options, origin, block, position, frame.is_root());
                }
            }
            position += item.len();
        }

        // floats standing for an inline object are painted by its handler
        let Some(data) = self.frames.get(&frame.id) else {
            return;
        };
        for child in frame.children() {
            if !data.floats.contains(&child.id) || !child.items.is_empty() {
                continue;
            }
            let Some(placeholder) = child.object else {
                continue;
            };
            let Some(handler) = ctx.objects.handler(placeholder.kind()) else {
                continue;
            };
            let Some(rect) = self.frame_bounding_rect_internal(child.id) else {
                continue;
            };
            let format = options.outline.resolve(&placeholder.format);
            let object = ObjectContext {
                document: doc,
                position: child.first_position.saturating_sub(1),
                placeholder,
                format: &format,
            };
            handler.draw(painter, ctx.measurer, rect, &object);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_block(
        &self,
        ctx: &mut LayoutContext<'_>,
        painter: &mut dyn Painter,
        options: &DrawOptions,
        origin: (f32, f32),
        block: &Block,
        block_position: usize,
        in_root: bool,
    ) {
        let doc = ctx.document;
        let Some(layout) = self.blocks.get(&block.id) else {
            return;
        };
        let bx = origin.0 + layout.position.x.to_f32();
        let by = origin.1 + layout.position.y.to_f32();
        let bounds = layout.bounding_rect().translate(bx, by);
        if let Some(clip) = options.clip() {
            if bounds.bottom() < clip.y || bounds.y > clip.bottom() {
                return;
            }
        }

        if let Some(background) = block.format.background {
            let mut area = bounds;
            if in_root && doc.text_width.is_none() {
                if let Some(root) = self.frames.get(&doc.root_id) {
                    area.width = (root.size.width - root.right_margin).to_f32() - area.x;
                }
            }
            painter.fill_rect(area, background);
        }

        for line in &layout.lines {
            draw_line(ctx, painter, options, (bx, by), block, block_position, layout, line);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn draw_line(
    ctx: &mut LayoutContext<'_>,
    painter: &mut dyn Painter,
    options: &DrawOptions,
    origin: (f32, f32),
    block: &Block,
    block_position: usize,
    layout: &BlockLayout,
    line: &LineLayout,
) {
    let doc = ctx.document;
    let slack = (line.width.to_f32() - line.natural_width).max(0.0);
    let rtl = block.format.direction == Direction::RightToLeft;
    let shift = match (block.format.alignment, rtl) {
        (Alignment::Center, _) => slack / 2.0,
        (Alignment::Right, false) | (Alignment::Left, true) => slack,
        _ => 0.0,
    };
    let x0 = origin.0 + line.x.to_f32() + shift;
    let baseline = origin.1 + line.baseline();

    for segment in layout.shaped.segments(line.start, line.end) {
        let Some(run) = block.runs.get(segment.run) else {
            continue;
        };
        let x = x0 + segment.x;
        match run {
            Run::Text(text) => {
                let format = options.outline.resolve(&text.format);
                let color = format.resolve_color(doc.text_color);
                let pen = format.visible_outline();
                if color.is_transparent() && pen.is_none() {
                    continue;
                }
                let font = format.resolve_font(&doc.default_font);
                let content = layout.shaped.text(segment.start, segment.end);
                let glyphs = ctx.measurer.text_outline(&font, &content, (x as f64, baseline as f64));
                if glyphs.elements().is_empty() {
                    continue;
                }
                if let Some(pen) = pen {
                    painter.stroke_path(&glyphs, &pen);
                }
                if !color.is_transparent() {
                    painter.fill_path(&glyphs, &Brush::Solid(color));
                }
            }
            Run::Object(placeholder) => {
                let Some(unit) = layout.shaped.units.get(segment.start) else {
                    continue;
                };
                let Some(handler) = ctx.objects.handler(placeholder.kind()) else {
                    continue;
                };
                let rect = Rect::new(x, baseline - unit.ascent, unit.advance, unit.ascent + unit.descent);
                let format = options.outline.resolve(&placeholder.format);
                let object = ObjectContext {
                    document: doc,
                    position: block_position + segment.start,
                    placeholder,
                    format: &format,
                };
                handler.draw(painter, ctx.measurer, rect, &object);
            }
        }
    }
}

// ── Frame decoration ──

fn draw_decoration(
    doc: &Document,
    painter: &mut dyn Painter,
    options: &DrawOptions,
    frame: &FrameRef<'_>,
    data: &FrameData,
    rect: Rect,
) {
    let border = data.border.to_f32();
    let (top, bottom) = (data.top_margin.to_f32(), data.bottom_margin.to_f32());
    let (left, right) = (data.left_margin.to_f32(), data.right_margin.to_f32());

    if let Some(background) = frame.format.background {
        let area = match options.clip() {
            Some(clip) if frame.is_root() => clip,
            _ => rect.inset(left + border, top + border, right + border, bottom + border),
        };
        painter.fill_rect(area, background);
    }

    if border > 0.0 {
        let width = rect.width - 2.0 * border - left - right;
        let height = rect.height - 2.0 * border - top - bottom;
        let outline = Rect::new(rect.x + left, rect.y + top, width + border, height + border);
        draw_border(
            painter,
            outline,
            (data.effective_top_margin.to_f32(), data.effective_bottom_margin.to_f32()),
            border,
            frame.format.border_color,
            doc.effective_page_height(),
        );
    }
}

/// Four bars around `rect`, whose right and bottom edges are the inner
/// edges of the right and bottom bars. On paged documents each page gets
/// its own box.
fn draw_border(
    painter: &mut dyn Painter,
    rect: Rect,
    page_margins: (f32, f32),
    border: f32,
    color: Color,
    page_height: Option<f32>,
) {
    let (first_page, last_page) = match page_height {
        Some(ph) => ((rect.y / ph).floor() as i32, ((rect.bottom() + border) / ph).floor() as i32),
        None => (0, 0),
    };
    for page in first_page..=last_page {
        let (mut top, mut bottom) = (rect.y, rect.bottom());
        if let Some(ph) = page_height.filter(|_| first_page != last_page) {
            top = top.max(page as f32 * ph + page_margins.0 - border);
            bottom = bottom.min((page + 1) as f32 * ph - page_margins.1);
            if bottom <= top {
                continue;
            }
        }
        let (left, right) = (rect.x, rect.right());
        painter.fill_rect(Rect::new(left, top, right - left + border, border), color);
        painter.fill_rect(Rect::new(left, bottom, right - left + border, border), color);
        painter.fill_rect(Rect::new(left, top, border, bottom - top + border), color);
        painter.fill_rect(Rect::new(right, top, border, bottom - top + border), color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardtext_core::document::{
        CharFormat, ContentChange, Frame, FrameFormat, FrameLength, FramePosition, InlinePlaceholder, ObjectKind,
    };
    use cardtext_core::geometry::Size;
    use cardtext_core::paint::RecordingPainter;
    use cardtext_text::{TableMeasurer, TextMeasurer};

    use crate::objects::{InlineObject, ObjectRegistry};

    /// Fills its rect in a color derived from the effective outline.
    struct Marker;

    impl InlineObject for Marker {
        fn intrinsic_size(&self, _m: &mut dyn TextMeasurer, _ctx: &ObjectContext<'_>) -> Size {
            Size::new(20.0, 20.0)
        }

        fn draw(&self, painter: &mut dyn Painter, _m: &mut dyn TextMeasurer, rect: Rect, ctx: &ObjectContext<'_>) {
            let color = if ctx.format.outline.is_some() { Color::rgb(255, 0, 0) } else { Color::rgb(0, 0, 255) };
            painter.fill_rect(rect, color);
        }
    }

    fn registry() -> ObjectRegistry {
        let mut registry = ObjectRegistry::new();
        registry.register(ObjectKind::Keyword, Box::new(Marker));
        registry.register(ObjectKind::Symbol, Box::new(Marker));
        registry
    }

    fn doc_with(paragraphs: &[&str]) -> Document {
        let mut doc = Document::new();
        doc.text_width = Some(300.0);
        for (i, text) in paragraphs.iter().enumerate() {
            if i > 0 {
                doc.push_block();
            }
            doc.append_run(Run::text(*text, CharFormat::default()));
        }
        doc
    }

    fn paint(doc: &Document, options: &DrawOptions) -> RecordingPainter {
        let (mut layout, mut m, objects) = (FlowLayout::new(), TableMeasurer::new(), registry());
        let mut ctx = LayoutContext::new(doc, &mut m, &objects);
        layout.document_changed(&mut ctx, ContentChange::full(doc));
        let mut painter = RecordingPainter::new();
        layout.draw(&mut ctx, &mut painter, options);
        painter
    }

    #[test]
    fn test_nothing_drawn_before_layout() {
        let doc = doc_with(&["Draw a card."]);
        let (mut layout, mut m, objects) = (FlowLayout::new(), TableMeasurer::new(), registry());
        let mut ctx = LayoutContext::new(&doc, &mut m, &objects);
        let mut painter = RecordingPainter::new();
        layout.draw(&mut ctx, &mut painter, &DrawOptions::default());
        assert!(painter.is_empty());
    }

    #[test]
    fn test_text_is_filled_in_text_color() {
        let doc = doc_with(&["Draw a card."]);
        let painter = paint(&doc, &DrawOptions::default());
        assert!(painter.fills().count() >= 1);
        assert!(painter.fills().all(|(_, brush)| *brush == Brush::Solid(Color::BLACK)));
        assert_eq!(painter.strokes().count(), 0);
    }

    #[test]
    fn test_outline_modes() {
        let mut doc = Document::new();
        doc.text_width = Some(300.0);
        let outlined = CharFormat {
            outline: Some(Pen::new(Color::WHITE, 6.0)),
            ..CharFormat::default()
        };
        doc.append_run(Run::text("Draw", outlined));

        let painter = paint(&doc, &DrawOptions::default());
        assert_eq!(painter.strokes().count(), 1);
        // stroke goes under the fill
        assert!(matches!(painter.commands.first(), Some(cardtext_core::paint::PaintCommand::Stroke { .. })));

        let cleared = DrawOptions {
            outline: OutlineMode::Clear,
            ..DrawOptions::default()
        };
        assert_eq!(paint(&doc, &cleared).strokes().count(), 0);

        let applied = DrawOptions {
            outline: OutlineMode::Apply(Pen::new(Color::BLACK, 12.0)),
            ..DrawOptions::default()
        };
        let painter = paint(&doc, &applied);
        let pens: Vec<f32> = painter.strokes().map(|(_, pen)| pen.width).collect();
        assert_eq!(pens, vec![12.0]);
    }

    #[test]
    fn test_transparent_text_draws_only_outline() {
        let mut doc = Document::new();
        doc.text_width = Some(300.0);
        doc.text_color = Color::TRANSPARENT;
        doc.append_run(Run::text("Draw", CharFormat::default()));
        assert!(paint(&doc, &DrawOptions::default()).is_empty());

        let applied = DrawOptions {
            outline: OutlineMode::Apply(Pen::new(Color::BLACK, 12.0)),
            ..DrawOptions::default()
        };
        let painter = paint(&doc, &applied);
        assert_eq!(painter.strokes().count(), 1);
        assert_eq!(painter.fills().count(), 0);
    }

    #[test]
    fn test_clip_culls_blocks_below() {
        let paragraphs: Vec<String> = (0..20).map(|i| format!("paragraph {i}")).collect();
        let refs: Vec<&str> = paragraphs.iter().map(String::as_str).collect();
        let doc = doc_with(&refs);
        let all = paint(&doc, &DrawOptions::default()).fills().count();
        let clipped = DrawOptions {
            clip: Some(Rect::new(0.0, 0.0, 300.0, 40.0)),
            ..DrawOptions::default()
        };
        let painter = paint(&doc, &clipped);
        let some = painter.fills().count();
        assert!(some > 0 && some < all, "{some} of {all}");
        assert!(painter.fills().all(|(bounds, _)| bounds.y0 < 40.0 + 1.0));
    }

    #[test]
    fn test_center_alignment_shifts_glyphs() {
        let left = doc_with(&["Hi"]);
        let mut center = doc_with(&["Hi"]);
        center.update_block_formats(|f| f.alignment = Alignment::Center);
        let x_of = |doc: &Document| {
            let painter = paint(doc, &DrawOptions::default());
            painter.fills().map(|(b, _)| b.x0).fold(f64::INFINITY, f64::min)
        };
        let (a, b) = (x_of(&left), x_of(&center));
        assert!(b > a + 50.0, "{a} vs {b}");
    }

    #[test]
    fn test_root_background_and_border() {
        let mut doc = doc_with(&[""]);
        doc.root_format.background = Some(Color::WHITE);
        doc.root_format.border = 2.0;
        doc.root_format.border_color = Color::rgb(10, 20, 30);
        let painter = paint(&doc, &DrawOptions::default());
        let fills: Vec<_> = painter.fills().collect();
        assert_eq!(*fills[0].1, Brush::Solid(Color::WHITE));
        let bars = fills.iter().filter(|(_, b)| **b == Brush::Solid(Color::rgb(10, 20, 30))).count();
        assert_eq!(bars, 4);
    }

    #[test]
    fn test_inline_objects_and_object_floats() {
        let mut doc = doc_with(&["cost "]);
        doc.append_run(Run::Object(InlinePlaceholder::keyword("Big", false, CharFormat::default())));
        let float = Frame::new(FrameFormat {
            position: FramePosition::FloatRight,
            width: FrameLength::Fixed(40.0),
            height: FrameLength::Fixed(40.0),
            ..FrameFormat::default()
        })
        .with_object(InlinePlaceholder::symbol("attribute-fire", None, None, None, CharFormat::default()));
        doc.insert_frame(0, float);

        let blue = Brush::Solid(Color::rgb(0, 0, 255));
        let painter = paint(&doc, &DrawOptions::default());
        let markers: Vec<_> = painter.fills().filter(|(_, b)| **b == blue).map(|(r, _)| *r).collect();
        assert_eq!(markers.len(), 2);
        assert!(markers.iter().any(|r| (r.width() - 40.0).abs() < 1e-3 && (r.x1 - 296.0).abs() < 1e-3));
        assert!(markers.iter().any(|r| (r.width() - 20.0).abs() < 1e-3));

        let applied = DrawOptions {
            outline: OutlineMode::Apply(Pen::new(Color::BLACK, 4.0)),
            ..DrawOptions::default()
        };
        let red = Brush::Solid(Color::rgb(255, 0, 0));
        assert_eq!(paint(&doc, &applied).fills().filter(|(_, b)| **b == red).count(), 2);
    }
}
