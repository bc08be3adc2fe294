//! Keyword badge: a pill-shaped label drawn in place of `[Keyword]` tokens.

use cardtext_core::document::ObjectPayload;
use cardtext_core::font::{FontSpec, WEIGHT_BOLD};
use cardtext_core::geometry::{Color, Pen, Rect, Size};
use cardtext_core::paint::{Brush, GradientStop, LinearGradient, Painter};
use cardtext_text::TextMeasurer;
use kurbo::BezPath;

use super::{InlineObject, ObjectContext};

/// Gradient badges are never narrower than this.
pub const GRADIENT_MIN_WIDTH: f32 = 300.0;
/// Plain badges use a smaller label than the running text.
const SIZE_REDUCTION: i32 = 4;
const BORDER_WIDTH: f32 = 4.0;
const LABEL_SPACING_DELTA: i32 = 5;

const GOLD_DARK: Color = Color::rgb(212, 182, 50);
const GOLD_LIGHT: Color = Color::rgb(254, 231, 151);
const GRADIENT_BORDER: Color = Color::rgb(255, 255, 215);

#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordBadge;

struct Label<'a> {
    text: &'a str,
    gradient: bool,
}

fn label<'a>(ctx: &'a ObjectContext<'_>) -> Label<'a> {
    match &ctx.placeholder.payload {
        ObjectPayload::Keyword { label, gradient } => Label {
            text: label,
            gradient: *gradient,
        },
        ObjectPayload::Symbol { .. } => Label {
            text: "",
            gradient: false,
        },
    }
}

fn badge_font(ctx: &ObjectContext<'_>, gradient: bool) -> FontSpec {
    let mut font = ctx.format.resolve_font(&ctx.document.default_font);
    if !gradient {
        font.point_size -= SIZE_REDUCTION;
    }
    font
}

impl InlineObject for KeywordBadge {
    fn intrinsic_size(&self, measurer: &mut dyn TextMeasurer, ctx: &ObjectContext<'_>) -> Size {
        let label = label(ctx);
        let font = badge_font(ctx, label.gradient);
        let fm = measurer.metrics(&font);
        let mut width = measurer.text_width(&font, label.text) + fm.height();
        if label.gradient {
            width = width.max(GRADIENT_MIN_WIDTH);
        }
        Size::new(width, fm.height() + fm.x_height / 2.0)
    }

    fn draw(&self, painter: &mut dyn Painter, measurer: &mut dyn TextMeasurer, rect: Rect, ctx: &ObjectContext<'_>) {
        let color = ctx.format.resolve_color(ctx.document.text_color);
        if color.is_transparent() {
            return;
        }
        let label = label(ctx);
        let font = badge_font(ctx, label.gradient);
        let fm = measurer.metrics(&font);
        let text_width = measurer.text_width(&font, label.text);
        let margin_x = (fm.height() / 2.0) as f64;

        let bounds = Rect::new(
            rect.x + (rect.width - text_width) / 2.0,
            rect.y + (rect.height - fm.height()) / 2.0,
            text_width,
            fm.height(),
        );

        let (brush, border) = if label.gradient {
            let gradient = LinearGradient {
                start: (rect.x as f64, bounds.y as f64),
                end: (rect.x as f64, bounds.bottom() as f64),
                stops: vec![
                    GradientStop::new(0.0, GOLD_DARK),
                    GradientStop::new(0.4, GOLD_LIGHT),
                    GradientStop::new(0.6, GOLD_LIGHT),
                    GradientStop::new(1.0, GOLD_DARK),
                ],
            };
            (Brush::LinearGradient(gradient), Pen::new(GRADIENT_BORDER, BORDER_WIDTH))
        } else {
            (Brush::Solid(Color::WHITE), Pen::new(Color::BLACK, BORDER_WIDTH))
        };

        let natural_width = text_width + fm.height();
        let path = if label.gradient && natural_width < GRADIENT_MIN_WIDTH {
            pill_in_rect(rect, bounds, margin_x)
        } else {
            pill_around(bounds, margin_x)
        };

        painter.fill_path(&path, &brush);
        painter.stroke_path(&path, &border);
        if let Some(outline) = ctx.format.outline.filter(Pen::is_visible) {
            painter.stroke_path(&path, &Pen::new(outline.color, outline.width + 2.0));
        }
        painter.stroke_path(&path, &border);

        let spacing = font.letter_spacing - LABEL_SPACING_DELTA;
        let mut label_font = font.with_letter_spacing(spacing);
        if !label.gradient {
            label_font.weight = WEIGHT_BOLD;
        }
        let label_width = measurer.text_width(&label_font, label.text);
        let label_metrics = measurer.metrics(&label_font);
        let x = bounds.x + (bounds.width - label_width) / 2.0;
        let baseline = bounds.y + (bounds.height - label_metrics.height()) / 2.0 + label_metrics.ascent;
        let glyphs = measurer.text_outline(&label_font, label.text, (x as f64, baseline as f64));
        painter.fill_path(&glyphs, &Brush::Solid(color));
    }
}

/// Pill spanning the full object rect, ends curving inside `margin`.
fn pill_in_rect(rect: Rect, bounds: Rect, margin: f64) -> BezPath {
    let (left, right) = (rect.x as f64, rect.right() as f64);
    let (top, bottom) = (bounds.y as f64, bounds.bottom() as f64);
    let mut path = BezPath::new();
    path.move_to((left + margin, top));
    path.line_to((right - margin, top));
    path.curve_to((right, top), (right, bottom), (right - margin, bottom));
    path.line_to((left + margin, bottom));
    path.curve_to((left, bottom), (left, top), (left + margin, top));
    path.close_path();
    path
}

/// Pill hugging the label bounds, ends bulging out by `margin`.
fn pill_around(bounds: Rect, margin: f64) -> BezPath {
    let (left, right) = (bounds.x as f64, bounds.right() as f64);
    let (top, bottom) = (bounds.y as f64, bounds.bottom() as f64);
    let mut path = BezPath::new();
    path.move_to((left, top));
    path.line_to((right, top));
    path.curve_to((right + margin, top), (right + margin, bottom), (right, bottom));
    path.line_to((left, bottom));
    path.curve_to((left - margin, bottom), (left - margin, top), (left, top));
    path.close_path();
    path
}
