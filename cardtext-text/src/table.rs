//! Static width table measurer.
//!
//! Character widths are in em units and follow a classic Times-style serif.
//! The table covers ASCII 0x20..=0x7E; everything else falls back to
//! [`AVERAGE_WIDTH`]. Glyph outlines are plain boxes, which is enough for
//! deterministic layout and raster tests without any installed fonts.

use cardtext_core::font::{FontSpec, WEIGHT_DEMI_BOLD};
use kurbo::BezPath;

use crate::metrics::{FontMetrics, TextMeasurer};

pub const AVERAGE_WIDTH: f32 = 0.5;

const ASCENT: f32 = 0.891;
const DESCENT: f32 = 0.216;
const LEADING: f32 = 0.042;
const X_HEIGHT: f32 = 0.448;
const CAP_HEIGHT: f32 = 0.662;
/// Bold faces run slightly wider.
const BOLD_FACTOR: f32 = 1.05;

/// `WIDTHS[i]` is the width of ASCII `(i + 32)`.
const WIDTHS: [f32; 95] = [
    0.250, 0.333, 0.408, 0.500, 0.500, 0.833, 0.778, 0.180, // sp ! " # $ % & '
    0.333, 0.333, 0.500, 0.564, 0.250, 0.333, 0.250, 0.278, // ( ) * + , - . /
    0.500, 0.500, 0.500, 0.500, 0.500, 0.500, 0.500, 0.500, // 0-7
    0.500, 0.500, 0.278, 0.278, 0.564, 0.564, 0.564, 0.444, // 8 9 : ; < = > ?
    0.921, 0.722, 0.667, 0.667, 0.722, 0.611, 0.556, 0.722, // @ A-G
    0.722, 0.333, 0.389, 0.722, 0.611, 0.889, 0.722, 0.722, // H-O
    0.556, 0.722, 0.667, 0.556, 0.611, 0.722, 0.722, 0.944, // P-W
    0.722, 0.722, 0.611, 0.333, 0.278, 0.333, 0.469, 0.500, // X Y Z [ \ ] ^ _
    0.333, 0.444, 0.500, 0.444, 0.500, 0.444, 0.333, 0.500, // ` a-g
    0.500, 0.278, 0.278, 0.500, 0.278, 0.778, 0.500, 0.500, // h-o
    0.500, 0.500, 0.333, 0.389, 0.278, 0.500, 0.500, 0.722, // p-w
    0.500, 0.500, 0.444, 0.480, 0.200, 0.480, 0.541, // x y z { | } ~
];

/// Measurer backed by [`WIDTHS`]; needs no font files.
#[derive(Clone, Copy, Debug, Default)]
pub struct TableMeasurer;

impl TableMeasurer {
    pub fn new() -> Self {
        Self
    }

    fn em_width(ch: char) -> f32 {
        let code = ch as usize;
        if (32..=126).contains(&code) {
            WIDTHS[code - 32]
        } else {
            AVERAGE_WIDTH
        }
    }
}

impl TextMeasurer for TableMeasurer {
    fn metrics(&mut self, font: &FontSpec) -> FontMetrics {
        let px = font.pixel_size();
        FontMetrics {
            ascent: ASCENT * px,
            descent: DESCENT * px,
            leading: LEADING * px,
            x_height: X_HEIGHT * px,
        }
    }

    fn advance(&mut self, font: &FontSpec, ch: char) -> f32 {
        let bold = if font.weight >= WEIGHT_DEMI_BOLD { BOLD_FACTOR } else { 1.0 };
        Self::em_width(ch) * font.pixel_size() * bold
    }

    fn glyph_outline(&mut self, font: &FontSpec, ch: char) -> Option<BezPath> {
        if ch.is_whitespace() || ch.is_control() {
            return None;
        }
        let px = font.pixel_size() as f64;
        let width = self.advance(font, ch) as f64;
        let height = (if ch.is_lowercase() { X_HEIGHT } else { CAP_HEIGHT }) as f64 * px;
        let inset = width * 0.1;
        let mut path = BezPath::new();
        path.move_to((inset, -height));
        path.line_to((width - inset, -height));
        path.line_to((width - inset, 0.0));
        path.line_to((inset, 0.0));
        path.close_path();
        Some(path)
    }
}
