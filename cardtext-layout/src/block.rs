//! Laid-out blocks and lines.

use cardtext_core::document::LineHeight;
use cardtext_core::fixed::{Fixed, FixedPoint};
use cardtext_core::geometry::Rect;

use crate::line::ShapedBlock;

/// One positioned line. `x` and `y` are relative to the block position.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineLayout {
    pub start: usize,
    pub end: usize,
    pub x: Fixed,
    pub y: Fixed,
    /// Width the line was broken against.
    pub width: Fixed,
    pub natural_width: f32,
    pub ascent: f32,
    pub descent: f32,
    pub leading: f32,
}

impl LineLayout {
    pub fn height(&self) -> f32 {
        self.ascent + self.descent + self.leading.max(0.0)
    }

    pub fn baseline(&self) -> f32 {
        self.y.to_f32() + self.ascent
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BlockLayout {
    /// Top-left of the block inside its frame.
    pub position: FixedPoint,
    pub lines: Vec<LineLayout>,
    pub shaped: ShapedBlock,
}

impl BlockLayout {
    /// Bounds of all lines, relative to [`BlockLayout::position`].
    pub fn bounding_rect(&self) -> Rect {
        let mut iter = self.lines.iter();
        let Some(first) = iter.next() else {
            return Rect::default();
        };
        let extent = |l: &LineLayout| {
            let x = l.x.to_f32();
            let y = l.y.to_f32();
            (x, y, x + l.width.to_f32().max(l.natural_width), y + l.height())
        };
        let (mut x0, mut y0, mut x1, mut y1) = extent(first);
        for line in iter {
            let (a, b, c, d) = extent(line);
            x0 = x0.min(a);
            y0 = y0.min(b);
            x1 = x1.max(c);
            y1 = y1.max(d);
        }
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }
}

/// Vertical placement of one line under a line-height policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct LineAdvance {
    /// Shift of the glyphs upward relative to the pen position.
    pub adjustment: Fixed,
    /// Height checked against the page bottom.
    pub break_height: Fixed,
    /// Pen advance to the next line.
    pub line_height: Fixed,
    /// Bottom of the line's ink box relative to the pen position.
    pub line_bottom: Fixed,
}

impl LineAdvance {
    pub fn new(policy: &LineHeight, ascent: f32, descent: f32, leading: f32) -> Self {
        let height = ascent + descent + leading.max(0.0);
        let raw = (ascent + descent + leading).ceil();
        let line_height = Fixed::from_f32(policy.resolve(raw, 1.0));
        let line_bottom = Fixed::from_f32(policy.resolve(height, 1.0));
        match policy {
            LineHeight::Fixed(_) => Self {
                adjustment: Fixed::from_f32(ascent + leading.max(0.0)) - line_height * 4 / 5,
                break_height: line_bottom,
                line_height,
                line_bottom,
            },
            LineHeight::Minimum(_) => Self {
                adjustment: Fixed::from_f32(height) - line_height,
                break_height: line_bottom,
                line_height,
                line_bottom,
            },
            _ => Self {
                adjustment: Fixed::ZERO,
                break_height: Fixed::from_f32(height),
                line_height,
                line_bottom,
            },
        }
    }

    pub fn for_line(policy: &LineHeight, line: &LineLayout) -> Self {
        Self::new(policy, line.ascent, line.descent, line.leading)
    }
}
