//! Paint surface abstraction.
//!
//! Layout and inline objects describe what to draw through [`Painter`];
//! the render crate supplies a raster implementation and tests use
//! [`RecordingPainter`] to assert on the emitted commands.

use image::RgbaImage;
use kurbo::{BezPath, Rect as KRect, Shape};
use serde::{Deserialize, Serialize};

use crate::geometry::{Color, Pen, Rect};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    /// Offset along the gradient axis, 0.0 ..= 1.0.
    pub offset: f32,
    pub color: Color,
}

impl GradientStop {
    pub const fn new(offset: f32, color: Color) -> Self {
        Self { offset, color }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearGradient {
    pub start: (f64, f64),
    pub end: (f64, f64),
    pub stops: Vec<GradientStop>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Brush {
    Solid(Color),
    LinearGradient(LinearGradient),
}

impl From<Color> for Brush {
    fn from(color: Color) -> Self {
        Brush::Solid(color)
    }
}

/// A 2D drawing target. Coordinates are layout units with y growing down.
pub trait Painter {
    fn fill_path(&mut self, path: &BezPath, brush: &Brush);

    fn stroke_path(&mut self, path: &BezPath, pen: &Pen);

    /// Draws `image` scaled to cover `dest`.
    fn draw_image(&mut self, dest: Rect, image: &RgbaImage);

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        if rect.is_valid() {
            let path = rect.to_kurbo().to_path(0.1);
            self.fill_path(&path, &Brush::Solid(color));
        }
    }
}

/// One recorded paint command.
#[derive(Clone, Debug, PartialEq)]
pub enum PaintCommand {
    Fill { bounds: KRect, brush: Brush },
    Stroke { bounds: KRect, pen: Pen },
    Image { dest: Rect, size: (u32, u32) },
}

/// Painter that only records what it was asked to draw.
#[derive(Clone, Debug, Default)]
pub struct RecordingPainter {
    pub commands: Vec<PaintCommand>,
}

impl RecordingPainter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fills(&self) -> impl Iterator<Item = (&KRect, &Brush)> {
        self.commands.iter().filter_map(|c| match c {
            PaintCommand::Fill { bounds, brush } => Some((bounds, brush)),
            _ => None,
        })
    }

    pub fn strokes(&self) -> impl Iterator<Item = (&KRect, &Pen)> {
        self.commands.iter().filter_map(|c| match c {
            PaintCommand::Stroke { bounds, pen } => Some((bounds, pen)),
            _ => None,
        })
    }

    pub fn images(&self) -> impl Iterator<Item = &Rect> {
        self.commands.iter().filter_map(|c| match c {
            PaintCommand::Image { dest, .. } => Some(dest),
            _ => None,
        })
    }

    pub fn image_count(&self) -> usize {
        self.images().count()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl Painter for RecordingPainter {
    fn fill_path(&mut self, path: &BezPath, brush: &Brush) {
        self.commands.push(PaintCommand::Fill {
            bounds: path.bounding_box(),
            brush: brush.clone(),
        });
    }

    fn stroke_path(&mut self, path: &BezPath, pen: &Pen) {
        self.commands.push(PaintCommand::Stroke {
            bounds: path.bounding_box(),
            pen: *pen,
        });
    }

    fn draw_image(&mut self, dest: Rect, image: &RgbaImage) {
        self.commands.push(PaintCommand::Image {
            dest,
            size: image.dimensions(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_painter_fill_rect() {
        let mut p = RecordingPainter::new();
        p.fill_rect(Rect::new(1.0, 2.0, 3.0, 4.0), Color::WHITE);
        p.fill_rect(Rect::new(0.0, 0.0, 0.0, 4.0), Color::WHITE);
        assert_eq!(p.commands.len(), 1);
        let (bounds, brush) = p.fills().next().unwrap();
        assert_eq!(*bounds, KRect::new(1.0, 2.0, 4.0, 6.0));
        assert_eq!(*brush, Brush::Solid(Color::WHITE));
    }
}
