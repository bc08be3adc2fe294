use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Pixel dimensions of a bitmap that covers this size.
    pub fn to_pixels(self) -> (u32, u32) {
        (self.width.max(0.0).ceil() as u32, self.height.max(0.0).ceil() as u32)
    }
}

/// Axis-aligned rectangle, top-left origin, y growing downward.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    /// A rectangle is valid when it has positive area.
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Shrinks the rectangle by the given amounts on each side.
    pub fn inset(&self, left: f32, top: f32, right: f32, bottom: f32) -> Rect {
        Rect::new(
            self.x + left,
            self.y + top,
            self.width - left - right,
            self.height - top - bottom,
        )
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Bounding union. An invalid operand is ignored.
    pub fn union(&self, other: &Rect) -> Rect {
        if !self.is_valid() {
            return *other;
        }
        if !other.is_valid() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    pub fn to_kurbo(&self) -> kurbo::Rect {
        kurbo::Rect::new(
            self.x as f64,
            self.y as f64,
            self.right() as f64,
            self.bottom() as f64,
        )
    }
}

/// 8-bit RGBA color, straight (non-premultiplied) alpha.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

/// Stroke description: color and width in layout units.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct Pen {
    pub color: Color,
    pub width: f32,
}

impl Pen {
    pub const fn new(color: Color, width: f32) -> Self {
        Self { color, width }
    }

    /// A pen with a transparent color paints nothing.
    pub fn is_visible(&self) -> bool {
        !self.color.is_transparent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_validity() {
        assert!(Rect::new(0.0, 0.0, 10.0, 5.0).is_valid());
        assert!(!Rect::new(0.0, 0.0, 0.0, 5.0).is_valid());
        assert!(!Rect::new(0.0, 0.0, 10.0, -1.0).is_valid());
    }

    #[test]
    fn test_rect_union_ignores_invalid() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 20.0);
        assert_eq!(a.union(&b), Rect::new(0.0, 0.0, 15.0, 25.0));
        assert_eq!(a.union(&Rect::default()), a);
        assert_eq!(Rect::default().union(&b), b);
    }

    #[test]
    fn test_size_to_pixels_rounds_up() {
        assert_eq!(Size::new(10.2, 3.0).to_pixels(), (11, 3));
        assert_eq!(Size::new(-4.0, 0.5).to_pixels(), (0, 1));
    }
}
