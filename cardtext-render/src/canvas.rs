//! CPU raster [`Painter`] backed by `vello_cpu`.
//!
//! Draw calls are recorded into a [`RenderContext`] and rasterized when the
//! bitmap is read back. The pixmap is premultiplied; readback converts to
//! straight-alpha RGBA. `image` is only used to rescale blitted bitmaps.

use std::fmt;
use std::sync::Arc;

use cardtext_core::geometry::{Color, Pen, Rect};
use cardtext_core::paint::{Brush, LinearGradient, Painter};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use kurbo::{Affine, BezPath, Cap, Join, Stroke};
use peniko::color::PremulRgba8;
use peniko::{ColorStop, Extend, Gradient, ImageQuality};
use vello_cpu::{PaintType, Pixmap, RenderContext, RenderMode};

fn to_peniko(color: Color) -> peniko::Color {
    peniko::Color::from_rgba8(color.r, color.g, color.b, color.a)
}

fn gradient_paint(g: &LinearGradient) -> PaintType {
    let stops: Vec<ColorStop> = g
        .stops
        .iter()
        .map(|s| ColorStop::from((s.offset, to_peniko(s.color))))
        .collect();
    PaintType::Gradient(Gradient::new_linear(g.start, g.end).with_stops(stops.as_slice()))
}

fn paint_of(brush: &Brush) -> PaintType {
    match brush {
        Brush::Solid(color) => PaintType::Solid(to_peniko(*color)),
        Brush::LinearGradient(g) => gradient_paint(g),
    }
}

fn premultiply(image: &RgbaImage) -> Vec<PremulRgba8> {
    image
        .pixels()
        .map(|&Rgba([r, g, b, a])| {
            let scale = |c: u8| ((c as u16 * a as u16 + 127) / 255) as u8;
            PremulRgba8 {
                r: scale(r),
                g: scale(g),
                b: scale(b),
                a,
            }
        })
        .collect()
}

fn unpremultiply(p: PremulRgba8) -> Rgba<u8> {
    if p.a == 0 {
        return Rgba([0, 0, 0, 0]);
    }
    let scale = |c: u8| ((c as u32 * 255 + p.a as u32 / 2) / p.a as u32).min(255) as u8;
    Rgba([scale(p.r), scale(p.g), scale(p.b), p.a])
}

fn dimension(v: u32) -> u16 {
    u16::try_from(v).unwrap_or(u16::MAX)
}

pub struct Canvas {
    width: u16,
    height: u16,
    /// `None` for an empty canvas.
    ctx: Option<RenderContext>,
}

impl fmt::Debug for Canvas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canvas")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl Canvas {
    /// Transparent canvas of `width` × `height` pixels, clamped to 65535.
    pub fn new(width: u32, height: u32) -> Self {
        let (width, height) = (dimension(width), dimension(height));
        let ctx = (width > 0 && height > 0).then(|| RenderContext::new(width, height));
        Self { width, height, ctx }
    }

    pub fn width(&self) -> u32 {
        self.width as u32
    }

    pub fn height(&self) -> u32 {
        self.height as u32
    }

    /// Discards everything drawn so far and fills the canvas with `color`.
    pub fn clear(&mut self, color: Color) {
        let (width, height) = (self.width as f64, self.height as f64);
        if let Some(ctx) = &mut self.ctx {
            ctx.reset();
            if color.a > 0 {
                ctx.set_transform(Affine::IDENTITY);
                ctx.set_paint(PaintType::Solid(to_peniko(color)));
                ctx.fill_rect(&kurbo::Rect::new(0.0, 0.0, width, height));
            }
        }
    }

    /// Rasterizes the recorded commands.
    pub fn image(&self) -> RgbaImage {
        let Some(ctx) = &self.ctx else {
            return RgbaImage::new(self.width(), self.height());
        };
        let mut pixmap = Pixmap::new(self.width, self.height);
        ctx.render_to_pixmap(&mut pixmap, RenderMode::OptimizeQuality);
        let mut image = RgbaImage::new(self.width(), self.height());
        for (dst, &src) in image.pixels_mut().zip(pixmap.data()) {
            *dst = unpremultiply(src);
        }
        image
    }

    pub fn into_image(self) -> RgbaImage {
        self.image()
    }
}

impl Painter for Canvas {
    fn fill_path(&mut self, path: &BezPath, brush: &Brush) {
        let Some(ctx) = &mut self.ctx else { return };
        ctx.set_transform(Affine::IDENTITY);
        ctx.set_paint_transform(Affine::IDENTITY);
        ctx.set_paint(paint_of(brush));
        ctx.fill_path(path);
    }

    fn stroke_path(&mut self, path: &BezPath, pen: &Pen) {
        if !pen.is_visible() {
            return;
        }
        let Some(ctx) = &mut self.ctx else { return };
        ctx.set_transform(Affine::IDENTITY);
        ctx.set_stroke(Stroke::new(pen.width as f64).with_join(Join::Round).with_caps(Cap::Round));
        ctx.set_paint(PaintType::Solid(to_peniko(pen.color)));
        ctx.stroke_path(path);
    }

    fn draw_image(&mut self, dest: Rect, image: &RgbaImage) {
        let (w, h) = (dest.width.round(), dest.height.round());
        if w < 1.0 || h < 1.0 || image.width() == 0 || image.height() == 0 {
            return;
        }
        let Some(ctx) = &mut self.ctx else { return };
        let (w, h) = (dimension(w as u32), dimension(h as u32));
        let scaled;
        let source = if image.dimensions() == (w as u32, h as u32) {
            image
        } else {
            scaled = imageops::resize(image, w as u32, h as u32, FilterType::Triangle);
            &scaled
        };
        let (x, y) = (dest.x.round() as f64, dest.y.round() as f64);
        ctx.set_transform(Affine::IDENTITY);
        ctx.set_paint_transform(Affine::translate((x, y)));
        ctx.set_paint(PaintType::Image(vello_cpu::Image {
            pixmap: Arc::new(Pixmap::from_parts(premultiply(source), w, h)),
            x_extend: Extend::Pad,
            y_extend: Extend::Pad,
            quality: ImageQuality::Low,
        }));
        ctx.fill_rect(&kurbo::Rect::new(x, y, x + w as f64, y + h as f64));
        ctx.set_paint_transform(Affine::IDENTITY);
    }
}
