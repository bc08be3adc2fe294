//! Bitmap cache of a laid-out document.
//!
//! Outlined text is expensive to rasterize, so the document is painted once
//! into a bitmap after each invalidation and the bitmap is reused until the
//! next geometry-affecting change.

use cardtext_core::geometry::{Pen, Size};
use cardtext_layout::{DrawOptions, FlowLayout, LayoutContext, OutlineMode};
use image::RgbaImage;

use crate::canvas::Canvas;

/// Counters of cache activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Paints that rasterized the document.
    pub renders: u32,
    /// Paints served from the bitmap.
    pub hits: u32,
}

#[derive(Clone, Debug)]
pub struct RenderCache {
    bitmap: RgbaImage,
    dirty: bool,
    stats: CacheStats,
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new()
    }
}

fn pixel_size(size: Size) -> (u32, u32) {
    let dim = |v: f32| if v.is_finite() && v > 0.0 { v.ceil() as u32 } else { 0 };
    (dim(size.width), dim(size.height))
}

impl RenderCache {
    pub fn new() -> Self {
        Self {
            bitmap: RgbaImage::new(0, 0),
            dirty: true,
            stats: CacheStats::default(),
        }
    }

    /// Resizes the bitmap to `size` (rounded up), clears it and marks the
    /// cache dirty.
    pub fn invalidate(&mut self, size: Size) {
        let (w, h) = pixel_size(size);
        self.bitmap = RgbaImage::new(w, h);
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn size(&self) -> (u32, u32) {
        self.bitmap.dimensions()
    }

    pub fn fits(&self, size: Size) -> bool {
        pixel_size(size) == self.size()
    }

    pub fn bitmap(&self) -> &RgbaImage {
        &self.bitmap
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Returns the bitmap, painting the document first when dirty.
    ///
    /// A visible `outline` pen paints twice: once with the pen applied to
    /// every character, then once with outlines cleared on top. Otherwise a
    /// single pass paints with outlines cleared.
    pub fn paint(&mut self, layout: &mut FlowLayout, ctx: &mut LayoutContext<'_>, outline: Option<Pen>) -> &RgbaImage {
        if !self.dirty {
            self.stats.hits += 1;
            return &self.bitmap;
        }
        let (width, height) = self.bitmap.dimensions();
        let mut canvas = Canvas::new(width, height);
        let clear = DrawOptions {
            clip: None,
            outline: OutlineMode::Clear,
        };
        match outline.filter(|pen| pen.color.a > 0) {
            Some(pen) => {
                let outlined = DrawOptions {
                    clip: None,
                    outline: OutlineMode::Apply(pen),
                };
                layout.draw(ctx, &mut canvas, &outlined);
                layout.draw(ctx, &mut canvas, &clear);
            }
            None => layout.draw(ctx, &mut canvas, &clear),
        }
        log::debug!("render cache painted {}x{}", canvas.width(), canvas.height());
        self.bitmap = canvas.into_image();
        self.dirty = false;
        self.stats.renders += 1;
        &self.bitmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardtext_core::document::{CharFormat, ContentChange, Document, Run};
    use cardtext_core::geometry::Color;
    use cardtext_layout::ObjectRegistry;
    use cardtext_text::TableMeasurer;

    fn laid_out(doc: &Document, m: &mut TableMeasurer, objects: &ObjectRegistry) -> (FlowLayout, Size) {
        let mut layout = FlowLayout::new();
        let mut ctx = LayoutContext::new(doc, m, objects);
        layout.document_changed(&mut ctx, ContentChange::full(doc));
        let size = layout.document_size(&mut ctx);
        (layout, size)
    }

    fn doc() -> Document {
        let mut doc = Document::new();
        doc.text_width = Some(200.0);
        doc.append_run(Run::text("Draw", CharFormat::default()));
        doc
    }

    fn opaque_pixels(image: &RgbaImage) -> usize {
        image.pixels().filter(|p| p[3] > 0).count()
    }

    #[test]
    fn test_paints_once_until_invalidated() {
        let doc = doc();
        let (mut m, objects) = (TableMeasurer::new(), ObjectRegistry::new());
        let (mut layout, size) = laid_out(&doc, &mut m, &objects);
        let mut cache = RenderCache::new();
        cache.invalidate(size);
        assert_eq!(cache.size(), (200, size.height.ceil() as u32));

        let mut ctx = LayoutContext::new(&doc, &mut m, &objects);
        assert!(opaque_pixels(cache.paint(&mut layout, &mut ctx, None)) > 0);
        cache.paint(&mut layout, &mut ctx, None);
        assert_eq!(cache.stats(), CacheStats { renders: 1, hits: 1 });
        assert!(!cache.is_dirty());

        cache.invalidate(size);
        assert!(cache.is_dirty());
        assert_eq!(opaque_pixels(cache.bitmap()), 0);
        cache.paint(&mut layout, &mut ctx, None);
        assert_eq!(cache.stats().renders, 2);
    }

    #[test]
    fn test_outline_pass_under_fill() {
        let doc = doc();
        let (mut m, objects) = (TableMeasurer::new(), ObjectRegistry::new());
        let (mut layout, size) = laid_out(&doc, &mut m, &objects);
        let mut ctx = LayoutContext::new(&doc, &mut m, &objects);

        let mut plain = RenderCache::new();
        plain.invalidate(size);
        let plain_pixels = opaque_pixels(plain.paint(&mut layout, &mut ctx, None));

        let mut outlined = RenderCache::new();
        outlined.invalidate(size);
        let pen = Pen::new(Color::rgb(255, 0, 0), 6.0);
        let image = outlined.paint(&mut layout, &mut ctx, Some(pen));
        assert!(opaque_pixels(image) > plain_pixels);
        // the fill pass covers glyph interiors in the text color
        assert!(image.pixels().any(|p| p[0] == 0 && p[3] == 255));
        assert!(image.pixels().any(|p| p[0] == 255 && p[1] == 0 && p[3] == 255));
    }

    #[test]
    fn test_transparent_pen_paints_single_pass() {
        let doc = doc();
        let (mut m, objects) = (TableMeasurer::new(), ObjectRegistry::new());
        let (mut layout, size) = laid_out(&doc, &mut m, &objects);
        let mut ctx = LayoutContext::new(&doc, &mut m, &objects);
        let mut a = RenderCache::new();
        a.invalidate(size);
        let mut b = RenderCache::new();
        b.invalidate(size);
        let first = a.paint(&mut layout, &mut ctx, None).clone();
        let second = b.paint(&mut layout, &mut ctx, Some(Pen::new(Color::TRANSPARENT, 6.0)));
        assert_eq!(&first, second);
    }
}
