pub mod document;
pub mod fixed;
pub mod font;
pub mod geometry;
pub mod markup;
pub mod paint;

pub use document::{
    Alignment, Block, BlockFormat, BlockId, CharFormat, ContentChange, Direction, Document,
    FlowItem, Frame, FrameFormat, FrameId, FrameLength, FramePosition, InlinePlaceholder,
    LineHeight, ObjectKind, ObjectPayload, Run, TextRun, VerticalAlignment, WrapMode,
};
pub use fixed::{Fixed, FixedPoint, FixedSize};
pub use font::{FontSpec, FontStretch};
pub use geometry::{Color, Pen, Point, Rect, Size};
pub use markup::{insert_markup, parse, InsertContext, Instruction, SymbolTable};
pub use paint::{Brush, GradientStop, LinearGradient, Painter, RecordingPainter};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_into_fresh_document() {
        let mut doc = Document::new();
        let change = insert_markup(
            &mut doc,
            "[w][w]. Draw a card.",
            &SymbolTable::default(),
            &InsertContext::default(),
        );
        assert_eq!(change, ContentChange::new(0, 0, 16));
        assert_eq!(doc.character_count(), 17);
        let kinds: Vec<_> = (0..2)
            .filter_map(|p| doc.placeholder_at(p).map(InlinePlaceholder::kind))
            .collect();
        assert_eq!(kinds, vec![ObjectKind::Symbol, ObjectKind::Symbol]);
    }
}
