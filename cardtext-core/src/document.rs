//! Document model: frames, blocks, runs and inline placeholders.
//!
//! Positions follow the usual rich-text convention: every block occupies its
//! characters plus one trailing paragraph separator, an inline placeholder is
//! exactly one character wide, and a child frame occupies a start marker plus
//! its own content. Every mutation returns a [`ContentChange`] describing the
//! touched range so the flow engine can relayout incrementally.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::font::FontSpec;
use crate::geometry::{Color, Pen};

pub type BlockId = Uuid;
pub type FrameId = Uuid;

/// Stands in for an inline placeholder in flattened block text.
pub const OBJECT_REPLACEMENT: char = '\u{FFFC}';
/// Invisible character that forbids a line break on either side.
pub const WORD_JOINER: char = '\u{2060}';
/// Forces a line break inside a block.
pub const LINE_SEPARATOR: char = '\u{2028}';

/// Default distance between the root frame edge and its content.
pub const DEFAULT_DOCUMENT_MARGIN: f32 = 4.0;
/// Width of one indentation level.
pub const DEFAULT_INDENT_WIDTH: f32 = 40.0;

// ── Formats ─────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WrapMode {
    /// Only explicit line separators break lines.
    NoWrap,
    #[default]
    WordWrap,
    WrapAnywhere,
    WrapAtWordBoundaryOrAnywhere,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alignment {
    #[default]
    Left,
    Right,
    Center,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    LeftToRight,
    RightToLeft,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerticalAlignment {
    #[default]
    Baseline,
    Middle,
}

/// Line-height policy of a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum LineHeight {
    #[default]
    Single,
    /// Percentage of the natural line height.
    Proportional(i32),
    /// Exact height; surplus glyph height is shifted into the line above.
    Fixed(f32),
    /// At least this tall.
    Minimum(f32),
    /// Natural height plus a fixed distance.
    LineDistance(f32),
}

impl LineHeight {
    /// Resolves the policy against a natural line height.
    pub fn resolve(&self, natural: f32, scaling: f32) -> f32 {
        match *self {
            LineHeight::Single => natural,
            LineHeight::Proportional(pct) => natural * pct as f32 / 100.0,
            LineHeight::Fixed(h) => h * scaling,
            LineHeight::Minimum(h) => (h * scaling).max(natural),
            LineHeight::LineDistance(d) => natural + d * scaling,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockFormat {
    pub top_margin: f32,
    pub bottom_margin: f32,
    pub left_margin: f32,
    pub right_margin: f32,
    /// Extra offset of the first line.
    pub text_indent: f32,
    /// Indentation level, multiplied by the document indent width.
    pub indent: u32,
    pub line_height: LineHeight,
    pub alignment: Alignment,
    pub direction: Direction,
    pub non_breakable_lines: bool,
    pub page_break_before: bool,
    pub page_break_after: bool,
    pub background: Option<Color>,
}

impl Default for BlockFormat {
    fn default() -> Self {
        Self {
            top_margin: 0.0,
            bottom_margin: 0.0,
            left_margin: 0.0,
            right_margin: 0.0,
            text_indent: 0.0,
            indent: 0,
            line_height: LineHeight::Single,
            alignment: Alignment::Left,
            direction: Direction::LeftToRight,
            non_breakable_lines: false,
            page_break_before: false,
            page_break_after: false,
            background: None,
        }
    }
}

/// Character-level formatting. Font properties not overridden here come
/// from the document's base font.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharFormat {
    /// Text color. `None` uses the document text color.
    pub color: Option<Color>,
    /// Outline pen; glyphs are stroked with it before being filled.
    pub outline: Option<Pen>,
    pub weight: Option<u16>,
    pub italic: Option<bool>,
    pub vertical_alignment: VerticalAlignment,
}

impl CharFormat {
    pub fn resolve_font(&self, base: &FontSpec) -> FontSpec {
        let mut font = base.clone();
        if let Some(weight) = self.weight {
            font.weight = weight;
        }
        if let Some(italic) = self.italic {
            font.italic = italic;
        }
        font
    }

    pub fn resolve_color(&self, default: Color) -> Color {
        self.color.unwrap_or(default)
    }

    /// The outline pen if it would paint anything.
    pub fn visible_outline(&self) -> Option<Pen> {
        self.outline.filter(|pen| pen.is_visible() && pen.width > 0.0)
    }
}

// ── Runs ────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Keyword,
    Symbol,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ObjectPayload {
    Keyword {
        label: String,
        gradient: bool,
    },
    Symbol {
        /// Asset key of the pre-rendered icon.
        symbol: String,
        /// Numeral drawn on top of the icon.
        overlay: Option<String>,
        /// Family used for the numeral; the document family when unset.
        overlay_family: Option<String>,
        /// Width of the outline pen active when the symbol was inserted.
        outline_width: Option<f32>,
    },
}

/// A one-character run that the layout replaces with an inline object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InlinePlaceholder {
    pub payload: ObjectPayload,
    pub format: CharFormat,
}

impl InlinePlaceholder {
    pub fn keyword(label: impl Into<String>, gradient: bool, format: CharFormat) -> Self {
        Self {
            payload: ObjectPayload::Keyword {
                label: label.into(),
                gradient,
            },
            format: CharFormat {
                vertical_alignment: VerticalAlignment::Middle,
                ..format
            },
        }
    }

    pub fn symbol(
        symbol: impl Into<String>,
        overlay: Option<String>,
        overlay_family: Option<String>,
        outline_width: Option<f32>,
        format: CharFormat,
    ) -> Self {
        Self {
            payload: ObjectPayload::Symbol {
                symbol: symbol.into(),
                overlay,
                overlay_family,
                outline_width,
            },
            format: CharFormat {
                vertical_alignment: VerticalAlignment::Middle,
                ..format
            },
        }
    }

    pub fn kind(&self) -> ObjectKind {
        match self.payload {
            ObjectPayload::Keyword { .. } => ObjectKind::Keyword,
            ObjectPayload::Symbol { .. } => ObjectKind::Symbol,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    pub text: String,
    pub format: CharFormat,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Run {
    Text(TextRun),
    Object(InlinePlaceholder),
}

impl Run {
    pub fn text(text: impl Into<String>, format: CharFormat) -> Self {
        Run::Text(TextRun {
            text: text.into(),
            format,
        })
    }

    /// Length in document positions.
    pub fn len(&self) -> usize {
        match self {
            Run::Text(t) => t.text.chars().count(),
            Run::Object(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn format(&self) -> &CharFormat {
        match self {
            Run::Text(t) => &t.format,
            Run::Object(p) => &p.format,
        }
    }
}

// ── Blocks ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub format: BlockFormat,
    pub runs: Vec<Run>,
}

impl Block {
    pub fn new(format: BlockFormat) -> Self {
        Self {
            id: Uuid::new_v4(),
            format,
            runs: Vec::new(),
        }
    }

    /// Number of content characters, excluding the paragraph separator.
    pub fn content_len(&self) -> usize {
        self.runs.iter().map(Run::len).sum()
    }

    /// Length in document positions, including the paragraph separator.
    pub fn len(&self) -> usize {
        self.content_len() + 1
    }

    pub fn is_empty(&self) -> bool {
        self.content_len() == 0
    }

    /// Flattened content with placeholders as U+FFFC.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for run in &self.runs {
            match run {
                Run::Text(t) => out.push_str(&t.text),
                Run::Object(_) => out.push(OBJECT_REPLACEMENT),
            }
        }
        out
    }

    /// Appends a run, merging it into the previous text run when the formats
    /// match.
    pub fn push_run(&mut self, run: Run) {
        if let (Some(Run::Text(last)), Run::Text(next)) = (self.runs.last_mut(), &run) {
            if last.format == next.format {
                last.text.push_str(&next.text);
                return;
            }
        }
        if !run.is_empty() {
            self.runs.push(run);
        }
    }

    /// Run index and offset inside that run for a block-relative offset.
    fn locate(&self, offset: usize) -> Option<(usize, usize)> {
        let mut start = 0;
        for (i, run) in self.runs.iter().enumerate() {
            let len = run.len();
            if offset < start + len {
                return Some((i, offset - start));
            }
            start += len;
        }
        None
    }

    pub fn run_at(&self, offset: usize) -> Option<&Run> {
        self.locate(offset).map(|(i, _)| &self.runs[i])
    }

    /// Inserts plain text at a block-relative offset, inheriting the format of
    /// the run it lands in (or the previous run at a boundary).
    pub fn insert_text(&mut self, offset: usize, text: &str) -> bool {
        if offset > self.content_len() {
            return false;
        }
        match self.locate(offset) {
            Some((i, inner)) => {
                if let Run::Text(t) = &mut self.runs[i] {
                    let byte = char_to_byte(&t.text, inner);
                    t.text.insert_str(byte, text);
                    return true;
                }
                let format = boundary_format(&self.runs, i);
                self.runs.insert(i, Run::text(text, format));
            }
            None => {
                let format = boundary_format(&self.runs, self.runs.len());
                self.push_run(Run::text(text, format));
            }
        }
        true
    }

    /// Removes `len` characters starting at a block-relative offset.
    pub fn remove(&mut self, offset: usize, len: usize) -> bool {
        if offset + len > self.content_len() {
            return false;
        }
        let mut remaining = len;
        let mut pos = offset;
        while remaining > 0 {
            let Some((i, inner)) = self.locate(pos) else {
                break;
            };
            match &mut self.runs[i] {
                Run::Text(t) => {
                    let take = (t.text.chars().count() - inner).min(remaining);
                    let from = char_to_byte(&t.text, inner);
                    let to = char_to_byte(&t.text, inner + take);
                    t.text.replace_range(from..to, "");
                    remaining -= take;
                    if t.text.is_empty() {
                        self.runs.remove(i);
                    }
                }
                Run::Object(_) => {
                    self.runs.remove(i);
                    remaining -= 1;
                }
            }
            pos = offset;
        }
        true
    }
}

/// Format for text inserted before run `idx`: the previous run's, or the
/// first run's at the start of the block.
fn boundary_format(runs: &[Run], idx: usize) -> CharFormat {
    let source = if idx == 0 { runs.first() } else { runs.get(idx - 1) };
    source.map(|r| strip_object_format(r.format())).unwrap_or_default()
}

fn strip_object_format(format: &CharFormat) -> CharFormat {
    CharFormat {
        vertical_alignment: VerticalAlignment::Baseline,
        ..format.clone()
    }
}

fn char_to_byte(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(b, _)| b).unwrap_or(s.len())
}

// ── Frames ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FramePosition {
    #[default]
    InFlow,
    FloatLeft,
    FloatRight,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum FrameLength {
    /// Fill the available width; height follows the content.
    #[default]
    Auto,
    Fixed(f32),
    Percentage(f32),
}

impl FrameLength {
    pub fn value(&self, maximum: f32) -> f32 {
        match *self {
            FrameLength::Auto => maximum,
            FrameLength::Fixed(v) => v,
            FrameLength::Percentage(p) => maximum * p / 100.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameFormat {
    pub position: FramePosition,
    pub width: FrameLength,
    pub height: FrameLength,
    pub top_margin: f32,
    pub bottom_margin: f32,
    pub left_margin: f32,
    pub right_margin: f32,
    pub border: f32,
    pub padding: f32,
    pub background: Option<Color>,
    pub border_color: Color,
    pub page_break_before: bool,
    pub page_break_after: bool,
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self {
            position: FramePosition::InFlow,
            width: FrameLength::Auto,
            height: FrameLength::Auto,
            top_margin: 0.0,
            bottom_margin: 0.0,
            left_margin: 0.0,
            right_margin: 0.0,
            border: 0.0,
            padding: 0.0,
            background: None,
            border_color: Color::rgb(211, 211, 211),
            page_break_before: false,
            page_break_after: false,
        }
    }
}

impl FrameFormat {
    pub fn with_margin(mut self, margin: f32) -> Self {
        self.top_margin = margin;
        self.bottom_margin = margin;
        self.left_margin = margin;
        self.right_margin = margin;
        self
    }

    pub fn is_float(&self) -> bool {
        self.position != FramePosition::InFlow
    }
}

/// A child frame: an in-flow box or a float with its own blocks. When
/// `object` is set the frame is painted by that inline object handler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub id: FrameId,
    pub format: FrameFormat,
    pub items: Vec<FlowItem>,
    pub object: Option<InlinePlaceholder>,
}

impl Frame {
    pub fn new(format: FrameFormat) -> Self {
        Self {
            id: Uuid::new_v4(),
            format,
            items: Vec::new(),
            object: None,
        }
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.items.push(FlowItem::Block(block));
        self
    }

    pub fn with_object(mut self, object: InlinePlaceholder) -> Self {
        self.object = Some(object);
        self
    }

    pub fn content_len(&self) -> usize {
        self.items.iter().map(FlowItem::len).sum()
    }

    /// Start marker plus content.
    pub fn len(&self) -> usize {
        1 + self.content_len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FlowItem {
    Block(Block),
    Frame(Frame),
}

impl FlowItem {
    pub fn len(&self) -> usize {
        match self {
            FlowItem::Block(b) => b.len(),
            FlowItem::Frame(f) => f.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Change notification ─────────────────────────────────────────────

/// Range touched by a mutation, in document positions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentChange {
    pub from: usize,
    pub removed: usize,
    pub added: usize,
}

impl ContentChange {
    pub const fn new(from: usize, removed: usize, added: usize) -> Self {
        Self { from, removed, added }
    }

    /// The whole document was (re)inserted.
    pub fn full(document: &Document) -> Self {
        Self::new(0, 0, document.character_count())
    }

    /// Every character changed in place (font or format change).
    pub fn everything(document: &Document) -> Self {
        let len = document.character_count();
        Self::new(0, len, len)
    }

    pub fn end(&self) -> usize {
        self.from + self.removed.max(self.added)
    }
}

// ── Document ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub root_id: FrameId,
    pub root_format: FrameFormat,
    items: Vec<FlowItem>,
    pub default_font: FontSpec,
    pub wrap_mode: WrapMode,
    /// Layout width; `None` lays out without wrapping.
    pub text_width: Option<f32>,
    /// Page height; `None` or a non-positive value disables page breaking.
    pub page_height: Option<f32>,
    pub indent_width: f32,
    /// Color of runs that do not set their own.
    pub text_color: Color,
    /// Format given to blocks created by [`Document::push_block`].
    pub block_format: BlockFormat,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let block_format = BlockFormat::default();
        Self {
            id: Uuid::new_v4(),
            root_id: Uuid::new_v4(),
            root_format: FrameFormat::default().with_margin(DEFAULT_DOCUMENT_MARGIN),
            items: vec![FlowItem::Block(Block::new(block_format.clone()))],
            default_font: FontSpec::default(),
            wrap_mode: WrapMode::WordWrap,
            text_width: None,
            page_height: None,
            indent_width: DEFAULT_INDENT_WIDTH,
            text_color: Color::BLACK,
            block_format,
        }
    }

    pub fn items(&self) -> &[FlowItem] {
        &self.items
    }

    /// Total number of positions, including every paragraph separator.
    pub fn character_count(&self) -> usize {
        self.items.iter().map(FlowItem::len).sum()
    }

    /// Root-level blocks in order.
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.items.iter().filter_map(|item| match item {
            FlowItem::Block(b) => Some(b),
            FlowItem::Frame(_) => None,
        })
    }

    pub fn block_count(&self) -> usize {
        self.blocks().count()
    }

    /// Replaces all content with a single empty block.
    pub fn clear(&mut self) -> ContentChange {
        let removed = self.character_count();
        self.items = vec![FlowItem::Block(Block::new(self.block_format.clone()))];
        ContentChange::new(0, removed, self.character_count())
    }

    fn with_last_block(&mut self, f: impl FnOnce(&mut Block)) {
        if let Some(FlowItem::Block(b)) = self.items.last_mut() {
            f(b);
            return;
        }
        let mut block = Block::new(self.block_format.clone());
        f(&mut block);
        self.items.push(FlowItem::Block(block));
    }

    pub fn last_block(&self) -> Option<&Block> {
        self.blocks().last()
    }

    /// Appends a run to the last block.
    pub fn append_run(&mut self, run: Run) -> ContentChange {
        let from = self.character_count().saturating_sub(1);
        let added = run.len();
        self.with_last_block(|b| b.push_run(run));
        ContentChange::new(from, 0, added)
    }

    /// Starts a new block after the last one.
    pub fn push_block(&mut self) -> ContentChange {
        let from = self.character_count().saturating_sub(1);
        self.items
            .push(FlowItem::Block(Block::new(self.block_format.clone())));
        ContentChange::new(from, 0, 1)
    }

    /// Inserts a child frame before the root item at `index`.
    pub fn insert_frame(&mut self, index: usize, frame: Frame) -> ContentChange {
        let index = index.min(self.items.len());
        let from: usize = self.items[..index].iter().map(FlowItem::len).sum();
        let added = frame.len();
        self.items.insert(index, FlowItem::Frame(frame));
        ContentChange::new(from, 0, added)
    }

    /// Root-level block containing `position`, with its start position.
    fn root_block_at_mut(&mut self, position: usize) -> Option<(&mut Block, usize)> {
        let mut start = 0;
        for item in self.items.iter_mut() {
            let len = item.len();
            if position < start + len {
                return match item {
                    FlowItem::Block(b) => Some((b, start)),
                    FlowItem::Frame(_) => None,
                };
            }
            start += len;
        }
        None
    }

    /// Inserts plain text at `position` inside a root-level block.
    pub fn insert_text(&mut self, position: usize, text: &str) -> Option<ContentChange> {
        let (block, start) = self.root_block_at_mut(position)?;
        if block.insert_text(position - start, text) {
            Some(ContentChange::new(position, 0, text.chars().count()))
        } else {
            None
        }
    }

    /// Removes characters inside a single root-level block.
    pub fn remove_text(&mut self, position: usize, len: usize) -> Option<ContentChange> {
        let (block, start) = self.root_block_at_mut(position)?;
        if block.remove(position - start, len) {
            Some(ContentChange::new(position, len, 0))
        } else {
            None
        }
    }

    /// Changes the base font. Every character is affected.
    pub fn set_default_font(&mut self, font: FontSpec) -> ContentChange {
        self.default_font = font;
        ContentChange::everything(self)
    }

    /// Sets the top and bottom margin of every block, including the format
    /// given to future blocks.
    pub fn set_block_margins(&mut self, top: f32, bottom: f32) -> ContentChange {
        self.block_format.top_margin = top;
        self.block_format.bottom_margin = bottom;
        for_each_block_mut(&mut self.items, &mut |b| {
            b.format.top_margin = top;
            b.format.bottom_margin = bottom;
        });
        ContentChange::everything(self)
    }

    /// Applies `f` to every block format, including the one used for new
    /// blocks.
    pub fn update_block_formats(&mut self, mut f: impl FnMut(&mut BlockFormat)) -> ContentChange {
        f(&mut self.block_format);
        for_each_block_mut(&mut self.items, &mut |b| f(&mut b.format));
        ContentChange::everything(self)
    }

    /// Visits every inline placeholder, in blocks and frames.
    pub fn for_each_placeholder_mut(&mut self, mut f: impl FnMut(&mut InlinePlaceholder)) -> ContentChange {
        for_each_block_mut(&mut self.items, &mut |b| {
            for run in b.runs.iter_mut() {
                if let Run::Object(p) = run {
                    f(p);
                }
            }
        });
        ContentChange::everything(self)
    }

    /// Block containing `position` (searching child frames) and its start.
    pub fn block_at(&self, position: usize) -> Option<(&Block, usize)> {
        find_block(&self.items, 0, position)
    }

    /// Inline placeholder occupying `position`, if any.
    pub fn placeholder_at(&self, position: usize) -> Option<&InlinePlaceholder> {
        let (block, start) = self.block_at(position)?;
        match block.run_at(position - start)? {
            Run::Object(p) => Some(p),
            Run::Text(_) => None,
        }
    }

    /// Plain text: blocks joined by `\n`, placeholders as U+FFFC.
    pub fn plain_text(&self) -> String {
        let mut parts = Vec::new();
        collect_text(&self.items, &mut parts);
        parts.join("\n")
    }

    /// Effective page height; `None` when paging is disabled.
    pub fn effective_page_height(&self) -> Option<f32> {
        self.page_height.filter(|h| h.is_finite() && *h > 0.0)
    }
}

fn for_each_block_mut(items: &mut [FlowItem], f: &mut dyn FnMut(&mut Block)) {
    for item in items.iter_mut() {
        match item {
            FlowItem::Block(b) => f(b),
            FlowItem::Frame(fr) => for_each_block_mut(&mut fr.items, f),
        }
    }
}

fn find_block(items: &[FlowItem], base: usize, position: usize) -> Option<(&Block, usize)> {
    let mut start = base;
    for item in items {
        let len = item.len();
        if position < start + len {
            return match item {
                FlowItem::Block(b) => Some((b, start)),
                FlowItem::Frame(f) => find_block(&f.items, start + 1, position),
            };
        }
        start += len;
    }
    None
}

fn collect_text(items: &[FlowItem], out: &mut Vec<String>) {
    for item in items {
        match item {
            FlowItem::Block(b) => out.push(b.text()),
            FlowItem::Frame(f) => collect_text(&f.items, out),
        }
    }
}
