//! Incremental flow layout of a [`Document`].
//!
//! ```text
//!  document_changed(from, removed, added)
//!        │
//!        ├── full ──► clear checkpoints, cursor = 0, layout_step()
//!        └── edit ──► ensure_layouted_by_position(from), do_layout()
//!                          │
//!                          ▼
//!          mark_frames ─► layout_frame(root) ─► layout_flow
//!                                                ├── resume at checkpoint ≤ from
//!                                                ├── blocks  → layout_block
//!                                                ├── in-flow → layout_frame (recursive)
//!                                                └── floats  → position_float
//! ```
//!
//! Progress through the root flow is recorded as [`CheckPoint`]s every
//! `checkpoint_interval` units of height. Large documents are laid out
//! lazily: each step covers `step` more positions, doubling up to
//! `max_step`. The owner drives the remaining steps with [`FlowLayout::poll`];
//! queries that need geometry further down finish the work on demand.

use std::time::{Duration, Instant};

use cardtext_core::document::{
    Block, BlockFormat, BlockId, ContentChange, Direction, Document, FlowItem, Frame, FrameFormat,
    FrameId, FrameLength, FramePosition, InlinePlaceholder, WrapMode,
};
use cardtext_core::fixed::{Fixed, FixedPoint, FixedSize};
use cardtext_core::geometry::{Point, Rect, Size};
use cardtext_text::TextMeasurer;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::block::{BlockLayout, LineAdvance, LineLayout};
use crate::line::ShapedBlock;
use crate::objects::ObjectRegistry;

/// Update rectangle meaning "repaint everything".
pub const UNBOUNDED: Rect = Rect::new(0.0, 0.0, i32::MAX as f32, i32::MAX as f32);

/// Position span standing for "to the end of the document".
const TO_END: usize = usize::MAX / 2;

// ---------------------------------------------------------------
// Configuration and public records
// ---------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Height walked between two root checkpoints.
    pub checkpoint_interval: f32,
    /// Positions covered by the first lazy step.
    pub initial_step: usize,
    pub max_step: usize,
    /// Delay between background layout steps.
    pub step_interval: Duration,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 2000.0,
            initial_step: 1000,
            max_step: 200_000,
            step_interval: Duration::from_millis(10),
        }
    }
}

/// Resumable state of the root flow at an item boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckPoint {
    pub y: Fixed,
    pub frame_y: Fixed,
    /// Document position of the item the walk was about to lay out.
    pub position: usize,
    pub minimum_width: Fixed,
    pub maximum_width: Fixed,
    pub contents_width: Fixed,
}

/// Deadline for the next background layout step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutTimer {
    interval: Duration,
    deadline: Option<Instant>,
}

impl LayoutTimer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn start(&mut self, now: Instant) {
        self.deadline = Some(now + self.interval);
    }

    pub fn stop(&mut self) {
        self.deadline = None;
    }

    pub fn is_active(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn is_due(&self, now: Instant) -> bool {
        matches!(self.deadline, Some(deadline) if now >= deadline)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

/// Outcome of a layout entry point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutResult {
    /// New document size, when it differs from the last one reported.
    pub size_changed: Option<Size>,
    /// Area whose paint may have changed.
    pub update_rect: Rect,
    /// Work remains for [`FlowLayout::poll`].
    pub lazy_pending: bool,
    /// New page count, reported once layout has finished and it changed.
    pub page_count_changed: Option<usize>,
}

/// Inputs of every layout pass.
pub struct LayoutContext<'a> {
    pub document: &'a Document,
    pub measurer: &'a mut dyn TextMeasurer,
    pub objects: &'a ObjectRegistry,
}

impl<'a> LayoutContext<'a> {
    pub fn new(document: &'a Document, measurer: &'a mut dyn TextMeasurer, objects: &'a ObjectRegistry) -> Self {
        Self {
            document,
            measurer,
            objects,
        }
    }
}

// ---------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------

/// Layout data of one frame. Positions are relative to the parent frame.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct FrameData {
    pub position: FixedPoint,
    pub size: FixedSize,
    pub top_margin: Fixed,
    pub bottom_margin: Fixed,
    pub left_margin: Fixed,
    pub right_margin: Fixed,
    pub border: Fixed,
    pub padding: Fixed,
    pub contents_width: Fixed,
    pub contents_height: Option<Fixed>,
    pub old_contents_width: Fixed,
    pub effective_top_margin: Fixed,
    pub effective_bottom_margin: Fixed,
    pub minimum_width: Fixed,
    pub maximum_width: Fixed,
    pub size_dirty: bool,
    pub layout_dirty: bool,
    pub floats: Vec<FrameId>,
    pub parent: Option<FrameId>,
    pub side: FramePosition,
}

impl Default for FrameData {
    fn default() -> Self {
        Self {
            position: FixedPoint::default(),
            size: FixedSize::default(),
            top_margin: Fixed::ZERO,
            bottom_margin: Fixed::ZERO,
            left_margin: Fixed::ZERO,
            right_margin: Fixed::ZERO,
            border: Fixed::ZERO,
            padding: Fixed::ZERO,
            contents_width: Fixed::ZERO,
            contents_height: None,
            old_contents_width: Fixed::ZERO,
            effective_top_margin: Fixed::ZERO,
            effective_bottom_margin: Fixed::ZERO,
            minimum_width: Fixed::ZERO,
            maximum_width: Fixed::MAX,
            size_dirty: true,
            layout_dirty: true,
            floats: Vec::new(),
            parent: None,
            side: FramePosition::InFlow,
        }
    }
}

impl FrameData {
    pub fn decoration(&self) -> Fixed {
        self.border + self.padding
    }

    pub fn rect(&self) -> Rect {
        Rect::new(
            self.position.x.to_f32(),
            self.position.y.to_f32(),
            self.size.width.to_f32(),
            self.size.height.to_f32(),
        )
    }
}

/// Borrowed view of a frame in the document tree.
#[derive(Clone, Copy)]
pub(crate) struct FrameRef<'a> {
    pub id: FrameId,
    pub format: &'a FrameFormat,
    pub items: &'a [FlowItem],
    /// Position of the first content character.
    pub first_position: usize,
    pub parent: Option<FrameId>,
    pub object: Option<&'a InlinePlaceholder>,
}

impl<'a> FrameRef<'a> {
    pub fn root(document: &'a Document) -> Self {
        Self {
            id: document.root_id,
            format: &document.root_format,
            items: document.items(),
            first_position: 0,
            parent: None,
            object: None,
        }
    }

    /// `marker` is the position of the frame's start marker.
    pub fn child(frame: &'a Frame, marker: usize, parent: FrameId) -> Self {
        Self {
            id: frame.id,
            format: &frame.format,
            items: &frame.items,
            first_position: marker + 1,
            parent: Some(parent),
            object: frame.object.as_ref(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn content_len(&self) -> usize {
        self.items.iter().map(FlowItem::len).sum()
    }

    pub fn item_start(&self, index: usize) -> usize {
        self.first_position + self.items[..index.min(self.items.len())].iter().map(FlowItem::len).sum::<usize>()
    }

    /// Index of the item starting exactly at `position`.
    pub fn item_index_at(&self, position: usize) -> Option<usize> {
        let mut start = self.first_position;
        for (i, item) in self.items.iter().enumerate() {
            if start == position {
                return Some(i);
            }
            if start > position {
                return None;
            }
            start += item.len();
        }
        None
    }

    pub fn children(&self) -> impl Iterator<Item = FrameRef<'a>> + 'a {
        let parent = self.id;
        let mut pos = self.first_position;
        self.items.iter().filter_map(move |item| {
            let start = pos;
            pos += item.len();
            match item {
                FlowItem::Frame(frame) => Some(FrameRef::child(frame, start, parent)),
                FlowItem::Block(_) => None,
            }
        })
    }
}

/// Cursor state of one frame walk.
#[derive(Clone, Debug)]
struct LayoutStruct {
    frame: FrameId,
    x_left: Fixed,
    x_right: Fixed,
    frame_y: Fixed,
    y: Fixed,
    contents_width: Fixed,
    minimum_width: Fixed,
    maximum_width: Fixed,
    full_layout: bool,
    page_height: Fixed,
    page_bottom: Fixed,
    page_top_margin: Fixed,
    page_bottom_margin: Fixed,
    update_rect: Rect,
    update_rect_for_floats: Rect,
}

impl LayoutStruct {
    fn absolute_y(&self) -> Fixed {
        self.frame_y + self.y
    }

    fn content_height(&self) -> Fixed {
        self.page_height - self.page_bottom_margin - self.page_top_margin
    }

    fn paginated(&self) -> bool {
        !self.page_height.is_max()
    }

    fn current_page(&self) -> i32 {
        if self.paginated() {
            (self.absolute_y() / self.page_height).truncate()
        } else {
            0
        }
    }

    fn reset_page_bottom(&mut self) {
        self.page_bottom = self.page_height * (self.current_page() + 1) - self.page_bottom_margin;
    }

    fn new_page(&mut self) {
        if !self.paginated() {
            return;
        }
        self.page_bottom += self.page_height;
        let top = self.page_bottom - self.page_height + self.page_bottom_margin + self.page_top_margin - self.frame_y;
        self.y = self.y.max(top);
    }
}

fn page_height_of(document: &Document) -> Fixed {
    document
        .effective_page_height()
        .map(Fixed::from_f32)
        .filter(|h| *h > Fixed::ZERO)
        .unwrap_or(Fixed::MAX)
}

fn for_each_block(items: &[FlowItem], first: usize, f: &mut dyn FnMut(&Block, usize)) {
    let mut pos = first;
    for item in items {
        match item {
            FlowItem::Block(block) => f(block, pos),
            FlowItem::Frame(frame) => for_each_block(&frame.items, pos + 1, f),
        }
        pos += item.len();
    }
}

fn collect_frame_ids(items: &[FlowItem], out: &mut FxHashSet<FrameId>) {
    for item in items {
        if let FlowItem::Frame(frame) = item {
            out.insert(frame.id);
            collect_frame_ids(&frame.items, out);
        }
    }
}

/// Start position of a block and the id of the frame that holds it.
fn locate_block(items: &[FlowItem], first: usize, frame: FrameId, id: BlockId) -> Option<(usize, usize, FrameId)> {
    let mut pos = first;
    for item in items {
        match item {
            FlowItem::Block(block) if block.id == id => return Some((pos, block.len(), frame)),
            FlowItem::Block(_) => {}
            FlowItem::Frame(child) => {
                if let Some(found) = locate_block(&child.items, pos + 1, child.id, id) {
                    return Some(found);
                }
            }
        }
        pos += item.len();
    }
    None
}

// ---------------------------------------------------------------
// Flow layout
// ---------------------------------------------------------------

pub struct FlowLayout {
    pub(crate) config: LayoutConfig,
    pub(crate) frames: FxHashMap<FrameId, FrameData>,
    pub(crate) blocks: FxHashMap<BlockId, BlockLayout>,
    pub(crate) checkpoints: Vec<CheckPoint>,
    /// Position the lazy walk has reached; `None` once layout is complete.
    pub(crate) lazy_cursor: Option<usize>,
    step: usize,
    timer: LayoutTimer,
    ideal_width: f32,
    last_reported_size: Option<Size>,
    last_page_count: Option<usize>,
}

impl Default for FlowLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowLayout {
    pub fn new() -> Self {
        Self::with_config(LayoutConfig::default())
    }

    pub fn with_config(config: LayoutConfig) -> Self {
        Self {
            step: config.initial_step,
            timer: LayoutTimer::new(config.step_interval),
            config,
            frames: FxHashMap::default(),
            blocks: FxHashMap::default(),
            checkpoints: Vec::new(),
            lazy_cursor: None,
            ideal_width: 0.0,
            last_reported_size: None,
            last_page_count: None,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn timer(&self) -> &LayoutTimer {
        &self.timer
    }

    fn frame_mut(&mut self, id: FrameId) -> &mut FrameData {
        self.frames.entry(id).or_default()
    }

    // ── Change notification ─────────────────────────────────────────

    /// Reacts to a document mutation covering `change`.
    pub fn document_changed(&mut self, ctx: &mut LayoutContext<'_>, change: ContentChange) -> LayoutResult {
        let doc = ctx.document;
        let length = doc.character_count();
        let full = change.from == 0 && change.added >= length;
        log::debug!(
            "document changed: from {} removed {} added {} of {length} (full: {full})",
            change.from,
            change.removed,
            change.added
        );

        self.prune(doc);
        self.clear_block_layouts(doc, change);
        self.step = self.config.initial_step;

        let mut update = None;
        if full {
            self.checkpoints.clear();
            self.lazy_cursor = Some(0);
            self.layout_step(ctx);
        } else {
            self.clamp_lazy_cursor(length);
            self.ensure_layouted_by_position(ctx, change.from);
            update = self.do_layout(ctx, change.from, change.removed, change.added);
        }

        if self.lazy_cursor.is_some() && !self.timer.is_active() {
            self.timer.start(Instant::now());
        }
        self.result(doc, update)
    }

    /// Runs one lazy step when the timer is due.
    pub fn poll(&mut self, ctx: &mut LayoutContext<'_>, now: Instant) -> LayoutResult {
        if self.timer.is_due(now) {
            if self.lazy_cursor.is_some() {
                self.layout_step(ctx);
            }
            if self.lazy_cursor.is_some() {
                self.timer.start(now);
            } else {
                self.timer.stop();
            }
        }
        self.result(ctx.document, None)
    }

    fn result(&mut self, doc: &Document, update: Option<Rect>) -> LayoutResult {
        let size = self.dynamic_document_size(doc);
        let size_changed = if self.last_reported_size != Some(size) {
            self.last_reported_size = Some(size);
            Some(size)
        } else {
            None
        };
        let mut page_count_changed = None;
        if self.lazy_cursor.is_none() {
            let pages = self.dynamic_page_count(doc);
            if self.last_page_count != Some(pages) {
                self.last_page_count = Some(pages);
                page_count_changed = Some(pages);
            }
        }
        LayoutResult {
            size_changed,
            update_rect: update.filter(Rect::is_valid).unwrap_or(UNBOUNDED),
            lazy_pending: self.lazy_cursor.is_some(),
            page_count_changed,
        }
    }

    /// Drops layout data of blocks and frames no longer in the document.
    fn prune(&mut self, doc: &Document) {
        let mut live_blocks = FxHashSet::default();
        for_each_block(doc.items(), 0, &mut |block, _| {
            live_blocks.insert(block.id);
        });
        let mut live_frames = FxHashSet::default();
        live_frames.insert(doc.root_id);
        collect_frame_ids(doc.items(), &mut live_frames);

        self.blocks.retain(|id, _| live_blocks.contains(id));
        self.frames.retain(|id, _| live_frames.contains(id));
        for data in self.frames.values_mut() {
            data.floats.retain(|id| live_frames.contains(id));
        }
    }

    fn clear_block_layouts(&mut self, doc: &Document, change: ContentChange) {
        let last = change.from + change.added;
        let blocks = &mut self.blocks;
        for_each_block(doc.items(), 0, &mut |block, start| {
            if start <= last && start + block.len() > change.from {
                blocks.remove(&block.id);
            }
        });
    }

    /// A deletion can leave the lazy cursor past the end of the document.
    fn clamp_lazy_cursor(&mut self, length: usize) {
        if let Some(cursor) = self.lazy_cursor {
            if cursor >= length {
                self.checkpoints.retain(|cp| cp.position < length);
                self.lazy_cursor = Some(self.checkpoints.last().map_or(0, |cp| cp.position));
            }
        }
    }

    // ── Lazy driving ────────────────────────────────────────────────

    fn layout_step(&mut self, ctx: &mut LayoutContext<'_>) {
        let target = self.lazy_cursor.unwrap_or(0).saturating_add(self.step);
        log::trace!("lazy layout step to {target} (step {})", self.step);
        self.ensure_layouted_by_position(ctx, target);
        self.step = (self.step * 2).min(self.config.max_step);
    }

    /// Lays out the root flow until it covers document height `y`.
    pub fn ensure_layouted(&mut self, ctx: &mut LayoutContext<'_>, y: Fixed) {
        if self.lazy_cursor.is_none() {
            return;
        }
        if self.checkpoints.is_empty() {
            self.layout_step(ctx);
        }
        while self.lazy_cursor.is_some() && self.checkpoints.last().map_or(true, |cp| cp.y < y) {
            self.layout_step(ctx);
        }
    }

    /// Lays out the root flow until it covers document position `position`.
    pub fn ensure_layouted_by_position(&mut self, ctx: &mut LayoutContext<'_>, position: usize) {
        while let Some(cursor) = self.lazy_cursor {
            if cursor >= position {
                break;
            }
            self.do_layout(ctx, cursor, 0, TO_END - cursor);
            if self.lazy_cursor == Some(cursor) {
                log::warn!("lazy layout stalled at {cursor}; finishing synchronously");
                self.lazy_cursor = None;
                self.checkpoints.clear();
                let root = ctx.document.root_id;
                self.frame_mut(root).size_dirty = true;
                self.do_layout(ctx, 0, 0, TO_END);
            }
        }
    }

    pub fn ensure_layout_finished(&mut self, ctx: &mut LayoutContext<'_>) {
        self.ensure_layouted_by_position(ctx, TO_END);
        self.timer.stop();
    }

    pub fn is_layout_pending(&self) -> bool {
        self.lazy_cursor.is_some()
    }

    // ── Passes ──────────────────────────────────────────────────────

    fn do_layout(&mut self, ctx: &mut LayoutContext<'_>, from: usize, removed: usize, added: usize) -> Option<Rect> {
        let doc = ctx.document;
        let root = FrameRef::root(doc);
        self.mark_frames(&root, from, removed, added);

        let mut update = None;
        if self.frame_mut(root.id).size_dirty {
            update = Some(self.layout_frame(ctx, &root, from, from.saturating_add(added), Fixed::ZERO));
        }
        self.frame_mut(root.id).layout_dirty = false;

        if self.lazy_cursor.is_none() {
            self.timer.stop();
        }
        update
    }

    fn mark_frames(&mut self, frame: &FrameRef<'_>, from: usize, removed: usize, added: usize) {
        let end = from.saturating_add(removed.max(added));
        let first = frame.first_position;
        if first >= end || first + frame.content_len() <= from {
            return;
        }
        let data = self.frame_mut(frame.id);
        data.size_dirty = true;
        data.layout_dirty = true;
        for child in frame.children() {
            self.mark_frames(&child, from, removed, added);
        }
    }

    fn layout_frame(&mut self, ctx: &mut LayoutContext<'_>, frame: &FrameRef<'_>, from: usize, to: usize, parent_y: Fixed) -> Rect {
        let doc = ctx.document;
        let (max_width, max_height) = match frame.parent {
            Some(parent) => {
                let data = self.frame_mut(parent);
                (data.contents_width.to_f32().max(0.0), data.contents_height)
            }
            None => (doc.text_width.unwrap_or(0.0).max(0.0), None),
        };
        let width = Fixed::from_f32(frame.format.width.value(max_width));
        let height = match (frame.format.height, max_height) {
            (FrameLength::Fixed(h), _) => Some(Fixed::from_f32(h)),
            (FrameLength::Percentage(p), Some(max)) => Some(Fixed::from_f32(max.to_f32() * p / 100.0)),
            (FrameLength::Percentage(_), None) => None,
            (FrameLength::Auto, max) => max,
        };
        self.layout_frame_with_size(ctx, frame, from, to, width, height, parent_y)
    }

    #[allow(clippy::too_many_arguments)]
    fn layout_frame_with_size(
        &mut self,
        ctx: &mut LayoutContext<'_>,
        frame: &FrameRef<'_>,
        from: usize,
        to: usize,
        width: Fixed,
        height: Option<Fixed>,
        parent_y: Fixed,
    ) -> Rect {
        let doc = ctx.document;
        let format = frame.format;
        let inherited = frame.parent.map_or((Fixed::ZERO, Fixed::ZERO), |p| {
            let data = self.frame_mut(p);
            (data.effective_top_margin, data.effective_bottom_margin)
        });

        let data = self.frame_mut(frame.id);
        let mut full_layout = false;
        for (slot, value) in [
            (&mut data.top_margin, format.top_margin),
            (&mut data.bottom_margin, format.bottom_margin),
            (&mut data.left_margin, format.left_margin),
            (&mut data.right_margin, format.right_margin),
            (&mut data.border, format.border),
            (&mut data.padding, format.padding),
        ] {
            let value = Fixed::from_f32(value);
            if *slot != value {
                *slot = value;
                full_layout = true;
            }
        }
        data.parent = frame.parent;
        data.side = format.position;

        let decoration = data.decoration();
        data.effective_top_margin = inherited.0 + data.top_margin + decoration;
        data.effective_bottom_margin = inherited.1 + data.bottom_margin + decoration;

        let new_contents_width = width - decoration * 2 - data.left_margin - data.right_margin;
        data.contents_height = height.map(|h| h - decoration * 2 - data.top_margin - data.bottom_margin);
        data.contents_width = new_contents_width;
        if data.old_contents_width != new_contents_width {
            full_layout = true;
        }
        data.old_contents_width = new_contents_width;

        let frame_y = parent_y + data.position.y;
        let x_left = data.left_margin + decoration;
        let page_height = page_height_of(doc);
        let current_page = if page_height.is_max() { 0 } else { (frame_y / page_height).truncate() };
        let mut ls = LayoutStruct {
            frame: frame.id,
            x_left,
            x_right: x_left + new_contents_width,
            frame_y,
            y: data.top_margin + decoration,
            contents_width: Fixed::ZERO,
            minimum_width: Fixed::ZERO,
            maximum_width: Fixed::MAX,
            full_layout,
            page_height,
            page_bottom: page_height * (current_page + 1) - data.effective_bottom_margin,
            page_top_margin: data.effective_top_margin,
            page_bottom_margin: data.effective_bottom_margin,
            update_rect: UNBOUNDED,
            update_rect_for_floats: Rect::default(),
        };

        if frame.is_root() {
            self.ideal_width = 0.0;
        }

        self.layout_flow(ctx, frame, &mut ls, from, to);

        let max_child_width = frame
            .children()
            .filter_map(|child| self.frames.get(&child.id))
            .map(|child| child.size.width)
            .max()
            .unwrap_or(Fixed::ZERO);

        let data = self.frame_mut(frame.id);
        let margin_width = data.decoration() * 2 + data.left_margin + data.right_margin;
        let actual_width = new_contents_width.max(max_child_width.max(ls.contents_width));
        // non-positive contents width means an unwrapped layout
        data.contents_width = if new_contents_width <= Fixed::ZERO { new_contents_width } else { actual_width };
        data.minimum_width = ls.minimum_width;
        data.maximum_width = ls.maximum_width;
        data.size.height = match data.contents_height {
            Some(h) => h + data.decoration() * 2 + data.top_margin + data.bottom_margin,
            None => ls.y + data.decoration() + data.bottom_margin,
        };
        data.size.width = actual_width + margin_width;
        data.size_dirty = false;

        if frame.is_root() {
            self.ideal_width = (max_child_width.max(ls.contents_width) + margin_width).to_f32();
        }

        ls.update_rect.union(&ls.update_rect_for_floats)
    }

    fn layout_flow(&mut self, ctx: &mut LayoutContext<'_>, frame: &FrameRef<'_>, ls: &mut LayoutStruct, from: usize, to: usize) {
        let doc = ctx.document;
        let in_root = frame.is_root();
        let interval = Fixed::from_f32(self.config.checkpoint_interval);
        let mut start_index = 0;
        let mut previous: Option<&BlockFormat> = None;

        if in_root {
            let mut resumed = false;
            if !ls.full_layout && !self.checkpoints.is_empty() {
                let idx = self.checkpoints.partition_point(|cp| cp.position < from);
                if idx < self.checkpoints.len() {
                    let idx = idx.saturating_sub(1);
                    let cp = self.checkpoints[idx];
                    if let Some(item_index) = frame.item_index_at(cp.position) {
                        ls.y = cp.y;
                        ls.frame_y = cp.frame_y;
                        ls.minimum_width = cp.minimum_width;
                        ls.maximum_width = cp.maximum_width;
                        ls.contents_width = cp.contents_width;
                        ls.reset_page_bottom();
                        self.checkpoints.truncate(idx + 1);
                        start_index = item_index;
                        if let Some(FlowItem::Block(b)) = item_index.checked_sub(1).map(|i| &frame.items[i]) {
                            previous = Some(&b.format);
                        }
                        resumed = true;
                    }
                }
            }
            if !resumed {
                self.checkpoints.clear();
                self.checkpoints.push(CheckPoint {
                    y: ls.y,
                    frame_y: ls.frame_y,
                    position: 0,
                    minimum_width: ls.minimum_width,
                    maximum_width: ls.maximum_width,
                    contents_width: ls.contents_width,
                });
            }
        }

        let mut maximum_block_width = Fixed::ZERO;
        let mut finished = true;
        let mut doc_pos = frame.item_start(start_index);

        for item in &frame.items[start_index..] {
            if in_root {
                let last_y = self.checkpoints.last().map_or(Fixed::ZERO, |cp| cp.y);
                if (ls.y - last_y).abs() > interval {
                    let (left, right) = self.float_margins(ls.y, ls);
                    if left == ls.x_left && right == ls.x_right {
                        self.checkpoints.push(CheckPoint {
                            y: ls.y,
                            frame_y: ls.frame_y,
                            position: doc_pos,
                            minimum_width: ls.minimum_width,
                            maximum_width: ls.maximum_width,
                            contents_width: ls.contents_width,
                        });
                        if let Some(cursor) = self.lazy_cursor {
                            if doc_pos > cursor.saturating_add(self.step) {
                                finished = false;
                                break;
                            }
                        }
                    }
                }
            }

            match item {
                FlowItem::Frame(child) => {
                    let child = FrameRef::child(child, doc_pos, frame.id);
                    if child.format.is_float() {
                        self.layout_float(ctx, &child, ls, from, to);
                    } else {
                        self.layout_child_frame(ctx, &child, ls, from, to);
                    }
                    previous = None;
                }
                FlowItem::Block(block) => {
                    if block.format.page_break_before {
                        ls.new_page();
                    }
                    let outer_maximum = ls.maximum_width;
                    ls.maximum_width = Fixed::ZERO;
                    self.layout_block(ctx, block, doc_pos, ls, from, to, previous);
                    if block.format.page_break_after {
                        ls.new_page();
                    }
                    maximum_block_width = maximum_block_width.max(ls.maximum_width);
                    ls.maximum_width = outer_maximum;
                    previous = Some(&block.format);
                }
            }
            doc_pos += item.len();
        }

        if ls.maximum_width.is_max() && maximum_block_width > Fixed::ZERO {
            ls.maximum_width = maximum_block_width;
        } else {
            ls.maximum_width = ls.maximum_width.max(maximum_block_width);
        }

        if in_root {
            if finished {
                self.lazy_cursor = None;
                self.checkpoints.push(CheckPoint {
                    y: ls.y,
                    frame_y: ls.frame_y,
                    position: doc.character_count(),
                    minimum_width: ls.minimum_width,
                    maximum_width: ls.maximum_width,
                    contents_width: ls.contents_width,
                });
            } else {
                self.lazy_cursor = self.checkpoints.last().map(|cp| cp.position);
            }
        }
    }

    fn layout_child_frame(&mut self, ctx: &mut LayoutContext<'_>, child: &FrameRef<'_>, ls: &mut LayoutStruct, from: usize, to: usize) {
        let format = child.format;
        if format.page_break_before {
            ls.new_page();
        }

        let (left, right) = self.float_margins(ls.y, ls);
        let mut left = left.max(ls.x_left);
        let right = right.min(ls.x_right);
        let width = Fixed::from_f32(format.width.value((ls.x_right - ls.x_left).to_f32().max(0.0)));
        if right - left < width {
            ls.y = self.find_y(ls.y, ls, width);
            left = self.float_margins(ls.y, ls).0.max(ls.x_left);
        }

        let mut position = FixedPoint::new(left, ls.y);
        let paginated = ls.paginated();
        let data = self.frame_mut(child.id);
        data.position = position;
        if paginated {
            data.size_dirty = true;
        }
        if data.size_dirty {
            self.layout_frame(ctx, child, from, to, ls.frame_y);
            let first_child_y = self.first_child_y(child);
            if paginated && position.y + first_child_y + ls.frame_y > ls.page_bottom {
                ls.new_page();
                position.y = ls.y;
                let data = self.frame_mut(child.id);
                data.position = position;
                data.size_dirty = true;
                self.layout_frame(ctx, child, from, to, ls.frame_y);
            }
        }

        let data = self.frame_mut(child.id);
        data.position = position;
        data.layout_dirty = false;
        ls.y += data.size.height;
        ls.minimum_width = ls.minimum_width.max(data.minimum_width);
        ls.maximum_width = ls.maximum_width.min(data.maximum_width);
        ls.reset_page_bottom();

        if format.page_break_after {
            ls.new_page();
        }
    }

    fn layout_float(&mut self, ctx: &mut LayoutContext<'_>, child: &FrameRef<'_>, ls: &mut LayoutStruct, from: usize, to: usize) {
        let old_rect = self.frame_mut(child.id).rect();
        let mut update = None;
        if self.frame_mut(child.id).size_dirty {
            update = Some(self.layout_frame(ctx, child, from, to, Fixed::ZERO));
        }
        self.position_float(child.id, ls);

        let new_rect = self.frame_mut(child.id).rect();
        let update = match update {
            Some(rect) if new_rect == old_rect && rect.is_valid() => rect.translate(new_rect.x, new_rect.y),
            _ => new_rect,
        };
        ls.update_rect_for_floats = ls.update_rect_for_floats.union(&update);
        if old_rect.is_valid() {
            ls.update_rect_for_floats = ls.update_rect_for_floats.union(&old_rect);
        }
    }

    fn position_float(&mut self, id: FrameId, ls: &mut LayoutStruct) {
        let parent = self.frame_mut(ls.frame);
        if !parent.floats.contains(&id) {
            parent.floats.push(id);
        }
        let data = self.frame_mut(id);
        data.layout_dirty = true;
        let (size, side) = (data.size, data.side);
        let (minimum_width, maximum_width) = (data.minimum_width, data.maximum_width);

        let mut y = ls.y;
        if ls.paginated() {
            let spans_pages = y + ls.frame_y + size.height > ls.page_bottom;
            if spans_pages && size.height <= ls.page_height {
                ls.new_page();
                y = ls.y;
            }
        }
        y = self.find_y(y, ls, size.width);
        let (left, right) = self.float_margins(y, ls);
        let x = match side {
            FramePosition::FloatRight => right - size.width,
            _ => left,
        };

        let data = self.frame_mut(id);
        data.position = FixedPoint::new(x, y);
        data.layout_dirty = false;
        ls.minimum_width = ls.minimum_width.max(minimum_width);
        ls.maximum_width = ls.maximum_width.min(maximum_width);
    }

    /// Margins at `y` left free by the settled floats of the current frame.
    fn float_margins(&self, y: Fixed, ls: &LayoutStruct) -> (Fixed, Fixed) {
        let (mut left, mut right) = (ls.x_left, ls.x_right);
        for float in self.settled_floats_at(y, ls) {
            match float.side {
                FramePosition::FloatRight => right = right.min(float.position.x),
                _ => left = left.max(float.position.x + float.size.width),
            }
        }
        (left, right)
    }

    fn settled_floats_at<'s>(&'s self, y: Fixed, ls: &LayoutStruct) -> impl Iterator<Item = &'s FrameData> + 's {
        self.frames
            .get(&ls.frame)
            .map(|data| data.floats.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.frames.get(id))
            .filter(move |f| !f.layout_dirty && f.position.y <= y && f.position.y + f.size.height > y)
    }

    /// First y at or below `y` where `required` width is free.
    fn find_y(&self, mut y: Fixed, ls: &LayoutStruct, required: Fixed) -> Fixed {
        let required = required.min(ls.x_right - ls.x_left);
        loop {
            let (left, right) = self.float_margins(y, ls);
            if right - left >= required {
                return y;
            }
            let lowest = self
                .settled_floats_at(y, ls)
                .map(|f| f.position.y + f.size.height)
                .min();
            match lowest {
                Some(next) if next > y => y = next,
                _ => return y,
            }
        }
    }

    fn first_child_y(&self, frame: &FrameRef<'_>) -> Fixed {
        match frame.items.first() {
            None => Fixed::ZERO,
            Some(FlowItem::Frame(child)) => self.frames.get(&child.id).map_or(Fixed::ZERO, |d| d.position.y),
            Some(FlowItem::Block(block)) => self.blocks.get(&block.id).map_or(Fixed::ZERO, |layout| {
                layout.position.y + layout.lines.first().map_or(Fixed::ZERO, |l| l.y)
            }),
        }
    }

    // ── Blocks ──────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    fn layout_block(
        &mut self,
        ctx: &mut LayoutContext<'_>,
        block: &Block,
        block_pos: usize,
        ls: &mut LayoutStruct,
        from: usize,
        to: usize,
        previous: Option<&BlockFormat>,
    ) {
        let doc = ctx.document;
        let format = &block.format;
        if let Some(previous) = previous {
            let margin = format.top_margin.max(previous.bottom_margin);
            if margin > 0.0 {
                ls.y += Fixed::from_f32(margin);
            }
        }

        let rtl = format.direction == Direction::RightToLeft;
        let indent = Fixed::from_f32(format.indent as f32 * doc.indent_width);
        let total_left = Fixed::from_f32(format.left_margin) + if rtl { Fixed::ZERO } else { indent };
        let total_right = Fixed::from_f32(format.right_margin) + if rtl { indent } else { Fixed::ZERO };
        let block_len = block.len();

        let existing_height = self
            .blocks
            .get(&block.id)
            .map(|layout| Fixed::from_f32(layout.bounding_rect().height));
        let needs_full = match existing_height {
            None => true,
            Some(height) => {
                ls.full_layout
                    || (block_pos + block_len > from && block_pos <= to)
                    || (ls.paginated() && ls.absolute_y() + height > ls.page_bottom)
            }
        };

        let layout = match self.blocks.remove(&block.id) {
            Some(layout) if !needs_full => self.reposition_block(layout, block, block_pos, ls, from, to, total_right),
            _ => self.layout_block_lines(ctx, block, block_pos, ls, total_left, total_right, rtl),
        };

        let margins = total_left + total_right;
        ls.minimum_width = ls.minimum_width.max(Fixed::from_f32(layout.shaped.minimum_width) + margins);
        let maximum = Fixed::from_f32(layout.shaped.maximum_width) + margins;
        if maximum > Fixed::ZERO {
            ls.maximum_width = if ls.maximum_width.is_max() { maximum } else { ls.maximum_width.max(maximum) };
        }
        self.blocks.insert(block.id, layout);
    }

    #[allow(clippy::too_many_arguments)]
    fn layout_block_lines(
        &mut self,
        ctx: &mut LayoutContext<'_>,
        block: &Block,
        block_pos: usize,
        ls: &mut LayoutStruct,
        total_left: Fixed,
        total_right: Fixed,
        rtl: bool,
    ) -> BlockLayout {
        let doc = ctx.document;
        let format = &block.format;
        let wrap_mode = if format.non_breakable_lines || doc.text_width.is_none() {
            WrapMode::NoWrap
        } else {
            doc.wrap_mode
        };
        let shaped = ShapedBlock::shape(block, block_pos, doc, ctx.measurer, ctx.objects);

        let origin = FixedPoint::new(ls.x_left, ls.y);
        let l = ls.x_left + total_left;
        let r = ls.x_right - total_right;
        let text_indent = Fixed::from_f32(format.text_indent);

        let mut lines = Vec::new();
        let mut bottom = Fixed::ZERO;
        let mut next = Some(0);
        while let Some(start) = next {
            let indent = if start == 0 { text_indent } else { Fixed::ZERO };
            let (mut left, mut right) = self.line_bounds(ls.y, ls, l, r, indent, rtl);
            let mut width = (right - left).max(Fixed::ZERO);
            let mut span = shaped.break_line(start, Some(width.to_f32()), wrap_mode);

            let natural = Fixed::from_f32(span.natural_width);
            if natural > right - left {
                // too wide even when wrapped: move past floats and let it overflow
                let relaxed = match wrap_mode {
                    WrapMode::WrapAtWordBoundaryOrAnywhere => WrapMode::WrapAnywhere,
                    other => other,
                };
                ls.y = self.find_y(ls.y, ls, natural);
                (left, right) = self.line_bounds(ls.y, ls, l, r, indent, rtl);
                width = natural.max(right - left);
                span = shaped.break_line(start, Some(width.to_f32()), relaxed);
            }

            let advance = LineAdvance::new(&format.line_height, span.ascent, span.descent, span.leading);
            while ls.paginated()
                && ls.absolute_y() + advance.break_height > ls.page_bottom
                && ls.content_height() >= advance.break_height
            {
                ls.new_page();
                left = self.line_bounds(ls.y, ls, l, r, indent, rtl).0;
            }

            let x = left - ls.x_left;
            lines.push(LineLayout {
                start: span.start,
                end: span.end,
                x,
                y: ls.y - origin.y - advance.adjustment,
                width: width.max(Fixed::ZERO),
                natural_width: span.natural_width,
                ascent: span.ascent,
                descent: span.descent,
                leading: span.leading,
            });
            ls.contents_width = ls.contents_width.max(x + Fixed::from_f32(span.natural_width) + total_right);
            bottom = ls.y + advance.line_bottom;
            ls.y += advance.line_height;
            next = span.next;
        }
        ls.y = ls.y.max(bottom);

        BlockLayout {
            position: origin,
            lines,
            shaped,
        }
    }

    /// Moves an up-to-date block to the current flow position.
    #[allow(clippy::too_many_arguments)]
    fn reposition_block(
        &self,
        mut layout: BlockLayout,
        block: &Block,
        block_pos: usize,
        ls: &mut LayoutStruct,
        from: usize,
        to: usize,
        total_right: Fixed,
    ) -> BlockLayout {
        let old_position = layout.position;
        layout.position = FixedPoint::new(ls.x_left, ls.y);
        let mut bottom = Fixed::ZERO;
        for line in layout.lines.iter_mut() {
            ls.contents_width = ls.contents_width.max(line.x + Fixed::from_f32(line.natural_width) + total_right);
            let advance = LineAdvance::for_line(&block.format.line_height, line);
            if ls.paginated() {
                if ls.absolute_y() + advance.break_height > ls.page_bottom {
                    ls.new_page();
                }
                line.y = ls.y - advance.adjustment - layout.position.y;
            }
            bottom = ls.y + advance.line_bottom;
            ls.y += advance.line_height;
        }
        ls.y = ls.y.max(bottom);

        let block_len = block.len();
        if ls.update_rect.is_valid() && block_len > 1 {
            let rect = &mut ls.update_rect;
            if from >= block_pos + block_len {
                let top = rect.y.max(ls.y.to_f32());
                rect.height = rect.bottom() - top;
                rect.y = top;
            } else if to < block_pos {
                if old_position == layout.position {
                    rect.height = rect.height.min(layout.position.y.to_f32() - rect.y);
                } else {
                    rect.height = UNBOUNDED.height - rect.y;
                }
            }
        }
        layout
    }

    fn line_bounds(&self, y: Fixed, ls: &LayoutStruct, l: Fixed, r: Fixed, indent: Fixed, rtl: bool) -> (Fixed, Fixed) {
        let (left, right) = self.float_margins(y, ls);
        let (mut left, mut right) = (left.max(l), right.min(r));
        if rtl {
            right -= indent;
        } else {
            left += indent;
        }
        (left, right)
    }

    // ── Queries ─────────────────────────────────────────────────────

    /// Size of the root frame as laid out so far.
    pub fn dynamic_document_size(&self, doc: &Document) -> Size {
        self.frames.get(&doc.root_id).map_or(Size::default(), |data| {
            Size::new(data.size.width.to_f32(), data.size.height.to_f32())
        })
    }

    /// Size of the root frame after finishing layout.
    pub fn document_size(&mut self, ctx: &mut LayoutContext<'_>) -> Size {
        self.ensure_layout_finished(ctx);
        self.dynamic_document_size(ctx.document)
    }

    pub fn dynamic_page_count(&self, doc: &Document) -> usize {
        match doc.effective_page_height() {
            None => 1,
            Some(page_height) => {
                let height = self.dynamic_document_size(doc).height;
                ((height / page_height).ceil() as usize).max(1)
            }
        }
    }

    pub fn page_count(&mut self, ctx: &mut LayoutContext<'_>) -> usize {
        self.ensure_layout_finished(ctx);
        self.dynamic_page_count(ctx.document)
    }

    /// Width the document would need to avoid wrapping any line beyond what
    /// the current width forces.
    pub fn ideal_width(&mut self, ctx: &mut LayoutContext<'_>) -> f32 {
        self.ensure_layout_finished(ctx);
        self.ideal_width
    }

    /// Sum of frame positions up the parent chain.
    pub(crate) fn frame_origin(&self, id: FrameId) -> (Fixed, Fixed) {
        let (mut x, mut y) = (Fixed::ZERO, Fixed::ZERO);
        let mut current = Some(id);
        while let Some(frame) = current {
            let Some(data) = self.frames.get(&frame) else {
                break;
            };
            x += data.position.x;
            y += data.position.y;
            current = data.parent;
        }
        (x, y)
    }

    pub(crate) fn frame_bounding_rect_internal(&self, id: FrameId) -> Option<Rect> {
        let data = self.frames.get(&id)?;
        let (x, y) = self.frame_origin(id);
        Some(Rect::new(x.to_f32(), y.to_f32(), data.size.width.to_f32(), data.size.height.to_f32()))
    }

    /// Frame bounds in document coordinates.
    pub fn frame_bounding_rect(&mut self, ctx: &mut LayoutContext<'_>, id: FrameId) -> Option<Rect> {
        self.ensure_layout_finished(ctx);
        self.frame_bounding_rect_internal(id)
    }

    /// Block bounds in document coordinates.
    pub fn block_bounding_rect(&mut self, ctx: &mut LayoutContext<'_>, id: BlockId) -> Option<Rect> {
        let doc = ctx.document;
        let (start, len, frame) = locate_block(doc.items(), 0, doc.root_id, id)?;
        self.ensure_layouted_by_position(ctx, start + len);
        let layout = self.blocks.get(&id)?;
        let (fx, fy) = self.frame_origin(frame);
        let rect = layout.bounding_rect();
        Some(Rect::new(
            (fx + layout.position.x).to_f32() + rect.x,
            (fy + layout.position.y).to_f32() + rect.y,
            rect.width,
            rect.height,
        ))
    }

    pub fn block_layout(&self, id: BlockId) -> Option<&BlockLayout> {
        self.blocks.get(&id)
    }

    pub fn checkpoints(&self) -> &[CheckPoint] {
        &self.checkpoints
    }

    /// Cursor positioning is not supported; the layout is read-only.
    pub fn hit_test(&self, _point: Point) -> Option<usize> {
        None
    }

    /// Index of the root item to start drawing from for a clip starting at
    /// `y`.
    pub(crate) fn root_item_for_y(&self, root: &FrameRef<'_>, y: f32) -> usize {
        let height = self.frames.get(&root.id).map_or(Fixed::ZERO, |d| d.size.height);
        let y = Fixed::from_f32(y);
        if self.checkpoints.is_empty() || y < Fixed::ZERO || y > height {
            return 0;
        }
        let idx = self.checkpoints.partition_point(|cp| cp.y < y);
        if idx == self.checkpoints.len() {
            return 0;
        }
        let cp = self.checkpoints[idx.saturating_sub(1)];
        root.item_index_at(cp.position).unwrap_or(0)
    }
}
