//! Block shaping and greedy line breaking.
//!
//! A block is flattened into one [`Unit`] per document position: a
//! character with its styled advance, or an inline object with the size its
//! handler reports. Break opportunities come from the Unicode line breaking
//! algorithm, so U+2060 glues its neighbours and U+FFFC placeholders break
//! like ideographic objects.

use cardtext_core::document::{Block, Document, Run, WrapMode, LINE_SEPARATOR, OBJECT_REPLACEMENT};
use cardtext_text::{FontMetrics, TextMeasurer};
use unicode_linebreak::{linebreaks, BreakOpportunity};

use crate::objects::{ObjectContext, ObjectRegistry};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BreakAfter {
    #[default]
    Never,
    Allowed,
    Mandatory,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Unit {
    pub ch: char,
    /// Index of the run this unit belongs to.
    pub run: usize,
    pub advance: f32,
    pub ascent: f32,
    pub descent: f32,
    pub leading: f32,
    pub is_object: bool,
    pub is_space: bool,
    pub break_after: BreakAfter,
}

impl Unit {
    fn is_hard_break(&self) -> bool {
        is_hard_break(self.ch)
    }

    /// Units that do not count toward the natural width at a line end.
    fn hangs(&self) -> bool {
        self.is_space || self.is_hard_break()
    }
}

fn is_hard_break(ch: char) -> bool {
    matches!(ch, LINE_SEPARATOR | '\n' | '\r' | '\u{000B}' | '\u{000C}' | '\u{0085}')
}

/// One line produced by [`ShapedBlock::break_line`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LineSpan {
    pub start: usize,
    /// Exclusive; includes hanging whitespace and the hard break, if any.
    pub end: usize,
    pub natural_width: f32,
    pub ascent: f32,
    pub descent: f32,
    pub leading: f32,
    /// Start of the following line, `None` once the block is exhausted.
    pub next: Option<usize>,
}

/// Consecutive units drawn together: a text span of one run, or one object.
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub run: usize,
    pub start: usize,
    pub end: usize,
    /// Offset from the line start.
    pub x: f32,
    pub is_object: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ShapedBlock {
    pub units: Vec<Unit>,
    /// Metrics of a line that holds no units.
    pub empty_metrics: FontMetrics,
    /// Widest unbreakable segment.
    pub minimum_width: f32,
    /// Widest line when only hard breaks apply.
    pub maximum_width: f32,
}

impl ShapedBlock {
    pub fn shape(
        block: &Block,
        block_position: usize,
        document: &Document,
        measurer: &mut dyn TextMeasurer,
        objects: &ObjectRegistry,
    ) -> Self {
        let text = block.text();
        let starts: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        let mut breaks = vec![BreakAfter::Never; starts.len()];
        for (byte, opportunity) in linebreaks(&text) {
            let idx = starts.partition_point(|&s| s < byte);
            if idx == 0 {
                continue;
            }
            breaks[idx - 1] = match opportunity {
                BreakOpportunity::Mandatory => BreakAfter::Mandatory,
                BreakOpportunity::Allowed => BreakAfter::Allowed,
            };
        }

        let mut units = Vec::with_capacity(starts.len());
        let mut empty_metrics = measurer.metrics(&document.default_font);
        for (run_index, run) in block.runs.iter().enumerate() {
            match run {
                Run::Text(t) => {
                    let font = t.format.resolve_font(&document.default_font);
                    let fm = measurer.metrics(&font);
                    empty_metrics = fm;
                    for ch in t.text.chars() {
                        let hard = is_hard_break(ch);
                        units.push(Unit {
                            ch,
                            run: run_index,
                            advance: if hard { 0.0 } else { measurer.styled_advance(&font, ch) },
                            ascent: fm.ascent,
                            descent: fm.descent,
                            leading: fm.leading,
                            is_object: false,
                            is_space: ch.is_whitespace() && !hard,
                            break_after: BreakAfter::Never,
                        });
                    }
                }
                Run::Object(placeholder) => {
                    let ctx = ObjectContext {
                        document,
                        position: block_position + units.len(),
                        placeholder,
                        format: &placeholder.format,
                    };
                    let om = objects.metrics(measurer, &ctx);
                    units.push(Unit {
                        ch: OBJECT_REPLACEMENT,
                        run: run_index,
                        advance: om.width,
                        ascent: om.ascent,
                        descent: om.descent,
                        leading: 0.0,
                        is_object: true,
                        is_space: false,
                        break_after: BreakAfter::Never,
                    });
                }
            }
        }
        for (unit, brk) in units.iter_mut().zip(breaks) {
            unit.break_after = brk;
        }
        // end of text is reported as mandatory; only real separators are
        if let Some(last) = units.last_mut() {
            if last.break_after == BreakAfter::Mandatory && !last.is_hard_break() {
                last.break_after = BreakAfter::Allowed;
            }
        }

        let mut shaped = Self {
            units,
            empty_metrics,
            minimum_width: 0.0,
            maximum_width: 0.0,
        };
        shaped.minimum_width = shaped.widest_segment(|b| b != BreakAfter::Never);
        shaped.maximum_width = shaped.widest_segment(|b| b == BreakAfter::Mandatory);
        shaped
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    fn widest_segment(&self, splits: impl Fn(BreakAfter) -> bool) -> f32 {
        let (mut widest, mut width, mut hanging) = (0.0f32, 0.0f32, 0.0f32);
        for unit in &self.units {
            if unit.hangs() {
                hanging += unit.advance;
            } else {
                width += hanging + unit.advance;
                hanging = 0.0;
            }
            if splits(unit.break_after) {
                widest = widest.max(width);
                width = 0.0;
                hanging = 0.0;
            }
        }
        widest.max(width)
    }

    /// Lays out one line starting at unit `start`. `width` is ignored in
    /// [`WrapMode::NoWrap`]; a line always takes at least one unit.
    pub fn break_line(&self, start: usize, width: Option<f32>, mode: WrapMode) -> LineSpan {
        let n = self.units.len();
        let limit = width.filter(|_| mode != WrapMode::NoWrap);
        let mut x = 0.0f32;
        let mut last_break: Option<usize> = None;
        let mut overflowing = false;
        let mut end = n;

        let mut i = start;
        while i < n {
            let unit = &self.units[i];
            if let Some(limit) = limit {
                if !overflowing && !unit.is_space && unit.advance > 0.0 && i > start && x + unit.advance > limit {
                    match (mode, last_break) {
                        (WrapMode::WrapAnywhere, _) => {
                            end = i;
                            break;
                        }
                        (_, Some(b)) => {
                            end = b;
                            break;
                        }
                        (WrapMode::WrapAtWordBoundaryOrAnywhere, None) => {
                            end = i;
                            break;
                        }
                        _ => overflowing = true,
                    }
                }
            }
            x += unit.advance;
            match unit.break_after {
                BreakAfter::Mandatory => {
                    end = i + 1;
                    break;
                }
                BreakAfter::Allowed if overflowing => {
                    end = i + 1;
                    break;
                }
                BreakAfter::Allowed => last_break = Some(i + 1),
                BreakAfter::Never => {}
            }
            i += 1;
        }

        let mut visible_end = end;
        while visible_end > start && self.units[visible_end - 1].hangs() {
            visible_end -= 1;
        }
        let natural_width = self.units[start.min(n)..visible_end.max(start.min(n))]
            .iter()
            .map(|u| u.advance)
            .sum();

        let (ascent, descent, leading) = if end > start {
            self.units[start..end].iter().fold((f32::MIN, f32::MIN, f32::MIN), |(a, d, l), u| {
                (a.max(u.ascent), d.max(u.descent), l.max(u.leading))
            })
        } else {
            let fm = self.empty_metrics;
            (fm.ascent, fm.descent, fm.leading)
        };

        let ends_with_separator = end > start && self.units[end - 1].is_hard_break();
        let next = if end < n || (end == n && ends_with_separator) {
            Some(end)
        } else {
            None
        };

        LineSpan {
            start,
            end,
            natural_width,
            ascent,
            descent,
            leading,
            next,
        }
    }

    /// Drawing segments of the units in `start..end`.
    pub fn segments(&self, start: usize, end: usize) -> Vec<Segment> {
        let mut out: Vec<Segment> = Vec::new();
        let mut x = 0.0f32;
        for (i, unit) in self.units.iter().enumerate().take(end).skip(start) {
            let extend = matches!(out.last(), Some(s) if !s.is_object && !unit.is_object && s.run == unit.run);
            if extend {
                if let Some(last) = out.last_mut() {
                    last.end = i + 1;
                }
            } else {
                out.push(Segment {
                    run: unit.run,
                    start: i,
                    end: i + 1,
                    x,
                    is_object: unit.is_object,
                });
            }
            x += unit.advance;
        }
        out
    }

    pub fn text(&self, start: usize, end: usize) -> String {
        self.units[start.min(self.units.len())..end.min(self.units.len())]
            .iter()
            .map(|u| u.ch)
            .collect()
    }
}
