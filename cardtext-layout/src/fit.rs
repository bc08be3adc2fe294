//! Auto-fit: shrink typography until the laid-out document fits a target
//! rectangle.
//!
//! Three knobs are turned one step at a time, in the order the
//! [`FitPolicy`] names, relaying out after each step:
//!
//! ```text
//!   letter spacing   100 ─5─► … ─► 90
//!   stretch          100 ─3─► … ─► ≤ 87
//!   point size        32 ─2─► … ─► minimum
//! ```
//!
//! The loop ends as soon as the document fits or every knob is at its floor.

use cardtext_core::document::Document;
use cardtext_core::font::{FontSpec, FontStretch};
use cardtext_core::geometry::{Rect, Size};
use cardtext_text::TextMeasurer;
use serde::{Deserialize, Serialize};

use crate::flow::{FlowLayout, LayoutContext};
use crate::objects::ObjectRegistry;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Knob {
    Spacing,
    Stretch,
    Size,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FitPolicy {
    /// Headlines: keep the size as long as possible.
    #[default]
    SpacingStretchSize,
    /// Running text: shrink the size first.
    SizeSpacingStretch,
    SizeStretchSpacing,
}

impl FitPolicy {
    pub const fn order(self) -> [Knob; 3] {
        match self {
            FitPolicy::SpacingStretchSize => [Knob::Spacing, Knob::Stretch, Knob::Size],
            FitPolicy::SizeSpacingStretch => [Knob::Size, Knob::Spacing, Knob::Stretch],
            FitPolicy::SizeStretchSpacing => [Knob::Size, Knob::Stretch, Knob::Spacing],
        }
    }
}

/// Floors and step sizes of the three knobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    /// Spacing is reduced while above this percentage.
    pub spacing_floor: i32,
    pub spacing_step: i32,
    /// Stretch is reduced while above this percentage.
    pub stretch_floor: i32,
    pub stretch_step: i32,
    pub size_step: i32,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            spacing_floor: 90,
            spacing_step: 5,
            stretch_floor: FontStretch::SemiCondensed.percent(),
            stretch_step: 3,
            size_step: 2,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FitState {
    pub point_size: i32,
    pub letter_spacing: i32,
    pub stretch: i32,
    pub minimum_point_size: i32,
}

impl FitState {
    pub fn from_font(font: &FontSpec, minimum_point_size: i32) -> Self {
        Self {
            point_size: font.point_size,
            letter_spacing: font.letter_spacing,
            stretch: font.stretch,
            minimum_point_size: minimum_point_size.max(1),
        }
    }

    /// `base` with this state's knobs.
    pub fn apply(&self, base: &FontSpec) -> FontSpec {
        FontSpec {
            point_size: self.point_size,
            letter_spacing: self.letter_spacing,
            stretch: self.stretch,
            ..base.clone()
        }
    }

    /// Turns the first knob in `policy` order that is still above its
    /// floor. `None` once all three are exhausted.
    pub fn shrink(&mut self, policy: FitPolicy, config: &FitConfig) -> Option<Knob> {
        for knob in policy.order() {
            match knob {
                Knob::Spacing if self.letter_spacing > config.spacing_floor => {
                    self.letter_spacing -= config.spacing_step.max(1);
                }
                Knob::Stretch if self.stretch > config.stretch_floor => {
                    self.stretch -= config.stretch_step.max(1);
                }
                Knob::Size if self.point_size > self.minimum_point_size => {
                    self.point_size = (self.point_size - config.size_step.max(1)).max(self.minimum_point_size);
                }
                _ => continue,
            }
            return Some(knob);
        }
        None
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FitRequest {
    pub base_font: FontSpec,
    pub target: Rect,
    pub policy: FitPolicy,
    pub minimum_point_size: i32,
    /// Point size of the previous fit. With an invalid target the block
    /// margins are only reset when the base size differs from it.
    pub previous_point_size: i32,
    pub config: FitConfig,
}

impl FitRequest {
    pub fn new(base_font: FontSpec, target: Rect) -> Self {
        Self {
            previous_point_size: base_font.point_size,
            base_font,
            target,
            policy: FitPolicy::default(),
            minimum_point_size: 9,
            config: FitConfig::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FitOutcome {
    pub state: FitState,
    /// Knobs turned, in order.
    pub steps: Vec<Knob>,
    /// Document size after the last layout.
    pub size: Size,
    pub fits: bool,
    pub size_changed: bool,
}

fn exceeds(size: Size, target: Rect) -> bool {
    size.width > target.width || size.height > target.height
}

/// Block margins that go with a point size.
pub fn block_margin(point_size: i32) -> f32 {
    (point_size / 2) as f32
}

/// Lays `document` out at `font`. With `sync_margins` the block margins
/// are set from the point size first, so the measured box is the final one.
fn relayout(
    document: &mut Document,
    layout: &mut FlowLayout,
    measurer: &mut dyn TextMeasurer,
    objects: &ObjectRegistry,
    font: FontSpec,
    sync_margins: bool,
) -> Size {
    if sync_margins {
        let margin = block_margin(font.point_size);
        document.set_block_margins(margin, margin);
    }
    let change = document.set_default_font(font);
    let mut ctx = LayoutContext::new(document, measurer, objects);
    layout.document_changed(&mut ctx, change);
    layout.document_size(&mut ctx)
}

/// Resets `document` to the base font and shrinks it until its laid-out
/// size fits `request.target`. Block margins track the point size on every
/// step. An invalid target leaves the base size.
pub fn fit_to_rect(
    document: &mut Document,
    layout: &mut FlowLayout,
    measurer: &mut dyn TextMeasurer,
    objects: &ObjectRegistry,
    request: &FitRequest,
) -> FitOutcome {
    let base = &request.base_font;
    let mut state = FitState::from_font(base, request.minimum_point_size);
    let valid = request.target.is_valid();
    let sync_margins = valid || base.point_size != request.previous_point_size;
    let mut size = relayout(document, layout, measurer, objects, base.clone(), sync_margins);
    let mut steps = Vec::new();

    if valid {
        while exceeds(size, request.target) {
            let Some(knob) = state.shrink(request.policy, &request.config) else {
                break;
            };
            steps.push(knob);
            size = relayout(document, layout, measurer, objects, state.apply(base), true);
            log::debug!(
                "fit step {:?}: size {} spacing {} stretch {} -> {}x{}",
                knob,
                state.point_size,
                state.letter_spacing,
                state.stretch,
                size.width,
                size.height
            );
        }
    }

    let size_changed = state.point_size != request.previous_point_size;
    let fits = valid && !exceeds(size, request.target);
    log::debug!(
        "fit done: size {} (base {}) spacing {} stretch {} in {} steps, fits: {}",
        state.point_size,
        base.point_size,
        state.letter_spacing,
        state.stretch,
        steps.len(),
        fits
    );
    FitOutcome {
        state,
        steps,
        size,
        fits,
        size_changed,
    }
}
