//! # cardtext-layout
//!
//! Flow layout, painting and auto-fit for card text documents.
//!
//! ## Architecture
//!
//! ```text
//! Document ──► ShapedBlock (units, break opportunities)
//!     │              │
//!     │              ▼
//!     └──────► FlowLayout ── frames, floats, pages, checkpoints
//!                    │   └── LayoutTimer (lazy steps, driven by poll)
//!                    ├──► draw(Painter, DrawOptions)
//!                    └──► fit_to_rect (spacing / stretch / size)
//! ```
//!
//! - **`objects`**: inline object handlers (keyword badge, symbol icon).
//! - **`line`**: per-block shaping and greedy line breaking.
//! - **`block`**: positioned lines and line-height policies.
//! - **`flow`**: the incremental, lazily stepped frame layout.
//! - **`draw`**: painting through the [`cardtext_core::Painter`] trait.
//! - **`fit`**: the auto-fit controller.

pub mod block;
pub mod draw;
pub mod fit;
pub mod flow;
pub mod line;
pub mod objects;

pub use block::{BlockLayout, LineLayout};
pub use draw::{DrawOptions, OutlineMode};
pub use fit::{block_margin, fit_to_rect, FitConfig, FitOutcome, FitPolicy, FitRequest, FitState, Knob};
pub use flow::{CheckPoint, FlowLayout, LayoutConfig, LayoutContext, LayoutResult, LayoutTimer, UNBOUNDED};
pub use line::{BreakAfter, ShapedBlock};
pub use objects::{InlineObject, KeywordBadge, ObjectContext, ObjectRegistry, SymbolAssets, SymbolIcon};
