//! # cardtext-text
//!
//! Font measurement for the card text layout engine. Layout asks a
//! [`TextMeasurer`] for metrics, advances and glyph outlines; it never
//! touches a font stack directly.
//!
//! ## Architecture
//!
//! ```text
//! FontSpec (family chain, size, weight, spacing %, stretch %)
//!     │
//!     ▼
//! TextMeasurer ──► FontMetrics { ascent, descent, leading, x_height }
//!     │        ──► advance(ch) × stretch × spacing
//!     │        ──► glyph_outline(ch) → kurbo::BezPath
//!     ├── TableMeasurer   (static em tables, no font files)
//!     └── CosmicMeasurer  (cosmic-text FontSystem + SwashCache + LRU)
//! ```
//!
//! - **`metrics`**: the measuring trait and shared helpers.
//! - **`table`**: deterministic measurer used by tests and headless runs.
//! - **`cosmic`**: system-font measurer.

pub mod cosmic;
pub mod metrics;
pub mod table;

pub use cardtext_core::font::{FontSpec, FontStretch};
pub use cosmic::{CosmicMeasurer, FontError};
pub use metrics::{is_zero_width, FontMetrics, TextMeasurer};
pub use table::TableMeasurer;
