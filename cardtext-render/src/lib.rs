//! # cardtext-render
//!
//! Software rasterization and the self-fitting text item.
//!
//! ## Architecture
//!
//! ```text
//!  markup ──► TextItem ── Document + FlowLayout + fit_to_rect
//!                 │
//!                 ▼
//!           RenderCache ── outline pass, fill pass
//!                 │
//!                 ▼
//!             Canvas (Painter over a vello_cpu RenderContext)
//! ```
//!
//! ## Crate modules
//!
//! - [`canvas`]: anti-aliased fills, strokes and bitmap blits
//! - [`cache`]: bitmap cache of a laid-out document
//! - [`item`]: the card text box
//! - [`presets`]: per-role fonts and colors
//! - [`assets`]: symbol bitmap loading

pub mod assets;
pub mod cache;
pub mod canvas;
pub mod item;
pub mod presets;

pub use assets::{load_file, missing_assets, AssetError, LoadAssets};
pub use cache::{CacheStats, RenderCache};
pub use canvas::Canvas;
pub use item::TextItem;
pub use presets::{CardRole, RolePreset};
