//! Render job description, read from JSON.
//!
//! ```json
//! {
//!   "width": 1466, "height": 2048,
//!   "asset_dir": "assets/symbols",
//!   "output": "card.png",
//!   "boxes": [
//!     { "role": "name", "target": { "x": 180, "y": 90, "width": 1100, "height": 120 },
//!       "paragraphs": ["Weather Change: Rain"] },
//!     { "role": "abilities", "target": { "x": 120, "y": 1350, "width": 1220, "height": 480 },
//!       "paragraphs": ["[Enter] Produce [w][w].", "[rest]: Draw a card."] }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use cardtext_core::document::Alignment;
use cardtext_core::font::FontSpec;
use cardtext_core::geometry::{Color, Pen, Rect};
use cardtext_layout::{FitConfig, FitPolicy};
use cardtext_render::{CardRole, RolePreset, TextItem};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RenderJob {
    pub width: u32,
    pub height: u32,
    #[serde(default = "transparent")]
    pub background: Color,
    /// Directory of `<asset-name>.png` symbol bitmaps.
    #[serde(default)]
    pub asset_dir: Option<PathBuf>,
    /// Extra font files registered before measuring.
    #[serde(default)]
    pub font_files: Vec<PathBuf>,
    pub output: PathBuf,
    pub boxes: Vec<TextBox>,
}

fn transparent() -> Color {
    Color::TRANSPARENT
}

/// One fitted text box. Fields left out fall back to the role preset, or
/// to the item defaults when no role is given.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextBox {
    pub role: Option<CardRole>,
    pub font: Option<FontSpec>,
    pub policy: Option<FitPolicy>,
    pub fit: Option<FitConfig>,
    pub minimum_point_size: Option<i32>,
    pub alignment: Option<Alignment>,
    pub color: Option<Color>,
    pub outline: Option<Pen>,
    pub cost_font: Option<String>,
    /// Extra `[word]` → asset replacements.
    pub replacements: BTreeMap<String, String>,
    pub target: Rect,
    /// Each entry becomes one paragraph.
    pub paragraphs: Vec<String>,
}

impl TextBox {
    /// The role preset with this box's overrides on top.
    pub fn preset(&self) -> RolePreset {
        let mut preset = self.role.map(CardRole::preset).unwrap_or_default();
        if let Some(font) = &self.font {
            preset.font = font.clone();
        }
        if let Some(policy) = self.policy {
            preset.policy = policy;
        }
        if let Some(alignment) = self.alignment {
            preset.alignment = alignment;
        }
        if let Some(color) = self.color {
            preset.text_color = color;
        }
        if let Some(pen) = self.outline {
            preset.outline = Some(pen);
            preset.show_outline = true;
        }
        preset
    }

    /// Styles `item`, fills in the paragraphs and fits them to the target.
    pub fn configure(&self, item: &mut TextItem) {
        for (word, asset) in &self.replacements {
            item.add_replacement(word, asset);
        }
        if let Some(config) = self.fit {
            item.set_fit_config(config);
        }
        if let Some(family) = &self.cost_font {
            item.set_cost_font(family);
        }
        self.preset().apply(item);
        if let Some(min) = self.minimum_point_size {
            item.set_minimum_point_size(min);
        }
        for paragraph in &self.paragraphs {
            item.insert_text_block(paragraph);
        }
        item.set_target_rect(self.target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardtext_layout::SymbolAssets;
    use cardtext_text::TableMeasurer;

    const JOB: &str = r#"{
        "width": 600, "height": 800,
        "output": "out.png",
        "boxes": [
            { "role": "name", "target": { "x": 20, "y": 20, "width": 560, "height": 80 },
              "paragraphs": ["Weather Change"] },
            { "font": { "family": "Georgia", "point_size": 30 }, "policy": "SizeStretchSpacing",
              "alignment": "Right", "minimum_point_size": 12,
              "replacements": { "sun": "attribute-light" },
              "target": { "x": 20, "y": 400, "width": 560, "height": 300 },
              "paragraphs": ["[sun] Draw a card.", "[1]: Rest."] }
        ]
    }"#;

    #[test]
    fn test_parse_job() {
        let job: RenderJob = serde_json::from_str(JOB).unwrap();
        assert_eq!((job.width, job.height), (600, 800));
        assert_eq!(job.background, Color::TRANSPARENT);
        assert_eq!(job.asset_dir, None);
        assert_eq!(job.boxes.len(), 2);
        assert_eq!(job.boxes[0].role, Some(CardRole::Name));
        let font = job.boxes[1].font.as_ref().unwrap();
        assert_eq!(font.letter_spacing, 100);
        assert_eq!(font.weight, 400);
    }

    #[test]
    fn test_overrides_beat_role() {
        let text_box = TextBox {
            role: Some(CardRole::Name),
            color: Some(Color::rgb(200, 0, 0)),
            policy: Some(FitPolicy::SizeStretchSpacing),
            ..TextBox::default()
        };
        let preset = text_box.preset();
        assert_eq!(preset.text_color, Color::rgb(200, 0, 0));
        assert_eq!(preset.policy, FitPolicy::SizeStretchSpacing);
        assert_eq!(preset.font.point_size, 52);
        assert!(preset.show_outline);
    }

    #[test]
    fn test_configure_fills_item() {
        let job: RenderJob = serde_json::from_str(JOB).unwrap();
        let mut item = TextItem::new(Box::new(TableMeasurer::new()), SymbolAssets::new());
        job.boxes[1].configure(&mut item);
        assert_eq!(item.paragraphs().len(), 2);
        assert_eq!(item.document().block_count(), 2);
        assert_eq!(item.minimum_point_size(), 12);
        assert_eq!(item.fit_policy(), FitPolicy::SizeStretchSpacing);
        assert_eq!(item.symbols().lookup("sun"), Some("attribute-light"));
        assert_eq!(item.position().x, 20.0);
        assert!(item.calculated_point_size() <= 30);
    }
}
