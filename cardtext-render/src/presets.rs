//! Styling presets for the text boxes of a card.

use cardtext_core::document::Alignment;
use cardtext_core::font::{FontSpec, WEIGHT_BOLD};
use cardtext_core::geometry::{Color, Pen};
use cardtext_layout::FitPolicy;
use serde::{Deserialize, Serialize};

use crate::item::TextItem;

pub const SERIF_FAMILY: &str = "Times New Roman";
pub const ABILITY_FAMILY: &str = "Ryo Text PlusN M";

/// A text box on the card face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardRole {
    Name,
    Type,
    Abilities,
    Flavor,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RolePreset {
    pub font: FontSpec,
    pub policy: FitPolicy,
    pub alignment: Alignment,
    pub text_color: Color,
    pub outline: Option<Pen>,
    pub show_outline: bool,
}

impl Default for RolePreset {
    fn default() -> Self {
        Self {
            font: FontSpec::new(SERIF_FAMILY, 32),
            policy: FitPolicy::SpacingStretchSize,
            alignment: Alignment::Left,
            text_color: Color::BLACK,
            outline: None,
            show_outline: false,
        }
    }
}

impl CardRole {
    pub const ALL: [CardRole; 4] = [CardRole::Name, CardRole::Type, CardRole::Abilities, CardRole::Flavor];

    pub fn preset(self) -> RolePreset {
        match self {
            CardRole::Name => RolePreset {
                font: FontSpec::new(SERIF_FAMILY, 52)
                    .with_weight(WEIGHT_BOLD)
                    .with_letter_spacing(105),
                alignment: Alignment::Center,
                text_color: Color::WHITE,
                outline: Some(Pen::new(Color::BLACK, 10.0)),
                show_outline: true,
                ..RolePreset::default()
            },
            CardRole::Type => RolePreset {
                font: FontSpec::new(SERIF_FAMILY, 36).with_letter_spacing(105),
                ..RolePreset::default()
            },
            CardRole::Abilities => RolePreset {
                font: FontSpec::new(ABILITY_FAMILY, 38).with_letter_spacing(105),
                policy: FitPolicy::SizeSpacingStretch,
                ..RolePreset::default()
            },
            CardRole::Flavor => RolePreset {
                font: FontSpec::new(SERIF_FAMILY, 32)
                    .with_letter_spacing(90)
                    .with_italic(true),
                alignment: Alignment::Center,
                ..RolePreset::default()
            },
        }
    }
}

impl RolePreset {
    /// Styles `item`. Call before setting text so the first fit already
    /// uses the preset font.
    pub fn apply(&self, item: &mut TextItem) {
        item.set_text_color(self.text_color);
        item.set_alignment(self.alignment);
        item.set_outline_pen(self.outline);
        item.show_outline(self.show_outline);
        item.set_fit_policy(self.policy);
        item.set_font(self.font.clone());
    }
}
