//! End-to-end tests: markup in, fitted layout and bitmaps out.
//!
//! Everything runs on the table measurer so results do not depend on the
//! fonts installed on the machine.

use std::time::{Duration, Instant};

use cardtext_core::document::{ObjectPayload, Run, WORD_JOINER};
use cardtext_core::geometry::Rect;
use cardtext_core::markup::{literal_text, parse, strip_word_joiners, SymbolTable};
use cardtext_layout::{FitPolicy, Knob, SymbolAssets};
use cardtext_render::{CardRole, TextItem};
use cardtext_text::TableMeasurer;
use image::RgbaImage;

const ABILITY: &str = "Other light resonators you control gain two power. As long as there are \
                       four or more runes revealed from your rune area, they gain four power instead.";

fn item() -> TextItem {
    let mut assets = SymbolAssets::new();
    for name in SymbolTable::default().asset_names() {
        assets.insert(name, RgbaImage::from_pixel(8, 8, image::Rgba([0, 128, 0, 255])));
    }
    TextItem::new(Box::new(TableMeasurer::new()), assets)
}

fn runs(item: &TextItem) -> Vec<Run> {
    item.document().blocks().flat_map(|b| b.runs.clone()).collect()
}

#[test]
fn test_symbols_then_literal() {
    let mut item = item();
    item.set_text("[w][w]. Draw a card.");
    let runs = runs(&item);
    assert_eq!(runs.len(), 3);
    for run in &runs[..2] {
        match run {
            Run::Object(p) => assert!(matches!(
                &p.payload,
                ObjectPayload::Symbol { symbol, overlay: None, .. } if symbol == "attribute-light"
            )),
            other => panic!("expected a symbol, got {other:?}"),
        }
    }
    match &runs[2] {
        Run::Text(t) => assert_eq!(t.text, ". Draw a card."),
        other => panic!("expected text, got {other:?}"),
    }
}

#[test]
fn test_keyword_then_numeral() {
    let mut item = item();
    item.set_text("[Judgement][3]");
    let payloads: Vec<ObjectPayload> = runs(&item)
        .into_iter()
        .filter_map(|r| match r {
            Run::Object(p) => Some(p.payload),
            Run::Text(_) => None,
        })
        .collect();
    assert_eq!(payloads.len(), 2);
    assert_eq!(
        payloads[0],
        ObjectPayload::Keyword {
            label: "Judgement".into(),
            gradient: false
        }
    );
    assert!(matches!(
        &payloads[1],
        ObjectPayload::Symbol { overlay: Some(n), overlay_family: Some(f), .. } if n == "3" && f == "Georgia"
    ));
}

#[test]
fn test_gradient_keyword_then_symbol() {
    let mut item = item();
    item.set_text("[Energize!][u]");
    let runs = runs(&item);
    assert!(matches!(
        &runs[0],
        Run::Object(p) if p.payload == ObjectPayload::Keyword { label: "Energize".into(), gradient: true }
    ));
    assert!(matches!(
        &runs[1],
        Run::Object(p) if matches!(&p.payload, ObjectPayload::Symbol { symbol, .. } if symbol == "attribute-water")
    ));
}

#[test]
fn test_size_first_fit_exhausts_every_knob() {
    let mut item = item();
    CardRole::Abilities.preset().apply(&mut item);
    item.set_target_rect(Rect::new(40.0, 40.0, 300.0, 60.0));
    item.set_text(&[ABILITY, ABILITY, ABILITY].join(" "));

    assert_eq!(item.calculated_point_size(), 9);
    let font = &item.document().default_font;
    assert!(font.letter_spacing <= 90);
    assert!(font.stretch <= 87);

    let outcome = item.fit_to_rect();
    assert!(!outcome.fits);
    let last_size = outcome.steps.iter().rposition(|k| *k == Knob::Size).unwrap();
    let first_spacing = outcome.steps.iter().position(|k| *k == Knob::Spacing).unwrap();
    let first_stretch = outcome.steps.iter().position(|k| *k == Knob::Stretch).unwrap();
    assert!(last_size < first_spacing);
    assert!(first_spacing < first_stretch);
}

#[test]
fn test_slash_is_word_joined() {
    let mut item = item();
    item.set_text("a/b");
    let text = item.document().plain_text();
    let expected: String = ['a', WORD_JOINER, '/', WORD_JOINER, 'b'].iter().collect();
    assert!(text.contains(&expected));
    assert_eq!(strip_word_joiners(&text).trim_end_matches('\n'), "a/b");
}

#[test]
fn test_literal_text_round_trip() {
    let symbols = SymbolTable::default();
    for text in ["Draw a card.", "1/2 power", "[unterminated", "a + b / c", ""] {
        assert_eq!(literal_text(&parse(text, &symbols)), text);
    }
}

#[test]
fn test_fit_or_minimum() {
    for policy in [
        FitPolicy::SpacingStretchSize,
        FitPolicy::SizeSpacingStretch,
        FitPolicy::SizeStretchSpacing,
    ] {
        for (w, h) in [(600.0, 400.0), (400.0, 150.0), (250.0, 80.0), (120.0, 30.0)] {
            let mut item = item();
            item.set_fit_policy(policy);
            item.set_target_rect(Rect::new(0.0, 0.0, w, h));
            item.set_text(ABILITY);
            let size = item.bounding_rect().size();
            let fits = size.width <= w && size.height <= h;
            assert!(
                fits || item.calculated_point_size() == item.minimum_point_size(),
                "{policy:?} {w}x{h}: {size:?} at {}pt",
                item.calculated_point_size()
            );
        }
    }
}

#[test]
fn test_layout_is_idempotent() {
    let lines = |item: &TextItem| -> Vec<(i32, i32, usize, usize)> {
        item.document()
            .blocks()
            .filter_map(|b| item.layout().block_layout(b.id))
            .flat_map(|l| l.lines.iter().map(|line| (line.x.raw(), line.y.raw(), line.start, line.end)))
            .collect()
    };
    let mut item = item();
    item.set_target_rect(Rect::new(0.0, 0.0, 500.0, 200.0));
    item.set_text(ABILITY);
    let first = (lines(&item), item.calculated_point_size());
    item.set_text(ABILITY);
    let second = (lines(&item), item.calculated_point_size());
    assert!(!first.0.is_empty());
    assert_eq!(first, second);
}

#[test]
fn test_checkpoints_are_ordered() {
    let mut item = item();
    item.set_target_rect(Rect::new(0.0, 0.0, 500.0, 4000.0));
    for _ in 0..40 {
        item.insert_text_block(ABILITY);
    }
    item.check_update(false);
    let doc = item.document();
    let cps = item.layout().checkpoints();
    assert!(!cps.is_empty());
    assert!(cps.windows(2).all(|w| w[0].position <= w[1].position && w[0].y <= w[1].y));
    assert_eq!(cps.last().map(|c| c.position), Some(doc.character_count()));
}

#[test]
fn test_poll_finishes_lazy_layout() {
    let mut item = item();
    item.set_target_rect(Rect::new(0.0, 0.0, 500.0, 4000.0));
    for _ in 0..60 {
        item.insert_text_block(ABILITY);
    }
    let mut now = Instant::now();
    let mut polls = 0;
    while item.is_layout_pending() && polls < 10_000 {
        now += Duration::from_secs(1);
        item.poll(now);
        polls += 1;
    }
    assert!(!item.is_layout_pending());
    assert!(item.bounding_rect().height > 1000.0);
}

#[test]
fn test_outlined_name_renders_both_colors() {
    let mut item = item();
    CardRole::Name.preset().apply(&mut item);
    item.set_target_rect(Rect::new(0.0, 0.0, 800.0, 120.0));
    item.set_text("Weather Change");
    let image = item.paint();
    let opaque = |p: &&image::Rgba<u8>| p[3] == 255;
    assert!(image.pixels().filter(opaque).any(|p| p[0] == 0 && p[1] == 0 && p[2] == 0));
    assert!(image.pixels().filter(opaque).any(|p| p[0] == 255 && p[1] == 255 && p[2] == 255));
}

#[test]
fn test_symbol_bitmaps_are_drawn() {
    let mut item = item();
    item.set_target_rect(Rect::new(0.0, 0.0, 400.0, 200.0));
    item.set_text("[g]");
    let image = item.paint();
    assert!(image.pixels().any(|p| p[1] >= 120 && p[0] < 10 && p[3] > 200));
}

#[test]
fn test_refit_into_larger_target() {
    let mut item = item();
    for _ in 0..5 {
        item.insert_text_block(ABILITY);
    }
    item.set_target_rect(Rect::new(0.0, 0.0, 600.0, 20.0));
    assert_eq!(item.calculated_point_size(), 9);

    for h in (60..1200).step_by(10) {
        let h = h as f32;
        item.set_target_rect(Rect::new(0.0, 0.0, 600.0, h));
        let size = item.bounding_rect().size();
        assert!(
            (size.width <= 600.0 && size.height <= h) || item.calculated_point_size() == item.minimum_point_size(),
            "{h}: {size:?} at {}pt",
            item.calculated_point_size()
        );
    }
}
