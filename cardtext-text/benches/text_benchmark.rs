use std::hint::black_box;

use cardtext_text::{CosmicMeasurer, FontSpec, TableMeasurer, TextMeasurer};
use criterion::{criterion_group, criterion_main, Criterion};

const ABILITY: &str = "When this enters, gain two light. Draw a card, then discard a card.";

fn bench_table_width(c: &mut Criterion) {
    let mut measurer = TableMeasurer::new();
    let font = FontSpec::new("serif", 38).with_letter_spacing(105);

    c.bench_function("table_text_width", |b| {
        b.iter(|| measurer.text_width(black_box(&font), black_box(ABILITY)));
    });
}

fn bench_cosmic_width(c: &mut Criterion) {
    let Ok(mut measurer) = CosmicMeasurer::new() else {
        return;
    };
    let font = FontSpec::new("serif", 38);
    // Warm the advance cache.
    measurer.text_width(&font, ABILITY);

    c.bench_function("cosmic_text_width_cached", |b| {
        b.iter(|| measurer.text_width(black_box(&font), black_box(ABILITY)));
    });
}

fn bench_cosmic_outline(c: &mut Criterion) {
    let Ok(mut measurer) = CosmicMeasurer::new() else {
        return;
    };
    let font = FontSpec::new("Georgia, serif", 44).with_italic(true).with_weight(600);

    c.bench_function("cosmic_numeral_outline", |b| {
        b.iter(|| measurer.text_outline(black_box(&font), black_box("7"), (0.0, 0.0)));
    });
}

criterion_group!(benches, bench_table_width, bench_cosmic_width, bench_cosmic_outline);
criterion_main!(benches);
