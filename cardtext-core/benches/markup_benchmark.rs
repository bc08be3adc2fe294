use std::hint::black_box;

use cardtext_core::{insert_markup, parse, Document, InsertContext, SymbolTable};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

const ABILITY: &str = "[Judgement][3] When this enters, gain [w][w]. [Energize!] Draw a card/discard a card.";

fn bench_parse(c: &mut Criterion) {
    let symbols = SymbolTable::default();
    let mut group = c.benchmark_group("Markup Parsing");

    for repeat in [1usize, 10, 100] {
        let text = ABILITY.repeat(repeat);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(repeat), &text, |b, text| {
            b.iter(|| black_box(parse(black_box(text), &symbols)));
        });
    }

    group.finish();
}

fn bench_insert(c: &mut Criterion) {
    let symbols = SymbolTable::default();
    let ctx = InsertContext::default();

    c.bench_function("insert_markup_ability", |b| {
        b.iter(|| {
            let mut doc = Document::new();
            black_box(insert_markup(&mut doc, black_box(ABILITY), &symbols, &ctx));
        })
    });
}

criterion_group!(benches, bench_parse, bench_insert);
criterion_main!(benches);
