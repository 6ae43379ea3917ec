use std::fmt::Write;

use collectr::attribute::{AttributeDefinition, AttributeKind};
use collectr::filter::FilterSet;
use collectr::import::{ImportLimits, ImportSession, ImportSource};
use collectr::mapping::MappingPlan;
use collectr::parser::ImportFormat;
use collectr::query::{ItemQuery, SortDirective};
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use serde_json::json;

fn definitions() -> Vec<AttributeDefinition> {
    let mut year = AttributeDefinition::new("year", "Jahr", AttributeKind::Number);
    year.min = Some(1900.0);
    vec![
        AttributeDefinition::new("genre", "Genre", AttributeKind::Tags),
        AttributeDefinition::new("grade", "Zustand", AttributeKind::Select),
        year,
    ]
}

fn generate_records(rows: usize) -> String {
    let genres = ["jazz", "rock", "pop, soul", "jazz; blues"];
    let grades = ["M", "NM", "VG+", "VG"];
    let mut content = String::from("Name;Kaufpreis;Kaufdatum;Zustand;Genre;Jahr\n");
    for i in 0..rows {
        let day = (i % 28) + 1;
        let _ = writeln!(
            content,
            "Record {i};{},{:02};{day:02}.03.2021;{};{};{}",
            i % 90,
            i % 100,
            grades[i % grades.len()],
            genres[i % genres.len()],
            1950 + (i % 50)
        );
    }
    content
}

fn bench_import_and_filter(c: &mut Criterion) {
    let definitions = definitions();
    let content = generate_records(5_000);
    let limits = ImportLimits::default();

    let mut group = c.benchmark_group("collection");
    group.bench_function("import_5000_rows", |b| {
        b.iter_batched(
            || ImportSource::from_text("bench.csv", ImportFormat::Csv, content.clone()),
            |source| {
                let session = ImportSession::parse(source, &limits).expect("parse");
                let plan = MappingPlan::new(session.propose(&definitions)).expect("plan");
                session.execute(&plan, &definitions).expect("execute")
            },
            BatchSize::SmallInput,
        )
    });

    let session = ImportSession::parse(
        ImportSource::from_text("bench.csv", ImportFormat::Csv, content.clone()),
        &limits,
    )
    .expect("parse");
    let plan = MappingPlan::new(session.propose(&definitions)).expect("plan");
    let items = session.execute(&plan, &definitions).expect("execute").items;

    let mut filters = FilterSet::new();
    filters.insert("genre".to_string(), json!(["jazz", "blues"]));
    filters.insert("year".to_string(), json!({"min": 1960, "max": 1980}));
    let query = ItemQuery {
        attributes: filters,
        sort: vec![
            SortDirective::parse("attr:year:desc").expect("sort"),
            SortDirective::parse("price").expect("sort"),
        ],
        ..ItemQuery::default()
    };
    group.bench_function("filter_and_sort_5000_items", |b| {
        b.iter(|| query.apply(&items, &definitions).len())
    });
    group.finish();
}

criterion_group!(benches, bench_import_and_filter);
criterion_main!(benches);
