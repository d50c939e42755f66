//! Benchmarks for the query compilation pipeline.
//!
//! Benchmarks cover:
//! - Cold translation (comprehension → SQL AST)
//! - Rendering (SQL AST → text)
//! - Cached lookups through `select` and `Query::sql`
//! - Parameter extraction for a cached plan
//!
//! Run with: `cargo bench`

use std::collections::BTreeMap;
use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use compsql::ast::{PostgresRenderer, SqlRenderer};
use compsql::expr::{int, name, text, tuple, Comprehension};
use compsql::translate::{SemanticType, Translator};
use compsql::{select_with, AttrKind, CacheConfig, Diagram, EntityDef, PlanCache, Value};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

fn diagram() -> Arc<Diagram> {
    Diagram::builder("bench")
        .entity(
            EntityDef::new("Country")
                .primary_key("code", AttrKind::Text)
                .required("name", AttrKind::Text),
        )
        .entity(
            EntityDef::new("Address")
                .primary_key("id", AttrKind::Int)
                .required("city", AttrKind::Text)
                .required("country", AttrKind::Ref("Country".into())),
        )
        .entity(
            EntityDef::new("Person")
                .primary_key("id", AttrKind::Int)
                .required("name", AttrKind::Text)
                .required("age", AttrKind::Int)
                .optional("address", AttrKind::Ref("Address".into())),
        )
        .build()
        .unwrap()
}

fn cases() -> Vec<(&'static str, Comprehension)> {
    let people = || Comprehension::new(name("p")).for_in("p", name("Person"));
    vec![
        ("scan", people()),
        ("param_filter", people().filter(name("p").attr("age").gt(name("x")))),
        (
            "arith_filter",
            people().filter((name("p").attr("age") * int(2) + int(1)).lt(name("x"))),
        ),
        (
            "in_list",
            people().filter(name("p").attr("name").is_in(tuple(vec![
                text("ann"),
                text("bob"),
                text("cy"),
            ]))),
        ),
        (
            "two_joins",
            people()
                .filter(name("p").attr("address").attr("city").equals(text("Oslo")))
                .filter(
                    name("p")
                        .attr("address")
                        .attr("country")
                        .attr("name")
                        .not_equals(text("Norway")),
                ),
        ),
    ]
}

fn vartypes(d: &Arc<Diagram>) -> BTreeMap<String, SemanticType> {
    let mut types = BTreeMap::new();
    types.insert(
        "Person".to_string(),
        SemanticType::Entities(d.entity("Person").unwrap()),
    );
    types.insert("x".to_string(), SemanticType::Numeric);
    types
}

fn vars(d: &Arc<Diagram>) -> [(&'static str, Value); 2] {
    [
        ("Person", Value::from(d.entity("Person").unwrap())),
        ("x", Value::from(40)),
    ]
}

// ---------------------------------------------------------------------------
// Benchmark groups
// ---------------------------------------------------------------------------

fn bench_translation(c: &mut Criterion) {
    let mut group = c.benchmark_group("translation");
    let d = diagram();
    let types = vartypes(&d);

    for (label, comp) in cases() {
        group.bench_with_input(BenchmarkId::new("translate", label), &comp, |b, comp| {
            b.iter(|| Translator::new(black_box(comp), &types).unwrap());
        });
    }

    group.finish();
}

fn bench_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("rendering");
    let d = diagram();
    let types = vartypes(&d);
    let renderer = PostgresRenderer;

    for (label, comp) in cases() {
        let select = Translator::new(&comp, &types)
            .unwrap()
            .statement(&["name".into()], Some((10, 20)))
            .unwrap();
        group.bench_with_input(BenchmarkId::new("render", label), &select, |b, select| {
            b.iter(|| renderer.render(black_box(select)));
        });
    }

    group.finish();
}

fn bench_cached(c: &mut Criterion) {
    let mut group = c.benchmark_group("cached");
    let d = diagram();
    let cache = Arc::new(PlanCache::new(&CacheConfig::default()).unwrap());

    for (label, comp) in cases() {
        group.bench_with_input(BenchmarkId::new("select_sql", label), &comp, |b, comp| {
            b.iter(|| {
                let query = select_with(Arc::clone(&cache), comp.clone(), vars(&d)).unwrap();
                query.sql().unwrap()
            });
        });
    }

    let query = select_with(
        Arc::clone(&cache),
        Comprehension::new(name("p"))
            .for_in("p", name("Person"))
            .filter(name("p").attr("age").gt(name("x"))),
        vars(&d),
    )
    .unwrap();
    group.bench_function("arguments", |b| {
        b.iter(|| black_box(&query).arguments().unwrap());
    });

    group.finish();
}

criterion_group!(benches, bench_translation, bench_rendering, bench_cached);
criterion_main!(benches);
