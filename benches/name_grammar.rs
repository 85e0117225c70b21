//! Benchmarks for element and path name validation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use e57_container::validation::{check_element_name_legal, parse_element_name, parse_path_name};
use e57_container::NamespaceRegistry;

fn registry() -> NamespaceRegistry {
    let mut registry = NamespaceRegistry::new();
    for i in 0..8 {
        registry
            .add(&format!("ext{}", i), &format!("urn:example:ext{}", i))
            .unwrap();
    }
    registry
}

fn benchmark_element_names(c: &mut Criterion) {
    let mut group = c.benchmark_group("element_name");
    let registry = registry();

    for name in ["cartesianX", "ext7:intensity", "1024", "9invalid"].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(name), name, |b, &name| {
            b.iter(|| {
                let _ = black_box(check_element_name_legal(black_box(name), true, &registry));
            });
        });
    }

    group.bench_function("parse_unprefixed", |b| {
        b.iter(|| parse_element_name(black_box("sphericalAzimuth"), false))
    });

    group.finish();
}

fn benchmark_path_names(c: &mut Criterion) {
    let mut group = c.benchmark_group("path_name");
    let registry = registry();

    for depth in [1usize, 4, 16].iter() {
        let path = format!(
            "/{}",
            (0..*depth)
                .map(|i| format!("level{}", i))
                .collect::<Vec<_>>()
                .join("/")
        );
        group.bench_with_input(BenchmarkId::from_parameter(depth), &path, |b, path| {
            b.iter(|| parse_path_name(black_box(path), &registry))
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_element_names, benchmark_path_names);

criterion_main!(benches);
