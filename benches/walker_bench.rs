//! Benchmarks for tag-mirror
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tag_mirror::config::NameFilter;
use tag_mirror::remote::{NativeValue, NodeId, SnapshotClient};

/// `units` folders, each with `modules` folders holding CV/SP/PV leaves
fn wide_namespace(units: usize, modules: usize) -> SnapshotClient {
    let mut builder = SnapshotClient::builder("bench", "Root", "Root");
    for u in 0..units {
        let unit = format!("U{}", u);
        builder = builder.folder("Root", &unit, &unit);
        for m in 0..modules {
            let module = format!("{}/M{}", unit, m);
            builder = builder.folder(&unit, &module, &format!("M{}", m));
            for tag in ["CV", "SP", "PV"] {
                builder = builder.leaf(&module, &format!("{}/{}", module, tag), tag, NativeValue::Double(0.0));
            }
        }
    }
    builder.build()
}

fn benchmark_discovery(c: &mut Criterion) {
    use tag_mirror::progress::CollectingSink;
    use tag_mirror::retry::RetryPolicy;
    use tag_mirror::walker::NamespaceWalker;

    let client = wide_namespace(20, 50);
    let base = NodeId::from("Root");
    let filter = NameFilter::from("CV");

    c.bench_function("discover_named_1000_modules", |b| {
        b.iter(|| {
            let retry = RetryPolicy::immediate(1);
            let sink = CollectingSink::new();
            let result = NamespaceWalker::new(&client, &retry, &sink)
                .discover(&base, &filter, 100_000)
                .unwrap();
            black_box(result.leaves.len());
        })
    });
}

fn benchmark_path_mapping(c: &mut Criterion) {
    use tag_mirror::config::DataTypeChoice;
    use tag_mirror::mirror::PathMapper;
    use tag_mirror::walker::DiscoveredLeaf;

    let leaves: Vec<DiscoveredLeaf> = (0..1000)
        .map(|i| DiscoveredLeaf {
            node: NodeId::from(format!("ns=2;s=U{}/M{}/CV", i % 20, i)),
            display_name: "CV".into(),
            relative_path: format!("U{}/M{}/CV", i % 20, i),
        })
        .collect();
    let mapper = PathMapper::new("default", "DELTAV/BIOREACTOR/BRX001");

    c.bench_function("map_1000_requests", |b| {
        b.iter(|| {
            let requests = mapper.requests(black_box(&leaves), DataTypeChoice::Auto);
            black_box(requests);
        })
    });
}

criterion_group!(benches, benchmark_discovery, benchmark_path_mapping);
criterion_main!(benches);
