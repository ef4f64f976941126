use shared::*;

use criterion::{black_box, criterion_group, Criterion};
use tracing::info;

fn benchmark_knn_search(_c: &mut Criterion) {
    let points = generate_bench_points();
    let target = target_point();
    let mut cc = configure_criterion();
    for (name, policy) in BENCH_POLICIES {
        info!("Setting up benchmark: knn_{}", name);
        let tree = build_tree(policy, &points);
        cc.bench_function(&format!("knn_{name}"), |b| {
            b.iter(|| {
                let res = tree
                    .knn_query(&target, BENCH_KNN_SIZE)
                    .expect("query shares the tree dimension");
                black_box(res)
            })
        });
    }
}

criterion_group!(benches, benchmark_knn_search);
