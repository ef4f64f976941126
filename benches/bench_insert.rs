use shared::*;

use criterion::{black_box, criterion_group, Criterion};
use mtree::geometry::Point;
use mtree::m_tree::MTree;
use tracing::info;

fn benchmark_insert(_c: &mut Criterion) {
    let points = generate_bench_points();
    let mut cc = configure_criterion();
    for (name, policy) in BENCH_POLICIES {
        info!("Setting up benchmark: insert_{}", name);
        cc.bench_function(&format!("insert_{name}"), |b| {
            b.iter(|| {
                let mut tree: MTree<Point<()>> =
                    MTree::with_split_policy(BENCH_NODE_CAPACITY, policy)
                        .expect("benchmark capacity is valid");
                for point in &points {
                    tree.insert(point.clone()).expect("points share a dimension");
                }
                black_box(tree)
            })
        });
    }
}

criterion_group!(benches, benchmark_insert);
