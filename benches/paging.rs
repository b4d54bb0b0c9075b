use criterion::{black_box, criterion_group, criterion_main, Criterion};

use glam::Vec3;
use quadstream::streaming::{linear, StreamingQuadtree};

fn bench_update_orbit(c: &mut Criterion) {
    let mut tree: StreamingQuadtree<u32> = StreamingQuadtree::new(6, 8192);
    tree.set_lod_scale(1.0);
    let mut frame = 0u32;

    c.bench_function("paging_update_orbit", |b| {
        b.iter(|| {
            frame += 1;
            let angle = frame as f32 * 0.02;
            let pivot = Vec3::new(angle.cos() * 0.8, angle.sin() * 0.8, 0.0);
            let facing = Vec3::new(-angle.sin(), angle.cos(), 0.0);
            tree.set_pivot(black_box(pivot), facing);
            tree.update();

            // bounded servicing, like a per-frame budget
            for _ in 0..8 {
                if let Some(index) = tree.pop_load_queue() {
                    tree.set_node_data(index, Some(index));
                }
            }
            for _ in 0..8 {
                if let Some(index) = tree.pop_release_queue() {
                    tree.set_node_data(index, None);
                }
            }
        });
    });
}

fn bench_index_roundtrip(c: &mut Criterion) {
    c.bench_function("linear_index_roundtrip", |b| {
        b.iter(|| {
            let mut acc = 0u32;
            for level in 0..8u32 {
                for i in 0..(1u32 << level) {
                    let index = linear::to_index(black_box(i), i, level);
                    let (x, _) = linear::to_cartesian(index, level);
                    acc ^= x;
                }
            }
            acc
        });
    });
}

criterion_group!(benches, bench_update_orbit, bench_index_roundtrip);
criterion_main!(benches);
