// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bufsched::{BufferHandle, BufferScheduler, SchedConfig};

fn warmed_scheduler() -> BufferScheduler {
    let sched = BufferScheduler::new(SchedConfig::new(4096, 100_000))
        .expect("scheduler init should succeed");

    // Drive the warmup grow so the steady-state path is measured, not the
    // controller.
    let warm: Vec<_> = (0..512u64)
        .map(|i| {
            sched
                .alloc(BufferHandle(i))
                .expect("warmup alloc should succeed")
        })
        .collect();
    for buf in &warm {
        sched.free(buf).expect("warmup free should succeed");
    }
    sched
}

/// Benchmark: alloc + free cycle on a warm pool (free-list hot path).
fn bench_alloc_free_cycle(c: &mut Criterion) {
    let sched = warmed_scheduler();
    c.bench_function("sched_alloc_free_cycle", |b| {
        b.iter(|| {
            let buf = sched
                .alloc(black_box(BufferHandle(u64::MAX)))
                .expect("alloc should succeed");
            sched.free(&buf).expect("free should succeed");
        })
    });
}

/// Benchmark: mark_updated promotion of an already-linked buffer.
fn bench_mark_updated(c: &mut Criterion) {
    let sched = warmed_scheduler();
    let buf = sched
        .alloc(BufferHandle(u64::MAX))
        .expect("alloc should succeed");
    sched.mark_updated(&buf);

    c.bench_function("sched_mark_updated", |b| {
        b.iter(|| {
            sched.mark_updated(black_box(&buf));
        })
    });

    sched.free(&buf).expect("free should succeed");
}

/// Benchmark: payload write through the buffer lock.
fn bench_payload_write(c: &mut Criterion) {
    let sched = warmed_scheduler();
    let buf = sched
        .alloc(BufferHandle(u64::MAX))
        .expect("alloc should succeed");
    let payload = [0xA5u8; 4096];

    c.bench_function("sched_payload_write_4k", |b| {
        b.iter(|| {
            buf.write_bytes(0, black_box(&payload))
                .expect("write should succeed");
        })
    });

    sched.free(&buf).expect("free should succeed");
}

criterion_group!(
    benches,
    bench_alloc_free_cycle,
    bench_mark_updated,
    bench_payload_write
);
criterion_main!(benches);
