#![feature(test)]

use arenapool::{ObjectPool, Pool, KIB, MIB};
use test::{black_box, Bencher};

extern crate test;

const TOTAL: usize = 20 * MIB;

#[bench]
fn bench_global_1024(b: &mut Bencher) {
    b.iter(|| {
        for x in (0..TOTAL).step_by(KIB) {
            let mut buf = vec![0u8; KIB];
            buf[0] = x as u8;
            black_box(buf);
        }
    });
}

#[bench]
fn bench_object_pool_1024(b: &mut Bencher) {
    let pool = ObjectPool::new(0, || vec![0u8; KIB]);

    b.iter(|| {
        for x in (0..TOTAL).step_by(KIB) {
            let mut buf = pool.get();
            buf[0] = x as u8;
            pool.put(black_box(buf));
        }
    });
}

#[bench]
fn bench_arena_pool_1024(b: &mut Bencher) {
    let pool = Pool::new(10 * MIB, MIB, 1).unwrap();

    b.iter(|| {
        for x in (0..TOTAL).step_by(KIB) {
            let mut w = pool.get_writer(KIB).unwrap();
            let _ = w.write(&[x as u8]);
            black_box(w).release();
        }
    });
}
