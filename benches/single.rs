#![feature(test)]

extern crate test;

use arenapool::{Arena, Pool, KIB, MIB};
use test::Bencher;

#[bench]
fn arena_request_1(b: &mut Bencher) {
    let mut arena = Arena::new(MIB, KIB).unwrap();

    b.iter(|| {
        let w = match arena.request(1) {
            Ok(w) => w,
            Err(_) => {
                arena.reset().unwrap();
                arena.request(1).unwrap()
            }
        };
        w.release();
    });
}

#[bench]
fn pool_get_writer_100(b: &mut Bencher) {
    let pool = Pool::new(MIB, KIB, 1).unwrap();

    b.iter(|| {
        pool.get_writer(100).unwrap().release();
    });
}

#[bench]
fn pool_get_writer_1024(b: &mut Bencher) {
    let pool = Pool::new(10 * MIB, MIB, 1).unwrap();

    b.iter(|| {
        pool.get_writer(KIB).unwrap().release();
    });
}

#[bench]
fn pool_get_writer_oversized(b: &mut Bencher) {
    let pool = Pool::new(10 * MIB, KIB, 1).unwrap();

    b.iter(|| {
        pool.get_writer(1500).unwrap().release();
    });
}
