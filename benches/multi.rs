#![feature(test)]

use std::thread;

use arenapool::{Pool, KIB, MIB};
use test::Bencher;

extern crate test;

#[bench]
fn pool_write_read_1024(b: &mut Bencher) {
    let pool = Pool::new(10 * MIB, MIB, 1).unwrap();
    let content = [7; KIB];

    b.iter(|| {
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let pool = pool.clone();

                thread::spawn(move || {
                    for _ in 0..1000 {
                        let mut w = pool.get_writer(KIB).unwrap();
                        let _ = w.write(&content);
                        w.to_reader().release();
                    }
                })
            })
            .collect();

        for th in threads {
            th.join().unwrap();
        }
    });
}
