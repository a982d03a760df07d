use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use arenapool::{Pool, ReadHandle, ReadOutcome, WriteOutcome, KIB, MIB};

fn content() -> Vec<u8> {
    (0..KIB).map(|i| (i % 256) as u8).collect()
}

fn read_all(r: &mut ReadHandle) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0; 100];
    loop {
        let outcome = r.read(&mut buf);
        out.extend_from_slice(&buf[..outcome.read()]);
        if outcome.is_end() {
            return out;
        }
    }
}

/// Two arenas worth of 1 KiB leases: the first 10 MiB arena serves 10,240 of them and the
/// 10,241st request swaps in the second arena.
#[test]
fn test_sequential_round_trips() {
    let pool = Pool::new(10 * MIB, MIB, 1).unwrap();
    let content = content();

    for i in 0..2 * (10 * MIB / KIB) {
        let mut w = pool.get_writer(KIB).unwrap();
        assert!(w.is_arena_backed());
        assert_eq!(w.write(&content), WriteOutcome::Complete(KIB));
        assert_eq!(w.write(&content), WriteOutcome::Short(0));

        let mut r = w.to_reader();
        assert_eq!(read_all(&mut r), content, "lease {i}");
        r.release();

        if i + 1 == 10 * MIB / KIB {
            assert_eq!(pool.stats().swaps, 0);
        }
    }

    let stats = pool.stats();
    assert_eq!(stats.swaps, 1);
    assert_eq!(stats.arenas_created, 2);
    assert_eq!(stats.oversized, 0);

    let deadline = Instant::now() + Duration::from_secs(10);
    while pool.stats().recycled != 1 {
        assert!(Instant::now() < deadline);
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_producer_consumers() {
    let pool = Pool::new(10 * MIB, MIB, 1).unwrap();
    let content = content();

    let (tx, rx) = mpsc::sync_channel::<ReadHandle>(64);
    let rx = std::sync::Arc::new(std::sync::Mutex::new(rx));

    let consumers: Vec<_> = (0..4)
        .map(|_| {
            let rx = rx.clone();
            let content = content.clone();
            thread::spawn(move || {
                let mut seen = 0;
                loop {
                    let r = match rx.lock().unwrap().recv() {
                        Ok(r) => r,
                        Err(_) => return seen,
                    };
                    assert_eq!(r.remaining_bytes(), &content[..]);
                    assert_eq!(r.peek(KIB).unwrap(), &content[..]);
                    assert!(r.peek(KIB + 1).is_err());
                    seen += 1;
                    r.release();
                }
            })
        })
        .collect();

    let total = 3 * (10 * MIB / KIB);
    for _ in 0..total {
        let mut w = pool.get_writer(KIB).unwrap();
        assert!(!w.write(&content).is_short());
        tx.send(w.to_reader()).unwrap();
    }
    drop(tx);

    let seen: usize = consumers.into_iter().map(|th| th.join().unwrap()).sum();
    assert_eq!(seen, total);

    let stats = pool.stats();
    assert_eq!(stats.swaps, 2);
    assert!(stats.arenas_created <= 3);
}

#[test]
fn test_concurrent_writers() {
    let pool = Pool::new(MIB, 64 * KIB, 2).unwrap();

    let threads: Vec<_> = (0..4u8)
        .map(|id| {
            let pool = pool.clone();
            thread::spawn(move || {
                for n in 0..2000usize {
                    let size = 1 + (n * 37) % (2 * KIB);
                    let mut w = pool.get_writer(size).unwrap();
                    let pattern = vec![id; size];
                    assert_eq!(w.write(&pattern), WriteOutcome::Complete(size));

                    let mut r = w.to_reader();
                    let mut buf = vec![0; size];
                    assert_eq!(r.read(&mut buf), ReadOutcome::End(size));
                    assert_eq!(buf, pattern);
                    r.release();
                }
            })
        })
        .collect();

    for th in threads {
        th.join().unwrap();
    }

    assert!(pool.stats().swaps > 0);
    assert_eq!(pool.stats().oversized, 0);
}

#[test]
fn test_oversized_requests_always_succeed() {
    let pool = Pool::new(MIB, 64 * KIB, 0).unwrap();

    let held: Vec<_> = (0..16).map(|_| pool.get_writer(64 * KIB).unwrap()).collect();

    let mut w = pool.get_writer(4 * MIB).unwrap();
    assert!(!w.is_arena_backed());
    assert_eq!(w.remaining(), 4 * MIB);
    assert!(!w.write(&vec![1; 4 * MIB]).is_short());
    w.release();

    assert_eq!(pool.stats().oversized, 1);
    assert_eq!(pool.stats().swaps, 0);
    drop(held);
}
