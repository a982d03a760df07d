use arenapool::{Pool, PoolConfig, ReadOutcome, WriteOutcome};

#[test]
fn test_basic() {
    let pool = Pool::with_config(PoolConfig::default()).unwrap();

    let mut w = pool.get_writer(1500).unwrap();
    let content: Vec<u8> = (0..1500).map(|i| i as u8).collect();
    assert_eq!(w.write(&content), WriteOutcome::Complete(1500));

    let mut r = w.to_reader();
    for (i, b) in r.as_slice().iter().enumerate() {
        assert_eq!(*b, i as u8);
    }

    let mut buf = vec![0; 1000];
    assert_eq!(r.read(&mut buf), ReadOutcome::More(1000));
    assert_eq!(&buf[..], &content[..1000]);
    assert_eq!(r.read(&mut buf), ReadOutcome::End(500));
    assert_eq!(&buf[..500], &content[1000..]);

    r.release();
}

#[test]
fn test_short_write_is_visible() {
    let pool = Pool::new(1000, 100, 0).unwrap();

    let mut w = pool.get_writer(4).unwrap();
    let outcome = w.write(b"truncated");
    assert_eq!(outcome, WriteOutcome::Short(4));

    // The prefix that fit stays committed.
    let r = w.to_reader();
    assert_eq!(r.as_slice(), b"trun");
}
