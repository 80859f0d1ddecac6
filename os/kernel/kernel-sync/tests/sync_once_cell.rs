use kernel_sync::SyncOnceCell;

#[test]
fn set_publishes_exactly_once() {
    let cell = SyncOnceCell::new();
    assert!(!cell.is_initialized());
    assert!(cell.get().is_none());

    assert_eq!(cell.set(7u32).copied(), Ok(7));
    assert_eq!(cell.set(8u32), Err(8));
    assert_eq!(cell.get(), Some(&7));
}

#[test]
fn published_value_is_dropped_with_the_cell() {
    use std::sync::Arc;

    let tracker = Arc::new(());
    {
        let cell = SyncOnceCell::new();
        cell.set(Arc::clone(&tracker)).unwrap();
        assert_eq!(Arc::strong_count(&tracker), 2);
    }
    assert_eq!(Arc::strong_count(&tracker), 1);
}

#[test]
fn racing_setters_have_one_winner() {
    use std::sync::{Arc, Barrier};
    use std::thread;

    let cell = Arc::new(SyncOnceCell::new());
    let start = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4u32)
        .map(|i| {
            let cell = Arc::clone(&cell);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                cell.set(i).is_ok().then_some(i)
            })
        })
        .collect();
    let winners: Vec<u32> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .collect();

    assert_eq!(winners.len(), 1);
    assert_eq!(cell.get(), Some(&winners[0]));
}
