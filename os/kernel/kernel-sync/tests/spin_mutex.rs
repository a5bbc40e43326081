use kernel_sync::SpinMutex;
use std::panic;

#[test]
fn guard_unlocks_on_drop() {
    let free = SpinMutex::new(vec![3_usize, 2, 1]);

    let taken = free.lock().pop();
    assert_eq!(taken, Some(1));

    // the temporary guard above is gone
    let mut g = free.try_lock().expect("lock still held");
    g.push(7);
    assert_eq!(g.as_slice(), &[3, 2, 7]);
}

#[test]
fn try_lock_fails_while_held() {
    let m = SpinMutex::new(1u8);

    let g1 = m.try_lock();
    assert_eq!(g1.as_deref(), Some(&1));
    assert!(m.try_lock().is_none());

    drop(g1);
    assert!(m.try_lock().is_some());
}

#[test]
fn failed_try_lock_leaves_lock_held() {
    let m = SpinMutex::new(());
    let _g = m.lock();
    assert!(m.try_lock().is_none());
    assert!(m.try_lock().is_none());
}

#[test]
fn with_lock_unlocks_afterwards() {
    let m = SpinMutex::new(String::from("a"));
    let len = m.with_lock(|s| {
        s.push('b');
        s.len()
    });
    assert_eq!(len, 2);
    assert_eq!(m.with_lock(|s| s.clone()), "ab");
}

#[test]
fn get_mut_and_into_inner_bypass_locking() {
    let mut m = SpinMutex::new(vec![1, 2, 3]);
    m.get_mut().push(4);
    assert_eq!(m.lock().as_slice(), &[1, 2, 3, 4]);
    assert_eq!(m.into_inner(), vec![1, 2, 3, 4]);
}

#[test]
fn panic_inside_critical_section_releases_lock() {
    let hand = SpinMutex::new(0_usize);

    let res = panic::catch_unwind(panic::AssertUnwindSafe(|| {
        hand.with_lock(|h| {
            *h = 5;
            panic!("scan aborted");
        });
    }));
    assert!(res.is_err());
    assert_eq!(*hand.try_lock().expect("lock leaked by unwind"), 5);
}

#[test]
fn spin_mutex_is_sync_for_send_t() {
    fn takes_sync<S: Sync>(_s: &S) {}
    let m = SpinMutex::new(0u8);
    takes_sync(&m);
}
