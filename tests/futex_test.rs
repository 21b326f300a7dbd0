#![cfg(all(target_os = "linux", not(loom), not(feature = "shuttle")))]

use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use lfsync::Futex;
use test_log::test;
use tracing::debug;

mod common;

#[test]
fn test_single_thread_lock_cycle() {
    let futex: Futex = Futex::new();
    futex.lock().unwrap();
    futex.unlock().unwrap();
    assert!(futex.trylock());
    futex.unlock().unwrap();
    futex.lock().unwrap();
    futex.unlock().unwrap();
}

#[test]
fn test_counter_under_contention() {
    common::futex_mutual_exclusion_test::<8, 10_000>();
}

#[test]
fn test_trylock_timeout_expires_after_roughly_the_timeout() {
    let futex: Arc<Futex> = Arc::new(Futex::new());
    futex.lock().unwrap();

    let contender: Arc<Futex> = futex.clone();
    let join_handle: JoinHandle<Duration> = thread::spawn(move || {
        let started: Instant = Instant::now();
        let acquired: bool = contender
            .trylock_timeout(Duration::from_millis(100))
            .unwrap();
        assert!(!acquired);
        started.elapsed()
    });

    let elapsed: Duration = join_handle.join().expect("the contender panicked");
    debug!("trylock_timeout returned after {elapsed:?}");
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(5));

    futex.unlock().unwrap();
}

#[test]
fn test_no_lost_wakeup() {
    let futex: Arc<Futex> = Arc::new(Futex::new());
    futex.lock().unwrap();

    let waiter: Arc<Futex> = futex.clone();
    let join_handle: JoinHandle<()> = thread::spawn(move || {
        // suspends in the kernel until the unlock below
        waiter.lock().unwrap();
        waiter.unlock().unwrap();
    });

    // give the waiter time to reach the kernel wait
    thread::sleep(Duration::from_millis(50));
    futex.unlock().unwrap();

    join_handle.join().expect("the waiter never woke up");
}

#[test]
fn test_writes_before_unlock_are_visible_after_lock() {
    struct Shared {
        futex: Futex,
        payload: core::cell::UnsafeCell<[u64; 4]>,
    }
    unsafe impl Sync for Shared {}

    let shared: Arc<Shared> = Arc::new(Shared {
        futex: Futex::new_locked(),
        payload: core::cell::UnsafeCell::new([0; 4]),
    });

    let writer: Arc<Shared> = shared.clone();
    let join_handle: JoinHandle<()> = thread::spawn(move || {
        // made while owning the futex, published by unlock
        unsafe { *writer.payload.get() = [1, 2, 3, 4] };
        writer.futex.unlock().unwrap();
    });

    shared.futex.lock().unwrap();
    assert_eq!(unsafe { *shared.payload.get() }, [1, 2, 3, 4]);
    shared.futex.unlock().unwrap();

    join_handle.join().expect("the writer panicked");
}
