use core::cell::UnsafeCell;

use lfsync::Futex;

cfg_if::cfg_if! {
    if #[cfg(loom)] {
        pub(crate) use loom::sync::Arc;
        pub(crate) use loom::thread;
    } else if #[cfg(feature = "shuttle")] {
        pub(crate) use shuttle::sync::Arc;
        pub(crate) use shuttle::thread;
    } else {
        pub(crate) use std::sync::Arc;
        pub(crate) use std::thread;
    }
}

/// `THREADS` threads each run `PASSES` lock/increment/unlock cycles on one
/// shared futex and a counter with no synchronization of its own. Mutual
/// exclusion plus the release/acquire pairing of unlock and lock make the
/// final count deterministic.
#[allow(dead_code)]
pub(crate) fn futex_mutual_exclusion_test<const THREADS: usize, const PASSES: usize>() {
    struct Shared {
        futex: Futex,
        counter: UnsafeCell<usize>,
    }

    // the futex is what makes the counter safe to share
    unsafe impl Sync for Shared {}

    let shared: Arc<Shared> = Arc::new(Shared {
        futex: Futex::new(),
        counter: UnsafeCell::new(0),
    });

    let join_handles: Vec<thread::JoinHandle<()>> = (0..THREADS)
        .map(|_| {
            let shared: Arc<Shared> = shared.clone();
            thread::spawn(move || {
                for _ in 0..PASSES {
                    shared.futex.lock().unwrap();
                    unsafe { *shared.counter.get() += 1 };
                    shared.futex.unlock().unwrap();
                }
            })
        })
        .collect();

    join_handles
        .into_iter()
        .for_each(|join_handle| join_handle.join().expect("a thread panicked"));

    assert_eq!(unsafe { *shared.counter.get() }, THREADS * PASSES);
}

/// Caller-owned backing memory for intrusive stack blocks: 64 bytes each,
/// word aligned.
#[allow(dead_code)]
pub(crate) fn allocate_blocks(count: usize) -> Vec<Box<[usize; 8]>> {
    (0..count).map(|_| Box::new([0usize; 8])).collect()
}

#[allow(dead_code)]
pub(crate) fn block_pointer(block: &mut [usize; 8]) -> lfsync::Block {
    block.as_mut_ptr().cast()
}
