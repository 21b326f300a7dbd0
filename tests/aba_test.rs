#![cfg(not(any(loom, feature = "shuttle")))]

use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;

use lfsync::{AbaCell, AbaSolution, ABA_SOLUTION};
use test_log::test;
use tracing::debug;

/// A 32-bit value behind the ABA wrapper, in the shape a consumer of the
/// cell would actually write: an unconditional setter built on `modify`.
struct Guarded32 {
    cell: AbaCell<i32>,
}

impl Guarded32 {
    fn new(init: i32) -> Self {
        Self {
            cell: AbaCell::new(init),
        }
    }

    fn set(&self, value: i32) {
        self.cell.modify(|_observed, desired| {
            *desired = value;
            true
        });
    }

    fn get(&self) -> i32 {
        self.cell.get()
    }

    fn get_counter(&self) -> u64 {
        self.cell.get_counter()
    }
}

fn is_dwcas() -> u64 {
    match ABA_SOLUTION {
        AbaSolution::Dwcas => 1,
        AbaSolution::Llsc => 0,
    }
}

#[test]
fn test_aba_wrapper() {
    let guarded: Guarded32 = Guarded32::new(1_234_567_890);
    let counter: u64 = guarded.get_counter();

    assert_eq!(
        AbaCell::<i32>::ALIGNMENT,
        (1 + is_dwcas() as usize) * core::mem::size_of::<i32>()
    );

    guarded.set(-2_000_000_000);
    assert_eq!(guarded.get(), -2_000_000_000);
    guarded.set(2_000_000_000);
    assert_eq!(guarded.get(), 2_000_000_000);

    assert_eq!(guarded.get_counter() - counter, 2 * is_dwcas());
}

#[test]
fn test_refused_modification_is_invisible_to_other_threads() {
    let cell: Arc<AbaCell<u32>> = Arc::new(AbaCell::new(500));

    // writers only ever install even values; a refusing observer must never
    // disturb that
    let writers: Vec<JoinHandle<()>> = (0..2)
        .map(|_| {
            let cell: Arc<AbaCell<u32>> = cell.clone();
            thread::spawn(move || {
                for _ in 0..10_000 {
                    cell.modify(|observed, desired| {
                        *desired = observed.wrapping_add(2);
                        true
                    });
                }
            })
        })
        .collect();

    let observer: JoinHandle<()> = {
        let cell: Arc<AbaCell<u32>> = cell.clone();
        thread::spawn(move || {
            for _ in 0..10_000 {
                let refused: bool = !cell.modify(|observed, desired| {
                    assert_eq!(observed % 2, 0);
                    *desired = 1;
                    false
                });
                assert!(refused);
            }
        })
    };

    writers
        .into_iter()
        .chain(core::iter::once(observer))
        .for_each(|join_handle| join_handle.join().expect("a thread panicked"));

    let settled: u32 = cell.get();
    debug!("cell value after refused modifications: {settled}");
    assert_eq!(settled, 500u32.wrapping_add(2 * 2 * 10_000));
}
