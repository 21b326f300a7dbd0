#![cfg(not(any(loom, feature = "shuttle")))]

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use lfsync::{Block, Error, Stack};
use test_log::test;
use tracing::debug;

mod common;

#[test]
fn test_push_null_fails() {
    let stack: Stack = Stack::new();
    let result: Result<(), Error> = unsafe { stack.push(core::ptr::null_mut()) };
    assert!(matches!(result, Err(Error::InvalidArgument(_))));
}

#[test]
fn test_single_thread_lifo() {
    let stack: Stack = Stack::new();
    let mut blocks: Vec<Box<[usize; 8]>> = common::allocate_blocks(4);

    for block in blocks.iter_mut() {
        unsafe { stack.push(common::block_pointer(block)) }.unwrap();
    }

    for block in blocks.iter_mut().rev() {
        assert_eq!(unsafe { stack.pop() }, common::block_pointer(block));
    }
    assert!(unsafe { stack.pop() }.is_null());
}

/// The relay workload: every thread pops from its own stack and pushes into
/// its neighbor's for a second. No block is ever created or destroyed, so
/// draining all stacks afterwards must recover exactly the pushed multiset.
#[test]
fn test_multi_thread_relay_conserves_blocks() {
    const BLOCKS_PER_STACK: usize = 1000;

    let threads: usize = thread::available_parallelism().map_or(4, usize::from);
    let stacks: Vec<Stack> = (0..threads).map(|_| Stack::new()).collect();

    let mut storage: Vec<Box<[usize; 8]>> = common::allocate_blocks(threads * BLOCKS_PER_STACK);
    for (index, block) in storage.iter_mut().enumerate() {
        let stack: &Stack = &stacks[index / BLOCKS_PER_STACK];
        unsafe { stack.push(common::block_pointer(block)) }.unwrap();
    }

    let stop: AtomicBool = AtomicBool::new(false);
    thread::scope(|scope| {
        for index in 0..threads {
            let stacks: &Vec<Stack> = &stacks;
            let stop: &AtomicBool = &stop;
            scope.spawn(move || {
                let mut relayed: u64 = 0;
                while !stop.load(Ordering::Relaxed) {
                    let block: Block = unsafe { stacks[index].pop() };
                    if !block.is_null() {
                        unsafe { stacks[(index + 1) % threads].push(block) }.unwrap();
                        relayed += 1;
                    }
                }
                debug!("thread {index} relayed {relayed} blocks");
            });
        }

        thread::sleep(Duration::from_secs(1));
        stop.store(true, Ordering::Relaxed);
    });

    let mut recovered: Vec<Block> = Vec::with_capacity(threads * BLOCKS_PER_STACK);
    for stack in &stacks {
        loop {
            let block: Block = unsafe { stack.pop() };
            if block.is_null() {
                break;
            }
            recovered.push(block);
        }
    }
    assert_eq!(recovered.len(), threads * BLOCKS_PER_STACK);

    let mut expected: Vec<Block> = storage
        .iter_mut()
        .map(|block| common::block_pointer(block))
        .collect();
    expected.sort();
    recovered.sort();
    assert_eq!(recovered, expected);
}
