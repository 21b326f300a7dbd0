//! # lfsync
//!
//! Architecture-aware lock-free and blocking synchronization building
//! blocks for multi-threaded programs on POSIX systems: an ABA-safe atomic
//! wrapper, an intrusive lock-free stack built on it, and a fast
//! futex-backed mutex. The lock-free core is `no_std`-compatible; the futex
//! and sysconf layers need `std` and Linux.
//!
//! # Usage
//! ## Example
//! ```edition2021
//! use lfsync::{AbaCell, Futex, Stack};
//!
//! // ABA-safe read-modify-write over a plain integer
//! let cell: AbaCell<i32> = AbaCell::new(10);
//! let increased: bool = cell.modify(|observed, desired| {
//!     *desired = *observed + 32;
//!     true
//! });
//! assert!(increased);
//! assert_eq!(cell.get(), 42);
//!
//! // an intrusive lock-free stack of caller-owned memory blocks
//! let stack: Stack = Stack::new();
//! let mut block: [usize; 8] = [0; 8];
//! unsafe {
//!     stack.push(block.as_mut_ptr().cast()).unwrap();
//!     assert_eq!(stack.pop(), block.as_mut_ptr().cast());
//!     assert!(stack.pop().is_null());
//! }
//!
//! // a futex-backed mutex
//! let futex: Futex = Futex::new();
//! futex.lock().unwrap();
//! futex.unlock().unwrap();
//! assert!(futex.trylock());
//! futex.unlock().unwrap();
//! ```
//!
//! ## Details
//! The heart of the crate is [AbaCell], an atomic cell over a single
//! integer or pointer value whose `modify` operation re-runs a
//! caller-supplied function inside a retry loop until the proposed value
//! can be installed atomically. How the ABA hazard is defeated depends on
//! the target and is reported by [ABA_SOLUTION]:
//!
//! - x86-64 and i686 pair the value with a modification counter and
//!   compare-and-swap both as one double word (DWCAS),
//! - aarch64 and 32-bit ARM run the loop between a load-exclusive and a
//!   store-exclusive, letting the exclusive monitor catch interference
//!   (LL/SC).
//!
//! [Stack] is the canonical consumer: a Treiber stack whose `push` and
//! `pop` are two small modifier functions. It is intrusive and never
//! allocates: the caller owns the blocks, and the first machine word of
//! each block becomes the link.
//!
//! [Futex] is independent of the ABA machinery: a three-state mutex in the
//! style of Ulrich Drepper's "Futexes Are Tricky", whose uncontended paths
//! stay entirely in user space. The raw futex operations (wake-op,
//! requeue, bitset waits) are available on [FutexWord] for building other
//! primitives on the same word.
//!
//! # Limitations
//! ## No memory reclamation
//! The stack (and any other structure built on [AbaCell] holding
//! pointers) does not solve reclamation: a popped block may still be read
//! by a concurrent `pop` that observed it as the top. Callers must recycle
//! blocks or retire them only once no thread can still be inside a stack
//! operation. There are no hazard pointers or epochs here.
//!
//! ## Intra-process only
//! Futexes are always issued with the private flag; nothing in this crate
//! synchronizes across processes, and there is no priority inheritance.
#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_debug_implementations, missing_docs)]

pub mod aba;
pub mod asm;
pub mod atomic;
pub mod concurrent_ptr;
mod err;
#[cfg(all(feature = "std", target_os = "linux"))]
pub mod futex;
pub mod stack;
mod sync;
#[cfg(all(feature = "std", target_os = "linux"))]
pub mod sysconf;
mod version;

pub use aba::{AbaAtom, AbaCell};
pub use asm::{AbaSolution, PlatformWidth, ABA_SOLUTION, PLATFORM_WIDTH};
pub use atomic::{signal_fence, thread_fence, Atomic, ByteWord, IntWord, Ordering, Word};
pub use concurrent_ptr::AbaPtr;
pub use err::{Error, OsError};
#[cfg(all(feature = "std", target_os = "linux"))]
pub use futex::{Futex, FutexWord};
pub use stack::{Block, Stack};
pub use version::Version;
