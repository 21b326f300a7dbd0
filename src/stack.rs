//! A lock-free intrusive Treiber stack.
//!
//! The stack never allocates: callers hand it raw blocks of memory, and the
//! first machine word of each block is overwritten to hold the link to the
//! next block. A block must be at least one machine word large and word
//! aligned; its contents beyond the first word are never touched.
//!
//! # Memory reclamation
//!
//! There is none. A popped block may still be read by a concurrent `pop`
//! that observed it as the top, so callers must not free a popped block
//! while any other thread can still be inside `pop`. Recycling blocks
//! through the stack, or retiring them only after all threads are known to
//! have left the stack operations, both satisfy this.

use core::ffi::c_void;
use core::fmt;
use core::ptr;

use crossbeam_utils::CachePadded;

use crate::aba::AbaCell;
use crate::err::Error;

/// An untyped block of caller-owned memory; the stack uses its first
/// machine word as the intrusive link.
pub type Block = *mut c_void;

/// A lock-free intrusive stack of caller-owned memory blocks.
///
/// The top pointer lives alone on its cache line. Blocks enter with
/// [Stack::push] and leave with [Stack::pop]; the stack itself never
/// allocates or frees.
pub struct Stack {
    top: CachePadded<AbaCell<Block>>,
}

impl Stack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self {
            top: CachePadded::new(AbaCell::new(ptr::null_mut())),
        }
    }

    /// Pushes `block` onto the stack.
    ///
    /// Fails with [Error::InvalidArgument] if `block` is null.
    ///
    /// # Safety
    ///
    /// `block` must be valid for reads and writes of one machine word, be
    /// word aligned, not be on this or any other stack already, and stay
    /// untouched by the caller until it is popped again. The write of the
    /// link word may be performed several times on contention; that is
    /// invisible to other threads because the block is unreachable until
    /// the final compare-and-swap publishes it.
    pub unsafe fn push(&self, block: Block) -> Result<(), Error> {
        if block.is_null() {
            return Err(Error::InvalidArgument("cannot push a null block"));
        }

        let link: *mut Block = block.cast();
        self.top.modify(|observed, desired| {
            // safe to re-run: nobody can reach `block` before the CAS
            unsafe { link.write(*observed) };
            *desired = block;
            true
        });
        Ok(())
    }

    /// Pops the most recently pushed block, or returns null if the stack is
    /// observed empty.
    ///
    /// # Safety
    ///
    /// Every block on the stack must still be valid for reads of its link
    /// word, which is the case whenever the callers honor the reclamation
    /// contract in the module documentation.
    pub unsafe fn pop(&self) -> Block {
        let mut top: Block = ptr::null_mut();
        self.top.modify(|observed, desired| {
            top = *observed;
            if top.is_null() {
                return false;
            }
            // reading the link of a block another thread may already have
            // popped is covered by the counter (DWCAS) or the exclusive
            // monitor (LL/SC): the enclosing modify retries in that case
            *desired = unsafe { top.cast::<Block>().read() };
            true
        });
        top
    }
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack").field("top", &*self.top).finish()
    }
}
