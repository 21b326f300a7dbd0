//! A shared mutable pointer as a thin convenience over [AbaCell].

use core::fmt;
use core::ptr;

use crate::aba::AbaCell;

/// An ABA-safe shared pointer to a `T`.
///
/// `AbaPtr` does not own or dereference its pointee; it only publishes the
/// pointer value itself, with the full [AbaCell] guarantees behind `set`.
pub struct AbaPtr<T> {
    cell: AbaCell<*mut T>,
}

impl<T> AbaPtr<T> {
    /// The alignment of the underlying cell.
    pub const ALIGNMENT: usize = AbaCell::<*mut T>::ALIGNMENT;

    /// Creates a pointer cell holding `init`.
    pub fn new(init: *mut T) -> Self {
        Self {
            cell: AbaCell::new(init),
        }
    }

    /// Creates a null pointer cell.
    pub fn null() -> Self {
        Self::new(ptr::null_mut())
    }

    /// Atomically publishes `pointer`.
    pub fn set(&self, pointer: *mut T) {
        self.cell.modify(|_observed, desired| {
            *desired = pointer;
            true
        });
    }

    /// Atomically reads the current pointer.
    pub fn get(&self) -> *mut T {
        self.cell.get()
    }

    /// The modification counter of the underlying cell. A testing hook; 0
    /// on LL/SC targets.
    pub fn get_counter(&self) -> u64 {
        self.cell.get_counter()
    }
}

impl<T> fmt::Debug for AbaPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AbaPtr").field(&self.cell).finish()
    }
}
