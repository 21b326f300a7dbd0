//! ABA-safe atomic read-modify-write over a single machine word.
//!
//! [AbaCell] wraps an integer or pointer value so it can be modified with a
//! caller-supplied function inside a retry loop without being exposed to the
//! ABA hazard:
//!
//! - On DWCAS targets (x86-64, i686) the cell is a `(value, counter)` pair
//!   addressed as one double word. Every successful modification increments
//!   the counter, so a compare-and-swap can only succeed against a snapshot
//!   nothing has touched in between. A collision would require exactly
//!   2^width successful modifications between an observer's load and its
//!   CAS, which is treated as negligible.
//! - On LL/SC targets (aarch64, 32-bit ARM) the cell is a single word and
//!   the exclusive monitor invalidates the conditional store whenever any
//!   writer touched the word, independent of value identity. No counter is
//!   needed.
//!
//! The modifier function runs inside the atomic sequence (between the
//! exclusive load and store on LL/SC). It must be short, must not touch the
//! same cell, and must not write to memory observable by other threads; it
//! may be invoked any number of times and its output is discarded on retry.

use core::cell::UnsafeCell;
use core::fmt;
use core::mem;

mod sealed {
    pub trait Sealed {}
}

/// Values an [AbaCell] can hold: integers and thin pointers of 32 or 64
/// bits, no wider than the target's atomic word.
///
/// The trait is sealed; its items are an implementation detail.
pub trait AbaAtom: Copy + sealed::Sealed {
    /// The unsigned word the value aliases in the cell.
    #[doc(hidden)]
    type Base: Base;

    #[doc(hidden)]
    fn into_base(self) -> Self::Base;
    #[doc(hidden)]
    fn from_base(base: Self::Base) -> Self;
}

macro_rules! impl_atom {
    ($ty:ty, $base:ty) => {
        impl sealed::Sealed for $ty {}

        impl AbaAtom for $ty {
            type Base = $base;

            fn into_base(self) -> Self::Base {
                self as $base
            }

            fn from_base(base: Self::Base) -> Self {
                base as $ty
            }
        }
    };
}

impl_atom!(i32, u32);
impl_atom!(u32, u32);
#[cfg(target_pointer_width = "64")]
impl_atom!(i64, u64);
#[cfg(target_pointer_width = "64")]
impl_atom!(u64, u64);
#[cfg(target_pointer_width = "64")]
impl_atom!(isize, u64);
#[cfg(target_pointer_width = "64")]
impl_atom!(usize, u64);
#[cfg(target_pointer_width = "32")]
impl_atom!(isize, u32);
#[cfg(target_pointer_width = "32")]
impl_atom!(usize, u32);

#[cfg(target_pointer_width = "64")]
type PtrBase = u64;
#[cfg(target_pointer_width = "32")]
type PtrBase = u32;

impl<X> sealed::Sealed for *mut X {}

impl<X> AbaAtom for *mut X {
    type Base = PtrBase;

    fn into_base(self) -> Self::Base {
        self as usize as PtrBase
    }

    fn from_base(base: Self::Base) -> Self {
        base as usize as *mut X
    }
}

cfg_if::cfg_if! {
    if #[cfg(any(target_arch = "x86_64", target_arch = "x86"))] {
        use crate::asm::backend;

        /// Base-word plumbing between [AbaCell] and the platform backend.
        #[doc(hidden)]
        pub trait Base: Copy + Eq + sealed::Sealed {
            /// Pair storage with the double-word alignment the CAS needs.
            type Pair;

            fn make_pair(words: [Self; 2]) -> Self::Pair;
            fn one() -> Self;
            fn wrapping_increment(self) -> Self;
            fn widen(self) -> u64;

            /// # Safety
            /// `words` must point at a live, properly aligned pair.
            unsafe fn dw_load(words: *mut Self) -> [Self; 2];
            /// # Safety
            /// `words` must point at a live, properly aligned pair.
            unsafe fn dw_cas(
                words: *mut Self,
                expected: &mut [Self; 2],
                desired: [Self; 2],
            ) -> bool;
        }

        /// A 32-bit pair addressable as one 64-bit double word.
        #[derive(Debug)]
        #[doc(hidden)]
        #[repr(C, align(8))]
        pub struct Pair32(pub [u32; 2]);

        impl Base for u32 {
            type Pair = Pair32;

            fn make_pair(words: [Self; 2]) -> Self::Pair {
                Pair32(words)
            }

            fn one() -> Self {
                1
            }

            fn wrapping_increment(self) -> Self {
                self.wrapping_add(1)
            }

            fn widen(self) -> u64 {
                u64::from(self)
            }

            unsafe fn dw_load(words: *mut Self) -> [Self; 2] {
                backend::dw_load_u32(words)
            }

            unsafe fn dw_cas(
                words: *mut Self,
                expected: &mut [Self; 2],
                desired: [Self; 2],
            ) -> bool {
                backend::dw_cas_u32(words, expected, desired)
            }
        }

        /// A 64-bit pair addressable as one 128-bit double word.
        #[derive(Debug)]
        #[cfg(target_arch = "x86_64")]
        #[doc(hidden)]
        #[repr(C, align(16))]
        pub struct Pair64(pub [u64; 2]);

        #[cfg(target_arch = "x86_64")]
        impl Base for u64 {
            type Pair = Pair64;

            fn make_pair(words: [Self; 2]) -> Self::Pair {
                Pair64(words)
            }

            fn one() -> Self {
                1
            }

            fn wrapping_increment(self) -> Self {
                self.wrapping_add(1)
            }

            fn widen(self) -> u64 {
                self
            }

            unsafe fn dw_load(words: *mut Self) -> [Self; 2] {
                backend::dw_load_u64(words)
            }

            unsafe fn dw_cas(
                words: *mut Self,
                expected: &mut [Self; 2],
                desired: [Self; 2],
            ) -> bool {
                backend::dw_cas_u64(words, expected, desired)
            }
        }

        /// An ABA-safe atomic cell over an integer or pointer value.
        ///
        /// On this target the cell is a `(value, counter)` double word; see
        /// the module documentation for the hazard coverage argument. The
        /// cell must stay at its natural double-word alignment
        /// ([AbaCell::ALIGNMENT]) when embedded in larger structures.
        pub struct AbaCell<T: AbaAtom> {
            content: UnsafeCell<<T::Base as Base>::Pair>,
        }

        // The cell is a shared atomic container; pointer values are carried
        // as plain words, like AtomicPtr does.
        unsafe impl<T: AbaAtom> Send for AbaCell<T> {}
        unsafe impl<T: AbaAtom> Sync for AbaCell<T> {}

        impl<T: AbaAtom> AbaCell<T> {
            /// The alignment the cell requires: twice the base word size.
            pub const ALIGNMENT: usize = mem::align_of::<Self>();

            /// Creates a cell holding `init`, with the modification counter
            /// at 1.
            pub fn new(init: T) -> Self {
                Self {
                    content: UnsafeCell::new(<T::Base as Base>::make_pair([
                        init.into_base(),
                        <T::Base as Base>::one(),
                    ])),
                }
            }

            #[cfg(test)]
            fn with_counter(init: T, counter: T::Base) -> Self {
                Self {
                    content: UnsafeCell::new(<T::Base as Base>::make_pair([
                        init.into_base(),
                        counter,
                    ])),
                }
            }

            fn words(&self) -> *mut T::Base {
                self.content.get().cast()
            }

            /// Atomically reads the value.
            pub fn get(&self) -> T {
                let words: [T::Base; 2] = unsafe { <T::Base as Base>::dw_load(self.words()) };
                T::from_base(words[0])
            }

            /// The current modification counter. A testing hook; 0 on LL/SC
            /// targets, where no counter exists.
            pub fn get_counter(&self) -> u64 {
                let words: [T::Base; 2] = unsafe { <T::Base as Base>::dw_load(self.words()) };
                words[1].widen()
            }

            /// Atomically replaces the value with one proposed by
            /// `modifier`, retrying on contention.
            ///
            /// `modifier` receives the observed value and a slot for the
            /// desired one, pre-filled with the observed value. Returning
            /// `false` abandons the operation and leaves the cell untouched;
            /// `modify` then returns `false`. When `modify` returns `true`,
            /// the cell transitioned atomically from the last observed value
            /// passed to `modifier` to the corresponding desired value, and
            /// the counter advanced by exactly one.
            ///
            /// `modifier` may run any number of times, so it must be pure
            /// apart from reads of shared memory, and it must not operate on
            /// this cell.
            pub fn modify<F>(&self, mut modifier: F) -> bool
            where
                F: FnMut(&T, &mut T) -> bool,
            {
                let words: *mut T::Base = self.words();
                let mut observed: [T::Base; 2] = unsafe { <T::Base as Base>::dw_load(words) };
                loop {
                    let value: T = T::from_base(observed[0]);
                    let mut desired_value: T = value;
                    if !modifier(&value, &mut desired_value) {
                        return false;
                    }

                    let desired: [T::Base; 2] =
                        [desired_value.into_base(), observed[1].wrapping_increment()];
                    // on failure the CAS refreshes `observed` with the
                    // actual pair contents
                    if unsafe { <T::Base as Base>::dw_cas(words, &mut observed, desired) } {
                        return true;
                    }
                }
            }
        }

        impl<T: AbaAtom> fmt::Debug for AbaCell<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let words: [T::Base; 2] = unsafe { <T::Base as Base>::dw_load(self.words()) };
                f.debug_struct("AbaCell")
                    .field("value", &words[0].widen())
                    .field("counter", &words[1].widen())
                    .finish()
            }
        }
    } else if #[cfg(any(target_arch = "aarch64", target_arch = "arm"))] {
        use crate::asm::backend;

        /// Base-word plumbing between [AbaCell] and the platform backend.
        #[doc(hidden)]
        pub trait Base: Copy + Eq + sealed::Sealed {
            fn widen(self) -> u64;

            /// # Safety
            /// `word` must point at a live, naturally aligned word.
            unsafe fn load_acquire(word: *mut Self) -> Self;
            /// # Safety
            /// `word` must point at a live, naturally aligned word.
            unsafe fn excl_load_acquire(word: *mut Self) -> Self;
            /// # Safety
            /// `word` must point at a live, naturally aligned word.
            unsafe fn excl_store_release(word: *mut Self, value: Self) -> bool;
            /// # Safety
            /// `word` must point at a live, naturally aligned word.
            unsafe fn excl_abort(word: *mut Self);
        }

        impl Base for u32 {
            fn widen(self) -> u64 {
                u64::from(self)
            }

            unsafe fn load_acquire(word: *mut Self) -> Self {
                core::sync::atomic::AtomicU32::from_ptr(word)
                    .load(core::sync::atomic::Ordering::Acquire)
            }

            unsafe fn excl_load_acquire(word: *mut Self) -> Self {
                backend::excl_load_acquire_u32(word)
            }

            unsafe fn excl_store_release(word: *mut Self, value: Self) -> bool {
                backend::excl_store_release_u32(word, value)
            }

            unsafe fn excl_abort(word: *mut Self) {
                backend::excl_abort_u32(word)
            }
        }

        #[cfg(target_arch = "aarch64")]
        impl Base for u64 {
            fn widen(self) -> u64 {
                self
            }

            unsafe fn load_acquire(word: *mut Self) -> Self {
                core::sync::atomic::AtomicU64::from_ptr(word)
                    .load(core::sync::atomic::Ordering::Acquire)
            }

            unsafe fn excl_load_acquire(word: *mut Self) -> Self {
                backend::excl_load_acquire_u64(word)
            }

            unsafe fn excl_store_release(word: *mut Self, value: Self) -> bool {
                backend::excl_store_release_u64(word, value)
            }

            unsafe fn excl_abort(word: *mut Self) {
                backend::excl_abort_u64(word)
            }
        }

        /// An ABA-safe atomic cell over an integer or pointer value.
        ///
        /// On this target the cell is a single word and the exclusive
        /// monitor provides the ABA guarantee; there is no counter.
        pub struct AbaCell<T: AbaAtom> {
            content: UnsafeCell<T::Base>,
        }

        // The cell is a shared atomic container; pointer values are carried
        // as plain words, like AtomicPtr does.
        unsafe impl<T: AbaAtom> Send for AbaCell<T> {}
        unsafe impl<T: AbaAtom> Sync for AbaCell<T> {}

        impl<T: AbaAtom> AbaCell<T> {
            /// The alignment the cell requires: the base word size.
            pub const ALIGNMENT: usize = mem::align_of::<Self>();

            /// Creates a cell holding `init`.
            pub fn new(init: T) -> Self {
                Self {
                    content: UnsafeCell::new(init.into_base()),
                }
            }

            fn word(&self) -> *mut T::Base {
                self.content.get()
            }

            /// Atomically reads the value.
            pub fn get(&self) -> T {
                T::from_base(unsafe { <T::Base as Base>::load_acquire(self.word()) })
            }

            /// The current modification counter. A testing hook; always 0 on
            /// this target, where the exclusive monitor replaces the
            /// counter.
            pub fn get_counter(&self) -> u64 {
                0
            }

            /// Atomically replaces the value with one proposed by
            /// `modifier`, retrying on contention.
            ///
            /// `modifier` receives the observed value and a slot for the
            /// desired one, pre-filled with the observed value. Returning
            /// `false` abandons the operation, clears the exclusive monitor
            /// and leaves the cell untouched; `modify` then returns `false`.
            /// When `modify` returns `true`, the cell transitioned
            /// atomically from the last observed value passed to `modifier`
            /// to the corresponding desired value.
            ///
            /// `modifier` runs between the exclusive load and the exclusive
            /// store, so it must be short, pure apart from reads of shared
            /// memory, and must not operate on this cell.
            pub fn modify<F>(&self, mut modifier: F) -> bool
            where
                F: FnMut(&T, &mut T) -> bool,
            {
                let word: *mut T::Base = self.word();
                loop {
                    let observed: T::Base = unsafe { <T::Base as Base>::excl_load_acquire(word) };

                    let value: T = T::from_base(observed);
                    let mut desired_value: T = value;
                    if !modifier(&value, &mut desired_value) {
                        unsafe { <T::Base as Base>::excl_abort(word) };
                        return false;
                    }

                    if unsafe {
                        <T::Base as Base>::excl_store_release(word, desired_value.into_base())
                    } {
                        return true;
                    }
                }
            }
        }

        impl<T: AbaAtom> fmt::Debug for AbaCell<T> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let word: u64 =
                    unsafe { <T::Base as Base>::load_acquire(self.word()) }.widen();
                f.debug_struct("AbaCell").field("value", &word).finish()
            }
        }
    }
}
