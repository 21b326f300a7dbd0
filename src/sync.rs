//! Selects the atomic primitives backing [crate::atomic::Atomic]: the real
//! ones from `std`/`core`, or the instrumented ones from `loom`/`shuttle`
//! when the futex state machine is being model-checked.

cfg_if::cfg_if! {
    if #[cfg(loom)] {
        pub(crate) use loom::sync::atomic::{
            fence, AtomicBool, AtomicI32, AtomicIsize, AtomicPtr, AtomicU32, AtomicU8,
            AtomicUsize,
        };
        #[cfg(target_has_atomic = "64")]
        pub(crate) use loom::sync::atomic::{AtomicI64, AtomicU64};
        pub(crate) use loom::thread;
    } else if #[cfg(feature = "shuttle")] {
        pub(crate) use shuttle::sync::atomic::{
            fence, AtomicBool, AtomicI32, AtomicIsize, AtomicPtr, AtomicU32, AtomicU8,
            AtomicUsize,
        };
        #[cfg(target_has_atomic = "64")]
        pub(crate) use shuttle::sync::atomic::{AtomicI64, AtomicU64};
        pub(crate) use shuttle::thread;
    } else {
        pub(crate) use core::sync::atomic::{
            fence, AtomicBool, AtomicI32, AtomicIsize, AtomicPtr, AtomicU32, AtomicU8,
            AtomicUsize,
        };
        #[cfg(target_has_atomic = "64")]
        pub(crate) use core::sync::atomic::{AtomicI64, AtomicU64};
    }
}

// The signal fence is a pure compiler barrier; the model checkers have no
// notion of it, so it always comes from core.
pub(crate) use core::sync::atomic::compiler_fence;
