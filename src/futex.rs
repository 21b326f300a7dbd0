//! A fast user-space mutex over the Linux private-futex syscall.
//!
//! [FutexWord] carries the raw futex operations over a single atomic `i32`
//! so further primitives can be built on the same word; [Futex] is the
//! three-state sleeping mutex from Ulrich Drepper's "Futexes Are Tricky"
//! layered on top of it.
//!
//! Only private (intra-process) futexes are issued; there is no
//! cross-process mode and no priority inheritance.

use core::time::Duration;

#[cfg(not(any(loom, feature = "shuttle")))]
use core::ptr;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::atomic::{Atomic, Ordering};
use crate::err::{Error, OsError};

/// Operation codes for [FutexWord::wake_op].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Op {
    /// `*addr2 = op_arg`
    Set = 0,
    /// `*addr2 += op_arg`
    Add = 1,
    /// `*addr2 |= op_arg`
    Or = 2,
    /// `*addr2 &= !op_arg`
    AndN = 3,
    /// `*addr2 ^= op_arg`
    Xor = 4,
}

/// Whether the op argument of [FutexWord::wake_op] is used directly or as a
/// shift count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum OpArgShift {
    /// Use `op_arg` as-is.
    Direct = 0,
    /// Use `1 << op_arg`.
    Shift = 1,
}

/// Comparison codes for [FutexWord::wake_op].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Cmp {
    /// old value == cmp_arg
    Eq = 0,
    /// old value != cmp_arg
    Ne = 1,
    /// old value < cmp_arg
    Lt = 2,
    /// old value <= cmp_arg
    Le = 3,
    /// old value > cmp_arg
    Gt = 4,
    /// old value >= cmp_arg
    Ge = 5,
}

// FUTEX_WAKE_OP control word: shift flag in bit 31, op in bits 30..28,
// comparison in bits 27..24, then two 12-bit arguments.
#[cfg(not(any(loom, feature = "shuttle")))]
fn wake_op_control(
    op: Op,
    op_arg_shift: OpArgShift,
    cmp: Cmp,
    op_arg: u16,
    cmp_arg: u16,
) -> i32 {
    let control: u32 = ((op_arg_shift as u32) << 31)
        | ((op as u32) << 28)
        | ((cmp as u32) << 24)
        | (u32::from(op_arg & 0x0FFF) << 12)
        | u32::from(cmp_arg & 0x0FFF);
    control as i32
}

/// An atomic `i32` with the raw private-futex operations of the kernel.
///
/// Higher-level primitives ([Futex] here, others outside this crate) share
/// this word between their user-space fast path and the kernel's wait
/// queue.
#[derive(Debug)]
pub struct FutexWord {
    value: Atomic<i32>,
}

impl FutexWord {
    /// Creates a futex word holding `init`.
    pub fn new(init: i32) -> Self {
        Self {
            value: Atomic::new(init),
        }
    }

    /// The atomic value the kernel operations act on.
    pub fn value(&self) -> &Atomic<i32> {
        &self.value
    }
}

#[cfg(not(any(loom, feature = "shuttle")))]
impl FutexWord {
    fn addr(&self) -> *mut i32 {
        self.value.as_ptr()
    }

    fn syscall_futex(
        addr: *mut i32,
        futex_op: libc::c_int,
        value: i32,
        timeout: *const libc::timespec,
        addr2: *mut i32,
        value3: i32,
    ) -> libc::c_long {
        unsafe { libc::syscall(libc::SYS_futex, addr, futex_op, value, timeout, addr2, value3) }
    }

    // FUTEX_CMP_REQUEUE and FUTEX_WAKE_OP pass a count where FUTEX_WAIT
    // passes the timeout pointer.
    fn syscall_futex_val2(
        addr: *mut i32,
        futex_op: libc::c_int,
        value: i32,
        value2: u32,
        addr2: *mut i32,
        value3: i32,
    ) -> libc::c_long {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                addr,
                futex_op,
                value,
                value2 as libc::c_ulong,
                addr2,
                value3,
            )
        }
    }

    fn last_errno() -> i32 {
        std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
    }

    /// Sleeps until woken, as long as the word still holds `expected`.
    ///
    /// The kernel re-checks `expected` under its own lock and fails with
    /// `EAGAIN` when the word changed first; `EINTR` reports an interrupting
    /// signal, `ETIMEDOUT` an expired relative timeout. All three are
    /// normal outcomes a caller is expected to absorb.
    pub fn wait(&self, expected: i32, timeout_relative: Option<Duration>) -> Result<(), OsError> {
        let timeout: Option<libc::timespec> = timeout_relative.map(timespec_from);
        let timeout_pointer: *const libc::timespec =
            timeout.as_ref().map_or(ptr::null(), |timespec| timespec);

        let rc: libc::c_long = Self::syscall_futex(
            self.addr(),
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            timeout_pointer,
            ptr::null_mut(),
            0,
        );
        if rc != 0 {
            return Err(OsError {
                errno: Self::last_errno(),
                context: "futex_wait",
            });
        }
        Ok(())
    }

    /// Wakes up to `wakeups` waiters; returns the number actually woken.
    pub fn wake(&self, wakeups: i32) -> Result<i32, OsError> {
        let rc: libc::c_long = Self::syscall_futex(
            self.addr(),
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            wakeups,
            ptr::null(),
            ptr::null_mut(),
            0,
        );
        if rc < 0 {
            return Err(OsError {
                errno: Self::last_errno(),
                context: "futex_wake",
            });
        }
        Ok(rc as i32)
    }

    /// Wakes up to `wakeups` waiters and requeues up to `limit` further
    /// waiters onto `target`, provided the word still holds `expected`.
    ///
    /// Returns the number of woken plus requeued waiters. (The unconditional
    /// `FUTEX_REQUEUE` is proved broken and unusable, so there is no wrapper
    /// for it.)
    pub fn cmp_requeue(
        &self,
        wakeups: i32,
        limit: u32,
        target: &FutexWord,
        expected: i32,
    ) -> Result<i32, OsError> {
        let rc: libc::c_long = Self::syscall_futex_val2(
            self.addr(),
            libc::FUTEX_CMP_REQUEUE | libc::FUTEX_PRIVATE_FLAG,
            wakeups,
            limit,
            target.addr(),
            expected,
        );
        if rc < 0 {
            return Err(OsError {
                errno: Self::last_errno(),
                context: "futex_cmp_requeue",
            });
        }
        Ok(rc as i32)
    }

    /// Atomically applies `op` with `op_arg` to `second`'s word, wakes up
    /// to `wakeups` waiters here and, if the comparison on `second`'s old
    /// value holds, up to `wakeups_second` waiters there.
    #[allow(clippy::too_many_arguments)]
    pub fn wake_op(
        &self,
        wakeups: i32,
        wakeups_second: u32,
        second: &FutexWord,
        cmp: Cmp,
        cmp_arg: u16,
        op: Op,
        op_arg: u16,
        op_arg_shift: OpArgShift,
    ) -> Result<i32, OsError> {
        let rc: libc::c_long = Self::syscall_futex_val2(
            self.addr(),
            libc::FUTEX_WAKE_OP | libc::FUTEX_PRIVATE_FLAG,
            wakeups,
            wakeups_second,
            second.addr(),
            wake_op_control(op, op_arg_shift, cmp, op_arg, cmp_arg),
        );
        if rc < 0 {
            return Err(OsError {
                errno: Self::last_errno(),
                context: "futex_wake_op",
            });
        }
        Ok(rc as i32)
    }

    /// As [FutexWord::wait], restricted to wake-ups whose mask intersects
    /// `mask`, with an absolute `CLOCK_MONOTONIC` timeout.
    pub fn wait_bitset(
        &self,
        mask: u32,
        expected: i32,
        timeout_absolute: Option<libc::timespec>,
    ) -> Result<(), OsError> {
        let timeout_pointer: *const libc::timespec = timeout_absolute
            .as_ref()
            .map_or(ptr::null(), |timespec| timespec);

        let rc: libc::c_long = Self::syscall_futex(
            self.addr(),
            libc::FUTEX_WAIT_BITSET | libc::FUTEX_PRIVATE_FLAG,
            expected,
            timeout_pointer,
            ptr::null_mut(),
            mask as i32,
        );
        if rc != 0 {
            return Err(OsError {
                errno: Self::last_errno(),
                context: "futex_wait_bitset",
            });
        }
        Ok(())
    }

    /// Wakes up to `wakeups` waiters whose wait mask intersects `mask`;
    /// returns the number actually woken.
    pub fn wake_bitset(&self, mask: u32, wakeups: i32) -> Result<i32, OsError> {
        let rc: libc::c_long = Self::syscall_futex(
            self.addr(),
            libc::FUTEX_WAKE_BITSET | libc::FUTEX_PRIVATE_FLAG,
            wakeups,
            ptr::null(),
            ptr::null_mut(),
            mask as i32,
        );
        if rc < 0 {
            return Err(OsError {
                errno: Self::last_errno(),
                context: "futex_wake_bitset",
            });
        }
        Ok(rc as i32)
    }
}

// Under the model checkers the kernel queue does not exist: a wait becomes
// a scheduler yield (after the same expected-value check the kernel would
// perform) and a wake is a no-op. The three-state machine above stays
// fully exercised.
#[cfg(any(loom, feature = "shuttle"))]
impl FutexWord {
    /// Model-checked stand-in for the kernel wait.
    pub fn wait(
        &self,
        expected: i32,
        _timeout_relative: Option<Duration>,
    ) -> Result<(), OsError> {
        if self.value.load(Ordering::SeqCst) != expected {
            return Err(OsError {
                errno: libc::EAGAIN,
                context: "futex_wait",
            });
        }
        crate::sync::thread::yield_now();
        Ok(())
    }

    /// Model-checked stand-in for the kernel wake.
    pub fn wake(&self, _wakeups: i32) -> Result<i32, OsError> {
        Ok(0)
    }
}

#[cfg(not(any(loom, feature = "shuttle")))]
fn timespec_from(duration: Duration) -> libc::timespec {
    libc::timespec {
        tv_sec: duration.as_secs() as libc::time_t,
        tv_nsec: duration.subsec_nanos() as _,
    }
}

const UNLOCKED: i32 = 0;
const LOCKED_NO_WAITERS: i32 = 1;
const LOCKED_WAITERS: i32 = 2;

/// A three-state futex-backed mutex.
///
/// The word is `UNLOCKED` (0), `LOCKED_NO_WAITERS` (1) or `LOCKED_WAITERS`
/// (2). An uncontended lock and unlock never enter the kernel; a contender
/// advertises itself by exchanging the word to `LOCKED_WAITERS` before
/// sleeping, and an unlocker only issues a wake after observing that state.
///
/// Ownership is advisory: nothing records which thread holds the mutex, and
/// unlocking from a non-owner corrupts the protocol. The mutex must not be
/// dropped while locked or while waiters exist.
#[derive(Debug)]
pub struct Futex {
    word: FutexWord,
}

impl Futex {
    /// Creates an unlocked mutex.
    pub fn new() -> Self {
        Self {
            word: FutexWord::new(UNLOCKED),
        }
    }

    /// Creates a mutex already owned by the caller.
    pub fn new_locked() -> Self {
        Self {
            word: FutexWord::new(LOCKED_NO_WAITERS),
        }
    }

    /// Acquires the mutex, sleeping in the kernel while it is contended.
    ///
    /// Fails only when the futex syscall reports an errno other than
    /// `EAGAIN`/`EINTR`; the locking attempt is then abandoned.
    pub fn lock(&self) -> Result<(), Error> {
        let mut expected: i32 = UNLOCKED;
        // critical section follows on success, hence acquire
        if !self.word.value().compare_exchange(
            &mut expected,
            LOCKED_NO_WAITERS,
            Ordering::Acquire,
            Ordering::Relaxed,
        ) {
            self.wait(expected)?;
        }
        Ok(())
    }

    /// Acquires the mutex iff it is free right now.
    pub fn trylock(&self) -> bool {
        let mut expected: i32 = UNLOCKED;
        self.word.value().compare_exchange(
            &mut expected,
            LOCKED_NO_WAITERS,
            Ordering::Acquire,
            Ordering::Relaxed,
        )
    }

    /// As [Futex::lock], giving up after `timeout_relative`.
    ///
    /// Returns `Ok(true)` iff ownership was acquired before the timeout.
    pub fn trylock_timeout(&self, timeout_relative: Duration) -> Result<bool, Error> {
        let mut expected: i32 = UNLOCKED;
        if self.word.value().compare_exchange(
            &mut expected,
            LOCKED_NO_WAITERS,
            Ordering::Acquire,
            Ordering::Relaxed,
        ) {
            return Ok(true);
        }
        self.wait_timeout(expected, timeout_relative)
    }

    /// Releases the mutex and wakes one waiter if any advertised itself.
    ///
    /// Must only be called by the current owner.
    pub fn unlock(&self) -> Result<(), Error> {
        // critical section precedes, hence release
        if self.word.value().fetch_sub(1, Ordering::Release) == LOCKED_WAITERS {
            self.wake()?;
        }
        Ok(())
    }

    #[cfg_attr(feature = "tracing", instrument)]
    fn wait(&self, mut cached_state: i32) -> Result<(), Error> {
        // not the owner: advertise a waiter so the unlocker knows to wake
        if cached_state != LOCKED_WAITERS {
            cached_state = self.word.value().exchange(LOCKED_WAITERS, Ordering::Acquire);
        }

        while cached_state != UNLOCKED {
            match self.word.wait(LOCKED_WAITERS, None) {
                Ok(()) => {}
                Err(error) if error.errno == libc::EAGAIN || error.errno == libc::EINTR => {}
                Err(error) => return Err(Error::Os(error)),
            }
            // might be the last atomic operation before the critical
            // section, hence acquire
            cached_state = self.word.value().exchange(LOCKED_WAITERS, Ordering::Acquire);
        }
        Ok(())
    }

    #[cfg_attr(feature = "tracing", instrument)]
    fn wait_timeout(
        &self,
        mut cached_state: i32,
        timeout_relative: Duration,
    ) -> Result<bool, Error> {
        if cached_state != LOCKED_WAITERS {
            cached_state = self.word.value().exchange(LOCKED_WAITERS, Ordering::Acquire);
        }

        while cached_state != UNLOCKED {
            match self.word.wait(LOCKED_WAITERS, Some(timeout_relative)) {
                Ok(()) => {}
                Err(error) if error.errno == libc::EAGAIN || error.errno == libc::EINTR => {}
                Err(error) if error.errno == libc::ETIMEDOUT => return Ok(false),
                Err(error) => return Err(Error::Os(error)),
            }
            cached_state = self.word.value().exchange(LOCKED_WAITERS, Ordering::Acquire);
        }
        Ok(true)
    }

    #[cfg_attr(feature = "tracing", instrument)]
    fn wake(&self) -> Result<(), Error> {
        // the release already happened in unlock's fetch_sub
        self.word.value().store(UNLOCKED, Ordering::Relaxed);
        self.word.wake(1)?;
        Ok(())
    }
}

impl Default for Futex {
    fn default() -> Self {
        Self::new()
    }
}
