//! x86-64 double-word atomics.
//!
//! A "double word" here is two adjacent 64-bit words (`cmpxchg16b`) or two
//! adjacent 32-bit words, which fit in a single 64-bit register and need no
//! special instruction at all. `cmpxchg16b` is a full memory barrier; the
//! plain 64-bit `mov` paths rely on the x86-TSO guarantees (loads are
//! acquire, stores are release) plus the compiler barrier every `asm!` block
//! implies.
//!
//! `rbx` is reserved by the compiler, so the sequences that feed
//! `cmpxchg16b` swap it out and back around the instruction.
//!
//! With the `dwcas-sse` feature the 16-byte load and store go through an
//! aligned 128-bit vector move instead of a `cmpxchg16b` round trip. That is
//! only atomic on microarchitectures which guarantee it for aligned SSE
//! accesses; the feature is opt-in for that reason.

use core::arch::asm;

#[cfg(feature = "dwcas-sse")]
use core::sync::atomic::{fence, Ordering};

/// Atomically reads the 16-byte double word at `atomic`.
///
/// # Safety
///
/// `atomic` must be valid for reads and writes of 16 bytes and 16-byte
/// aligned. (The CAS-based read may write the observed value back.)
#[cfg(not(feature = "dwcas-sse"))]
pub unsafe fn dw_load_u64(atomic: *mut u64) -> [u64; 2] {
    let lo: u64;
    let hi: u64;
    // cmpxchg16b with expected == desired == 0: either the memory is zero and
    // zero is stored back, or rax:rdx is loaded with the actual contents.
    asm!(
        "xchg {tmp}, rbx",
        "lock cmpxchg16b xmmword ptr [{ptr}]",
        "mov rbx, {tmp}",
        ptr = in(reg) atomic,
        tmp = inout(reg) 0u64 => _,     // rbx: desired low
        in("rcx") 0u64,                 // rcx: desired high
        inout("rax") 0u64 => lo,        // rax: expected low, then observed low
        inout("rdx") 0u64 => hi,        // rdx: expected high, then observed high
        options(nostack),
    );
    [lo, hi]
}

/// Atomically reads the 16-byte double word at `atomic` via an aligned SSE
/// load.
///
/// # Safety
///
/// As for the `cmpxchg16b` variant; additionally the target must guarantee
/// that aligned 128-bit vector loads are atomic.
#[cfg(feature = "dwcas-sse")]
pub unsafe fn dw_load_u64(atomic: *mut u64) -> [u64; 2] {
    #[repr(align(16))]
    struct Target([u64; 2]);

    let mut target = Target([0; 2]);
    asm!(
        "movdqa xmm0, xmmword ptr [{src}]",
        "movdqa xmmword ptr [{dst}], xmm0",
        src = in(reg) atomic,
        dst = in(reg) target.0.as_mut_ptr(),
        out("xmm0") _,
        options(nostack),
    );
    fence(Ordering::Acquire);
    target.0
}

/// Atomically writes `desired` to the 16-byte double word at `atomic`.
///
/// # Safety
///
/// `atomic` must be valid for reads and writes of 16 bytes and 16-byte
/// aligned.
#[cfg(not(feature = "dwcas-sse"))]
pub unsafe fn dw_store_u64(atomic: *mut u64, desired: [u64; 2]) {
    // Read the current contents non-atomically as the first expected value,
    // then CAS until the store lands.
    asm!(
        "xchg {tmp}, rbx",
        "mov rax, qword ptr [{ptr}]",
        "mov rdx, qword ptr [{ptr} + 8]",
        "2:",
        "lock cmpxchg16b xmmword ptr [{ptr}]",
        "jne 2b",
        "mov rbx, {tmp}",
        ptr = in(reg) atomic,
        tmp = inout(reg) desired[0] => _,   // rbx: desired low
        in("rcx") desired[1],               // rcx: desired high
        out("rax") _,
        out("rdx") _,
        options(nostack),
    );
}

/// Atomically writes `desired` to the 16-byte double word at `atomic` via an
/// aligned SSE store.
///
/// # Safety
///
/// As for the `cmpxchg16b` variant; additionally the target must guarantee
/// that aligned 128-bit vector stores are atomic.
#[cfg(feature = "dwcas-sse")]
pub unsafe fn dw_store_u64(atomic: *mut u64, desired: [u64; 2]) {
    #[repr(align(16))]
    struct Source([u64; 2]);

    let source = Source(desired);
    fence(Ordering::Release);
    asm!(
        "movdqa xmm0, xmmword ptr [{src}]",
        "movdqa xmmword ptr [{dst}], xmm0",
        src = in(reg) source.0.as_ptr(),
        dst = in(reg) atomic,
        out("xmm0") _,
        options(nostack),
    );
}

/// Atomically compares the 16-byte double word at `atomic` against
/// `*expected` and, if equal, replaces it with `desired`.
///
/// Returns `true` on success; on failure `*expected` is updated with the
/// observed contents. Full memory barrier either way.
///
/// # Safety
///
/// `atomic` must be valid for reads and writes of 16 bytes and 16-byte
/// aligned.
pub unsafe fn dw_cas_u64(atomic: *mut u64, expected: &mut [u64; 2], desired: [u64; 2]) -> bool {
    let mut lo = expected[0];
    let mut hi = expected[1];
    let exchanged: u8;
    asm!(
        "xchg {tmp}, rbx",
        "lock cmpxchg16b xmmword ptr [{ptr}]",
        "sete {ok}",
        "mov rbx, {tmp}",
        ptr = in(reg) atomic,
        tmp = inout(reg) desired[0] => _,   // rbx: desired low
        in("rcx") desired[1],               // rcx: desired high
        inout("rax") lo,                    // rax: expected low / observed low
        inout("rdx") hi,                    // rdx: expected high / observed high
        ok = out(reg_byte) exchanged,
        options(nostack),
    );
    expected[0] = lo;
    expected[1] = hi;
    exchanged != 0
}

/// Atomically reads the 32-bit pair at `atomic`.
///
/// # Safety
///
/// `atomic` must be valid for reads of 8 bytes and 8-byte aligned.
pub unsafe fn dw_load_u32(atomic: *mut u32) -> [u32; 2] {
    let both: u64;
    // An aligned 64-bit mov is atomic and acquire under x86-TSO.
    asm!(
        "mov {val}, qword ptr [{ptr}]",
        val = out(reg) both,
        ptr = in(reg) atomic,
        options(nostack),
    );
    split(both)
}

/// Atomically writes the 32-bit pair `desired` to `atomic`.
///
/// # Safety
///
/// `atomic` must be valid for writes of 8 bytes and 8-byte aligned.
pub unsafe fn dw_store_u32(atomic: *mut u32, desired: [u32; 2]) {
    // An aligned 64-bit mov is atomic and release under x86-TSO.
    asm!(
        "mov qword ptr [{ptr}], {val}",
        ptr = in(reg) atomic,
        val = in(reg) combine(desired),
        options(nostack),
    );
}

/// Atomically compares the 32-bit pair at `atomic` against `*expected` and,
/// if equal, replaces it with `desired`.
///
/// Returns `true` on success; on failure `*expected` is updated with the
/// observed contents. Full memory barrier either way.
///
/// # Safety
///
/// `atomic` must be valid for reads and writes of 8 bytes and 8-byte
/// aligned.
pub unsafe fn dw_cas_u32(atomic: *mut u32, expected: &mut [u32; 2], desired: [u32; 2]) -> bool {
    let mut observed = combine(*expected);
    let exchanged: u8;
    asm!(
        "lock cmpxchg qword ptr [{ptr}], {des}",
        "sete {ok}",
        ptr = in(reg) atomic,
        des = in(reg) combine(desired),
        inout("rax") observed,
        ok = out(reg_byte) exchanged,
        options(nostack),
    );
    *expected = split(observed);
    exchanged != 0
}

// Word order of a pair in memory: index 0 at the lower address, which on
// little-endian x86 is the low half of the combined 64-bit value.
#[inline(always)]
fn combine(pair: [u32; 2]) -> u64 {
    (u64::from(pair[1]) << 32) | u64::from(pair[0])
}

#[inline(always)]
fn split(both: u64) -> [u32; 2] {
    [both as u32, (both >> 32) as u32]
}
