//! Per-architecture atomic sequences the ABA layer is built on.
//!
//! Exactly one of two shapes is compiled in, selected by the target
//! architecture:
//!
//! - **DWCAS** (x86-64, i686): atomic double-word load / store /
//!   compare-and-swap over two adjacent machine words.
//! - **LL/SC** (aarch64, 32-bit ARMv7/v8): exclusive load-acquire /
//!   store-release plus an explicit monitor abort.
//!
//! The two shapes expose disjoint operation sets; [crate::aba::AbaCell] is
//! written once per shape. The raw operations are public so primitives
//! outside this crate can build on them, but every one of them is `unsafe`:
//! the pointer must be valid, naturally aligned for the access (double-word
//! aligned for the DWCAS operations) and only ever accessed through these
//! operations while shared.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod x86_64;
        pub(crate) use self::x86_64 as backend;

        /// The ABA strategy available on this target.
        pub const ABA_SOLUTION: AbaSolution = AbaSolution::Dwcas;
        /// The register width of this target.
        pub const PLATFORM_WIDTH: PlatformWidth = PlatformWidth::Width64;
    } else if #[cfg(target_arch = "x86")] {
        pub mod x86;
        pub(crate) use self::x86 as backend;

        /// The ABA strategy available on this target.
        pub const ABA_SOLUTION: AbaSolution = AbaSolution::Dwcas;
        /// The register width of this target.
        pub const PLATFORM_WIDTH: PlatformWidth = PlatformWidth::Width32;
    } else if #[cfg(target_arch = "aarch64")] {
        pub mod aarch64;
        pub(crate) use self::aarch64 as backend;

        /// The ABA strategy available on this target.
        pub const ABA_SOLUTION: AbaSolution = AbaSolution::Llsc;
        /// The register width of this target.
        pub const PLATFORM_WIDTH: PlatformWidth = PlatformWidth::Width64;
    } else if #[cfg(target_arch = "arm")] {
        pub mod arm;
        pub(crate) use self::arm as backend;

        /// The ABA strategy available on this target.
        pub const ABA_SOLUTION: AbaSolution = AbaSolution::Llsc;
        /// The register width of this target.
        pub const PLATFORM_WIDTH: PlatformWidth = PlatformWidth::Width32;
    } else {
        compile_error!("unsupported target architecture: neither DWCAS nor LL/SC backend available");
    }
}

/// How a target prevents the ABA hazard in a read-modify-write loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbaSolution {
    /// Double-word compare-and-swap over a `(value, counter)` pair.
    Dwcas,
    /// Load-linked / store-conditional through the exclusive monitor.
    Llsc,
}

/// Register width of the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformWidth {
    /// 32-bit registers.
    Width32,
    /// 64-bit registers.
    Width64,
}

impl PlatformWidth {
    /// The width in bits.
    pub const fn bits(self) -> u32 {
        match self {
            Self::Width32 => 32,
            Self::Width64 => 64,
        }
    }
}
