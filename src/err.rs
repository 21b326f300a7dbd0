use displaydoc::Display;

/// An error raised by one of the fallible operations in this crate.
///
/// The lock-free primitives ([AbaCell], [AbaPtr] and the atomic wrapper) are
/// infallible and never produce one of these; only the stack's argument
/// validation, the futex syscall paths and the sysconf queries do.
///
/// [AbaCell]: crate::aba::AbaCell
/// [AbaPtr]: crate::concurrent_ptr::AbaPtr
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[ignore_extra_doc_attributes]
pub enum Error {
    /// invalid argument: {0}
    InvalidArgument(&'static str),

    /// {0}
    Os(OsError),
}

impl From<OsError> for Error {
    fn from(error: OsError) -> Self {
        Self::Os(error)
    }
}

/// {context} failed with errno {errno}
///
/// Raised when a syscall fails with an errno value the caller cannot absorb.
/// Retryable errno values (`EAGAIN`, `EINTR` and, on the timed paths,
/// `ETIMEDOUT`) are handled inside the futex slow paths and never surface
/// through this type.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
#[ignore_extra_doc_attributes]
pub struct OsError {
    /// The raw errno value observed after the failing call.
    pub errno: i32,
    /// The call that failed.
    pub context: &'static str,
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl std::error::Error for OsError {}
