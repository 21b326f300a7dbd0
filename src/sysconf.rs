//! Cached system configuration queries.

use std::sync::OnceLock;

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::err::{Error, OsError};

/// A checked `sysconf(3)` query.
///
/// Fails with [Error::InvalidArgument] for an unknown `name` and with
/// [Error::Os] for any other syscall failure. A result of -1 with errno
/// untouched means "indeterminate limit" and is passed through as such.
#[cfg_attr(feature = "tracing", instrument)]
pub fn sysconf(name: libc::c_int) -> Result<usize, Error> {
    // -1 is also a legal result, so errno must be cleared first
    unsafe { *libc::__errno_location() = 0 };
    let result: libc::c_long = unsafe { libc::sysconf(name) };
    if result == -1 {
        let errno: i32 = std::io::Error::last_os_error().raw_os_error().unwrap_or(0);
        if errno == libc::EINVAL {
            return Err(Error::InvalidArgument("unknown sysconf name"));
        }
        if errno != 0 {
            return Err(Error::Os(OsError {
                errno,
                context: "sysconf",
            }));
        }
    }
    Ok(result as usize)
}

static CACHE_LINE: OnceLock<usize> = OnceLock::new();
static PAGE_SIZE: OnceLock<usize> = OnceLock::new();

fn cached(slot: &OnceLock<usize>, name: libc::c_int) -> Result<usize, Error> {
    if let Some(value) = slot.get() {
        return Ok(*value);
    }
    let value: usize = sysconf(name)?;
    Ok(*slot.get_or_init(|| value))
}

/// The L1 data cache line size in bytes, queried once and cached.
pub fn cache_line() -> Result<usize, Error> {
    cached(&CACHE_LINE, libc::_SC_LEVEL1_DCACHE_LINESIZE)
}

/// The memory page size in bytes, queried once and cached.
pub fn page_size() -> Result<usize, Error> {
    cached(&PAGE_SIZE, libc::_SC_PAGESIZE)
}

#[cfg(all(test, not(loom), not(feature = "shuttle")))]
mod tests {
    use test_log::test;
    use tracing::debug;

    use super::{cache_line, page_size, sysconf};
    use crate::err::Error;

    #[test]
    fn test_page_size() {
        let size: usize = page_size().unwrap();
        debug!("page size: {size}");
        assert!(size > 0);
        assert!(size.is_power_of_two());
        // cached
        assert_eq!(page_size().unwrap(), size);
    }

    #[test]
    fn test_cache_line() {
        // some kernels report 0 when the size is unknown
        let size: usize = cache_line().unwrap();
        debug!("cache line size: {size}");
        assert!(size == 0 || size.is_power_of_two());
    }

    #[test]
    fn test_unknown_name_is_invalid_argument() {
        let result: Result<usize, Error> = sysconf(-1);
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }
}
