//! Re-export of the `libftd2xx-ffi` crate.
//!
//! This module exposes the raw FTDI D2XX driver bindings. Most users should not
//! need them; the rest of the crate wraps everything the YMF825 bus requires.
pub(crate) mod util;

use std::{panic::catch_unwind, sync::Mutex};

pub use libftd2xx_ffi::*;

/// Serializes the D2XX operations that touch process-wide driver state.
static GLOBAL_LOCK: Mutex<()> = Mutex::new(());

/// Run the given closure with the global lock held.
///
/// Certain D2XX operations are only meaningful while no other thread can
/// touch the driver. For example, listing devices consists of a write
/// followed by a read of the driver's device table, which may be
/// invalidated at any point by another thread.
#[allow(clippy::missing_panics_doc)]
pub fn with_global_lock<F, R>(f: F) -> R
where
    F: FnOnce() -> R + std::panic::UnwindSafe,
{
    // unwrap() is safe because we ensure below that the lock is not poisoned.
    let lock = GLOBAL_LOCK.lock().unwrap();
    match catch_unwind(f) {
        Ok(result) => result,
        Err(e) => {
            drop(lock);
            panic!("panicked while holding global lock: {e:?}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_lock() {
        let _guard = GLOBAL_LOCK.lock().unwrap();
        assert!(GLOBAL_LOCK.try_lock().is_err());
    }

    #[test]
    fn test_global_lock_unpoisoning() {
        let result = std::panic::catch_unwind(|| {
            with_global_lock(|| {
                panic!("test panic");
            });
        });
        assert!(result.is_err());
        // lock() rather than try_lock(): the other lock test may hold the
        // mutex concurrently, and only poisoning should fail here.
        assert!(GLOBAL_LOCK.lock().is_ok());
    }
}
