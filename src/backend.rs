//! Element-wise backend selection.
//!
//! Matrix products always go through the [`Engine`](crate::engine::Engine)
//! and its worker pool. Element-wise kernels (`+`, `-`, Hadamard, scaling,
//! `apply`, `apply_for_each`, column broadcast) are cheap per element and run
//! either on the calling thread or on rayon's pool, chosen here.
//!
//! # Supported Backends
//!
//! - `Auto`: rayon for buffers of at least [`ELEMENTWISE_PARALLEL_MIN`]
//!   elements, sequential otherwise (default).
//! - `Sequential`: always the calling thread.
//! - `Rayon`: always rayon.
//!
//! Each output element depends only on the inputs at the same index, so the
//! backend never changes results.
//!
//! The backend is stored globally using an `AtomicU8`, enabling fast
//! switching at runtime.

use core::convert::TryFrom;
use core::sync::atomic::{AtomicU8, Ordering};

/// Buffer length from which `Backend::Auto` switches to rayon.
pub const ELEMENTWISE_PARALLEL_MIN: usize = crate::config::DEFAULT_ELEMENTWISE_PARALLEL_MIN;

/// Enumeration of element-wise execution backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Backend {
    /// Size-based choice (default).
    #[default]
    Auto = 0,
    /// Calling thread only.
    Sequential,
    /// rayon's global pool.
    Rayon,
}

impl TryFrom<u8> for Backend {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Auto),
            1 => Ok(Self::Sequential),
            2 => Ok(Self::Rayon),
            _ => Err(()),
        }
    }
}

impl Backend {
    /// Whether a kernel over `len` elements should run on rayon.
    #[must_use]
    pub const fn is_parallel_for(self, len: usize) -> bool {
        match self {
            Self::Auto => len >= ELEMENTWISE_PARALLEL_MIN,
            Self::Sequential => false,
            Self::Rayon => true,
        }
    }
}

/// Internal global state for the active backend.
///
/// Relaxed-enough ordering: the backend changes rarely and never mid-kernel.
static GLOBAL_ELEMENTWISE_BACKEND: AtomicU8 = AtomicU8::new(Backend::Auto as u8);

/// Sets the backend used by element-wise kernels.
///
/// # Example
///
/// ```
/// use dense_mlp::backend::{set_backend, Backend};
/// set_backend(Backend::Sequential);
/// # set_backend(Backend::Auto);
/// ```
pub fn set_backend(b: Backend) {
    GLOBAL_ELEMENTWISE_BACKEND.store(b as u8, Ordering::Release);
}

/// Returns the active element-wise backend.
///
/// If the stored value is invalid, defaults to [`Backend::Auto`].
pub fn get_backend() -> Backend {
    Backend::try_from(GLOBAL_ELEMENTWISE_BACKEND.load(Ordering::Acquire)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_switches_on_length() {
        assert!(!Backend::Auto.is_parallel_for(ELEMENTWISE_PARALLEL_MIN - 1));
        assert!(Backend::Auto.is_parallel_for(ELEMENTWISE_PARALLEL_MIN));
        assert!(!Backend::Sequential.is_parallel_for(usize::MAX));
        assert!(Backend::Rayon.is_parallel_for(1));
    }

    #[test]
    fn round_trips_through_u8() {
        for b in [Backend::Auto, Backend::Sequential, Backend::Rayon] {
            assert_eq!(Backend::try_from(b as u8), Ok(b));
        }
        assert!(Backend::try_from(9).is_err());
    }
}
