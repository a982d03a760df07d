//! Error types for arena allocation.

use thiserror::Error;

/// Result type alias using the crate's [`Error`].
pub type Result<T> = core::result::Result<T, Error>;

/// Errors returned by arenas, pools and handles.
///
/// Short writes and end-of-data are not errors. They are reported through
/// [`WriteOutcome`] and [`ReadOutcome`].
///
/// [`WriteOutcome`]: crate::WriteOutcome
/// [`ReadOutcome`]: crate::ReadOutcome
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The reasonable limit is too large for the arena size, or the arena is empty.
    #[error(
        "invalid configuration: reasonable limit {reasonable_limit} must be at most a tenth of \
         the arena size {arena_size}"
    )]
    InvalidConfiguration {
        arena_size: usize,
        reasonable_limit: usize,
    },

    /// A block of zero bytes was requested.
    #[error("invalid size: requested size must be greater than 0")]
    InvalidSize,

    /// The arena cannot fit the request. The arena is unchanged.
    #[error("arena is full: requested {requested} bytes, {remaining} remaining")]
    ArenaFull { requested: usize, remaining: usize },

    /// The arena still has leases that were not released.
    #[error("arena still has {outstanding} outstanding leases")]
    LeasesOutstanding { outstanding: usize },

    /// A peek asked for more bytes than are left unread.
    #[error("insufficient data: requested {requested} bytes, {available} available")]
    InsufficientData { requested: usize, available: usize },
}

impl Error {
    /// Returns `true` for the [`ArenaFull`] control-flow signal.
    ///
    /// [`ArenaFull`]: Self::ArenaFull
    #[inline]
    pub fn is_arena_full(&self) -> bool {
        matches!(self, Self::ArenaFull { .. })
    }
}

#[cfg(all(not(loom), test))]
mod tests {
    use super::Error;

    #[test]
    fn test_display() {
        let err = Error::InvalidConfiguration {
            arena_size: 100,
            reasonable_limit: 11,
        };
        assert!(err.to_string().contains("reasonable limit 11"));

        let err = Error::ArenaFull {
            requested: 10,
            remaining: 3,
        };
        assert!(err.is_arena_full());
        assert_eq!(
            err.to_string(),
            "arena is full: requested 10 bytes, 3 remaining"
        );

        assert!(!Error::InvalidSize.is_arena_full());
    }
}
