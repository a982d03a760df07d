use alloc::string::String;

use crate::error::{Error, Result};

pub const KIB: usize = 1024;
pub const MIB: usize = 1024 * KIB;

/// Construction options for a [`Pool`].
///
/// # Examples
///
/// ```
/// # use arenapool::{PoolConfig, KIB, MIB};
/// #
/// let config = PoolConfig::default()
///     .with_name("frames")
///     .with_arena_size(4 * MIB)
///     .with_reasonable_limit(64 * KIB)
///     .with_recycler_capacity(2);
///
/// assert!(config.validate().is_ok());
/// ```
///
/// [`Pool`]: crate::Pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Name attached to log events and reclamation threads.
    pub name: String,
    /// Size of the backing block of every arena.
    pub arena_size: usize,
    /// Largest request served from an arena. Must be at most a tenth of `arena_size`.
    pub reasonable_limit: usize,
    /// Capacity of the recycler's fast-path queue. `0` disables it.
    pub recycler_capacity: usize,
}

impl PoolConfig {
    pub fn new(arena_size: usize, reasonable_limit: usize, recycler_capacity: usize) -> Self {
        Self {
            arena_size,
            reasonable_limit,
            recycler_capacity,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_arena_size(mut self, arena_size: usize) -> Self {
        self.arena_size = arena_size;
        self
    }

    pub fn with_reasonable_limit(mut self, reasonable_limit: usize) -> Self {
        self.reasonable_limit = reasonable_limit;
        self
    }

    pub fn with_recycler_capacity(mut self, recycler_capacity: usize) -> Self {
        self.recycler_capacity = recycler_capacity;
        self
    }

    /// Checks that `reasonable_limit * 10 <= arena_size` and that the arena is not empty.
    pub fn validate(&self) -> Result<()> {
        check_limits(self.arena_size, self.reasonable_limit)
    }
}

impl Default for PoolConfig {
    #[inline]
    fn default() -> Self {
        Self {
            name: String::from("arena"),
            arena_size: 10 * MIB,
            reasonable_limit: MIB,
            recycler_capacity: 0,
        }
    }
}

pub(crate) fn check_limits(arena_size: usize, reasonable_limit: usize) -> Result<()> {
    // Blocks larger than isize::MAX cannot be allocated.
    let fits = arena_size > 0
        && arena_size <= isize::MAX as usize
        && reasonable_limit
            .checked_mul(10)
            .is_some_and(|limit| limit <= arena_size);

    if fits {
        Ok(())
    } else {
        Err(Error::InvalidConfiguration {
            arena_size,
            reasonable_limit,
        })
    }
}

#[cfg(all(not(loom), test))]
mod tests {
    use super::{check_limits, PoolConfig, KIB, MIB};
    use crate::Error;

    #[test]
    fn test_default() {
        let config = PoolConfig::default();
        assert_eq!(config.arena_size, 10 * MIB);
        assert_eq!(config.reasonable_limit, MIB);
        assert_eq!(config.recycler_capacity, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_check_limits() {
        assert!(check_limits(1000, 100).is_ok());
        assert!(check_limits(1000, 0).is_ok());
        assert!(check_limits(10 * MIB, MIB).is_ok());

        assert_eq!(
            check_limits(1000, 101),
            Err(Error::InvalidConfiguration {
                arena_size: 1000,
                reasonable_limit: 101,
            })
        );
        assert!(check_limits(0, 0).is_err());
        assert!(check_limits(usize::MAX, usize::MAX / 2).is_err());
    }

    #[test]
    fn test_builder() {
        let config = PoolConfig::new(MIB, 64 * KIB, 4).with_name("test");
        assert_eq!(config.name, "test");
        assert_eq!(config.arena_size, MIB);
        assert_eq!(config.reasonable_limit, 64 * KIB);
        assert_eq!(config.recycler_capacity, 4);

        assert!(config.with_reasonable_limit(MIB).validate().is_err());
    }
}
