use crate::errors::{Error, Result};

const MIN_PAGE_SIZE: usize = 4 * 1024;
const MAX_PAGE_SIZE: usize = 1024 * 1024 * 1024;
const DEFAULT_PAGE_SIZE: usize = 16 * 1024;
const DEFAULT_CACHE_CAPACITY_BYTES: usize = 64 * 1024 * 1024;

/// Retention policy applied by garbage collection between commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retention {
    /// Keep every iteration ever committed.
    KeepAll,
    /// Keep only the `k` most recent iterations, collecting anything unreachable from them.
    KeepLatest(usize),
}

impl Default for Retention {
    fn default() -> Self {
        Self::KeepLatest(32)
    }
}

/// Tunables for a persistence root, validated once at construction so invalid
/// settings fail before anything is built on top of them.
#[derive(Debug, Clone)]
pub struct Config {
    pub page_size: usize,
    pub cache_capacity_bytes: usize,
    pub retention: Retention,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            cache_capacity_bytes: DEFAULT_CACHE_CAPACITY_BYTES,
            retention: Retention::default(),
        }
    }
}

impl Config {
    /// Build a config with a specific page size, validating it against the
    /// `[4 KiB, 1 GiB]` range and requiring a power-of-two alignment.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` if `page_size` is out of range or not a power of two.
    pub fn new(page_size: usize) -> Result<Self> {
        if !(MIN_PAGE_SIZE..=MAX_PAGE_SIZE).contains(&page_size) || !page_size.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "page_size {page_size} must be a power of two in [{MIN_PAGE_SIZE}, {MAX_PAGE_SIZE}]"
            )));
        }
        Ok(Self { page_size, ..Self::default() })
    }

    #[must_use]
    pub fn with_cache_capacity_bytes(mut self, bytes: usize) -> Self {
        self.cache_capacity_bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_retention(mut self, retention: Retention) -> Self {
        self.retention = retention;
        self
    }
}
