//! Memory engine configuration.

/// Configuration for [`crate::MemoryEngine`].
#[derive(Debug, Clone, Default)]
pub struct MemoryEngineConfig {
    /// Maximum number of records a single store may hold after a commit.
    ///
    /// A transaction that would leave a store above the limit fails at
    /// commit time with a quota-exceeded error and is rolled back.
    pub max_records_per_store: Option<usize>,
}

impl MemoryEngineConfig {
    /// Creates a configuration with no limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-store record quota.
    #[must_use]
    pub const fn max_records_per_store(mut self, limit: usize) -> Self {
        self.max_records_per_store = Some(limit);
        self
    }
}
