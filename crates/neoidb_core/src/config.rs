//! Database configuration.

/// Database name used when none is configured.
pub const DEFAULT_NAME: &str = "neoidb";

/// Configuration for a [`crate::Database`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Name of the database in the engine.
    pub name: String,

    /// Version used by [`crate::Database::open_default`].
    pub version: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            version: 1,
        }
    }
}

impl Config {
    /// Creates a configuration for the database `name` at version 1.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the default version. Versions start at 1; 0 is treated as 1.
    #[must_use]
    pub const fn version(mut self, version: u32) -> Self {
        self.version = if version == 0 { 1 } else { version };
        self
    }
}
