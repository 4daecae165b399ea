//! Configuration types for storegraph.
//!
//! # Example
//!
//! ```rust
//! use storegraph::config::{PaginationConfig, StoreGraphConfig};
//!
//! // Use defaults
//! let config = StoreGraphConfig::default();
//!
//! // Or customize
//! let config = StoreGraphConfig {
//!     pagination: PaginationConfig {
//!         default_limit: 50,
//!         max_limit: 200,
//!     },
//!     ..Default::default()
//! };
//! ```

/// Top-level configuration.
///
/// Use `StoreGraphConfig::default()` for production defaults.
#[derive(Debug, Clone, Default)]
pub struct StoreGraphConfig {
    /// Page sizes for derived relation listings.
    pub pagination: PaginationConfig,

    /// Parameters for hashing passwords of new accounts.
    pub hashing: HashingConfig,
}

impl StoreGraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cheap hashing and larger pages, for development and tests.
    pub fn development() -> Self {
        Self {
            pagination: PaginationConfig {
                default_limit: 50,
                max_limit: 500,
            },
            hashing: HashingConfig {
                memory_cost: 4096,
                time_cost: 1,
                parallelism: 1,
            },
        }
    }

    /// OWASP-recommended hashing and smaller pages.
    pub fn strict() -> Self {
        Self {
            pagination: PaginationConfig {
                default_limit: 25,
                max_limit: 50,
            },
            hashing: HashingConfig {
                memory_cost: 65536,
                time_cost: 3,
                parallelism: 4,
            },
        }
    }
}

/// Limits applied to [`CollectionQuery`](crate::query::CollectionQuery).
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// Page size when the query sets none.
    ///
    /// Default: 25
    pub default_limit: u32,

    /// Largest page size a query may request.
    ///
    /// Default: 100
    pub max_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 25,
            max_limit: 100,
        }
    }
}

/// Argon2id parameters.
#[derive(Debug, Clone)]
pub struct HashingConfig {
    /// Memory cost in KiB.
    ///
    /// Default: 19456 (19 MiB)
    pub memory_cost: u32,

    /// Number of iterations.
    ///
    /// Default: 2
    pub time_cost: u32,

    /// Degree of parallelism.
    ///
    /// Default: 1
    pub parallelism: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_cost: 19456,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreGraphConfig::default();

        assert_eq!(config.pagination.default_limit, 25);
        assert_eq!(config.pagination.max_limit, 100);
        assert_eq!(config.hashing.memory_cost, 19456);
        assert_eq!(config.hashing.time_cost, 2);
    }

    #[test]
    fn test_strict_config() {
        let config = StoreGraphConfig::strict();

        assert_eq!(config.pagination.max_limit, 50);
        assert_eq!(config.hashing.parallelism, 4);
    }

    #[test]
    fn test_development_config() {
        let config = StoreGraphConfig::development();

        assert_eq!(config.pagination.default_limit, 50);
        assert_eq!(config.hashing.time_cost, 1);
    }
}
