//! Error types for the library layer.

use std::fmt;

use crate::config::ConfigError;
use crate::db::DbError;

/// Errors produced by the library layer, wrapping browser-driver, storage
/// and configuration failures and adding input validation failures.
#[derive(Debug)]
pub enum FundingError {
    /// An error from the browser driver.
    Driver(hlfunding_driver::Error),
    /// A storage operation failed.
    Db(DbError),
    /// Settings could not be loaded or are out of range.
    Config(ConfigError),
    /// User-provided input failed validation.
    InvalidInput(String),
}

impl fmt::Display for FundingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Driver(e) => write!(f, "Driver error: {}", e),
            Self::Db(e) => write!(f, "Database error: {}", e),
            Self::Config(e) => write!(f, "Configuration error: {}", e),
            Self::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for FundingError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Driver(e) => Some(e),
            Self::Db(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::InvalidInput(_) => None,
        }
    }
}

impl From<hlfunding_driver::Error> for FundingError {
    fn from(e: hlfunding_driver::Error) -> Self {
        Self::Driver(e)
    }
}

impl From<DbError> for FundingError {
    fn from(e: DbError) -> Self {
        Self::Db(e)
    }
}

impl From<ConfigError> for FundingError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}
