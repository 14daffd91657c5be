//! Input validation for keys and values.
//!
//! Checks run before anything touches the log or the memory buffer.

use crate::error::{Error, Result};

/// Largest accepted key in bytes.
pub const MAX_KEY_SIZE: usize = 64 * 1024;

/// Largest accepted value in bytes.
pub const MAX_VALUE_SIZE: usize = 256 * 1024 * 1024;

/// Validates a key. Empty keys are allowed; they sort before every other key.
#[inline]
pub fn validate_key(key: &[u8]) -> Result<()> {
    if key.len() > MAX_KEY_SIZE {
        return Err(Error::InvalidArgument(format!(
            "key size {} exceeds maximum {}",
            key.len(),
            MAX_KEY_SIZE
        )));
    }
    Ok(())
}

/// Validates a value.
#[inline]
pub fn validate_value(value: &[u8]) -> Result<()> {
    if value.len() > MAX_VALUE_SIZE {
        return Err(Error::InvalidArgument(format!(
            "value size {} exceeds maximum {}",
            value.len(),
            MAX_VALUE_SIZE
        )));
    }
    Ok(())
}

/// Validates a key/value pair.
#[inline]
pub fn validate_entry(key: &[u8], value: &[u8]) -> Result<()> {
    validate_key(key)?;
    validate_value(value)
}
