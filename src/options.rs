//! Construction options and their defaults.
//!
//! Options can be assembled in code through the builders on
//! [`ReadSource`](crate::ReadSource) and [`WriteSink`](crate::WriteSink), or decoded
//! from a dynamic configuration value. Decoding is strict: every numeric option must
//! be a positive integer, and floats, strings, objects and other non-integer values
//! are rejected with [`Error::InvalidOption`] instead of being coerced.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default initial capacity of the backing buffer (8 KiB).
pub const DEFAULT_INITIAL_SIZE: usize = 8 * 1024;

/// Default growth increment of the backing buffer (8 KiB).
pub const DEFAULT_INCREMENT_AMOUNT: usize = 8 * 1024;

/// Default number of bytes emitted per tick by a read source.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Default interval between emission ticks, in milliseconds.
pub const DEFAULT_FREQUENCY_MS: u64 = 10;

/// Default interval between emission ticks.
pub const DEFAULT_FREQUENCY: Duration = Duration::from_millis(DEFAULT_FREQUENCY_MS);

/// Options for a [`ReadSource`](crate::ReadSource).
///
/// Field names use camelCase when decoded, e.g. `{"chunkSize": 2, "frequency": 300}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ReadableOptions {
    /// Maximum bytes emitted per tick.
    pub chunk_size: usize,
    /// Milliseconds between emission ticks.
    pub frequency: u64,
    /// Initial capacity of the backing buffer.
    pub initial_size: usize,
    /// Growth increment of the backing buffer.
    pub increment_amount: usize,
}

impl Default for ReadableOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            frequency: DEFAULT_FREQUENCY_MS,
            initial_size: DEFAULT_INITIAL_SIZE,
            increment_amount: DEFAULT_INCREMENT_AMOUNT,
        }
    }
}

impl ReadableOptions {
    /// Decodes and validates options from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if a field is unknown, is not a
    /// non-negative integer, or is zero.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let options: Self = serde_json::from_value(value).map_err(invalid)?;
        options.validate()?;
        Ok(options)
    }

    /// Decodes and validates options from JSON text.
    ///
    /// # Errors
    ///
    /// Same as [`from_value`](Self::from_value), plus malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json).map_err(invalid)?;
        options.validate()?;
        Ok(options)
    }

    /// Checks that every option is positive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] naming the first zero-valued option.
    pub fn validate(&self) -> Result<()> {
        positive("chunkSize", self.chunk_size)?;
        positive("frequency", self.frequency)?;
        positive("initialSize", self.initial_size)?;
        positive("incrementAmount", self.increment_amount)
    }

    /// Returns the tick interval.
    #[must_use]
    pub const fn frequency(&self) -> Duration {
        Duration::from_millis(self.frequency)
    }
}

/// Options for a [`WriteSink`](crate::WriteSink).
///
/// An absent `limit` means the sink accepts any number of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct WritableOptions {
    /// Initial capacity of the backing buffer.
    pub initial_size: usize,
    /// Growth increment of the backing buffer.
    pub increment_amount: usize,
    /// Maximum number of bytes the sink accepts over its lifetime.
    pub limit: Option<usize>,
}

impl Default for WritableOptions {
    fn default() -> Self {
        Self {
            initial_size: DEFAULT_INITIAL_SIZE,
            increment_amount: DEFAULT_INCREMENT_AMOUNT,
            limit: None,
        }
    }
}

impl WritableOptions {
    /// Decodes and validates options from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] if a field is unknown, is not a
    /// non-negative integer, or is zero.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let options: Self = serde_json::from_value(value).map_err(invalid)?;
        options.validate()?;
        Ok(options)
    }

    /// Decodes and validates options from JSON text.
    ///
    /// # Errors
    ///
    /// Same as [`from_value`](Self::from_value), plus malformed JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json).map_err(invalid)?;
        options.validate()?;
        Ok(options)
    }

    /// Checks that every option is positive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] naming the first zero-valued option.
    pub fn validate(&self) -> Result<()> {
        positive("initialSize", self.initial_size)?;
        positive("incrementAmount", self.increment_amount)?;
        if let Some(limit) = self.limit {
            positive("limit", limit)?;
        }
        Ok(())
    }
}

#[allow(clippy::needless_pass_by_value)]
fn invalid(err: serde_json::Error) -> Error {
    Error::InvalidOption(err.to_string())
}

fn positive<T: Default + PartialEq>(name: &str, value: T) -> Result<()> {
    if value == T::default() {
        return Err(Error::InvalidOption(format!("`{name}` must be greater than 0")));
    }
    Ok(())
}
