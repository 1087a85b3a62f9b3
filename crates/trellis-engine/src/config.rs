//! Database configuration.

use std::sync::Arc;

use trellis_common::utils::error::{Error, Result};
use trellis_core::graph::segment::MIN_SEGMENT_SIZE;
use trellis_core::storage::{DataEncryption, DateTimePrecision};

/// Configuration for a [`Database`](crate::Database).
#[derive(Debug, Clone)]
pub struct Config {
    /// Tag used for datetimes with no declared property type.
    pub datetime_precision: DateTimePrecision,

    /// Capacity of the first edge segment of a vertex and direction.
    pub initial_segment_size: usize,

    /// Upper bound for segment growth. Each new head doubles the previous
    /// capacity until it reaches this size.
    pub max_segment_size: usize,

    /// Encryption applied to every stored value except nulls and RIDs.
    pub encryption: Option<Arc<dyn DataEncryption>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            datetime_precision: DateTimePrecision::Millisecond,
            initial_segment_size: 128,
            max_segment_size: 8192,
            encryption: None,
        }
    }
}

impl Config {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default datetime precision.
    #[must_use]
    pub fn with_datetime_precision(mut self, precision: DateTimePrecision) -> Self {
        self.datetime_precision = precision;
        self
    }

    /// Sets the initial and maximum edge segment sizes.
    #[must_use]
    pub fn with_segment_sizes(mut self, initial: usize, max: usize) -> Self {
        self.initial_segment_size = initial;
        self.max_segment_size = max;
        self
    }

    /// Enables value encryption.
    #[must_use]
    pub fn with_encryption(mut self, encryption: Arc<dyn DataEncryption>) -> Self {
        self.encryption = Some(encryption);
        self
    }

    /// Checks the segment sizes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if a segment could not hold one
    /// entry, or the initial size exceeds the maximum.
    pub fn validate(&self) -> Result<()> {
        if self.initial_segment_size < MIN_SEGMENT_SIZE {
            return Err(Error::InvalidArgument(format!(
                "initial_segment_size {} is below the minimum of {MIN_SEGMENT_SIZE}",
                self.initial_segment_size
            )));
        }
        if self.initial_segment_size > self.max_segment_size {
            return Err(Error::InvalidArgument(format!(
                "initial_segment_size {} exceeds max_segment_size {}",
                self.initial_segment_size, self.max_segment_size
            )));
        }
        if i32::try_from(self.max_segment_size).is_err() {
            return Err(Error::InvalidArgument(format!(
                "max_segment_size {} does not fit a segment page",
                self.max_segment_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::storage::{AesGcmEncryption, EncryptionKey};

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert_eq!(config.initial_segment_size, 128);
        assert_eq!(config.max_segment_size, 8192);
        assert_eq!(config.datetime_precision, DateTimePrecision::Millisecond);
        assert!(config.encryption.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builders() {
        let config = Config::new()
            .with_datetime_precision(DateTimePrecision::Nanosecond)
            .with_segment_sizes(64, 256)
            .with_encryption(Arc::new(AesGcmEncryption::new(&EncryptionKey::generate())));
        assert_eq!(config.datetime_precision, DateTimePrecision::Nanosecond);
        assert_eq!(config.initial_segment_size, 64);
        assert_eq!(config.max_segment_size, 256);
        assert!(config.encryption.is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_segment_sizes() {
        assert!(Config::new().with_segment_sizes(16, 256).validate().is_err());
        assert!(Config::new().with_segment_sizes(512, 256).validate().is_err());
    }
}
