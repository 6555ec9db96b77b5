//! Business settings loaded from a YAML document.

use std::{fs, io, path::Path, time::Duration};

use jiff::civil::{Date, date};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse settings: {0}")]
    Yaml(#[from] serde_norway::Error),

    #[error("invalid setting {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Tunables for every consistency component. Every field has a default, so an
/// empty document is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub orders: OrderSettings,
    pub carts: CartSettings,
    pub retry: RetryPolicy,
    pub consumers: ConsumerSettings,
    pub seckill: SeckillSettings,
    pub snowflake: SnowflakeSettings,
    pub cdc: CdcSettings,
}

impl Settings {
    /// Load settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or fails validation.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml(&contents)
    }

    /// Parse settings from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed or fails validation.
    pub fn from_yaml(yaml: &str) -> Result<Self, SettingsError> {
        let settings: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_norway::from_str(yaml)?
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Check cross-field constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.orders.freight.is_sign_negative() {
            return Err(SettingsError::Invalid {
                field: "orders.freight",
                reason: "must not be negative",
            });
        }

        if self.retry.max_attempts == 0 {
            return Err(SettingsError::Invalid {
                field: "retry.max_attempts",
                reason: "must be at least 1",
            });
        }

        if self.retry.min_delay_ms > self.retry.max_delay_ms {
            return Err(SettingsError::Invalid {
                field: "retry.min_delay_ms",
                reason: "must not exceed retry.max_delay_ms",
            });
        }

        if self.seckill.bucket_rate <= 0.0 || !self.seckill.bucket_rate.is_finite() {
            return Err(SettingsError::Invalid {
                field: "seckill.bucket_rate",
                reason: "must be a positive number",
            });
        }

        if self.seckill.bucket_capacity == 0 {
            return Err(SettingsError::Invalid {
                field: "seckill.bucket_capacity",
                reason: "must be at least 1",
            });
        }

        if self.snowflake.machine_id > crate::snowflake::MAX_MACHINE_ID {
            return Err(SettingsError::Invalid {
                field: "snowflake.machine_id",
                reason: "must fit in 10 bits",
            });
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OrderSettings {
    /// Flat shipping charge added to every order subtotal.
    pub freight: Decimal,
    pub presubmit_ttl_secs: u64,
    pub payment_window_secs: u64,
}

impl OrderSettings {
    #[must_use]
    pub fn presubmit_ttl(&self) -> Duration {
        Duration::from_secs(self.presubmit_ttl_secs)
    }

    #[must_use]
    pub fn payment_window(&self) -> Duration {
        Duration::from_secs(self.payment_window_secs)
    }
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            freight: Decimal::from(18),
            presubmit_ttl_secs: 5 * 60,
            payment_window_secs: 30 * 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CartSettings {
    pub cache_ttl_secs: u64,
    pub specification_cache_ttl_secs: u64,
}

impl CartSettings {
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    #[must_use]
    pub fn specification_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.specification_cache_ttl_secs)
    }
}

impl Default for CartSettings {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 7 * 24 * 60 * 60,
            specification_cache_ttl_secs: 15 * 24 * 60 * 60,
        }
    }
}

/// Backoff between redeliveries of a message whose handler asked for a retry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsumerSettings {
    pub min_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl ConsumerSettings {
    #[must_use]
    pub fn min_backoff(&self) -> Duration {
        Duration::from_millis(self.min_backoff_ms)
    }

    #[must_use]
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            min_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeckillSettings {
    pub cooldown_secs: u64,

    /// Tokens added to the global bucket per second.
    pub bucket_rate: f64,
    pub bucket_capacity: u32,
    pub max_wait_ms: u64,

    /// Bound on queued purchase requests. Derived from seckill stock when unset.
    pub queue_capacity: Option<u32>,
}

impl SeckillSettings {
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl Default for SeckillSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: 5,
            bucket_rate: 0.1,
            bucket_capacity: 200,
            max_wait_ms: 5_000,
            queue_capacity: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SnowflakeSettings {
    pub machine_id: u16,
    pub start_date: Date,
}

impl Default for SnowflakeSettings {
    fn default() -> Self {
        Self {
            machine_id: 1,
            start_date: date(2022, 1, 1),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CdcSettings {
    pub slot: String,
    pub schema: String,
    pub table: String,
    pub poll_interval_ms: u64,
    pub batch_size: i32,
}

impl CdcSettings {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for CdcSettings {
    fn default() -> Self {
        Self {
            slot: "stockroom_cart_cdc".to_string(),
            schema: "public".to_string(),
            table: "cart_entries".to_string(),
            poll_interval_ms: 500,
            batch_size: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn empty_document_yields_defaults() -> TestResult {
        let settings = Settings::from_yaml("")?;

        assert_eq!(settings.orders.freight, Decimal::from(18));
        assert_eq!(settings.orders.presubmit_ttl(), Duration::from_secs(300));
        assert_eq!(settings.orders.payment_window(), Duration::from_secs(1_800));
        assert_eq!(settings.carts.cache_ttl(), Duration::from_secs(604_800));
        assert_eq!(settings.seckill.cooldown(), Duration::from_secs(5));
        assert_eq!(settings.seckill.bucket_capacity, 200);
        assert_eq!(settings.retry.max_attempts, 10);

        Ok(())
    }

    #[test]
    fn partial_document_overrides_only_named_fields() -> TestResult {
        let settings = Settings::from_yaml(
            "
orders:
  freight: \"12.50\"
seckill:
  queue_capacity: 40
snowflake:
  machine_id: 7
  start_date: 2024-06-01
",
        )?;

        assert_eq!(settings.orders.freight, Decimal::new(1_250, 2));
        assert_eq!(settings.orders.presubmit_ttl_secs, 300);
        assert_eq!(settings.seckill.queue_capacity, Some(40));
        assert_eq!(settings.snowflake.machine_id, 7);
        assert_eq!(settings.snowflake.start_date, date(2024, 6, 1));

        Ok(())
    }

    #[test]
    fn zero_retry_attempts_is_rejected() {
        let result = Settings::from_yaml("retry:\n  max_attempts: 0\n");

        assert!(
            matches!(
                result,
                Err(SettingsError::Invalid {
                    field: "retry.max_attempts",
                    ..
                })
            ),
            "expected Invalid(retry.max_attempts), got {result:?}"
        );
    }

    #[test]
    fn oversized_machine_id_is_rejected() {
        let result = Settings::from_yaml("snowflake:\n  machine_id: 1024\n");

        assert!(
            matches!(
                result,
                Err(SettingsError::Invalid {
                    field: "snowflake.machine_id",
                    ..
                })
            ),
            "expected Invalid(snowflake.machine_id), got {result:?}"
        );
    }
}
