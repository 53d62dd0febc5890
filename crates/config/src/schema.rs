//! Exporter configuration schema, defaults, validation, and normalization.
//!
//! - Deserialization uses `serde` (JSON or TOML).
//! - Legacy documents that quote booleans and integers are still accepted.
//! - Validation is manual and returns typed errors mapped to `ErrorEnvelope`.

use optron_shared::{BoundedU32, BoundedU64, ErrorCode, ErrorEnvelope};
use serde::{Deserialize, Serialize, de};
use std::fmt;
use std::time::Duration;

/// Current supported configuration schema version.
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Smallest accepted bulk batch size.
pub const BATCH_SIZE_MIN: u32 = 1;
/// Largest accepted bulk batch size.
pub const BATCH_SIZE_MAX: u32 = 10_000;

const INTERVAL_MIN_MS: u64 = 100;
const INTERVAL_MAX_MS: u64 = 3_600_000;
const INTERVAL_DEFAULT_MS: u64 = 10_000;

const NET_TIMEOUT_MIN_MS: u64 = 100;
const NET_TIMEOUT_MAX_MS: u64 = 60_000;
const NET_TIMEOUT_DEFAULT_MS: u64 = 5_000;

/// Collector connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct OptronConfig {
    /// Schema version for forward-compatible migrations.
    pub version: u32,
    /// Collector `host:port`.
    #[serde(alias = "Address")]
    pub address: Box<str>,
    /// Whether the collector accepts JSON arrays of records.
    #[serde(alias = "HasBulkSupport", deserialize_with = "deserialize_lenient_bool")]
    pub has_bulk_support: bool,
    /// Records per array payload when bulk support is on.
    #[serde(alias = "BatchSize", deserialize_with = "deserialize_lenient_u32")]
    pub batch_size: u32,
    /// Export period (ms).
    pub interval_ms: u64,
    /// Connect deadline (ms).
    pub dial_timeout_ms: u64,
    /// Per-payload write deadline (ms).
    pub write_timeout_ms: u64,
    /// Overrides the exported `hostName` field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_name: Option<Box<str>>,
}

impl Default for OptronConfig {
    fn default() -> Self {
        Self {
            version: CURRENT_CONFIG_VERSION,
            address: Box::from(""),
            has_bulk_support: false,
            batch_size: BATCH_SIZE_MIN,
            interval_ms: INTERVAL_DEFAULT_MS,
            dial_timeout_ms: NET_TIMEOUT_DEFAULT_MS,
            write_timeout_ms: NET_TIMEOUT_DEFAULT_MS,
            host_name: None,
        }
    }
}

impl OptronConfig {
    /// Validate the config and normalize string fields.
    pub fn validate_and_normalize(mut self) -> Result<ValidatedOptronConfig, ConfigSchemaError> {
        self.validate_version()?;
        self.normalize();
        validate_address(&self.address)?;

        let limits = OptronLimits::new(&self)?;
        Ok(ValidatedOptronConfig { raw: self, limits })
    }

    const fn validate_version(&self) -> Result<(), ConfigSchemaError> {
        if self.version != CURRENT_CONFIG_VERSION {
            return Err(ConfigSchemaError::UnsupportedVersion {
                found: self.version,
                supported: CURRENT_CONFIG_VERSION,
            });
        }
        Ok(())
    }

    fn normalize(&mut self) {
        let trimmed = self.address.trim();
        if trimmed.len() != self.address.len() {
            self.address = Box::from(trimmed);
        }
        self.host_name = self
            .host_name
            .take()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .map(String::into_boxed_str);
    }
}

/// Validated config wrapper carrying bounded numeric values.
#[derive(Debug, Clone)]
pub struct ValidatedOptronConfig {
    raw: OptronConfig,
    limits: OptronLimits,
}

impl ValidatedOptronConfig {
    /// Access validated numeric bounds.
    #[must_use]
    pub const fn limits(&self) -> &OptronLimits {
        &self.limits
    }

    /// Collector `host:port`.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.raw.address
    }

    /// Bulk batch size, present only when bulk support is on.
    #[must_use]
    pub const fn bulk_batch_size(&self) -> Option<u32> {
        match self.limits.batch_size {
            Some(size) => Some(size.get()),
            None => None,
        }
    }

    /// Export period.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.limits.interval_ms.as_millis_duration()
    }

    /// Connect deadline.
    #[must_use]
    pub const fn dial_timeout(&self) -> Duration {
        self.limits.dial_timeout_ms.as_millis_duration()
    }

    /// Per-payload write deadline.
    #[must_use]
    pub const fn write_timeout(&self) -> Duration {
        self.limits.write_timeout_ms.as_millis_duration()
    }

    /// Consume the wrapper and return the raw config.
    #[must_use]
    pub fn into_inner(self) -> OptronConfig {
        self.raw
    }
}

impl AsRef<OptronConfig> for ValidatedOptronConfig {
    fn as_ref(&self) -> &OptronConfig {
        &self.raw
    }
}

impl std::ops::Deref for ValidatedOptronConfig {
    type Target = OptronConfig;

    fn deref(&self) -> &Self::Target {
        &self.raw
    }
}

/// Validated numeric limits derived from the config.
#[derive(Debug, Clone, Copy)]
pub struct OptronLimits {
    /// Bulk batch size; `None` when bulk support is off.
    pub batch_size: Option<BoundedU32<BATCH_SIZE_MIN, BATCH_SIZE_MAX>>,
    /// Export period (ms).
    pub interval_ms: BoundedU64<INTERVAL_MIN_MS, INTERVAL_MAX_MS>,
    /// Connect deadline (ms).
    pub dial_timeout_ms: BoundedU64<NET_TIMEOUT_MIN_MS, NET_TIMEOUT_MAX_MS>,
    /// Write deadline (ms).
    pub write_timeout_ms: BoundedU64<NET_TIMEOUT_MIN_MS, NET_TIMEOUT_MAX_MS>,
}

impl OptronLimits {
    fn new(config: &OptronConfig) -> Result<Self, ConfigSchemaError> {
        let batch_size = if config.has_bulk_support {
            Some(bounded_u32("batchSize", config.batch_size)?)
        } else {
            None
        };
        Ok(Self {
            batch_size,
            interval_ms: bounded_timeout("intervalMs", config.interval_ms)?,
            dial_timeout_ms: bounded_timeout("dialTimeoutMs", config.dial_timeout_ms)?,
            write_timeout_ms: bounded_timeout("writeTimeoutMs", config.write_timeout_ms)?,
        })
    }
}

/// Parse an exporter config from a JSON string, applying validation and normalization.
pub fn parse_optron_config_json(input: &str) -> Result<ValidatedOptronConfig, ErrorEnvelope> {
    let config: OptronConfig = serde_json::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_json"),
            format!("invalid config JSON: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// Parse an exporter config from a TOML string, applying validation and normalization.
pub fn parse_optron_config_toml(input: &str) -> Result<ValidatedOptronConfig, ErrorEnvelope> {
    let config: OptronConfig = toml::from_str(input).map_err(|error| {
        ErrorEnvelope::expected(
            ErrorCode::new("config", "invalid_toml"),
            format!("invalid config TOML: {error}"),
        )
    })?;

    config.validate_and_normalize().map_err(Into::into)
}

/// Configuration validation failures. Fatal at startup, never retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSchemaError {
    /// The config version is not supported by this binary.
    UnsupportedVersion {
        /// Version found in the config.
        found: u32,
        /// Version supported by this crate.
        supported: u32,
    },
    /// No collector address was configured.
    MissingAddress,
    /// The collector address is not `host:port`.
    InvalidAddress {
        /// Address provided.
        address: String,
    },
    /// A duration value is out of bounds.
    TimeoutOutOfRange {
        /// Field name in the config file (e.g. `intervalMs`).
        field: &'static str,
        /// Value provided (ms).
        value_ms: u64,
        /// Minimum allowed value (ms).
        min_ms: u64,
        /// Maximum allowed value (ms).
        max_ms: u64,
    },
    /// A numeric limit is out of bounds.
    LimitOutOfRange {
        /// Field name in the config file (e.g. `batchSize`).
        field: &'static str,
        /// Value provided.
        value: u64,
        /// Minimum allowed value.
        min: u64,
        /// Maximum allowed value.
        max: u64,
    },
}

impl ConfigSchemaError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedVersion { .. } => ErrorCode::new("config", "unsupported_version"),
            Self::MissingAddress => ErrorCode::new("config", "missing_address"),
            Self::InvalidAddress { .. } => ErrorCode::new("config", "invalid_address"),
            Self::TimeoutOutOfRange { .. } => ErrorCode::new("config", "invalid_timeout"),
            Self::LimitOutOfRange { .. } => ErrorCode::new("config", "invalid_limit"),
        }
    }
}

impl fmt::Display for ConfigSchemaError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { found, supported } => {
                write!(
                    formatter,
                    "unsupported config version: {found} (supported: {supported})"
                )
            },
            Self::MissingAddress => formatter.write_str("address must be non-empty"),
            Self::InvalidAddress { address } => {
                write!(formatter, "address must be host:port (got {address:?})")
            },
            Self::TimeoutOutOfRange {
                field,
                value_ms,
                min_ms,
                max_ms,
            } => write!(
                formatter,
                "{field} must be within [{min_ms}, {max_ms}] ms (got {value_ms})"
            ),
            Self::LimitOutOfRange {
                field,
                value,
                min,
                max,
            } => write!(
                formatter,
                "{field} must be within [{min}, {max}] (got {value})"
            ),
        }
    }
}

impl std::error::Error for ConfigSchemaError {}

impl From<ConfigSchemaError> for ErrorEnvelope {
    fn from(error: ConfigSchemaError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let mut envelope = Self::expected(code, message);

        match error {
            ConfigSchemaError::UnsupportedVersion { found, supported } => {
                envelope = envelope
                    .with_metadata("found", found.to_string())
                    .with_metadata("supported", supported.to_string());
            },
            ConfigSchemaError::MissingAddress => {
                envelope = envelope.with_metadata("field", "address");
            },
            ConfigSchemaError::InvalidAddress { address } => {
                envelope = envelope
                    .with_metadata("field", "address")
                    .with_metadata("address", address);
            },
            ConfigSchemaError::TimeoutOutOfRange {
                field,
                value_ms,
                min_ms,
                max_ms,
            } => {
                envelope = envelope
                    .with_metadata("field", field)
                    .with_metadata("value_ms", value_ms.to_string())
                    .with_metadata("min_ms", min_ms.to_string())
                    .with_metadata("max_ms", max_ms.to_string());
            },
            ConfigSchemaError::LimitOutOfRange {
                field,
                value,
                min,
                max,
            } => {
                envelope = envelope
                    .with_metadata("field", field)
                    .with_metadata("value", value.to_string())
                    .with_metadata("min", min.to_string())
                    .with_metadata("max", max.to_string());
            },
        }

        envelope
    }
}

fn validate_address(address: &str) -> Result<(), ConfigSchemaError> {
    if address.is_empty() {
        return Err(ConfigSchemaError::MissingAddress);
    }
    let invalid = || ConfigSchemaError::InvalidAddress {
        address: address.to_owned(),
    };
    let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
    if host.is_empty() || host.chars().any(char::is_whitespace) {
        return Err(invalid());
    }
    match port.parse::<u16>() {
        Ok(port) if port > 0 => Ok(()),
        _ => Err(invalid()),
    }
}

fn bounded_u32<const MIN: u32, const MAX: u32>(
    field: &'static str,
    value: u32,
) -> Result<BoundedU32<MIN, MAX>, ConfigSchemaError> {
    BoundedU32::try_new(value).map_err(|error| ConfigSchemaError::LimitOutOfRange {
        field,
        value: u64::from(error.value),
        min: u64::from(error.min),
        max: u64::from(error.max),
    })
}

fn bounded_timeout<const MIN: u64, const MAX: u64>(
    field: &'static str,
    value: u64,
) -> Result<BoundedU64<MIN, MAX>, ConfigSchemaError> {
    BoundedU64::try_new(value).map_err(|error| ConfigSchemaError::TimeoutOutOfRange {
        field,
        value_ms: error.value,
        min_ms: error.min,
        max_ms: error.max,
    })
}

fn deserialize_lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Bool(value) => Ok(value),
        serde_json::Value::String(value) => match value.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(de::Error::custom(format!("invalid boolean string: {value:?}"))),
        },
        _ => Err(de::Error::custom("expected a boolean or a quoted boolean")),
    }
}

fn deserialize_lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(value) => value
            .as_u64()
            .and_then(|value| u32::try_from(value).ok())
            .ok_or_else(|| de::Error::custom(format!("integer out of range: {value}"))),
        serde_json::Value::String(value) => value
            .trim()
            .parse::<u32>()
            .map_err(|_| de::Error::custom(format!("invalid integer string: {value:?}"))),
        _ => Err(de::Error::custom("expected an integer or a quoted integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(address: &str) -> OptronConfig {
        OptronConfig {
            address: Box::from(address),
            ..OptronConfig::default()
        }
    }

    #[test]
    fn defaults_need_only_an_address() {
        let validated = config(" collector:7000 ").validate_and_normalize();
        let validated = validated.expect("valid");
        assert_eq!(validated.address(), "collector:7000");
        assert_eq!(validated.interval(), Duration::from_secs(10));
        assert_eq!(validated.dial_timeout(), Duration::from_secs(5));
        assert_eq!(validated.bulk_batch_size(), None);
    }

    #[test]
    fn missing_address_is_rejected() {
        let error = OptronConfig::default().validate_and_normalize().err();
        assert_eq!(error, Some(ConfigSchemaError::MissingAddress));
    }

    #[test]
    fn address_needs_numeric_port() {
        for address in ["collector", "collector:http", ":7000", "collector:0"] {
            let error = config(address).validate_and_normalize().err();
            assert!(
                matches!(error, Some(ConfigSchemaError::InvalidAddress { .. })),
                "{address} should be invalid"
            );
        }
        assert!(config("[::1]:7000").validate_and_normalize().is_ok());
    }

    #[test]
    fn batch_size_only_checked_with_bulk_support() {
        let mut raw = config("collector:7000");
        raw.batch_size = 0;
        assert!(raw.clone().validate_and_normalize().is_ok());

        raw.has_bulk_support = true;
        let error = raw.clone().validate_and_normalize().err();
        assert_eq!(
            error,
            Some(ConfigSchemaError::LimitOutOfRange {
                field: "batchSize",
                value: 0,
                min: 1,
                max: 10_000,
            })
        );

        raw.batch_size = 50;
        let validated = raw.validate_and_normalize().expect("valid");
        assert_eq!(validated.bulk_batch_size(), Some(50));
    }

    #[test]
    fn interval_bounds_are_enforced() {
        let mut raw = config("collector:7000");
        raw.interval_ms = 10;
        let envelope = ErrorEnvelope::from(raw.validate_and_normalize().err().expect("error"));
        assert_eq!(envelope.code, ErrorCode::new("config", "invalid_timeout"));
        assert_eq!(
            envelope.metadata.get("field").map(String::as_str),
            Some("intervalMs")
        );
    }

    #[test]
    fn legacy_quoted_values_are_accepted() {
        let input = r#"{"Address":"collector:7000","HasBulkSupport":"true","BatchSize":"25"}"#;
        let validated = parse_optron_config_json(input).expect("valid");
        assert!(validated.has_bulk_support);
        assert_eq!(validated.bulk_batch_size(), Some(25));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let error = parse_optron_config_json(r#"{"address":"c:1","colour":"red"}"#).err();
        assert_eq!(
            error.map(|error| error.code),
            Some(ErrorCode::new("config", "invalid_json"))
        );
    }

    #[test]
    fn toml_round_trips_through_schema() {
        let input = "address = \"collector:7000\"\nhasBulkSupport = true\nbatchSize = 3\nhostName = \"web-1\"\n";
        let validated = parse_optron_config_toml(input).expect("valid");
        assert_eq!(validated.host_name.as_deref(), Some("web-1"));
        assert_eq!(validated.bulk_batch_size(), Some(3));
    }
}
