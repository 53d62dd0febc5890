//! Environment variable parsing and env-to-config merging.
//!
//! Parsing is strict: a variable that is present but empty or malformed fails
//! fast instead of being ignored.

use crate::schema::{OptronConfig, ValidatedOptronConfig};
use optron_shared::{ErrorCode, ErrorEnvelope};
use std::collections::BTreeMap;
use std::fmt;

/// Env var: collector `host:port`.
pub const ENV_ADDRESS: &str = "OPTRON_ADDRESS";
/// Env var: collector accepts batched arrays.
pub const ENV_HAS_BULK_SUPPORT: &str = "OPTRON_HAS_BULK_SUPPORT";
/// Env var: records per batch.
pub const ENV_BATCH_SIZE: &str = "OPTRON_BATCH_SIZE";
/// Env var: export period in milliseconds.
pub const ENV_INTERVAL_MS: &str = "OPTRON_INTERVAL_MS";
/// Env var: connect deadline in milliseconds.
pub const ENV_DIAL_TIMEOUT_MS: &str = "OPTRON_DIAL_TIMEOUT_MS";
/// Env var: write deadline in milliseconds.
pub const ENV_WRITE_TIMEOUT_MS: &str = "OPTRON_WRITE_TIMEOUT_MS";
/// Env var: exported `hostName` override.
pub const ENV_HOST_NAME: &str = "OPTRON_HOST_NAME";

const ALL_VARS: [&str; 7] = [
    ENV_ADDRESS,
    ENV_HAS_BULK_SUPPORT,
    ENV_BATCH_SIZE,
    ENV_INTERVAL_MS,
    ENV_DIAL_TIMEOUT_MS,
    ENV_WRITE_TIMEOUT_MS,
    ENV_HOST_NAME,
];

/// Parsed env overrides. `None` means the variable was not set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptronEnv {
    /// `OPTRON_ADDRESS`.
    pub address: Option<Box<str>>,
    /// `OPTRON_HAS_BULK_SUPPORT`.
    pub has_bulk_support: Option<bool>,
    /// `OPTRON_BATCH_SIZE`.
    pub batch_size: Option<u32>,
    /// `OPTRON_INTERVAL_MS`.
    pub interval_ms: Option<u64>,
    /// `OPTRON_DIAL_TIMEOUT_MS`.
    pub dial_timeout_ms: Option<u64>,
    /// `OPTRON_WRITE_TIMEOUT_MS`.
    pub write_timeout_ms: Option<u64>,
    /// `OPTRON_HOST_NAME`.
    pub host_name: Option<Box<str>>,
}

impl OptronEnv {
    /// Parse env overrides from a key/value map.
    pub fn from_map(map: &BTreeMap<String, String>) -> Result<Self, EnvParseError> {
        Ok(Self {
            address: parse_optional_trimmed_string(map, ENV_ADDRESS)?,
            has_bulk_support: parse_optional_bool(map, ENV_HAS_BULK_SUPPORT)?,
            batch_size: parse_optional_u32(map, ENV_BATCH_SIZE)?,
            interval_ms: parse_optional_u64(map, ENV_INTERVAL_MS)?,
            dial_timeout_ms: parse_optional_u64(map, ENV_DIAL_TIMEOUT_MS)?,
            write_timeout_ms: parse_optional_u64(map, ENV_WRITE_TIMEOUT_MS)?,
            host_name: parse_optional_trimmed_string(map, ENV_HOST_NAME)?,
        })
    }

    /// Parse env overrides from the current process environment.
    pub fn from_std_env() -> Result<Self, EnvParseError> {
        let mut map = BTreeMap::new();
        for name in ALL_VARS {
            if let Ok(value) = std::env::var(name) {
                map.insert(name.to_string(), value);
            }
        }

        Self::from_map(&map)
    }
}

/// Apply env overrides to a base config (env wins over file/default values).
pub fn apply_env_overrides(
    base: OptronConfig,
    env: &OptronEnv,
) -> Result<ValidatedOptronConfig, ErrorEnvelope> {
    let mut config = base;
    if let Some(address) = &env.address {
        config.address = address.clone();
    }
    if let Some(value) = env.has_bulk_support {
        config.has_bulk_support = value;
    }
    if let Some(value) = env.batch_size {
        config.batch_size = value;
    }
    if let Some(value) = env.interval_ms {
        config.interval_ms = value;
    }
    if let Some(value) = env.dial_timeout_ms {
        config.dial_timeout_ms = value;
    }
    if let Some(value) = env.write_timeout_ms {
        config.write_timeout_ms = value;
    }
    if let Some(host_name) = &env.host_name {
        config.host_name = Some(host_name.clone());
    }

    config.validate_and_normalize().map_err(Into::into)
}

/// Env parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvParseError {
    /// An env var was present but empty after trimming.
    EmptyValue {
        /// Env var name.
        var: &'static str,
    },
    /// Boolean env var had an invalid value.
    InvalidBool {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
    /// Integer env var had an invalid value.
    InvalidInt {
        /// Env var name.
        var: &'static str,
        /// Raw input value.
        value: String,
    },
}

impl EnvParseError {
    fn error_code(&self) -> ErrorCode {
        match self {
            Self::EmptyValue { .. } => ErrorCode::new("config", "empty_env_var"),
            Self::InvalidBool { .. } => ErrorCode::new("config", "invalid_env_bool"),
            Self::InvalidInt { .. } => ErrorCode::new("config", "invalid_env_int"),
        }
    }
}

impl fmt::Display for EnvParseError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyValue { var } => write!(formatter, "{var} must be non-empty"),
            Self::InvalidBool { var, .. } => write!(formatter, "{var} must be a boolean"),
            Self::InvalidInt { var, .. } => write!(formatter, "{var} must be an integer"),
        }
    }
}

impl std::error::Error for EnvParseError {}

impl From<EnvParseError> for ErrorEnvelope {
    fn from(error: EnvParseError) -> Self {
        let code = error.error_code();
        let message = error.to_string();
        let envelope = Self::expected(code, message);

        match error {
            EnvParseError::EmptyValue { var } => envelope.with_metadata("env_var", var),
            EnvParseError::InvalidBool { var, value } | EnvParseError::InvalidInt { var, value } => {
                envelope
                    .with_metadata("env_var", var)
                    .with_metadata("value", value)
            },
        }
    }
}

fn read_trimmed<'a>(
    map: &'a BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<&'a str>, EnvParseError> {
    let Some(raw) = map.get(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(EnvParseError::EmptyValue { var });
    }
    Ok(Some(trimmed))
}

fn parse_optional_trimmed_string(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<Box<str>>, EnvParseError> {
    Ok(read_trimmed(map, var)?.map(Box::from))
}

fn parse_optional_u64(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u64>, EnvParseError> {
    let Some(trimmed) = read_trimmed(map, var)? else {
        return Ok(None);
    };
    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: trimmed.to_owned(),
        })
}

fn parse_optional_u32(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<u32>, EnvParseError> {
    let Some(trimmed) = read_trimmed(map, var)? else {
        return Ok(None);
    };
    trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| EnvParseError::InvalidInt {
            var,
            value: trimmed.to_owned(),
        })
}

fn parse_optional_bool(
    map: &BTreeMap<String, String>,
    var: &'static str,
) -> Result<Option<bool>, EnvParseError> {
    let Some(trimmed) = read_trimmed(map, var)? else {
        return Ok(None);
    };

    match trimmed.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(Some(true)),
        "false" | "0" | "no" | "off" => Ok(Some(false)),
        _ => Err(EnvParseError::InvalidBool {
            var,
            value: trimmed.to_owned(),
        }),
    }
}
