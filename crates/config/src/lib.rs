//! # optron-config
//!
//! Exporter configuration schema, validation, and normalization, plus the
//! file and environment loaders. This crate depends on `shared` only.

/// Environment variable parsing and merging.
pub mod env;
/// Config loading helpers (env + file).
pub mod load;
/// Configuration schema types and helpers.
pub mod schema;

pub use env::{EnvParseError, OptronEnv, apply_env_overrides};
pub use load::{
    ConfigFormat, load_optron_config_from_path, load_optron_config_from_sources,
    load_optron_config_std_env, to_pretty_json, to_pretty_toml,
};
pub use schema::{
    BATCH_SIZE_MAX, BATCH_SIZE_MIN, CURRENT_CONFIG_VERSION, ConfigSchemaError, OptronConfig,
    OptronLimits, ValidatedOptronConfig, parse_optron_config_json, parse_optron_config_toml,
};

/// Returns the config crate version.
#[must_use]
pub const fn config_crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
