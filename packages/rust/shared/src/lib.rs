//! Shared types, error model, and configuration for Seagull.
//!
//! This crate is the foundation depended on by the other Seagull crates.
//! It provides:
//! - [`SeagullError`]: the unified error type
//! - Domain types ([`Project`], [`ProjectRegistry`], [`BuildConfig`], [`VersionEntry`])
//! - Configuration ([`Settings`], [`ToolchainConfig`], registry and `build.yml` loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    BUILD_CONFIG_FILE_NAME, REGISTRY_FILE_NAME, RegistryFile, Settings, ToolchainConfig,
    WatchConfig, build_config_path, load_build_config, load_settings, load_settings_from,
    parse_build_config, parse_settings,
};
pub use error::{Result, SeagullError};
pub use types::{
    BuildConfig, DEFAULT_CLASSIFICATION, IncludeStyle, Project, ProjectRegistry,
    TopLevelDivision, VersionEntry,
};
