//! Registry and build configuration loading.
//!
//! The registry lives at `./seagull.yml` (overridable from the CLI) and maps
//! project identifiers to [`Project`]s. Each project keeps its own
//! `build.yml` inside its content directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{Result, SeagullError};
use crate::types::{BuildConfig, Project, ProjectRegistry};

/// Default registry file name, resolved against the working directory.
pub const REGISTRY_FILE_NAME: &str = "seagull.yml";

/// Build configuration file name inside a project's content directory.
pub const BUILD_CONFIG_FILE_NAME: &str = "build.yml";

/// Type tags written by earlier versions of the tool. They carry no
/// information beyond what the schema already implies.
const LEGACY_TAGS: [&str; 4] = ["SeagullConfig", "Project", "BuildConfig", "Version"];

// ---------------------------------------------------------------------------
// Config structs (matching seagull.yml schema)
// ---------------------------------------------------------------------------

/// Top-level registry file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryFile {
    /// Registered projects.
    pub projects: BTreeMap<String, Project>,

    /// External program names.
    #[serde(default)]
    pub toolchain: ToolchainConfig,

    /// Watch mode settings.
    #[serde(default)]
    pub watch: WatchConfig,
}

/// `toolchain:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolchainConfig {
    /// Markdown-to-LaTeX converter.
    #[serde(default = "default_converter")]
    pub converter: String,

    /// Filters passed to the converter as `--filter=<name>`.
    #[serde(default = "default_converter_filters")]
    pub converter_filters: Vec<String>,

    /// Primary LaTeX renderer.
    #[serde(default = "default_renderer")]
    pub renderer: String,

    /// Glossary generator.
    #[serde(default = "default_glossary")]
    pub glossary: String,

    /// Bibliography generator.
    #[serde(default = "default_bibliography")]
    pub bibliography: String,

    /// Index generator.
    #[serde(default = "default_index")]
    pub index: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            converter: default_converter(),
            converter_filters: default_converter_filters(),
            renderer: default_renderer(),
            glossary: default_glossary(),
            bibliography: default_bibliography(),
            index: default_index(),
        }
    }
}

fn default_converter() -> String {
    "pandoc".into()
}
fn default_converter_filters() -> Vec<String> {
    vec!["pandoc-theorem-exe".into()]
}
fn default_renderer() -> String {
    "pdflatex".into()
}
fn default_glossary() -> String {
    "makeglossaries".into()
}
fn default_bibliography() -> String {
    "biber".into()
}
fn default_index() -> String {
    "makeindex".into()
}

/// `watch:` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Window in ms during which further change events join the same rebuild.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    100
}

// ---------------------------------------------------------------------------
// Loaded settings
// ---------------------------------------------------------------------------

/// Everything read from the registry file.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub registry: ProjectRegistry,
    pub toolchain: ToolchainConfig,
    pub watch: WatchConfig,
}

impl From<RegistryFile> for Settings {
    fn from(file: RegistryFile) -> Self {
        Self {
            registry: ProjectRegistry::new(file.projects),
            toolchain: file.toolchain,
            watch: file.watch,
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load the registry from `./seagull.yml`.
pub fn load_settings() -> Result<Settings> {
    load_settings_from(Path::new(REGISTRY_FILE_NAME))
}

/// Load the registry from a specific file path.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path).map_err(|e| SeagullError::io(path, e))?;
    let settings = parse_settings(&content).map_err(|e| {
        SeagullError::config(format!("failed to parse {}: {e}", path.display()))
    })?;

    tracing::debug!(?path, projects = settings.registry.len(), "loaded registry");
    Ok(settings)
}

/// Parse registry file contents.
pub fn parse_settings(content: &str) -> std::result::Result<Settings, serde_yaml::Error> {
    let file: RegistryFile = from_yaml(content)?;
    Ok(file.into())
}

/// Path of a project's build configuration.
pub fn build_config_path(project: &Project) -> PathBuf {
    project.content_path.join(BUILD_CONFIG_FILE_NAME)
}

/// Load and validate the build configuration of the project `id`.
pub fn load_build_config(id: &str, project: &Project) -> Result<BuildConfig> {
    let path = build_config_path(project);
    let content =
        std::fs::read_to_string(&path).map_err(|source| SeagullError::MissingConfiguration {
            project: id.to_string(),
            path: path.clone(),
            source,
        })?;

    let config = parse_build_config(&content).map_err(|message| {
        SeagullError::InvalidConfiguration {
            path: path.clone(),
            message,
        }
    })?;

    tracing::debug!(
        project = id,
        inputs = config.inputs.len(),
        annexes = config.annexes().len(),
        versions = config.version_history.len(),
        "loaded build configuration"
    );
    Ok(config)
}

/// Parse and validate `build.yml` contents.
pub fn parse_build_config(content: &str) -> std::result::Result<BuildConfig, String> {
    let config: BuildConfig = from_yaml(content).map_err(|e| e.to_string())?;
    config.validate()?;
    Ok(config)
}

/// Deserialize `content`, looking through legacy type tags.
///
/// Untagged documents are deserialized straight from the text so errors keep
/// their line and column.
fn from_yaml<T: DeserializeOwned>(content: &str) -> std::result::Result<T, serde_yaml::Error> {
    let value: Value = serde_yaml::from_str(content)?;
    let mut stripped = false;
    let value = strip_legacy_tags(value, &mut stripped);
    if stripped {
        serde_yaml::from_value(value)
    } else {
        serde_yaml::from_str(content)
    }
}

/// Unwrap every node carrying one of [`LEGACY_TAGS`]. Only real tag
/// properties are touched; scalar text is left alone.
fn strip_legacy_tags(value: Value, stripped: &mut bool) -> Value {
    match value {
        Value::Tagged(tagged) if LEGACY_TAGS.iter().any(|t| tagged.tag == *t) => {
            *stripped = true;
            strip_legacy_tags(tagged.value, stripped)
        }
        Value::Tagged(mut tagged) => {
            tagged.value = strip_legacy_tags(tagged.value, stripped);
            Value::Tagged(tagged)
        }
        Value::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(|v| strip_legacy_tags(v, stripped))
                .collect(),
        ),
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| (k, strip_legacy_tags(v, stripped)))
                .collect(),
        ),
        other => other,
    }
}
