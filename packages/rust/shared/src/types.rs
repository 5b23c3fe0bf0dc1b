//! Core domain types: projects, build configurations and version history.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::error::{Result, SeagullError};

/// Classification label used when a build configuration does not set one.
pub const DEFAULT_CLASSIFICATION: &str = "white";

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

/// A buildable document project, as declared in the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// Human-readable name.
    pub name: String,
    /// Directory holding the template, intermediate `.tex` files and outputs.
    pub latex_path: PathBuf,
    /// Directory holding the Markdown fragments and `build.yml`.
    pub content_path: PathBuf,
    /// Whether the project is part of the compendium.
    #[serde(default)]
    pub compendium: bool,
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.name)?;
        writeln!(f, "    Content path: {}", self.content_path.display())?;
        writeln!(f, "    LaTeX path:   {}", self.latex_path.display())?;
        writeln!(f, "    Included in Compendium? {}", self.compendium)
    }
}

// ---------------------------------------------------------------------------
// ProjectRegistry
// ---------------------------------------------------------------------------

/// All known projects keyed by identifier. Loaded once per process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectRegistry(BTreeMap<String, Project>);

impl ProjectRegistry {
    pub fn new(projects: BTreeMap<String, Project>) -> Self {
        Self(projects)
    }

    /// Look up a project, failing with [`SeagullError::UnknownProject`].
    pub fn get(&self, id: &str) -> Result<&Project> {
        self.0.get(id).ok_or_else(|| SeagullError::UnknownProject {
            id: id.to_string(),
            known: self.ids().map(String::from).collect(),
        })
    }

    /// Project identifiers in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Project)> {
        self.0.iter().map(|(id, p)| (id.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ProjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (id, project) in self.iter() {
            writeln!(f, "    {id}: {}", project.name)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// VersionEntry
// ---------------------------------------------------------------------------

/// One row of a document's version history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionEntry {
    #[serde(deserialize_with = "scalar_text")]
    pub version: String,
    /// Free-form date string; never parsed.
    #[serde(deserialize_with = "scalar_text")]
    pub date: String,
    #[serde(deserialize_with = "scalar_text")]
    pub author: String,
    #[serde(deserialize_with = "scalar_text")]
    pub remarks: String,
}

/// Any YAML scalar as text, so an unquoted `version: 1.0` reads as `"1.0"`
/// even when the document went through an intermediate [`serde_yaml::Value`].
fn scalar_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_yaml::Value::deserialize(deserializer)? {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(de::Error::custom(format!(
            "expected a scalar, found {other:?}"
        ))),
    }
}

impl fmt::Display for VersionEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}:", self.version)?;
        writeln!(f, "        Author:  {}", self.author)?;
        writeln!(f, "        Date:    {}", self.date)?;
        write!(f, "        Remarks: {}", self.remarks)
    }
}

// ---------------------------------------------------------------------------
// BuildConfig
// ---------------------------------------------------------------------------

/// Top-level sectioning unit passed to the converter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TopLevelDivision {
    Default,
    Part,
    #[default]
    Chapter,
    Section,
}

impl TopLevelDivision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Part => "part",
            Self::Chapter => "chapter",
            Self::Section => "section",
        }
    }
}

impl fmt::Display for TopLevelDivision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How composed documents pull in converted fragments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncludeStyle {
    /// `\include{id}`: each fragment becomes its own division with its own `.aux`.
    #[default]
    Include,
    /// `\input{id}`: the fragment is spliced in place.
    Input,
}

impl IncludeStyle {
    /// Render the directive for one fragment.
    pub fn directive(self, id: &str) -> String {
        match self {
            Self::Include => format!("\\include{{{id}}}"),
            Self::Input => format!("\\input{{{id}}}"),
        }
    }
}

/// Per-project `build.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Division granularity for converted fragments.
    #[serde(default)]
    pub top_level: TopLevelDivision,

    /// Classification label (`tlp` in the file).
    #[serde(default, rename = "tlp", skip_serializing_if = "Option::is_none")]
    pub classification: Option<String>,

    /// Content fragment identifiers in document order.
    pub inputs: Vec<String>,

    /// Annex fragment identifiers, if the document has annexes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annexes: Option<Vec<String>>,

    /// Chronological version history; the last entry is the most recent.
    #[serde(default)]
    pub version_history: Vec<VersionEntry>,

    #[serde(default)]
    pub include_style: IncludeStyle,
}

impl BuildConfig {
    /// Classification label, falling back to [`DEFAULT_CLASSIFICATION`].
    pub fn classification(&self) -> &str {
        self.classification
            .as_deref()
            .unwrap_or(DEFAULT_CLASSIFICATION)
    }

    /// Annex identifiers; empty when no annex list is configured.
    pub fn annexes(&self) -> &[String] {
        self.annexes.as_deref().unwrap_or_default()
    }

    /// Content fragments followed by annexes.
    pub fn fragments(&self) -> impl Iterator<Item = &str> {
        self.inputs
            .iter()
            .chain(self.annexes())
            .map(String::as_str)
    }

    /// The most recent version entry, if any.
    pub fn latest_version(&self) -> Option<&VersionEntry> {
        self.version_history.last()
    }

    /// Reject fragment lists that would make two fragments share a file.
    pub fn validate(&self) -> std::result::Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for id in self.fragments() {
            if id.trim().is_empty() {
                return Err("fragment identifiers must not be empty".into());
            }
            if !seen.insert(id) {
                return Err(format!("fragment `{id}` is listed more than once"));
            }
        }
        Ok(())
    }
}

impl fmt::Display for BuildConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Inputs:")?;
        for id in &self.inputs {
            writeln!(f, "    {id}")?;
        }
        writeln!(f, "Annexes:")?;
        for id in self.annexes() {
            writeln!(f, "    {id}")?;
        }
        writeln!(f, "Version History:")?;
        for entry in &self.version_history {
            writeln!(f, "    {entry}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(inputs: &[&str], annexes: Option<&[&str]>) -> BuildConfig {
        BuildConfig {
            top_level: TopLevelDivision::Chapter,
            classification: None,
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            annexes: annexes.map(|a| a.iter().map(|s| s.to_string()).collect()),
            version_history: vec![],
            include_style: IncludeStyle::Include,
        }
    }

    fn registry() -> ProjectRegistry {
        let mut projects = BTreeMap::new();
        projects.insert(
            "doc".to_string(),
            Project {
                name: "Doc".into(),
                latex_path: "/tmp/out".into(),
                content_path: "/tmp/src".into(),
                compendium: true,
            },
        );
        ProjectRegistry::new(projects)
    }

    #[test]
    fn classification_defaults_to_white() {
        let mut cfg = config(&["intro"], None);
        assert_eq!(cfg.classification(), "white");

        cfg.classification = Some("amber".into());
        assert_eq!(cfg.classification(), "amber");
    }

    #[test]
    fn fragments_lists_inputs_then_annexes() {
        let cfg = config(&["intro", "body"], Some(&["appendix"]));
        let all: Vec<_> = cfg.fragments().collect();
        assert_eq!(all, vec!["intro", "body", "appendix"]);

        let cfg = config(&["intro"], None);
        assert!(cfg.annexes().is_empty());
    }

    #[test]
    fn validate_rejects_duplicate_fragments() {
        let cfg = config(&["intro", "intro"], None);
        assert!(cfg.validate().unwrap_err().contains("intro"));

        let cfg = config(&["intro"], Some(&["intro"]));
        assert!(cfg.validate().is_err());

        let cfg = config(&["intro", "body"], Some(&["appendix"]));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn include_style_directives() {
        assert_eq!(IncludeStyle::Include.directive("intro"), "\\include{intro}");
        assert_eq!(IncludeStyle::Input.directive("intro"), "\\input{intro}");
    }

    #[test]
    fn registry_lookup() {
        let reg = registry();
        assert_eq!(reg.get("doc").unwrap().name, "Doc");

        match reg.get("missing") {
            Err(SeagullError::UnknownProject { id, known }) => {
                assert_eq!(id, "missing");
                assert_eq!(known, vec!["doc".to_string()]);
            }
            other => panic!("expected UnknownProject, got {other:?}"),
        }
    }

    #[test]
    fn registry_listing_format() {
        assert_eq!(registry().to_string(), "    doc: Doc\n");
    }

    #[test]
    fn describe_lists_fragments_and_history() {
        let mut cfg = config(&["intro"], Some(&["appendix"]));
        cfg.version_history.push(VersionEntry {
            version: "1.0".into(),
            date: "2024-01-01".into(),
            author: "A. Author".into(),
            remarks: "initial".into(),
        });
        let text = cfg.to_string();
        assert!(text.contains("Inputs:\n    intro\n"));
        assert!(text.contains("Annexes:\n    appendix\n"));
        assert!(text.contains("Author:  A. Author"));
    }
}
