//! Template composition.
//!
//! A template is a LaTeX skeleton containing `%!{NAME}` tokens. Composition
//! replaces each recognized token with text generated from the build
//! configuration in a single pass, so generated text is never re-scanned for
//! tokens. Any `%!{...}` token that is not recognized is rejected rather than
//! left in the output.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument};

use seagull_shared::{BuildConfig, Result, SeagullError};

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%!\{[^{}\s]*\}").expect("valid token regex"));

/// A placeholder the composer knows how to expand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// `\printtrue` or `\printfalse`.
    Print,
    /// Classification label.
    Classification,
    /// Date of the most recent version entry.
    Date,
    /// `versionhistory` environment with one `\vhEntry` per version.
    VersionHistory,
    /// Directives pulling in the content fragments.
    Inputs,
    /// Directives pulling in the annexes.
    Annexes,
}

impl Placeholder {
    pub const ALL: [Self; 6] = [
        Self::Print,
        Self::Classification,
        Self::Date,
        Self::VersionHistory,
        Self::Inputs,
        Self::Annexes,
    ];

    /// The literal token as it appears in templates.
    pub fn token(self) -> &'static str {
        match self {
            Self::Print => "%!{PRINT}",
            Self::Classification => "%!{TLP}",
            Self::Date => "%!{DATE}",
            Self::VersionHistory => "%!{VERSION_HISTORY}",
            Self::Inputs => "%!{INPUTS}",
            Self::Annexes => "%!{ANNEXES}",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.token() == token)
    }
}

/// Everything needed to expand placeholders for one document.
#[derive(Debug, Clone, Copy)]
pub struct Composition<'a> {
    /// Document slug, used in diagnostics.
    pub slug: &'a str,
    pub config: &'a BuildConfig,
    pub for_print: bool,
}

impl<'a> Composition<'a> {
    pub fn new(slug: &'a str, config: &'a BuildConfig, for_print: bool) -> Self {
        Self {
            slug,
            config,
            for_print,
        }
    }

    /// Expand every token in `template`.
    #[instrument(skip_all, fields(slug = %self.slug, for_print = self.for_print))]
    pub fn compose(&self, template: &str) -> Result<String> {
        let mut out = String::with_capacity(template.len());
        let mut last = 0;
        let mut expanded = 0usize;

        for m in TOKEN.find_iter(template) {
            let placeholder =
                Placeholder::from_token(m.as_str()).ok_or_else(|| {
                    SeagullError::UnexpandedPlaceholder {
                        token: m.as_str().to_string(),
                    }
                })?;

            out.push_str(&template[last..m.start()]);
            out.push_str(&self.expand(placeholder)?);
            last = m.end();
            expanded += 1;
        }
        out.push_str(&template[last..]);

        debug!(expanded, len = out.len(), "template composed");
        Ok(out)
    }

    /// Expansion of a single placeholder.
    pub fn expand(&self, placeholder: Placeholder) -> Result<String> {
        Ok(match placeholder {
            Placeholder::Print => print_flag(self.for_print).to_string(),
            Placeholder::Classification => self.config.classification().to_string(),
            Placeholder::Date => self.most_recent_date()?.to_string(),
            Placeholder::VersionHistory => version_history_block(self.config),
            Placeholder::Inputs => inclusion_block(self.config, &self.config.inputs),
            Placeholder::Annexes => inclusion_block(self.config, self.config.annexes()),
        })
    }

    /// Date of the last version entry.
    pub fn most_recent_date(&self) -> Result<&'a str> {
        self.config
            .latest_version()
            .map(|v| v.date.as_str())
            .ok_or_else(|| SeagullError::MissingVersionHistory {
                project: self.slug.to_string(),
            })
    }
}

fn print_flag(for_print: bool) -> &'static str {
    if for_print { r"\printtrue" } else { r"\printfalse" }
}

/// The `versionhistory` environment. An empty history still yields a
/// well-formed (empty) environment.
pub fn version_history_block(config: &BuildConfig) -> String {
    let mut lines = Vec::with_capacity(config.version_history.len() + 3);
    lines.push(r"\begin{versionhistory}".to_string());
    lines.extend(config.version_history.iter().map(|v| {
        format!(
            "    \\vhEntry{{{}}}{{{}}}{{{}}}{{{}}}",
            v.version, v.date, v.author, v.remarks
        )
    }));
    lines.push(r"\end{versionhistory}".to_string());
    lines.push(String::new());
    lines.join("\n")
}

/// One include directive per fragment, newline-separated, in list order.
pub fn inclusion_block(config: &BuildConfig, ids: &[String]) -> String {
    ids.iter()
        .map(|id| config.include_style.directive(id))
        .collect::<Vec<_>>()
        .join("\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
