//! Build orchestration: `resolve` → `make` / `clean` for one document.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};

use seagull_shared::{
    BuildConfig, Project, ProjectRegistry, Result, SeagullError, ToolchainConfig,
    load_build_config,
};

use crate::composer::Composition;
use crate::convert::{self, intermediate_file};
use crate::process::{ProcessRunner, SystemRunner};
use crate::toolchain;

/// Extension of the template file in the LaTeX directory.
pub const TEMPLATE_EXTENSION: &str = "template";

/// Byproducts of the composed document removed by `clean`.
const DOCUMENT_BYPRODUCTS: [&str; 5] = ["tex", "log", "out", "aux", "pdf"];

/// Byproducts of each fragment removed by `clean`.
const FRAGMENT_BYPRODUCTS: [&str; 2] = ["tex", "aux"];

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting build status.
pub trait BuildReporter: Send + Sync {
    /// Called when entering a new stage.
    fn stage(&self, name: &str);
    /// Called after each fragment conversion.
    fn fragment_converted(&self, id: &str, current: usize, total: usize);
    /// Called after each toolchain pass.
    fn pass_completed(&self, pass: &str, current: usize, total: usize);
    /// Called when `make` completes.
    fn done(&self, report: &MakeReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl BuildReporter for SilentProgress {
    fn stage(&self, _name: &str) {}
    fn fragment_converted(&self, _id: &str, _current: usize, _total: usize) {}
    fn pass_completed(&self, _pass: &str, _current: usize, _total: usize) {}
    fn done(&self, _report: &MakeReport) {}
}

// ---------------------------------------------------------------------------
// Build environment, options and results
// ---------------------------------------------------------------------------

/// External programs available to a build.
#[derive(Clone)]
pub struct BuildEnv {
    runner: Arc<dyn ProcessRunner>,
    toolchain: ToolchainConfig,
}

impl BuildEnv {
    /// Run tools on the host.
    pub fn new(toolchain: ToolchainConfig) -> Self {
        Self::with_runner(toolchain, Arc::new(SystemRunner))
    }

    pub fn with_runner(toolchain: ToolchainConfig, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner, toolchain }
    }

    pub fn toolchain(&self) -> &ToolchainConfig {
        &self.toolchain
    }
}

impl fmt::Debug for BuildEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildEnv")
            .field("toolchain", &self.toolchain)
            .finish_non_exhaustive()
    }
}

/// Flags for one `make` run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MakeOptions {
    /// Configure the template for printed output.
    pub for_print: bool,
    /// Carry the build through the typesetting toolchain.
    pub to_pdf: bool,
}

/// Result of a successful `make`.
#[derive(Debug, Clone)]
pub struct MakeReport {
    /// Path of the composed `.tex` document.
    pub document: PathBuf,
    /// Number of fragments converted (content + annexes).
    pub fragments: usize,
    /// Path of the rendered PDF, when the toolchain ran.
    pub pdf: Option<PathBuf>,
    pub elapsed: Duration,
}

/// Result of `clean`.
#[derive(Debug, Clone, Default)]
pub struct CleanReport {
    /// Files that existed and were deleted.
    pub removed: Vec<PathBuf>,
    /// Files that exist but could not be deleted.
    pub failed: Vec<(PathBuf, String)>,
}

/// Outcome of [`remove_if_exists`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    Absent,
}

/// Delete a file, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> std::io::Result<Removal> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(Removal::Removed),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Removal::Absent),
        Err(e) => Err(e),
    }
}

// ---------------------------------------------------------------------------
// BuildUnit
// ---------------------------------------------------------------------------

/// A resolved, buildable document: slug, project and build configuration.
///
/// The build configuration is read once by [`BuildUnit::resolve`]; later
/// edits to `build.yml` are not seen by an existing unit.
#[derive(Debug, Clone)]
pub struct BuildUnit {
    slug: String,
    project: Project,
    config: BuildConfig,
}

impl BuildUnit {
    pub fn new(slug: impl Into<String>, project: Project, config: BuildConfig) -> Self {
        Self {
            slug: slug.into(),
            project,
            config,
        }
    }

    /// Look up `id` in the registry and load its build configuration.
    ///
    /// Unknown identifiers fail before any file is read.
    pub fn resolve(id: &str, registry: &ProjectRegistry) -> Result<Self> {
        let project = registry.get(id)?;
        let config = load_build_config(id, project)?;
        Ok(Self::new(id, project.clone(), config))
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// `<latex_path>/<slug>.template`
    pub fn template_path(&self) -> PathBuf {
        self.document_file(TEMPLATE_EXTENSION)
    }

    /// `<latex_path>/<slug>.tex`
    pub fn document_path(&self) -> PathBuf {
        self.document_file("tex")
    }

    fn document_file(&self, extension: &str) -> PathBuf {
        self.project
            .latex_path
            .join(format!("{}.{extension}", self.slug))
    }

    /// Fragment sources whose changes should trigger a rebuild. Annexes are
    /// not included.
    pub fn content_sources(&self) -> Vec<PathBuf> {
        self.config
            .inputs
            .iter()
            .map(|id| convert::source_file(&self.project.content_path, id))
            .collect()
    }

    /// Every file `make` may produce.
    pub fn generated_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = DOCUMENT_BYPRODUCTS
            .iter()
            .map(|ext| self.document_file(ext))
            .collect();

        for id in self.config.fragments() {
            let tex = intermediate_file(&self.project.latex_path, id);
            files.extend(FRAGMENT_BYPRODUCTS.iter().map(|ext| tex.with_extension(ext)));
        }
        files
    }

    /// Compose the document, convert fragments, and optionally typeset.
    ///
    /// The template is read and composed first, so template and version
    /// history problems are reported before any external program runs.
    #[instrument(skip_all, fields(slug = %self.slug, for_print = options.for_print, to_pdf = options.to_pdf))]
    pub fn make(
        &self,
        env: &BuildEnv,
        options: MakeOptions,
        progress: &dyn BuildReporter,
    ) -> Result<MakeReport> {
        let start = Instant::now();
        info!("starting build");

        // --- Phase 1: Compose ---
        progress.stage("Composing template");
        let template = self.read_template()?;
        let composed = Composition::new(&self.slug, &self.config, options.for_print)
            .compose(&template)?;

        // --- Phase 2: Convert fragments ---
        progress.stage("Converting fragments");
        let fragments = convert::convert_fragments(
            env.runner.as_ref(),
            &env.toolchain,
            &self.project,
            &self.config,
            progress,
        )?;

        // --- Phase 3: Write composed document ---
        let document = self.document_path();
        std::fs::write(&document, composed).map_err(|e| SeagullError::io(&document, e))?;
        debug!(path = %document.display(), "wrote composed document");

        // --- Phase 4: Typeset ---
        let pdf = if options.to_pdf {
            progress.stage("Typesetting");
            toolchain::typeset(
                env.runner.as_ref(),
                &env.toolchain,
                &self.slug,
                &self.project.latex_path,
                progress,
            )?;
            Some(self.document_file("pdf"))
        } else {
            None
        };

        let report = MakeReport {
            document,
            fragments,
            pdf,
            elapsed: start.elapsed(),
        };
        info!(
            fragments = report.fragments,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "build complete"
        );
        progress.done(&report);
        Ok(report)
    }

    /// Delete the composed document, toolchain byproducts, and every
    /// fragment's intermediate files. Absent files are skipped silently,
    /// so calling this repeatedly is harmless.
    #[instrument(skip_all, fields(slug = %self.slug))]
    pub fn clean(&self) -> CleanReport {
        let mut report = CleanReport::default();

        for path in self.generated_files() {
            match remove_if_exists(&path) {
                Ok(Removal::Removed) => {
                    debug!(path = %path.display(), "removed");
                    report.removed.push(path);
                }
                Ok(Removal::Absent) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "could not remove file");
                    report.failed.push((path, e.to_string()));
                }
            }
        }

        info!(
            removed = report.removed.len(),
            failed = report.failed.len(),
            "clean complete"
        );
        report
    }

    fn read_template(&self) -> Result<String> {
        let path = self.template_path();
        std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SeagullError::MissingTemplate { path: path.clone() },
            _ => SeagullError::io(&path, e),
        })
    }
}

impl fmt::Display for BuildUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.project, self.config)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
