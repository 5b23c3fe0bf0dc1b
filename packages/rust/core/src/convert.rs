//! Markdown fragment conversion via the external converter.

use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use seagull_shared::{BuildConfig, Project, Result, ToolchainConfig};

use crate::document::BuildReporter;
use crate::process::{Invocation, ProcessRunner, run_stage};

/// Extension of fragment sources.
pub const SOURCE_EXTENSION: &str = "md";

/// Extension of converted fragments.
pub const INTERMEDIATE_EXTENSION: &str = "tex";

/// `<dir>/<id>.md`
pub fn source_file(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}.{SOURCE_EXTENSION}"))
}

/// `<dir>/<id>.tex`
pub fn intermediate_file(dir: &Path, id: &str) -> PathBuf {
    dir.join(format!("{id}.{INTERMEDIATE_EXTENSION}"))
}

/// Converter call for one fragment.
pub fn converter_invocation(
    toolchain: &ToolchainConfig,
    project: &Project,
    config: &BuildConfig,
    id: &str,
) -> Invocation {
    let mut invocation = Invocation::new(&toolchain.converter);
    for filter in &toolchain.converter_filters {
        invocation = invocation.arg(format!("--filter={filter}"));
    }
    invocation
        .arg(format!("--top-level-division={}", config.top_level))
        .arg("-o")
        .arg(intermediate_file(&project.latex_path, id))
        .arg(source_file(&project.content_path, id))
}

/// Convert every content fragment, then every annex, in list order.
///
/// Stops at the first failing conversion; later fragments are not attempted.
/// Returns the number of fragments converted.
#[instrument(skip_all, fields(fragments = config.fragments().count()))]
pub fn convert_fragments(
    runner: &dyn ProcessRunner,
    toolchain: &ToolchainConfig,
    project: &Project,
    config: &BuildConfig,
    progress: &dyn BuildReporter,
) -> Result<usize> {
    let total = config.fragments().count();

    for (i, id) in config.fragments().enumerate() {
        let invocation = converter_invocation(toolchain, project, config, id);
        run_stage(runner, &format!("convert {id}"), &invocation)?;
        progress.fragment_converted(id, i + 1, total);
    }

    info!(count = total, "fragments converted");
    Ok(total)
}
