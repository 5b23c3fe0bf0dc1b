//! Typesetting toolchain driver.
//!
//! Runs the renderer and its auxiliary generators in a fixed order inside the
//! project's LaTeX directory. The renderer runs three times so that
//! cross-references, bibliography, glossary and index settle; convergence is
//! not detected.

use std::path::Path;

use tracing::{info, instrument};

use seagull_shared::{Result, ToolchainConfig};

use crate::document::BuildReporter;
use crate::process::{Invocation, ProcessRunner, run_stage};

/// One kind of toolchain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypesetPass {
    Render,
    Glossary,
    Bibliography,
    Index,
}

/// The fixed pass order.
pub const PASS_SEQUENCE: [TypesetPass; 6] = [
    TypesetPass::Render,
    TypesetPass::Glossary,
    TypesetPass::Bibliography,
    TypesetPass::Index,
    TypesetPass::Render,
    TypesetPass::Render,
];

impl TypesetPass {
    pub fn name(self) -> &'static str {
        match self {
            Self::Render => "render",
            Self::Glossary => "glossary",
            Self::Bibliography => "bibliography",
            Self::Index => "index",
        }
    }

    fn program(self, toolchain: &ToolchainConfig) -> &str {
        match self {
            Self::Render => &toolchain.renderer,
            Self::Glossary => &toolchain.glossary,
            Self::Bibliography => &toolchain.bibliography,
            Self::Index => &toolchain.index,
        }
    }

    /// Command for this pass over `<slug>` in `working_dir`.
    pub fn invocation(self, toolchain: &ToolchainConfig, slug: &str, working_dir: &Path) -> Invocation {
        let invocation = Invocation::new(self.program(toolchain)).current_dir(working_dir);
        match self {
            Self::Render => invocation
                .arg("-halt-on-error")
                .arg(format!("{slug}.tex")),
            Self::Glossary | Self::Bibliography | Self::Index => invocation.arg(slug),
        }
    }
}

/// Run [`PASS_SEQUENCE`], stopping at the first failing pass.
#[instrument(skip_all, fields(slug = %slug, dir = %working_dir.display()))]
pub fn typeset(
    runner: &dyn ProcessRunner,
    toolchain: &ToolchainConfig,
    slug: &str,
    working_dir: &Path,
    progress: &dyn BuildReporter,
) -> Result<()> {
    let total = PASS_SEQUENCE.len();

    for (i, pass) in PASS_SEQUENCE.into_iter().enumerate() {
        let invocation = pass.invocation(toolchain, slug, working_dir);
        let stage = format!("{} pass {}/{total} ({})", pass.name(), i + 1, invocation.program);
        run_stage(runner, &stage, &invocation)?;
        progress.pass_completed(pass.name(), i + 1, total);
    }

    info!(passes = total, "typesetting complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use seagull_shared::SeagullError;

    use super::*;
    use crate::document::SilentProgress;
    use crate::process::testing::RecordingRunner;

    #[test]
    fn runs_fixed_sequence_in_working_dir() {
        let runner = RecordingRunner::new();
        let dir = Path::new("/tmp/out");
        typeset(&runner, &ToolchainConfig::default(), "doc", dir, &SilentProgress).unwrap();

        assert_eq!(
            runner.programs(),
            vec!["pdflatex", "makeglossaries", "biber", "makeindex", "pdflatex", "pdflatex"]
        );

        let calls = runner.calls();
        assert!(calls.iter().all(|c| c.current_dir.as_deref() == Some(dir)));
        assert_eq!(calls[0].args, vec!["-halt-on-error", "doc.tex"]);
        assert_eq!(calls[2].args, vec!["doc"]);
    }

    #[test]
    fn failing_pass_stops_the_sequence() {
        let runner = RecordingRunner::failing_on("biber", 2);
        let err = typeset(
            &runner,
            &ToolchainConfig::default(),
            "doc",
            Path::new("/tmp/out"),
            &SilentProgress,
        )
        .unwrap_err();

        match err {
            SeagullError::BuildFailed { stage, status } => {
                assert_eq!(stage, "bibliography pass 3/6 (biber)");
                assert_eq!(status, Some(2));
            }
            other => panic!("expected BuildFailed, got {other:?}"),
        }
        assert_eq!(runner.calls().len(), 3);
    }

    #[test]
    fn program_names_come_from_toolchain_config() {
        let toolchain = ToolchainConfig {
            renderer: "lualatex".into(),
            ..ToolchainConfig::default()
        };
        let inv = TypesetPass::Render.invocation(&toolchain, "doc", Path::new("."));
        assert_eq!(inv.to_string(), "lualatex -halt-on-error doc.tex");
    }
}
