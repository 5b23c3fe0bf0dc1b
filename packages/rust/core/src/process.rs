//! External program execution.
//!
//! Every converter and toolchain call goes through [`ProcessRunner`], so the
//! pipeline can run against [`SystemRunner`] in production and against a
//! recording runner in tests.

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

use seagull_shared::{Result, SeagullError};

/// One external program call: program, arguments and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    /// Passed through untouched, so non-UTF-8 paths reach the program intact.
    pub args: Vec<OsString>,
    pub current_dir: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

/// How an external program finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    Success,
    /// Nonzero exit code, or `None` when killed by a signal.
    Failed(Option<i32>),
}

/// Runs external programs synchronously, waiting for them to exit.
pub trait ProcessRunner: Send + Sync {
    /// Run the invocation to completion. `Err` means the program could not
    /// be started at all.
    fn run(&self, invocation: &Invocation) -> std::io::Result<ProcessExit>;
}

/// Runs programs on the host, inheriting stdio so tool output stays visible.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> std::io::Result<ProcessExit> {
        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &invocation.current_dir {
            command.current_dir(dir);
        }

        let status = command.status()?;
        Ok(if status.success() {
            ProcessExit::Success
        } else {
            ProcessExit::Failed(status.code())
        })
    }
}

/// Run one pipeline stage, turning a nonzero exit into
/// [`SeagullError::BuildFailed`] named after `stage`.
pub fn run_stage(runner: &dyn ProcessRunner, stage: &str, invocation: &Invocation) -> Result<()> {
    debug!(stage, command = %invocation, dir = ?invocation.current_dir, "running");

    match runner.run(invocation) {
        Ok(ProcessExit::Success) => Ok(()),
        Ok(ProcessExit::Failed(status)) => Err(SeagullError::build_failed(stage, status)),
        Err(source) => Err(SeagullError::ToolUnavailable {
            program: invocation.program.clone(),
            source,
        }),
    }
}
