//! Build pipeline and watch-mode orchestration for Seagull.
//!
//! This crate turns a resolved project into a composed LaTeX document:
//! template composition, fragment conversion, the typesetting toolchain,
//! cleanup, and the rebuild-on-change loop.

pub mod composer;
pub mod convert;
pub mod document;
pub mod process;
pub mod toolchain;
pub mod watch;

pub use document::{
    BuildEnv, BuildReporter, BuildUnit, CleanReport, MakeOptions, MakeReport, SilentProgress,
};
