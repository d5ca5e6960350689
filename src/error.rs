//! Error types for the mdpress library.
//!
//! Every failure a build can hit is a variant of [`BuildError`]. The variants
//! are grouped by the pipeline stage that raises them, and
//! [`BuildError::stage`] recovers that grouping so callers can react to
//! *where* a build broke without string matching:
//!
//! * **Before any external process** (input, preprocessing): nothing has been
//!   spawned and no workspace exists. Fix the input and rerun.
//! * **Conversion**: the Markdown converter rejected the text. No workspace
//!   exists yet.
//! * **After staging** (compile, harvest): the assembled source was written to
//!   the recovery file before the workspace was torn down, see
//!   [`BuildError::preserves_source`].
//!
//! Nothing is retried. External-tool failures carry the captured stdout and
//! stderr so the caller can diagnose them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// An external program driven by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// Markdown → LaTeX converter (pandoc by default).
    Converter,
    /// TeX engine producing the PDF (pdflatex by default).
    Compiler,
    /// Bibliography processor (bibtex by default).
    Bibliography,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Tool::Converter => "converter",
            Tool::Compiler => "compiler",
            Tool::Bibliography => "bibliography processor",
        })
    }
}

/// Pipeline stage a failure belongs to, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStage {
    Input,
    Preprocess,
    Convert,
    Assemble,
    Stage,
    Compile,
    Harvest,
    Cleanup,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildStage::Input => "input",
            BuildStage::Preprocess => "preprocess",
            BuildStage::Convert => "convert",
            BuildStage::Assemble => "assemble",
            BuildStage::Stage => "stage",
            BuildStage::Compile => "compile",
            BuildStage::Harvest => "harvest",
            BuildStage::Cleanup => "cleanup",
        })
    }
}

/// All errors returned by the mdpress library.
#[derive(Debug, Error)]
pub enum BuildError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists but could not be read as UTF-8 text.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The HTML style sheet named in the configuration does not exist.
    #[error("Style sheet not found: '{path}'")]
    StylesheetNotFound { path: PathBuf },

    // ── Preprocessing errors ──────────────────────────────────────────────
    /// An inclusion directive names a file that does not exist.
    #[error("Included file not found: '{path}' (from \\input{{{name}}})")]
    IncludeNotFound { name: String, path: PathBuf },

    /// A file includes itself, directly or through other files.
    ///
    /// `chain` lists the inclusion path from the outermost included file to
    /// the file that closed the cycle.
    #[error("Cyclic \\input detected: {}", display_chain(.chain))]
    CyclicInclude { chain: Vec<PathBuf> },

    // ── Conversion errors ─────────────────────────────────────────────────
    /// A placeholder token came back from the converter with a corrupt payload.
    ///
    /// The converter must never alter placeholder lines; seeing this means
    /// the pipeline's own invariant was broken. Retrying cannot help.
    #[error("Corrupt literal placeholder after conversion: {line:?}")]
    Decode { line: String },

    /// The converter exited with a non-zero status.
    #[error("Markdown conversion failed:\n{stderr}")]
    Conversion { stderr: String },

    // ── External tool errors ──────────────────────────────────────────────
    /// The compiler or bibliography processor failed.
    ///
    /// `exit_code` is `None` when the process was killed by a signal, or when
    /// the compiler exited zero but reported that no pages were produced.
    #[error("{tool} failed (exit code {}):\n{stderr}", display_code(.exit_code))]
    Compile {
        tool: Tool,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    /// An external tool did not finish within the configured bound and was killed.
    #[error("{tool} timed out after {secs}s and was terminated\nIncrease --timeout.")]
    TimedOut { tool: Tool, secs: u64 },

    /// The external program could not be started, or the OS failed while
    /// collecting its output.
    #[error("Could not run {tool} '{program}': {source}\nIs it installed and on PATH?")]
    ToolUnavailable {
        tool: Tool,
        program: String,
        #[source]
        source: std::io::Error,
    },

    // ── Workspace errors ──────────────────────────────────────────────────
    /// Creating the workspace or copying inputs into it failed.
    #[error("Failed to stage '{path}' into the build workspace: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The compiler reported success but the artifact could not be read.
    #[error("Compiled artifact missing or unreadable at '{path}': {source}")]
    Harvest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BuildError {
    /// The pipeline stage this error was raised in.
    pub fn stage(&self) -> BuildStage {
        match self {
            BuildError::FileNotFound { .. }
            | BuildError::PermissionDenied { .. }
            | BuildError::ReadFailed { .. }
            | BuildError::StylesheetNotFound { .. }
            | BuildError::InvalidConfig(_) => BuildStage::Input,
            BuildError::IncludeNotFound { .. } | BuildError::CyclicInclude { .. } => {
                BuildStage::Preprocess
            }
            BuildError::Decode { .. } | BuildError::Conversion { .. } => BuildStage::Convert,
            BuildError::Compile { .. } => BuildStage::Compile,
            BuildError::TimedOut { tool, .. } | BuildError::ToolUnavailable { tool, .. } => {
                match tool {
                    Tool::Converter => BuildStage::Convert,
                    Tool::Compiler | Tool::Bibliography => BuildStage::Compile,
                }
            }
            BuildError::Staging { .. } => BuildStage::Stage,
            BuildError::Harvest { .. } => BuildStage::Harvest,
            BuildError::OutputWriteFailed { .. } => BuildStage::Cleanup,
            BuildError::Internal(_) => BuildStage::Assemble,
        }
    }

    /// Whether the assembled source is written to the recovery file when this
    /// error aborts a build.
    pub fn preserves_source(&self) -> bool {
        matches!(self.stage(), BuildStage::Compile | BuildStage::Harvest)
    }
}

fn display_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" → ")
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "none".to_string(),
    }
}
