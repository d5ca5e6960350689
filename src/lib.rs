//! # mdpress
//!
//! Build typeset PDF documents, beamer slide decks, and standalone HTML pages
//! from Markdown.
//!
//! ## Why this crate?
//!
//! Pandoc turns Markdown into LaTeX well, but a finished PDF needs more than
//! the converted body: a preamble, a bibliography run, enough compiler passes
//! for cross-references to settle, and somewhere to put the dozen side files
//! the TeX engine leaves behind. This crate drives that whole cycle in a
//! throwaway workspace and hands back the artifact bytes.
//!
//! Two line-level extensions ride on top of Markdown:
//!
//! * `--|` followed by raw markup passes through the converter untouched
//! * `-#-` starts a comment line that never reaches the output
//!
//! and a line holding only `\input{name}` splices in `name.tex`, resolved
//! relative to the including file.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown
//!  │
//!  ├─ 1. Input       file or stdin, plus its directory
//!  ├─ 2. Preprocess  \input{} splicing, literal placeholders, comments
//!  ├─ 3. Convert     pandoc → LaTeX (or pulldown-cmark → HTML)
//!  ├─ 4. Assemble    header + body + bibliography block + footer
//!  └─ 5. Compile     workspace, pdflatex ⇄ bibtex passes, harvest, cleanup
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mdpress::{build_file, BuildConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = BuildConfig::builder().margin("0.75in").columns(2).build()?;
//!     let output = build_file("notes.md", &config).await?;
//!     std::fs::write("notes.pdf", &output.artifact)?;
//!     eprintln!("{} compiler passes", output.stats.compiler_passes);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mdpress` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! mdpress = { version = "0.1", default-features = false }
//! ```
//!
//! ## External tools
//!
//! Typeset modes need `pandoc`, `pdflatex`, and (with a bibliography)
//! `bibtex` on `PATH`, or whatever programs [`ToolCommands`] names. HTML mode
//! needs none of them.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod build;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod templates;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use build::{build, build_file, build_sync, build_to_file, render_document, write_atomic};
pub use config::{BuildConfig, BuildConfigBuilder, OutputMode, ToolCommands};
pub use error::{BuildError, BuildStage, Tool};
pub use output::{AssembledDocument, BuildOutput, BuildStats, PassRecord};
pub use pipeline::compile::{recovery_path, BuildState};
pub use pipeline::input::{read_file, read_stdin, SourceDocument};
pub use pipeline::tool::{Invocation, ProcessRunner, ToolOutput, ToolRunner};
pub use progress::{BuildProgressCallback, NoopProgressCallback, ProgressCallback};
