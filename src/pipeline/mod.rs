//! Pipeline stages for Markdown-to-document builds.
//!
//! Each submodule implements exactly one transformation step, and data flows
//! strictly downward:
//!
//! ```text
//! input ──▶ preprocess ──▶ convert ──▶ assemble ──▶ compile
//! (text)    (includes,     (pandoc /   (header,     (workspace,
//!            literals)      cmark)      footer)      passes)
//! ```
//!
//! 1. [`input`]     : load the source text and its base directory
//! 2. [`preprocess`]: splice `\input{}` files ([`include`]) and hide literal
//!    lines behind placeholders ([`escape`])
//! 3. [`convert`]   : Markdown → LaTeX through an external converter, or
//!    Markdown → HTML in-process; [`postprocess`] restores the placeholders
//! 4. [`assemble`]  : wrap the body in the mode's header and footer
//! 5. [`compile`]   : stage into a [`workspace`], drive the compiler and
//!    bibliography passes through a [`tool`] runner, harvest the artifact
//!
//! Failures in steps 1–2 happen before any external process is spawned.

pub mod assemble;
pub mod compile;
pub mod convert;
pub mod escape;
pub mod include;
pub mod input;
pub mod postprocess;
pub mod preprocess;
pub mod tool;
pub mod workspace;
