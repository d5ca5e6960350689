//! Source preprocessing before conversion.
//!
//! Applies, line by line and in this order:
//!
//! 1. drop author comments ([`escape::COMMENT_PREFIX`])
//! 2. splice in `\input{name}` targets, whose lines go through the same rules
//! 3. hide literal-marker lines behind placeholders
//! 4. normalise curly quote pairs
//!
//! The result contains no unresolved directives and nothing the converter
//! could misread. Same text and same files on disk give the same output.

use crate::error::BuildError;
use crate::pipeline::escape;
use crate::pipeline::include::{self, IncludeStack, Step};
use crate::pipeline::input::SourceDocument;
use tracing::debug;

/// Preprocess a document, expanding inclusions relative to its base directory.
pub fn preprocess(doc: &SourceDocument, include_extension: &str) -> Result<String, BuildError> {
    let mut stack = IncludeStack::new(doc, include_extension);
    let mut pieces: Vec<String> = Vec::new();
    let mut literals = 0usize;

    while let Some(step) = stack.next_step() {
        let line = match step {
            // Included content is set off by blank lines on both sides.
            Step::Leave => {
                pieces.push(String::new());
                continue;
            }
            Step::Line(line) => line,
        };

        if escape::is_comment(&line) {
            continue;
        }
        if let Some(name) = include::parse_directive(&line) {
            stack.enter(name)?;
            pieces.push(String::new());
            continue;
        }
        if let Some(encoded) = escape::encode_literal(&line) {
            literals += 1;
            pieces.push(encoded);
            continue;
        }
        pieces.push(escape::normalize_quotes(&line));
    }

    debug!(
        "Preprocessed: {} included files, {} literal lines",
        stack.included(),
        literals
    );
    Ok(pieces.join("\n"))
}
