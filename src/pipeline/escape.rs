//! Literal passages, author comments and quote normalisation.
//!
//! A line starting with [`LITERAL_PREFIX`] carries raw LaTeX that must reach
//! the compiler untouched. The converter would otherwise escape its
//! backslashes and braces, so the payload is hex-encoded behind the opaque
//! [`PLACEHOLDER`] token before conversion and decoded again afterwards.
//! Hex digits and a dotted token are plain prose to any Markdown converter,
//! which is what lets them survive the round trip.
//!
//! ```text
//! --|\section{X}   ──encode──▶   .decodeme.5c73656374696f6e7b587d   ──decode──▶   \section{X}
//! ```
//!
//! Indentation before the marker is ignored. Everything after it, trailing
//! whitespace included, is the payload and comes back byte for byte.

use crate::error::BuildError;

/// Prefix marking a line whose payload bypasses conversion.
pub const LITERAL_PREFIX: &str = "--|";

/// Prefix marking an author comment; such lines are dropped.
pub const COMMENT_PREFIX: &str = "-#-";

/// Opaque token that introduces an encoded payload.
pub const PLACEHOLDER: &str = ".decodeme.";

/// Whether a raw line is an author comment.
pub fn is_comment(line: &str) -> bool {
    line.starts_with(COMMENT_PREFIX)
}

/// Encode a literal-marker line into a placeholder paragraph.
///
/// Returns `None` for lines without the marker. The placeholder is wrapped in
/// newlines so that, once lines are joined, it stands alone as a paragraph.
pub fn encode_literal(line: &str) -> Option<String> {
    let payload = line.trim_start().strip_prefix(LITERAL_PREFIX)?;
    Some(format!("\n{}\n", placeholder(payload)))
}

/// The bare placeholder token for a payload.
pub fn placeholder(payload: &str) -> String {
    format!("{PLACEHOLDER}{}", hex::encode(payload.as_bytes()))
}

/// Restore a line produced by the converter.
///
/// Lines whose trimmed content starts with [`PLACEHOLDER`] are replaced by
/// the decoded payload; all other lines are returned unchanged.
pub fn decode_line(line: &str) -> Result<Option<String>, BuildError> {
    let Some(encoded) = line.trim().strip_prefix(PLACEHOLDER) else {
        return Ok(None);
    };
    decode_payload(encoded)
        .map(Some)
        .ok_or_else(|| BuildError::Decode {
            line: line.to_string(),
        })
}

/// Decode a hex payload back to text, `None` if it is malformed.
pub fn decode_payload(encoded: &str) -> Option<String> {
    let bytes = hex::decode(encoded).ok()?;
    String::from_utf8(bytes).ok()
}

/// Replace TeX-style curly quote pairs with a plain double quote.
pub fn normalize_quotes(line: &str) -> String {
    line.replace("``", "\"").replace("''", "\"")
}
