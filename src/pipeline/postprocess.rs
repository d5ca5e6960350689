//! Post-processing: restore literal passages and apply format touch-ups.
//!
//! Runs strictly after the converter. Placeholder tokens created by
//! [`crate::pipeline::escape`] come back untouched by the converter and are
//! decoded here; any placeholder whose payload no longer decodes is reported
//! as [`BuildError::Decode`], since it means the converter altered text it
//! was supposed to ignore.

use crate::error::BuildError;
use crate::pipeline::escape::{self, PLACEHOLDER};
use crate::templates::ENUMERATE_SPACING;
use once_cell::sync::Lazy;
use regex::Regex;

/// Restore the converter's LaTeX output.
///
/// Rules, per line:
/// 1. placeholder lines are replaced by their decoded payload
/// 2. after a line opening `\begin{enumerate}`, tight-spacing commands are
///    inserted so lists do not inherit paragraph spacing
pub fn restore_latex(converted: &str) -> Result<String, BuildError> {
    let mut out: Vec<String> = Vec::with_capacity(converted.len() / 32 + 1);
    for line in converted.split('\n') {
        if let Some(decoded) = escape::decode_line(line)? {
            out.push(decoded);
            continue;
        }
        out.push(line.to_string());
        if line.trim().starts_with(r"\begin{enumerate}") {
            out.extend(ENUMERATE_SPACING.iter().map(|s| s.to_string()));
        }
    }
    Ok(out.join("\n"))
}

// A placeholder paragraph as rendered by an HTML converter.
static RE_HTML_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?m)^[ \t]*(?:<p>)?{}([0-9A-Za-z]*)(?:</p>)?[ \t]*$",
        regex::escape(PLACEHOLDER)
    ))
    .unwrap()
});

/// Restore placeholder paragraphs in converter HTML output.
///
/// The decoded payload replaces the whole paragraph, so raw HTML passages
/// are emitted without a wrapping `<p>`.
pub fn restore_html(converted: &str) -> Result<String, BuildError> {
    let mut failure: Option<String> = None;
    let restored = RE_HTML_PLACEHOLDER.replace_all(converted, |caps: &regex::Captures<'_>| {
        match escape::decode_payload(&caps[1]) {
            Some(decoded) => decoded,
            None => {
                failure.get_or_insert_with(|| caps[0].trim().to_string());
                String::new()
            }
        }
    });
    match failure {
        Some(line) => Err(BuildError::Decode { line }),
        None => Ok(restored.into_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::escape::placeholder;

    #[test]
    fn restores_placeholder_lines() {
        let converted = format!("Intro.\n\n{}\n\nOutro.", placeholder(r"\section{X}"));
        let out = restore_latex(&converted).unwrap();
        assert_eq!(out, "Intro.\n\n\\section{X}\n\nOutro.");
    }

    #[test]
    fn ordinary_lines_are_untouched() {
        let text = "\\textbf{a}\n\n\\emph{b}";
        assert_eq!(restore_latex(text).unwrap(), text);
    }

    #[test]
    fn enumerate_gets_spacing_commands() {
        let out = restore_latex("\\begin{enumerate}\n\\item a\n\\end{enumerate}").unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "\\begin{enumerate}");
        assert_eq!(&lines[1..6], &ENUMERATE_SPACING);
        assert_eq!(lines[6], "\\item a");
    }

    #[test]
    fn enumerate_with_options_is_detected() {
        let out = restore_latex("  \\begin{enumerate}[(a)]").unwrap();
        assert!(out.contains("\\setlength{\\itemsep}{0pt}"));
    }

    #[test]
    fn itemize_is_left_alone() {
        let text = "\\begin{itemize}\n\\item a\n\\end{itemize}";
        assert_eq!(restore_latex(text).unwrap(), text);
    }

    #[test]
    fn corrupt_placeholder_is_a_decode_error() {
        let err = restore_latex("ok\n.decodeme.zz\n").unwrap_err();
        assert!(matches!(err, BuildError::Decode { .. }), "got: {err:?}");
    }

    #[test]
    fn html_placeholder_paragraph_is_replaced() {
        let html = format!("<h1>T</h1>\n<p>{}</p>\n<p>after</p>\n", placeholder("<hr class=\"x\">"));
        let out = restore_html(&html).unwrap();
        assert_eq!(out, "<h1>T</h1>\n<hr class=\"x\">\n<p>after</p>\n");
    }

    #[test]
    fn html_corrupt_placeholder_is_a_decode_error() {
        let err = restore_html("<p>.decodeme.abc</p>\n").unwrap_err();
        assert!(matches!(err, BuildError::Decode { .. }));
    }

    #[test]
    fn html_without_placeholders_is_unchanged() {
        let html = "<p>plain</p>\n";
        assert_eq!(restore_html(html).unwrap(), html);
    }
}
