//! Document assembly: header + body + optional bibliography block + footer.
//!
//! Pure string composition. The only outside input, the HTML style sheet, is
//! passed in already read, so identical configuration and body always yield
//! byte-identical documents.

use crate::config::{BuildConfig, OutputMode};
use crate::output::AssembledDocument;
use crate::templates;

/// Compose the final document for the configured mode.
///
/// `stylesheet` is only used in HTML mode.
pub fn assemble(config: &BuildConfig, body: &str, stylesheet: &str) -> AssembledDocument {
    let text = match config.mode {
        OutputMode::Html => {
            templates::html_head(&escape_html(&config.title), stylesheet.trim()) + &templates::html_body(body)
        }
        OutputMode::Document | OutputMode::Presentation => {
            let mut text = latex_header(config);
            text.push_str(body);
            if config.includes_bibliography() {
                text.push_str(&templates::bibliography_block(&config.bibliography_style));
            }
            text.push_str(&latex_footer(config));
            text
        }
    };
    AssembledDocument::new(text)
}

/// Preamble: class line, mode-specific settings, shared packages, and the
/// opening of the document body.
pub fn latex_header(config: &BuildConfig) -> String {
    let class_block = match config.mode {
        OutputMode::Presentation => format!(
            "\\documentclass{{beamer}} % {}\n{}",
            config.margin,
            templates::BEAMER_SETTINGS
        ),
        _ => format!(
            "{}\n\\usepackage[margin={}]{{geometry}}\n",
            class_line(&config.document_class),
            config.margin
        ),
    };
    let columns = if config.two_columns() {
        templates::MULTICOLS_BEGIN
    } else {
        ""
    };
    format!("{class_block}{}{columns}\n", templates::LATEX_PACKAGES)
}

/// Closing markup: column environment, append text, end of document.
pub fn latex_footer(config: &BuildConfig) -> String {
    let columns = if config.two_columns() {
        templates::MULTICOLS_END
    } else {
        ""
    };
    format!(
        "\n{columns}\n{}\n{}\n",
        config.append,
        templates::DOCUMENT_END
    )
}

fn class_line(declaration: &str) -> String {
    let declaration = declaration.trim();
    if declaration.starts_with('\\') {
        declaration.to_string()
    } else {
        format!("\\{declaration}")
    }
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typeset() -> BuildConfig {
        BuildConfig::default()
    }

    #[test]
    fn document_header_selects_class_and_margin() {
        let config = BuildConfig::builder().margin("0.5in").build().unwrap();
        let header = latex_header(&config);
        assert!(header.starts_with("\\documentclass[12pt]{article}\n\\usepackage[margin=0.5in]{geometry}\n"));
        assert!(header.contains("\\usepackage{amsmath}"));
        assert!(header.ends_with("\\begin{document}\n\n"));
        assert!(!header.contains("multicols}{2}"));
    }

    #[test]
    fn class_with_backslash_is_kept() {
        let config = BuildConfig::builder()
            .document_class("\\documentclass{report}")
            .build()
            .unwrap();
        assert!(latex_header(&config).starts_with("\\documentclass{report}\n"));
    }

    #[test]
    fn presentation_header_uses_beamer() {
        let config = BuildConfig::builder()
            .mode(OutputMode::Presentation)
            .document_class("documentclass{ignored}")
            .build()
            .unwrap();
        let header = latex_header(&config);
        assert!(header.starts_with("\\documentclass{beamer} % 1.0in\n\\usefonttheme{serif}"));
        assert!(header.contains("\\justifying\n\\usepackage{enumerate}"));
        assert!(!header.contains("geometry"));
        assert!(!header.contains("ignored"));
    }

    #[test]
    fn two_columns_wrap_the_body() {
        let config = BuildConfig::builder().columns(2).append("APPENDED").build().unwrap();
        let doc = assemble(&config, "BODY", "");
        let text = doc.as_str();
        let begin = text.find("\\begin{multicols}{2}").expect("begin");
        let body = text.find("BODY").unwrap();
        let end = text.find("\\end{multicols}").expect("end");
        let append = text.find("APPENDED").unwrap();
        let close = text.find("\\end{document}").unwrap();
        assert!(begin < body && body < end && end < append && append < close);
    }

    #[test]
    fn footer_shape() {
        assert_eq!(latex_footer(&typeset()), "\n\n\n\\end{document}\n");
    }

    #[test]
    fn bibliography_block_sits_between_body_and_footer() {
        let config = BuildConfig::builder()
            .bibliography("@book{k}")
            .append("TAIL")
            .build()
            .unwrap();
        let text = assemble(&config, "BODY", "").into_string();
        let body = text.find("BODY").unwrap();
        let bib = text.find("\\bibliography{bibliography}").unwrap();
        let tail = text.find("TAIL").unwrap();
        assert!(body < bib && bib < tail);
        assert!(text.contains("\\bibliographystyle{acm}"));
    }

    #[test]
    fn suppressed_bibliography_has_no_block() {
        let config = BuildConfig::builder()
            .bibliography("@book{k}")
            .bibliography_auto_include(false)
            .build()
            .unwrap();
        let text = assemble(&config, "BODY", "").into_string();
        assert!(!text.contains("\\bibliography"));
    }

    #[test]
    fn html_page_embeds_title_style_and_body() {
        let config = BuildConfig::builder()
            .mode(OutputMode::Html)
            .title("Q&A <draft>")
            .build()
            .unwrap();
        let text = assemble(&config, "<p>hi</p>", "  p { color: red }\n").into_string();
        assert!(text.starts_with("\n<!doctype html>\n<head>\n"));
        assert!(text.contains("<title>Q&amp;A &lt;draft&gt;</title>"));
        assert!(text.contains("<style>\np { color: red }\n</style>"));
        assert!(text.ends_with("\n<body>\n<p>hi</p>\n</body>\n</html>\n"));
        assert!(!text.contains("documentclass"));
    }

    #[test]
    fn assembly_is_deterministic() {
        let config = BuildConfig::builder()
            .columns(2)
            .bibliography("@x{y}")
            .build()
            .unwrap();
        let a = assemble(&config, "same body", "");
        let b = assemble(&config, "same body", "");
        assert_eq!(a, b);
    }
}
