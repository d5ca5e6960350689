//! Fixed text fragments used to assemble documents.
//!
//! Every preamble, package list and page skeleton lives here so that changing
//! the house style means editing one file. The assembler in
//! [`crate::pipeline::assemble`] only decides which fragments to use and fills
//! in the configured values.

/// Packages and macros loaded by every typeset document, after the class line.
pub const LATEX_PACKAGES: &str = r"
\usepackage{enumerate}
\usepackage{amssymb}
\usepackage{amsmath}
\usepackage{amsthm}
\usepackage{cancel}
\usepackage{tabularx}
\usepackage{url}
\usepackage{multicol}
\usepackage{graphicx}
\usepackage{subfigure}
\usepackage[multiple]{footmisc}
\usepackage{esint}
\usepackage{flushend}
\makeatletter
\def\imod#1{\allowbreak\mkern10mu({\operator@font mod}\,\,#1)}
\makeatother

\begin{document}
";

/// Settings that follow `\documentclass{beamer}` in presentation mode.
pub const BEAMER_SETTINGS: &str = r"\usefonttheme{serif}
\setbeamertemplate{navigation symbols}{}
\setbeamertemplate{bibliography item}[text]
\usecolortheme[RGB={0,0,0}]{structure}
\usepackage{ragged2e}
\justifying";

pub const MULTICOLS_BEGIN: &str = r"\begin{multicols}{2}";
pub const MULTICOLS_END: &str = r"\end{multicols}";
pub const DOCUMENT_END: &str = r"\end{document}";

/// Spacing commands inserted right after `\begin{enumerate}` to tighten lists.
pub const ENUMERATE_SPACING: [&str; 5] = [
    r"\setlength{\parskip}{0pt}",
    r"\setlength{\topsep}{0pt}",
    r"\setlength{\partopsep}{-5pt}",
    r"\setlength{\itemsep}{0pt}",
    r"\setlength{\parsep}{0pt}",
];

/// Base name the bibliography database is staged under.
pub const BIBLIOGRAPHY_NAME: &str = "bibliography";

/// Build the `\bibliographystyle` / `\bibliography` block.
pub fn bibliography_block(style: &str) -> String {
    format!("\n\\bibliographystyle{{{style}}}\n\\bibliography{{{BIBLIOGRAPHY_NAME}}}\n")
}

/// Build the HTML page head.
///
/// `title` must already be escaped; `style` is embedded verbatim.
pub fn html_head(title: &str, style: &str) -> String {
    format!(
        "\n<!doctype html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>\n{style}\n</style>\n</head>\n"
    )
}

/// Wrap an HTML fragment in the page body.
pub fn html_body(body: &str) -> String {
    format!("\n<body>\n{body}\n</body>\n</html>\n")
}
