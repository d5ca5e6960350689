//! Markdown conversion.
//!
//! Typeset modes hand the preprocessed text to an external converter
//! (pandoc by default) over standard input and read LaTeX back from standard
//! output. HTML mode converts in-process with `pulldown-cmark`. Either way
//! the placeholders planted during preprocessing are restored afterwards by
//! [`crate::pipeline::postprocess`].
//!
//! A failed conversion is never retried: the converter is deterministic, so
//! a non-zero exit means the input itself is malformed.

use crate::config::ToolCommands;
use crate::error::{BuildError, Tool};
use crate::pipeline::postprocess;
use crate::pipeline::tool::{Invocation, ToolOutput, ToolRunner};
use pulldown_cmark::{html, Options, Parser};
use std::time::Duration;
use tracing::{debug, info};

/// Convert preprocessed Markdown to a LaTeX body with the external converter.
///
/// Returns the restored body together with the raw tool output, whose
/// timing feeds the build statistics.
pub async fn to_latex(
    runner: &dyn ToolRunner,
    tools: &ToolCommands,
    text: &str,
    timeout: Duration,
) -> Result<(String, ToolOutput), BuildError> {
    let invocation = Invocation::new(Tool::Converter, &tools.converter, timeout)
        .args(tools.converter_args.iter().cloned())
        .stdin(text);

    let output = runner.run(&invocation).await?;
    if !output.success() {
        return Err(BuildError::Conversion {
            stderr: output.stderr.trim().to_string(),
        });
    }
    info!(
        "Converted {} bytes of Markdown to {} bytes of LaTeX in {}ms",
        text.len(),
        output.stdout.len(),
        output.duration_ms
    );

    let body = postprocess::restore_latex(&output.stdout)?;
    Ok((body, output))
}

/// Convert preprocessed Markdown to an HTML fragment in-process.
pub fn to_html(text: &str) -> Result<String, BuildError> {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;

    let parser = Parser::new_ext(text, options);
    let mut fragment = String::with_capacity(text.len() * 3 / 2);
    html::push_html(&mut fragment, parser);
    debug!("Rendered {} bytes of HTML", fragment.len());

    postprocess::restore_html(&fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Echoes stdin back, like a converter that leaves plain prose alone.
    struct EchoRunner {
        exit_code: i32,
        seen: Mutex<Vec<Invocation>>,
    }

    #[async_trait]
    impl ToolRunner for EchoRunner {
        async fn run(&self, invocation: &Invocation) -> Result<ToolOutput, BuildError> {
            self.seen.lock().unwrap().push(invocation.clone());
            Ok(ToolOutput {
                exit_code: Some(self.exit_code),
                stdout: invocation.stdin.clone().unwrap_or_default(),
                stderr: if self.exit_code == 0 {
                    String::new()
                } else {
                    "pandoc: parse error at line 3\n".into()
                },
                duration_ms: 1,
            })
        }
    }

    fn echo(exit_code: i32) -> EchoRunner {
        EchoRunner {
            exit_code,
            seen: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn invokes_converter_with_format_arguments() {
        let runner = echo(0);
        let tools = ToolCommands::default();
        to_latex(&runner, &tools, "hello", Duration::from_secs(5))
            .await
            .unwrap();

        let seen = runner.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].program, "pandoc");
        assert_eq!(seen[0].args, vec!["-f", "markdown", "-t", "latex"]);
        assert_eq!(seen[0].stdin.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn placeholders_survive_and_are_restored() {
        let runner = echo(0);
        let text = "para\n\n.decodeme.5c73656374696f6e7b587d\n\nend";
        let (body, _) = to_latex(&runner, &ToolCommands::default(), text, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(body, "para\n\n\\section{X}\n\nend");
    }

    #[tokio::test]
    async fn nonzero_exit_is_conversion_error_with_stderr() {
        let runner = echo(64);
        let err = to_latex(&runner, &ToolCommands::default(), "x", Duration::from_secs(5))
            .await
            .unwrap_err();
        match err {
            BuildError::Conversion { stderr } => assert_eq!(stderr, "pandoc: parse error at line 3"),
            other => panic!("expected Conversion, got {other:?}"),
        }
    }

    #[test]
    fn html_conversion_renders_markdown() {
        let out = to_html("# Title\n\nHello *world*").unwrap();
        assert!(out.contains("<h1>Title</h1>"));
        assert!(out.contains("<p>Hello <em>world</em></p>"));
    }

    #[test]
    fn html_conversion_restores_literal_html() {
        let text = "before\n\n.decodeme.3c6872202f3e\n\nafter";
        let out = to_html(text).unwrap();
        assert!(out.contains("\n<hr />\n"), "got: {out}");
        assert!(!out.contains("decodeme"));
    }
}
