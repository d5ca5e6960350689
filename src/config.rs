//! Configuration types for document builds.
//!
//! All build behaviour is controlled through [`BuildConfig`], built via its
//! [`BuildConfigBuilder`]. The config is immutable once built and is only ever
//! read by the pipeline, so one value can drive any number of concurrent
//! builds; each build still allocates its own workspace.

use crate::error::BuildError;
use crate::pipeline::tool::ToolRunner;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a single document build.
///
/// Built via [`BuildConfig::builder()`] or using [`BuildConfig::default()`].
///
/// Margin, column count, and document class only affect the typeset modes;
/// they are ignored when [`OutputMode::Html`] is active.
///
/// # Example
/// ```rust
/// use mdpress::{BuildConfig, OutputMode};
///
/// let config = BuildConfig::builder()
///     .mode(OutputMode::Document)
///     .margin("0.75in")
///     .columns(2)
///     .bibliography("@book{knuth84, title={The TeXbook}}")
///     .build()
///     .unwrap();
/// assert!(config.includes_bibliography());
/// ```
#[derive(Clone)]
pub struct BuildConfig {
    /// Which artifact to produce. Default: [`OutputMode::Document`].
    pub mode: OutputMode,

    /// Document class declaration, e.g. `documentclass[12pt]{article}`.
    /// A leading backslash is added when missing.
    pub document_class: String,

    /// Page margin passed to `geometry`. Default: `1.0in`.
    pub margin: String,

    /// Number of text columns, 1 or 2. Default: 1.
    pub columns: u8,

    /// Raw text placed after the bibliography, before `\end{document}`.
    pub append: String,

    /// Bibliography database contents (BibTeX). `None` disables the
    /// bibliography passes entirely.
    pub bibliography: Option<String>,

    /// Emit the `\bibliography` directive block when a bibliography is
    /// present. Default: true. When false the `.bib` file is still staged so
    /// the document can reference it by hand.
    pub bibliography_auto_include: bool,

    /// Style passed to `\bibliographystyle`. Default: `acm`.
    pub bibliography_style: String,

    /// Directories copied (recursively) into the workspace before compiling.
    pub include_dirs: Vec<PathBuf>,

    /// Individual files copied into the workspace before compiling.
    pub include_files: Vec<PathBuf>,

    /// File extension appended to `\input{name}` targets. Default: `tex`.
    pub include_extension: String,

    /// Page title in HTML mode. Default: `A Page`.
    pub title: String,

    /// Style sheet embedded verbatim in HTML mode.
    pub stylesheet: Option<PathBuf>,

    /// HTML mode only: the input is already HTML and is wrapped as-is.
    pub raw_markup: bool,

    /// External programs and their fixed arguments.
    pub tools: ToolCommands,

    /// Pre-constructed tool runner. Default: spawn real processes.
    pub runner: Option<Arc<dyn ToolRunner>>,

    /// Upper bound on each external tool invocation, in seconds. Default: 120.
    ///
    /// A TeX engine waiting on a missing file can block forever; past this
    /// bound the child is killed and the build fails with
    /// [`BuildError::TimedOut`].
    pub tool_timeout_secs: u64,

    /// Maximum compiler passes after the bibliography pass. Default: 3.
    ///
    /// Two passes always run. Further passes run only while the compiler
    /// keeps asking for a rerun to settle cross-references.
    pub max_settle_passes: usize,

    /// Directory receiving the recovery copy of the source when a build fails
    /// after staging. Default: the process working directory at build time.
    pub recovery_dir: Option<PathBuf>,

    /// Parent directory for build workspaces. Default: the system temp dir.
    pub workspace_root: Option<PathBuf>,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            mode: OutputMode::default(),
            document_class: "documentclass[12pt]{article}".to_string(),
            margin: "1.0in".to_string(),
            columns: 1,
            append: String::new(),
            bibliography: None,
            bibliography_auto_include: true,
            bibliography_style: "acm".to_string(),
            include_dirs: Vec::new(),
            include_files: Vec::new(),
            include_extension: "tex".to_string(),
            title: "A Page".to_string(),
            stylesheet: None,
            raw_markup: false,
            tools: ToolCommands::default(),
            runner: None,
            tool_timeout_secs: 120,
            max_settle_passes: 3,
            recovery_dir: None,
            workspace_root: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for BuildConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildConfig")
            .field("mode", &self.mode)
            .field("document_class", &self.document_class)
            .field("margin", &self.margin)
            .field("columns", &self.columns)
            .field("append", &self.append)
            .field("bibliography", &self.bibliography.as_ref().map(|b| b.len()))
            .field("bibliography_auto_include", &self.bibliography_auto_include)
            .field("bibliography_style", &self.bibliography_style)
            .field("include_dirs", &self.include_dirs)
            .field("include_files", &self.include_files)
            .field("title", &self.title)
            .field("stylesheet", &self.stylesheet)
            .field("raw_markup", &self.raw_markup)
            .field("tools", &self.tools)
            .field("runner", &self.runner.as_ref().map(|_| "<dyn ToolRunner>"))
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("max_settle_passes", &self.max_settle_passes)
            .field("recovery_dir", &self.recovery_dir)
            .field("workspace_root", &self.workspace_root)
            .finish()
    }
}

impl BuildConfig {
    /// Create a new builder for `BuildConfig`.
    pub fn builder() -> BuildConfigBuilder {
        BuildConfigBuilder {
            config: Self::default(),
        }
    }

    /// Whether the assembled document gets a `\bibliography` block.
    pub fn includes_bibliography(&self) -> bool {
        self.mode.is_typeset() && self.bibliography.is_some() && self.bibliography_auto_include
    }

    /// Whether the two-column environment wraps the body.
    pub fn two_columns(&self) -> bool {
        self.columns == 2
    }
}

/// Builder for [`BuildConfig`].
#[derive(Debug)]
pub struct BuildConfigBuilder {
    config: BuildConfig,
}

impl BuildConfigBuilder {
    pub fn mode(mut self, mode: OutputMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn document_class(mut self, class: impl Into<String>) -> Self {
        self.config.document_class = class.into();
        self
    }

    pub fn margin(mut self, margin: impl Into<String>) -> Self {
        self.config.margin = margin.into();
        self
    }

    pub fn columns(mut self, n: u8) -> Self {
        self.config.columns = n;
        self
    }

    pub fn append(mut self, text: impl Into<String>) -> Self {
        self.config.append = text.into();
        self
    }

    pub fn bibliography(mut self, bib: impl Into<String>) -> Self {
        self.config.bibliography = Some(bib.into());
        self
    }

    pub fn bibliography_auto_include(mut self, v: bool) -> Self {
        self.config.bibliography_auto_include = v;
        self
    }

    pub fn bibliography_style(mut self, style: impl Into<String>) -> Self {
        self.config.bibliography_style = style.into();
        self
    }

    pub fn include_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.include_dirs.push(dir.into());
        self
    }

    pub fn include_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.config.include_files.push(file.into());
        self
    }

    pub fn include_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.include_extension = ext.into();
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.title = title.into();
        self
    }

    pub fn stylesheet(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.stylesheet = Some(path.into());
        self
    }

    pub fn raw_markup(mut self, v: bool) -> Self {
        self.config.raw_markup = v;
        self
    }

    pub fn tools(mut self, tools: ToolCommands) -> Self {
        self.config.tools = tools;
        self
    }

    pub fn runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.config.runner = Some(runner);
        self
    }

    pub fn tool_timeout_secs(mut self, secs: u64) -> Self {
        self.config.tool_timeout_secs = secs;
        self
    }

    pub fn max_settle_passes(mut self, n: usize) -> Self {
        self.config.max_settle_passes = n;
        self
    }

    pub fn recovery_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.recovery_dir = Some(dir.into());
        self
    }

    pub fn workspace_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<BuildConfig, BuildError> {
        let c = &self.config;
        if c.columns != 1 && c.columns != 2 {
            return Err(BuildError::InvalidConfig(format!(
                "Column count must be 1 or 2, got {}",
                c.columns
            )));
        }
        if c.tool_timeout_secs == 0 {
            return Err(BuildError::InvalidConfig(
                "Tool timeout must be ≥ 1 second".into(),
            ));
        }
        if !(2..=5).contains(&c.max_settle_passes) {
            return Err(BuildError::InvalidConfig(format!(
                "Settle passes must be 2–5, got {}",
                c.max_settle_passes
            )));
        }
        if c.mode.is_typeset() && c.margin.trim().is_empty() {
            return Err(BuildError::InvalidConfig("Margin must not be empty".into()));
        }
        if c.include_extension.is_empty() || c.include_extension.contains(['/', '\\']) {
            return Err(BuildError::InvalidConfig(format!(
                "Invalid include extension {:?}",
                c.include_extension
            )));
        }
        c.tools.validate()?;
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// The kind of artifact a build produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// A standalone HTML page. No external compiler is involved.
    Html,
    /// A typeset PDF document. (default)
    #[default]
    Document,
    /// A typeset PDF slide deck (beamer).
    Presentation,
}

impl OutputMode {
    /// Whether this mode goes through the LaTeX compiler.
    pub fn is_typeset(self) -> bool {
        !matches!(self, OutputMode::Html)
    }
}

/// External programs invoked by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommands {
    /// Markdown → LaTeX converter program. Default: `pandoc`.
    pub converter: String,
    /// Arguments selecting source and target formats.
    pub converter_args: Vec<String>,
    /// TeX engine. Default: `pdflatex`.
    pub compiler: String,
    /// Arguments placed before the document filename.
    pub compiler_args: Vec<String>,
    /// Bibliography processor. Default: `bibtex`.
    pub bibliography: String,
}

impl Default for ToolCommands {
    fn default() -> Self {
        Self {
            converter: "pandoc".to_string(),
            converter_args: ["-f", "markdown", "-t", "latex"]
                .map(String::from)
                .to_vec(),
            compiler: "pdflatex".to_string(),
            compiler_args: ["-interaction=nonstopmode", "-halt-on-error"]
                .map(String::from)
                .to_vec(),
            bibliography: "bibtex".to_string(),
        }
    }
}

impl ToolCommands {
    fn validate(&self) -> Result<(), BuildError> {
        for (role, program) in [
            ("converter", &self.converter),
            ("compiler", &self.compiler),
            ("bibliography processor", &self.bibliography),
        ] {
            if program.trim().is_empty() {
                return Err(BuildError::InvalidConfig(format!(
                    "The {role} program must not be empty"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = BuildConfig::default();
        assert_eq!(c.mode, OutputMode::Document);
        assert_eq!(c.margin, "1.0in");
        assert_eq!(c.columns, 1);
        assert_eq!(c.document_class, "documentclass[12pt]{article}");
        assert_eq!(c.bibliography_style, "acm");
        assert_eq!(c.title, "A Page");
        assert_eq!(c.tools.converter, "pandoc");
        assert_eq!(c.tools.compiler, "pdflatex");
        assert_eq!(c.tools.bibliography, "bibtex");
    }

    #[test]
    fn rejects_three_columns() {
        let err = BuildConfig::builder().columns(3).build().unwrap_err();
        assert!(err.to_string().contains("Column count"), "got: {err}");
    }

    #[test]
    fn rejects_zero_timeout() {
        assert!(BuildConfig::builder().tool_timeout_secs(0).build().is_err());
    }

    #[test]
    fn rejects_out_of_range_settle_passes() {
        assert!(BuildConfig::builder().max_settle_passes(1).build().is_err());
        assert!(BuildConfig::builder().max_settle_passes(6).build().is_err());
        assert!(BuildConfig::builder().max_settle_passes(2).build().is_ok());
    }

    #[test]
    fn rejects_empty_tool_program() {
        let tools = ToolCommands {
            compiler: "  ".into(),
            ..ToolCommands::default()
        };
        let err = BuildConfig::builder().tools(tools).build().unwrap_err();
        assert!(err.to_string().contains("compiler"));
    }

    #[test]
    fn empty_margin_is_fine_in_html_mode() {
        let c = BuildConfig::builder()
            .mode(OutputMode::Html)
            .margin("")
            .build();
        assert!(c.is_ok());
    }

    #[test]
    fn bibliography_inclusion_rules() {
        let with_bib = BuildConfig::builder().bibliography("@misc{x}").build().unwrap();
        assert!(with_bib.includes_bibliography());

        let suppressed = BuildConfig::builder()
            .bibliography("@misc{x}")
            .bibliography_auto_include(false)
            .build()
            .unwrap();
        assert!(!suppressed.includes_bibliography());

        let html = BuildConfig::builder()
            .mode(OutputMode::Html)
            .bibliography("@misc{x}")
            .build()
            .unwrap();
        assert!(!html.includes_bibliography());

        assert!(!BuildConfig::default().includes_bibliography());
    }

    #[test]
    fn debug_hides_runner_and_bibliography_text() {
        let c = BuildConfig::builder()
            .bibliography("@article{secret}")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("secret"));
        assert!(dbg.contains("BuildConfig"));
    }
}
