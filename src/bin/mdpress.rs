//! CLI binary for mdpress.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `BuildConfig`, writes the artifact, and maps failures to exit codes.

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mdpress::{
    build, read_file, read_stdin, render_document, write_atomic, BuildConfig, BuildError,
    BuildProgressCallback, BuildStage, OutputMode, PassRecord, ProgressCallback, Tool,
    ToolCommands,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── Exit codes ───────────────────────────────────────────────────────────────

const EXIT_USAGE: u8 = 1;
const EXIT_BAD_OPTION: u8 = 3;
const EXIT_BAD_ARGS: u8 = 4;
const EXIT_NOT_FOUND: u8 = 5;
const EXIT_UNREADABLE: u8 = 6;
const EXIT_BUILD_FAILED: u8 = 7;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner naming the stage or tool pass currently running, with a
/// log line per finished pass. Without a spinner it still records where a
/// failed build left its source.
struct CliProgressCallback {
    bar: Option<ProgressBar>,
    preserved: Mutex<Option<PathBuf>>,
}

impl CliProgressCallback {
    fn new(show_progress: bool) -> Arc<Self> {
        Arc::new(Self {
            bar: show_progress.then(Self::spinner),
            preserved: Mutex::new(None),
        })
    }

    fn spinner() -> ProgressBar {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Building");
        bar.set_message("reading input…");
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    }

    /// The recovery file this build wrote, if any.
    fn preserved(&self) -> Option<PathBuf> {
        self.preserved.lock().ok().and_then(|p| p.clone())
    }
}

impl BuildProgressCallback for CliProgressCallback {
    fn on_build_start(&self, mode: OutputMode) {
        let Some(ref bar) = self.bar else { return };
        bar.set_prefix(match mode {
            OutputMode::Html => "HTML",
            OutputMode::Document => "Document",
            OutputMode::Presentation => "Slides",
        });
    }

    fn on_stage(&self, stage: BuildStage) {
        if let Some(ref bar) = self.bar {
            bar.set_message(format!("{stage}…"));
        }
    }

    fn on_pass_start(&self, tool: Tool, index: usize) {
        if let Some(ref bar) = self.bar {
            bar.set_message(format!("{tool} pass {index}…"));
        }
    }

    fn on_pass_complete(&self, pass: &PassRecord) {
        let Some(ref bar) = self.bar else { return };
        bar.println(format!(
            "  {} {:<24} {}",
            green("✓"),
            format!("{} #{}", pass.tool, pass.index),
            dim(&format!("{:.1}s", pass.duration_ms as f64 / 1000.0)),
        ));
    }

    fn on_source_preserved(&self, path: &Path) {
        if let Ok(mut preserved) = self.preserved.lock() {
            *preserved = Some(path.to_path_buf());
        }
    }

    fn on_build_complete(&self, success: bool) {
        let Some(ref bar) = self.bar else { return };
        bar.finish_and_clear();
        if !success {
            eprintln!("{} build failed", red("✘"));
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Markdown to PDF (stdout)
  mdpress notes.md > notes.pdf

  # Two columns, narrow margins, with a bibliography
  mdpress --multicols -m 0.5in -b refs.bib paper.md -o paper.pdf

  # Beamer slides
  mdpress --beamer talk.md -o talk.pdf

  # Standalone HTML page with a style sheet
  mdpress --html -t "Release notes" -c site.css notes.md -o notes.html

  # Inspect the LaTeX that would be compiled
  mdpress --emit-source notes.md

SOURCE EXTENSIONS:
  --|<markup>        passed to the output verbatim
  -#- text           comment, dropped
  \input{name}       splices name.tex, relative to the including file

EXIT CODES:
  0 success   1 usage   3 bad option   4 bad argument count
  5 file not found   6 unreadable file   7 build failed

  When compilation fails the attempted LaTeX source is written to page.tex
  in the working directory.
"#;

#[derive(Parser, Debug)]
#[command(
    name = "mdpress",
    version,
    about = "Build PDF documents, slides, and HTML pages from Markdown",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown file to build (exactly one unless --stdin).
    inputs: Vec<PathBuf>,

    #[arg(short, long, env = "MDPRESS_STDIN", help = "Read the document from standard input")]
    stdin: bool,

    #[arg(short, long, env = "MDPRESS_OUTPUT", help = "Write the artifact here instead of stdout")]
    output: Option<PathBuf>,

    #[arg(long, env = "MDPRESS_MODE", value_enum, default_value = "document")]
    mode: ModeArg,

    #[arg(long, help = "Shorthand for --mode presentation")]
    beamer: bool,

    #[arg(long, help = "Shorthand for --mode html")]
    html: bool,

    #[arg(short, long, env = "MDPRESS_BIB", help = "BibTeX database")]
    bib: Option<PathBuf>,

    #[arg(long, help = "Stage the bibliography without emitting \\bibliography")]
    no_bib_include: bool,

    #[arg(long, env = "MDPRESS_BIB_STYLE", default_value = "acm")]
    bib_style: String,

    #[arg(short, long, env = "MDPRESS_MARGIN", default_value = "1.0in")]
    margin: String,

    #[arg(long, help = "Typeset the body in two columns")]
    multicols: bool,

    #[arg(
        short,
        long,
        env = "MDPRESS_DOC_CLASS",
        default_value = "documentclass[12pt]{article}"
    )]
    doc_class: String,

    #[arg(long, default_value = "", help = "Raw LaTeX placed before \\end{document}")]
    append: String,

    #[arg(long = "includedir", value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    #[arg(long = "includefile", value_name = "FILE")]
    include_files: Vec<PathBuf>,

    #[arg(short, long, env = "MDPRESS_TITLE", default_value = "A Page")]
    title: String,

    #[arg(short, long, env = "MDPRESS_CSS", help = "Style sheet embedded in HTML output")]
    css: Option<PathBuf>,

    #[arg(short = 'H', long, help = "HTML mode: the input is already HTML")]
    html_input: bool,

    #[arg(long, env = "MDPRESS_PANDOC", default_value = "pandoc")]
    pandoc: String,

    #[arg(long, env = "MDPRESS_LATEX", default_value = "pdflatex")]
    latex: String,

    #[arg(long, env = "MDPRESS_BIBTEX", default_value = "bibtex")]
    bibtex: String,

    #[arg(long, env = "MDPRESS_TIMEOUT", default_value_t = 120,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    #[arg(long, help = "Print the assembled document instead of compiling it")]
    emit_source: bool,

    #[arg(long, env = "MDPRESS_REPORT", help = "Write JSON build statistics to FILE")]
    report: Option<PathBuf>,

    #[arg(short, long, env = "MDPRESS_VERBOSE")]
    verbose: bool,

    #[arg(short, long, env = "MDPRESS_QUIET")]
    quiet: bool,

    #[arg(long, env = "MDPRESS_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Document,
    Presentation,
    Html,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        if self.html {
            OutputMode::Html
        } else if self.beamer {
            OutputMode::Presentation
        } else {
            match self.mode {
                ModeArg::Document => OutputMode::Document,
                ModeArg::Presentation => OutputMode::Presentation,
                ModeArg::Html => OutputMode::Html,
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                ErrorKind::UnknownArgument
                | ErrorKind::InvalidValue
                | ErrorKind::NoEquals
                | ErrorKind::ValueValidation
                | ErrorKind::ArgumentConflict
                | ErrorKind::InvalidUtf8 => EXIT_BAD_OPTION,
                ErrorKind::WrongNumberOfValues
                | ErrorKind::TooManyValues
                | ErrorKind::TooFewValues
                | ErrorKind::MissingRequiredArgument => EXIT_BAD_ARGS,
                _ => EXIT_USAGE,
            };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    if (cli.stdin && !cli.inputs.is_empty()) || (!cli.stdin && cli.inputs.len() != 1) {
        eprintln!(
            "{} exactly one input file is built at a time (or --stdin), got {:?}",
            red("error:"),
            cli.inputs
        );
        return ExitCode::from(EXIT_BAD_ARGS);
    }

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs while the spinner is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.emit_source;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli, show_progress).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err:#}", red("error:"));
            ExitCode::from(exit_code_for(&err))
        }
    }
}

async fn run(cli: &Cli, show_progress: bool) -> Result<()> {
    let source = if cli.stdin {
        read_stdin().await.context("Failed to read standard input")?
    } else {
        read_file(&cli.inputs[0]).await?
    };

    let progress = CliProgressCallback::new(show_progress);
    let config = build_config(cli, progress.clone()).await?;

    // ── Emit source only ─────────────────────────────────────────────────
    if cli.emit_source {
        let document = render_document(&source, &config)
            .await
            .context("Rendering failed")?;
        return emit(cli.output.as_deref(), document.as_str().as_bytes()).await;
    }

    // ── Full build ───────────────────────────────────────────────────────
    let output = match build(&source, &config).await {
        Ok(output) => output,
        Err(e) => {
            report_failure(&e, progress.preserved());
            return Err(e).context("Build failed");
        }
    };

    emit(cli.output.as_deref(), &output.artifact).await?;

    if let Some(ref report) = cli.report {
        let json = serde_json::to_string_pretty(&output.stats)
            .context("Failed to serialise build report")?;
        tokio::fs::write(report, json)
            .await
            .with_context(|| format!("Failed to write report to {}", report.display()))?;
    }

    if !cli.quiet {
        let target = cli
            .output
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".to_string());
        eprintln!(
            "{}  {} bytes  {} compiler / {} bibtex passes  {}ms  →  {}",
            green("✔"),
            output.artifact.len(),
            output.stats.compiler_passes,
            output.stats.bibliography_passes,
            output.stats.total_duration_ms,
            bold(&target),
        );
    }
    Ok(())
}

async fn build_config(cli: &Cli, progress: ProgressCallback) -> Result<BuildConfig> {
    let bibliography = match cli.bib {
        Some(ref path) => Some(read_file(path).await?.text().to_string()),
        None => None,
    };
    for dir in &cli.include_dirs {
        if !dir.is_dir() {
            return Err(BuildError::FileNotFound { path: dir.clone() }.into());
        }
    }
    for file in &cli.include_files {
        if !file.is_file() {
            return Err(BuildError::FileNotFound { path: file.clone() }.into());
        }
    }

    let tools = ToolCommands {
        converter: cli.pandoc.clone(),
        compiler: cli.latex.clone(),
        bibliography: cli.bibtex.clone(),
        ..ToolCommands::default()
    };

    let mut builder = BuildConfig::builder()
        .mode(cli.output_mode())
        .document_class(&cli.doc_class)
        .margin(&cli.margin)
        .columns(if cli.multicols { 2 } else { 1 })
        .append(&cli.append)
        .bibliography_auto_include(!cli.no_bib_include)
        .bibliography_style(&cli.bib_style)
        .title(&cli.title)
        .raw_markup(cli.html_input)
        .tools(tools)
        .tool_timeout_secs(cli.timeout)
        .progress_callback(progress);

    if let Some(bib) = bibliography {
        builder = builder.bibliography(bib);
    }
    if let Some(ref css) = cli.css {
        builder = builder.stylesheet(css);
    }
    for dir in &cli.include_dirs {
        builder = builder.include_dir(dir);
    }
    for file in &cli.include_files {
        builder = builder.include_file(file);
    }

    Ok(builder.build()?)
}

async fn emit(path: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match path {
        Some(path) => Ok(write_atomic(path, bytes).await?),
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(bytes)
                .and_then(|_| handle.flush())
                .context("Failed to write to stdout")
        }
    }
}

/// Print compiler diagnostics and the recovery location.
fn report_failure(err: &BuildError, preserved: Option<PathBuf>) {
    if let BuildError::Compile { ref stdout, .. } = err {
        let lines: Vec<&str> = stdout.lines().collect();
        let tail = &lines[lines.len().saturating_sub(20)..];
        if !tail.is_empty() {
            eprintln!("{}", dim(&tail.join("\n")));
        }
    }
    if let Some(path) = preserved {
        eprintln!("LaTeX source saved to {}", bold(&path.display().to_string()));
    } else if err.preserves_source() {
        eprintln!("{} the LaTeX source could not be saved", red("warning:"));
    }
}

fn exit_code_for(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::FileNotFound { .. })
        | Some(BuildError::StylesheetNotFound { .. }) => EXIT_NOT_FOUND,
        Some(BuildError::PermissionDenied { .. }) | Some(BuildError::ReadFailed { .. }) => {
            EXIT_UNREADABLE
        }
        Some(BuildError::InvalidConfig(_)) => EXIT_BAD_OPTION,
        _ => EXIT_BUILD_FAILED,
    }
}
