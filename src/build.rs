//! Top-level build entry points.
//!
//! [`build`] runs the whole pipeline and returns the artifact in memory.
//! [`render_document`] stops after assembly and returns the document source
//! without touching a compiler. [`build_to_file`] and [`build_sync`] are thin
//! wrappers for the common calling conventions.

use crate::config::{BuildConfig, OutputMode};
use crate::error::{BuildError, BuildStage, Tool};
use crate::output::{AssembledDocument, BuildOutput, BuildStats, PassRecord};
use crate::pipeline::compile::Orchestrator;
use crate::pipeline::input::{self, SourceDocument};
use crate::pipeline::tool::{ProcessRunner, ToolRunner};
use crate::pipeline::{assemble, convert, preprocess};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Build a document from already-loaded source.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Preprocessing and conversion failures return before any workspace is
/// created. Compile and harvest failures return after the assembled source
/// was written to the recovery file (see [`BuildError::preserves_source`]).
/// The workspace never outlives the call.
pub async fn build(source: &SourceDocument, config: &BuildConfig) -> Result<BuildOutput, BuildError> {
    let start = Instant::now();
    if let Some(ref cb) = config.progress_callback {
        cb.on_build_start(config.mode);
    }

    let result = run(source, config, start).await;

    if let Some(ref cb) = config.progress_callback {
        cb.on_build_complete(result.is_ok());
    }
    result
}

/// Read `path` and build it.
pub async fn build_file(
    path: impl AsRef<Path>,
    config: &BuildConfig,
) -> Result<BuildOutput, BuildError> {
    let source = input::read_file(path.as_ref()).await?;
    build(&source, config).await
}

/// Run the pipeline up to assembly and return the document source.
///
/// The converter still runs for typeset modes; the compiler does not.
pub async fn render_document(
    source: &SourceDocument,
    config: &BuildConfig,
) -> Result<AssembledDocument, BuildError> {
    let mut stats = BuildStats::new(config.mode);
    prepare(source, config, runner(config).as_ref(), &mut stats).await
}

/// Build and write the artifact to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn build_to_file(
    source: &SourceDocument,
    output_path: impl AsRef<Path>,
    config: &BuildConfig,
) -> Result<BuildStats, BuildError> {
    let output = build(source, config).await?;
    let path = output_path.as_ref();
    write_atomic(path, &output.artifact).await?;
    info!("Wrote {} bytes to {}", output.artifact.len(), path.display());
    Ok(output.stats)
}

/// Synchronous wrapper around [`build`].
///
/// Creates a temporary tokio runtime internally.
pub fn build_sync(source: &SourceDocument, config: &BuildConfig) -> Result<BuildOutput, BuildError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| BuildError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(build(source, config))
}

/// Write `bytes` to `path` through a sibling temp file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), BuildError> {
    let write_err = |e: std::io::Error| BuildError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run(
    source: &SourceDocument,
    config: &BuildConfig,
    start: Instant,
) -> Result<BuildOutput, BuildError> {
    info!("Starting {:?} build", config.mode);
    let runner = runner(config);
    let mut stats = BuildStats::new(config.mode);

    let document = prepare(source, config, runner.as_ref(), &mut stats).await?;

    let artifact = match config.mode {
        OutputMode::Html => document.as_str().as_bytes().to_vec(),
        OutputMode::Document | OutputMode::Presentation => {
            let mut orchestrator = Orchestrator::new(config, runner.as_ref());
            orchestrator.run(&document, &mut stats).await?
        }
    };

    stats.total_duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Build complete: {} bytes, {} compiler / {} bibliography passes, {}ms total",
        artifact.len(),
        stats.compiler_passes,
        stats.bibliography_passes,
        stats.total_duration_ms
    );

    Ok(BuildOutput {
        artifact,
        document,
        stats,
    })
}

/// Preprocess, convert and assemble.
async fn prepare(
    source: &SourceDocument,
    config: &BuildConfig,
    runner: &dyn ToolRunner,
    stats: &mut BuildStats,
) -> Result<AssembledDocument, BuildError> {
    let stylesheet = match config.mode {
        OutputMode::Html => read_stylesheet(config).await?,
        _ => String::new(),
    };

    let body = if config.mode == OutputMode::Html && config.raw_markup {
        debug!("Raw markup input, skipping preprocessing and conversion");
        source.text().to_string()
    } else {
        // ── Preprocess ───────────────────────────────────────────────────
        notify_stage(config, BuildStage::Preprocess);
        let text = preprocess::preprocess(source, &config.include_extension)?;

        // ── Convert ──────────────────────────────────────────────────────
        notify_stage(config, BuildStage::Convert);
        match config.mode {
            OutputMode::Html => convert::to_html(&text)?,
            OutputMode::Document | OutputMode::Presentation => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_pass_start(Tool::Converter, 1);
                }
                let timeout = Duration::from_secs(config.tool_timeout_secs);
                let (body, output) = convert::to_latex(runner, &config.tools, &text, timeout).await?;
                let record = PassRecord {
                    tool: Tool::Converter,
                    index: 1,
                    exit_code: output.exit_code,
                    duration_ms: output.duration_ms,
                };
                if let Some(ref cb) = config.progress_callback {
                    cb.on_pass_complete(&record);
                }
                stats.record(record);
                body
            }
        }
    };

    // ── Assemble ─────────────────────────────────────────────────────────
    notify_stage(config, BuildStage::Assemble);
    let document = assemble::assemble(config, &body, &stylesheet);
    debug!("Assembled {} bytes of document source", document.as_str().len());
    Ok(document)
}

async fn read_stylesheet(config: &BuildConfig) -> Result<String, BuildError> {
    let Some(ref path) = config.stylesheet else {
        return Ok(String::new());
    };
    tokio::fs::read_to_string(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => BuildError::StylesheetNotFound { path: path.clone() },
        _ => BuildError::ReadFailed {
            path: path.clone(),
            source: e,
        },
    })
}

fn runner(config: &BuildConfig) -> Arc<dyn ToolRunner> {
    config
        .runner
        .clone()
        .unwrap_or_else(|| Arc::new(ProcessRunner))
}

fn notify_stage(config: &BuildConfig, stage: BuildStage) {
    if let Some(ref cb) = config.progress_callback {
        cb.on_stage(stage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tool::{Invocation, ToolOutput};
    use crate::progress::BuildProgressCallback;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// A converter that echoes its input and a compiler that always succeeds.
    #[derive(Default)]
    struct FakeTools {
        calls: Mutex<Vec<Tool>>,
    }

    #[async_trait]
    impl ToolRunner for FakeTools {
        async fn run(&self, inv: &Invocation) -> Result<ToolOutput, BuildError> {
            self.calls.lock().unwrap().push(inv.tool);
            if let (Tool::Compiler, Some(cwd)) = (inv.tool, inv.cwd.as_ref()) {
                std::fs::write(cwd.join("page.pdf"), b"%PDF").unwrap();
            }
            Ok(ToolOutput {
                exit_code: Some(0),
                stdout: inv.stdin.clone().unwrap_or_default(),
                ..ToolOutput::default()
            })
        }
    }

    #[derive(Default)]
    struct Stages(Mutex<Vec<String>>);

    impl BuildProgressCallback for Stages {
        fn on_stage(&self, stage: BuildStage) {
            self.0.lock().unwrap().push(stage.to_string());
        }
        fn on_build_complete(&self, success: bool) {
            self.0.lock().unwrap().push(format!("done {success}"));
        }
    }

    fn source(text: &str) -> SourceDocument {
        SourceDocument::new(text, std::env::temp_dir())
    }

    #[tokio::test]
    async fn html_build_needs_no_external_tools() {
        let tools = Arc::new(FakeTools::default());
        let config = BuildConfig::builder()
            .mode(OutputMode::Html)
            .title("Notes")
            .runner(tools.clone())
            .build()
            .unwrap();
        let out = build(&source("# Hi\n\n--|<hr>"), &config).await.unwrap();
        let html = String::from_utf8(out.artifact).unwrap();
        assert!(html.contains("<title>Notes</title>"));
        assert!(html.contains("<h1>Hi</h1>"));
        assert!(html.contains("\n<hr>\n"));
        assert!(tools.calls.lock().unwrap().is_empty());
        assert!(out.stats.passes.is_empty());
    }

    #[tokio::test]
    async fn raw_markup_is_wrapped_verbatim() {
        let config = BuildConfig::builder()
            .mode(OutputMode::Html)
            .raw_markup(true)
            .build()
            .unwrap();
        let out = build(&source("<div>-#- kept</div>"), &config).await.unwrap();
        assert!(out.document.as_str().contains("<body>\n<div>-#- kept</div>\n</body>"));
    }

    #[tokio::test]
    async fn missing_stylesheet_is_reported() {
        let config = BuildConfig::builder()
            .mode(OutputMode::Html)
            .stylesheet("/no/such/style.css")
            .build()
            .unwrap();
        let err = build(&source("x"), &config).await.unwrap_err();
        assert!(matches!(err, BuildError::StylesheetNotFound { .. }));
    }

    #[tokio::test]
    async fn stylesheet_is_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let css = dir.path().join("site.css");
        std::fs::write(&css, "body { margin: 0 }\n").unwrap();
        let config = BuildConfig::builder()
            .mode(OutputMode::Html)
            .stylesheet(&css)
            .build()
            .unwrap();
        let out = build(&source("x"), &config).await.unwrap();
        assert!(out.document.as_str().contains("<style>\nbody { margin: 0 }\n</style>"));
    }

    #[tokio::test]
    async fn typeset_build_records_converter_and_compiler() {
        let ws_root = tempfile::tempdir().unwrap();
        let tools = Arc::new(FakeTools::default());
        let stages = Arc::new(Stages::default());
        let config = BuildConfig::builder()
            .runner(tools.clone())
            .workspace_root(ws_root.path())
            .progress_callback(stages.clone())
            .build()
            .unwrap();

        let out = build(&source("Hello"), &config).await.unwrap();
        assert_eq!(out.artifact, b"%PDF");
        assert_eq!(out.stats.tool_sequence(), vec![Tool::Converter, Tool::Compiler]);
        assert_eq!(
            *stages.0.lock().unwrap(),
            vec!["preprocess", "convert", "assemble", "stage", "compile", "harvest", "cleanup", "done true"]
        );
    }

    #[tokio::test]
    async fn render_document_does_not_compile() {
        let tools = Arc::new(FakeTools::default());
        let config = BuildConfig::builder().runner(tools.clone()).build().unwrap();
        let doc = render_document(&source("Hello"), &config).await.unwrap();
        assert!(doc.as_str().contains("Hello"));
        assert!(doc.as_str().ends_with("\\end{document}\n"));
        assert_eq!(*tools.calls.lock().unwrap(), vec![Tool::Converter]);
    }

    #[tokio::test]
    async fn build_to_file_writes_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let out_path = dir.path().join("nested/out.html");
        let config = BuildConfig::builder().mode(OutputMode::Html).build().unwrap();

        build_to_file(&source("body"), &out_path, &config).await.unwrap();
        let html = std::fs::read_to_string(&out_path).unwrap();
        assert!(html.contains("<p>body</p>"));
        assert!(!dir.path().join("nested/out.html.tmp").exists());
    }

    #[test]
    fn build_sync_runs_without_a_runtime() {
        let config = BuildConfig::builder().mode(OutputMode::Html).build().unwrap();
        let out = build_sync(&source("sync"), &config).unwrap();
        assert!(String::from_utf8_lossy(&out.artifact).contains("<p>sync</p>"));
    }

    #[tokio::test]
    async fn failure_reports_completion() {
        let stages = Arc::new(Stages::default());
        let config = BuildConfig::builder()
            .mode(OutputMode::Html)
            .stylesheet("/no/such.css")
            .progress_callback(stages.clone())
            .build()
            .unwrap();
        assert!(build(&source("x"), &config).await.is_err());
        assert_eq!(*stages.0.lock().unwrap(), vec!["done false"]);
    }
}
