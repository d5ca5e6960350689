//! Build orchestration: workspace lifecycle and the multi-pass compile.
//!
//! ```text
//! Init ──▶ Staged ──▶ Compiled(N) ──▶ Harvested ──▶ Cleaned
//!   │         │            │              │
//!   └─────────┴────────────┴──────────────┴──────▶ FailedCleanup
//! ```
//!
//! The workspace is removed on every path out of [`Orchestrator::run`]. When
//! the compile or harvest stage fails, the assembled source is first written
//! to the recovery file so the attempted document survives the teardown.
//!
//! ## Pass sequence
//!
//! Without a bibliography a single compiler pass is enough. With one:
//!
//! ```text
//! compiler ─▶ bibliography ─▶ compiler ─▶ compiler [─▶ compiler ...]
//! ```
//!
//! The two settle passes after the bibliography always run. Further passes
//! run only while the compiler log still asks for a rerun, up to
//! [`BuildConfig::max_settle_passes`].

use crate::config::BuildConfig;
use crate::error::{BuildError, BuildStage, Tool};
use crate::output::{AssembledDocument, BuildStats, PassRecord};
use crate::pipeline::tool::{Invocation, ToolOutput, ToolRunner};
use crate::pipeline::workspace::Workspace;
use crate::progress::BuildProgressCallback;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Document source filename inside the workspace, and of the recovery file.
pub const DOCUMENT_FILE: &str = "page.tex";
/// Compiled artifact filename inside the workspace.
pub const ARTIFACT_FILE: &str = "page.pdf";
/// Base name handed to the bibliography processor.
pub const BASE_NAME: &str = "page";
/// Bibliography database filename inside the workspace.
pub const BIBLIOGRAPHY_FILE: &str = "bibliography.bib";

/// Printed by TeX engines that exit zero without producing a page.
const NO_OUTPUT_DIAGNOSTIC: &str = "No pages of output.";

static RE_RERUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)rerun to get (cross-references|citations|outlines)|label\(s\) may have changed")
        .unwrap()
});

/// Where the orchestrator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildState {
    Init,
    Staged,
    Compiled { passes: usize },
    Harvested,
    Cleaned,
    FailedCleanup,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildState::Init => f.write_str("init"),
            BuildState::Staged => f.write_str("staged"),
            BuildState::Compiled { passes } => write!(f, "compiled ({passes} passes)"),
            BuildState::Harvested => f.write_str("harvested"),
            BuildState::Cleaned => f.write_str("cleaned"),
            BuildState::FailedCleanup => f.write_str("failed-cleanup"),
        }
    }
}

/// Path of the recovery file for `config`.
///
/// Relative to the process working directory unless
/// [`BuildConfig::recovery_dir`] is set.
pub fn recovery_path(config: &BuildConfig) -> PathBuf {
    config
        .recovery_dir
        .clone()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
        .join(DOCUMENT_FILE)
}

/// Drives one compile from assembled source to artifact bytes.
pub struct Orchestrator<'a> {
    config: &'a BuildConfig,
    runner: &'a dyn ToolRunner,
    progress: Option<&'a dyn BuildProgressCallback>,
    timeout: Duration,
    state: BuildState,
    recovery: Option<PathBuf>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a BuildConfig, runner: &'a dyn ToolRunner) -> Self {
        Self {
            config,
            runner,
            progress: config.progress_callback.as_deref(),
            timeout: Duration::from_secs(config.tool_timeout_secs),
            state: BuildState::Init,
            recovery: None,
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    /// The recovery file written by a failed run, if any.
    pub fn recovery_file(&self) -> Option<&Path> {
        self.recovery.as_deref()
    }

    /// Compile `document` and return the artifact bytes.
    ///
    /// Every external invocation is recorded in `stats`.
    pub async fn run(
        &mut self,
        document: &AssembledDocument,
        stats: &mut BuildStats,
    ) -> Result<Vec<u8>, BuildError> {
        self.state = BuildState::Init;
        self.recovery = None;

        let workspace = match Workspace::create(self.config.workspace_root.as_deref()) {
            Ok(ws) => ws,
            Err(e) => {
                self.transition(BuildState::FailedCleanup);
                return Err(e);
            }
        };

        let result = self.stage_compile_harvest(&workspace, document, stats).await;

        if let Err(ref e) = result {
            error!("Build failed at {} stage: {e}", e.stage());
            if e.preserves_source() {
                self.write_recovery(document).await;
            }
        }

        self.notify_stage(BuildStage::Cleanup);
        let workspace_path = workspace.path().to_path_buf();
        if let Err(e) = workspace.close() {
            warn!(
                "Could not fully remove workspace {}: {e}",
                workspace_path.display()
            );
        }

        self.transition(if result.is_ok() {
            BuildState::Cleaned
        } else {
            BuildState::FailedCleanup
        });
        result
    }

    async fn stage_compile_harvest(
        &mut self,
        workspace: &Workspace,
        document: &AssembledDocument,
        stats: &mut BuildStats,
    ) -> Result<Vec<u8>, BuildError> {
        // ── Staged ──────────────────────────────────────────────────────────
        self.notify_stage(BuildStage::Stage);
        for dir in &self.config.include_dirs {
            workspace.stage_dir(dir)?;
        }
        for file in &self.config.include_files {
            workspace.stage_file(file)?;
        }
        workspace.write(DOCUMENT_FILE, document.as_str())?;
        if let Some(ref bib) = self.config.bibliography {
            workspace.write(BIBLIOGRAPHY_FILE, bib)?;
        }
        self.transition(BuildState::Staged);

        // ── Compiled ────────────────────────────────────────────────────────
        self.notify_stage(BuildStage::Compile);
        let mut passes = 0;
        let first = self.compiler_pass(workspace.path(), stats).await?;
        passes += 1;

        if self.config.bibliography.is_some() {
            self.bibliography_pass(workspace.path(), stats).await?;

            let mut last = first;
            for settle in 1..=self.config.max_settle_passes {
                if settle > 2 && !needs_rerun(&last) {
                    break;
                }
                last = self.compiler_pass(workspace.path(), stats).await?;
                passes += 1;
            }
            if needs_rerun(&last) {
                warn!(
                    "Cross-references still unsettled after {} compiler passes",
                    passes
                );
            }
        }
        self.transition(BuildState::Compiled { passes });

        // ── Harvested ───────────────────────────────────────────────────────
        self.notify_stage(BuildStage::Harvest);
        let artifact_path = workspace.join(ARTIFACT_FILE);
        let artifact = tokio::fs::read(&artifact_path)
            .await
            .map_err(|e| BuildError::Harvest {
                path: artifact_path.clone(),
                source: e,
            })?;
        info!("Harvested {} bytes from {}", artifact.len(), ARTIFACT_FILE);
        self.transition(BuildState::Harvested);
        Ok(artifact)
    }

    async fn compiler_pass(
        &self,
        cwd: &Path,
        stats: &mut BuildStats,
    ) -> Result<ToolOutput, BuildError> {
        let tools = &self.config.tools;
        let invocation = Invocation::new(Tool::Compiler, &tools.compiler, self.timeout)
            .args(tools.compiler_args.iter().cloned())
            .args([DOCUMENT_FILE])
            .cwd(cwd);
        let output = self.pass(&invocation, stats).await?;

        if !output.success() || output.stdout.contains(NO_OUTPUT_DIAGNOSTIC) {
            let exit_code = if output.success() {
                None
            } else {
                output.exit_code
            };
            return Err(BuildError::Compile {
                tool: Tool::Compiler,
                exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    async fn bibliography_pass(&self, cwd: &Path, stats: &mut BuildStats) -> Result<(), BuildError> {
        let invocation =
            Invocation::new(Tool::Bibliography, &self.config.tools.bibliography, self.timeout)
                .args([BASE_NAME])
                .cwd(cwd);
        let output = self.pass(&invocation, stats).await?;
        if !output.success() {
            return Err(BuildError::Compile {
                tool: Tool::Bibliography,
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(())
    }

    /// Run one invocation and record it, whatever its exit status.
    async fn pass(
        &self,
        invocation: &Invocation,
        stats: &mut BuildStats,
    ) -> Result<ToolOutput, BuildError> {
        let index = match invocation.tool {
            Tool::Compiler => stats.compiler_passes + 1,
            Tool::Bibliography => stats.bibliography_passes + 1,
            Tool::Converter => 1,
        };
        if let Some(cb) = self.progress {
            cb.on_pass_start(invocation.tool, index);
        }

        let output = self.runner.run(invocation).await?;
        let record = PassRecord {
            tool: invocation.tool,
            index,
            exit_code: output.exit_code,
            duration_ms: output.duration_ms,
        };
        info!(
            "{} pass {} exited {:?} in {}ms",
            record.tool, record.index, record.exit_code, record.duration_ms
        );
        if let Some(cb) = self.progress {
            if output.success() {
                cb.on_pass_complete(&record);
            }
        }
        stats.record(record);
        Ok(output)
    }

    async fn write_recovery(&mut self, document: &AssembledDocument) {
        let path = recovery_path(self.config);
        match tokio::fs::write(&path, document.as_str()).await {
            Ok(()) => {
                warn!("Source preserved at {}", path.display());
                if let Some(cb) = self.progress {
                    cb.on_source_preserved(&path);
                }
                self.recovery = Some(path);
            }
            Err(e) => error!("Could not write recovery file {}: {e}", path.display()),
        }
    }

    fn transition(&mut self, next: BuildState) {
        debug!("Build state {} → {}", self.state, next);
        self.state = next;
    }

    fn notify_stage(&self, stage: BuildStage) {
        if let Some(cb) = self.progress {
            cb.on_stage(stage);
        }
    }
}

fn needs_rerun(output: &ToolOutput) -> bool {
    RE_RERUN.is_match(&output.stdout)
}
