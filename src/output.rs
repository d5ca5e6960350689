//! Result types returned by a successful build.

use crate::config::OutputMode;
use crate::error::Tool;
use serde::{Deserialize, Serialize};

/// The fully composed document handed to the compiler stage.
///
/// Header, converted body, optional bibliography block and footer, in that
/// order. Never mutated after assembly; the same text is what lands in the
/// recovery file when compilation fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledDocument {
    text: String,
}

impl AssembledDocument {
    pub(crate) fn new(text: String) -> Self {
        Self { text }
    }

    /// The document source.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Consume the document, returning its source.
    pub fn into_string(self) -> String {
        self.text
    }
}

/// One invocation of an external program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassRecord {
    pub tool: Tool,
    /// 1-indexed count of invocations of this tool within the build.
    pub index: usize,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

/// Timings and pass counts for a build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildStats {
    pub mode: OutputMode,
    pub compiler_passes: usize,
    pub bibliography_passes: usize,
    /// Every external invocation in execution order, converter included.
    pub passes: Vec<PassRecord>,
    pub total_duration_ms: u64,
}

impl BuildStats {
    pub(crate) fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            compiler_passes: 0,
            bibliography_passes: 0,
            passes: Vec::new(),
            total_duration_ms: 0,
        }
    }

    pub(crate) fn record(&mut self, pass: PassRecord) {
        match pass.tool {
            Tool::Compiler => self.compiler_passes += 1,
            Tool::Bibliography => self.bibliography_passes += 1,
            Tool::Converter => {}
        }
        self.passes.push(pass);
    }

    /// The tools invoked, in order.
    pub fn tool_sequence(&self) -> Vec<Tool> {
        self.passes.iter().map(|p| p.tool).collect()
    }
}

/// Output of a successful build.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// The artifact bytes: a PDF for typeset modes, UTF-8 HTML otherwise.
    pub artifact: Vec<u8>,
    /// The document source that produced the artifact.
    pub document: AssembledDocument,
    pub stats: BuildStats,
}
