//! Progress-callback trait for build events.
//!
//! Inject an [`Arc<dyn BuildProgressCallback>`] via
//! [`crate::config::BuildConfigBuilder::progress_callback`] to receive events
//! as the pipeline moves through its stages and external tool passes. A LaTeX
//! build with a bibliography can take many seconds across four or five tool
//! invocations; callbacks let a host show which one is running.
//!
//! # Example
//!
//! ```rust
//! use mdpress::{BuildConfig, BuildProgressCallback, PassRecord};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     passes: AtomicUsize,
//! }
//!
//! impl BuildProgressCallback for CountingCallback {
//!     fn on_pass_complete(&self, pass: &PassRecord) {
//!         let n = self.passes.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("pass {n}: {} in {}ms", pass.tool, pass.duration_ms);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { passes: AtomicUsize::new(0) });
//!
//! let config = BuildConfig::builder()
//!     .progress_callback(counter as Arc<dyn BuildProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::config::OutputMode;
use crate::error::{BuildStage, Tool};
use crate::output::PassRecord;
use std::path::Path;
use std::sync::Arc;

/// Called by the build pipeline as it progresses.
///
/// Implementations must be `Send + Sync` so a config can be shared across
/// concurrent builds. All methods have default no-op implementations so
/// callers only override what they care about.
pub trait BuildProgressCallback: Send + Sync {
    /// Called once before preprocessing starts.
    fn on_build_start(&self, mode: OutputMode) {
        let _ = mode;
    }

    /// Called when the pipeline enters a new stage.
    fn on_stage(&self, stage: BuildStage) {
        let _ = stage;
    }

    /// Called just before an external tool is spawned.
    ///
    /// # Arguments
    /// * `tool` : which program is about to run
    /// * `index`: 1-indexed count of invocations of this tool so far
    fn on_pass_start(&self, tool: Tool, index: usize) {
        let _ = (tool, index);
    }

    /// Called after an external tool exits successfully.
    fn on_pass_complete(&self, pass: &PassRecord) {
        let _ = pass;
    }

    /// Called when a failed build has written its assembled source to `path`.
    ///
    /// Not called when writing the recovery file itself fails.
    fn on_source_preserved(&self, path: &Path) {
        let _ = path;
    }

    /// Called once when the build finishes, after cleanup.
    fn on_build_complete(&self, success: bool) {
        let _ = success;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BuildProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BuildConfig`].
pub type ProgressCallback = Arc<dyn BuildProgressCallback>;
