//! Recursive expansion of `\input{name}` directives.
//!
//! Expansion is a depth-first walk over the inclusion graph driven by an
//! explicit stack of open files rather than by call recursion, so deep
//! inclusion trees cannot exhaust the call stack. The chain of files on the
//! stack is the set checked for cycles: entering a file that is already open
//! fails with [`BuildError::CyclicInclude`]. Including the same file twice
//! from different places (a diamond) is not a cycle and is allowed.
//!
//! [`IncludeStack`] only walks lines. Deciding what a line *is* belongs to
//! [`crate::pipeline::preprocess`], which calls [`IncludeStack::enter`] when
//! it meets a directive.

use crate::error::BuildError;
use crate::pipeline::input::SourceDocument;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

static RE_INPUT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\\input\{([^{}]+)\}$").unwrap());

/// Extract the target name from a directive line, `None` for any other line.
pub fn parse_directive(line: &str) -> Option<&str> {
    RE_INPUT
        .captures(line.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// One step of the walk.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// The next line of the innermost open file.
    Line(String),
    /// An included file has been fully consumed and closed.
    Leave,
}

struct Frame {
    /// Canonical path, `None` for a root document that was not read from disk.
    file: Option<PathBuf>,
    dir: PathBuf,
    lines: std::vec::IntoIter<String>,
}

impl Frame {
    fn new(text: &str, dir: PathBuf, file: Option<PathBuf>) -> Self {
        let lines: Vec<String> = text.split('\n').map(str::to_string).collect();
        Self {
            file,
            dir,
            lines: lines.into_iter(),
        }
    }
}

/// Depth-first cursor over a document and everything it includes.
pub struct IncludeStack {
    frames: Vec<Frame>,
    extension: String,
    included: usize,
}

impl IncludeStack {
    pub fn new(root: &SourceDocument, extension: &str) -> Self {
        let file = root.path().and_then(|p| std::fs::canonicalize(p).ok());
        Self {
            frames: vec![Frame::new(root.text(), root.base_dir().to_path_buf(), file)],
            extension: extension.to_string(),
            included: 0,
        }
    }

    /// Advance to the next line, closing exhausted included files on the way.
    ///
    /// Returns `None` once the root document is exhausted.
    pub fn next_step(&mut self) -> Option<Step> {
        let frame = self.frames.last_mut()?;
        if let Some(line) = frame.lines.next() {
            return Some(Step::Line(line));
        }
        self.frames.pop();
        if self.frames.is_empty() {
            None
        } else {
            Some(Step::Leave)
        }
    }

    /// Open `name` relative to the innermost file's directory and make it the
    /// source of subsequent lines.
    pub fn enter(&mut self, name: &str) -> Result<(), BuildError> {
        let dir = self
            .frames
            .last()
            .map(|f| f.dir.clone())
            .ok_or_else(|| BuildError::Internal("include outside of any document".into()))?;
        let target = dir.join(format!("{name}.{}", self.extension));

        let canonical = match std::fs::canonicalize(&target) {
            Ok(p) => p,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BuildError::IncludeNotFound {
                    name: name.to_string(),
                    path: target,
                });
            }
            Err(e) => {
                return Err(BuildError::ReadFailed {
                    path: target,
                    source: e,
                })
            }
        };

        if self.is_open(&canonical) {
            let mut chain: Vec<PathBuf> = self.frames.iter().filter_map(|f| f.file.clone()).collect();
            chain.push(canonical);
            return Err(BuildError::CyclicInclude { chain });
        }

        let text = std::fs::read_to_string(&canonical).map_err(|e| BuildError::ReadFailed {
            path: canonical.clone(),
            source: e,
        })?;
        let next_dir = canonical
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| dir.clone());

        debug!(
            "Including {} (depth {})",
            canonical.display(),
            self.frames.len()
        );
        self.frames.push(Frame::new(&text, next_dir, Some(canonical)));
        self.included += 1;
        Ok(())
    }

    /// Number of files entered so far.
    pub fn included(&self) -> usize {
        self.included
    }

    fn is_open(&self, file: &Path) -> bool {
        self.frames.iter().any(|f| f.file.as_deref() == Some(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn collect(stack: &mut IncludeStack) -> Result<Vec<Step>, BuildError> {
        let mut steps = Vec::new();
        while let Some(step) = stack.next_step() {
            if let Step::Line(ref line) = step {
                if let Some(name) = parse_directive(line) {
                    let name = name.to_string();
                    stack.enter(&name)?;
                    continue;
                }
            }
            steps.push(step);
        }
        Ok(steps)
    }

    #[test]
    fn parses_directives() {
        assert_eq!(parse_directive("\\input{intro}"), Some("intro"));
        assert_eq!(parse_directive("   \\input{chapters/one}  "), Some("chapters/one"));
        assert_eq!(parse_directive("\\input{}"), None);
        assert_eq!(parse_directive("\\input{a}{b}"), None);
        assert_eq!(parse_directive("see \\input{a}"), None);
        assert_eq!(parse_directive("\\include{a}"), None);
    }

    #[test]
    fn walks_root_lines() {
        let doc = SourceDocument::new("a\nb", "/nonexistent");
        let mut stack = IncludeStack::new(&doc, "tex");
        let steps = collect(&mut stack).unwrap();
        assert_eq!(steps, vec![Step::Line("a".into()), Step::Line("b".into())]);
    }

    #[test]
    fn nested_files_resolve_against_their_own_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("ch")).unwrap();
        fs::write(dir.path().join("ch/one.tex"), "one\n\\input{two}").unwrap();
        fs::write(dir.path().join("ch/two.tex"), "two").unwrap();

        let doc = SourceDocument::new("\\input{ch/one}\nend", dir.path());
        let mut stack = IncludeStack::new(&doc, "tex");
        let steps = collect(&mut stack).unwrap();
        assert_eq!(
            steps,
            vec![
                Step::Line("one".into()),
                Step::Line("two".into()),
                Step::Leave,
                Step::Leave,
                Step::Line("end".into()),
            ]
        );
        assert_eq!(stack.included(), 2);
    }

    #[test]
    fn missing_target_is_include_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let doc = SourceDocument::new("\\input{ghost}", dir.path());
        let mut stack = IncludeStack::new(&doc, "tex");
        let err = collect(&mut stack).unwrap_err();
        match err {
            BuildError::IncludeNotFound { name, path } => {
                assert_eq!(name, "ghost");
                assert_eq!(path, dir.path().join("ghost.tex"));
            }
            other => panic!("expected IncludeNotFound, got {other:?}"),
        }
    }

    #[test]
    fn direct_self_inclusion_is_a_cycle() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.tex"), "top\n\\input{a}").unwrap();

        let doc = SourceDocument::new("\\input{a}", dir.path());
        let mut stack = IncludeStack::new(&doc, "tex");
        let err = collect(&mut stack).unwrap_err();
        match err {
            BuildError::CyclicInclude { chain } => assert_eq!(chain.len(), 2),
            other => panic!("expected CyclicInclude, got {other:?}"),
        }
    }

    #[test]
    fn indirect_self_inclusion_is_a_cycle() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.tex"), "\\input{b}").unwrap();
        fs::write(dir.path().join("b.tex"), "\\input{a}").unwrap();

        let doc = SourceDocument::new("\\input{a}", dir.path());
        let mut stack = IncludeStack::new(&doc, "tex");
        let err = collect(&mut stack).unwrap_err();
        let BuildError::CyclicInclude { chain } = err else {
            panic!("expected CyclicInclude");
        };
        let names: Vec<_> = chain
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.tex", "b.tex", "a.tex"]);
    }

    #[test]
    fn root_file_including_itself_is_a_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("main.tex");
        fs::write(&root, "\\input{main}").unwrap();

        let doc = SourceDocument::new("\\input{main}", dir.path()).with_path(&root);
        let mut stack = IncludeStack::new(&doc, "tex");
        assert!(matches!(
            collect(&mut stack),
            Err(BuildError::CyclicInclude { .. })
        ));
    }

    #[test]
    fn diamond_inclusion_is_allowed() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("shared.tex"), "S").unwrap();
        fs::write(dir.path().join("left.tex"), "\\input{shared}").unwrap();
        fs::write(dir.path().join("right.tex"), "\\input{shared}").unwrap();

        let doc = SourceDocument::new("\\input{left}\n\\input{right}", dir.path());
        let mut stack = IncludeStack::new(&doc, "tex");
        let steps = collect(&mut stack).unwrap();
        let shared = steps.iter().filter(|s| **s == Step::Line("S".into())).count();
        assert_eq!(shared, 2);
    }
}
