//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce architectural principles
//! on the listener crates:
//! - No blocking I/O inside async functions
//! - No panicking shortcuts (`unwrap`, `expect`) in production code
//!
//! The helpers here walk the production sources and hand each test the lines
//! that are not test code.

use std::fs;
use std::path::{Path, PathBuf};

/// Source directories holding production code, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["listener/core/src", "listener/daemon/src"];

/// One line of production code
#[derive(Debug)]
pub struct SourceLine {
    /// File the line came from
    pub path: PathBuf,
    /// 1-based line number
    pub number: usize,
    /// Line text with any trailing `//` comment removed
    pub code: String,
    /// Whether the enclosing function is `async`
    pub in_async_fn: bool,
}

impl SourceLine {
    /// `path:line - text`, for violation reports
    pub fn describe(&self, what: &str) -> String {
        format!(
            "{}:{} - {}: {}",
            self.path.display(),
            self.number,
            what,
            self.code.trim()
        )
    }
}

/// Workspace root, two levels above this package
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Every production line across [`PRODUCTION_DIRS`]
///
/// Everything from the first `#[cfg(test)]` in a file onwards is treated as
/// test code, as are doc comments.
pub fn production_lines() -> Vec<SourceLine> {
    let root = workspace_root();
    let mut lines = Vec::new();

    for dir in PRODUCTION_DIRS {
        let path = root.join(dir);
        if !path.exists() {
            continue;
        }

        for entry in walkdir::WalkDir::new(&path)
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.path().extension().and_then(|s| s.to_str()) == Some("rs") {
                collect_file(entry.path(), &mut lines);
            }
        }
    }

    lines
}

fn collect_file(path: &Path, out: &mut Vec<SourceLine>) {
    let Ok(content) = fs::read_to_string(path) else {
        return;
    };

    let mut in_async_fn = false;
    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("#[cfg(test)]") {
            break;
        }
        if trimmed.starts_with("//") {
            continue;
        }

        let code = line.split("//").next().unwrap_or(line);
        if is_fn_signature(code) {
            in_async_fn = code.contains("async fn");
        }

        out.push(SourceLine {
            path: path.to_path_buf(),
            number: idx + 1,
            code: code.to_string(),
            in_async_fn,
        });
    }
}

fn is_fn_signature(code: &str) -> bool {
    let trimmed = code.trim_start();
    trimmed.starts_with("fn ") || trimmed.contains(" fn ") || trimmed.starts_with("async fn ")
}
