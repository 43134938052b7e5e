//! Glob pattern expansion for CLI commands.
//!
//! Lets every subcommand accept either a literal file path or a pattern
//! like `migrations/**/*.sql`.

use std::path::{Path, PathBuf};

/// Result of expanding a file argument.
#[derive(Debug)]
pub struct ExpandedFiles {
    pub files: Vec<PathBuf>,
    pub pattern_was_glob: bool,
}

/// Check if a path string contains glob pattern characters.
pub fn is_glob_pattern(path: &str) -> bool {
    path.contains('*') || path.contains('?') || path.contains('[')
}

/// Expand a file path or glob pattern into a sorted list of files.
///
/// A literal path must exist; a glob pattern must match at least one
/// file.
pub fn expand_file_pattern(pattern: &Path) -> anyhow::Result<ExpandedFiles> {
    let pattern_str = pattern.to_string_lossy();

    if !is_glob_pattern(&pattern_str) {
        if !pattern.exists() {
            anyhow::bail!("input file does not exist: {}", pattern.display());
        }
        return Ok(ExpandedFiles {
            files: vec![pattern.to_path_buf()],
            pattern_was_glob: false,
        });
    }

    let mut files = Vec::new();
    for entry in glob::glob(&pattern_str)
        .map_err(|e| anyhow::anyhow!("invalid glob pattern '{}': {}", pattern_str, e))?
    {
        let path = entry
            .map_err(|e| anyhow::anyhow!("error reading path for pattern '{}': {}", pattern_str, e))?;
        if path.is_file() {
            files.push(path);
        }
    }

    if files.is_empty() {
        anyhow::bail!("no files match pattern: {}", pattern_str);
    }

    files.sort();

    Ok(ExpandedFiles {
        files,
        pattern_was_glob: true,
    })
}

/// Per-file success/failure bookkeeping for batch runs.
#[derive(Debug, Default)]
pub struct BatchResult {
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<(PathBuf, String)>,
}

impl BatchResult {
    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_failure(&mut self, path: PathBuf, error: String) {
        self.failed += 1;
        self.errors.push((path, error));
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Print the batch summary and exit non-zero on any failure.
    pub fn finish(self, total: usize) -> anyhow::Result<()> {
        eprintln!();
        eprintln!("Summary: {} files, {} succeeded, {} failed", total, self.succeeded, self.failed);

        if self.has_failures() {
            eprintln!();
            eprintln!("Failed files:");
            for (path, error) in &self.errors {
                eprintln!("  - {}: {}", path.display(), error);
            }
            std::process::exit(1);
        }

        Ok(())
    }
}
