//! Split command CLI handler.

use crate::input;
use crate::splitter::{self, Stats};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::glob_util::{expand_file_pattern, BatchResult};

pub fn run(
    file: PathBuf,
    output: Option<PathBuf>,
    dry_run: bool,
    progress: bool,
    fail_fast: bool,
) -> anyhow::Result<()> {
    let expanded = expand_file_pattern(&file)?;

    if !expanded.pattern_was_glob {
        let file = expanded.files.into_iter().next().unwrap();
        return run_single(&file, output.as_deref(), dry_run, progress);
    }

    let total = expanded.files.len();
    let mut result = BatchResult::default();
    eprintln!("Splitting {} files...\n", total);

    for (idx, file) in expanded.files.iter().enumerate() {
        eprintln!("[{}/{}] {}", idx + 1, total, file.display());

        let per_file_output = output
            .as_ref()
            .map(|dir| dir.join(file.file_stem().unwrap_or(file.as_os_str())));

        match run_single(file, per_file_output.as_deref(), dry_run, false) {
            Ok(()) => result.record_success(),
            Err(e) => {
                eprintln!("  Error: {}", e);
                result.record_failure(file.clone(), e.to_string());
                if fail_fast {
                    break;
                }
            }
        }
    }

    result.finish(total)
}

fn run_single(
    file: &Path,
    output: Option<&Path>,
    dry_run: bool,
    progress: bool,
) -> anyhow::Result<()> {
    let pb = if progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        pb.set_message("Splitting...");
        Some(pb)
    } else {
        None
    };

    let text = input::read_to_string(file)?;
    let statements = splitter::split(&text);
    let stats = Stats::from_statements(&statements);

    if let Some(pb) = pb {
        pb.finish_with_message(format!("Split {} statements", stats.statements));
    }

    if !dry_run {
        match output {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                for (idx, stmt) in statements.iter().enumerate() {
                    let path = dir.join(format!("{:04}.sql", idx + 1));
                    std::fs::write(&path, format!("{}\n", stmt.text))?;
                }
            }
            None => {
                let stdout = std::io::stdout();
                let mut out = stdout.lock();
                for stmt in &statements {
                    writeln!(out, "{}\n", stmt.text)?;
                }
            }
        }
    }

    eprintln!("Split statistics:");
    eprintln!("  Statements: {}", stats.statements);
    eprintln!("  Function bodies: {}", stats.function_bodies);
    eprintln!("  Bytes: {}", stats.bytes_processed);
    if dry_run {
        eprintln!("  (Dry run - no output written)");
    }

    Ok(())
}
