//! Translate command CLI handler: translator → repair → validator.

use crate::input;
use crate::repair::{repair, RepairOptions};
use crate::translate::translate_document;
use crate::validate;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use super::glob_util::{expand_file_pattern, BatchResult};

#[allow(clippy::too_many_arguments)]
pub fn run(
    file: PathBuf,
    output: Option<PathBuf>,
    in_place: bool,
    varchar_length: Option<u32>,
    strict: bool,
    progress: bool,
    dry_run: bool,
    fail_fast: bool,
) -> anyhow::Result<()> {
    let expanded = expand_file_pattern(&file)?;
    let options = RepairOptions {
        table_varchar_len: varchar_length,
    };

    if !expanded.pattern_was_glob {
        let file = expanded.files.into_iter().next().unwrap();
        let clean = run_single(
            &file,
            output.as_deref(),
            in_place,
            &options,
            strict,
            progress,
            dry_run,
        )?;
        if !clean {
            std::process::exit(1);
        }
        return Ok(());
    }

    let output_dir = match output {
        Some(dir) => Some(dir),
        None if in_place || dry_run => None,
        None => {
            anyhow::bail!("Output directory required when using glob patterns. Use --output <dir>");
        }
    };

    let total = expanded.files.len();
    let mut result = BatchResult::default();
    eprintln!("Translating {} files...\n", total);

    for (idx, file) in expanded.files.iter().enumerate() {
        eprintln!("[{}/{}] {}", idx + 1, total, file.display());

        let per_file_output = output_dir.as_ref().map(|dir| {
            dir.join(
                file.file_name()
                    .map(|n| n.to_os_string())
                    .unwrap_or_else(|| format!("output_{}.sql", idx).into()),
            )
        });

        match run_single(
            file,
            per_file_output.as_deref(),
            in_place,
            &options,
            strict,
            false,
            dry_run,
        ) {
            Ok(true) => result.record_success(),
            Ok(false) => {
                result.record_failure(file.clone(), "validation issues".to_string());
                if fail_fast {
                    break;
                }
            }
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

/// Translate one file. Returns whether the output passed validation (and
/// strict-mode warning policy).
fn run_single(
    file: &Path,
    output: Option<&Path>,
    in_place: bool,
    options: &RepairOptions,
    strict: bool,
    progress: bool,
    dry_run: bool,
) -> anyhow::Result<bool> {
    let pb = if progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap(),
        );
        pb.set_message("Translating...");
        Some(pb)
    } else {
        None
    };

    let text = input::read_to_string(file)?;

    let translated = translate_document(&text);
    let (repaired, repair_report) = repair(&translated.text, options);
    let mut report = translated.report;
    report.merge(repair_report);

    let summary = validate::validate(&repaired);

    if let Some(pb) = pb {
        pb.finish_with_message("done");
    }

    report.print_summary();
    for issue in &summary.issues {
        eprintln!("{}", issue);
    }

    if !dry_run {
        write_result(file, output, in_place, &repaired)?;
    } else {
        eprintln!("(Dry run - no output written)");
    }

    if strict && (report.warning_count() > 0 || !summary.is_clean()) {
        return Ok(false);
    }
    Ok(!summary.has_errors())
}

fn write_result(
    file: &Path,
    output: Option<&Path>,
    in_place: bool,
    text: &str,
) -> anyhow::Result<()> {
    if in_place {
        let backup = input::write_backup(file)?;
        eprintln!("Backup written to {}", backup.display());
        std::fs::write(file, text)?;
        return Ok(());
    }

    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, text)?;
        }
        None => println!("{}", text),
    }
    Ok(())
}
