//! Repair command CLI handler: repair rules → validator.

use crate::input;
use crate::repair::{repair, RepairOptions};
use crate::validate;
use std::path::{Path, PathBuf};

use super::glob_util::{expand_file_pattern, BatchResult};

#[allow(clippy::too_many_arguments)]
pub fn run(
    file: PathBuf,
    output: Option<PathBuf>,
    in_place: bool,
    side_file: bool,
    varchar_length: Option<u32>,
    strict: bool,
    dry_run: bool,
    fail_fast: bool,
) -> anyhow::Result<()> {
    let expanded = expand_file_pattern(&file)?;
    let options = RepairOptions {
        table_varchar_len: varchar_length,
    };

    if !expanded.pattern_was_glob {
        let file = expanded.files.into_iter().next().unwrap();
        let clean = run_single(&file, output.as_deref(), in_place, side_file, &options, strict, dry_run)?;
        if !clean {
            std::process::exit(1);
        }
        return Ok(());
    }

    let total = expanded.files.len();
    let mut result = BatchResult::default();
    eprintln!("Repairing {} files...\n", total);

    for (idx, file) in expanded.files.iter().enumerate() {
        eprintln!("[{}/{}] {}", idx + 1, total, file.display());

        let per_file_output = output.as_ref().map(|dir| {
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
            side_file,
            &options,
            strict,
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

fn run_single(
    file: &Path,
    output: Option<&Path>,
    in_place: bool,
    side_file: bool,
    options: &RepairOptions,
    strict: bool,
    dry_run: bool,
) -> anyhow::Result<bool> {
    let text = input::read_to_string(file)?;
    let (repaired, report) = repair(&text, options);
    let summary = validate::validate(&repaired);

    report.print_summary();
    for issue in &summary.issues {
        eprintln!("{}", issue);
    }

    if !dry_run {
        if side_file {
            let corrected = side_file_path(file);
            std::fs::write(&corrected, &repaired)?;
            eprintln!("Corrected copy written to {}", corrected.display());
        } else if in_place {
            let backup = input::write_backup(file)?;
            eprintln!("Backup written to {}", backup.display());
            std::fs::write(file, &repaired)?;
        } else {
            match output {
                Some(path) => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(path, &repaired)?;
                }
                None => println!("{}", repaired),
            }
        }
    } else {
        eprintln!("(Dry run - no output written)");
    }

    if strict && (report.warning_count() > 0 || !summary.is_clean()) {
        return Ok(false);
    }
    Ok(!summary.has_errors())
}

fn side_file_path(file: &Path) -> PathBuf {
    let mut name = file
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".corrected");
    file.with_file_name(name)
}
