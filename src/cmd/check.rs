//! Check command CLI handler.

use crate::input;
use crate::validate;
use std::path::PathBuf;
use std::time::Instant;

use super::glob_util::expand_file_pattern;

pub fn run(file: PathBuf, json: bool, strict: bool) -> anyhow::Result<()> {
    let expanded = expand_file_pattern(&file)?;
    let start_time = Instant::now();
    let mut any_errors = false;
    let mut any_warnings = false;

    for file in &expanded.files {
        let text = input::read_to_string(file)?;
        let summary = validate::validate(&text);

        if json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            if expanded.files.len() > 1 {
                eprintln!("{}:", file.display());
            }
            for issue in &summary.issues {
                eprintln!("{}", issue);
            }
            eprintln!(
                "  {} errors, {} warnings",
                summary.errors, summary.warnings
            );
        }

        any_errors |= summary.has_errors();
        any_warnings |= summary.warnings > 0;
    }

    if !json {
        let elapsed = start_time.elapsed();
        eprintln!();
        if any_errors {
            eprintln!("Result: FAILED ({:.3?})", elapsed);
        } else if any_warnings && strict {
            eprintln!("Result: FAILED (--strict mode, warnings treated as errors) ({:.3?})", elapsed);
        } else if any_warnings {
            eprintln!("Result: PASSED (with warnings) ({:.3?})", elapsed);
        } else {
            eprintln!("Result: PASSED ({:.3?})", elapsed);
        }
    }

    if any_errors || (strict && any_warnings) {
        std::process::exit(1);
    }

    Ok(())
}
