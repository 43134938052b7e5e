mod analyze;
mod check;
mod glob_util;
mod repair;
mod split;
mod translate;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sqlmend")]
#[command(version)]
#[command(
    about = "Split SQL migration scripts and translate T-SQL procedures into plpgsql",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Split a SQL file into individual executable statements
    Split {
        /// Input SQL file or glob pattern (e.g., *.sql, migrations/**/*.sql)
        /// Supports .gz, .bz2, .xz, .zst compression
        file: PathBuf,

        /// Output directory for statement files (default: listing to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Preview without writing files (dry run)
        #[arg(long)]
        dry_run: bool,

        /// Show progress during processing
        #[arg(short, long)]
        progress: bool,

        /// Stop on first file that fails (for glob patterns)
        #[arg(long)]
        fail_fast: bool,
    },

    /// Translate T-SQL stored procedures into PostgreSQL plpgsql
    Translate {
        /// Input SQL file or glob pattern
        /// Supports .gz, .bz2, .xz, .zst compression
        file: PathBuf,

        /// Output SQL file or directory (default: stdout for single file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rewrite the input file, keeping a timestamped backup
        #[arg(long, conflicts_with = "output")]
        in_place: bool,

        /// Length applied to bare VARCHAR inside RETURNS TABLE clauses
        /// (left flagged for manual review when not given)
        #[arg(long)]
        varchar_length: Option<u32>,

        /// Non-zero exit on any fix warning or validation issue
        #[arg(long)]
        strict: bool,

        /// Show progress during translation
        #[arg(short, long)]
        progress: bool,

        /// Preview without writing files (dry run)
        #[arg(long)]
        dry_run: bool,

        /// Stop on first file that fails (for glob patterns)
        #[arg(long)]
        fail_fast: bool,
    },

    /// Repair malformed plpgsql text (dollar quoting, LANGUAGE placement, parameter order)
    Repair {
        /// Input SQL file or glob pattern
        file: PathBuf,

        /// Output SQL file or directory (default: stdout for single file)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rewrite the input file, keeping a timestamped backup
        #[arg(long, conflicts_with = "output")]
        in_place: bool,

        /// Write repairs to FILE.corrected, leaving the input untouched
        #[arg(long, conflicts_with_all = ["output", "in_place"])]
        side_file: bool,

        /// Length applied to bare VARCHAR inside RETURNS TABLE clauses
        #[arg(long)]
        varchar_length: Option<u32>,

        /// Non-zero exit on any fix warning or validation issue
        #[arg(long)]
        strict: bool,

        /// Preview without writing files (dry run)
        #[arg(long)]
        dry_run: bool,

        /// Stop on first file that fails (for glob patterns)
        #[arg(long)]
        fail_fast: bool,
    },

    /// Check PostgreSQL function text for structural issues
    Check {
        /// Input SQL file or glob pattern
        file: PathBuf,

        /// Output results as JSON instead of human-readable text
        #[arg(long)]
        json: bool,

        /// Treat warnings as errors (non-zero exit on any warning)
        #[arg(long)]
        strict: bool,
    },

    /// Show document statistics and map a byte offset to line/column
    Analyze {
        /// Input SQL file
        file: PathBuf,

        /// Byte offset to locate (e.g., the Position of a server error)
        #[arg(long)]
        offset: Option<usize>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Split {
            file,
            output,
            dry_run,
            progress,
            fail_fast,
        } => split::run(file, output, dry_run, progress, fail_fast),
        Commands::Translate {
            file,
            output,
            in_place,
            varchar_length,
            strict,
            progress,
            dry_run,
            fail_fast,
        } => translate::run(
            file,
            output,
            in_place,
            varchar_length,
            strict,
            progress,
            dry_run,
            fail_fast,
        ),
        Commands::Repair {
            file,
            output,
            in_place,
            side_file,
            varchar_length,
            strict,
            dry_run,
            fail_fast,
        } => repair::run(
            file,
            output,
            in_place,
            side_file,
            varchar_length,
            strict,
            dry_run,
            fail_fast,
        ),
        Commands::Check { file, json, strict } => check::run(file, json, strict),
        Commands::Analyze { file, offset } => analyze::run(file, offset),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "sqlmend", &mut io::stdout());
            Ok(())
        }
    }
}
