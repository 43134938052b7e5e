//! Analyze command CLI handler.
//!
//! Document statistics plus offset-to-line/column mapping, for turning a
//! server error position back into something a human can find.

use crate::document::SourceDocument;
use crate::input;
use crate::scan;
use crate::splitter::{self, Stats};
use std::path::PathBuf;

pub fn run(file: PathBuf, offset: Option<usize>) -> anyhow::Result<()> {
    let text = input::read_to_string(&file)?;
    let doc = SourceDocument::new(text);

    let statements = splitter::split(doc.text());
    let stats = Stats::from_statements(&statements);
    let final_state = scan::final_state(doc.text());

    println!("Analyzing: {} ({} bytes)", file.display(), doc.len());
    println!();
    println!("  Statements: {}", stats.statements);
    println!("  Function bodies: {}", stats.function_bodies);
    match &final_state.dollar_tag {
        Some(tag) => println!("  Quote balance: UNBALANCED (open {})", tag),
        None if final_state.in_single_quote => {
            println!("  Quote balance: UNBALANCED (open string literal)")
        }
        None => println!("  Quote balance: OK"),
    }

    if let Some(offset) = offset {
        let position = doc.locate(offset);
        let line = doc.line_at(offset);

        println!();
        println!("Offset {} is at line {}, column {}:", offset, position.line, position.column);
        println!("    {}", line);
        println!("    {}^", " ".repeat(position.column.saturating_sub(1)));
    }

    Ok(())
}
