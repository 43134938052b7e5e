//! Statement splitter for SQL migration files.
//!
//! Splits a document into an ordered sequence of executable statements,
//! treating dollar-quoted function bodies as opaque: semicolons and
//! parentheses inside a body never end a top-level statement. Comments
//! are removed in the same scan pass as quote tracking, so `--` inside a
//! string literal is never mistaken for a comment start.

use crate::scan::QuoteTracker;

/// One executable statement. Offsets refer to the original document, not
/// the comment-stripped statement text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub contains_function_body: bool,
}

/// Split statistics for CLI display.
#[derive(Debug, Default)]
pub struct Stats {
    pub statements: usize,
    pub function_bodies: usize,
    pub bytes_processed: u64,
}

impl Stats {
    pub fn from_statements(statements: &[Statement]) -> Self {
        Self {
            statements: statements.len(),
            function_bodies: statements
                .iter()
                .filter(|s| s.contains_function_body)
                .count(),
            bytes_processed: statements.iter().map(|s| s.text.len() as u64).sum(),
        }
    }
}

/// Split a SQL document into top-level statements.
///
/// A statement ends at a `;` that sits outside any quoted region at paren
/// depth zero. Trailing text without a terminator is flushed as a final
/// statement when non-blank. Pure function of the input; never blocks.
pub fn split(sql: &str) -> Vec<Statement> {
    let bytes = sql.as_bytes();
    let mut tracker = QuoteTracker::new();
    let mut statements = Vec::new();

    let mut buf = String::new();
    let mut start_offset = 0;
    let mut saw_dollar_body = false;
    let mut depth: i32 = 0;
    let mut i = 0;

    while i < bytes.len() {
        if !tracker.in_quoted_region() {
            // Comments vanish here, inside the same pass that tracks
            // quote state, so markers inside literals survive.
            if bytes[i] == b'-' && bytes.get(i + 1) == Some(&b'-') {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
                continue;
            }
            if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
                i += 2;
                let mut comment_depth = 1;
                while i < bytes.len() && comment_depth > 0 {
                    if bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'*') {
                        comment_depth += 1;
                        i += 2;
                    } else if bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/') {
                        comment_depth -= 1;
                        i += 2;
                    } else {
                        i += 1;
                    }
                }
                continue;
            }
        }

        let was_quoted = tracker.in_quoted_region();
        let b = bytes[i];
        let n = tracker.step(bytes, i);
        let unit = &sql[i..i + n];

        // Skip whitespace between statements so start_offset lands on the
        // first significant character.
        if buf.is_empty() && !was_quoted && unit.chars().all(char::is_whitespace) {
            i += n;
            continue;
        }

        if buf.is_empty() {
            start_offset = i;
            saw_dollar_body = false;
            depth = 0;
        }

        buf.push_str(unit);

        if tracker.state().dollar_tag.is_some() {
            saw_dollar_body = true;
        }

        if !was_quoted {
            match b {
                b'(' => depth += 1,
                b')' => depth = (depth - 1).max(0),
                b';' if depth == 0 => {
                    statements.push(Statement {
                        text: std::mem::take(&mut buf),
                        start_offset,
                        end_offset: i + 1,
                        contains_function_body: saw_dollar_body,
                    });
                }
                _ => {}
            }
        }

        i += n;
    }

    if !buf.trim().is_empty() {
        statements.push(Statement {
            text: buf,
            start_offset,
            end_offset: sql.len(),
            contains_function_body: saw_dollar_body,
        });
    }

    statements
}
