//! Parameter-default reordering for function headers.
//!
//! PostgreSQL requires parameters with defaults to trail the required
//! ones. Each function's parameter list is split on top-level commas
//! (respecting nested parens and string literals) and stable-partitioned:
//! required parameters first, defaulted parameters after, relative order
//! preserved within each group.

use crate::scan::QuoteTracker;
use crate::signature::{split_top_level, stable_partition_raw};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_FUNCTION_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bCREATE\s+(?:OR\s+REPLACE\s+)?FUNCTION\s+(?:[A-Za-z_][A-Za-z0-9_]*\s*\.\s*)?[A-Za-z_][A-Za-z0-9_]*\s*\(",
    )
    .unwrap()
});

/// Reorder every function's parameter list so defaults trail. Returns the
/// new text and the number of functions adjusted; text with lists already
/// in order passes through byte-identical.
pub fn reorder_parameters(text: &str) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut count = 0;

    for m in RE_FUNCTION_HEADER.find_iter(text) {
        let open = m.end() - 1;
        if open < cursor {
            continue;
        }
        let Some(close) = find_matching_paren(text, open) else {
            continue;
        };
        let inner = &text[open + 1..close];
        if inner.trim().is_empty() {
            continue;
        }

        let params: Vec<&str> = split_top_level(inner, b',')
            .iter()
            .map(|p| p.trim())
            .collect();
        let ordered = stable_partition_raw(&params);
        if ordered == params {
            continue;
        }

        out.push_str(&text[cursor..open + 1]);
        out.push_str(&ordered.join(", "));
        cursor = close;
        count += 1;
    }

    out.push_str(&text[cursor..]);
    (out, count)
}

/// Find the `)` matching the `(` at `open`, outside quotes.
pub fn find_matching_paren(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut tracker = QuoteTracker::new();
    let mut i = 0;
    while i < open {
        i += tracker.step(bytes, i);
    }

    let mut depth: i32 = 0;
    while i < bytes.len() {
        if !tracker.in_quoted_region() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += tracker.step(bytes, i);
    }

    None
}
