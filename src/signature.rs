//! Function signature model shared by the translator and the repair
//! engine.
//!
//! Both ends of the pipeline need to take a parameter list apart: the
//! translator builds one from a T-SQL procedure header, the repair engine
//! reorders an existing PostgreSQL one. The splitting helpers here are
//! quote- and paren-aware so a default expression like
//! `DEFAULT my_fn(1, 'a,b')` never fools the comma split.

use crate::scan::QuoteTracker;
use once_cell::sync::Lazy;
use regex::Regex;

/// Parameter passing mode. T-SQL `OUTPUT` parameters map to `INOUT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    In,
    InOut,
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub data_type: String,
    pub mode: ParamMode,
    pub default: Option<String>,
}

impl Parameter {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Render as a PostgreSQL parameter declaration.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.mode == ParamMode::InOut {
            out.push_str("INOUT ");
        }
        out.push_str(&self.name);
        out.push(' ');
        out.push_str(&self.data_type);
        if let Some(default) = &self.default {
            out.push_str(" DEFAULT ");
            out.push_str(default);
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub returns_clause: Option<String>,
    pub language: Option<String>,
}

impl FunctionSignature {
    pub fn has_inout(&self) -> bool {
        self.parameters.iter().any(|p| p.mode == ParamMode::InOut)
    }

    /// Render the parameter list with required parameters first, which is
    /// what PostgreSQL demands of default-bearing parameters.
    pub fn render_parameters(&self) -> String {
        let ordered = stable_partition_by_default(&self.parameters);
        ordered
            .iter()
            .map(|p| p.render())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Split `text` on `sep` occurrences at paren depth zero, outside string
/// literals and dollar-quoted bodies. Separator bytes are not included in
/// the returned slices.
pub fn split_top_level(text: &str, sep: u8) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut tracker = QuoteTracker::new();
    let mut depth: i32 = 0;
    let mut parts = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        let quoted = tracker.in_quoted_region();
        let b = bytes[i];
        let n = tracker.step(bytes, i);

        if !quoted {
            match b {
                b'(' => depth += 1,
                b')' => depth = (depth - 1).max(0),
                _ if b == sep && depth == 0 => {
                    parts.push(&text[start..i]);
                    start = i + n;
                }
                _ => {}
            }
        }
        i += n;
    }

    parts.push(&text[start..]);
    parts
}

static RE_DEFAULT_KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bDEFAULT\b").unwrap());

fn is_word_byte(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

/// Whether a raw parameter declaration carries a default value: a
/// `DEFAULT` keyword or an `=` sign at paren depth zero, outside quotes.
pub fn has_top_level_default(param: &str) -> bool {
    let bytes = param.as_bytes();
    let mut tracker = QuoteTracker::new();
    let mut depth: i32 = 0;
    let mut i = 0;

    while i < bytes.len() {
        let quoted = tracker.in_quoted_region();
        let b = bytes[i];
        let n = tracker.step(bytes, i);

        if !quoted && depth == 0 {
            if b == b'=' {
                return true;
            }
            let at_word_start = i == 0 || !is_word_byte(bytes[i - 1]);
            if (b == b'D' || b == b'd')
                && at_word_start
                && RE_DEFAULT_KEYWORD
                    .find(&param[i..])
                    .is_some_and(|m| m.start() == 0)
            {
                return true;
            }
        }
        if !quoted {
            match b {
                b'(' => depth += 1,
                b')' => depth = (depth - 1).max(0),
                _ => {}
            }
        }
        i += n;
    }

    false
}

/// Stable partition: parameters without defaults first, then parameters
/// with defaults, preserving relative order within each group.
pub fn stable_partition_by_default(params: &[Parameter]) -> Vec<&Parameter> {
    let mut ordered: Vec<&Parameter> = params.iter().filter(|p| !p.has_default()).collect();
    ordered.extend(params.iter().filter(|p| p.has_default()));
    ordered
}

/// Text-level variant of the stable partition, used by the repair engine
/// on raw parameter declarations.
pub fn stable_partition_raw<'a>(params: &[&'a str]) -> Vec<&'a str> {
    let mut ordered: Vec<&str> = params
        .iter()
        .copied()
        .filter(|p| !has_top_level_default(p))
        .collect();
    ordered.extend(params.iter().copied().filter(|p| has_top_level_default(p)));
    ordered
}
