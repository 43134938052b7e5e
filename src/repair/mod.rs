//! Ordered repair rules for malformed plpgsql function text.
//!
//! Rules are data, not control flow: a static table of id, description,
//! and a total apply function. The engine folds the text through the
//! table in order, recording a FixReport entry whenever a rule fires.
//! Every rule is idempotent; running the engine on already-correct text
//! is a byte-identical no-op. A rule that cannot confidently match makes
//! no change, preferring under-repair (the validator will report the
//! residue) over corrupting text.

mod params;

pub use params::{find_matching_paren, reorder_parameters};

use crate::report::{FixReport, Severity};
use crate::scan::{self, read_dollar_tag};
use once_cell::sync::Lazy;
use regex::Regex;

/// Engine configuration. The default length for a bare `VARCHAR` inside
/// `RETURNS TABLE(...)` is deliberately not defaulted: when unset, the
/// rule only flags the spot for manual review.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepairOptions {
    pub table_varchar_len: Option<u32>,
}

/// Result of applying one rule.
pub struct RuleOutcome {
    pub text: String,
    pub occurrences: u64,
    pub severity: Severity,
}

impl RuleOutcome {
    fn unchanged(text: &str) -> Self {
        Self {
            text: text.to_string(),
            occurrences: 0,
            severity: Severity::Info,
        }
    }
}

/// One repair rule: a pure function from text to text plus a label for
/// the FixReport.
pub struct RepairRule {
    pub id: &'static str,
    pub description: &'static str,
    apply: fn(&str, &RepairOptions) -> RuleOutcome,
}

static RULES: &[RepairRule] = &[
    RepairRule {
        id: "open-dollar",
        description: "completed truncated AS $ opening delimiters",
        apply: fix_open_dollar,
    },
    RepairRule {
        id: "close-dollar",
        description: "completed truncated $; closing delimiters",
        apply: fix_close_dollar,
    },
    RepairRule {
        id: "language-placement",
        description: "moved LANGUAGE plpgsql after the function body",
        apply: fix_language_placement,
    },
    RepairRule {
        id: "param-order",
        description: "moved defaulted parameters after required ones",
        apply: fix_param_order,
    },
    RepairRule {
        id: "table-varchar-length",
        description: "bare VARCHAR in RETURNS TABLE needs an explicit length",
        apply: fix_table_varchar,
    },
    RepairRule {
        id: "unbalanced-dollar",
        description: "appended a synthetic closing delimiter to an unterminated body",
        apply: fix_unbalanced_dollar,
    },
];

/// The ordered rule table.
pub fn rules() -> &'static [RepairRule] {
    RULES
}

/// Run every rule in order, threading the text and collecting the report.
pub fn repair(text: &str, options: &RepairOptions) -> (String, FixReport) {
    let mut report = FixReport::new();
    let mut current = text.to_string();

    for rule in RULES {
        let outcome = (rule.apply)(&current, options);
        match outcome.severity {
            Severity::Warning | Severity::Error => {
                report.warn(rule.id, rule.description, outcome.occurrences)
            }
            Severity::Info => report.record(rule.id, rule.description, outcome.occurrences),
        }
        current = outcome.text;
    }

    (current, report)
}

static RE_AS_DOLLAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bAS\s+\$").unwrap());

/// Byte positions of `AS $` openers whose `$` does not complete a valid
/// dollar tag. Shared with the validator.
pub fn incomplete_open_positions(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    RE_AS_DOLLAR
        .find_iter(text)
        .map(|m| m.end() - 1)
        .filter(|&pos| read_dollar_tag(bytes, pos).is_none())
        .collect()
}

fn fix_open_dollar(text: &str, _options: &RepairOptions) -> RuleOutcome {
    let positions = incomplete_open_positions(text);
    if positions.is_empty() {
        return RuleOutcome::unchanged(text);
    }

    let mut out = String::with_capacity(text.len() + positions.len());
    let mut cursor = 0;
    for &pos in &positions {
        out.push_str(&text[cursor..=pos]);
        out.push('$');
        cursor = pos + 1;
    }
    out.push_str(&text[cursor..]);

    RuleOutcome {
        text: out,
        occurrences: positions.len() as u64,
        severity: Severity::Info,
    }
}

/// Byte positions of `$;` closers whose `$` does not terminate a valid
/// dollar tag (`$$`, `$body$`, ...). Shared with the validator.
pub fn incomplete_close_positions(text: &str) -> Vec<usize> {
    let bytes = text.as_bytes();
    let mut positions = Vec::new();

    for i in 0..bytes.len().saturating_sub(1) {
        if bytes[i] != b'$' || bytes[i + 1] != b';' {
            continue;
        }
        // walk back over identifier characters; a '$' on the far side
        // means this already closes a `$tag$` delimiter
        let mut j = i;
        while j > 0 && (bytes[j - 1] == b'_' || bytes[j - 1].is_ascii_alphanumeric()) {
            j -= 1;
        }
        if j > 0 && bytes[j - 1] == b'$' {
            continue;
        }
        positions.push(i);
    }

    positions
}

fn fix_close_dollar(text: &str, _options: &RepairOptions) -> RuleOutcome {
    let positions = incomplete_close_positions(text);
    if positions.is_empty() {
        return RuleOutcome::unchanged(text);
    }

    let mut out = String::with_capacity(text.len() + positions.len() * 20);
    let mut cursor = 0;
    for &pos in &positions {
        out.push_str(&text[cursor..pos]);
        out.push_str("$$ LANGUAGE plpgsql;");
        cursor = pos + 2;
    }
    out.push_str(&text[cursor..]);

    RuleOutcome {
        text: out,
        occurrences: positions.len() as u64,
        severity: Severity::Info,
    }
}

static RE_FUNCTION_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCREATE\s+(?:OR\s+REPLACE\s+)?FUNCTION\b").unwrap());
static RE_LANGUAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bLANGUAGE\s+plpgsql\b").unwrap());

/// Spans of `LANGUAGE plpgsql` clauses sitting between a function header
/// and its `AS $tag$` opener, i.e. before the body instead of after it.
/// Shared with the validator.
pub fn misplaced_language_spans(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();

    for f in RE_FUNCTION_START.find_iter(text) {
        let Some(open) = RE_AS_DOLLAR
            .find_at(text, f.end())
            .map(|m| m.end() - 1)
            .filter(|&pos| read_dollar_tag(bytes, pos).is_some())
        else {
            continue;
        };
        if let Some(m) = RE_LANGUAGE.find(&text[f.end()..open]) {
            spans.push((f.end() + m.start(), f.end() + m.end()));
        }
    }

    spans
}

fn fix_language_placement(text: &str, _options: &RepairOptions) -> RuleOutcome {
    let bytes = text.as_bytes();
    let spans = misplaced_language_spans(text);
    if spans.is_empty() {
        return RuleOutcome::unchanged(text);
    }

    // (start, end, replacement) edits, applied in order
    let mut edits: Vec<(usize, usize, String)> = Vec::new();
    let mut moved = 0u64;

    for &(lang_start, lang_end) in &spans {
        let Some(m) = RE_AS_DOLLAR.find_at(text, lang_end) else {
            continue;
        };
        let open = m.end() - 1;
        let Some(tag) = read_dollar_tag(bytes, open) else {
            continue;
        };

        // matching close: the next byte-identical tag occurrence
        let Some(rel) = text[open + tag.len()..].find(&tag) else {
            // no closing delimiter to move the clause behind; leave the
            // header alone and let the validator report it
            continue;
        };
        let close_end = open + tag.len() + rel + tag.len();

        // widen the deletion over preceding whitespace so the header does
        // not keep a blank line behind
        let mut del_start = lang_start;
        while del_start > 0 && (bytes[del_start - 1] as char).is_whitespace() {
            del_start -= 1;
        }

        edits.push((del_start, lang_end, String::new()));

        let already_placed = text[close_end..]
            .trim_start()
            .to_ascii_uppercase()
            .starts_with("LANGUAGE");
        if !already_placed {
            edits.push((close_end, close_end, " LANGUAGE plpgsql".to_string()));
        }
        moved += 1;
    }

    if moved == 0 {
        return RuleOutcome::unchanged(text);
    }

    edits.sort_by_key(|&(start, _, _)| start);
    let mut out = String::with_capacity(text.len() + 24);
    let mut cursor = 0;
    for (start, end, replacement) in edits {
        out.push_str(&text[cursor..start]);
        out.push_str(&replacement);
        cursor = end;
    }
    out.push_str(&text[cursor..]);

    RuleOutcome {
        text: out,
        occurrences: moved,
        severity: Severity::Info,
    }
}

fn fix_param_order(text: &str, _options: &RepairOptions) -> RuleOutcome {
    let (out, count) = reorder_parameters(text);
    RuleOutcome {
        text: out,
        occurrences: count as u64,
        severity: Severity::Info,
    }
}

static RE_RETURNS_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bRETURNS\s+TABLE\s*\(").unwrap());
static RE_VARCHAR_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bVARCHAR\b").unwrap());

fn fix_table_varchar(text: &str, options: &RepairOptions) -> RuleOutcome {
    let mut bare: Vec<usize> = Vec::new();

    for m in RE_RETURNS_TABLE.find_iter(text) {
        let open = m.end() - 1;
        let Some(close) = find_matching_paren(text, open) else {
            continue;
        };
        for v in RE_VARCHAR_WORD.find_iter(&text[open..close]) {
            let end = open + v.end();
            let followed_by_paren = text[end..close]
                .trim_start()
                .starts_with('(');
            if !followed_by_paren {
                bare.push(end);
            }
        }
    }

    if bare.is_empty() {
        return RuleOutcome::unchanged(text);
    }

    match options.table_varchar_len {
        Some(len) => {
            let mut out = String::with_capacity(text.len() + bare.len() * 5);
            let mut cursor = 0;
            for &pos in &bare {
                out.push_str(&text[cursor..pos]);
                out.push_str(&format!("({})", len));
                cursor = pos;
            }
            out.push_str(&text[cursor..]);
            RuleOutcome {
                text: out,
                occurrences: bare.len() as u64,
                severity: Severity::Info,
            }
        }
        // no silent default: flag for manual review instead of guessing
        None => RuleOutcome {
            text: text.to_string(),
            occurrences: bare.len() as u64,
            severity: Severity::Warning,
        },
    }
}

fn fix_unbalanced_dollar(text: &str, _options: &RepairOptions) -> RuleOutcome {
    let state = scan::final_state(text);
    let Some(tag) = state.dollar_tag else {
        return RuleOutcome::unchanged(text);
    };

    // best-effort guess: close the still-open body at end of input
    let mut out = text.to_string();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&tag);
    out.push('\n');

    RuleOutcome {
        text: out,
        occurrences: 1,
        severity: Severity::Warning,
    }
}
