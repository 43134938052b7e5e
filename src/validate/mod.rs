//! Structural validation of PostgreSQL function text.
//!
//! Post-pass checker for translated or repaired output:
//! - dollar-quote balance (every opened body is closed)
//! - function count vs. LANGUAGE clause count parity
//! - residual truncated `AS $` openers
//! - `LANGUAGE plpgsql` still sitting before its `AS $$`
//! - function bodies without BEGIN/END
//!
//! Advisory only: it never mutates text and never fails. Callers decide
//! whether to accept the text, write a `.corrected` side file, or abort.

use crate::repair::{incomplete_open_positions, misplaced_language_spans};
use crate::report::Severity;
use crate::scan::QuoteTracker;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// What kind of structural problem was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    UnbalancedDollarQuote,
    FunctionLanguageMismatch,
    MissingBeginEnd,
    IncompleteDollarOpen,
    MisplacedLanguageClause,
}

impl IssueKind {
    pub fn code(&self) -> &'static str {
        match self {
            IssueKind::UnbalancedDollarQuote => "unbalanced-dollar-quote",
            IssueKind::FunctionLanguageMismatch => "function-language-mismatch",
            IssueKind::MissingBeginEnd => "missing-begin-end",
            IssueKind::IncompleteDollarOpen => "incomplete-dollar-open",
            IssueKind::MisplacedLanguageClause => "misplaced-language-clause",
        }
    }
}

/// A structural issue found in the text.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub severity: Severity,
    pub detail: String,
}

impl ValidationIssue {
    fn error(kind: IssueKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Error,
            detail: detail.into(),
        }
    }

    fn warning(kind: IssueKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            severity: Severity::Warning,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.kind.code(), self.detail)
    }
}

/// Validation result with summary counts for CLI display.
#[derive(Debug, Serialize)]
pub struct ValidationSummary {
    pub issues: Vec<ValidationIssue>,
    pub errors: usize,
    pub warnings: usize,
}

impl ValidationSummary {
    fn new(issues: Vec<ValidationIssue>) -> Self {
        let errors = issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count();
        let warnings = issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count();
        Self {
            issues,
            errors,
            warnings,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

static RE_FUNCTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCREATE\s+(?:OR\s+REPLACE\s+)?FUNCTION\b").unwrap());
static RE_CLOSE_LANGUAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\$\s*LANGUAGE\s+plpgsql\b").unwrap());
static RE_BEGIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bBEGIN\b").unwrap());
static RE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bEND\b").unwrap());

/// Run every structural check over the text.
pub fn validate(text: &str) -> ValidationSummary {
    let mut issues = Vec::new();

    check_dollar_balance(text, &mut issues);
    check_function_language_parity(text, &mut issues);
    check_incomplete_opens(text, &mut issues);
    check_misplaced_language(text, &mut issues);
    check_begin_end(text, &mut issues);

    ValidationSummary::new(issues)
}

fn check_dollar_balance(text: &str, issues: &mut Vec<ValidationIssue>) {
    let bytes = text.as_bytes();
    let mut tracker = QuoteTracker::new();
    let mut i = 0;
    while i < bytes.len() {
        i += tracker.step(bytes, i);
    }
    if let Some(tag) = &tracker.state().dollar_tag {
        issues.push(ValidationIssue::error(
            IssueKind::UnbalancedDollarQuote,
            format!("dollar-quoted body opened with {} is never closed", tag),
        ));
    }
}

fn check_function_language_parity(text: &str, issues: &mut Vec<ValidationIssue>) {
    let functions = RE_FUNCTION.find_iter(text).count();
    let languages = RE_CLOSE_LANGUAGE.find_iter(text).count();
    if functions != languages {
        issues.push(ValidationIssue::error(
            IssueKind::FunctionLanguageMismatch,
            format!(
                "{} function definition{} but {} closing LANGUAGE clause{}",
                functions,
                if functions == 1 { "" } else { "s" },
                languages,
                if languages == 1 { "" } else { "s" },
            ),
        ));
    }
}

fn check_incomplete_opens(text: &str, issues: &mut Vec<ValidationIssue>) {
    for pos in incomplete_open_positions(text) {
        issues.push(ValidationIssue::error(
            IssueKind::IncompleteDollarOpen,
            format!("AS $ at byte {} does not open a valid dollar quote", pos),
        ));
    }
}

fn check_misplaced_language(text: &str, issues: &mut Vec<ValidationIssue>) {
    for (start, _) in misplaced_language_spans(text) {
        issues.push(ValidationIssue::error(
            IssueKind::MisplacedLanguageClause,
            format!(
                "LANGUAGE plpgsql at byte {} precedes its function's AS $$",
                start
            ),
        ));
    }
}

/// Each plpgsql body (a dollar-quoted region followed by LANGUAGE
/// plpgsql) must carry a BEGIN/END pair.
fn check_begin_end(text: &str, issues: &mut Vec<ValidationIssue>) {
    for (index, body) in dollar_bodies(text).iter().enumerate() {
        let followed_by_plpgsql = body
            .after
            .trim_start()
            .to_ascii_uppercase()
            .starts_with("LANGUAGE PLPGSQL");
        if !followed_by_plpgsql {
            continue;
        }
        let has_begin = RE_BEGIN.is_match(&body.content);
        let has_end = RE_END.is_match(&body.content);
        if !has_begin || !has_end {
            issues.push(ValidationIssue::warning(
                IssueKind::MissingBeginEnd,
                format!("function body #{} has no BEGIN/END block", index + 1),
            ));
        }
    }
}

struct DollarBody {
    content: String,
    after: String,
}

/// Collect every closed dollar-quoted region with the text that follows
/// its closing delimiter.
fn dollar_bodies(text: &str) -> Vec<DollarBody> {
    let bytes = text.as_bytes();
    let mut tracker = QuoteTracker::new();
    let mut bodies = Vec::new();
    let mut open: Option<usize> = None;
    let mut i = 0;

    while i < bytes.len() {
        let was_open = tracker.state().dollar_tag.is_some();
        let n = tracker.step(bytes, i);
        let now_open = tracker.state().dollar_tag.is_some();

        if !was_open && now_open {
            open = Some(i + n);
        } else if was_open && !now_open {
            if let Some(start) = open.take() {
                bodies.push(DollarBody {
                    content: text[start..i].to_string(),
                    after: text[i + n..].chars().take(40).collect(),
                });
            }
        }
        i += n;
    }

    bodies
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN: &str = "CREATE OR REPLACE FUNCTION f() RETURNS INT AS $$\nBEGIN\n  RETURN 1;\nEND;\n$$ LANGUAGE plpgsql;";

    #[test]
    fn test_clean_text_has_no_issues() {
        let summary = validate(CLEAN);
        assert!(summary.is_clean(), "{:?}", summary.issues);
    }

    #[test]
    fn test_unbalanced_dollar_quote() {
        let summary = validate("CREATE FUNCTION f() RETURNS INT AS $$\nBEGIN RETURN 1; END;");
        assert!(summary
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::UnbalancedDollarQuote));
        assert!(summary.has_errors());
    }

    #[test]
    fn test_function_language_mismatch() {
        let sql = "CREATE OR REPLACE FUNCTION f() RETURNS INT AS $$ BEGIN RETURN 1; END; $$;";
        let summary = validate(sql);
        assert!(summary
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::FunctionLanguageMismatch));
    }

    #[test]
    fn test_incomplete_dollar_open() {
        let summary = validate("CREATE FUNCTION f() RETURNS INT AS $\nBEGIN END;");
        assert!(summary
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::IncompleteDollarOpen));
    }

    #[test]
    fn test_misplaced_language_clause() {
        let sql = "CREATE FUNCTION f() RETURNS INT LANGUAGE plpgsql AS $$ BEGIN RETURN 1; END; $$;";
        let summary = validate(sql);
        assert!(summary
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::MisplacedLanguageClause));
    }

    #[test]
    fn test_missing_begin_end() {
        let sql = "CREATE OR REPLACE FUNCTION f() RETURNS INT AS $$\n  SELECT 1;\n$$ LANGUAGE plpgsql;";
        let summary = validate(sql);
        let issue = summary
            .issues
            .iter()
            .find(|i| i.kind == IssueKind::MissingBeginEnd)
            .unwrap();
        assert_eq!(issue.severity, Severity::Warning);
    }

    #[test]
    fn test_sql_language_body_needs_no_begin() {
        let sql = "CREATE OR REPLACE FUNCTION f() RETURNS INT AS $$ SELECT 1; $$ LANGUAGE sql;";
        let summary = validate(sql);
        assert!(!summary
            .issues
            .iter()
            .any(|i| i.kind == IssueKind::MissingBeginEnd));
    }

    #[test]
    fn test_validator_never_mutates() {
        // validate returns issues only; re-validating gives the same result
        let sql = "CREATE FUNCTION f() RETURNS INT AS $\nBEGIN END;";
        let first = validate(sql);
        let second = validate(sql);
        assert_eq!(first.issues.len(), second.issues.len());
    }

    #[test]
    fn test_two_clean_functions() {
        let sql = format!("{}\n\n{}", CLEAN, CLEAN.replace("f()", "g()"));
        let summary = validate(&sql);
        assert!(summary.is_clean(), "{:?}", summary.issues);
    }
}
