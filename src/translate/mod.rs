//! T-SQL → plpgsql statement translator.
//!
//! Rewrites `CREATE PROCEDURE` definitions into `CREATE OR REPLACE
//! FUNCTION ... $$ ... $$ LANGUAGE plpgsql;` form through an ordered
//! pass pipeline:
//!
//! 1. header parse (name, parameter list)
//! 2. sigil rename via a per-procedure symbol table, built before any
//!    rewriting so a parameter keeps `p_` everywhere it is referenced
//! 3. data type mapping (closed lookup table)
//! 4. block-aware control-flow rewrite, then `SET @x =` → `:=`
//! 5. built-in function mapping
//! 6. transaction keyword rewrite
//! 7. TRY/CATCH replacement with a marker comment (no safe automatic
//!    mapping exists)
//! 8. dollar-quote wrapping and reassembly
//!
//! Statements that are not procedure definitions pass through unchanged;
//! a pass that cannot confidently match makes no change and leaves the
//! gap for the validator to report.

mod control_flow;
mod symbols;
mod types;

pub use symbols::{to_snake_case, Declaration, SymbolKind, SymbolTable};
pub use types::TypeMapper;

use crate::report::FixReport;
use crate::scan::{rewrite_outside_quotes, QuoteTracker};
use crate::signature::{split_top_level, FunctionSignature, ParamMode, Parameter};
use once_cell::sync::Lazy;
use regex::Regex;

/// Rewritten text plus the log of rules that fired.
#[derive(Debug)]
pub struct TranslateOutput {
    pub text: String,
    pub report: FixReport,
}

static RE_CREATE_PROC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)^\s*CREATE\s+(?:OR\s+ALTER\s+)?PROC(?:EDURE)?\s+(?:\[?(?P<schema>[A-Za-z_][A-Za-z0-9_]*)\]?\s*\.\s*)?\[?(?P<name>[A-Za-z_][A-Za-z0-9_]*)\]?",
    )
    .unwrap()
});

static RE_PROC_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bCREATE\s+(?:OR\s+ALTER\s+)?PROC(?:EDURE)?\b").unwrap());

static RE_GO: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^\s*GO\s*;?\s*$").unwrap());

static RE_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^@(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s+(?P<rest>.+)$").unwrap()
});

static RE_OUTPUT_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?:OUTPUT|OUT)\s*$").unwrap());

static RE_OUTER_BEGIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^BEGIN\b").unwrap());
static RE_OUTER_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bEND$").unwrap());

static RE_SET_ASSIGN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bSET\s+(?P<var>(?:v_|p_)[A-Za-z0-9_]+)\s*=").unwrap()
});

static RE_RETURN_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bRETURN[ \t]+[^;\s]").unwrap());

static BUILTINS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (re(r"(?i)\bISNULL\s*\("), "COALESCE("),
        (re(r"(?i)\bGETDATE\s*\(\s*\)"), "NOW()"),
        (re(r"(?i)\bGETUTCDATE\s*\(\s*\)"), "NOW()"),
        (re(r"(?i)\bNEWID\s*\(\s*\)"), "gen_random_uuid()"),
        (re(r"(?i)\bLEN\s*\("), "LENGTH("),
        (re(r"(?i)\bCHARINDEX\s*\("), "POSITION("),
        (re(r"(?i)\bSUBSTRING\s*\("), "SUBSTR("),
        (re(r"(?i)\bBREAK\s*;"), "EXIT;"),
    ]
});

static TRANSACTIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (re(r"(?i)\bBEGIN\s+TRAN(?:SACTION)?\b\s*;?"), "BEGIN;"),
        (re(r"(?i)\bCOMMIT\s+TRAN(?:SACTION)?\b\s*;?"), "COMMIT;"),
        (re(r"(?i)\bROLLBACK\s+TRAN(?:SACTION)?\b\s*;?"), "ROLLBACK;"),
    ]
});

static RE_TRY_CATCH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)BEGIN\s+TRY\b.*?END\s+TRY\s*BEGIN\s+CATCH\b.*?END\s+CATCH\s*;?").unwrap()
});

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}

/// Whether a statement looks like a T-SQL procedure definition.
pub fn is_procedure_definition(sql: &str) -> bool {
    RE_CREATE_PROC.is_match(sql)
}

/// Translate a whole document: procedure definitions are rewritten, every
/// other batch passes through unchanged.
///
/// T-SQL bodies are not dollar-quoted, so the generic statement splitter
/// would cut a procedure apart at its internal semicolons. Documents are
/// segmented the T-SQL way instead: `GO` lines separate batches, and a
/// `CREATE PROC` inside a batch starts a procedure segment that runs to
/// the next one.
pub fn translate_document(sql: &str) -> TranslateOutput {
    let mut report = FixReport::new();
    let mut parts: Vec<String> = Vec::new();
    let mut go_lines: u64 = 0;

    for batch in split_batches(sql, &mut go_lines) {
        for segment in split_procedure_segments(&batch) {
            let segment = segment.trim();
            if segment.is_empty() {
                continue;
            }
            if is_procedure_definition(segment) {
                parts.push(translate_procedure(segment, &mut report));
            } else {
                parts.push(segment.to_string());
            }
        }
    }

    report.record("go-removed", "dropped T-SQL GO batch separators", go_lines);

    TranslateOutput {
        text: parts.join("\n\n"),
        report,
    }
}

/// Split a script on `GO` batch separator lines, dropping the separators.
fn split_batches(sql: &str, go_lines: &mut u64) -> Vec<String> {
    let mut batches = vec![String::new()];

    for line in sql.lines() {
        if RE_GO.is_match(line) {
            *go_lines += 1;
            batches.push(String::new());
        } else {
            let current = batches.last_mut().unwrap();
            current.push_str(line);
            current.push('\n');
        }
    }

    batches
}

/// Cut a batch at every `CREATE PROC` occurrence so each procedure is
/// translated on its own even when separators are missing.
fn split_procedure_segments(batch: &str) -> Vec<&str> {
    let starts: Vec<usize> = RE_PROC_START.find_iter(batch).map(|m| m.start()).collect();
    if starts.is_empty() {
        return vec![batch];
    }

    let mut segments = Vec::with_capacity(starts.len() + 1);
    if starts[0] > 0 {
        segments.push(&batch[..starts[0]]);
    }
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(batch.len());
        segments.push(&batch[start..end]);
    }
    segments
}

/// Translate one `CREATE PROCEDURE` statement. When the header cannot be
/// parsed the statement is returned unchanged with a warning, preferring
/// under-transformation over corrupting text.
pub fn translate_procedure(sql: &str, report: &mut FixReport) -> String {
    let caps = match RE_CREATE_PROC.captures(sql) {
        Some(caps) => caps,
        None => return sql.to_string(),
    };
    let name = caps.name("name").unwrap().as_str().to_string();
    let header_end = caps.get(0).unwrap().end();

    let (as_start, as_end) = match find_top_level_keyword(sql, header_end, "AS") {
        Some(span) => span,
        None => {
            report.warn(
                "create-procedure",
                "procedure header without an AS keyword was left unchanged",
                1,
            );
            return sql.to_string();
        }
    };

    let mut table = SymbolTable::new();
    let mut type_hits = 0;

    // pass 1+2a: header and parameter list; the symbol table sees every
    // parameter before any body text is rewritten
    let raw_params = strip_param_parens(sql[header_end..as_start].trim());
    let mut parameters = Vec::new();
    for raw in split_top_level(raw_params, b',') {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }
        match parse_tsql_parameter(raw, &mut table, &mut type_hits) {
            Some(param) => parameters.push(param),
            None => report.warn(
                "parameter-parse",
                "unparseable parameter declaration was dropped from the signature",
                1,
            ),
        }
    }

    // pass 2b: hoist DECLARE statements, completing the symbol table
    let body = sql[as_end..].trim();
    let (body, had_wrapper) = strip_outer_begin_end(body);
    let (body, declarations) = symbols::extract_declarations(&body, &mut table);
    report.record(
        "declare-hoist",
        "hoisted DECLARE statements into the plpgsql DECLARE section",
        declarations.len() as u64,
    );
    let declarations: Vec<Declaration> = declarations
        .into_iter()
        .map(|mut decl| {
            let (mapped, hits) = TypeMapper::tsql_to_postgres(&decl.data_type);
            type_hits += hits;
            decl.data_type = mapped;
            decl.default = decl
                .default
                .take()
                .map(|init| symbols::rewrite_sigils(&init, &table, report))
                .map(|init| {
                    let mut out = init;
                    for (pattern, replacement) in BUILTINS.iter() {
                        out = pattern.replace_all(&out, *replacement).to_string();
                    }
                    out
                });
            decl
        })
        .collect();

    // pass 2c: rename every sigil reference through the table
    let body = symbols::rewrite_sigils(&body, &table, report);

    // pass 3: data types in the body (CAST targets and friends)
    let body = rewrite_outside_quotes(&body, |span| {
        let (mapped, hits) = TypeMapper::tsql_to_postgres(span);
        type_hits += hits;
        mapped
    });

    // pass 4: control flow, then variable assignment form
    let (body, flow_edits) = control_flow::rewrite(&body);
    report.record(
        "control-flow",
        "rewrote IF/ELSE and WHILE blocks into plpgsql form",
        flow_edits as u64,
    );
    let mut assign_hits = 0;
    let body = rewrite_outside_quotes(&body, |span| {
        assign_hits += RE_SET_ASSIGN.find_iter(span).count();
        RE_SET_ASSIGN.replace_all(span, "$var :=").into_owned()
    });
    report.record(
        "set-assignment",
        "rewrote SET variable assignments to := form",
        assign_hits as u64,
    );
    let (body, select_hits) = rewrite_select_assignments(&body);
    report.record(
        "select-assignment",
        "rewrote SELECT variable capture to SELECT ... INTO",
        select_hits as u64,
    );

    // pass 5: built-in function names
    let mut builtin_hits = 0;
    let body = rewrite_outside_quotes(&body, |span| {
        let mut out = span.to_string();
        for (pattern, replacement) in BUILTINS.iter() {
            builtin_hits += pattern.find_iter(&out).count();
            out = pattern.replace_all(&out, *replacement).to_string();
        }
        out
    });
    report.record("builtin-map", "mapped T-SQL built-in function names", builtin_hits as u64);

    // pass 6: transaction keywords
    let mut txn_hits = 0;
    let body = rewrite_outside_quotes(&body, |span| {
        let mut out = span.to_string();
        for (pattern, replacement) in TRANSACTIONS.iter() {
            txn_hits += pattern.find_iter(&out).count();
            out = pattern.replace_all(&out, *replacement).to_string();
        }
        out
    });
    report.record("transaction-keywords", "rewrote transaction keywords", txn_hits as u64);

    // pass 7: TRY/CATCH has no safe 1:1 mapping; replace the block with a
    // marker and carry the original commented out for manual follow-up
    let mut try_hits = 0;
    let body = RE_TRY_CATCH
        .replace_all(&body, |caps: &regex::Captures<'_>| {
            try_hits += 1;
            comment_out_block(caps.get(0).unwrap().as_str())
        })
        .into_owned();
    report.warn(
        "try-catch",
        "TRY/CATCH blocks require a manual plpgsql EXCEPTION rewrite",
        try_hits,
    );

    report.record("type-map", "mapped T-SQL data types", type_hits as u64);

    let return_values = count_outside_quotes(&body, &RE_RETURN_VALUE);
    report.warn(
        "return-value",
        "RETURN with a value has no equivalent in a VOID function",
        return_values as u64,
    );

    // pass 8: reassemble with dollar quoting
    let signature = FunctionSignature {
        name,
        parameters,
        returns_clause: Some("VOID".to_string()),
        language: Some("plpgsql".to_string()),
    };
    report.record(
        "create-procedure",
        "rewrote CREATE PROCEDURE as CREATE OR REPLACE FUNCTION",
        1,
    );
    report.record("dollar-wrap", "wrapped function bodies in dollar quoting", 1);
    if !had_wrapper {
        report.record(
            "begin-end-wrap",
            "synthesized a BEGIN/END wrapper around a bare body",
            1,
        );
    }

    assemble(&signature, &declarations, &body)
}

fn assemble(signature: &FunctionSignature, declarations: &[Declaration], body: &str) -> String {
    let mut out = format!(
        "CREATE OR REPLACE FUNCTION {}({})\n",
        signature.name,
        signature.render_parameters()
    );
    if !signature.has_inout() {
        out.push_str("RETURNS VOID\n");
    }
    out.push_str("AS $$\n");

    if !declarations.is_empty() {
        out.push_str("DECLARE\n");
        for decl in declarations {
            out.push_str("    ");
            out.push_str(&decl.name);
            out.push(' ');
            out.push_str(&decl.data_type);
            if let Some(init) = &decl.default {
                out.push_str(" := ");
                out.push_str(init);
            }
            out.push_str(";\n");
        }
    }

    out.push_str("BEGIN\n");
    let body = body.trim();
    if !body.is_empty() {
        out.push_str(body);
        if !body.ends_with(';') {
            out.push(';');
        }
        out.push('\n');
    }
    out.push_str("END;\n$$ LANGUAGE plpgsql;");
    out
}

fn parse_tsql_parameter(
    raw: &str,
    table: &mut SymbolTable,
    type_hits: &mut usize,
) -> Option<Parameter> {
    let caps = RE_PARAM.captures(raw)?;
    let raw_name = caps.name("name").unwrap().as_str();
    let mut rest = caps.name("rest").unwrap().as_str().trim().to_string();

    let mode = if RE_OUTPUT_SUFFIX.is_match(&rest) {
        rest = RE_OUTPUT_SUFFIX.replace(&rest, "").into_owned();
        ParamMode::InOut
    } else {
        ParamMode::In
    };

    let parts = split_top_level(&rest, b'=');
    let raw_type = parts[0].trim();
    if raw_type.is_empty() {
        return None;
    }
    let (data_type, hits) = TypeMapper::tsql_to_postgres(raw_type);
    *type_hits += hits;

    let default = parts
        .get(1)
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .map(|d| {
            let mut out = d;
            for (pattern, replacement) in BUILTINS.iter() {
                out = pattern.replace_all(&out, *replacement).to_string();
            }
            out
        });

    let name = table.insert_parameter(raw_name);
    Some(Parameter {
        name,
        data_type,
        mode,
        default,
    })
}

/// Strip one pair of enclosing parens from a parameter list, tolerating
/// both `CREATE PROCEDURE p (@a INT)` and the bare T-SQL form. The pair
/// is only stripped when the opening paren matches the final one.
fn strip_param_parens(text: &str) -> &str {
    let trimmed = text.trim();
    if !(trimmed.starts_with('(') && trimmed.ends_with(')')) {
        return trimmed;
    }

    let bytes = trimmed.as_bytes();
    let mut tracker = QuoteTracker::new();
    let mut depth: i32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        if !tracker.in_quoted_region() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 && i != bytes.len() - 1 {
                        return trimmed;
                    }
                }
                _ => {}
            }
        }
        i += tracker.step(bytes, i);
    }

    trimmed[1..trimmed.len() - 1].trim()
}

/// Strip the procedure's outer `BEGIN ... END` pair so later passes can
/// never mistake it for control flow. Returns whether a wrapper was
/// present; a fresh one is synthesized at assembly either way.
fn strip_outer_begin_end(body: &str) -> (String, bool) {
    let trimmed = body.trim();
    let without_semi = trimmed
        .strip_suffix(';')
        .map(str::trim_end)
        .unwrap_or(trimmed);

    if let Some(m) = RE_OUTER_BEGIN.find(without_semi) {
        let after = without_semi[m.end()..].trim_start();
        let opens_special = ["TRY", "CATCH", "TRAN", "TRANSACTION"]
            .iter()
            .any(|kw| starts_with_keyword(after, kw));
        if !opens_special {
            if let Some(end) = RE_OUTER_END.find(without_semi) {
                if end.start() > m.end() {
                    return (without_semi[m.end()..end.start()].trim().to_string(), true);
                }
            }
        }
    }

    (without_semi.to_string(), false)
}

fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() >= keyword.len()
        && bytes[..keyword.len()].eq_ignore_ascii_case(keyword.as_bytes())
        && bytes.get(keyword.len()).map_or(true, |&b| !is_word_byte(b))
}

/// Find `word` at paren depth zero outside quotes, starting at `from`.
/// Returns the byte span of the match.
fn find_top_level_keyword(sql: &str, from: usize, word: &str) -> Option<(usize, usize)> {
    let bytes = sql.as_bytes();
    let mut tracker = QuoteTracker::new();
    let mut i = 0;
    while i < from {
        i += tracker.step(bytes, i);
    }

    let mut depth: i32 = 0;
    while i < bytes.len() {
        if !tracker.in_quoted_region() {
            match bytes[i] {
                b'(' => depth += 1,
                b')' => depth = (depth - 1).max(0),
                _ => {}
            }
            let end = i + word.len();
            if depth == 0
                && end <= bytes.len()
                && bytes[i..end].eq_ignore_ascii_case(word.as_bytes())
                && (i == 0 || !is_word_byte(bytes[i - 1]))
                && (end == bytes.len() || !is_word_byte(bytes[end]))
            {
                return Some((i, end));
            }
        }
        i += tracker.step(bytes, i);
    }

    None
}

fn is_word_byte(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

static RE_SELECT_ASSIGN_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(?P<var>(?:v_|p_)[A-Za-z0-9_]+)\s*=\s*(?P<expr>.+)$").unwrap()
});

/// Rewrite `SELECT @x = expr [, @y = expr2] FROM ...` (sigils already
/// renamed) into `SELECT expr, expr2 INTO v_x, v_y FROM ...`. A select
/// list that mixes assignments with plain columns is left alone.
fn rewrite_select_assignments(body: &str) -> (String, usize) {
    let mut count = 0;
    let rebuilt: Vec<String> = split_top_level(body, b';')
        .iter()
        .map(|segment| match try_select_into(segment) {
            Some(new) => {
                count += 1;
                new
            }
            None => segment.to_string(),
        })
        .collect();
    (rebuilt.join(";"), count)
}

fn try_select_into(segment: &str) -> Option<String> {
    let indent_len = segment.len() - segment.trim_start().len();
    let (indent, rest) = segment.split_at(indent_len);
    if rest.len() < 7 || !rest.as_bytes()[..6].eq_ignore_ascii_case(b"SELECT") {
        return None;
    }
    if is_word_byte(rest.as_bytes()[6]) {
        return None;
    }

    let list_region = &rest[6..];
    let (list, tail) = match find_top_level_keyword(list_region, 0, "FROM") {
        Some((start, _)) => (&list_region[..start], list_region[start..].trim_end()),
        None => (list_region, ""),
    };

    let mut vars = Vec::new();
    let mut exprs = Vec::new();
    for item in split_top_level(list, b',') {
        let caps = RE_SELECT_ASSIGN_ITEM.captures(item.trim())?;
        vars.push(caps["var"].to_string());
        exprs.push(caps["expr"].trim().to_string());
    }
    if vars.is_empty() {
        return None;
    }

    let mut out = format!("{}SELECT {} INTO {}", indent, exprs.join(", "), vars.join(", "));
    if !tail.is_empty() {
        out.push(' ');
        out.push_str(tail);
    }
    Some(out)
}

fn count_outside_quotes(text: &str, pattern: &Regex) -> usize {
    let mut count = 0;
    rewrite_outside_quotes(text, |span| {
        count += pattern.find_iter(span).count();
        span.to_string()
    });
    count
}

fn comment_out_block(block: &str) -> String {
    let mut out = String::with_capacity(block.len() + 128);
    out.push_str("-- FIXME: TRY/CATCH has no automatic plpgsql translation; rewrite as an\n");
    out.push_str("-- EXCEPTION handler. Original block:\n");
    for line in block.lines() {
        out.push_str("-- ");
        out.push_str(line);
        out.push('\n');
    }
    out
}
