//! Data type mapping from T-SQL to PostgreSQL.
//!
//! A closed lookup table: every mapping is a pre-compiled pattern, and
//! parenthesized length/precision suffixes are preserved unchanged except
//! where PostgreSQL has no equivalent (`MAX` lengths, `FLOAT(n)`,
//! `VARBINARY(n)`).

use once_cell::sync::Lazy;
use regex::Regex;

/// Type mapper for the MSSQL → PostgreSQL pair.
pub struct TypeMapper;

impl TypeMapper {
    /// Map every T-SQL type occurrence in `text`, returning the rewritten
    /// text and the number of replacements made.
    pub fn tsql_to_postgres(text: &str) -> (String, usize) {
        let mut result = text.to_string();
        let mut count = 0;

        // MAX lengths have no PostgreSQL spelling and fold into TEXT/BYTEA,
        // so they must run before the plain word mappings.
        for (re, replacement) in MAPPINGS.iter() {
            let hits = re.find_iter(&result).count();
            if hits > 0 {
                count += hits;
                result = re.replace_all(&result, *replacement).to_string();
            }
        }

        (result, count)
    }
}

static MAPPINGS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (re(r"(?i)\bNVARCHAR\s*\(\s*MAX\s*\)"), "TEXT"),
        (re(r"(?i)\bVARCHAR\s*\(\s*MAX\s*\)"), "TEXT"),
        (re(r"(?i)\bVARBINARY\s*\(\s*(?:MAX|\d+)\s*\)"), "BYTEA"),
        (re(r"(?i)\bVARBINARY\b"), "BYTEA"),
        (re(r"(?i)\bNVARCHAR\b"), "VARCHAR"),
        (re(r"(?i)\bNCHAR\b"), "CHAR"),
        (re(r"(?i)\bNTEXT\b"), "TEXT"),
        (re(r"(?i)\bIMAGE\b"), "BYTEA"),
        (re(r"(?i)\bDATETIMEOFFSET\b"), "TIMESTAMPTZ"),
        (re(r"(?i)\bDATETIME2\b"), "TIMESTAMP"),
        (re(r"(?i)\bSMALLDATETIME\b"), "TIMESTAMP"),
        (re(r"(?i)\bDATETIME\b"), "TIMESTAMP"),
        (re(r"(?i)\bUNIQUEIDENTIFIER\b"), "UUID"),
        (re(r"(?i)\bBIT\b"), "BOOLEAN"),
        (re(r"(?i)\bSMALLMONEY\b"), "DECIMAL(10,4)"),
        (re(r"(?i)\bMONEY\b"), "DECIMAL(19,4)"),
        (re(r"(?i)\bTINYINT\b"), "SMALLINT"),
        (re(r"(?i)\bFLOAT\s*(?:\(\s*\d+\s*\))?"), "DOUBLE PRECISION"),
        (re(r"(?i)\bINT\b"), "INTEGER"),
    ]
});

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap()
}
