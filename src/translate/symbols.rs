//! Per-procedure symbol table for `@sigil` renaming.
//!
//! T-SQL uses one sigil for parameters and local variables, so every
//! `@name` occurrence must be classified by its origin before anything
//! is rewritten: parameters become `p_<name>`, declared variables
//! `v_<name>`, and a parameter keeps its `p_` prefix everywhere it is
//! referenced in the body. The table is built once per procedure from
//! the parameter list and the DECLARE statements; only then does the
//! rewrite run.

use crate::report::FixReport;
use crate::scan::rewrite_outside_quotes;
use ahash::AHashMap;
use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Parameter,
    Variable,
}

/// Maps the original sigil name (case-insensitive, without `@`) to its
/// classification and PostgreSQL replacement.
#[derive(Debug, Default)]
pub struct SymbolTable {
    entries: AHashMap<String, (SymbolKind, String)>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parameter name (with or without the leading `@`) and
    /// return its `p_` replacement.
    pub fn insert_parameter(&mut self, raw: &str) -> String {
        self.insert(raw, SymbolKind::Parameter)
    }

    /// Register a declared variable and return its `v_` replacement.
    /// A name already registered as a parameter keeps its parameter
    /// classification.
    pub fn insert_variable(&mut self, raw: &str) -> String {
        let key = normalize(raw);
        if let Some((SymbolKind::Parameter, renamed)) = self.entries.get(&key) {
            return renamed.clone();
        }
        self.insert(raw, SymbolKind::Variable)
    }

    fn insert(&mut self, raw: &str, kind: SymbolKind) -> String {
        let key = normalize(raw);
        let prefix = match kind {
            SymbolKind::Parameter => "p_",
            SymbolKind::Variable => "v_",
        };
        let renamed = format!("{}{}", prefix, to_snake_case(key.trim_start_matches('@')));
        self.entries.insert(key, (kind, renamed.clone()));
        renamed
    }

    pub fn resolve(&self, raw: &str) -> Option<&str> {
        self.entries
            .get(&normalize(raw))
            .map(|(_, renamed)| renamed.as_str())
    }

    pub fn kind_of(&self, raw: &str) -> Option<SymbolKind> {
        self.entries.get(&normalize(raw)).map(|(kind, _)| *kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize(raw: &str) -> String {
    let name = raw.trim().trim_start_matches('@');
    format!("@{}", name.to_ascii_lowercase())
}

/// Convert a T-SQL identifier to snake_case: `customerId` →
/// `customer_id`, `OrderTotal` → `order_total`. Existing underscores and
/// all-lowercase names pass through unchanged.
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let chars: Vec<char> = name.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev_lower = i > 0 && chars[i - 1].is_ascii_lowercase();
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            let prev_is_sep = i == 0 || chars[i - 1] == '_';
            if !prev_is_sep && (prev_lower || next_lower) {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }

    out
}

/// A local variable hoisted out of the body into the plpgsql DECLARE
/// section. Type and initializer are carried verbatim; the caller maps
/// types and renames sigils afterwards.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    pub data_type: String,
    pub default: Option<String>,
}

fn is_word_byte(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

/// Remove every `DECLARE @x TYPE [= expr][, ...];` statement from the
/// body, registering each variable in the symbol table and returning the
/// body without the declarations plus the hoisted list in source order.
pub fn extract_declarations(
    body: &str,
    table: &mut SymbolTable,
) -> (String, Vec<Declaration>) {
    let bytes = body.as_bytes();
    let mut tracker = crate::scan::QuoteTracker::new();
    let mut out = String::with_capacity(body.len());
    let mut decls = Vec::new();
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        let at_declare = !tracker.in_quoted_region()
            && (i == 0 || !is_word_byte(bytes[i - 1]))
            && bytes.len() - i >= 7
            && bytes[i..i + 7].eq_ignore_ascii_case(b"DECLARE")
            && bytes.get(i + 7).map_or(true, |&b| !is_word_byte(b));

        if at_declare {
            out.push_str(&body[copied..i]);

            // scan to the terminating ';' with the same tracker
            let mut j = i + 7;
            let mut end = bytes.len();
            while j < bytes.len() {
                if !tracker.in_quoted_region() && bytes[j] == b';' {
                    end = j + 1;
                    break;
                }
                j += tracker.step(bytes, j);
            }

            let list_end = if end > i + 7 && bytes[end - 1] == b';' {
                end - 1
            } else {
                end
            };
            for item in crate::signature::split_top_level(&body[i + 7..list_end], b',') {
                if let Some(decl) = parse_declaration_item(item, table) {
                    decls.push(decl);
                }
            }

            copied = end;
            i = end;
            continue;
        }

        i += tracker.step(bytes, i);
    }

    out.push_str(&body[copied..]);
    (out, decls)
}

fn parse_declaration_item(item: &str, table: &mut SymbolTable) -> Option<Declaration> {
    let item = item.trim();
    let caps = RE_DECL_ITEM.captures(item)?;
    let raw_name = caps.name("name").unwrap().as_str();
    let rest = caps.name("rest").unwrap().as_str();

    let parts = crate::signature::split_top_level(rest, b'=');
    let data_type = parts[0].trim().to_string();
    let default = parts.get(1).map(|d| d.trim().to_string()).filter(|d| !d.is_empty());

    if data_type.is_empty() {
        return None;
    }

    let name = table.insert_variable(raw_name);
    Some(Declaration {
        name,
        data_type,
        default,
    })
}

static RE_DECL_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^@(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s+(?P<rest>.+)$").unwrap()
});

static RE_SIGIL: Lazy<Regex> = Lazy::new(|| Regex::new(r"@[A-Za-z_][A-Za-z0-9_]*").unwrap());

/// Rewrite every `@name` reference outside string literals using the
/// symbol table. References to names in neither the parameter list nor a
/// DECLARE fall back to a `v_` rename and are flagged for review.
pub fn rewrite_sigils(text: &str, table: &SymbolTable, report: &mut FixReport) -> String {
    let mut renamed: u64 = 0;
    let mut unknown: u64 = 0;

    let out = rewrite_outside_quotes(text, |span| {
        RE_SIGIL
            .replace_all(span, |caps: &regex::Captures<'_>| {
                let raw = caps.get(0).unwrap().as_str();
                renamed += 1;
                match table.resolve(raw) {
                    Some(name) => name.to_string(),
                    None => {
                        unknown += 1;
                        format!("v_{}", to_snake_case(raw.trim_start_matches('@')))
                    }
                }
            })
            .into_owned()
    });

    report.record("sigil-rename", "renamed @-prefixed parameters and variables", renamed);
    report.warn(
        "unknown-variable",
        "renamed @-references with no matching parameter or DECLARE",
        unknown,
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("customerId"), "customer_id");
        assert_eq!(to_snake_case("OrderTotal"), "order_total");
        assert_eq!(to_snake_case("name"), "name");
        assert_eq!(to_snake_case("already_snake"), "already_snake");
        assert_eq!(to_snake_case("HTMLBody"), "html_body");
        assert_eq!(to_snake_case("ID"), "id");
    }

    #[test]
    fn test_parameter_keeps_prefix_over_variable() {
        let mut table = SymbolTable::new();
        table.insert_parameter("@customerId");
        // a later DECLARE of the same name must not downgrade it
        let renamed = table.insert_variable("@customerId");
        assert_eq!(renamed, "p_customer_id");
        assert_eq!(table.kind_of("@customerId"), Some(SymbolKind::Parameter));
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let mut table = SymbolTable::new();
        table.insert_parameter("@CustomerId");
        assert_eq!(table.resolve("@customerid"), Some("p_customer_id"));
        assert_eq!(table.resolve("@CUSTOMERID"), Some("p_customer_id"));
    }

    #[test]
    fn test_rewrite_uses_origin_not_position() {
        let mut table = SymbolTable::new();
        table.insert_parameter("@customerId");
        table.insert_variable("@total");

        let mut report = FixReport::new();
        let out = rewrite_sigils(
            "SELECT @total FROM orders WHERE id = @customerId",
            &table,
            &mut report,
        );
        assert_eq!(out, "SELECT v_total FROM orders WHERE id = p_customer_id");
    }

    #[test]
    fn test_sigil_inside_string_untouched() {
        let table = SymbolTable::new();
        let mut report = FixReport::new();
        let out = rewrite_sigils("SELECT '@notAVariable'", &table, &mut report);
        assert_eq!(out, "SELECT '@notAVariable'");
        assert!(report.is_empty());
    }

    #[test]
    fn test_unknown_reference_falls_back_to_variable() {
        let table = SymbolTable::new();
        let mut report = FixReport::new();
        let out = rewrite_sigils("SET @mystery = 1", &table, &mut report);
        assert_eq!(out, "SET v_mystery = 1");
        assert_eq!(report.warning_count(), 1);
    }

    #[test]
    fn test_extract_single_declaration() {
        let mut table = SymbolTable::new();
        let (body, decls) =
            extract_declarations("DECLARE @total INT;\nSET @total = 0;", &mut table);
        assert_eq!(body.trim(), "SET @total = 0;");
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "v_total");
        assert_eq!(decls[0].data_type, "INT");
        assert!(decls[0].default.is_none());
    }

    #[test]
    fn test_extract_declaration_with_initializer() {
        let mut table = SymbolTable::new();
        let (_, decls) = extract_declarations("DECLARE @count INT = 10;", &mut table);
        assert_eq!(decls[0].default.as_deref(), Some("10"));
    }

    #[test]
    fn test_extract_declaration_list() {
        let mut table = SymbolTable::new();
        let (body, decls) = extract_declarations(
            "DECLARE @a INT, @b DECIMAL(10,2) = 1.5;\nSELECT 1;",
            &mut table,
        );
        assert_eq!(body.trim(), "SELECT 1;");
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[1].name, "v_b");
        assert_eq!(decls[1].data_type, "DECIMAL(10,2)");
        assert_eq!(decls[1].default.as_deref(), Some("1.5"));
    }

    #[test]
    fn test_declare_inside_string_untouched() {
        let mut table = SymbolTable::new();
        let input = "SELECT 'DECLARE @x INT;';";
        let (body, decls) = extract_declarations(input, &mut table);
        assert_eq!(body, input);
        assert!(decls.is_empty());
    }

    #[test]
    fn test_declare_nested_in_block_is_hoisted() {
        let mut table = SymbolTable::new();
        let (body, decls) =
            extract_declarations("IF @x > 0 BEGIN DECLARE @y INT; SET @y = 1; END", &mut table);
        assert!(!body.to_uppercase().contains("DECLARE"));
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].name, "v_y");
    }
}
