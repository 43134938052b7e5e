use sqlmend::splitter::{split, Stats};

#[test]
fn test_split_migration_file() {
    let sql = "\
CREATE TABLE clients (id UUID PRIMARY KEY, name VARCHAR(120));
CREATE INDEX idx_clients_name ON clients (name);
INSERT INTO clients VALUES ('00000000-0000-0000-0000-000000000001', 'Acme; Inc.');
";
    let stmts = split(sql);
    assert_eq!(stmts.len(), 3);
    assert!(stmts[0].text.starts_with("CREATE TABLE"));
    assert!(stmts[2].text.contains("'Acme; Inc.'"));
}

#[test]
fn test_function_body_is_one_statement() {
    let sql = "\
SELECT 1;
CREATE FUNCTION f() RETURNS INT AS $$
BEGIN
    SELECT ';' ;
    RETURN 1;
END;
$$ LANGUAGE plpgsql;
SELECT 2;
";
    let stmts = split(sql);
    assert_eq!(stmts.len(), 3);
    assert!(stmts[1].contains_function_body);
    assert!(stmts[1].text.contains("SELECT ';'"));
    assert!(stmts[1].text.trim_end().ends_with("LANGUAGE plpgsql;"));
}

#[test]
fn test_named_tag_body_with_inner_dollars() {
    let sql = "CREATE FUNCTION f() RETURNS TEXT AS $body$ SELECT '$$'; $body$ LANGUAGE plpgsql; SELECT 1;";
    let stmts = split(sql);
    assert_eq!(stmts.len(), 2);
    assert!(stmts[0].text.contains("'$$'"));
}

#[test]
fn test_never_splits_inside_dollar_region_with_unbalanced_parens() {
    // parens inside a body must not leak into the top-level counter
    let sql = "CREATE FUNCTION f() RETURNS INT AS $$ BEGIN PERFORM x('((('); END; $$ LANGUAGE plpgsql; SELECT 1;";
    let stmts = split(sql);
    assert_eq!(stmts.len(), 2);
}

#[test]
fn test_comment_handling_respects_strings() {
    let sql = "SELECT '-- not a comment'; -- real comment\nSELECT 2;";
    let stmts = split(sql);
    assert_eq!(stmts.len(), 2);
    assert!(stmts[0].text.contains("-- not a comment"));
    assert!(!stmts[1].text.contains("real comment"));
}

#[test]
fn test_offsets_map_back_to_document() {
    let sql = "-- header comment\nSELECT 1;\nSELECT 2;";
    let stmts = split(sql);
    assert_eq!(stmts.len(), 2);
    assert_eq!(&sql[stmts[0].start_offset..stmts[0].end_offset], "SELECT 1;");
    assert_eq!(&sql[stmts[1].start_offset..stmts[1].end_offset], "SELECT 2;");
}

#[test]
fn test_split_is_pure() {
    let sql = "SELECT 1; SELECT 2;";
    let first = split(sql);
    let second = split(sql);
    assert_eq!(first, second);
}

#[test]
fn test_stats_over_mixed_document() {
    let sql = "\
SELECT 1;
CREATE FUNCTION a() RETURNS INT AS $$ BEGIN RETURN 1; END; $$ LANGUAGE plpgsql;
CREATE FUNCTION b() RETURNS INT AS $$ BEGIN RETURN 2; END; $$ LANGUAGE plpgsql;
";
    let stmts = split(sql);
    let stats = Stats::from_statements(&stmts);
    assert_eq!(stats.statements, 3);
    assert_eq!(stats.function_bodies, 2);
}
