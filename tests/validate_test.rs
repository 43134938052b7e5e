use sqlmend::validate::{validate, IssueKind};

#[test]
fn test_clean_translated_function() {
    let sql = "\
CREATE OR REPLACE FUNCTION update_balance(p_id UUID, p_amount DECIMAL(19,4))
RETURNS VOID
AS $$
BEGIN
    UPDATE customers SET balance = balance + p_amount WHERE id = p_id;
END;
$$ LANGUAGE plpgsql;
";
    let summary = validate(sql);
    assert!(summary.is_clean(), "{:?}", summary.issues);
    assert_eq!(summary.errors, 0);
    assert_eq!(summary.warnings, 0);
}

#[test]
fn test_every_issue_kind_is_reachable() {
    let cases: Vec<(&str, IssueKind)> = vec![
        (
            "CREATE FUNCTION f() RETURNS INT AS $$\nBEGIN RETURN 1; END;",
            IssueKind::UnbalancedDollarQuote,
        ),
        (
            "CREATE OR REPLACE FUNCTION f() RETURNS INT AS $$ BEGIN RETURN 1; END; $$;",
            IssueKind::FunctionLanguageMismatch,
        ),
        (
            "CREATE FUNCTION f() RETURNS INT AS $\nBEGIN RETURN 1; END;",
            IssueKind::IncompleteDollarOpen,
        ),
        (
            "CREATE FUNCTION f() RETURNS INT LANGUAGE plpgsql AS $$ BEGIN RETURN 1; END; $$;",
            IssueKind::MisplacedLanguageClause,
        ),
        (
            "CREATE OR REPLACE FUNCTION f() RETURNS INT AS $$ SELECT 1; $$ LANGUAGE plpgsql;",
            IssueKind::MissingBeginEnd,
        ),
    ];

    for (sql, kind) in cases {
        let summary = validate(sql);
        assert!(
            summary.issues.iter().any(|i| i.kind == kind),
            "expected {:?} for {:?}, got {:?}",
            kind,
            sql,
            summary.issues
        );
    }
}

#[test]
fn test_validator_is_advisory_and_stable() {
    let sql = "CREATE FUNCTION broken() RETURNS INT AS $\nwhatever";
    let first = validate(sql);
    let second = validate(sql);
    assert_eq!(first.issues.len(), second.issues.len());
    assert!(first.has_errors());
}

#[test]
fn test_summary_serializes_to_json() {
    let summary = validate("CREATE FUNCTION f() RETURNS INT AS $$ BEGIN RETURN 1; END;");
    let json = serde_json::to_string(&summary).unwrap();
    assert!(json.contains("unbalanced-dollar-quote"));
    assert!(json.contains("\"errors\""));
}

#[test]
fn test_multiple_functions_counted_for_parity() {
    let one = "CREATE OR REPLACE FUNCTION f() RETURNS INT AS $$ BEGIN RETURN 1; END; $$ LANGUAGE plpgsql;";
    let sql = format!("{}\n{}\nCREATE OR REPLACE FUNCTION g() RETURNS INT AS $$ BEGIN RETURN 2; END; $$;", one, one.replace("f()", "h()"));
    let summary = validate(&sql);
    let issue = summary
        .issues
        .iter()
        .find(|i| i.kind == IssueKind::FunctionLanguageMismatch)
        .unwrap();
    assert!(issue.detail.contains('3'));
    assert!(issue.detail.contains('2'));
}
