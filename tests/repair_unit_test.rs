use sqlmend::repair::{repair, RepairOptions};
use sqlmend::validate;

fn run(text: &str) -> (String, sqlmend::report::FixReport) {
    repair(text, &RepairOptions::default())
}

#[test]
fn test_truncated_delimiters_scenario() {
    let input = "AS $\nBEGIN\n  RETURN 1;\nEND;\n$;";
    let (out, _) = run(input);
    assert_eq!(out, "AS $$\nBEGIN\n  RETURN 1;\nEND;\n$$ LANGUAGE plpgsql;");
}

#[test]
fn test_full_function_repair_then_validates_clean() {
    let input = "\
CREATE OR REPLACE FUNCTION get_client(p_id UUID DEFAULT NULL, p_tenant INT)
RETURNS INT
LANGUAGE plpgsql
AS $
BEGIN
  RETURN 1;
END;
$;
";
    let (out, report) = run(input);

    assert!(out.contains("get_client(p_tenant INT, p_id UUID DEFAULT NULL)"));
    assert!(out.contains("AS $$"));
    assert!(out.contains("$$ LANGUAGE plpgsql;"));
    assert!(!report.is_empty());

    let summary = validate::validate(&out);
    assert!(summary.is_clean(), "{:?}", summary.issues);
}

#[test]
fn test_repair_is_idempotent_over_the_full_rule_set() {
    let inputs = [
        "AS $\nBEGIN\n  RETURN 1;\nEND;\n$;",
        "CREATE FUNCTION f(a INT DEFAULT 1, b INT) RETURNS INT LANGUAGE plpgsql AS $\nBEGIN RETURN a + b; END;\n$;",
    ];
    for input in inputs {
        let (once, _) = run(input);
        let (twice, report) = run(&once);
        assert_eq!(once, twice, "input: {input}");
        assert!(report.is_empty(), "input: {input}");
    }
}

#[test]
fn test_clean_validated_text_round_trips_byte_identical() {
    let input = "\
CREATE OR REPLACE FUNCTION f(p_b INT, p_a INT DEFAULT 1)
RETURNS INT AS $$
BEGIN
  RETURN p_a + p_b;
END;
$$ LANGUAGE plpgsql;
";
    let summary = validate::validate(input);
    assert!(summary.is_clean(), "{:?}", summary.issues);

    let (out, report) = run(input);
    assert_eq!(out, input);
    assert!(report.is_empty());
}

#[test]
fn test_parameter_reordering_is_a_stable_partition() {
    let input = "CREATE FUNCTION f(a INT, b INT DEFAULT 2, c INT) RETURNS INT AS $$ BEGIN RETURN 1; END; $$ LANGUAGE plpgsql;";
    let (out, _) = run(input);
    assert!(out.contains("f(a INT, c INT, b INT DEFAULT 2)"));
}

#[test]
fn test_bare_varchar_requires_explicit_choice() {
    let input = "CREATE FUNCTION f() RETURNS TABLE(name VARCHAR) AS $$ BEGIN END; $$ LANGUAGE plpgsql;";

    // without a configured length, only flagged
    let (out, report) = run(input);
    assert_eq!(out, input);
    assert_eq!(report.warning_count(), 1);

    // with one, filled in
    let options = RepairOptions {
        table_varchar_len: Some(200),
    };
    let (out, _) = repair(input, &options);
    assert!(out.contains("name VARCHAR(200)"));
}

#[test]
fn test_unbalanced_body_recovery_is_flagged_as_guess() {
    let input = "CREATE FUNCTION f() RETURNS INT AS $body$\nBEGIN RETURN 1; END;";
    let (out, report) = run(input);
    assert!(out.trim_end().ends_with("$body$"));
    let entry = report
        .entries()
        .iter()
        .find(|e| e.rule_id == "unbalanced-dollar")
        .unwrap();
    assert_eq!(entry.severity, sqlmend::report::Severity::Warning);
}
