use sqlmend::translate::translate_document;
use sqlmend::validate;

const PROCEDURE: &str = "\
CREATE PROCEDURE dbo.UpdateCustomerBalance
    @customerId UNIQUEIDENTIFIER,
    @amount MONEY,
    @note NVARCHAR(200) = NULL
AS
BEGIN
    DECLARE @current MONEY;

    SELECT @current = balance FROM customers WHERE id = @customerId;

    IF @current IS NULL
    BEGIN
        SET @current = 0;
    END

    UPDATE customers
    SET balance = @current + @amount,
        note = ISNULL(@note, ''),
        updated_at = GETDATE()
    WHERE id = @customerId;
END;
";

#[test]
fn test_full_procedure_translation() {
    let output = translate_document(PROCEDURE);
    let text = &output.text;

    assert!(text.contains("CREATE OR REPLACE FUNCTION UpdateCustomerBalance("));
    assert!(text.contains("AS $$"));
    assert!(text.trim_end().ends_with("$$ LANGUAGE plpgsql;"));

    // types from the closed lookup table
    assert!(text.contains("p_customer_id UUID"));
    assert!(text.contains("p_amount DECIMAL(19,4)"));
    assert!(text.contains("p_note VARCHAR(200) DEFAULT NULL"));

    // the declared variable is hoisted and renamed
    assert!(text.contains("DECLARE\n    v_current DECIMAL(19,4);"));

    // consistent sigil classification: parameter stays p_ in the body
    assert!(text.contains("WHERE id = p_customer_id"));
    assert!(!text.contains("v_customer_id"));
    assert!(!text.contains('@'));

    // control flow and built-ins
    assert!(text.contains("IF v_current IS NULL"));
    assert!(text.contains("END IF"));
    assert!(text.contains("COALESCE(p_note, '')"));
    assert!(text.contains("NOW()"));

    // variable capture becomes SELECT ... INTO
    assert!(text.contains("SELECT balance INTO v_current FROM customers WHERE id = p_customer_id"));
}

#[test]
fn test_translated_output_validates_clean() {
    let output = translate_document(PROCEDURE);
    let summary = validate::validate(&output.text);
    assert!(summary.is_clean(), "{:?}", summary.issues);
}

#[test]
fn test_fix_report_names_fired_rules() {
    let output = translate_document(PROCEDURE);
    let ids: Vec<&str> = output.report.entries().iter().map(|e| e.rule_id).collect();

    assert!(ids.contains(&"create-procedure"));
    assert!(ids.contains(&"sigil-rename"));
    assert!(ids.contains(&"type-map"));
    assert!(ids.contains(&"control-flow"));
    assert!(ids.contains(&"builtin-map"));
    assert!(ids.contains(&"declare-hoist"));
    assert!(ids.contains(&"dollar-wrap"));
}

#[test]
fn test_defaulted_parameter_is_rendered_last() {
    let sql = "CREATE PROCEDURE P @a INT = 1, @b INT AS BEGIN SELECT @a + @b; END;";
    let output = translate_document(sql);
    let header = output.text.lines().next().unwrap().to_string();
    assert!(header.find("p_b INTEGER").unwrap() < header.find("p_a INTEGER DEFAULT 1").unwrap());
}

#[test]
fn test_try_catch_is_never_silently_dropped() {
    let sql = "\
CREATE PROCEDURE Risky AS
BEGIN
    BEGIN TRY
        DELETE FROM ledger;
    END TRY
    BEGIN CATCH
        ROLLBACK TRAN;
    END CATCH
END;
";
    let output = translate_document(sql);
    assert!(output.text.contains("FIXME"));
    assert!(output.text.contains("-- "));
    let entry = output
        .report
        .entries()
        .iter()
        .find(|e| e.rule_id == "try-catch")
        .expect("try-catch warning missing");
    assert_eq!(entry.occurrences, 1);
}

#[test]
fn test_transaction_keywords() {
    let sql = "CREATE PROCEDURE Move AS BEGIN BEGIN TRAN; UPDATE t SET x = 1; COMMIT TRANSACTION; END;";
    let output = translate_document(sql);
    assert!(output.text.contains("BEGIN;"));
    assert!(output.text.contains("COMMIT;"));
}

#[test]
fn test_mixed_document_only_touches_procedures() {
    let sql = "CREATE TABLE t (id INT);\nCREATE PROCEDURE P AS BEGIN DELETE FROM t; END;";
    let output = translate_document(sql);
    assert!(output.text.contains("CREATE TABLE t (id INT);"));
    assert!(output.text.contains("CREATE OR REPLACE FUNCTION P()"));
}

#[test]
fn test_translation_is_idempotent() {
    let once = translate_document(PROCEDURE);
    let twice = translate_document(&once.text);
    assert_eq!(once.text, twice.text);
    assert!(twice.report.is_empty());
}

#[test]
fn test_while_loop_translation() {
    let sql = "\
CREATE PROCEDURE CountDown @n INT AS
BEGIN
    WHILE @n > 0
    BEGIN
        SET @n = @n - 1;
    END
END;
";
    let output = translate_document(sql);
    assert!(output.text.contains("WHILE p_n > 0"));
    assert!(output.text.contains("LOOP"));
    assert!(output.text.contains("END LOOP"));
    assert!(output.text.contains("p_n := p_n - 1;"));
}
