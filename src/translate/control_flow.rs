//! Block-aware control-flow rewriting for procedure bodies.
//!
//! T-SQL delimits conditional and loop bodies with `BEGIN ... END`;
//! plpgsql uses `THEN ... END IF` and `LOOP ... END LOOP`. A blind
//! keyword substitution corrupts nested blocks and `CASE ... END`
//! expressions, so this pass walks the body token-by-token (outside
//! quotes) with an explicit block stack and edits only the tokens it can
//! attribute to a block:
//!
//! - `IF <cond> BEGIN` → `IF <cond> THEN`
//! - `ELSE IF` → `ELSIF`
//! - `ELSE BEGIN` → `ELSE`
//! - the `END` closing an IF → `END IF` (or removed when `ELSE` follows)
//! - `WHILE <cond> BEGIN ... END` → `WHILE <cond> LOOP ... END LOOP`
//! - single-statement `IF`/`WHILE` bodies get the keyword pair inserted
//!   around the statement
//!
//! `BEGIN TRAN*`, `BEGIN TRY`/`BEGIN CATCH` and their `END` partners are
//! transaction/error keywords, not block delimiters, and pass through.
//! Text that is already plpgsql (`THEN`, `LOOP`, `END IF`, `END LOOP`,
//! `END CASE`) passes through unchanged, which keeps the pass idempotent.
//! The procedure's outer `BEGIN ... END` wrapper is stripped by the
//! caller before this pass runs, so it can never be touched here.

use crate::scan::QuoteTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Word,
    Semicolon,
}

#[derive(Debug, Clone)]
struct Token {
    start: usize,
    end: usize,
    upper: String,
    kind: TokenKind,
    depth: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    /// An IF frame; `single` bodies close at the next statement
    /// terminator instead of an END token.
    If { single: bool },
    While { single: bool },
    /// Bare BEGIN ... END block; valid in both dialects, left alone.
    Plain,
    /// CASE ... END expression; its ELSE/END belong to it, not to us.
    Case,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    IfCond { depth: i32 },
    ElsifCond { depth: i32 },
    ElseBody { depth: i32 },
    WhileCond { depth: i32 },
}

#[derive(Debug)]
enum Edit {
    Replace {
        start: usize,
        end: usize,
        text: &'static str,
    },
    Insert {
        at: usize,
        text: &'static str,
    },
    Delete {
        start: usize,
        end: usize,
    },
}

/// Keywords that can start a statement inside a procedure body; used to
/// find where a single-statement IF/WHILE body begins.
const STATEMENT_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "SET", "EXEC", "EXECUTE", "PRINT", "RETURN",
    "RAISERROR", "BREAK", "CONTINUE", "EXIT", "PERFORM",
];

/// Rewrite T-SQL control flow in `body`, returning the new text and the
/// number of block edits made. Unrecognized structure is left unchanged.
pub fn rewrite(body: &str) -> (String, usize) {
    let tokens = tokenize(body);
    let mut stack: Vec<Block> = Vec::new();
    let mut pending: Option<Pending> = None;
    let mut edits: Vec<Edit> = Vec::new();

    let mut idx = 0;
    while idx < tokens.len() {
        let tok = &tokens[idx];

        if tok.kind == TokenKind::Semicolon {
            // Statement terminators close any single-statement frames.
            while let Some(top) = stack.last().copied() {
                match top {
                    Block::If { single: true } => {
                        if next_word_is(&tokens, idx + 1, "ELSE") {
                            // `IF x stmt; ELSE ...` - the ELSE handler
                            // keeps the frame open.
                            break;
                        }
                        edits.push(Edit::Insert {
                            at: tok.end,
                            text: " END IF;",
                        });
                        stack.pop();
                    }
                    Block::While { single: true } => {
                        edits.push(Edit::Insert {
                            at: tok.end,
                            text: " END LOOP;",
                        });
                        stack.pop();
                    }
                    _ => break,
                }
            }
            idx += 1;
            continue;
        }

        match tok.upper.as_str() {
            "IF" => {
                pending = Some(Pending::IfCond { depth: tok.depth });
            }
            "WHILE" => {
                pending = Some(Pending::WhileCond { depth: tok.depth });
            }
            "CASE" => {
                stack.push(Block::Case);
            }
            // Already-plpgsql text: THEN/LOOP answer a pending condition
            // without any edit, so a second run is a no-op.
            "THEN" => {
                if matches!(
                    pending,
                    Some(Pending::IfCond { .. }) | Some(Pending::ElsifCond { .. })
                ) {
                    pending = None;
                }
            }
            "LOOP" => {
                if matches!(pending, Some(Pending::WhileCond { .. })) {
                    pending = None;
                }
            }
            "BEGIN" => {
                if next_word_in(&tokens, idx + 1, &["TRAN", "TRANSACTION", "TRY", "CATCH"]) {
                    idx += 2;
                    continue;
                }
                match pending.take() {
                    Some(Pending::IfCond { depth }) if depth == tok.depth => {
                        edits.push(Edit::Replace {
                            start: tok.start,
                            end: tok.end,
                            text: "THEN",
                        });
                        stack.push(Block::If { single: false });
                    }
                    Some(Pending::ElsifCond { depth }) if depth == tok.depth => {
                        edits.push(Edit::Replace {
                            start: tok.start,
                            end: tok.end,
                            text: "THEN",
                        });
                        // the ELSIF continues the frame already on the stack
                        if let Some(Block::If { single }) = stack.last_mut() {
                            *single = false;
                        }
                    }
                    Some(Pending::WhileCond { depth }) if depth == tok.depth => {
                        edits.push(Edit::Replace {
                            start: tok.start,
                            end: tok.end,
                            text: "LOOP",
                        });
                        stack.push(Block::While { single: false });
                    }
                    Some(Pending::ElseBody { depth }) if depth == tok.depth => {
                        edits.push(Edit::Delete {
                            start: tok.start,
                            end: tok.end,
                        });
                        if let Some(Block::If { single }) = stack.last_mut() {
                            *single = false;
                        }
                    }
                    other => {
                        pending = other;
                        stack.push(Block::Plain);
                    }
                }
            }
            "END" => {
                if next_word_in(&tokens, idx + 1, &["TRY", "CATCH"]) {
                    idx += 2;
                    continue;
                }
                match stack.last().copied() {
                    Some(Block::Case) => {
                        stack.pop();
                        // `END CASE` closes a CASE statement; bare END
                        // closes a CASE expression - neither is edited
                        if next_word_is(&tokens, idx + 1, "CASE") {
                            idx += 2;
                            continue;
                        }
                    }
                    Some(Block::If { .. }) => {
                        if next_word_is(&tokens, idx + 1, "ELSE") {
                            // the IF continues; this END only closed the
                            // T-SQL block body
                            edits.push(Edit::Delete {
                                start: tok.start,
                                end: tok.end,
                            });
                        } else {
                            edits.push(Edit::Replace {
                                start: tok.start,
                                end: tok.end,
                                text: "END IF",
                            });
                            stack.pop();
                        }
                    }
                    Some(Block::While { .. }) => {
                        edits.push(Edit::Replace {
                            start: tok.start,
                            end: tok.end,
                            text: "END LOOP",
                        });
                        stack.pop();
                    }
                    Some(Block::Plain) => {
                        stack.pop();
                    }
                    None => {
                        // plpgsql closers in already-translated text
                        if next_word_in(&tokens, idx + 1, &["IF", "LOOP", "CASE"]) {
                            idx += 2;
                            continue;
                        }
                    }
                }
            }
            "ELSE" => match stack.last().copied() {
                Some(Block::Case) => {}
                Some(Block::If { .. }) => {
                    if next_word_is(&tokens, idx + 1, "IF") {
                        let if_tok = &tokens[idx + 1];
                        edits.push(Edit::Replace {
                            start: tok.start,
                            end: if_tok.end,
                            text: "ELSIF",
                        });
                        pending = Some(Pending::ElsifCond { depth: tok.depth });
                        idx += 2;
                        continue;
                    }
                    pending = Some(Pending::ElseBody { depth: tok.depth });
                }
                _ => {}
            },
            word => {
                // A statement keyword while a condition is pending means a
                // single-statement body with no BEGIN.
                match pending {
                    Some(Pending::IfCond { depth })
                        if depth == tok.depth && STATEMENT_KEYWORDS.contains(&word) =>
                    {
                        edits.push(Edit::Insert {
                            at: tok.start,
                            text: "THEN ",
                        });
                        stack.push(Block::If { single: true });
                        pending = None;
                    }
                    Some(Pending::ElsifCond { depth })
                        if depth == tok.depth && STATEMENT_KEYWORDS.contains(&word) =>
                    {
                        edits.push(Edit::Insert {
                            at: tok.start,
                            text: "THEN ",
                        });
                        if let Some(Block::If { single }) = stack.last_mut() {
                            *single = true;
                        }
                        pending = None;
                    }
                    Some(Pending::WhileCond { depth })
                        if depth == tok.depth && STATEMENT_KEYWORDS.contains(&word) =>
                    {
                        edits.push(Edit::Insert {
                            at: tok.start,
                            text: "LOOP ",
                        });
                        stack.push(Block::While { single: true });
                        pending = None;
                    }
                    Some(Pending::ElseBody { depth })
                        if depth == tok.depth && STATEMENT_KEYWORDS.contains(&word) =>
                    {
                        // `ELSE stmt;` - mark the frame single so the
                        // terminator closes it.
                        if let Some(Block::If { single }) = stack.last_mut() {
                            *single = true;
                        }
                        pending = None;
                    }
                    _ => {}
                }
            }
        }

        idx += 1;
    }

    let count = edits.len();
    (apply_edits(body, edits), count)
}

fn tokenize(body: &str) -> Vec<Token> {
    let bytes = body.as_bytes();
    let mut tracker = QuoteTracker::new();
    let mut tokens = Vec::new();
    let mut depth: i32 = 0;
    let mut i = 0;

    while i < bytes.len() {
        let quoted = tracker.in_quoted_region();
        let b = bytes[i];

        if !quoted {
            if b == b'(' {
                depth += 1;
            } else if b == b')' {
                depth = (depth - 1).max(0);
            } else if b == b';' {
                tokens.push(Token {
                    start: i,
                    end: i + 1,
                    upper: ";".to_string(),
                    kind: TokenKind::Semicolon,
                    depth,
                });
            } else if b == b'_' || b.is_ascii_alphabetic() {
                let start = i;
                let mut j = i;
                while j < bytes.len() && (bytes[j] == b'_' || bytes[j].is_ascii_alphanumeric()) {
                    j += 1;
                }
                tokens.push(Token {
                    start,
                    end: j,
                    upper: body[start..j].to_ascii_uppercase(),
                    kind: TokenKind::Word,
                    depth,
                });
                i = j;
                continue;
            }
        }

        i += tracker.step(bytes, i);
    }

    tokens
}

fn next_word_is(tokens: &[Token], idx: usize, word: &str) -> bool {
    tokens
        .get(idx)
        .is_some_and(|t| t.kind == TokenKind::Word && t.upper == word)
}

fn next_word_in(tokens: &[Token], idx: usize, words: &[&str]) -> bool {
    tokens
        .get(idx)
        .is_some_and(|t| t.kind == TokenKind::Word && words.contains(&t.upper.as_str()))
}

fn apply_edits(body: &str, mut edits: Vec<Edit>) -> String {
    edits.sort_by_key(|e| match e {
        Edit::Replace { start, .. } | Edit::Delete { start, .. } => *start,
        Edit::Insert { at, .. } => *at,
    });

    let mut out = String::with_capacity(body.len() + 64);
    let mut cursor = 0;

    for edit in edits {
        match edit {
            Edit::Replace { start, end, text } => {
                out.push_str(&body[cursor..start]);
                out.push_str(text);
                cursor = end;
            }
            Edit::Insert { at, text } => {
                out.push_str(&body[cursor..at]);
                out.push_str(text);
                cursor = at;
            }
            Edit::Delete { start, end } => {
                out.push_str(&body[cursor..start]);
                cursor = end;
                // swallow one following space so deletions do not leave
                // doubled whitespace behind
                if body.as_bytes().get(cursor) == Some(&b' ') {
                    cursor += 1;
                }
            }
        }
    }

    out.push_str(&body[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_if_block() {
        let (out, n) = rewrite("IF @x > 0 BEGIN\n    SET @y = 1;\nEND");
        assert_eq!(out, "IF @x > 0 THEN\n    SET @y = 1;\nEND IF");
        assert_eq!(n, 2);
    }

    #[test]
    fn test_if_else_blocks() {
        let (out, _) = rewrite("IF @x > 0 BEGIN SET @y = 1; END ELSE BEGIN SET @y = 2; END");
        assert_eq!(out, "IF @x > 0 THEN SET @y = 1; ELSE SET @y = 2; END IF");
    }

    #[test]
    fn test_else_if_chain() {
        let (out, _) = rewrite(
            "IF @x = 1 BEGIN SET @y = 1; END ELSE IF @x = 2 BEGIN SET @y = 2; END ELSE BEGIN SET @y = 3; END",
        );
        assert_eq!(
            out,
            "IF @x = 1 THEN SET @y = 1; ELSIF @x = 2 THEN SET @y = 2; ELSE SET @y = 3; END IF"
        );
    }

    #[test]
    fn test_single_statement_if() {
        let (out, _) = rewrite("IF @x > 0 SET @y = 1;");
        assert_eq!(out, "IF @x > 0 THEN SET @y = 1; END IF;");
    }

    #[test]
    fn test_single_statement_if_else() {
        let (out, _) = rewrite("IF @x > 0 SET @y = 1; ELSE SET @y = 2;");
        assert_eq!(out, "IF @x > 0 THEN SET @y = 1; ELSE SET @y = 2; END IF;");
    }

    #[test]
    fn test_while_loop() {
        let (out, _) = rewrite("WHILE @i < 10 BEGIN SET @i = @i + 1; END");
        assert_eq!(out, "WHILE @i < 10 LOOP SET @i = @i + 1; END LOOP");
    }

    #[test]
    fn test_nested_if() {
        let (out, _) = rewrite("IF @a > 0 BEGIN IF @b > 0 BEGIN SET @c = 1; END END");
        assert_eq!(out, "IF @a > 0 THEN IF @b > 0 THEN SET @c = 1; END IF END IF");
    }

    #[test]
    fn test_case_expression_untouched() {
        let input = "SET @x = CASE WHEN @a = 1 THEN 'one' ELSE 'other' END;";
        let (out, n) = rewrite(input);
        assert_eq!(out, input);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_case_inside_if_block() {
        let (out, _) =
            rewrite("IF @x > 0 BEGIN SET @y = CASE WHEN @a = 1 THEN 1 ELSE 2 END; END");
        assert_eq!(
            out,
            "IF @x > 0 THEN SET @y = CASE WHEN @a = 1 THEN 1 ELSE 2 END; END IF"
        );
    }

    #[test]
    fn test_select_inside_condition_parens_is_not_a_body() {
        let (out, _) =
            rewrite("IF EXISTS (SELECT 1 FROM t WHERE id = @id) BEGIN DELETE FROM t; END");
        assert_eq!(
            out,
            "IF EXISTS (SELECT 1 FROM t WHERE id = @id) THEN DELETE FROM t; END IF"
        );
    }

    #[test]
    fn test_begin_tran_is_not_a_block() {
        let input = "BEGIN TRANSACTION; UPDATE t SET x = 1; COMMIT;";
        let (out, n) = rewrite(input);
        assert_eq!(out, input);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_try_tokens_pass_through() {
        let input = "BEGIN TRY SET @x = 1; END TRY BEGIN CATCH SET @x = 2; END CATCH";
        let (out, n) = rewrite(input);
        assert_eq!(out, input);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_plain_block_untouched() {
        let input = "BEGIN SET @x = 1; END";
        let (out, n) = rewrite(input);
        assert_eq!(out, input);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_idempotent_on_translated_if() {
        let input = "IF v_x > 0 THEN SET v_y = 1; END IF;";
        let (out, n) = rewrite(input);
        assert_eq!(out, input);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_idempotent_on_translated_loop() {
        let input = "WHILE v_i < 10 LOOP SET v_i = v_i + 1; END LOOP;";
        let (out, n) = rewrite(input);
        assert_eq!(out, input);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_idempotent_full_translation() {
        let tsql = "IF @x > 0 BEGIN SET @y = 1; END ELSE BEGIN SET @y = 2; END";
        let (once, _) = rewrite(tsql);
        let (twice, n) = rewrite(&once);
        assert_eq!(once, twice);
        assert_eq!(n, 0);
    }
}
