//! SQL script ingestion: streaming statement splitting with dialect-specific
//! delimiter and comment conventions.
//!
//! A script is plain text with statements separated by a delimiter (default
//! `;`). The splitter understands single-quoted, double-quoted and
//! backtick-quoted strings, `--` line comments, block comments, and, when
//! enabled, `#` line comments and MySQL `DELIMITER` directives. The caller's
//! callback is invoked once per logical statement and ingestion stops on the
//! first callback error.

use std::path::Path;

use crate::error::Result;

/// Dialect-specific splitting conventions.
#[derive(Debug, Clone)]
pub struct ScriptRules {
    /// Initial statement delimiter.
    pub delimiter: String,
    /// Treat `#` as a line comment (MySQL).
    pub hash_comments: bool,
    /// Honor `DELIMITER xxx` directives (MySQL client convention).
    pub delimiter_directive: bool,
}

impl Default for ScriptRules {
    fn default() -> Self {
        Self {
            delimiter: ";".to_string(),
            hash_comments: false,
            delimiter_directive: false,
        }
    }
}

impl ScriptRules {
    /// MySQL conventions: `#` comments and `DELIMITER` directives.
    pub fn mysql() -> Self {
        Self {
            delimiter: ";".to_string(),
            hash_comments: true,
            delimiter_directive: true,
        }
    }
}

/// Split script text into logical statements.
pub fn split_statements(text: &str, rules: &ScriptRules) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut delimiter = rules.delimiter.clone();

    let mut chars = text.char_indices().peekable();
    let bytes = text.as_bytes();

    #[derive(PartialEq)]
    enum State {
        Normal,
        Single,
        Double,
        Backtick,
        LineComment,
        BlockComment,
    }
    let mut state = State::Normal;

    while let Some((i, c)) = chars.next() {
        match state {
            State::Normal => {
                // Delimiter directive applies only at the start of a statement.
                if rules.delimiter_directive
                    && current.trim().is_empty()
                    && (c == 'd' || c == 'D')
                    && bytes.len() >= i + 10
                    && bytes[i..i + 10].eq_ignore_ascii_case(b"delimiter ")
                {
                    // Consume the rest of the line as the new delimiter.
                    let rest: String = text[i + 10..]
                        .chars()
                        .take_while(|&ch| ch != '\n')
                        .collect();
                    let new_delim = rest.trim().to_string();
                    if !new_delim.is_empty() {
                        delimiter = new_delim;
                    }
                    // Skip to end of line.
                    for (_, ch) in chars.by_ref() {
                        if ch == '\n' {
                            break;
                        }
                    }
                    current.clear();
                    continue;
                }

                if c == '\'' {
                    state = State::Single;
                    current.push(c);
                } else if c == '"' {
                    state = State::Double;
                    current.push(c);
                } else if c == '`' {
                    state = State::Backtick;
                    current.push(c);
                } else if c == '#' && rules.hash_comments {
                    state = State::LineComment;
                } else if c == '-' && bytes.get(i + 1) == Some(&b'-') {
                    chars.next();
                    state = State::LineComment;
                } else if c == '/' && bytes.get(i + 1) == Some(&b'*') {
                    chars.next();
                    state = State::BlockComment;
                } else if text[i..].starts_with(delimiter.as_str()) {
                    // Consume the remaining delimiter characters.
                    for _ in 0..delimiter.chars().count() - 1 {
                        chars.next();
                    }
                    let stmt = current.trim();
                    if !stmt.is_empty() {
                        statements.push(stmt.to_string());
                    }
                    current.clear();
                } else {
                    current.push(c);
                }
            }
            State::Single | State::Double | State::Backtick => {
                current.push(c);
                let quote = match state {
                    State::Single => '\'',
                    State::Double => '"',
                    _ => '`',
                };
                if c == '\\' && state != State::Backtick {
                    // Escaped character inside the string body.
                    if let Some((_, esc)) = chars.next() {
                        current.push(esc);
                    }
                } else if c == quote {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if c == '\n' {
                    state = State::Normal;
                    current.push('\n');
                }
            }
            State::BlockComment => {
                if c == '*' && bytes.get(i + 1) == Some(&b'/') {
                    chars.next();
                    state = State::Normal;
                }
            }
        }
    }

    let stmt = current.trim();
    if !stmt.is_empty() {
        statements.push(stmt.to_string());
    }
    statements
}

/// Stream a script file, invoking `callback` once per logical statement.
///
/// Stops and returns the error from the first failing callback.
pub fn for_each_statement<P, F>(path: P, rules: &ScriptRules, mut callback: F) -> Result<usize>
where
    P: AsRef<Path>,
    F: FnMut(&str) -> Result<()>,
{
    let text = std::fs::read_to_string(path)?;
    let statements = split_statements(&text, rules);
    let mut count = 0;
    for stmt in &statements {
        callback(stmt)?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_basic() {
        let stmts = split_statements(
            "CREATE TABLE a (id INT); INSERT INTO a VALUES (1);",
            &ScriptRules::default(),
        );
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0], "CREATE TABLE a (id INT)");
        assert_eq!(stmts[1], "INSERT INTO a VALUES (1)");
    }

    #[test]
    fn test_delimiter_inside_string_ignored() {
        let stmts = split_statements(
            "INSERT INTO t VALUES ('a;b'); SELECT 1;",
            &ScriptRules::default(),
        );
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("'a;b'"));
    }

    #[test]
    fn test_comments_stripped() {
        let script = "-- leading comment\nSELECT 1; /* block; comment */ SELECT 2;";
        let stmts = split_statements(script, &ScriptRules::default());
        assert_eq!(stmts, vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn test_hash_comments_only_for_mysql() {
        let script = "# mysql comment\nSELECT 1;";
        let stmts = split_statements(script, &ScriptRules::mysql());
        assert_eq!(stmts, vec!["SELECT 1"]);

        let stmts = split_statements("SELECT '#not a comment';", &ScriptRules::default());
        assert_eq!(stmts.len(), 1);
    }

    #[test]
    fn test_delimiter_directive() {
        let script = "DELIMITER $$\nCREATE PROCEDURE p() BEGIN SELECT 1; END$$\nDELIMITER ;\nSELECT 2;";
        let stmts = split_statements(script, &ScriptRules::mysql());
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].contains("SELECT 1;"));
        assert_eq!(stmts[1], "SELECT 2");
    }

    #[test]
    fn test_trailing_statement_without_delimiter() {
        let stmts = split_statements("SELECT 1", &ScriptRules::default());
        assert_eq!(stmts, vec!["SELECT 1"]);
    }

    #[test]
    fn test_callback_stops_on_first_error() {
        let dir = std::env::temp_dir();
        let path = dir.join("sqlbridge_script_test.sql");
        std::fs::write(&path, "SELECT 1; SELECT 2; SELECT 3;").unwrap();

        let mut seen = Vec::new();
        let err = for_each_statement(&path, &ScriptRules::default(), |stmt| {
            seen.push(stmt.to_string());
            if stmt.contains('2') {
                Err(crate::error::BridgeError::Config("stop".to_string()))
            } else {
                Ok(())
            }
        })
        .unwrap_err();

        assert!(matches!(err, crate::error::BridgeError::Config(_)));
        assert_eq!(seen.len(), 2);
        std::fs::remove_file(&path).ok();
    }
}
