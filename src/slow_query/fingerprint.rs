//! # SQL Fingerprinting
//!
//! Reduces a raw statement to its shape so that executions differing only
//! in literal values aggregate under one key.
//!
//! Quoted literals and comments are recognized in a single left-to-right
//! pass, so comment markers inside a literal stay part of the literal and a
//! quote inside a comment never opens one.

use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Lexical conventions of the engine that logged the statement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    /// `'...'` literals, `--` and `/* */` comments. `"..."` is an identifier.
    #[default]
    Standard,
    /// Adds `"..."` string literals and `#` comments, as MySQL does outside
    /// `ANSI_QUOTES` mode
    MySql,
}

struct Patterns {
    standard_lexemes: Regex,
    mysql_lexemes: Regex,
    hex_literal: Regex,
    placeholder: Regex,
    number: Regex,
    whitespace: Regex,
    value_list: Regex,
}

const SINGLE_QUOTED: &str = r"'(?:[^'\\]|\\.|'')*'";
const DOUBLE_QUOTED: &str = r#""(?:[^"\\]|\\.|"")*""#;
const BLOCK_COMMENT: &str = r"/\*.*?\*/";
const LINE_COMMENT: &str = r"--[^\n]*";
const HASH_COMMENT: &str = r"#[^\n]*";

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        standard_lexemes: compile(&format!(
            "(?s)(?P<literal>{SINGLE_QUOTED})|{BLOCK_COMMENT}|{LINE_COMMENT}"
        )),
        mysql_lexemes: compile(&format!(
            "(?s)(?P<literal>{SINGLE_QUOTED}|{DOUBLE_QUOTED})|{BLOCK_COMMENT}|{LINE_COMMENT}|{HASH_COMMENT}"
        )),
        hex_literal: compile(r"(?i)\b0x[0-9a-f]+\b"),
        placeholder: compile(r"\$\d+"),
        number: compile(r"\b\d+(?:\.\d+)?(?:[eE][-+]?\d+)?\b"),
        whitespace: compile(r"\s+"),
        value_list: compile(r"\(\s*\?(?:\s*,\s*\?)*\s*\)"),
    })
}

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(e) => panic!("invalid fingerprint pattern {pattern}: {e}"),
    }
}

/// Normalize `sql` into its fingerprint using [`SqlDialect::Standard`].
pub fn fingerprint(sql: &str) -> String {
    fingerprint_with(sql, SqlDialect::Standard)
}

/// Normalize `sql` into its fingerprint.
///
/// Comments are dropped, string/numeric/hex literals and `$n` placeholders
/// become `?`, parenthesized lists made only of `?` collapse to `(...)`,
/// whitespace runs collapse to one space, and a trailing `;` is removed.
/// Keywords and identifiers are lowercased.
pub fn fingerprint_with(sql: &str, dialect: SqlDialect) -> String {
    let patterns = patterns();
    let lexemes = match dialect {
        SqlDialect::Standard => &patterns.standard_lexemes,
        SqlDialect::MySql => &patterns.mysql_lexemes,
    };

    let sql = lexemes.replace_all(sql, |caps: &Captures<'_>| {
        if caps.name("literal").is_some() {
            "?"
        } else {
            " "
        }
    });
    let sql = patterns.hex_literal.replace_all(&sql, "?");
    let sql = patterns.placeholder.replace_all(&sql, "?");
    let sql = patterns.number.replace_all(&sql, "?");
    let sql = sql.to_lowercase();
    let sql = patterns.whitespace.replace_all(&sql, " ");
    let sql = patterns.value_list.replace_all(&sql, "(...)");

    sql.trim_start()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .to_string()
}
