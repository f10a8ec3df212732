//! SQL parsing utilities for comment stripping, statement counting and classification
//!
//! Uses sqlparser crate for proper SQL parsing with validation.

use crate::types::{DatabaseType, StatementKind};
use lazy_regex::{Lazy, Regex, lazy_regex};
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::{Dialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::{Parser, ParserError};
use sqlparser::tokenizer::{Location, Token, TokenWithSpan, Tokenizer, Whitespace};

// Fallback patterns for input the tokenizer rejects
static BLOCK_COMMENT: Lazy<Regex> = lazy_regex!(r"(?s)/\*.*?\*/");
static UNTERMINATED_BLOCK_COMMENT: Lazy<Regex> = lazy_regex!(r"(?s)/\*.*$");
static LINE_COMMENT: Lazy<Regex> = lazy_regex!(r"(?m)--.*$");

/// Get appropriate SQL dialect for the database type
pub(crate) fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::Postgres => Box::new(PostgreSqlDialect {}),
        DatabaseType::MySQL | DatabaseType::MariaDB => Box::new(MySqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
        DatabaseType::SqlServer => Box::new(MsSqlDialect {}),
    }
}

/// Strip SQL comments (single-line and multi-line) using sqlparser tokenizer
///
/// Each comment is replaced by a single space, so tokens on either side stay
/// separated exactly as the database would see them. Comment markers inside
/// string literals, dollar-quoted strings and quoted identifiers are kept.
///
/// # Supported Features
/// - Single-line comments: `-- comment`
/// - Multi-line comments: `/* comment */`
/// - Nested block comments: `/* outer /* inner */ outer */` (PostgreSQL)
/// - String literals: `'text'` with `''` escaping
/// - PostgreSQL dollar-quoted strings: `$$text$$` or `$tag$text$tag$`
/// - MySQL backtick identifiers: `` `identifier` ``
///
/// # Examples
/// ```
/// # use kodegen_tools_sql_guard::sql_parser::strip_comments;
/// # use kodegen_tools_sql_guard::types::DatabaseType;
/// let sql = "SELECT * FROM users -- get all\n/* WHERE active */";
/// assert_eq!(strip_comments(sql, DatabaseType::Postgres), "SELECT * FROM users");
///
/// let sql = "SELECT '-- kept' FROM t";
/// assert!(strip_comments(sql, DatabaseType::Postgres).contains("-- kept"));
/// ```
///
/// # Error Handling
/// If tokenization fails (unterminated string or comment), comments are
/// removed with a best-effort regex pass instead. This never fails.
pub fn strip_comments(sql: &str, db_type: DatabaseType) -> String {
    let dialect = get_dialect(db_type);
    let mut tokenizer = Tokenizer::new(&*dialect, sql);

    let cleaned = match tokenizer.tokenize_with_location() {
        Ok(tokens) => {
            remove_comment_spans(sql, &tokens).unwrap_or_else(|| strip_comments_by_pattern(sql))
        }
        Err(e) => {
            log::debug!("Tokenizer rejected input, stripping comments by pattern: {}", e);
            strip_comments_by_pattern(sql)
        }
    };

    cleaned.trim().to_string()
}

/// Cut comment tokens out of the original text, leaving every other byte as written
fn remove_comment_spans(sql: &str, tokens: &[TokenWithSpan]) -> Option<String> {
    let line_starts: Vec<usize> = std::iter::once(0)
        .chain(sql.match_indices('\n').map(|(i, _)| i + 1))
        .collect();

    let mut cleaned = String::with_capacity(sql.len());
    let mut copied = 0;
    for token in tokens {
        if !matches!(
            token.token,
            Token::Whitespace(Whitespace::SingleLineComment { .. })
                | Token::Whitespace(Whitespace::MultiLineComment(_))
        ) {
            continue;
        }
        let start = byte_offset(sql, &line_starts, token.span.start)?;
        let end = byte_offset(sql, &line_starts, token.span.end)?;
        if start < copied || end < start {
            return None;
        }
        cleaned.push_str(sql.get(copied..start)?);
        cleaned.push(' ');
        copied = end;
    }
    cleaned.push_str(sql.get(copied..)?);
    Some(cleaned)
}

/// Byte offset of a 1-based line/column (in chars) tokenizer location
fn byte_offset(sql: &str, line_starts: &[usize], location: Location) -> Option<usize> {
    let line = usize::try_from(location.line).ok()?.checked_sub(1)?;
    let column = usize::try_from(location.column).ok()?.checked_sub(1)?;
    let line_start = *line_starts.get(line)?;
    let rest = sql.get(line_start..)?;
    Some(
        rest.char_indices()
            .nth(column)
            .map_or(sql.len(), |(offset, _)| line_start + offset),
    )
}

fn strip_comments_by_pattern(sql: &str) -> String {
    let without_blocks = BLOCK_COMMENT.replace_all(sql, " ");
    let without_open_block = UNTERMINATED_BLOCK_COMMENT.replace_all(&without_blocks, " ");
    LINE_COMMENT.replace_all(&without_open_block, " ").into_owned()
}

/// Count top-level statements by splitting tokens on semicolons
///
/// Empty segments (trailing `;`, `;;`) are not counted. Returns `None` when
/// the text cannot be tokenized.
///
/// # Examples
/// ```
/// # use kodegen_tools_sql_guard::sql_parser::count_statements;
/// # use kodegen_tools_sql_guard::types::DatabaseType;
/// assert_eq!(count_statements("SELECT 1; SELECT ';'", DatabaseType::Postgres), Some(2));
/// assert_eq!(count_statements("SELECT 1;", DatabaseType::Postgres), Some(1));
/// ```
pub fn count_statements(sql: &str, db_type: DatabaseType) -> Option<usize> {
    let dialect = get_dialect(db_type);
    let tokens = Tokenizer::new(&*dialect, sql).tokenize().ok()?;

    let mut count = 0;
    let mut segment_has_content = false;
    for token in &tokens {
        match token {
            Token::SemiColon => {
                if segment_has_content {
                    count += 1;
                }
                segment_has_content = false;
            }
            Token::Whitespace(_) | Token::EOF => {}
            _ => segment_has_content = true,
        }
    }
    if segment_has_content {
        count += 1;
    }

    Some(count)
}

/// Parse SQL into AST statements for the given dialect
pub fn parse_statements(sql: &str, db_type: DatabaseType) -> Result<Vec<Statement>, ParserError> {
    let dialect = get_dialect(db_type);
    Parser::parse_sql(&*dialect, sql)
}

/// Check that `EXPLAIN <sql>` parses as a single EXPLAIN statement
pub fn explain_parses(sql: &str, db_type: DatabaseType) -> Result<(), String> {
    let explain_sql = format!("EXPLAIN {}", sql);
    match parse_statements(&explain_sql, db_type) {
        Ok(statements) => match statements.as_slice() {
            [Statement::Explain { .. }] => Ok(()),
            [_] => Err("EXPLAIN prefix did not produce an EXPLAIN statement".to_string()),
            other => Err(format!(
                "EXPLAIN prefix produced {} statements",
                other.len()
            )),
        },
        Err(e) => Err(e.to_string()),
    }
}

/// Classify a top-level statement by its root kind
pub fn statement_kind(stmt: &Statement) -> StatementKind {
    match stmt {
        Statement::Query(query) => query_kind(query),

        Statement::Insert { .. } => StatementKind::Insert,
        Statement::Update { .. } => StatementKind::Update,
        Statement::Delete { .. } => StatementKind::Delete,
        Statement::Merge { .. } => StatementKind::Merge,

        Statement::CreateTable { .. }
        | Statement::CreateView { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. }
        | Statement::CreateFunction { .. }
        | Statement::CreateProcedure { .. }
        | Statement::CreateRole { .. }
        | Statement::CreateTrigger { .. }
        | Statement::CreateType { .. }
        | Statement::CreateSequence { .. }
        | Statement::CreatePolicy { .. } => StatementKind::Create,

        Statement::AlterTable { .. }
        | Statement::AlterView { .. }
        | Statement::AlterIndex { .. }
        | Statement::AlterRole { .. }
        | Statement::AlterPolicy { .. } => StatementKind::Alter,

        Statement::Drop { .. }
        | Statement::DropFunction { .. }
        | Statement::DropProcedure { .. }
        | Statement::DropTrigger { .. }
        | Statement::DropPolicy { .. } => StatementKind::Drop,

        Statement::Truncate { .. } => StatementKind::Truncate,
        Statement::Copy { .. } | Statement::CopyIntoSnowflake { .. } => StatementKind::Copy,
        Statement::Grant { .. } => StatementKind::Grant,
        Statement::Revoke { .. } => StatementKind::Revoke,

        Statement::Explain { .. } | Statement::ExplainTable { .. } => StatementKind::Explain,

        Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowCollation { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowFunctions { .. } => StatementKind::Show,

        Statement::Execute { .. } => StatementKind::Execute,
        Statement::Call { .. } => StatementKind::Call,
        Statement::Use { .. } => StatementKind::Use,
        Statement::StartTransaction { .. }
        | Statement::Commit { .. }
        | Statement::Rollback { .. } => StatementKind::Transaction,
        Statement::Analyze { .. } => StatementKind::Analyze,
        Statement::Pragma { .. } => StatementKind::Pragma,
        Statement::AttachDatabase { .. } => StatementKind::Attach,

        _ => StatementKind::Other,
    }
}

/// Classify a query by its body; data-modifying bodies keep their own kind
pub fn query_kind(query: &Query) -> StatementKind {
    set_expr_kind(&query.body)
}

fn set_expr_kind(expr: &SetExpr) -> StatementKind {
    match expr {
        SetExpr::Select(_) | SetExpr::SetOperation { .. } | SetExpr::Table(_) => {
            StatementKind::Select
        }
        SetExpr::Query(query) => query_kind(query),
        SetExpr::Values(_) => StatementKind::Values,
        SetExpr::Insert(_) => StatementKind::Insert,
        SetExpr::Update(_) => StatementKind::Update,
        SetExpr::Delete(_) => StatementKind::Delete,
        SetExpr::Merge(_) => StatementKind::Merge,
    }
}
