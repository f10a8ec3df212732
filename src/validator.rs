//! Policy-driven gate between generated SQL text and execution
//!
//! Stages run in a fixed order and the first rejection wins:
//! 1. comment stripping
//! 2. keyword denylist (before parsing)
//! 3. parse, single-statement check and statement-kind check
//! 4. table and column extraction
//! 5. block-list and allow-list decisions
//! 6. system schema guard
//! 7. CTE write detection
//!
//! The policy is read through an `Arc` snapshot taken once per call, so a
//! concurrent policy swap never affects a validation already in progress.

use crate::cte::find_forbidden_cte_operation;
use crate::error::GuardError;
use crate::extract::{Extraction, extract_from_statements, extract_references};
use crate::keywords::find_forbidden_keyword;
use crate::policy::{ValidationPolicy, check_access, check_system_schema};
use crate::sql_parser::{
    count_statements, explain_parses, parse_statements, statement_kind, strip_comments,
};
use crate::types::{DatabaseType, ReasonCode, StatementKind, ValidationDetails, ValidationResult};
use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

/// Raw input and its comment-stripped form, alive for one call
struct CandidateStatement<'a> {
    raw: &'a str,
    cleaned: String,
}

impl<'a> CandidateStatement<'a> {
    fn new(raw: &'a str, db_type: DatabaseType) -> Self {
        Self {
            raw,
            cleaned: strip_comments(raw, db_type),
        }
    }
}

/// SQL statement validator holding a swappable policy snapshot
#[derive(Debug)]
pub struct SqlValidator {
    db_type: DatabaseType,
    policy: RwLock<Arc<ValidationPolicy>>,
}

impl Default for SqlValidator {
    fn default() -> Self {
        Self::new(DatabaseType::default())
    }
}

impl SqlValidator {
    /// Validator with the default policy (SELECT only, nothing blocked)
    pub fn new(db_type: DatabaseType) -> Self {
        Self::with_policy(db_type, ValidationPolicy::default())
    }

    pub fn with_policy(db_type: DatabaseType, policy: ValidationPolicy) -> Self {
        Self {
            db_type,
            policy: RwLock::new(Arc::new(policy)),
        }
    }

    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    /// Current policy snapshot
    pub fn policy(&self) -> Arc<ValidationPolicy> {
        let guard = self.policy.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Publish a new policy; validations already running keep their snapshot
    pub fn replace_policy(&self, policy: ValidationPolicy) {
        let mut guard = self.policy.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(policy);
        log::info!("SQL guard policy replaced");
    }

    /// Copy the current snapshot, change it, and swap it in under the write lock
    fn update_policy<F>(&self, field: &str, update: F) -> Result<(), GuardError>
    where
        F: FnOnce(ValidationPolicy) -> Result<ValidationPolicy, GuardError>,
    {
        let mut guard = self.policy.write().unwrap_or_else(PoisonError::into_inner);
        let next = update(ValidationPolicy::clone(&guard))?;
        *guard = Arc::new(next);
        log::info!("SQL guard policy updated: {}", field);
        Ok(())
    }

    fn swap_field<F>(&self, field: &str, update: F)
    where
        F: FnOnce(ValidationPolicy) -> ValidationPolicy,
    {
        let mut guard = self.policy.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(update(ValidationPolicy::clone(&guard)));
        log::info!("SQL guard policy updated: {}", field);
    }

    /// Replace the allowed statement kinds
    ///
    /// # Errors
    /// [`GuardError::EmptyAllowedStatements`] for an empty set; the current
    /// policy is left unchanged.
    pub fn set_allowed_statements(
        &self,
        kinds: impl IntoIterator<Item = StatementKind>,
    ) -> Result<(), GuardError> {
        self.update_policy("allowed_statements", |policy| {
            policy.with_allowed_statements(kinds)
        })
    }

    pub fn set_blocked_tables<I, S>(&self, tables: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.swap_field("blocked_tables", |policy| policy.with_blocked_tables(tables));
    }

    pub fn set_blocked_columns<I, T, C, S>(&self, columns: I)
    where
        I: IntoIterator<Item = (T, C)>,
        T: AsRef<str>,
        C: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.swap_field("blocked_columns", |policy| {
            policy.with_blocked_columns(columns)
        });
    }

    /// `None` or an empty list removes the table allow-list
    pub fn set_allowed_tables<I, S>(&self, tables: Option<I>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.swap_field("allowed_tables", |policy| policy.with_allowed_tables(tables));
    }

    /// `None` or an empty map removes the column allow-list
    pub fn set_allowed_columns<I, T, C, S>(&self, columns: Option<I>)
    where
        I: IntoIterator<Item = (T, C)>,
        T: AsRef<str>,
        C: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.swap_field("allowed_columns", |policy| {
            policy.with_allowed_columns(columns)
        });
    }

    /// Validate one candidate statement
    ///
    /// Never panics and never fails: every rejection is a [`ValidationResult`]
    /// carrying a [`ReasonCode`].
    ///
    /// # Examples
    /// ```
    /// # use kodegen_tools_sql_guard::{DatabaseType, ReasonCode, SqlValidator};
    /// let validator = SqlValidator::new(DatabaseType::Postgres);
    /// validator.set_blocked_tables(["users"]);
    ///
    /// let result = validator.validate("SELECT id FROM users");
    /// assert!(!result.valid);
    /// assert_eq!(result.reason_code, Some(ReasonCode::BlockedTable));
    ///
    /// let result = validator.validate("SELECT * FROM orders; DROP TABLE orders;");
    /// assert_eq!(result.reason_code, Some(ReasonCode::MultiStatementError));
    /// ```
    pub fn validate(&self, sql: &str) -> ValidationResult {
        let policy = self.policy();
        let candidate = CandidateStatement::new(sql, self.db_type);
        let result = self.run(&candidate, &policy);

        if let (Some(reason), Some(message)) = (&result.reason_code, &result.message) {
            log::debug!(
                "SQL rejected ({}): {} [{} bytes]",
                reason,
                message,
                candidate.raw.len()
            );
        }
        result
    }

    fn run(&self, candidate: &CandidateStatement<'_>, policy: &ValidationPolicy) -> ValidationResult {
        let cleaned = candidate.cleaned.as_str();
        if cleaned.is_empty() {
            return ValidationResult::rejected(
                ReasonCode::SyntaxError,
                "SQL statement is empty",
                None,
            );
        }

        if let Some(keyword) = find_forbidden_keyword(cleaned) {
            if count_statements(cleaned, self.db_type).is_some_and(|count| count > 1) {
                return ValidationResult::rejected(
                    ReasonCode::MultiStatementError,
                    "Multiple SQL statements are not allowed",
                    None,
                );
            }
            return ValidationResult::rejected(
                ReasonCode::ForbiddenKeyword,
                format!("Forbidden keyword detected: {}", keyword),
                None,
            );
        }

        let statements = match parse_statements(cleaned, self.db_type) {
            Ok(statements) => statements,
            Err(e) => {
                return ValidationResult::rejected(
                    ReasonCode::SyntaxError,
                    format!("SQL syntax error: {}", e),
                    None,
                );
            }
        };

        let [statement] = statements.as_slice() else {
            return ValidationResult::rejected(
                ReasonCode::MultiStatementError,
                format!(
                    "Exactly one SQL statement is allowed, found {}",
                    statements.len()
                ),
                None,
            );
        };

        let Extraction {
            tables,
            columns,
            nested_writes,
        } = extract_references(statement);
        let details = ValidationDetails { tables, columns };

        let kind = statement_kind(statement);
        if !policy.allows_statement(kind) {
            return ValidationResult::rejected(
                ReasonCode::DisallowedStatementType,
                format!("Statement type {} is not allowed", kind),
                Some(details),
            );
        }

        if let Some((reason, message)) = check_access(&details, policy) {
            return ValidationResult::rejected(reason, message, Some(details));
        }

        if let Some((reason, message)) = check_system_schema(&details, self.db_type) {
            return ValidationResult::rejected(reason, message, Some(details));
        }

        if let Some(message) = forbidden_cte_operation(cleaned, &nested_writes) {
            return ValidationResult::rejected(
                ReasonCode::ForbiddenCteOperation,
                message,
                Some(details),
            );
        }

        ValidationResult::accepted(details)
    }

    /// Validate, then check that the statement also parses under `EXPLAIN`
    ///
    /// A failed EXPLAIN parse is reported in `warnings` and never changes the
    /// verdict.
    pub fn validate_for_explain(&self, sql: &str) -> ValidationResult {
        let mut result = self.validate(sql);
        if !result.valid {
            return result;
        }

        let cleaned = strip_comments(sql, self.db_type);
        if let Err(e) = explain_parses(&cleaned, self.db_type) {
            log::warn!("EXPLAIN form of a validated statement did not parse: {}", e);
            result
                .warnings
                .push(format!("EXPLAIN form did not parse: {}", e));
        }
        result
    }

    /// Physical table names referenced by `sql`, in first-seen order
    ///
    /// Diagnostic helper: no policy is applied. Names are unique ignoring
    /// case, so `users` and `pg_catalog.users` are listed once. Returns an
    /// empty list when the text does not parse.
    pub fn extract_tables(&self, sql: &str) -> Vec<String> {
        let cleaned = strip_comments(sql, self.db_type);
        match parse_statements(&cleaned, self.db_type) {
            Ok(statements) => {
                let mut seen = HashSet::new();
                extract_from_statements(&statements)
                    .tables
                    .into_iter()
                    .map(|table| table.name)
                    .filter(|name| seen.insert(name.to_lowercase()))
                    .collect()
            }
            Err(e) => {
                log::debug!("Table extraction skipped, SQL did not parse: {}", e);
                Vec::new()
            }
        }
    }
}

/// Write operations inside a CTE body, by text scan or by AST
///
/// Every verb the text scan looks for is also on the keyword denylist, which
/// runs first, so through `validate` this stage only fires for a write body
/// the denylist does not name. It stays as a second line behind the denylist.
fn forbidden_cte_operation(cleaned: &str, nested_writes: &[StatementKind]) -> Option<String> {
    if let Some(verb) = find_forbidden_cte_operation(cleaned) {
        return Some(format!("Forbidden operation in CTE: {}", verb));
    }
    nested_writes
        .first()
        .map(|kind| format!("Data-modifying {} nested inside query", kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pg() -> SqlValidator {
        SqlValidator::new(DatabaseType::Postgres)
    }

    fn reason_of(validator: &SqlValidator, sql: &str) -> Option<ReasonCode> {
        validator.validate(sql).reason_code
    }

    #[test]
    fn test_plain_select_is_valid() {
        let result = pg().validate("SELECT id, name FROM products WHERE price > 10");
        assert!(result.valid, "unexpected rejection: {:?}", result.message);
        assert!(result.reason_code.is_none());
        assert!(result.message.is_none());
        let details = result.details.unwrap_or_default();
        assert_eq!(details.tables.len(), 1);
        assert_eq!(details.tables[0].name, "products");
    }

    #[test]
    fn test_multi_statement_smuggling() {
        let v = pg();
        assert_eq!(
            reason_of(&v, "SELECT * FROM users; DROP TABLE users;"),
            Some(ReasonCode::MultiStatementError)
        );
        assert_eq!(
            reason_of(&v, "SELECT 1; SELECT 2"),
            Some(ReasonCode::MultiStatementError)
        );
    }

    #[test]
    fn test_blocked_table_direct_and_via_alias() {
        let v = pg();
        v.set_blocked_tables(["users"]);
        for sql in [
            "SELECT id FROM users",
            "SELECT u.id FROM users AS u",
            "SELECT x.id FROM Public.USERS x",
            "SELECT id FROM orders WHERE user_id IN (SELECT id FROM users)",
            "WITH recent AS (SELECT * FROM users) SELECT * FROM recent",
            "SELECT * FROM (SELECT id FROM users) t",
        ] {
            let result = v.validate(sql);
            assert_eq!(
                result.reason_code,
                Some(ReasonCode::BlockedTable),
                "not blocked: {}",
                sql
            );
            assert!(result.details.is_some(), "details missing for: {}", sql);
        }
        assert!(v.validate("SELECT id FROM orders").valid);
    }

    #[test]
    fn test_blocked_column() {
        let v = pg();
        v.set_blocked_columns([("users", ["password"])]);
        assert_eq!(
            reason_of(&v, "SELECT id, password FROM users"),
            Some(ReasonCode::BlockedColumn)
        );
        assert_eq!(
            reason_of(&v, "SELECT * FROM users"),
            Some(ReasonCode::BlockedColumn)
        );
        assert_eq!(
            reason_of(
                &v,
                "SELECT u.id FROM users u JOIN orders o ON u.id = o.user_id WHERE password = 'x'"
            ),
            Some(ReasonCode::BlockedColumn)
        );
        assert!(v.validate("SELECT id, email FROM users").valid);
    }

    #[test]
    fn test_with_drop_is_forbidden_keyword() {
        let result = pg().validate("WITH x AS (SELECT * FROM users) DROP TABLE users");
        assert_eq!(result.reason_code, Some(ReasonCode::ForbiddenKeyword));
        assert!(result.details.is_none());
    }

    #[test]
    fn test_case_obfuscated_keywords() {
        let v = pg();
        for sql in ["dRoP TABLE users", "SELECT 1 FROM t WHERE 1=1 uNiOn ALL sElEcT 1; DeLeTe FROM t"] {
            let reason = reason_of(&v, sql);
            assert!(
                matches!(
                    reason,
                    Some(ReasonCode::ForbiddenKeyword) | Some(ReasonCode::MultiStatementError)
                ),
                "{:?} for {}",
                reason,
                sql
            );
        }
    }

    #[test]
    fn test_join_is_valid_with_both_tables() {
        let result =
            pg().validate("SELECT u.id, o.total FROM users u JOIN orders o ON u.id = o.user_id");
        assert!(result.valid, "{:?}", result.message);
        let names: Vec<_> = result
            .details
            .unwrap_or_default()
            .tables
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, ["users", "orders"]);
    }

    #[test]
    fn test_system_schema_not_overridable() {
        let v = pg();
        assert_eq!(
            reason_of(&v, "SELECT * FROM pg_catalog.pg_tables"),
            Some(ReasonCode::SystemSchemaAccess)
        );
        v.set_allowed_tables(Some(["pg_tables", "pg_catalog.pg_tables", "tables"]));
        assert_eq!(
            reason_of(&v, "SELECT * FROM pg_catalog.pg_tables"),
            Some(ReasonCode::SystemSchemaAccess)
        );
        assert_eq!(
            reason_of(&v, "SELECT table_name FROM information_schema.tables"),
            Some(ReasonCode::SystemSchemaAccess)
        );
    }

    #[test]
    fn test_comment_hidden_payloads() {
        let v = pg();
        let result = v.validate("SELECT * FROM orders /* ; DROP TABLE orders */");
        assert!(result.valid, "{:?}", result.message);

        let result = v.validate("SELECT 1 -- ; DELETE FROM orders");
        assert!(result.valid, "{:?}", result.message);

        assert_eq!(reason_of(&v, "SEL/**/ECT 1"), Some(ReasonCode::SyntaxError));
    }

    #[test]
    fn test_empty_and_unparseable_input() {
        let v = pg();
        for sql in ["", "   ", "-- only a comment", "/* nothing */"] {
            let result = v.validate(sql);
            assert_eq!(result.reason_code, Some(ReasonCode::SyntaxError), "{:?}", sql);
            assert!(result.details.is_none());
        }
        let result = v.validate("SELECT * FROM");
        assert_eq!(result.reason_code, Some(ReasonCode::SyntaxError));
        assert!(result.details.is_none());
    }

    #[test]
    fn test_statement_type_allow_list() {
        let v = pg();
        let result = v.validate("EXPLAIN SELECT id FROM orders");
        assert_eq!(result.reason_code, Some(ReasonCode::DisallowedStatementType));
        assert!(result.details.is_some());

        let set = v.set_allowed_statements([StatementKind::Select, StatementKind::Explain]);
        assert!(set.is_ok());
        assert!(v.validate("EXPLAIN SELECT id FROM orders").valid);
    }

    #[test]
    fn test_empty_allowed_statements_leaves_policy_unchanged() {
        let v = pg();
        let before = v.policy();
        let result = v.set_allowed_statements(Vec::new());
        assert!(matches!(result, Err(GuardError::EmptyAllowedStatements)));
        assert_eq!(*v.policy(), *before);
        assert!(v.validate("SELECT 1").valid);
    }

    #[test]
    fn test_allowed_tables_mode() {
        let v = pg();
        v.set_allowed_tables(Some(["products", "orders"]));
        assert!(v.validate("SELECT name FROM products").valid);
        assert_eq!(
            reason_of(&v, "SELECT p.name FROM products p JOIN users u ON u.id = p.owner_id"),
            Some(ReasonCode::UnauthorizedTable)
        );

        v.set_allowed_tables(None::<Vec<String>>);
        assert!(v.validate("SELECT id FROM users").valid);
    }

    #[test]
    fn test_allowed_columns_mode() {
        let v = pg();
        v.set_allowed_columns(Some([("customers", vec!["id", "name", "region"])]));
        assert!(v.validate("SELECT id, name FROM customers WHERE region = 'EU'").valid);
        assert_eq!(
            reason_of(&v, "SELECT id, ssn FROM customers"),
            Some(ReasonCode::UnauthorizedColumn)
        );
        assert_eq!(
            reason_of(&v, "SELECT * FROM customers"),
            Some(ReasonCode::UnauthorizedColumn)
        );
    }

    #[test]
    fn test_analytical_queries_pass() {
        let v = pg();
        for sql in [
            "SELECT id FROM customers UNION SELECT id FROM suppliers",
            "SELECT dept, AVG(salary) AS avg_salary FROM employees GROUP BY dept HAVING AVG(salary) > 1000 ORDER BY avg_salary DESC",
            "SELECT id, ROW_NUMBER() OVER (PARTITION BY dept ORDER BY salary DESC) AS rn FROM employees",
            "WITH totals AS (SELECT user_id, SUM(total) AS spent FROM orders GROUP BY user_id) SELECT * FROM totals WHERE spent > 100",
            "SELECT CASE WHEN total > 100 THEN 'big' ELSE 'small' END AS size FROM orders",
            "SELECT name FROM products p WHERE EXISTS (SELECT 1 FROM orders o WHERE o.product_id = p.id)",
            "SELECT id FROM customers WHERE name = 'O''Brien'",
        ] {
            let result = v.validate(sql);
            assert!(result.valid, "rejected {}: {:?}", sql, result.message);
        }
    }

    #[test]
    fn test_validation_is_deterministic() {
        let v = pg();
        v.set_blocked_columns([("users", ["password"])]);
        for sql in [
            "SELECT id, password FROM users",
            "SELECT u.id FROM users u JOIN orders o ON u.id = o.user_id",
            "DROP TABLE users",
            "SELECT * FROM",
        ] {
            assert_eq!(v.validate(sql), v.validate(sql), "differs for {}", sql);
        }
    }

    #[test]
    fn test_validate_for_explain() {
        let v = pg();
        let result = v.validate_for_explain("SELECT id FROM orders");
        assert!(result.valid);
        assert!(result.warnings.is_empty(), "{:?}", result.warnings);

        let rejected = v.validate_for_explain("DELETE FROM orders");
        assert_eq!(rejected, v.validate("DELETE FROM orders"));
    }

    #[test]
    fn test_extract_tables() {
        let v = pg();
        assert_eq!(
            v.extract_tables("SELECT * FROM a JOIN b ON a.id = b.id WHERE a.x IN (SELECT x FROM c)"),
            ["a", "b", "c"]
        );
        assert!(v.extract_tables("SELECT * FROM").is_empty());
    }

    #[test]
    fn test_extract_tables_lists_each_name_once() {
        let v = pg();
        assert_eq!(
            v.extract_tables("SELECT 1 FROM users JOIN pg_catalog.users ON true"),
            ["users"]
        );
        assert_eq!(
            v.extract_tables("SELECT 1 FROM Orders o JOIN orders p ON o.id = p.parent_id"),
            ["Orders"]
        );
    }

    #[test]
    fn test_blocked_table_inside_function_like_expressions() {
        let v = pg();
        v.set_blocked_tables(["secrets"]);
        for sql in [
            "SELECT TRIM((SELECT token FROM secrets))",
            "SELECT CEIL((SELECT amount FROM secrets))",
            "SELECT POSITION('a' IN (SELECT token FROM secrets))",
            "SELECT (SELECT ARRAY[token] FROM secrets)[1]",
        ] {
            assert_eq!(reason_of(&v, sql), Some(ReasonCode::BlockedTable), "{}", sql);
        }
        assert_eq!(
            reason_of(&v, "SELECT TRIM((SELECT usename FROM pg_catalog.pg_user))"),
            Some(ReasonCode::SystemSchemaAccess)
        );
        assert!(v.validate("SELECT TRIM(name), CEIL(total) FROM orders").valid);
    }

    #[test]
    fn test_blocked_table_in_query_clauses() {
        let v = pg();
        v.set_blocked_tables(["secrets"]);
        for sql in [
            "SELECT id FROM orders LIMIT (SELECT count(*) FROM secrets)",
            "SELECT id FROM orders LIMIT 10 OFFSET (SELECT count(*) FROM secrets)",
            "SELECT DISTINCT ON ((SELECT token FROM secrets)) id FROM orders",
            "SELECT string_agg(id::text, ',' ORDER BY (SELECT token FROM secrets)) FROM orders",
            "SELECT id, row_number() OVER w FROM orders WINDOW w AS (PARTITION BY (SELECT token FROM secrets))",
            "SELECT sum(total) OVER (ORDER BY id ROWS BETWEEN (SELECT count(*) FROM secrets) PRECEDING AND CURRENT ROW) FROM orders",
        ] {
            assert_eq!(reason_of(&v, sql), Some(ReasonCode::BlockedTable), "{}", sql);
        }
        assert!(
            v.validate("SELECT DISTINCT ON (user_id) user_id, total FROM orders LIMIT 5")
                .valid
        );
    }

    #[test]
    fn test_whole_row_reference_hits_blocked_column() {
        let v = pg();
        v.set_blocked_columns([("users", ["password"])]);
        for sql in [
            "SELECT u FROM users u",
            "SELECT to_json(u) FROM users u",
            "SELECT to_json(u.*) FROM users u",
            "SELECT (u).password FROM users u",
        ] {
            assert_eq!(reason_of(&v, sql), Some(ReasonCode::BlockedColumn), "{}", sql);
        }
    }

    #[test]
    fn test_system_schemas_per_dialect() {
        let cases = [
            (DatabaseType::MySQL, "SELECT host FROM mysql.user"),
            (DatabaseType::MySQL, "SELECT * FROM performance_schema.threads"),
            (DatabaseType::MariaDB, "SELECT * FROM information_schema.tables"),
            (DatabaseType::SQLite, "SELECT name FROM sqlite_master"),
            (DatabaseType::SqlServer, "SELECT name FROM sys.objects"),
        ];
        for (db_type, sql) in cases {
            let v = SqlValidator::new(db_type);
            assert_eq!(
                reason_of(&v, sql),
                Some(ReasonCode::SystemSchemaAccess),
                "{} on {}",
                sql,
                db_type
            );
        }
        assert!(SqlValidator::new(DatabaseType::MySQL).validate("SELECT * FROM pg_stats").valid);
    }

    #[test]
    fn test_cte_write_stage_behind_keyword_denylist() {
        let sql = "WITH u AS (UPDATE users SET active = false RETURNING id) SELECT * FROM u";
        assert_eq!(reason_of(&pg(), sql), Some(ReasonCode::ForbiddenKeyword));

        assert_eq!(
            forbidden_cte_operation(sql, &[]).as_deref(),
            Some("Forbidden operation in CTE: UPDATE")
        );

        let statements = parse_statements(sql, DatabaseType::Postgres).unwrap_or_default();
        let nested = extract_from_statements(&statements).nested_writes;
        assert_eq!(
            forbidden_cte_operation("SELECT * FROM u", &nested).as_deref(),
            Some("Data-modifying UPDATE nested inside query")
        );
        assert!(forbidden_cte_operation("SELECT * FROM u", &[]).is_none());
    }

    #[test]
    fn test_replace_policy_and_snapshot() {
        let v = pg();
        let snapshot = v.policy();
        v.replace_policy(ValidationPolicy::new().with_blocked_tables(["orders"]));
        assert!(snapshot.blocked_tables().is_empty());
        assert!(v.policy().blocked_tables().contains("orders"));
        assert_eq!(
            reason_of(&v, "SELECT * FROM orders"),
            Some(ReasonCode::BlockedTable)
        );
    }

    #[test]
    fn test_concurrent_validation_during_policy_swaps() {
        let v = pg();
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        let result = v.validate("SELECT id FROM users");
                        assert!(
                            result.valid || result.reason_code == Some(ReasonCode::BlockedTable),
                            "unexpected result: {:?}",
                            result
                        );
                    }
                });
            }
            scope.spawn(|| {
                for i in 0..50 {
                    if i % 2 == 0 {
                        v.set_blocked_tables(["users"]);
                    } else {
                        v.set_blocked_tables(Vec::<String>::new());
                    }
                }
            });
        });
    }
}
