//! Data-access policy and the access-control decisions made against it
//!
//! All names are stored lower-cased so every comparison is case-insensitive.
//! Empty allow-lists are normalized to `None`: an empty list never means
//! "block everything".

use crate::error::GuardError;
use crate::types::{
    ColumnReference, DatabaseType, ReasonCode, StatementKind, TableReference, ValidationDetails,
};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Immutable policy snapshot shared by concurrent validations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    allowed_statements: BTreeSet<StatementKind>,
    blocked_tables: HashSet<String>,
    blocked_columns: HashMap<String, HashSet<String>>,
    allowed_tables: Option<HashSet<String>>,
    allowed_columns: Option<HashMap<String, HashSet<String>>>,
}

impl Default for ValidationPolicy {
    /// SELECT only, nothing blocked, no allow-lists
    fn default() -> Self {
        Self {
            allowed_statements: BTreeSet::from([StatementKind::Select]),
            blocked_tables: HashSet::new(),
            blocked_columns: HashMap::new(),
            allowed_tables: None,
            allowed_columns: None,
        }
    }
}

impl ValidationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the allowed statement kinds
    ///
    /// # Errors
    /// [`GuardError::EmptyAllowedStatements`] when `kinds` is empty.
    pub fn with_allowed_statements(
        mut self,
        kinds: impl IntoIterator<Item = StatementKind>,
    ) -> Result<Self, GuardError> {
        let kinds: BTreeSet<_> = kinds.into_iter().collect();
        if kinds.is_empty() {
            return Err(GuardError::EmptyAllowedStatements);
        }
        self.allowed_statements = kinds;
        Ok(self)
    }

    pub fn with_blocked_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.blocked_tables = lower_set(tables);
        self
    }

    pub fn with_blocked_columns<I, T, C, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = (T, C)>,
        T: AsRef<str>,
        C: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.blocked_columns = lower_map(columns);
        self
    }

    /// Switch table checking into allow-list mode (an empty list disables it)
    pub fn with_allowed_tables<I, S>(mut self, tables: Option<I>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_tables = tables.map(lower_set).filter(|set| !set.is_empty());
        self
    }

    /// Switch column checking into allow-list mode (an empty map disables it)
    pub fn with_allowed_columns<I, T, C, S>(mut self, columns: Option<I>) -> Self
    where
        I: IntoIterator<Item = (T, C)>,
        T: AsRef<str>,
        C: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_columns = columns.map(lower_map).filter(|map| !map.is_empty());
        self
    }

    pub fn allows_statement(&self, kind: StatementKind) -> bool {
        self.allowed_statements.contains(&kind)
    }

    pub fn allowed_statements(&self) -> &BTreeSet<StatementKind> {
        &self.allowed_statements
    }

    pub fn blocked_tables(&self) -> &HashSet<String> {
        &self.blocked_tables
    }

    pub fn blocked_columns(&self) -> &HashMap<String, HashSet<String>> {
        &self.blocked_columns
    }

    pub fn allowed_tables(&self) -> Option<&HashSet<String>> {
        self.allowed_tables.as_ref()
    }

    pub fn allowed_columns(&self) -> Option<&HashMap<String, HashSet<String>>> {
        self.allowed_columns.as_ref()
    }
}

fn lower_set<I, S>(names: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| name.as_ref().trim().to_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

fn lower_map<I, T, C, S>(entries: I) -> HashMap<String, HashSet<String>>
where
    I: IntoIterator<Item = (T, C)>,
    T: AsRef<str>,
    C: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut map: HashMap<String, HashSet<String>> = HashMap::new();
    for (table, columns) in entries {
        let table = table.as_ref().trim().to_lowercase();
        if table.is_empty() {
            continue;
        }
        map.entry(table).or_default().extend(lower_set(columns));
    }
    map
}

/// Lookup keys for a referenced table: bare name, then `schema.name`
fn table_keys(table: &TableReference) -> Vec<String> {
    let bare = table.name.to_lowercase();
    let qualified = table.qualified_lower();
    if qualified == bare {
        vec![bare]
    } else {
        vec![bare, qualified]
    }
}

/// Lookup keys for a column owner, including the schema-qualified forms of
/// every referenced table carrying that name
fn owner_keys(owner: &str, tables: &[TableReference]) -> Vec<String> {
    let owner = owner.to_lowercase();
    let mut keys = vec![owner.clone()];
    for table in tables {
        if table.name.to_lowercase() == owner {
            let qualified = table.qualified_lower();
            if !keys.contains(&qualified) {
                keys.push(qualified);
            }
        }
    }
    keys
}

fn find_set<'a>(
    map: &'a HashMap<String, HashSet<String>>,
    keys: &[String],
) -> Option<&'a HashSet<String>> {
    keys.iter().find_map(|key| map.get(key))
}

/// Evaluate references against block-lists and allow-lists
///
/// Returns the first failing check, in order: blocked tables, allowed tables,
/// blocked columns, allowed columns.
///
/// # Examples
/// ```
/// # use kodegen_tools_sql_guard::policy::{check_access, ValidationPolicy};
/// # use kodegen_tools_sql_guard::types::{ReasonCode, TableReference, ValidationDetails};
/// let policy = ValidationPolicy::new().with_blocked_tables(["Users"]);
/// let details = ValidationDetails {
///     tables: vec![TableReference { name: "users".into(), alias: None, schema: None }],
///     columns: vec![],
/// };
/// let (reason, _) = check_access(&details, &policy).unwrap_or((ReasonCode::SyntaxError, String::new()));
/// assert_eq!(reason, ReasonCode::BlockedTable);
/// ```
pub fn check_access(
    details: &ValidationDetails,
    policy: &ValidationPolicy,
) -> Option<(ReasonCode, String)> {
    check_blocked_tables(&details.tables, policy)
        .or_else(|| check_allowed_tables(&details.tables, policy))
        .or_else(|| check_blocked_columns(details, policy))
        .or_else(|| check_allowed_columns(details, policy))
}

fn check_blocked_tables(
    tables: &[TableReference],
    policy: &ValidationPolicy,
) -> Option<(ReasonCode, String)> {
    tables.iter().find_map(|table| {
        table_keys(table)
            .iter()
            .any(|key| policy.blocked_tables.contains(key))
            .then(|| {
                (
                    ReasonCode::BlockedTable,
                    format!("Access to table '{}' is blocked", table.name),
                )
            })
    })
}

fn check_allowed_tables(
    tables: &[TableReference],
    policy: &ValidationPolicy,
) -> Option<(ReasonCode, String)> {
    let allowed = policy.allowed_tables.as_ref()?;
    tables.iter().find_map(|table| {
        (!table_keys(table).iter().any(|key| allowed.contains(key))).then(|| {
            (
                ReasonCode::UnauthorizedTable,
                format!("Table '{}' is not in the allowed tables list", table.name),
            )
        })
    })
}

fn check_blocked_columns(
    details: &ValidationDetails,
    policy: &ValidationPolicy,
) -> Option<(ReasonCode, String)> {
    if policy.blocked_columns.is_empty() {
        return None;
    }

    details.columns.iter().find_map(|column| match &column.table {
        Some(owner) => {
            let blocked = find_set(&policy.blocked_columns, &owner_keys(owner, &details.tables))?;
            if column.is_wildcard() {
                (!blocked.is_empty()).then(|| {
                    (
                        ReasonCode::BlockedColumn,
                        format!(
                            "Wildcard on table '{}' would expose blocked columns",
                            owner
                        ),
                    )
                })
            } else {
                blocked.contains(&column.name.to_lowercase()).then(|| {
                    (
                        ReasonCode::BlockedColumn,
                        format!("Access to column '{}.{}' is blocked", owner, column.name),
                    )
                })
            }
        }
        None => unresolved_blocked(column, details, policy),
    })
}

/// An unattributed column is blocked if any referenced table blocks its name
fn unresolved_blocked(
    column: &ColumnReference,
    details: &ValidationDetails,
    policy: &ValidationPolicy,
) -> Option<(ReasonCode, String)> {
    let name = column.name.to_lowercase();
    details.tables.iter().find_map(|table| {
        find_set(&policy.blocked_columns, &table_keys(table))
            .filter(|blocked| blocked.contains(&name))
            .map(|_| {
                (
                    ReasonCode::BlockedColumn,
                    format!(
                        "Access to column '{}' is blocked on table '{}'",
                        column.name, table.name
                    ),
                )
            })
    })
}

fn check_allowed_columns(
    details: &ValidationDetails,
    policy: &ValidationPolicy,
) -> Option<(ReasonCode, String)> {
    let allowed = policy.allowed_columns.as_ref()?;

    details.columns.iter().find_map(|column| {
        let name = column.name.to_lowercase();
        match &column.table {
            Some(owner) => {
                // Tables without an entry are unrestricted
                let permitted = find_set(allowed, &owner_keys(owner, &details.tables))?;
                if column.is_wildcard() {
                    Some((
                        ReasonCode::UnauthorizedColumn,
                        format!(
                            "Wildcard on table '{}' is not permitted: only listed columns are allowed",
                            owner
                        ),
                    ))
                } else {
                    (!permitted.contains(&name)).then(|| {
                        (
                            ReasonCode::UnauthorizedColumn,
                            format!(
                                "Column '{}.{}' is not in the allowed columns list",
                                owner, column.name
                            ),
                        )
                    })
                }
            }
            None => (!allowed.values().any(|permitted| permitted.contains(&name))).then(|| {
                (
                    ReasonCode::UnauthorizedColumn,
                    format!("Column '{}' is not in the allowed columns list", column.name),
                )
            }),
        }
    })
}

/// Reject any reference to a reserved system schema or catalog table
///
/// Independent of every allow-list.
pub fn check_system_schema(
    details: &ValidationDetails,
    db_type: DatabaseType,
) -> Option<(ReasonCode, String)> {
    details.tables.iter().find_map(|table| {
        let name_hit = db_type.is_system_name(&table.name.to_lowercase());
        let schema_hit = table
            .schema
            .as_ref()
            .is_some_and(|schema| db_type.is_system_name(&schema.to_lowercase()));
        (name_hit || schema_hit).then(|| {
            let shown = match &table.schema {
                Some(schema) => format!("{}.{}", schema, table.name),
                None => table.name.clone(),
            };
            (
                ReasonCode::SystemSchemaAccess,
                format!("Access to system table '{}' is not allowed", shown),
            )
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(name: &str, schema: Option<&str>) -> TableReference {
        TableReference {
            name: name.to_string(),
            alias: None,
            schema: schema.map(str::to_string),
        }
    }

    fn col(name: &str, table: Option<&str>) -> ColumnReference {
        ColumnReference {
            name: name.to_string(),
            table: table.map(str::to_string),
            alias: None,
        }
    }

    fn reason(details: &ValidationDetails, policy: &ValidationPolicy) -> Option<ReasonCode> {
        check_access(details, policy).map(|(code, _)| code)
    }

    #[test]
    fn test_default_policy_allows_only_select() {
        let policy = ValidationPolicy::default();
        assert!(policy.allows_statement(StatementKind::Select));
        assert!(!policy.allows_statement(StatementKind::Insert));
        assert!(policy.allowed_tables().is_none());
        assert!(policy.allowed_columns().is_none());
    }

    #[test]
    fn test_empty_allowed_statements_rejected() {
        let result = ValidationPolicy::new().with_allowed_statements(Vec::new());
        assert!(matches!(result, Err(GuardError::EmptyAllowedStatements)));
    }

    #[test]
    fn test_empty_allow_lists_mean_unrestricted() {
        let policy = ValidationPolicy::new()
            .with_allowed_tables(Some(Vec::<String>::new()))
            .with_allowed_columns(Some(Vec::<(String, Vec<String>)>::new()));
        assert!(policy.allowed_tables().is_none());
        assert!(policy.allowed_columns().is_none());

        let details = ValidationDetails {
            tables: vec![table("anything", None)],
            columns: vec![col("x", Some("anything"))],
        };
        assert_eq!(reason(&details, &policy), None);
    }

    #[test]
    fn test_names_are_normalized_to_lowercase() {
        let policy = ValidationPolicy::new()
            .with_blocked_tables([" Secrets "])
            .with_blocked_columns([("USERS", ["Password"])]);
        assert!(policy.blocked_tables().contains("secrets"));
        assert!(policy.blocked_columns()["users"].contains("password"));
    }

    #[test]
    fn test_blocked_table_by_bare_or_qualified_name() {
        let details = ValidationDetails {
            tables: vec![table("Users", Some("public"))],
            columns: vec![],
        };
        let bare = ValidationPolicy::new().with_blocked_tables(["users"]);
        let qualified = ValidationPolicy::new().with_blocked_tables(["public.users"]);
        let other = ValidationPolicy::new().with_blocked_tables(["archive.users"]);
        assert_eq!(reason(&details, &bare), Some(ReasonCode::BlockedTable));
        assert_eq!(reason(&details, &qualified), Some(ReasonCode::BlockedTable));
        assert_eq!(reason(&details, &other), None);
    }

    #[test]
    fn test_allowed_tables_exclusive() {
        let policy = ValidationPolicy::new().with_allowed_tables(Some(["products", "orders"]));
        let ok = ValidationDetails {
            tables: vec![table("PRODUCTS", None)],
            columns: vec![],
        };
        let bad = ValidationDetails {
            tables: vec![table("products", None), table("users", None)],
            columns: vec![],
        };
        assert_eq!(reason(&ok, &policy), None);
        assert_eq!(reason(&bad, &policy), Some(ReasonCode::UnauthorizedTable));
    }

    #[test]
    fn test_blocked_table_takes_precedence_over_allow_list() {
        let policy = ValidationPolicy::new()
            .with_blocked_tables(["users"])
            .with_allowed_tables(Some(["products"]));
        let details = ValidationDetails {
            tables: vec![table("users", None)],
            columns: vec![],
        };
        assert_eq!(reason(&details, &policy), Some(ReasonCode::BlockedTable));
    }

    #[test]
    fn test_blocked_columns_resolved_wildcard_and_unresolved() {
        let policy = ValidationPolicy::new().with_blocked_columns([("users", ["password"])]);
        let resolved = ValidationDetails {
            tables: vec![table("users", None)],
            columns: vec![col("id", Some("users")), col("PASSWORD", Some("users"))],
        };
        let wildcard = ValidationDetails {
            tables: vec![table("users", None)],
            columns: vec![col("*", Some("users"))],
        };
        let unresolved = ValidationDetails {
            tables: vec![table("users", None), table("orders", None)],
            columns: vec![col("password", None)],
        };
        let elsewhere = ValidationDetails {
            tables: vec![table("orders", None)],
            columns: vec![col("password", Some("orders")), col("*", Some("orders"))],
        };
        assert_eq!(reason(&resolved, &policy), Some(ReasonCode::BlockedColumn));
        assert_eq!(reason(&wildcard, &policy), Some(ReasonCode::BlockedColumn));
        assert_eq!(reason(&unresolved, &policy), Some(ReasonCode::BlockedColumn));
        assert_eq!(reason(&elsewhere, &policy), None);
    }

    #[test]
    fn test_allowed_columns_per_table_and_fallback() {
        let policy = ValidationPolicy::new()
            .with_allowed_columns(Some([("users", vec!["id", "name"])]));

        let listed = ValidationDetails {
            tables: vec![table("users", None)],
            columns: vec![col("ID", Some("users")), col("name", Some("users"))],
        };
        let unlisted = ValidationDetails {
            tables: vec![table("users", None)],
            columns: vec![col("email", Some("users"))],
        };
        let unrestricted_table = ValidationDetails {
            tables: vec![table("orders", None)],
            columns: vec![col("total", Some("orders")), col("*", Some("orders"))],
        };
        let wildcard = ValidationDetails {
            tables: vec![table("users", None)],
            columns: vec![col("*", Some("users"))],
        };
        let fallback_ok = ValidationDetails {
            tables: vec![table("users", None), table("orders", None)],
            columns: vec![col("name", None)],
        };
        let fallback_bad = ValidationDetails {
            tables: vec![table("users", None), table("orders", None)],
            columns: vec![col("status", None)],
        };

        assert_eq!(reason(&listed, &policy), None);
        assert_eq!(reason(&unlisted, &policy), Some(ReasonCode::UnauthorizedColumn));
        assert_eq!(reason(&unrestricted_table, &policy), None);
        assert_eq!(reason(&wildcard, &policy), Some(ReasonCode::UnauthorizedColumn));
        assert_eq!(reason(&fallback_ok, &policy), None);
        assert_eq!(reason(&fallback_bad, &policy), Some(ReasonCode::UnauthorizedColumn));
    }

    #[test]
    fn test_system_schema_by_name_or_schema() {
        let by_schema = ValidationDetails {
            tables: vec![table("pg_tables", Some("pg_catalog"))],
            columns: vec![],
        };
        let by_name = ValidationDetails {
            tables: vec![table("pg_stat_activity", None)],
            columns: vec![],
        };
        let metadata = ValidationDetails {
            tables: vec![table("tables", Some("INFORMATION_SCHEMA"))],
            columns: vec![],
        };
        let plain = ValidationDetails {
            tables: vec![table("pages", Some("public"))],
            columns: vec![],
        };
        let pg = DatabaseType::Postgres;
        assert!(check_system_schema(&by_schema, pg).is_some());
        assert!(check_system_schema(&by_name, pg).is_some());
        assert!(check_system_schema(&metadata, pg).is_some());
        assert!(check_system_schema(&plain, pg).is_none());
        assert!(check_system_schema(&by_name, DatabaseType::MySQL).is_none());
    }
}
