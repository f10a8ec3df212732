//! Type definitions for SQL statement validation

use crate::error::GuardError;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Database type for SQL dialect-specific handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DatabaseType {
    #[default]
    Postgres,
    MySQL,
    MariaDB,
    SQLite,
    SqlServer,
}

impl DatabaseType {
    /// Detect database type from connection URL scheme
    ///
    /// # Examples
    /// ```
    /// # use kodegen_tools_sql_guard::types::DatabaseType;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let db = DatabaseType::from_url("postgres://localhost/mydb")?;
    /// assert_eq!(db, DatabaseType::Postgres);
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_url(url: &str) -> Result<Self, GuardError> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Self::Postgres)
        } else if url.starts_with("mysql://") {
            Ok(Self::MySQL)
        } else if url.starts_with("mariadb://") {
            Ok(Self::MariaDB)
        } else if url.starts_with("sqlite:") || url.starts_with("file:") {
            Ok(Self::SQLite)
        } else if url.starts_with("sqlserver://") || url.starts_with("mssql://") {
            Ok(Self::SqlServer)
        } else {
            Err(GuardError::UnsupportedDatabase(format!(
                "Cannot determine database type from URL: {}",
                url
            )))
        }
    }

    /// Table or schema name prefixes reserved for the system catalog
    ///
    /// - **PostgreSQL**: `pg_` (covers `pg_catalog`, `pg_toast` and the `pg_*` views)
    /// - **SQLite**: `sqlite_` (`sqlite_master`, `sqlite_schema`) and `pragma_` table-valued functions
    /// - **MySQL/MariaDB**, **SQL Server**: none, system schemas are matched by name
    pub fn system_prefixes(&self) -> &'static [&'static str] {
        match self {
            Self::Postgres => &["pg_"],
            Self::SQLite => &["sqlite_", "pragma_"],
            Self::MySQL | Self::MariaDB | Self::SqlServer => &[],
        }
    }

    /// Schema names reserved for metadata, matched exactly
    pub fn metadata_schemas(&self) -> &'static [&'static str] {
        match self {
            Self::Postgres | Self::SQLite => &["information_schema"],
            Self::MySQL | Self::MariaDB => {
                &["information_schema", "mysql", "performance_schema", "sys"]
            }
            Self::SqlServer => &["information_schema", "sys"],
        }
    }

    /// Whether a lower-cased table or schema name belongs to the system catalog
    pub fn is_system_name(&self, lowered: &str) -> bool {
        self.system_prefixes()
            .iter()
            .any(|prefix| lowered.starts_with(prefix))
            || self.metadata_schemas().contains(&lowered)
    }
}

impl FromStr for DatabaseType {
    type Err = GuardError;

    /// Accepts a dialect name (`postgres`, `mysql`, ...) or a connection URL
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.contains(':') {
            return Self::from_url(trimmed);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "mysql" => Ok(Self::MySQL),
            "mariadb" => Ok(Self::MariaDB),
            "sqlite" => Ok(Self::SQLite),
            "sqlserver" | "mssql" => Ok(Self::SqlServer),
            other => Err(GuardError::UnsupportedDatabase(other.to_string())),
        }
    }
}

impl fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres => write!(f, "PostgreSQL"),
            Self::MySQL => write!(f, "MySQL"),
            Self::MariaDB => write!(f, "MariaDB"),
            Self::SQLite => write!(f, "SQLite"),
            Self::SqlServer => write!(f, "SQL Server"),
        }
    }
}

/// Root kind of a parsed statement
///
/// Set operations (`UNION`, `INTERSECT`, `EXCEPT`) and CTE-prefixed queries
/// are [`StatementKind::Select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatementKind {
    Select,
    Values,
    Insert,
    Update,
    Delete,
    Merge,
    Create,
    Alter,
    Drop,
    Truncate,
    Copy,
    Grant,
    Revoke,
    Explain,
    Show,
    Execute,
    Call,
    Use,
    Transaction,
    Analyze,
    Pragma,
    Attach,
    Other,
}

impl StatementKind {
    const ALL: [StatementKind; 23] = [
        Self::Select,
        Self::Values,
        Self::Insert,
        Self::Update,
        Self::Delete,
        Self::Merge,
        Self::Create,
        Self::Alter,
        Self::Drop,
        Self::Truncate,
        Self::Copy,
        Self::Grant,
        Self::Revoke,
        Self::Explain,
        Self::Show,
        Self::Execute,
        Self::Call,
        Self::Use,
        Self::Transaction,
        Self::Analyze,
        Self::Pragma,
        Self::Attach,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Values => "VALUES",
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Merge => "MERGE",
            Self::Create => "CREATE",
            Self::Alter => "ALTER",
            Self::Drop => "DROP",
            Self::Truncate => "TRUNCATE",
            Self::Copy => "COPY",
            Self::Grant => "GRANT",
            Self::Revoke => "REVOKE",
            Self::Explain => "EXPLAIN",
            Self::Show => "SHOW",
            Self::Execute => "EXECUTE",
            Self::Call => "CALL",
            Self::Use => "USE",
            Self::Transaction => "TRANSACTION",
            Self::Analyze => "ANALYZE",
            Self::Pragma => "PRAGMA",
            Self::Attach => "ATTACH",
            Self::Other => "OTHER",
        }
    }
}

impl FromStr for StatementKind {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| GuardError::UnknownStatementKind(wanted.to_string()))
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a statement was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ReasonCode {
    SyntaxError,
    MultiStatementError,
    DisallowedStatementType,
    ForbiddenKeyword,
    BlockedTable,
    BlockedColumn,
    UnauthorizedTable,
    UnauthorizedColumn,
    SystemSchemaAccess,
    #[serde(rename = "ForbiddenCTEOperation")]
    ForbiddenCteOperation,
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SyntaxError => "SyntaxError",
            Self::MultiStatementError => "MultiStatementError",
            Self::DisallowedStatementType => "DisallowedStatementType",
            Self::ForbiddenKeyword => "ForbiddenKeyword",
            Self::BlockedTable => "BlockedTable",
            Self::BlockedColumn => "BlockedColumn",
            Self::UnauthorizedTable => "UnauthorizedTable",
            Self::UnauthorizedColumn => "UnauthorizedColumn",
            Self::SystemSchemaAccess => "SystemSchemaAccess",
            Self::ForbiddenCteOperation => "ForbiddenCTEOperation",
        };
        f.write_str(name)
    }
}

/// Physical table referenced by a statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableReference {
    /// Table name as written (unquoted)
    pub name: String,

    /// Alias given in the FROM clause (if any)
    pub alias: Option<String>,

    /// Schema qualifier (if any)
    pub schema: Option<String>,
}

impl TableReference {
    /// Lower-cased `schema.name`, or the lower-cased name when unqualified
    pub fn qualified_lower(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema.to_lowercase(), self.name.to_lowercase()),
            None => self.name.to_lowercase(),
        }
    }
}

/// Column referenced by a statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnReference {
    /// Column name, or `*` for a wildcard
    pub name: String,

    /// Owning physical table, `None` when it cannot be resolved
    pub table: Option<String>,

    /// Output alias in the projection (if any)
    pub alias: Option<String>,
}

impl ColumnReference {
    pub fn is_wildcard(&self) -> bool {
        self.name == "*"
    }
}

/// Table and column references gathered from a parsed statement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationDetails {
    pub tables: Vec<TableReference>,
    pub columns: Vec<ColumnReference>,
}

/// Outcome of validating one candidate statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationResult {
    /// Whether the statement may be executed
    pub valid: bool,

    /// Rejection reason, `None` iff `valid`
    pub reason_code: Option<ReasonCode>,

    /// Human-readable rejection message, `None` iff `valid`
    pub message: Option<String>,

    /// References found, `None` when rejection happened before or during parsing
    pub details: Option<ValidationDetails>,

    /// Informational diagnostics that did not affect the verdict
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn accepted(details: ValidationDetails) -> Self {
        Self {
            valid: true,
            reason_code: None,
            message: None,
            details: Some(details),
            warnings: Vec::new(),
        }
    }

    pub fn rejected(
        reason: ReasonCode,
        message: impl Into<String>,
        details: Option<ValidationDetails>,
    ) -> Self {
        Self {
            valid: false,
            reason_code: Some(reason),
            message: Some(message.into()),
            details,
            warnings: Vec::new(),
        }
    }
}
