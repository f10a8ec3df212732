//! SQL statement guard for LLM-generated queries
//!
//! Validates candidate SQL against a data-access policy before execution:
//! comment stripping, a keyword denylist, single-statement and
//! statement-kind checks, table/column block-lists and allow-lists, a system
//! schema guard and CTE write detection. Dialects: PostgreSQL, MySQL,
//! MariaDB, SQLite and SQL Server.

pub mod config;
pub mod cte;
pub mod error;
pub mod extract;
pub mod keywords;
pub mod policy;
pub mod sql_parser;
pub mod types;
pub mod validator;

// Re-exports
pub use config::GuardConfig;
pub use error::GuardError;
pub use policy::ValidationPolicy;
pub use sql_parser::strip_comments;
pub use types::{
    ColumnReference, DatabaseType, ReasonCode, StatementKind, TableReference, ValidationDetails,
    ValidationResult,
};
pub use validator::SqlValidator;
