//! Guard configuration from a JSON file or `SQL_GUARD_*` environment variables
//!
//! Environment variables:
//! - `SQL_GUARD_CONFIG`: path to a JSON file; when set, the other variables are ignored
//! - `SQL_GUARD_DIALECT`: dialect name or connection URL (falls back to `DATABASE_DSN`)
//! - `SQL_GUARD_ALLOWED_STATEMENTS`: comma-separated statement kinds
//! - `SQL_GUARD_BLOCKED_TABLES`, `SQL_GUARD_ALLOWED_TABLES`: comma-separated table names
//! - `SQL_GUARD_BLOCKED_COLUMNS`, `SQL_GUARD_ALLOWED_COLUMNS`: JSON objects
//!   mapping table name to a list of column names
//!
//! Malformed values are errors, never silently treated as empty.

use crate::error::GuardError;
use crate::policy::ValidationPolicy;
use crate::types::{DatabaseType, StatementKind};
use crate::validator::SqlValidator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const CONFIG_PATH_VAR: &str = "SQL_GUARD_CONFIG";
const DIALECT_VAR: &str = "SQL_GUARD_DIALECT";
const DSN_VAR: &str = "DATABASE_DSN";
const ALLOWED_STATEMENTS_VAR: &str = "SQL_GUARD_ALLOWED_STATEMENTS";
const BLOCKED_TABLES_VAR: &str = "SQL_GUARD_BLOCKED_TABLES";
const BLOCKED_COLUMNS_VAR: &str = "SQL_GUARD_BLOCKED_COLUMNS";
const ALLOWED_TABLES_VAR: &str = "SQL_GUARD_ALLOWED_TABLES";
const ALLOWED_COLUMNS_VAR: &str = "SQL_GUARD_ALLOWED_COLUMNS";

/// Serializable guard settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardConfig {
    /// Dialect name (`postgres`, `mysql`, ...) or connection URL
    pub dialect: Option<String>,

    /// Statement kinds to accept; `None` means SELECT only
    pub allowed_statements: Option<Vec<String>>,

    pub blocked_tables: Vec<String>,

    pub blocked_columns: BTreeMap<String, Vec<String>>,

    /// Presence (non-empty) switches to table allow-list mode
    pub allowed_tables: Option<Vec<String>>,

    /// Presence (non-empty) switches to column allow-list mode
    pub allowed_columns: Option<BTreeMap<String, Vec<String>>>,
}

impl GuardConfig {
    /// Load from `SQL_GUARD_CONFIG` if set, otherwise from the environment
    pub fn load() -> Result<Self, GuardError> {
        match non_empty(std::env::var(CONFIG_PATH_VAR).ok()) {
            Some(path) => {
                log::info!("Loading SQL guard config from {}", path);
                Self::from_json_file(path)
            }
            None => Self::from_env(),
        }
    }

    pub fn from_env() -> Result<Self, GuardError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GuardError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| non_empty(lookup(key));

        let dialect = get(DIALECT_VAR).or_else(|| get(DSN_VAR));
        let allowed_statements = get(ALLOWED_STATEMENTS_VAR).map(|raw| split_list(&raw));
        let blocked_tables = get(BLOCKED_TABLES_VAR)
            .map(|raw| split_list(&raw))
            .unwrap_or_default();
        let allowed_tables = get(ALLOWED_TABLES_VAR).map(|raw| split_list(&raw));
        let blocked_columns = get(BLOCKED_COLUMNS_VAR)
            .map(|raw| parse_column_map(BLOCKED_COLUMNS_VAR, &raw))
            .transpose()?
            .unwrap_or_default();
        let allowed_columns = get(ALLOWED_COLUMNS_VAR)
            .map(|raw| parse_column_map(ALLOWED_COLUMNS_VAR, &raw))
            .transpose()?;

        Ok(Self {
            dialect,
            allowed_statements,
            blocked_tables,
            blocked_columns,
            allowed_tables,
            allowed_columns,
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, GuardError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, GuardError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Dialect, defaulting to PostgreSQL
    pub fn database_type(&self) -> Result<DatabaseType, GuardError> {
        match &self.dialect {
            Some(dialect) => dialect.parse(),
            None => Ok(DatabaseType::default()),
        }
    }

    pub fn build_policy(&self) -> Result<ValidationPolicy, GuardError> {
        let mut policy = ValidationPolicy::new()
            .with_blocked_tables(&self.blocked_tables)
            .with_blocked_columns(&self.blocked_columns)
            .with_allowed_tables(self.allowed_tables.as_ref())
            .with_allowed_columns(self.allowed_columns.as_ref());

        if let Some(names) = &self.allowed_statements {
            let kinds = names
                .iter()
                .map(|name| name.parse::<StatementKind>())
                .collect::<Result<Vec<_>, _>>()?;
            policy = policy.with_allowed_statements(kinds)?;
        }
        Ok(policy)
    }

    pub fn build_validator(&self) -> Result<SqlValidator, GuardError> {
        Ok(SqlValidator::with_policy(
            self.database_type()?,
            self.build_policy()?,
        ))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_column_map(key: &str, raw: &str) -> Result<BTreeMap<String, Vec<String>>, GuardError> {
    serde_json::from_str(raw).map_err(|e| {
        GuardError::invalid_config(key, format!("expected a JSON object of column lists: {}", e))
    })
}
