// SQL guard command-line entry point
//
// Reads one SQL statement from the argument or stdin, validates it against
// the configured policy and prints the JSON result. Exits with status 1 when
// the statement is rejected.
//
// OPTIONAL: SQL_GUARD_CONFIG (JSON file) or SQL_GUARD_* environment variables.

use anyhow::{Context, Result};
use clap::Parser;
use kodegen_tools_sql_guard::{GuardConfig, ValidationResult};
use serde::Serialize;
use std::io::Read;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "kodegen-sql-guard",
    version,
    about = "Validate SQL statements against a data-access policy"
)]
struct Cli {
    /// SQL text; read from stdin when omitted
    sql: Option<String>,

    /// Also check that the statement parses under EXPLAIN
    #[arg(long, conflicts_with = "tables")]
    explain: bool,

    /// Print the referenced tables instead of validating
    #[arg(long)]
    tables: bool,

    /// Print the JSON schema of the validation result and exit
    #[arg(long, conflicts_with_all = ["explain", "tables"])]
    schema: bool,

    /// Single-line JSON output
    #[arg(long, default_value_t = false)]
    compact: bool,
}

fn read_stdin() -> Result<String> {
    let mut sql = String::new();
    std::io::stdin()
        .read_to_string(&mut sql)
        .context("Failed to read SQL from stdin")?;
    Ok(sql)
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<()> {
    let json = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

fn main() -> Result<ExitCode> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.schema {
        print_json(&schemars::schema_for!(ValidationResult), cli.compact)?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = GuardConfig::load().context("Failed to load SQL guard configuration")?;
    let validator = config
        .build_validator()
        .context("Invalid SQL guard configuration")?;
    log::debug!(
        "SQL guard ready for {} ({} statement kinds allowed)",
        validator.db_type(),
        validator.policy().allowed_statements().len()
    );

    let sql = match cli.sql {
        Some(sql) => sql,
        None => read_stdin()?,
    };

    if cli.tables {
        print_json(&validator.extract_tables(&sql), cli.compact)?;
        return Ok(ExitCode::SUCCESS);
    }

    let result = if cli.explain {
        validator.validate_for_explain(&sql)
    } else {
        validator.validate(&sql)
    };
    print_json(&result, cli.compact)?;

    Ok(if result.valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
