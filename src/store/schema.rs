//! Table bootstrap

use crate::error::{Error, Result};
use duckdb::Connection;
use tracing::{info, warn};

/// Column definitions, in insert order
pub const COLUMNS: &[(&str, &str)] = &[
    ("stock_code", "VARCHAR(10)"),
    ("stock_name", "VARCHAR(100)"),
    ("current_price", "DECIMAL(10,2)"),
    ("change_percent", "DECIMAL(10,2)"),
    ("change_amount", "DECIMAL(10,2)"),
    ("volume", "BIGINT"),
    ("amount", "DECIMAL(20,2)"),
    ("amplitude", "DECIMAL(10,2)"),
    ("turnover_rate", "DECIMAL(10,2)"),
    ("volume_ratio", "DECIMAL(10,2)"),
    ("high_price", "DECIMAL(10,2)"),
    ("low_price", "DECIMAL(10,2)"),
    ("open_price", "DECIMAL(10,2)"),
    ("pre_close", "DECIMAL(10,2)"),
    ("market_cap", "DECIMAL(20,2)"),
    ("pe_ratio", "DECIMAL(20,2)"),
    ("pb_ratio", "DECIMAL(20,2)"),
    ("update_time", "TIMESTAMP"),
];

/// Natural key of a quote row
pub const KEY_COLUMNS: &[&str] = &["stock_code", "update_time"];

/// Check that `name` can be spliced into SQL as a bare identifier
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

pub(crate) fn checked_table(table: &str) -> Result<&str> {
    if is_identifier(table) {
        Ok(table)
    } else {
        Err(Error::invalid_value(
            "database.table",
            format!("'{table}' is not a valid table name"),
        ))
    }
}

/// Build the `CREATE TABLE` statement for `table`
pub fn create_table_sql(table: &str) -> Result<String> {
    let table = checked_table(table)?;
    let columns = COLUMNS
        .iter()
        .map(|(name, ty)| format!("    {name} {ty}"))
        .collect::<Vec<_>>()
        .join(",\n");

    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n{columns},\n    PRIMARY KEY ({})\n)",
        KEY_COLUMNS.join(", ")
    ))
}

/// Create the quote table if it is missing
pub fn ensure_schema(conn: &Connection, table: &str) -> Result<()> {
    let sql = create_table_sql(table)?;
    conn.execute_batch(&sql)
        .map_err(|e| Error::schema(format!("Failed to create table {table}: {e}")))?;
    info!(table, "Quote table ready");
    Ok(())
}

/// Drop and recreate the quote table
pub fn recreate_schema(conn: &Connection, table: &str) -> Result<()> {
    let table = checked_table(table)?;
    warn!(table, "Dropping existing quote table");
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {table}"))
        .map_err(|e| Error::schema(format!("Failed to drop table {table}: {e}")))?;
    ensure_schema(conn, table)
}

/// Number of rows currently in `table`
pub fn row_count(conn: &Connection, table: &str) -> Result<u64> {
    let table = checked_table(table)?;
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    Ok(count.max(0) as u64)
}
