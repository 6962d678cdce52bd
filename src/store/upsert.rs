//! Batched upsert of quote rows

use super::schema::{checked_table, COLUMNS, KEY_COLUMNS};
use crate::decode::QuoteRow;
use crate::error::Result;
use duckdb::{params, Connection};
use tracing::debug;

/// Timestamp layout bound into `CAST(? AS TIMESTAMP)`
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Build the insert-or-update statement for `table`
pub fn upsert_sql(table: &str) -> Result<String> {
    let table = checked_table(table)?;

    let names = COLUMNS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = COLUMNS
        .iter()
        .map(|(name, _)| {
            if *name == "update_time" {
                "CAST(? AS TIMESTAMP)"
            } else {
                "?"
            }
        })
        .collect::<Vec<_>>()
        .join(", ");
    let updates = COLUMNS
        .iter()
        .map(|(name, _)| *name)
        .filter(|name| !KEY_COLUMNS.contains(name))
        .map(|name| format!("{name} = excluded.{name}"))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!(
        "INSERT INTO {table} ({names}) VALUES ({placeholders}) \
         ON CONFLICT ({}) DO UPDATE SET {updates}",
        KEY_COLUMNS.join(", ")
    ))
}

/// Insert or update `rows`, committing every `chunk_size` rows.
///
/// Returns the number of rows written. A failing chunk rolls back and aborts
/// the call; chunks committed before it stay.
pub fn upsert_rows(
    conn: &mut Connection,
    table: &str,
    rows: &[QuoteRow],
    chunk_size: usize,
) -> Result<usize> {
    if rows.is_empty() {
        return Ok(0);
    }

    let sql = upsert_sql(table)?;
    let mut written = 0;

    for chunk in rows.chunks(chunk_size.max(1)) {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in chunk {
                stmt.execute(params![
                    row.stock_code,
                    row.stock_name,
                    row.current_price,
                    row.change_percent,
                    row.change_amount,
                    row.volume,
                    row.amount,
                    row.amplitude,
                    row.turnover_rate,
                    row.volume_ratio,
                    row.high_price,
                    row.low_price,
                    row.open_price,
                    row.pre_close,
                    row.market_cap,
                    row.pe_ratio,
                    row.pb_ratio,
                    row.update_time.format(TIMESTAMP_FORMAT).to_string(),
                ])?;
            }
        }
        tx.commit()?;
        written += chunk.len();
        debug!(table, rows = chunk.len(), "Committed upsert chunk");
    }

    Ok(written)
}
