//! Tests for store module

use super::*;
use crate::decode::QuoteRow;
use crate::error::Error;
use chrono::{NaiveDate, NaiveDateTime};
use std::time::Duration;
use test_case::test_case;

fn at(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 17)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

fn row(code: &str, price: f64, time: NaiveDateTime) -> QuoteRow {
    QuoteRow {
        stock_code: code.to_string(),
        stock_name: format!("name-{code}"),
        current_price: Some(price),
        change_percent: Some(1.5),
        change_amount: None,
        volume: Some(1000),
        amount: Some(12345.67),
        amplitude: None,
        turnover_rate: None,
        volume_ratio: None,
        high_price: None,
        low_price: None,
        open_price: None,
        pre_close: None,
        market_cap: Some(217_931_000.0),
        pe_ratio: None,
        pb_ratio: None,
        update_time: time,
    }
}

fn memory_pool() -> ConnectionPool {
    ConnectionPool::open(&StoreConfig::in_memory().with_pool_size(2)).unwrap()
}

fn price_of(conn: &duckdb::Connection, code: &str) -> Option<f64> {
    conn.query_row(
        "SELECT CAST(current_price AS DOUBLE) FROM stock_data WHERE stock_code = ?",
        [code],
        |r| r.get(0),
    )
    .unwrap()
}

// ============================================================================
// Schema Tests
// ============================================================================

#[test_case("stock_data" => true)]
#[test_case("_quotes2" => true)]
#[test_case("2quotes" => false)]
#[test_case("stock-data" => false)]
#[test_case("stock_data; DROP TABLE x" => false)]
#[test_case("" => false)]
fn test_is_identifier(name: &str) -> bool {
    is_identifier(name)
}

#[test]
fn test_create_table_sql() {
    let sql = create_table_sql("stock_data").unwrap();
    assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS stock_data ("));
    assert!(sql.contains("market_cap DECIMAL(20,2)"));
    assert!(sql.contains("PRIMARY KEY (stock_code, update_time)"));
}

#[test]
fn test_create_table_rejects_bad_name() {
    let err = create_table_sql("x; --").unwrap_err();
    assert!(matches!(err, Error::InvalidConfigValue { .. }));
}

#[test]
fn test_ensure_schema_is_idempotent() {
    let conn = duckdb::Connection::open_in_memory().unwrap();
    ensure_schema(&conn, "stock_data").unwrap();
    ensure_schema(&conn, "stock_data").unwrap();
    assert_eq!(row_count(&conn, "stock_data").unwrap(), 0);
}

#[test]
fn test_recreate_schema_drops_rows() {
    let mut conn = duckdb::Connection::open_in_memory().unwrap();
    ensure_schema(&conn, "stock_data").unwrap();
    upsert_rows(&mut conn, "stock_data", &[row("000001", 10.0, at(9))], 50).unwrap();
    assert_eq!(row_count(&conn, "stock_data").unwrap(), 1);

    recreate_schema(&conn, "stock_data").unwrap();
    assert_eq!(row_count(&conn, "stock_data").unwrap(), 0);
}

// ============================================================================
// Upsert Tests
// ============================================================================

#[test]
fn test_upsert_sql_updates_non_key_columns() {
    let sql = upsert_sql("stock_data").unwrap();
    assert!(sql.contains("ON CONFLICT (stock_code, update_time) DO UPDATE SET"));
    assert!(sql.contains("stock_name = excluded.stock_name"));
    assert!(!sql.contains("stock_code = excluded.stock_code"));
    assert!(sql.contains("CAST(? AS TIMESTAMP)"));
}

#[test]
fn test_upsert_inserts_then_updates() {
    let mut conn = duckdb::Connection::open_in_memory().unwrap();
    ensure_schema(&conn, "stock_data").unwrap();

    let written = upsert_rows(
        &mut conn,
        "stock_data",
        &[row("000001", 10.0, at(9)), row("000002", 20.0, at(9))],
        50,
    )
    .unwrap();
    assert_eq!(written, 2);

    // Same key: update in place
    upsert_rows(&mut conn, "stock_data", &[row("000001", 11.5, at(9))], 50).unwrap();
    assert_eq!(row_count(&conn, "stock_data").unwrap(), 2);
    assert_eq!(price_of(&conn, "000001"), Some(11.5));

    // New capture time: new snapshot
    upsert_rows(&mut conn, "stock_data", &[row("000001", 12.0, at(10))], 50).unwrap();
    assert_eq!(row_count(&conn, "stock_data").unwrap(), 3);
}

#[test]
fn test_upsert_stores_nulls_and_timestamp() {
    let mut conn = duckdb::Connection::open_in_memory().unwrap();
    ensure_schema(&conn, "stock_data").unwrap();

    let mut suspended = row("600000", 0.0, at(15));
    suspended.current_price = None;
    suspended.volume = None;
    upsert_rows(&mut conn, "stock_data", &[suspended], 50).unwrap();

    let (price, volume, time): (Option<f64>, Option<i64>, String) = conn
        .query_row(
            "SELECT CAST(current_price AS DOUBLE), volume, CAST(update_time AS VARCHAR) \
             FROM stock_data",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .unwrap();
    assert_eq!(price, None);
    assert_eq!(volume, None);
    assert_eq!(time, "2024-05-17 15:00:00");
}

#[test]
fn test_upsert_in_chunks() {
    let mut conn = duckdb::Connection::open_in_memory().unwrap();
    ensure_schema(&conn, "stock_data").unwrap();

    let rows: Vec<_> = (0..7)
        .map(|i| row(&format!("{i:06}"), f64::from(i), at(9)))
        .collect();

    assert_eq!(upsert_rows(&mut conn, "stock_data", &rows, 3).unwrap(), 7);
    assert_eq!(row_count(&conn, "stock_data").unwrap(), 7);
}

#[test]
fn test_upsert_empty_is_noop() {
    let mut conn = duckdb::Connection::open_in_memory().unwrap();
    // No table needed: nothing is written
    assert_eq!(upsert_rows(&mut conn, "stock_data", &[], 50).unwrap(), 0);
}

#[test]
fn test_upsert_missing_table_fails() {
    let mut conn = duckdb::Connection::open_in_memory().unwrap();
    let err = upsert_rows(&mut conn, "stock_data", &[row("1", 1.0, at(9))], 50).unwrap_err();
    assert!(matches!(err, Error::Database(_)));
}

// ============================================================================
// Pool Tests
// ============================================================================

#[test]
fn test_pool_rejects_zero_size() {
    let err = ConnectionPool::open(&StoreConfig::in_memory().with_pool_size(0)).unwrap_err();
    assert!(matches!(err, Error::InvalidConfigValue { .. }));
}

#[tokio::test]
async fn test_pool_connections_share_database() {
    let pool = memory_pool();

    let first = pool.checkout().await.unwrap();
    let second = pool.checkout().await.unwrap();
    assert_eq!(pool.available(), 0);

    ensure_schema(&first, "stock_data").unwrap();
    assert_eq!(row_count(&second, "stock_data").unwrap(), 0);
}

#[tokio::test]
async fn test_pool_returns_connection_on_drop() {
    let pool = memory_pool();
    {
        let _conn = pool.checkout().await.unwrap();
        assert_eq!(pool.available(), 1);
    }
    assert_eq!(pool.available(), 2);
}

#[tokio::test]
async fn test_pool_checkout_times_out() {
    let config = StoreConfig::in_memory()
        .with_pool_size(1)
        .with_checkout_timeout(Duration::ZERO);
    let pool = ConnectionPool::open(&config).unwrap();

    let held = pool.checkout().await.unwrap();
    let err = pool.checkout().await.unwrap_err();
    assert!(matches!(err, Error::Pool { .. }));
    assert!(!err.is_fatal());

    drop(held);
    assert!(pool.checkout().await.is_ok());
}

#[tokio::test]
async fn test_with_connection_runs_blocking_work() {
    let pool = memory_pool();
    pool.with_connection(|conn| ensure_schema(conn, "stock_data"))
        .await
        .unwrap();

    let written = pool
        .with_connection(|conn| upsert_rows(conn, "stock_data", &[row("1", 1.0, at(9))], 50))
        .await
        .unwrap();
    assert_eq!(written, 1);
    assert_eq!(pool.available(), 2);
}

#[tokio::test]
async fn test_bootstrap_creates_and_recreates() {
    let pool = memory_pool();

    bootstrap(&pool, "stock_data", false, 3, Duration::ZERO)
        .await
        .unwrap();
    pool.with_connection(|conn| upsert_rows(conn, "stock_data", &[row("1", 1.0, at(9))], 50))
        .await
        .unwrap();

    bootstrap(&pool, "stock_data", true, 3, Duration::ZERO)
        .await
        .unwrap();
    let count = pool
        .with_connection(|conn| row_count(conn, "stock_data"))
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_bootstrap_bad_table_is_not_retried() {
    let pool = memory_pool();
    let err = bootstrap(&pool, "bad name", false, 3, Duration::from_secs(60))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidConfigValue { .. }));
}
