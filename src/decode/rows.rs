//! Record → row mapping
//!
//! The listing reports prices and ratios as integers scaled by 100 and uses
//! `"-"` or `"_"` for "no value" (suspended stocks, missing ratios).

use super::types::QuoteRow;
use chrono::{Local, NaiveDateTime, SubsecRound};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

/// Divisor applied to every scaled decimal field
pub const PRICE_SCALE: f64 = 100.0;

/// Timestamp shared by every row of one page
pub fn capture_time() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

impl QuoteRow {
    /// Map one raw record; records without a code are skipped
    pub fn from_record(record: &Value, update_time: NaiveDateTime) -> Option<Self> {
        let stock_code = text(record, "f12")?;

        Some(Self {
            stock_code,
            stock_name: text(record, "f14").unwrap_or_default(),
            current_price: scaled(record.get("f2")),
            change_percent: scaled(record.get("f3")),
            change_amount: scaled(record.get("f4")),
            volume: integer(record.get("f5")),
            amount: scaled(record.get("f6")),
            amplitude: scaled(record.get("f7")),
            turnover_rate: scaled(record.get("f8")),
            volume_ratio: scaled(record.get("f10")),
            high_price: scaled(record.get("f15")),
            low_price: scaled(record.get("f16")),
            open_price: scaled(record.get("f17")),
            pre_close: scaled(record.get("f18")),
            market_cap: scaled(record.get("f20")),
            pe_ratio: scaled(record.get("f9")),
            pb_ratio: scaled(record.get("f23")),
            update_time,
        })
    }
}

/// Map a page of records, keeping the last record for each stock code
pub fn map_records(records: &[Value], update_time: NaiveDateTime) -> Vec<QuoteRow> {
    let mut rows: Vec<QuoteRow> = Vec::with_capacity(records.len());
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(records.len());

    for record in records {
        let Some(row) = QuoteRow::from_record(record, update_time) else {
            debug!("Skipping record without a stock code");
            continue;
        };
        match seen.get(&row.stock_code) {
            Some(&idx) => rows[idx] = row,
            None => {
                seen.insert(row.stock_code.clone(), rows.len());
                rows.push(row);
            }
        }
    }

    rows
}

fn text(record: &Value, key: &str) -> Option<String> {
    let s = match record.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

/// Parse a scaled decimal, tolerating placeholders
fn scaled(value: Option<&Value>) -> Option<f64> {
    number(value?).map(|n| n / PRICE_SCALE)
}

/// Parse an integer, tolerating placeholders
fn integer(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}
