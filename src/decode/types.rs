//! Decoder types
//!
//! Page classification and the typed row persisted for each listing record.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a listing page contained
#[derive(Debug, Clone, PartialEq)]
pub enum PageContent {
    /// No payload: the listing has run out of pages
    Empty,
    /// Raw records in response order
    Records(Vec<Value>),
}

impl PageContent {
    /// Check if the page carried no records
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Records(records) => records.is_empty(),
        }
    }

    /// Number of raw records
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Records(records) => records.len(),
        }
    }
}

/// One quote snapshot, keyed by `(stock_code, update_time)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteRow {
    pub stock_code: String,
    pub stock_name: String,
    pub current_price: Option<f64>,
    pub change_percent: Option<f64>,
    pub change_amount: Option<f64>,
    pub volume: Option<i64>,
    pub amount: Option<f64>,
    /// Intraday range as a percentage of the previous close
    pub amplitude: Option<f64>,
    pub turnover_rate: Option<f64>,
    pub volume_ratio: Option<f64>,
    pub high_price: Option<f64>,
    pub low_price: Option<f64>,
    pub open_price: Option<f64>,
    pub pre_close: Option<f64>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub update_time: NaiveDateTime,
}
