pub mod accounts;
pub mod categories;
pub mod counterparts;
pub mod overview;
pub mod transactions;

use axum::Json;
use kasboek_core::{Period, ValidationError};
use serde::Deserialize;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// `?year=&month=` filter; a month of 0 means the whole year.
#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

impl PeriodQuery {
    pub fn period(&self) -> Result<Period, ValidationError> {
        Period::new(self.year, self.month)
    }
}
