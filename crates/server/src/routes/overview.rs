//! Per-type overviews for the dashboard charts.

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use kasboek_core::summary::{MonthOverview, YearOverview};
use kasboek_core::Period;
use kasboek_storage::reports;
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::ActiveAccount;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/type/overview/month", get(month))
        .route("/type/overview/year", get(year))
}

#[derive(Debug, Deserialize)]
struct MonthQuery {
    year: i32,
    #[serde(default)]
    month: u32,
}

async fn month(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Query(query): Query<MonthQuery>,
) -> Result<Json<Vec<MonthOverview>>, ApiError> {
    let period = Period::new(Some(query.year), Some(query.month))?;
    let mut conn = state.conn().await?;
    Ok(Json(reports::month_breakdowns(&mut conn, &owner, period).await?))
}

#[derive(Debug, Deserialize)]
struct YearQuery {
    year: i32,
}

async fn year(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Query(query): Query<YearQuery>,
) -> Result<Json<YearOverview>, ApiError> {
    let mut conn = state.conn().await?;
    Ok(Json(reports::year_overview(&mut conn, &owner, query.year).await?))
}
