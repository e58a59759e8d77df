use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use kasboek_core::{NewTransaction, Totals, Transaction, TransactionId, TransactionPatch, TransactionStats};
use kasboek_import::{import_statement, ImportReport};
use kasboek_storage::transactions;
use serde::{Deserialize, Serialize};

use super::PeriodQuery;
use crate::error::ApiError;
use crate::extract::ActiveAccount;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(list).post(create))
        .route("/transactions/bulk-delete", post(bulk_delete))
        .route("/transactions/upload", post(upload))
        .route("/transactions/totals", get(totals))
        .route("/transactions/stats", get(stats))
        .route("/transactions/{id}", get(show).put(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    let period = query.period()?;
    let mut conn = state.conn().await?;
    Ok(Json(
        transactions::list_for_owner(&mut conn, &owner.iban, period).await?,
    ))
}

async fn create(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Json(new): Json<NewTransaction>,
) -> Result<(StatusCode, Json<Transaction>), ApiError> {
    let mut conn = state.conn().await?;
    let created = transactions::create(&mut conn, &owner, new).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn show(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Path(id): Path<i64>,
) -> Result<Json<Transaction>, ApiError> {
    let mut conn = state.conn().await?;
    Ok(Json(
        transactions::get(&mut conn, TransactionId(id), Some(&owner.iban)).await?,
    ))
}

async fn update(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Path(id): Path<i64>,
    Json(patch): Json<TransactionPatch>,
) -> Result<Json<Transaction>, ApiError> {
    let mut conn = state.conn().await?;
    Ok(Json(
        transactions::update(&mut conn, &owner, TransactionId(id), patch).await?,
    ))
}

async fn remove(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.conn().await?;
    transactions::delete(&mut conn, &owner.iban, TransactionId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
struct BulkDelete {
    ids: Vec<TransactionId>,
}

#[derive(Debug, Serialize)]
struct Deleted {
    deleted: u64,
}

async fn bulk_delete(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Json(body): Json<BulkDelete>,
) -> Result<Json<Deleted>, ApiError> {
    let mut conn = state.conn().await?;
    let deleted = transactions::bulk_delete(&mut conn, &owner.iban, &body.ids).await?;
    Ok(Json(Deleted { deleted }))
}

#[derive(Debug, Deserialize)]
struct UploadQuery {
    filename: String,
}

/// Raw statement upload. Rows are routed to accounts by their own IBAN
/// column, so no active account is needed.
async fn upload(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<ImportReport>, ApiError> {
    let report = import_statement(&state.pool, state.format.as_ref(), &query.filename, &body).await?;
    Ok(Json(report))
}

async fn totals(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
) -> Result<Json<Totals>, ApiError> {
    let mut conn = state.conn().await?;
    Ok(Json(transactions::totals(&mut conn, &owner.iban).await?))
}

async fn stats(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<TransactionStats>, ApiError> {
    let period = query.period()?;
    let mut conn = state.conn().await?;
    Ok(Json(transactions::stats(&mut conn, &owner.iban, period).await?))
}
