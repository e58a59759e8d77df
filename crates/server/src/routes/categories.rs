use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use kasboek_core::{
    Category, CategoryId, CategoryPatch, Counterpart, CounterpartId, NewCategory, TransactionId,
};
use kasboek_storage::categories::{self, CategoryChange};
use kasboek_storage::ReclassifyReport;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::extract::ActiveAccount;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list).post(create))
        .route("/categories/{id}", get(show).put(update).delete(remove))
        .route("/categories/{id}/counterparts", get(members))
        .route(
            "/categories/{id}/counterparts/{counterpart_id}",
            post(add_counterpart),
        )
        .route("/categories/{id}/transactions", post(add_transactions))
}

async fn list(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
) -> Result<Json<Vec<Category>>, ApiError> {
    let mut conn = state.conn().await?;
    Ok(Json(categories::list_by_owner(&mut conn, owner.id).await?))
}

async fn create(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Json(new): Json<NewCategory>,
) -> Result<(StatusCode, Json<CategoryChange>), ApiError> {
    let mut conn = state.conn().await?;
    let change = categories::create(&mut conn, &owner, new).await?;
    Ok((StatusCode::CREATED, Json(change)))
}

async fn show(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Path(id): Path<i64>,
) -> Result<Json<Category>, ApiError> {
    let mut conn = state.conn().await?;
    Ok(Json(categories::get(&mut conn, owner.id, CategoryId(id)).await?))
}

async fn update(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Path(id): Path<i64>,
    Json(patch): Json<CategoryPatch>,
) -> Result<Json<CategoryChange>, ApiError> {
    let mut conn = state.conn().await?;
    Ok(Json(
        categories::update(&mut conn, &owner, CategoryId(id), patch).await?,
    ))
}

async fn remove(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.conn().await?;
    categories::delete(&mut conn, &owner, CategoryId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn members(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Counterpart>>, ApiError> {
    let mut conn = state.conn().await?;
    Ok(Json(
        categories::counterparts_of(&mut conn, owner.id, CategoryId(id)).await?,
    ))
}

async fn add_counterpart(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Path((id, counterpart_id)): Path<(i64, i64)>,
) -> Result<Json<ReclassifyReport>, ApiError> {
    let mut conn = state.conn().await?;
    let report = categories::add_counterpart_to_category(
        &mut conn,
        &owner,
        CategoryId(id),
        CounterpartId(counterpart_id),
    )
    .await?;
    Ok(Json(report))
}

#[derive(Debug, Deserialize)]
struct AssignTransactions {
    transaction_ids: Vec<TransactionId>,
}

#[derive(Debug, Serialize)]
struct Updated {
    updated: u64,
}

async fn add_transactions(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Path(id): Path<i64>,
    Json(body): Json<AssignTransactions>,
) -> Result<Json<Updated>, ApiError> {
    let mut conn = state.conn().await?;
    let updated = categories::add_transactions_to_category(
        &mut conn,
        &owner,
        CategoryId(id),
        &body.transaction_ids,
    )
    .await?;
    Ok(Json(Updated { updated }))
}
