use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use kasboek_core::{CategoryId, Counterpart, CounterpartId};
use kasboek_storage::counterparts;
use serde::Deserialize;

use crate::error::ApiError;
use crate::extract::ActiveAccount;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/counterparts", get(list).post(create))
        .route("/counterparts/{id}", delete(remove))
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    #[serde(default)]
    uncategorized: bool,
}

async fn list(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Counterpart>>, ApiError> {
    let mut conn = state.conn().await?;
    let rows = if query.uncategorized {
        counterparts::list_uncategorized(&mut conn, owner.id).await?
    } else {
        counterparts::list_by_owner(&mut conn, owner.id).await?
    };
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
struct NewCounterpart {
    name: String,
    #[serde(default)]
    category_id: Option<CategoryId>,
}

async fn create(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Json(new): Json<NewCounterpart>,
) -> Result<(StatusCode, Json<Counterpart>), ApiError> {
    let mut conn = state.conn().await?;
    let counterpart = counterparts::create(&mut conn, &owner, &new.name, new.category_id).await?;
    Ok((StatusCode::CREATED, Json(counterpart)))
}

async fn remove(
    State(state): State<AppState>,
    ActiveAccount(owner): ActiveAccount,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.conn().await?;
    counterparts::delete(&mut conn, &owner, CounterpartId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
