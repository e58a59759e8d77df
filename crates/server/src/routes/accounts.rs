use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use kasboek_core::{Account, AccountId, AccountPatch, NewAccount};
use kasboek_storage::accounts;
use serde::Serialize;

use crate::error::ApiError;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/accounts", get(list).post(create))
        .route("/accounts/{id}", get(show).put(update).delete(remove))
}

/// Account as presented to clients, with the IBAN in display groups.
#[derive(Debug, Serialize)]
struct AccountView {
    #[serde(flatten)]
    account: Account,
    iban_formatted: String,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        AccountView {
            iban_formatted: account.formatted_iban(),
            account,
        }
    }
}

async fn list(State(state): State<AppState>) -> Result<Json<Vec<AccountView>>, ApiError> {
    let mut conn = state.conn().await?;
    let accounts = accounts::list(&mut conn).await?;
    Ok(Json(accounts.into_iter().map(AccountView::from).collect()))
}

async fn create(
    State(state): State<AppState>,
    Json(new): Json<NewAccount>,
) -> Result<(StatusCode, Json<AccountView>), ApiError> {
    let mut conn = state.conn().await?;
    let account = accounts::create(&mut conn, new).await?;
    Ok((StatusCode::CREATED, Json(account.into())))
}

async fn show(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AccountView>, ApiError> {
    let mut conn = state.conn().await?;
    Ok(Json(accounts::by_id(&mut conn, AccountId(id)).await?.into()))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(patch): Json<AccountPatch>,
) -> Result<Json<AccountView>, ApiError> {
    let mut conn = state.conn().await?;
    Ok(Json(accounts::update(&mut conn, AccountId(id), patch).await?.into()))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let mut conn = state.conn().await?;
    accounts::delete(&mut conn, AccountId(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
