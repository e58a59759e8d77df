//! The active account travels in the `active-account-id` header and is
//! resolved against the account table on every request.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use kasboek_core::{Account, AccountId};
use kasboek_storage::accounts;

use crate::error::ApiError;
use crate::AppState;

pub const ACTIVE_ACCOUNT_HEADER: &str = "active-account-id";

#[derive(Debug, Clone)]
pub struct ActiveAccount(pub Account);

impl FromRequestParts<AppState> for ActiveAccount {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTIVE_ACCOUNT_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::BadRequest(format!("Missing {ACTIVE_ACCOUNT_HEADER} header")))?;
        let id = raw
            .trim()
            .parse::<i64>()
            .map(AccountId)
            .map_err(|_| ApiError::BadRequest(format!("Invalid {ACTIVE_ACCOUNT_HEADER} '{raw}'")))?;

        let mut conn = state.pool.acquire().await?;
        let account = accounts::by_id(&mut conn, id).await?;
        Ok(ActiveAccount(account))
    }
}
