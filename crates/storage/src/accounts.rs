//! Accounts and the resolver that maps the active account to its IBAN.

use kasboek_core::{require_non_empty, Account, AccountId, AccountPatch, Iban, NewAccount};
use sqlx::SqliteConnection;
use tracing::{info, instrument};

use crate::db::stored_iban;
use crate::error::{StoreError, StoreResult};

type AccountRow = (i64, String, String);

fn from_row(row: AccountRow) -> StoreResult<Account> {
    Ok(Account {
        id: AccountId(row.0),
        name: row.1,
        iban: stored_iban(&row.2)?,
    })
}

#[instrument(skip(conn, new), fields(iban = %new.iban))]
pub async fn create(conn: &mut SqliteConnection, new: NewAccount) -> StoreResult<Account> {
    let name = require_non_empty("account name", &new.name)?;

    let id = sqlx::query("INSERT INTO accounts (name, iban) VALUES (?, ?)")
        .bind(&name)
        .bind(new.iban.as_str())
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            StoreError::on_unique(e, || format!("An account with IBAN {} already exists", new.iban))
        })?
        .last_insert_rowid();

    info!(account_id = id, "Account created");
    Ok(Account {
        id: AccountId(id),
        name,
        iban: new.iban,
    })
}

pub async fn list(conn: &mut SqliteConnection) -> StoreResult<Vec<Account>> {
    sqlx::query_as::<_, AccountRow>("SELECT id, name, iban FROM accounts ORDER BY name, id")
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(from_row)
        .collect()
}

pub async fn by_id(conn: &mut SqliteConnection, id: AccountId) -> StoreResult<Account> {
    let row = sqlx::query_as::<_, AccountRow>("SELECT id, name, iban FROM accounts WHERE id = ?")
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::not_found("Account", id))?;
    from_row(row)
}

pub async fn by_iban(conn: &mut SqliteConnection, iban: &Iban) -> StoreResult<Account> {
    let row = sqlx::query_as::<_, AccountRow>("SELECT id, name, iban FROM accounts WHERE iban = ?")
        .bind(iban.as_str())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::not_found("Account", iban))?;
    from_row(row)
}

/// Renames and/or re-keys an account. Transactions follow an IBAN change
/// through the `ON UPDATE CASCADE` on `owner_iban`.
#[instrument(skip(conn, patch))]
pub async fn update(
    conn: &mut SqliteConnection,
    id: AccountId,
    patch: AccountPatch,
) -> StoreResult<Account> {
    let mut account = by_id(conn, id).await?;
    if patch.is_empty() {
        return Ok(account);
    }
    if let Some(name) = &patch.name {
        require_non_empty("account name", name)?;
    }
    patch.apply(&mut account);
    account.name = account.name.trim().to_string();

    sqlx::query("UPDATE accounts SET name = ?, iban = ? WHERE id = ?")
        .bind(&account.name)
        .bind(account.iban.as_str())
        .bind(id.0)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            StoreError::on_unique(e, || {
                format!("An account with IBAN {} already exists", account.iban)
            })
        })?;

    info!(account_id = %id, "Account updated");
    Ok(account)
}

/// Deletes an account that owns nothing. Accounts never cascade.
#[instrument(skip(conn))]
pub async fn delete(conn: &mut SqliteConnection, id: AccountId) -> StoreResult<()> {
    let account = by_id(conn, id).await?;

    let (categories, counterparts, transactions) = sqlx::query_as::<_, (i64, i64, i64)>(
        r#"
        SELECT
            (SELECT COUNT(*) FROM categories WHERE owner_id = ?),
            (SELECT COUNT(*) FROM counterparts WHERE owner_id = ?),
            (SELECT COUNT(*) FROM transactions WHERE owner_iban = ?)
        "#,
    )
    .bind(id.0)
    .bind(id.0)
    .bind(account.iban.as_str())
    .fetch_one(&mut *conn)
    .await?;

    if categories + counterparts + transactions > 0 {
        return Err(StoreError::Conflict(format!(
            "Account {id} still owns {categories} categories, {counterparts} counterparts and {transactions} transactions"
        )));
    }

    sqlx::query("DELETE FROM accounts WHERE id = ?")
        .bind(id.0)
        .execute(&mut *conn)
        .await?;

    info!(account_id = %id, "Account deleted");
    Ok(())
}
