//! Counterpart registry: one row per distinct (owner, normalized name).
//!
//! Attaching and detaching only moves the category foreign key. Callers that
//! change membership reclassify the affected counterparts afterwards.

use kasboek_core::{
    normalize_name, require_non_empty, Account, AccountId, CategoryId, ConsistencyError,
    Counterpart, CounterpartId,
};
use sqlx::{Connection, SqliteConnection};
use tracing::{debug, info, instrument};

use crate::classify::{self, Scope};
use crate::error::{StoreError, StoreResult};

type CounterpartRow = (i64, i64, String, Option<i64>);

const SELECT: &str = "SELECT id, owner_id, name, category_id FROM counterparts";

fn from_row(row: CounterpartRow) -> Counterpart {
    Counterpart {
        id: CounterpartId(row.0),
        owner_id: AccountId(row.1),
        name: row.2,
        category_id: row.3.map(CategoryId),
    }
}

/// Returns the owner's counterpart for `name`, creating it uncategorized on
/// first sighting. Names differing only in case or spacing share one row.
pub async fn resolve_or_create(
    conn: &mut SqliteConnection,
    owner: AccountId,
    name: &str,
) -> StoreResult<Counterpart> {
    let name = normalize_name(name);

    let inserted = sqlx::query(
        "INSERT INTO counterparts (owner_id, name) VALUES (?, ?) ON CONFLICT (owner_id, name) DO NOTHING",
    )
    .bind(owner.0)
    .bind(&name)
    .execute(&mut *conn)
    .await?
    .rows_affected();
    if inserted > 0 {
        debug!(owner = %owner, name = %name, "Counterpart registered");
    }

    let row = sqlx::query_as::<_, CounterpartRow>(&format!("{SELECT} WHERE owner_id = ? AND name = ?"))
        .bind(owner.0)
        .bind(&name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(from_row(row))
}

pub async fn list_by_owner(
    conn: &mut SqliteConnection,
    owner: AccountId,
) -> StoreResult<Vec<Counterpart>> {
    let rows = sqlx::query_as::<_, CounterpartRow>(&format!("{SELECT} WHERE owner_id = ? ORDER BY name"))
        .bind(owner.0)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(from_row).collect())
}

pub async fn list_uncategorized(
    conn: &mut SqliteConnection,
    owner: AccountId,
) -> StoreResult<Vec<Counterpart>> {
    let rows = sqlx::query_as::<_, CounterpartRow>(&format!(
        "{SELECT} WHERE owner_id = ? AND category_id IS NULL ORDER BY name"
    ))
    .bind(owner.0)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(from_row).collect())
}

pub async fn by_category(
    conn: &mut SqliteConnection,
    category: CategoryId,
) -> StoreResult<Vec<Counterpart>> {
    let rows = sqlx::query_as::<_, CounterpartRow>(&format!("{SELECT} WHERE category_id = ? ORDER BY name"))
        .bind(category.0)
        .fetch_all(&mut *conn)
        .await?;
    Ok(rows.into_iter().map(from_row).collect())
}

pub async fn get(
    conn: &mut SqliteConnection,
    owner: AccountId,
    id: CounterpartId,
) -> StoreResult<Counterpart> {
    let row = sqlx::query_as::<_, CounterpartRow>(&format!("{SELECT} WHERE id = ? AND owner_id = ?"))
        .bind(id.0)
        .bind(owner.0)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::not_found("Counterpart", id))?;
    Ok(from_row(row))
}

async fn category_owner(
    conn: &mut SqliteConnection,
    category: CategoryId,
) -> StoreResult<AccountId> {
    sqlx::query_scalar::<_, i64>("SELECT owner_id FROM categories WHERE id = ?")
        .bind(category.0)
        .fetch_optional(&mut *conn)
        .await?
        .map(AccountId)
        .ok_or_else(|| StoreError::not_found("Category", category))
}

pub async fn attach_to_category(
    conn: &mut SqliteConnection,
    owner: AccountId,
    counterpart: CounterpartId,
    category: CategoryId,
) -> StoreResult<()> {
    let current = get(conn, owner, counterpart).await?;
    let category_owner = category_owner(conn, category).await?;
    if category_owner != owner {
        return Err(ConsistencyError::ForeignCategory {
            category,
            expected: owner,
            found: category_owner,
        }
        .into());
    }
    if current.category_id == Some(category) {
        return Ok(());
    }

    sqlx::query("UPDATE counterparts SET category_id = ? WHERE id = ?")
        .bind(category.0)
        .bind(counterpart.0)
        .execute(&mut *conn)
        .await?;
    debug!(counterpart = %counterpart, category = %category, "Counterpart attached");
    Ok(())
}

pub async fn detach_from_category(
    conn: &mut SqliteConnection,
    owner: AccountId,
    counterpart: CounterpartId,
) -> StoreResult<()> {
    sqlx::query("UPDATE counterparts SET category_id = NULL WHERE id = ? AND owner_id = ?")
        .bind(counterpart.0)
        .bind(owner.0)
        .execute(&mut *conn)
        .await?;
    debug!(counterpart = %counterpart, "Counterpart detached");
    Ok(())
}

/// Explicitly registers a counterpart, optionally straight into a category.
#[instrument(skip(conn, owner), fields(owner = %owner.id))]
pub async fn create(
    conn: &mut SqliteConnection,
    owner: &Account,
    name: &str,
    category: Option<CategoryId>,
) -> StoreResult<Counterpart> {
    let normalized = normalize_name(&require_non_empty("counterpart name", name)?);
    let mut tx = conn.begin().await?;

    let exists = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM counterparts WHERE owner_id = ? AND name = ?",
    )
    .bind(owner.id.0)
    .bind(&normalized)
    .fetch_one(&mut *tx)
    .await?;
    if exists > 0 {
        return Err(StoreError::Conflict(format!(
            "Counterpart '{normalized}' already exists"
        )));
    }

    let mut counterpart = resolve_or_create(&mut tx, owner.id, &normalized).await?;
    if let Some(category) = category {
        attach_to_category(&mut tx, owner.id, counterpart.id, category).await?;
        classify::reclassify(&mut tx, owner, Scope::Counterparts(&[counterpart.id])).await?;
        counterpart.category_id = Some(category);
    }

    tx.commit().await?;
    info!(counterpart_id = %counterpart.id, "Counterpart created");
    Ok(counterpart)
}

/// Removes a counterpart. Its transactions keep their name snapshot but lose
/// the link and any category derived through it.
#[instrument(skip(conn, owner), fields(owner = %owner.id))]
pub async fn delete(
    conn: &mut SqliteConnection,
    owner: &Account,
    id: CounterpartId,
) -> StoreResult<()> {
    let mut tx = conn.begin().await?;
    get(&mut tx, owner.id, id).await?;

    let detached = sqlx::query(
        r#"
        UPDATE transactions
        SET counterpart_id = NULL, category_id = NULL, category_name = NULL, transaction_type = 'None'
        WHERE counterpart_id = ?
        "#,
    )
    .bind(id.0)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    sqlx::query("DELETE FROM counterparts WHERE id = ?")
        .bind(id.0)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    info!(counterpart_id = %id, detached, "Counterpart deleted");
    Ok(())
}
