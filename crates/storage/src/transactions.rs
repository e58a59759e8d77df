//! Transaction store accessor. Category fields are never copied blindly:
//! they are derived by the classification pass or set through the category
//! manager's manual assignment.

use chrono::NaiveDate;
use kasboek_core::{
    normalize_name, Account, CategoryId, CategoryType, Classification, CounterpartId, Iban,
    Money, NewTransaction, Period, Totals, Transaction, TransactionDraft, TransactionId,
    TransactionPatch, TransactionStats,
};
use sqlx::{Connection, QueryBuilder, Sqlite, SqliteConnection};
use tracing::{info, instrument};

use crate::classify::{self, write_classification, Scope};
use crate::db::stored_iban;
use crate::error::{StoreError, StoreResult};
use crate::{categories, counterparts};

type TransactionRow = (
    i64,
    String,
    Option<i64>,
    String,
    String,
    String,
    NaiveDate,
    String,
    Option<i64>,
    Option<String>,
    String,
);

const SELECT: &str = "SELECT id, owner_iban, counterpart_id, counterpart_name, counterpart_account, \
     value, date_executed, description, category_id, category_name, transaction_type \
     FROM transactions";

fn from_row(row: TransactionRow) -> StoreResult<Transaction> {
    let value = row
        .5
        .parse::<Money>()
        .map_err(|e| StoreError::Corrupt(format!("value '{}': {e}", row.5)))?;
    let transaction_type = row
        .10
        .parse::<CategoryType>()
        .map_err(StoreError::Corrupt)?;
    Ok(Transaction {
        id: TransactionId(row.0),
        owner_iban: stored_iban(&row.1)?,
        counterpart_id: row.2.map(CounterpartId),
        counterpart_name: row.3,
        counterpart_account: row.4,
        value,
        date_executed: row.6,
        description: row.7,
        category_id: row.8.map(CategoryId),
        category_name: row.9,
        transaction_type,
    })
}

fn push_period(query: &mut QueryBuilder<'_, Sqlite>, period: Period) {
    if let Some(year) = period.year {
        query
            .push(" AND CAST(strftime('%Y', date_executed) AS INTEGER) = ")
            .push_bind(year);
    }
    if let Some(month) = period.month {
        query
            .push(" AND CAST(strftime('%m', date_executed) AS INTEGER) = ")
            .push_bind(month);
    }
}

async fn fetch(
    conn: &mut SqliteConnection,
    mut query: QueryBuilder<'_, Sqlite>,
) -> StoreResult<Vec<Transaction>> {
    query
        .build_query_as::<TransactionRow>()
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(from_row)
        .collect()
}

/// The owner's transactions, newest first. A month of 0 means the whole year.
pub async fn list_for_owner(
    conn: &mut SqliteConnection,
    owner_iban: &Iban,
    period: Period,
) -> StoreResult<Vec<Transaction>> {
    let mut query = QueryBuilder::new(SELECT);
    query.push(" WHERE owner_iban = ").push_bind(owner_iban.as_str());
    push_period(&mut query, period);
    query.push(" ORDER BY date_executed DESC, id DESC");
    fetch(conn, query).await
}

/// Rows by id regardless of owner; classification uses this to notice rows
/// that do not belong to the account it is working for.
pub async fn by_ids(
    conn: &mut SqliteConnection,
    ids: &[TransactionId],
) -> StoreResult<Vec<Transaction>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut query = QueryBuilder::new(SELECT);
    query.push(" WHERE id IN (");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(id.0);
    }
    separated.push_unseparated(")");
    fetch(conn, query).await
}

pub async fn by_counterparts(
    conn: &mut SqliteConnection,
    owner_iban: &Iban,
    ids: &[CounterpartId],
) -> StoreResult<Vec<Transaction>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut query = QueryBuilder::new(SELECT);
    query
        .push(" WHERE owner_iban = ")
        .push_bind(owner_iban.as_str())
        .push(" AND counterpart_id IN (");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(id.0);
    }
    separated.push_unseparated(")");
    fetch(conn, query).await
}

/// Fetches one row, optionally requiring it to belong to `owner_iban`.
pub async fn get(
    conn: &mut SqliteConnection,
    id: TransactionId,
    owner_iban: Option<&Iban>,
) -> StoreResult<Transaction> {
    let mut query = QueryBuilder::new(SELECT);
    query.push(" WHERE id = ").push_bind(id.0);
    if let Some(iban) = owner_iban {
        query.push(" AND owner_iban = ").push_bind(iban.as_str());
    }
    fetch(conn, query)
        .await?
        .pop()
        .ok_or_else(|| StoreError::not_found("Transaction", id))
}

async fn insert(conn: &mut SqliteConnection, draft: &TransactionDraft) -> StoreResult<TransactionId> {
    let id = sqlx::query(
        r#"
        INSERT INTO transactions (
            owner_iban, counterpart_id, counterpart_name, counterpart_account, value,
            date_executed, description, category_id, category_name, transaction_type
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(draft.owner_iban.as_str())
    .bind(draft.counterpart_id.map(|c| c.0))
    .bind(&draft.counterpart_name)
    .bind(&draft.counterpart_account)
    .bind(draft.value.to_string())
    .bind(draft.date_executed)
    .bind(&draft.description)
    .bind(draft.classification.category_id.map(|c| c.0))
    .bind(draft.classification.category_name.as_deref())
    .bind(draft.classification.transaction_type.as_str())
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();
    Ok(TransactionId(id))
}

/// Inserts all drafts in one unit of work and returns the stored rows.
pub async fn bulk_insert(
    conn: &mut SqliteConnection,
    drafts: &[TransactionDraft],
) -> StoreResult<Vec<Transaction>> {
    let mut tx = conn.begin().await?;
    let mut ids = Vec::with_capacity(drafts.len());
    for draft in drafts {
        ids.push(insert(&mut tx, draft).await?);
    }
    let mut rows = by_ids(&mut tx, &ids).await?;
    tx.commit().await?;

    rows.sort_by_key(|t| t.id);
    Ok(rows)
}

/// Manual entry: resolves the counterpart and classifies the new row.
#[instrument(skip(conn, owner, new), fields(owner = %owner.id))]
pub async fn create(
    conn: &mut SqliteConnection,
    owner: &Account,
    new: NewTransaction,
) -> StoreResult<Transaction> {
    let mut tx = conn.begin().await?;
    let counterpart = counterparts::resolve_or_create(&mut tx, owner.id, &new.counterpart_name).await?;

    let id = insert(
        &mut tx,
        &TransactionDraft {
            owner_iban: owner.iban.clone(),
            counterpart_id: Some(counterpart.id),
            counterpart_name: normalize_name(&new.counterpart_name),
            counterpart_account: new.counterpart_account.trim().to_string(),
            value: new.value,
            date_executed: new.date_executed,
            description: new.description,
            classification: Classification::uncategorized(),
        },
    )
    .await?;
    classify::reclassify(&mut tx, owner, Scope::Transactions(&[id])).await?;
    let created = get(&mut tx, id, None).await?;

    tx.commit().await?;
    info!(transaction_id = %id, "Transaction created");
    Ok(created)
}

/// Field-by-field edit. A changed category goes through the manual
/// assignment (or a clear) rather than being written as-is.
#[instrument(skip(conn, owner, patch), fields(owner = %owner.id))]
pub async fn update(
    conn: &mut SqliteConnection,
    owner: &Account,
    id: TransactionId,
    patch: TransactionPatch,
) -> StoreResult<Transaction> {
    let mut tx = conn.begin().await?;
    let mut current = get(&mut tx, id, Some(&owner.iban)).await?;
    let category_change = patch.category_change(&current);
    patch.apply_scalars(&mut current);

    sqlx::query("UPDATE transactions SET date_executed = ?, description = ?, value = ? WHERE id = ?")
        .bind(current.date_executed)
        .bind(&current.description)
        .bind(current.value.to_string())
        .bind(id.0)
        .execute(&mut *tx)
        .await?;

    match category_change {
        Some(Some(category)) => {
            categories::add_transactions_to_category(&mut tx, owner, category, &[id]).await?;
        }
        Some(None) => {
            write_classification(&mut tx, id, &Classification::uncategorized()).await?;
        }
        None => {}
    }

    let updated = get(&mut tx, id, None).await?;
    tx.commit().await?;
    info!(transaction_id = %id, "Transaction updated");
    Ok(updated)
}

#[instrument(skip(conn, owner_iban))]
pub async fn delete(
    conn: &mut SqliteConnection,
    owner_iban: &Iban,
    id: TransactionId,
) -> StoreResult<()> {
    let deleted = sqlx::query("DELETE FROM transactions WHERE id = ? AND owner_iban = ?")
        .bind(id.0)
        .bind(owner_iban.as_str())
        .execute(&mut *conn)
        .await?
        .rows_affected();
    if deleted == 0 {
        return Err(StoreError::not_found("Transaction", id));
    }
    info!(transaction_id = %id, "Transaction deleted");
    Ok(())
}

/// Deletes the owner's rows among `ids`; ids of other owners are ignored.
#[instrument(skip(conn, owner_iban, ids), fields(requested = ids.len()))]
pub async fn bulk_delete(
    conn: &mut SqliteConnection,
    owner_iban: &Iban,
    ids: &[TransactionId],
) -> StoreResult<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM transactions WHERE owner_iban = ");
    query.push_bind(owner_iban.as_str()).push(" AND id IN (");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(id.0);
    }
    separated.push_unseparated(")");

    let deleted = query.build().execute(&mut *conn).await?.rows_affected();
    info!(deleted, "Transactions deleted");
    Ok(deleted)
}

pub async fn totals(conn: &mut SqliteConnection, owner_iban: &Iban) -> StoreResult<Totals> {
    let rows = list_for_owner(conn, owner_iban, Period::all()).await?;
    Ok(rows.iter().collect())
}

pub async fn stats(
    conn: &mut SqliteConnection,
    owner_iban: &Iban,
    period: Period,
) -> StoreResult<TransactionStats> {
    let mut query = QueryBuilder::new("SELECT COUNT(*), MAX(date_executed) FROM transactions");
    query.push(" WHERE owner_iban = ").push_bind(owner_iban.as_str());
    push_period(&mut query, period);

    let (count, last) = query
        .build_query_as::<(i64, Option<String>)>()
        .fetch_one(&mut *conn)
        .await?;
    let last_date = last
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|e| StoreError::Corrupt(format!("date '{raw}': {e}")))
        })
        .transpose()?;

    Ok(TransactionStats { count, last_date })
}
