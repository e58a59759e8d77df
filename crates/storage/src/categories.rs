//! Category manager. Every membership change is followed by a reclassification
//! of the affected counterparts so linked transactions stay in sync.

use kasboek_core::{
    require_non_empty, Account, AccountId, Category, CategoryId, CategoryPatch, CategoryType,
    Counterpart, CounterpartId, CounterpartRef, NewCategory, TransactionId,
};
use serde::Serialize;
use sqlx::{Connection, QueryBuilder, Sqlite, SqliteConnection};
use std::collections::BTreeSet;
use tracing::{info, instrument, warn};

use crate::classify::{self, ReclassifyReport, Scope};
use crate::counterparts;
use crate::error::{StoreError, StoreResult};

type CategoryRow = (i64, i64, String, String, String);

const SELECT: &str = "SELECT id, owner_id, name, description, category_type FROM categories";

fn from_row(row: CategoryRow) -> StoreResult<Category> {
    let category_type = row
        .4
        .parse::<CategoryType>()
        .map_err(StoreError::Corrupt)?;
    Ok(Category {
        id: CategoryId(row.0),
        owner_id: AccountId(row.1),
        name: row.2,
        description: row.3,
        category_type,
    })
}

pub async fn list_by_owner(
    conn: &mut SqliteConnection,
    owner: AccountId,
) -> StoreResult<Vec<Category>> {
    sqlx::query_as::<_, CategoryRow>(&format!("{SELECT} WHERE owner_id = ? ORDER BY name"))
        .bind(owner.0)
        .fetch_all(&mut *conn)
        .await?
        .into_iter()
        .map(from_row)
        .collect()
}

pub async fn get(
    conn: &mut SqliteConnection,
    owner: AccountId,
    id: CategoryId,
) -> StoreResult<Category> {
    let row = sqlx::query_as::<_, CategoryRow>(&format!("{SELECT} WHERE id = ? AND owner_id = ?"))
        .bind(id.0)
        .bind(owner.0)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| StoreError::not_found("Category", id))?;
    from_row(row)
}

pub async fn counterparts_of(
    conn: &mut SqliteConnection,
    owner: AccountId,
    id: CategoryId,
) -> StoreResult<Vec<Counterpart>> {
    get(conn, owner, id).await?;
    counterparts::by_category(conn, id).await
}

/// Outcome of a membership edit. References that cannot be resolved or
/// attached are logged and counted in `skipped`; the others still apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MembershipReport {
    pub attached: usize,
    pub detached: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryChange {
    #[serde(flatten)]
    pub category: Category,
    pub membership: MembershipReport,
    pub classification: ReclassifyReport,
}

/// Failures tied to a single reference. Anything else aborts the edit.
fn skippable(err: &StoreError) -> bool {
    matches!(
        err,
        StoreError::NotFound { .. } | StoreError::Validation(_) | StoreError::Consistency(_)
    )
}

/// Turns references into ids, registering unknown names on the way.
async fn resolve_refs(
    conn: &mut SqliteConnection,
    owner: AccountId,
    refs: &[CounterpartRef],
    report: &mut MembershipReport,
) -> StoreResult<BTreeSet<CounterpartId>> {
    let mut ids = BTreeSet::new();
    for r in refs {
        let resolved = match r {
            CounterpartRef::Id(id) => counterparts::get(conn, owner, *id).await,
            CounterpartRef::Name(name) => counterparts::resolve_or_create(conn, owner, name).await,
        };
        match resolved {
            Ok(counterpart) => {
                ids.insert(counterpart.id);
            }
            Err(err) if skippable(&err) => {
                warn!(reference = ?r, error = %err, "Skipping counterpart reference");
                report.skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(ids)
}

async fn attach_members(
    conn: &mut SqliteConnection,
    owner: AccountId,
    category: CategoryId,
    members: impl IntoIterator<Item = CounterpartId>,
    report: &mut MembershipReport,
) -> StoreResult<Vec<CounterpartId>> {
    let mut attached = Vec::new();
    for counterpart in members {
        match counterparts::attach_to_category(conn, owner, counterpart, category).await {
            Ok(()) => attached.push(counterpart),
            Err(err) if skippable(&err) => {
                warn!(counterpart_id = %counterpart, error = %err, "Skipping counterpart attach");
                report.skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }
    report.attached += attached.len();
    Ok(attached)
}

async fn detach_members(
    conn: &mut SqliteConnection,
    owner: AccountId,
    members: impl IntoIterator<Item = CounterpartId>,
    report: &mut MembershipReport,
) -> StoreResult<Vec<CounterpartId>> {
    let mut detached = Vec::new();
    for counterpart in members {
        match counterparts::detach_from_category(conn, owner, counterpart).await {
            Ok(()) => detached.push(counterpart),
            Err(err) if skippable(&err) => {
                warn!(counterpart_id = %counterpart, error = %err, "Skipping counterpart detach");
                report.skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }
    report.detached += detached.len();
    Ok(detached)
}

#[instrument(skip(conn, owner, new), fields(owner = %owner.id, name = %new.name))]
pub async fn create(
    conn: &mut SqliteConnection,
    owner: &Account,
    new: NewCategory,
) -> StoreResult<CategoryChange> {
    let name = require_non_empty("category name", &new.name)?;
    let mut tx = conn.begin().await?;

    let id = sqlx::query(
        "INSERT INTO categories (owner_id, name, description, category_type) VALUES (?, ?, ?, ?)",
    )
    .bind(owner.id.0)
    .bind(&name)
    .bind(&new.description)
    .bind(new.category_type.as_str())
    .execute(&mut *tx)
    .await
    .map_err(|e| StoreError::on_unique(e, || format!("Category '{name}' already exists")))?
    .last_insert_rowid();
    let id = CategoryId(id);

    let mut membership = MembershipReport::default();
    let members = resolve_refs(&mut tx, owner.id, &new.counterparts, &mut membership).await?;
    attach_members(&mut tx, owner.id, id, members, &mut membership).await?;
    let classification = classify::reclassify(&mut tx, owner, Scope::Owner).await?;

    tx.commit().await?;
    info!(
        category_id = %id,
        attached = membership.attached,
        skipped = membership.skipped,
        classified = classification.updated,
        "Category created"
    );

    Ok(CategoryChange {
        category: Category {
            id,
            owner_id: owner.id,
            name,
            description: new.description,
            category_type: new.category_type,
        },
        membership,
        classification,
    })
}

#[instrument(skip(conn, owner, patch), fields(owner = %owner.id))]
pub async fn update(
    conn: &mut SqliteConnection,
    owner: &Account,
    id: CategoryId,
    patch: CategoryPatch,
) -> StoreResult<CategoryChange> {
    let mut tx = conn.begin().await?;
    let mut category = get(&mut tx, owner.id, id).await?;

    if let Some(name) = &patch.name {
        require_non_empty("category name", name)?;
    }
    patch.apply_fields(&mut category);

    sqlx::query("UPDATE categories SET name = ?, description = ?, category_type = ? WHERE id = ?")
        .bind(&category.name)
        .bind(&category.description)
        .bind(category.category_type.as_str())
        .bind(id.0)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            StoreError::on_unique(e, || format!("Category '{}' already exists", category.name))
        })?;

    let mut membership = MembershipReport::default();
    let mut classification = ReclassifyReport::default();
    if let Some(refs) = &patch.counterparts {
        let requested = resolve_refs(&mut tx, owner.id, refs, &mut membership).await?;
        let current: BTreeSet<CounterpartId> = counterparts::by_category(&mut tx, id)
            .await?
            .into_iter()
            .map(|c| c.id)
            .collect();

        let removed = current.difference(&requested).copied().collect::<Vec<_>>();
        let added = requested.difference(&current).copied().collect::<Vec<_>>();

        let mut touched = detach_members(&mut tx, owner.id, removed, &mut membership).await?;
        touched.extend(attach_members(&mut tx, owner.id, id, added, &mut membership).await?);

        if !touched.is_empty() {
            classification = classify::reclassify(&mut tx, owner, Scope::Counterparts(&touched)).await?;
        }
        info!(
            detached = membership.detached,
            attached = membership.attached,
            skipped = membership.skipped,
            "Category membership changed"
        );
    }

    // Rename or retype without a membership change still has to reach every
    // linked row, including manual assignments.
    sqlx::query("UPDATE transactions SET category_name = ?, transaction_type = ? WHERE category_id = ?")
        .bind(&category.name)
        .bind(category.category_type.as_str())
        .bind(id.0)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    info!(category_id = %id, "Category updated");
    Ok(CategoryChange {
        category,
        membership,
        classification,
    })
}

/// Deletes a category after detaching its counterparts and clearing every
/// transaction that pointed at it. Counterparts and transactions survive.
#[instrument(skip(conn, owner), fields(owner = %owner.id))]
pub async fn delete(
    conn: &mut SqliteConnection,
    owner: &Account,
    id: CategoryId,
) -> StoreResult<()> {
    let mut tx = conn.begin().await?;
    get(&mut tx, owner.id, id).await?;

    let cleared = sqlx::query(
        r#"
        UPDATE transactions
        SET category_id = NULL, category_name = NULL, transaction_type = 'None'
        WHERE category_id = ?
           OR counterpart_id IN (SELECT id FROM counterparts WHERE category_id = ?)
        "#,
    )
    .bind(id.0)
    .bind(id.0)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let detached = sqlx::query("UPDATE counterparts SET category_id = NULL WHERE category_id = ?")
        .bind(id.0)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM categories WHERE id = ? AND owner_id = ?")
        .bind(id.0)
        .bind(owner.id.0)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    info!(category_id = %id, cleared, detached, "Category deleted");
    Ok(())
}

/// Attaches one counterpart and reclassifies only its transactions.
#[instrument(skip(conn, owner), fields(owner = %owner.id))]
pub async fn add_counterpart_to_category(
    conn: &mut SqliteConnection,
    owner: &Account,
    id: CategoryId,
    counterpart: CounterpartId,
) -> StoreResult<ReclassifyReport> {
    let mut tx = conn.begin().await?;
    get(&mut tx, owner.id, id).await?;
    counterparts::attach_to_category(&mut tx, owner.id, counterpart, id).await?;
    let report = classify::reclassify(&mut tx, owner, Scope::Counterparts(&[counterpart])).await?;
    tx.commit().await?;
    Ok(report)
}

/// Manual override of the category fields on specific transactions. Holds
/// until the next reclassification that covers those rows.
#[instrument(skip(conn, owner, ids), fields(owner = %owner.id, count = ids.len()))]
pub async fn add_transactions_to_category(
    conn: &mut SqliteConnection,
    owner: &Account,
    id: CategoryId,
    ids: &[TransactionId],
) -> StoreResult<u64> {
    let category = get(conn, owner.id, id).await?;
    if ids.is_empty() {
        return Ok(0);
    }

    let mut query: QueryBuilder<Sqlite> =
        QueryBuilder::new("UPDATE transactions SET category_id = ");
    query
        .push_bind(category.id.0)
        .push(", category_name = ")
        .push_bind(&category.name)
        .push(", transaction_type = ")
        .push_bind(category.category_type.as_str())
        .push(" WHERE owner_iban = ")
        .push_bind(owner.iban.as_str())
        .push(" AND id IN (");
    let mut separated = query.separated(", ");
    for tx_id in ids {
        separated.push_bind(tx_id.0);
    }
    separated.push_unseparated(")");

    let updated = query.build().execute(&mut *conn).await?.rows_affected();
    info!(category_id = %id, updated, "Transactions assigned to category");
    Ok(updated)
}
