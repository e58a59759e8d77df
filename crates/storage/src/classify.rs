//! Applies the derived classification to stored transactions.
//!
//! Every mutation path that can change membership or category state ends in
//! [`reclassify`]. Only rows whose cached fields differ are written, so a
//! second run over the same scope reports zero updates.

use kasboek_core::{Account, CategoryIndex, Classification, CounterpartId, TransactionId};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, instrument, warn};

use crate::error::StoreResult;
use crate::{categories, counterparts, transactions};

#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    /// Every transaction of the owner.
    Owner,
    /// Transactions linked to these counterparts.
    Counterparts(&'a [CounterpartId]),
    /// Exactly these transactions.
    Transactions(&'a [TransactionId]),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReclassifyReport {
    pub examined: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
}

#[instrument(skip(conn, owner, scope), fields(owner = %owner.id))]
pub async fn reclassify(
    conn: &mut SqliteConnection,
    owner: &Account,
    scope: Scope<'_>,
) -> StoreResult<ReclassifyReport> {
    let categories = categories::list_by_owner(conn, owner.id).await?;
    let counterparts = counterparts::list_by_owner(conn, owner.id).await?;
    let index = CategoryIndex::build(owner.id, owner.iban.clone(), &categories, &counterparts);

    let rows = match scope {
        Scope::Owner => transactions::list_for_owner(conn, &owner.iban, Default::default()).await?,
        Scope::Counterparts(ids) => transactions::by_counterparts(conn, &owner.iban, ids).await?,
        Scope::Transactions(ids) => transactions::by_ids(conn, ids).await?,
    };

    let plan = index.plan(&rows);
    let mut report = ReclassifyReport {
        examined: plan.examined,
        unchanged: plan.unchanged,
        skipped: plan.skipped.len(),
        ..Default::default()
    };

    for (transaction_id, err) in &plan.skipped {
        warn!(transaction_id = %transaction_id, error = %err, "Skipping inconsistent transaction");
    }

    for change in &plan.changes {
        match write_classification(conn, change.transaction_id, &change.classification).await {
            Ok(()) => report.updated += 1,
            Err(err) => {
                warn!(transaction_id = %change.transaction_id, error = %err, "Failed to write classification");
                report.skipped += 1;
            }
        }
    }

    debug!(
        examined = report.examined,
        updated = report.updated,
        unchanged = report.unchanged,
        skipped = report.skipped,
        "Reclassified"
    );
    Ok(report)
}

pub(crate) async fn write_classification(
    conn: &mut SqliteConnection,
    id: TransactionId,
    classification: &Classification,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE transactions SET category_id = ?, category_name = ?, transaction_type = ? WHERE id = ?",
    )
    .bind(classification.category_id.map(|c| c.0))
    .bind(classification.category_name.as_deref())
    .bind(classification.transaction_type.as_str())
    .bind(id.0)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{insert_tx, setup};
    use kasboek_core::{CategoryType, NewCategory};

    #[tokio::test]
    async fn second_run_is_a_noop() {
        let (_dir, pool, owner) = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        for (name, cents) in [("acme", -1000), ("acme", -2500), ("globex", 4000)] {
            insert_tx(&mut conn, &owner, name, cents).await;
        }
        let category = categories::create(
            &mut conn,
            &owner,
            NewCategory {
                name: "Groceries".to_string(),
                category_type: CategoryType::Expenses,
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .category;
        let acme = counterparts::resolve_or_create(&mut conn, owner.id, "acme")
            .await
            .unwrap();
        counterparts::attach_to_category(&mut conn, owner.id, acme.id, category.id)
            .await
            .unwrap();

        let first = reclassify(&mut conn, &owner, Scope::Owner).await.unwrap();
        assert_eq!(first.examined, 3);
        assert_eq!(first.updated, 2);

        let second = reclassify(&mut conn, &owner, Scope::Owner).await.unwrap();
        assert_eq!(second.updated, 0);
        assert_eq!(second.unchanged, 3);
    }

    #[tokio::test]
    async fn scopes_reach_the_same_state() {
        let (_dir, pool, owner) = setup().await;
        let mut conn = pool.acquire().await.unwrap();
        let a = insert_tx(&mut conn, &owner, "acme", -1000).await;
        let b = insert_tx(&mut conn, &owner, "globex", -500).await;
        let category = categories::create(
            &mut conn,
            &owner,
            NewCategory {
                name: "Shops".to_string(),
                category_type: CategoryType::Expenses,
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .category;
        for name in ["acme", "globex"] {
            let cp = counterparts::resolve_or_create(&mut conn, owner.id, name)
                .await
                .unwrap();
            counterparts::attach_to_category(&mut conn, owner.id, cp.id, category.id)
                .await
                .unwrap();
        }

        let by_tx = reclassify(&mut conn, &owner, Scope::Transactions(&[a]))
            .await
            .unwrap();
        assert_eq!(by_tx.updated, 1);

        let b_cp = transactions::get(&mut conn, b, None).await.unwrap().counterpart_id.unwrap();
        let by_cp = reclassify(&mut conn, &owner, Scope::Counterparts(&[b_cp]))
            .await
            .unwrap();
        assert_eq!(by_cp.updated, 1);

        let whole = reclassify(&mut conn, &owner, Scope::Owner).await.unwrap();
        assert_eq!(whole.updated, 0);
    }
}
