use kasboek_core::summary::{self, MonthOverview, YearOverview};
use kasboek_core::{Account, CategoryType, Period};
use sqlx::SqliteConnection;

use crate::error::StoreResult;
use crate::{categories, transactions};

pub async fn month_breakdown(
    conn: &mut SqliteConnection,
    owner: &Account,
    category_type: CategoryType,
    period: Period,
) -> StoreResult<MonthOverview> {
    let categories = categories::list_by_owner(conn, owner.id).await?;
    let rows = transactions::list_for_owner(conn, &owner.iban, period).await?;
    Ok(summary::month_breakdown(category_type, &categories, &rows, period))
}

/// Breakdowns for expenses, income and savings, in that order.
pub async fn month_breakdowns(
    conn: &mut SqliteConnection,
    owner: &Account,
    period: Period,
) -> StoreResult<Vec<MonthOverview>> {
    let categories = categories::list_by_owner(conn, owner.id).await?;
    let rows = transactions::list_for_owner(conn, &owner.iban, period).await?;
    Ok(CategoryType::TYPED
        .into_iter()
        .map(|t| summary::month_breakdown(t, &categories, &rows, period))
        .collect())
}

pub async fn year_overview(
    conn: &mut SqliteConnection,
    owner: &Account,
    year: i32,
) -> StoreResult<YearOverview> {
    let rows = transactions::list_for_owner(conn, &owner.iban, Period::year(year)).await?;
    Ok(summary::year_overview(year, &rows))
}
