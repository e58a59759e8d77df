use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::category::{Category, CategoryType};
use crate::money::Money;
use crate::period::Period;
use crate::transaction::Transaction;

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Per-type sums over an owner's transactions. Typed buckets keep their sign;
/// `unaccounted` adds absolute values because uncategorized rows go both ways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Totals {
    pub income: Money,
    pub expenses: Money,
    pub savings: Money,
    pub unaccounted: Money,
}

impl Totals {
    pub fn add(&mut self, tx: &Transaction) {
        match tx.transaction_type {
            CategoryType::Income => self.income += tx.value,
            CategoryType::Expenses => self.expenses += tx.value,
            CategoryType::Savings => self.savings += tx.value,
            CategoryType::None => self.unaccounted += tx.value.abs(),
        }
    }
}

impl<'a> FromIterator<&'a Transaction> for Totals {
    fn from_iter<I: IntoIterator<Item = &'a Transaction>>(iter: I) -> Self {
        let mut totals = Totals::default();
        for tx in iter {
            totals.add(tx);
        }
        totals
    }
}

/// Count and most recent execution date, shown in the front end's info tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TransactionStats {
    pub count: i64,
    pub last_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category_name: String,
    pub category_amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthOverview {
    pub type_name: CategoryType,
    pub type_overview: Vec<CategorySummary>,
}

/// Amount per category of `category_type` within `period`, largest first.
/// Outflow types are negated so that spending reads as a positive figure.
pub fn month_breakdown(
    category_type: CategoryType,
    categories: &[Category],
    transactions: &[Transaction],
    period: Period,
) -> MonthOverview {
    let mut type_overview: Vec<CategorySummary> = categories
        .iter()
        .filter(|c| c.category_type == category_type)
        .map(|c| {
            let total: Money = transactions
                .iter()
                .filter(|tx| tx.category_id == Some(c.id) && period.contains(tx.date_executed))
                .map(|tx| tx.value)
                .sum();
            CategorySummary {
                category_name: c.name.clone(),
                category_amount: if category_type.is_outflow() { -total } else { total },
            }
        })
        .collect();

    type_overview.sort_by(|a, b| b.category_amount.cmp(&a.category_amount));

    MonthOverview {
        type_name: category_type,
        type_overview,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthTotals {
    pub month: String,
    pub expenses: Money,
    pub income: Money,
    pub savings: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearOverview {
    pub year: i32,
    pub year_overview: Vec<MonthTotals>,
}

pub fn year_overview(year: i32, transactions: &[Transaction]) -> YearOverview {
    let mut months: Vec<MonthTotals> = MONTH_NAMES
        .iter()
        .map(|name| MonthTotals {
            month: name.to_string(),
            expenses: Money::zero(),
            income: Money::zero(),
            savings: Money::zero(),
        })
        .collect();

    for tx in transactions.iter().filter(|tx| tx.date_executed.year() == year) {
        let slot = &mut months[tx.date_executed.month0() as usize];
        match tx.transaction_type {
            CategoryType::Expenses => slot.expenses += -tx.value,
            CategoryType::Income => slot.income += tx.value,
            CategoryType::Savings => slot.savings += -tx.value,
            CategoryType::None => {}
        }
    }

    YearOverview {
        year,
        year_overview: months,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountId;
    use crate::category::CategoryId;
    use crate::iban::Iban;
    use crate::transaction::TransactionId;

    fn tx(id: i64, cents: i64, t: CategoryType, category: Option<i64>, date: (i32, u32, u32)) -> Transaction {
        Transaction {
            id: TransactionId(id),
            owner_iban: Iban::parse("BE68539007547034").unwrap(),
            counterpart_id: None,
            counterpart_name: String::new(),
            counterpart_account: String::new(),
            value: Money::from_cents(cents),
            date_executed: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            description: String::new(),
            category_id: category.map(CategoryId),
            category_name: None,
            transaction_type: t,
        }
    }

    fn category(id: i64, name: &str, t: CategoryType) -> Category {
        Category {
            id: CategoryId(id),
            owner_id: AccountId(1),
            name: name.to_string(),
            description: String::new(),
            category_type: t,
        }
    }

    #[test]
    fn totals_per_bucket() {
        let txs = vec![
            tx(1, -5000, CategoryType::Expenses, Some(1), (2024, 1, 1)),
            tx(2, 20000, CategoryType::Income, Some(2), (2024, 1, 2)),
            tx(3, -3000, CategoryType::Savings, Some(3), (2024, 1, 3)),
            tx(4, 1000, CategoryType::None, None, (2024, 1, 4)),
        ];
        let totals: Totals = txs.iter().collect();
        assert_eq!(
            totals,
            Totals {
                income: Money::from_cents(20000),
                expenses: Money::from_cents(-5000),
                savings: Money::from_cents(-3000),
                unaccounted: Money::from_cents(1000),
            }
        );
    }

    #[test]
    fn unaccounted_uses_absolute_values() {
        let txs = vec![
            tx(1, -1000, CategoryType::None, None, (2024, 1, 1)),
            tx(2, 250, CategoryType::None, None, (2024, 1, 1)),
        ];
        let totals: Totals = txs.iter().collect();
        assert_eq!(totals.unaccounted, Money::from_cents(1250));
    }

    #[test]
    fn month_breakdown_negates_outflows_and_sorts() {
        let categories = vec![
            category(1, "Groceries", CategoryType::Expenses),
            category(2, "Rent", CategoryType::Expenses),
            category(3, "Salary", CategoryType::Income),
        ];
        let txs = vec![
            tx(1, -4000, CategoryType::Expenses, Some(1), (2024, 3, 1)),
            tx(2, -1500, CategoryType::Expenses, Some(1), (2024, 3, 9)),
            tx(3, -80000, CategoryType::Expenses, Some(2), (2024, 3, 1)),
            tx(4, -80000, CategoryType::Expenses, Some(2), (2024, 4, 1)),
            tx(5, 250000, CategoryType::Income, Some(3), (2024, 3, 25)),
        ];
        let overview = month_breakdown(
            CategoryType::Expenses,
            &categories,
            &txs,
            Period::month(2024, 3).unwrap(),
        );
        assert_eq!(overview.type_name, CategoryType::Expenses);
        assert_eq!(overview.type_overview.len(), 2);
        assert_eq!(overview.type_overview[0].category_name, "Rent");
        assert_eq!(overview.type_overview[0].category_amount, Money::from_cents(80000));
        assert_eq!(overview.type_overview[1].category_amount, Money::from_cents(5500));
    }

    #[test]
    fn year_overview_buckets_by_month() {
        let txs = vec![
            tx(1, -4000, CategoryType::Expenses, Some(1), (2024, 1, 5)),
            tx(2, 250000, CategoryType::Income, Some(3), (2024, 1, 25)),
            tx(3, -10000, CategoryType::Savings, Some(4), (2024, 12, 1)),
            tx(4, -999, CategoryType::None, None, (2024, 12, 1)),
            tx(5, -4000, CategoryType::Expenses, Some(1), (2023, 1, 5)),
        ];
        let overview = year_overview(2024, &txs);
        assert_eq!(overview.year_overview.len(), 12);
        let jan = &overview.year_overview[0];
        assert_eq!(jan.month, "January");
        assert_eq!(jan.expenses, Money::from_cents(4000));
        assert_eq!(jan.income, Money::from_cents(250000));
        let dec = &overview.year_overview[11];
        assert_eq!(dec.savings, Money::from_cents(10000));
        assert_eq!(dec.expenses, Money::zero());
    }
}
