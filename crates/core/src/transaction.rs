use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::category::{Category, CategoryId, CategoryType};
use crate::counterpart::CounterpartId;
use crate::iban::Iban;
use crate::money::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(pub i64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The derived category fields cached on a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Classification {
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub transaction_type: CategoryType,
}

impl Classification {
    pub fn uncategorized() -> Self {
        Classification::default()
    }

    pub fn from_category(category: &Category) -> Self {
        Classification {
            category_id: Some(category.id),
            category_name: Some(category.name.clone()),
            transaction_type: category.category_type,
        }
    }

    pub fn is_uncategorized(&self) -> bool {
        self.category_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub owner_iban: Iban,
    /// `None` only for rows imported before counterparts were linked by id.
    pub counterpart_id: Option<CounterpartId>,
    /// Snapshot of the counterpart name at import time.
    pub counterpart_name: String,
    pub counterpart_account: String,
    pub value: Money,
    pub date_executed: NaiveDate,
    pub description: String,
    pub category_id: Option<CategoryId>,
    pub category_name: Option<String>,
    pub transaction_type: CategoryType,
}

impl Transaction {
    pub fn classification(&self) -> Classification {
        Classification {
            category_id: self.category_id,
            category_name: self.category_name.clone(),
            transaction_type: self.transaction_type,
        }
    }

    pub fn set_classification(&mut self, classification: Classification) {
        self.category_id = classification.category_id;
        self.category_name = classification.category_name;
        self.transaction_type = classification.transaction_type;
    }
}

/// Manual entry as submitted by a user; the owner comes from the active account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTransaction {
    pub counterpart_name: String,
    #[serde(default)]
    pub counterpart_account: String,
    pub value: Money,
    pub date_executed: NaiveDate,
    #[serde(default)]
    pub description: String,
}

/// A fully resolved row ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub owner_iban: Iban,
    pub counterpart_id: Option<CounterpartId>,
    pub counterpart_name: String,
    pub counterpart_account: String,
    pub value: Money,
    pub date_executed: NaiveDate,
    pub description: String,
    pub classification: Classification,
}

/// Field-by-field edit. `category_id: Some(None)` clears the category,
/// `None` leaves it alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionPatch {
    pub date_executed: Option<NaiveDate>,
    pub description: Option<String>,
    pub value: Option<Money>,
    #[serde(default, deserialize_with = "double_option", skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Option<CategoryId>>,
}

impl TransactionPatch {
    pub fn apply_scalars(&self, tx: &mut Transaction) {
        if let Some(date) = self.date_executed {
            tx.date_executed = date;
        }
        if let Some(description) = &self.description {
            tx.description = description.clone();
        }
        if let Some(value) = self.value {
            tx.value = value;
        }
    }

    /// The requested category if it differs from the current one.
    pub fn category_change(&self, tx: &Transaction) -> Option<Option<CategoryId>> {
        match self.category_id {
            Some(requested) if requested != tx.category_id => Some(requested),
            _ => None,
        }
    }
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountId;

    fn tx() -> Transaction {
        Transaction {
            id: TransactionId(7),
            owner_iban: Iban::parse("BE68539007547034").unwrap(),
            counterpart_id: Some(CounterpartId(1)),
            counterpart_name: "acme".to_string(),
            counterpart_account: String::new(),
            value: Money::from_cents(-1999),
            date_executed: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            description: "order 42".to_string(),
            category_id: None,
            category_name: None,
            transaction_type: CategoryType::None,
        }
    }

    #[test]
    fn classification_from_category() {
        let cat = Category {
            id: CategoryId(4),
            owner_id: AccountId(1),
            name: "Groceries".to_string(),
            description: String::new(),
            category_type: CategoryType::Expenses,
        };
        let mut t = tx();
        t.set_classification(Classification::from_category(&cat));
        assert_eq!(t.category_id, Some(CategoryId(4)));
        assert_eq!(t.category_name.as_deref(), Some("Groceries"));
        assert_eq!(t.transaction_type, CategoryType::Expenses);

        t.set_classification(Classification::uncategorized());
        assert!(t.classification().is_uncategorized());
        assert_eq!(t.transaction_type, CategoryType::None);
    }

    #[test]
    fn patch_distinguishes_absent_and_null_category() {
        let absent: TransactionPatch = serde_json::from_str(r#"{"description":"x"}"#).unwrap();
        assert_eq!(absent.category_id, None);

        let cleared: TransactionPatch = serde_json::from_str(r#"{"category_id":null}"#).unwrap();
        assert_eq!(cleared.category_id, Some(None));

        let set: TransactionPatch = serde_json::from_str(r#"{"category_id":3}"#).unwrap();
        assert_eq!(set.category_id, Some(Some(CategoryId(3))));
    }

    #[test]
    fn category_change_ignores_same_value() {
        let mut t = tx();
        t.category_id = Some(CategoryId(3));
        let same = TransactionPatch {
            category_id: Some(Some(CategoryId(3))),
            ..Default::default()
        };
        assert_eq!(same.category_change(&t), None);

        let clear = TransactionPatch {
            category_id: Some(None),
            ..Default::default()
        };
        assert_eq!(clear.category_change(&t), Some(None));
    }

    #[test]
    fn apply_scalars() {
        let mut t = tx();
        TransactionPatch {
            value: Some(Money::from_cents(500)),
            description: Some("refund".to_string()),
            ..Default::default()
        }
        .apply_scalars(&mut t);
        assert_eq!(t.value, Money::from_cents(500));
        assert_eq!(t.description, "refund");
        assert_eq!(t.date_executed, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }
}
