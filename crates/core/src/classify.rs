//! Derivation of a transaction's category fields from its counterpart's
//! current category membership.
//!
//! The index is built once per owner from the category and counterpart
//! tables, then every transaction in scope is looked up by `counterpart_id`.
//! Planning only reports rows whose cached fields differ from the derived
//! ones, so applying a plan twice is a no-op.

use std::collections::HashMap;
use thiserror::Error;

use crate::account::AccountId;
use crate::category::{Category, CategoryId};
use crate::counterpart::{Counterpart, CounterpartId};
use crate::iban::Iban;
use crate::transaction::{Classification, Transaction, TransactionId};

/// Internal contract violations met while classifying. These are skipped in
/// batch runs and surfaced as errors on single-item paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsistencyError {
    #[error("Transaction {transaction} belongs to {found}, not to {expected}")]
    OwnerMismatch {
        transaction: TransactionId,
        expected: Iban,
        found: Iban,
    },
    #[error("Counterpart {counterpart} belongs to account {found}, not to {expected}")]
    ForeignCounterpart {
        counterpart: CounterpartId,
        expected: AccountId,
        found: AccountId,
    },
    #[error("Category {category} belongs to account {found}, not to {expected}")]
    ForeignCategory {
        category: CategoryId,
        expected: AccountId,
        found: AccountId,
    },
    #[error("Counterpart {counterpart} points at missing category {category}")]
    DanglingCategory {
        counterpart: CounterpartId,
        category: CategoryId,
    },
}

#[derive(Debug, Clone)]
pub struct CategoryIndex {
    owner_iban: Iban,
    by_counterpart: HashMap<CounterpartId, Classification>,
    broken: HashMap<CounterpartId, ConsistencyError>,
}

impl CategoryIndex {
    pub fn build(
        owner_id: AccountId,
        owner_iban: Iban,
        categories: &[Category],
        counterparts: &[Counterpart],
    ) -> Self {
        let categories: HashMap<CategoryId, &Category> =
            categories.iter().map(|c| (c.id, c)).collect();

        let mut by_counterpart = HashMap::new();
        let mut broken = HashMap::new();

        for cp in counterparts {
            let Some(category_id) = cp.category_id else {
                continue;
            };
            if cp.owner_id != owner_id {
                broken.insert(
                    cp.id,
                    ConsistencyError::ForeignCounterpart {
                        counterpart: cp.id,
                        expected: owner_id,
                        found: cp.owner_id,
                    },
                );
                continue;
            }
            match categories.get(&category_id) {
                Some(category) if category.owner_id != owner_id => {
                    broken.insert(
                        cp.id,
                        ConsistencyError::ForeignCategory {
                            category: category.id,
                            expected: owner_id,
                            found: category.owner_id,
                        },
                    );
                }
                Some(category) => {
                    by_counterpart.insert(cp.id, Classification::from_category(category));
                }
                None => {
                    broken.insert(
                        cp.id,
                        ConsistencyError::DanglingCategory {
                            counterpart: cp.id,
                            category: category_id,
                        },
                    );
                }
            }
        }

        CategoryIndex {
            owner_iban,
            by_counterpart,
            broken,
        }
    }

    /// Derived classification for one transaction. Unlinked transactions and
    /// counterparts without a category are uncategorized.
    pub fn classify(&self, tx: &Transaction) -> Result<Classification, ConsistencyError> {
        if tx.owner_iban != self.owner_iban {
            return Err(ConsistencyError::OwnerMismatch {
                transaction: tx.id,
                expected: self.owner_iban.clone(),
                found: tx.owner_iban.clone(),
            });
        }
        let Some(counterpart_id) = tx.counterpart_id else {
            return Ok(Classification::uncategorized());
        };
        if let Some(err) = self.broken.get(&counterpart_id) {
            return Err(err.clone());
        }
        Ok(self
            .by_counterpart
            .get(&counterpart_id)
            .cloned()
            .unwrap_or_default())
    }

    pub fn plan<'a, I>(&self, transactions: I) -> Plan
    where
        I: IntoIterator<Item = &'a Transaction>,
    {
        let mut plan = Plan::default();

        for tx in transactions {
            plan.examined += 1;
            let target = match self.classify(tx) {
                Ok(target) => target,
                Err(err @ ConsistencyError::OwnerMismatch { .. }) => {
                    plan.skipped.push((tx.id, err));
                    continue;
                }
                Err(err) => {
                    // Broken membership: fall back to uncategorized so the row
                    // never keeps pointing at a category it cannot resolve.
                    plan.skipped.push((tx.id, err));
                    Classification::uncategorized()
                }
            };

            if tx.classification() == target {
                plan.unchanged += 1;
            } else {
                plan.changes.push(Change {
                    transaction_id: tx.id,
                    classification: target,
                });
            }
        }

        plan
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub transaction_id: TransactionId,
    pub classification: Classification,
}

#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub examined: usize,
    pub unchanged: usize,
    pub changes: Vec<Change>,
    pub skipped: Vec<(TransactionId, ConsistencyError)>,
}

impl Plan {
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty()
    }
}
