pub mod account;
pub mod category;
pub mod classify;
pub mod counterpart;
pub mod error;
pub mod iban;
pub mod money;
pub mod period;
pub mod summary;
pub mod transaction;

pub use account::{Account, AccountId, AccountPatch, NewAccount};
pub use category::{Category, CategoryId, CategoryPatch, CategoryType, NewCategory};
pub use classify::{CategoryIndex, Change, ConsistencyError, Plan};
pub use counterpart::{normalize_name, Counterpart, CounterpartId, CounterpartRef};
pub use error::{require_non_empty, ValidationError};
pub use iban::{Iban, InvalidIbanError};
pub use money::Money;
pub use period::Period;
pub use summary::{
    CategorySummary, MonthOverview, MonthTotals, Totals, TransactionStats, YearOverview,
};
pub use transaction::{
    Classification, NewTransaction, Transaction, TransactionDraft, TransactionId,
    TransactionPatch,
};
