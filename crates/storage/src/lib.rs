pub mod accounts;
pub mod categories;
pub mod classify;
pub mod counterparts;
pub mod db;
pub mod error;
pub mod reports;
pub mod transactions;

pub use classify::{reclassify, ReclassifyReport, Scope};
pub use db::{create_db, DbPool};
pub use error::{StoreError, StoreResult};
