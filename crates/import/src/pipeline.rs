//! Statement ingestion: received → parsed → cleaned → resolved → persisted →
//! classified, one database transaction per owning account.

use kasboek_core::{
    iban, normalize_name, Classification, Counterpart, CounterpartId, Iban, TransactionDraft,
};
use kasboek_storage::{
    accounts, classify, counterparts, transactions, DbPool, ReclassifyReport, Scope, StoreError,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::format::{CsvError, RawRow, StatementFormat};
use crate::parse::{parse_amount, parse_date};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", content = "reason")]
pub enum ImportStage {
    Received,
    Parsed,
    Cleaned,
    Resolved,
    Persisted,
    Classified,
    Failed(String),
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportStage::Received => f.write_str("received"),
            ImportStage::Parsed => f.write_str("parsed"),
            ImportStage::Cleaned => f.write_str("cleaned"),
            ImportStage::Resolved => f.write_str("resolved"),
            ImportStage::Persisted => f.write_str("persisted"),
            ImportStage::Classified => f.write_str("classified"),
            ImportStage::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Unsupported file type '{filename}', expected a .{expected} file")]
    UnsupportedFileType {
        filename: String,
        expected: &'static str,
    },
    #[error(transparent)]
    Format(#[from] CsvError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A row rejected while persisting, with its source line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub owner_iban: String,
    pub stage: ImportStage,
    /// Rows of this owner without date or amount.
    pub dropped: usize,
    pub inserted: usize,
    pub rejected: Vec<RowError>,
    pub counterparts: usize,
    pub reclassified: ReclassifyReport,
}

impl GroupReport {
    fn new(owner_iban: String) -> Self {
        GroupReport {
            owner_iban,
            stage: ImportStage::Parsed,
            dropped: 0,
            inserted: 0,
            rejected: Vec::new(),
            counterparts: 0,
            reclassified: ReclassifyReport::default(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.stage == ImportStage::Classified
    }

    /// Marks the group failed after a rollback. Nothing it counted was
    /// committed, so the per-row outcomes are cleared too.
    fn fail(&mut self, reason: impl fmt::Display) {
        self.stage = ImportStage::Failed(format!("after {}: {reason}", self.stage));
        self.inserted = 0;
        self.rejected.clear();
        self.counterparts = 0;
        self.reclassified = ReclassifyReport::default();
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub filename: String,
    pub format: &'static str,
    pub rows_read: usize,
    /// Rows without owner account, date or amount.
    pub rows_dropped: usize,
    pub groups: Vec<GroupReport>,
}

impl ImportReport {
    pub fn inserted(&self) -> usize {
        self.groups.iter().map(|g| g.inserted).sum()
    }

    pub fn rejected(&self) -> usize {
        self.groups.iter().map(|g| g.rejected.len()).sum()
    }

    pub fn failed_groups(&self) -> usize {
        self.groups.iter().filter(|g| !g.succeeded()).count()
    }
}

/// A row that survived cleaning. Date and amount are still text.
#[derive(Debug, Clone)]
struct CleanRow {
    line: usize,
    counterpart_name: String,
    counterpart_account: String,
    date: String,
    amount: String,
    description: String,
}

/// Splits parsed rows per normalized owner IBAN. Rows without an owner
/// account cannot be placed and are only counted.
fn group_by_owner(rows: Vec<RawRow>) -> (BTreeMap<String, Vec<RawRow>>, usize) {
    let mut groups: BTreeMap<String, Vec<RawRow>> = BTreeMap::new();
    let mut unowned = 0;
    for row in rows {
        if row.owner_account.is_empty() {
            unowned += 1;
            continue;
        }
        groups
            .entry(iban::normalize(&row.owner_account))
            .or_default()
            .push(row);
    }
    (groups, unowned)
}

/// Drops rows without date or amount and folds counterpart names.
fn clean(rows: Vec<RawRow>) -> (Vec<CleanRow>, usize) {
    let total = rows.len();
    let cleaned: Vec<CleanRow> = rows
        .into_iter()
        .filter(|row| !row.date.is_empty() && !row.amount.is_empty())
        .map(|row| CleanRow {
            line: row.line,
            counterpart_name: normalize_name(&row.counterpart_name),
            counterpart_account: row.counterpart_account,
            date: row.date,
            amount: row.amount,
            description: row.description,
        })
        .collect();
    let dropped = total - cleaned.len();
    (cleaned, dropped)
}

/// Imports a statement file. Groups are independent: a failing owner rolls
/// back its own rows and the next owner still imports.
#[instrument(skip(pool, format, data), fields(format = format.name(), bytes = data.len()))]
pub async fn import_statement(
    pool: &DbPool,
    format: &dyn StatementFormat,
    filename: &str,
    data: &[u8],
) -> Result<ImportReport, ImportError> {
    if !format.accepts(filename) {
        return Err(ImportError::UnsupportedFileType {
            filename: filename.to_string(),
            expected: format.extension(),
        });
    }

    let rows = format.read(data)?;
    let rows_read = rows.len();
    debug!(rows = rows_read, "Statement parsed");

    let (groups, unowned) = group_by_owner(rows);
    if unowned > 0 {
        warn!(rows = unowned, "Dropped rows without owner account");
    }

    let mut report = ImportReport {
        filename: filename.to_string(),
        format: format.name(),
        rows_read,
        rows_dropped: unowned,
        groups: Vec::with_capacity(groups.len()),
    };

    for (owner_iban, rows) in groups {
        let mut group = GroupReport::new(owner_iban.clone());

        let (rows, dropped) = clean(rows);
        if dropped > 0 {
            warn!(owner_iban = %owner_iban, rows = dropped, "Dropped rows without date or amount");
        }
        group.dropped = dropped;
        report.rows_dropped += dropped;
        group.stage = ImportStage::Cleaned;

        if let Err(err) = import_group(pool, &owner_iban, rows, &mut group).await {
            warn!(owner_iban = %owner_iban, error = %err, stage = %group.stage, "Import group failed");
            group.fail(err);
        }
        report.groups.push(group);
    }

    info!(
        inserted = report.inserted(),
        rejected = report.rejected(),
        failed_groups = report.failed_groups(),
        "Statement imported"
    );
    Ok(report)
}

async fn import_group(
    pool: &DbPool,
    owner_iban: &str,
    rows: Vec<CleanRow>,
    group: &mut GroupReport,
) -> Result<(), StoreError> {
    let iban = Iban::parse(owner_iban).map_err(kasboek_core::ValidationError::from)?;

    let mut tx = pool.begin().await?;
    let owner = accounts::by_iban(&mut tx, &iban).await?;

    let mut resolved: HashMap<String, Counterpart> = HashMap::new();
    for row in &rows {
        if !resolved.contains_key(&row.counterpart_name) {
            let counterpart =
                counterparts::resolve_or_create(&mut tx, owner.id, &row.counterpart_name).await?;
            resolved.insert(row.counterpart_name.clone(), counterpart);
        }
    }
    group.counterparts = resolved.len();
    group.stage = ImportStage::Resolved;

    let mut drafts = Vec::with_capacity(rows.len());
    for row in rows {
        let parsed = parse_date(&row.date)
            .and_then(|date| parse_amount(&row.amount).map(|value| (date, value)));
        let (date_executed, value) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                group.rejected.push(RowError {
                    line: row.line,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        let counterpart_id = resolved.get(&row.counterpart_name).map(|c| c.id);
        drafts.push(TransactionDraft {
            owner_iban: owner.iban.clone(),
            counterpart_id,
            counterpart_name: row.counterpart_name,
            counterpart_account: row.counterpart_account,
            value,
            date_executed,
            description: row.description,
            classification: Classification::uncategorized(),
        });
    }
    let inserted = transactions::bulk_insert(&mut tx, &drafts).await?;
    group.inserted = inserted.len();
    group.stage = ImportStage::Persisted;

    let touched: Vec<CounterpartId> = resolved.values().map(|c| c.id).collect();
    group.reclassified = classify::reclassify(&mut tx, &owner, Scope::Counterparts(&touched)).await?;

    tx.commit().await?;
    group.stage = ImportStage::Classified;
    info!(
        owner = %owner.id,
        inserted = group.inserted,
        rejected = group.rejected.len(),
        "Import group committed"
    );
    Ok(())
}
