pub mod format;
pub mod parse;
pub mod pipeline;

pub use format::{CsvError, KbcCsv, RawRow, StatementFormat};
pub use parse::{parse_amount, parse_date};
pub use pipeline::{import_statement, GroupReport, ImportError, ImportReport, ImportStage, RowError};
