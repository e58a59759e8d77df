//! Statement layouts. Each bank export is a [`StatementFormat`] that turns
//! raw bytes into rows of untyped fields.

use csv::ByteRecord;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CsvError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing required column: {0}")]
    MissingColumn(&'static str),
}

/// One statement line with its fields still as text. Absent fields are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line number in the source file, header included.
    pub line: usize,
    pub owner_account: String,
    pub date: String,
    pub amount: String,
    pub counterpart_name: String,
    pub counterpart_account: String,
    pub description: String,
}

pub trait StatementFormat: Send + Sync {
    fn name(&self) -> &'static str;

    /// File extension handled by this format, without the dot.
    fn extension(&self) -> &'static str;

    fn accepts(&self, filename: &str) -> bool {
        Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(self.extension()))
    }

    fn read(&self, data: &[u8]) -> Result<Vec<RawRow>, CsvError>;
}

/// KBC (Belgium) account export: `;`-separated with Dutch headers.
#[derive(Debug, Clone, Copy, Default)]
pub struct KbcCsv;

impl KbcCsv {
    pub const OWNER_ACCOUNT: &'static str = "Rekening";
    pub const DATE: &'static str = "Boekingsdatum";
    pub const AMOUNT: &'static str = "Bedrag";
    pub const COUNTERPART_ACCOUNT: &'static str = "Rekening tegenpartij";
    pub const COUNTERPART_NAME: &'static str = "Naam tegenpartij bevat";
    pub const DESCRIPTION: &'static str = "Mededelingen";
}

struct Columns {
    owner_account: usize,
    date: usize,
    amount: usize,
    counterpart_name: Option<usize>,
    counterpart_account: Option<usize>,
    description: Option<usize>,
}

impl Columns {
    fn locate(headers: &[String]) -> Result<Self, CsvError> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        let require = |name: &'static str| find(name).ok_or(CsvError::MissingColumn(name));
        Ok(Columns {
            owner_account: require(KbcCsv::OWNER_ACCOUNT)?,
            date: require(KbcCsv::DATE)?,
            amount: require(KbcCsv::AMOUNT)?,
            counterpart_name: find(KbcCsv::COUNTERPART_NAME),
            counterpart_account: find(KbcCsv::COUNTERPART_ACCOUNT),
            description: find(KbcCsv::DESCRIPTION),
        })
    }
}

fn field(record: &ByteRecord, index: Option<usize>) -> String {
    index
        .and_then(|i| record.get(i))
        .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string())
        .unwrap_or_default()
}

impl StatementFormat for KbcCsv {
    fn name(&self) -> &'static str {
        "kbc-csv"
    }

    fn extension(&self) -> &'static str {
        "csv"
    }

    fn read(&self, data: &[u8]) -> Result<Vec<RawRow>, CsvError> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(true)
            .flexible(true)
            .from_reader(data);

        // Exports are often Latin-1; decode lossily instead of failing.
        let headers: Vec<String> = reader
            .byte_headers()?
            .iter()
            .map(|h| {
                String::from_utf8_lossy(h)
                    .trim_start_matches('\u{feff}')
                    .trim()
                    .to_string()
            })
            .collect();
        let columns = Columns::locate(&headers)?;

        let mut rows = Vec::new();
        for (i, result) in reader.byte_records().enumerate() {
            let record = result?;
            if record.iter().all(|f| f.iter().all(u8::is_ascii_whitespace)) {
                continue;
            }
            rows.push(RawRow {
                line: i + 2,
                owner_account: field(&record, Some(columns.owner_account)),
                date: field(&record, Some(columns.date)),
                amount: field(&record, Some(columns.amount)),
                counterpart_name: field(&record, columns.counterpart_name),
                counterpart_account: field(&record, columns.counterpart_account),
                description: field(&record, columns.description),
            });
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "Rekeningnummer;Rekening;Rekeninguittrekselnummer;Boekingsdatum;Transactie;Rekening tegenpartij;Naam tegenpartij bevat;Bedrag;Mededelingen\n";

    #[test]
    fn accepts_csv_extension_case_insensitive() {
        assert!(KbcCsv.accepts("export.csv"));
        assert!(KbcCsv.accepts("EXPORT.CSV"));
        assert!(!KbcCsv.accepts("export.ofx"));
        assert!(!KbcCsv.accepts("csv"));
    }

    #[test]
    fn reads_selected_columns() {
        let data = format!(
            "{HEADER}x;BE68539007547034;1;15/01/2024;42;BE71096123456769;Acme NV;-12,50;order 7\n"
        );
        let rows = KbcCsv.read(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.line, 2);
        assert_eq!(row.owner_account, "BE68539007547034");
        assert_eq!(row.date, "15/01/2024");
        assert_eq!(row.amount, "-12,50");
        assert_eq!(row.counterpart_name, "Acme NV");
        assert_eq!(row.counterpart_account, "BE71096123456769");
        assert_eq!(row.description, "order 7");
    }

    #[test]
    fn decodes_latin1_lossily() {
        let mut data = HEADER.as_bytes().to_vec();
        data.extend_from_slice(b"x;BE68539007547034;1;15/01/2024;42;;Caf\xe9 Central;-3,20;\n");
        let rows = KbcCsv.read(&data).unwrap();
        assert!(rows[0].counterpart_name.starts_with("Caf"));
        assert_eq!(rows[0].description, "");
    }

    #[test]
    fn short_rows_leave_fields_empty() {
        let data = format!("{HEADER}x;BE68539007547034;1;15/01/2024\n");
        let rows = KbcCsv.read(data.as_bytes()).unwrap();
        assert_eq!(rows[0].amount, "");
        assert_eq!(rows[0].counterpart_name, "");
    }

    #[test]
    fn missing_required_column() {
        let data = "Rekening;Boekingsdatum\nBE68539007547034;15/01/2024\n";
        assert!(matches!(
            KbcCsv.read(data.as_bytes()),
            Err(CsvError::MissingColumn("Bedrag"))
        ));
    }
}
