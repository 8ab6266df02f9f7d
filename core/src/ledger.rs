//! Ledger sync: append-only upload of new canonical rows.
//!
//! RULE: existing ledger rows are never updated or deleted. A row is new
//! iff its normalized full-row tuple is absent from the existing sheet.
//! Both sides go through `comparison_key`: NFKC, then any finite number
//! re-rendered in canonical form, so `12`, `12.0` and `１２` compare equal.
//! Legacy rows hold `nan` where a value was missing; it keys as empty.

use crate::{
    error::{SettlementError, SettlementResult},
    record::{CanonicalField, SettlementTable, FLAG_COLUMNS},
    types::{parse_finite, render_number},
};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

/// A value written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetValue {
    Text(String),
    Bool(bool),
}

/// One worksheet of a remote spreadsheet.
pub trait LedgerSheet {
    fn title(&self) -> &str;

    /// Every row including the header, as displayed text.
    fn get_all_values(&self) -> SettlementResult<Vec<Vec<String>>>;

    /// Append rows after the last row, values only.
    fn append_rows(&self, rows: &[Vec<SheetValue>]) -> SettlementResult<()>;
}

/// Spreadsheet backend: resolves a spreadsheet ID and worksheet title.
pub trait SpreadsheetService {
    fn open_worksheet(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
    ) -> SettlementResult<Box<dyn LedgerSheet + '_>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    pub appended:        usize,
    pub already_present: usize,
}

fn spreadsheet_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/spreadsheets/d/([a-zA-Z0-9_-]+)").expect("invalid spreadsheet id regex"))
}

pub fn extract_spreadsheet_id(url: &str) -> SettlementResult<String> {
    spreadsheet_id_re()
        .captures(url)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| SettlementError::InvalidSheetUrl { url: url.to_string() })
}

/// Text a cell is compared by, for ledger text and rendered cells alike.
pub fn comparison_key(text: &str) -> String {
    let normalized: String = text.nfkc().collect();
    if normalized == "nan" {
        return String::new();
    }
    match parse_finite(&normalized) {
        Some(n) => render_number(n),
        None => normalized,
    }
}

/// Ledger header row: canonical columns plus the two workflow flags.
pub fn ledger_header() -> Vec<String> {
    CanonicalField::headers()
        .into_iter()
        .chain(FLAG_COLUMNS)
        .map(str::to_string)
        .collect()
}

/// Rows of `table`, rendered as text, whose comparison keys are not
/// present in `existing` (header first). Existing rows are projected onto
/// the canonical columns by header name, which also drops the workflow
/// flag columns.
pub fn new_rows(table: &SettlementTable, existing: &[Vec<String>]) -> Vec<Vec<String>> {
    let existing_set: HashSet<Vec<String>> = match existing.split_first() {
        None => HashSet::new(),
        Some((header, rows)) => {
            let positions: Vec<Option<usize>> = CanonicalField::ALL
                .iter()
                .map(|field| {
                    let pos = header.iter().position(|h| h == field.header());
                    if pos.is_none() {
                        log::warn!("ledger header lacks column '{}'; reading it as empty", field.header());
                    }
                    pos
                })
                .collect();
            rows.iter()
                .map(|row| {
                    positions
                        .iter()
                        .map(|pos| {
                            pos.and_then(|i| row.get(i))
                                .map(|v| comparison_key(v))
                                .unwrap_or_default()
                        })
                        .collect()
                })
                .collect()
        }
    };

    table
        .rows()
        .iter()
        .map(|row| row.iter().map(|cell| cell.render()).collect::<Vec<_>>())
        .filter(|row| {
            let key: Vec<String> = row.iter().map(|v| comparison_key(v)).collect();
            !existing_set.contains(&key)
        })
        .collect()
}

pub fn sync_to_ledger(
    table: &SettlementTable,
    service: &dyn SpreadsheetService,
    sheet_url: &str,
    worksheet: &str,
) -> SettlementResult<SyncReport> {
    let spreadsheet_id = extract_spreadsheet_id(sheet_url)?;
    let sheet = service.open_worksheet(&spreadsheet_id, worksheet)?;

    let existing = sheet.get_all_values()?;
    log::info!(
        "ledger '{}': {} existing rows",
        sheet.title(),
        existing.len().saturating_sub(1)
    );

    let fresh = new_rows(table, &existing);
    let report = SyncReport {
        appended: fresh.len(),
        already_present: table.len() - fresh.len(),
    };
    if fresh.is_empty() {
        log::info!("ledger '{}': nothing new to append", sheet.title());
        return Ok(report);
    }

    let mut values: Vec<Vec<SheetValue>> = Vec::with_capacity(fresh.len() + 1);
    if existing.is_empty() {
        // Blank worksheet: write the header so later runs can project by name.
        values.push(ledger_header().into_iter().map(SheetValue::Text).collect());
    }
    values.extend(fresh.into_iter().map(|row| {
        row.into_iter()
            .map(SheetValue::Text)
            .chain(FLAG_COLUMNS.iter().map(|_| SheetValue::Bool(false)))
            .collect::<Vec<_>>()
    }));
    sheet.append_rows(&values)?;
    log::info!(
        "ledger '{}': appended {} rows ({} already present)",
        sheet.title(),
        report.appended,
        report.already_present
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Cell;

    fn table() -> SettlementTable {
        let row = |track: &str, count: f64| {
            vec![
                Cell::text("2024-05"), Cell::text("2024-04"), Cell::text("뮤직앤뉴"),
                Cell::text("스원"), Cell::text("앨범"), Cell::text(track),
                Cell::text("멜론"), Cell::Null, Cell::Number(count),
                Cell::Number(1.5), Cell::Number(1.0),
            ]
        };
        SettlementTable::from_rows(vec![row("a", 3.0), row("b", 4.0)])
    }

    #[test]
    fn spreadsheet_id_from_url() {
        let url = "https://docs.google.com/spreadsheets/d/1AbC-d_9/edit#gid=0";
        assert_eq!(extract_spreadsheet_id(url).unwrap(), "1AbC-d_9");
        assert!(matches!(
            extract_spreadsheet_id("https://example.com/sheet"),
            Err(SettlementError::InvalidSheetUrl { .. })
        ));
    }

    #[test]
    fn numeric_formatting_does_not_cause_novelty() {
        let mut existing = vec![ledger_header()];
        existing.push(
            ["2024-05", "2024-04", "뮤직앤뉴", "스원", "앨범", "a", "멜론", "", "3", "1.5", "1", "FALSE", "TRUE"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        let fresh = new_rows(&table(), &existing);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0][5], "b");
    }

    #[test]
    fn existing_rows_match_by_header_name_not_position() {
        let mut header = ledger_header();
        header.reverse();
        let mut row: Vec<String> =
            ["2024-05", "2024-04", "뮤직앤뉴", "스원", "앨범", "b", "멜론", "", "4", "1.5", "1", "FALSE", "FALSE"]
                .iter()
                .map(|s| s.to_string())
                .collect();
        row.reverse();
        let fresh = new_rows(&table(), &[header, row]);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0][5], "a");
    }

    #[test]
    fn compatibility_forms_compare_equal() {
        // Fullwidth digits in the sheet normalize to ASCII under NFKC.
        let mut existing = vec![ledger_header()];
        existing.push(
            ["２０２４-05", "2024-04", "뮤직앤뉴", "스원", "앨범", "a", "멜론", "", "３", "1.5", "1"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        assert_eq!(new_rows(&table(), &existing).len(), 1);
    }

    #[test]
    fn decimal_text_in_ledger_matches_whole_numbers() {
        let table = SettlementTable::from_rows(vec![vec![
            Cell::text("2024-05"), Cell::text("2024-04"), Cell::text("뮤직앤뉴"),
            Cell::text("스원"), Cell::text("앨범"), Cell::text("a"),
            Cell::text("멜론"), Cell::text("스트리밍"), Cell::Number(3.0),
            Cell::Number(120.0), Cell::Number(60.0),
        ]]);
        let mut existing = vec![ledger_header()];
        existing.push(
            ["2024-05", "2024-04", "뮤직앤뉴", "스원", "앨범", "a", "멜론", "스트리밍", "3.0", "120.0", "60.0", "FALSE", "FALSE"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        assert!(new_rows(&table, &existing).is_empty());
    }

    #[test]
    fn legacy_nan_matches_null() {
        let mut existing = vec![ledger_header()];
        existing.push(
            ["2024-05", "2024-04", "뮤직앤뉴", "스원", "앨범", "a", "멜론", "nan", "3.0", "1.5", "1.0"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        let fresh = new_rows(&table(), &existing);
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0][5], "b");
    }

    #[test]
    fn appended_text_keeps_source_form() {
        // Comparison keys are not what gets written.
        let table = SettlementTable::from_rows(vec![vec![
            Cell::text("2024-05"), Cell::text("2024-04"), Cell::text("뮤직앤뉴"),
            Cell::text("스원"), Cell::text("앨범"), Cell::text("007"),
            Cell::text("멜론"), Cell::Null, Cell::Number(2.5),
            Cell::Number(1.0), Cell::Number(1.0),
        ]]);
        let fresh = new_rows(&table, &[]);
        assert_eq!(fresh[0][5], "007");
        assert_eq!(fresh[0][7], "");
        assert_eq!(fresh[0][8], "2.5");
    }

    #[test]
    fn comparison_keys() {
        assert_eq!(comparison_key("120.0"), "120");
        assert_eq!(comparison_key("１２"), "12");
        assert_eq!(comparison_key("nan"), "");
        assert_eq!(comparison_key("2024-05"), "2024-05");
        assert_eq!(comparison_key("멜론"), "멜론");
    }
}
