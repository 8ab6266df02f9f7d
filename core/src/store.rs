//! SQLite-backed local ledger.
//!
//! RULE: Only store.rs talks to the database.
//! Mirrors the spreadsheet model: spreadsheets hold named worksheets,
//! worksheets hold rows of display text. Booleans are stored as
//! `TRUE`/`FALSE`, the way spreadsheet UIs show them.

use crate::{
    error::{SettlementError, SettlementResult},
    ledger::{LedgerSheet, SheetValue, SpreadsheetService},
};
use rusqlite::{params, Connection, OptionalExtension};

pub struct SqliteLedger {
    conn: Connection,
}

impl SqliteLedger {
    /// Open (or create) the ledger database at `path`.
    pub fn open(path: &str) -> SettlementResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only matters for real files; :memory: ignores it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SettlementResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> SettlementResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_ledger.sql"))?;
        Ok(())
    }

    // ── Setup ──────────────────────────────────────────────────

    pub fn create_spreadsheet(&self, spreadsheet_id: &str, title: &str) -> SettlementResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO spreadsheet (spreadsheet_id, title) VALUES (?1, ?2)",
            params![spreadsheet_id, title],
        )?;
        Ok(())
    }

    pub fn add_worksheet(&self, spreadsheet_id: &str, title: &str) -> SettlementResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO worksheet (spreadsheet_id, title) VALUES (?1, ?2)",
            params![spreadsheet_id, title],
        )?;
        Ok(())
    }

    // ── Inspection ─────────────────────────────────────────────

    pub fn row_count(&self, spreadsheet_id: &str, worksheet: &str) -> SettlementResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM sheet_row WHERE spreadsheet_id = ?1 AND worksheet = ?2",
            params![spreadsheet_id, worksheet],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn spreadsheet_exists(&self, spreadsheet_id: &str) -> SettlementResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM spreadsheet WHERE spreadsheet_id = ?1",
                params![spreadsheet_id],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn worksheet_exists(&self, spreadsheet_id: &str, title: &str) -> SettlementResult<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM worksheet WHERE spreadsheet_id = ?1 AND title = ?2",
                params![spreadsheet_id, title],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

impl SpreadsheetService for SqliteLedger {
    fn open_worksheet(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
    ) -> SettlementResult<Box<dyn LedgerSheet + '_>> {
        if !self.spreadsheet_exists(spreadsheet_id)? {
            return Err(SettlementError::SheetNotFound {
                spreadsheet_id: spreadsheet_id.to_string(),
            });
        }
        if !self.worksheet_exists(spreadsheet_id, worksheet)? {
            return Err(SettlementError::WorksheetNotFound {
                worksheet: worksheet.to_string(),
            });
        }
        Ok(Box::new(SqliteWorksheet {
            conn: &self.conn,
            spreadsheet_id: spreadsheet_id.to_string(),
            title: worksheet.to_string(),
        }))
    }
}

struct SqliteWorksheet<'a> {
    conn:           &'a Connection,
    spreadsheet_id: String,
    title:          String,
}

fn display_text(value: &SheetValue) -> String {
    match value {
        SheetValue::Text(s) => s.clone(),
        SheetValue::Bool(true) => "TRUE".to_string(),
        SheetValue::Bool(false) => "FALSE".to_string(),
    }
}

impl LedgerSheet for SqliteWorksheet<'_> {
    fn title(&self) -> &str {
        &self.title
    }

    fn get_all_values(&self) -> SettlementResult<Vec<Vec<String>>> {
        let mut stmt = self.conn.prepare(
            "SELECT cells_json FROM sheet_row
             WHERE spreadsheet_id = ?1 AND worksheet = ?2
             ORDER BY id ASC",
        )?;
        let raw = stmt
            .query_map(params![self.spreadsheet_id, self.title], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let mut rows = raw
            .iter()
            .map(|json| serde_json::from_str::<Vec<String>>(json))
            .collect::<Result<Vec<_>, _>>()?;

        // Pad to a rectangle like a spreadsheet range read.
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, String::new());
        }
        Ok(rows)
    }

    fn append_rows(&self, rows: &[Vec<SheetValue>]) -> SettlementResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sheet_row (spreadsheet_id, worksheet, cells_json) VALUES (?1, ?2, ?3)",
            )?;
            for row in rows {
                let cells: Vec<String> = row.iter().map(display_text).collect();
                stmt.execute(params![
                    self.spreadsheet_id,
                    self.title,
                    serde_json::to_string(&cells)?
                ])?;
            }
        }
        tx.commit()?;
        log::debug!("sqlite ledger '{}': {} rows appended", self.title, rows.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> SqliteLedger {
        let ledger = SqliteLedger::in_memory().expect("in-memory ledger");
        ledger.migrate().expect("migration");
        ledger.create_spreadsheet("sheet-1", "정산").unwrap();
        ledger.add_worksheet("sheet-1", "data").unwrap();
        ledger
    }

    #[test]
    fn unknown_spreadsheet_and_worksheet() {
        let ledger = ledger();
        assert!(matches!(
            ledger.open_worksheet("nope", "data"),
            Err(SettlementError::SheetNotFound { .. })
        ));
        assert!(matches!(
            ledger.open_worksheet("sheet-1", "missing"),
            Err(SettlementError::WorksheetNotFound { .. })
        ));
    }

    #[test]
    fn appended_rows_read_back_in_order() {
        let ledger = ledger();
        let sheet = ledger.open_worksheet("sheet-1", "data").unwrap();
        sheet
            .append_rows(&[
                vec![SheetValue::Text("h1".into()), SheetValue::Text("h2".into())],
                vec![SheetValue::Text("v".into()), SheetValue::Bool(false), SheetValue::Bool(true)],
            ])
            .unwrap();
        let values = sheet.get_all_values().unwrap();
        assert_eq!(values[0], vec!["h1", "h2", ""]);
        assert_eq!(values[1], vec!["v", "FALSE", "TRUE"]);
        assert_eq!(ledger.row_count("sheet-1", "data").unwrap(), 2);
    }
}
