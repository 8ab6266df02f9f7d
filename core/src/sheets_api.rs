//! Google Sheets v4 REST backend.
//!
//! Authentication is the caller's concern: the client takes an OAuth
//! bearer token that has already been issued for the spreadsheets scope.

use crate::{
    error::{SettlementError, SettlementResult},
    ledger::{LedgerSheet, SheetValue, SpreadsheetService},
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";

const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

pub struct GoogleSheetsService {
    agent:        ureq::Agent,
    access_token: String,
    base_url:     String,
}

impl GoogleSheetsService {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, SHEETS_API_BASE)
    }

    /// Point the client at a different API root (e.g. a local emulator).
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(TIMEOUT)
            .timeout_read(TIMEOUT)
            .timeout_write(TIMEOUT)
            .user_agent(concat!("settlement-runner/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            agent,
            access_token: access_token.into(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, segments: &[&str]) -> SettlementResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| anyhow::anyhow!("invalid Sheets API base '{}': {e}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Sheets API base '{}' cannot take a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    fn get_json<T: serde::de::DeserializeOwned>(&self, url: &Url) -> SettlementResult<T> {
        let response = self
            .agent
            .get(url.as_str())
            .set("Authorization", &self.bearer())
            .set("Accept", "application/json")
            .call()?;
        Ok(response.into_json()?)
    }

    fn post_json(&self, url: &Url, body: Value) -> SettlementResult<()> {
        self.agent
            .post(url.as_str())
            .set("Authorization", &self.bearer())
            .set("Content-Type", "application/json")
            .send_json(body)?;
        Ok(())
    }
}

impl SpreadsheetService for GoogleSheetsService {
    fn open_worksheet(
        &self,
        spreadsheet_id: &str,
        worksheet: &str,
    ) -> SettlementResult<Box<dyn LedgerSheet + '_>> {
        let mut url = self.endpoint(&["spreadsheets", spreadsheet_id])?;
        url.query_pairs_mut().append_pair("fields", "sheets.properties.title");

        let meta: SpreadsheetMeta = match self.get_json(&url) {
            Err(SettlementError::Http { status: 403 | 404, .. }) => {
                return Err(SettlementError::SheetNotFound {
                    spreadsheet_id: spreadsheet_id.to_string(),
                })
            }
            other => other?,
        };
        if !meta.sheets.iter().any(|s| s.properties.title == worksheet) {
            return Err(SettlementError::WorksheetNotFound {
                worksheet: worksheet.to_string(),
            });
        }
        Ok(Box::new(GoogleWorksheet {
            service: self,
            spreadsheet_id: spreadsheet_id.to_string(),
            title: worksheet.to_string(),
        }))
    }
}

struct GoogleWorksheet<'a> {
    service:        &'a GoogleSheetsService,
    spreadsheet_id: String,
    title:          String,
}

impl GoogleWorksheet<'_> {
    /// A1 range covering the whole sheet: the quoted title.
    fn range(&self) -> String {
        format!("'{}'", self.title.replace('\'', "''"))
    }
}

fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl LedgerSheet for GoogleWorksheet<'_> {
    fn title(&self) -> &str {
        &self.title
    }

    fn get_all_values(&self) -> SettlementResult<Vec<Vec<String>>> {
        let range = self.range();
        let url = self
            .service
            .endpoint(&["spreadsheets", &self.spreadsheet_id, "values", &range])?;
        let body: ValueRange = self.service.get_json(&url)?;

        // The API trims trailing empty cells; pad rows back to full width.
        let mut rows: Vec<Vec<String>> = body
            .values
            .iter()
            .map(|row| row.iter().map(display_text).collect())
            .collect();
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, String::new());
        }
        Ok(rows)
    }

    fn append_rows(&self, rows: &[Vec<SheetValue>]) -> SettlementResult<()> {
        let target = format!("{}:append", self.range());
        let mut url = self
            .service
            .endpoint(&["spreadsheets", &self.spreadsheet_id, "values", &target])?;
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let values: Vec<Vec<Value>> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| match v {
                        SheetValue::Text(s) => Value::String(s.clone()),
                        SheetValue::Bool(b) => Value::Bool(*b),
                    })
                    .collect()
            })
            .collect();
        self.service.post_json(&url, json!({ "values": values }))?;
        log::debug!("sheets api '{}': {} rows appended", self.title, rows.len());
        Ok(())
    }
}
