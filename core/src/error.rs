use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("Filename does not match 'YYYY-MM_<partner>[ (N)].<ext>': {file_name}")]
    InvalidFilename { file_name: String },

    #[error("Unsupported distributor: '{name}'")]
    UnsupportedDistributor { name: String },

    #[error("Invalid Google Sheets URL (no /spreadsheets/d/<ID>/ segment): {url}")]
    InvalidSheetUrl { url: String },

    #[error("Spreadsheet '{spreadsheet_id}' not found or not accessible")]
    SheetNotFound { spreadsheet_id: String },

    #[error("Worksheet '{worksheet}' not found")]
    WorksheetNotFound { worksheet: String },

    #[error("Cannot decode '{file_name}': {reason}")]
    Decode { file_name: String, reason: String },

    #[error("Required column '{column}' missing from source file")]
    MissingColumn { column: String },

    #[error("Invalid profile for '{partner}': {reason}")]
    InvalidProfile { partner: String, reason: String },

    #[error("Sheets API returned HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Sheets API transport failure: {0}")]
    Transport(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SettlementError {
    /// Errors scoped to a single uploaded file. The batch reports and
    /// skips the file; everything else aborts the run.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            SettlementError::InvalidFilename { .. }
                | SettlementError::UnsupportedDistributor { .. }
                | SettlementError::Decode { .. }
                | SettlementError::MissingColumn { .. }
        )
    }
}

impl From<ureq::Error> for SettlementError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, response) => {
                let message = response
                    .into_string()
                    .unwrap_or_else(|_| "<unreadable body>".to_string());
                SettlementError::Http { status, message }
            }
            ureq::Error::Transport(transport) => SettlementError::Transport(transport.to_string()),
        }
    }
}

pub type SettlementResult<T> = Result<T, SettlementError>;
