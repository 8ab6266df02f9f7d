//! Batch orchestrator: uploaded files to one canonical table.
//!
//! Per-file lifecycle:
//!   Parsing → ProfileResolved → Decoded → Normalized → Appended
//! A per-file failure rejects that file at the stage it was attempting;
//! the batch continues with the next file. Any other error aborts the run.
//!
//! The run is a fold: each file yields an independent RecordBatch and the
//! table is their concatenation in upload order.

use crate::{
    config::IngestConfig,
    decode::{decode_upload, UploadedFile},
    error::{SettlementError, SettlementResult},
    filename::parse_filename,
    normalizer::{FileContext, RecordNormalizer},
    record::{RecordBatch, SettlementTable},
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStage {
    Parsing,
    ProfileResolved,
    Decoded,
    Normalized,
    Appended,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    Normalized { rows: usize },
    Appended { rows: usize },
    Rejected { at: FileStage, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub file_name: String,
    pub status:    FileStatus,
}

/// Receives per-file progress. Implemented by whatever drives the run.
pub trait ProgressSink {
    fn message(&mut self, file_name: &str, message: &str);
    fn rejected(&mut self, file_name: &str, at: FileStage, error: &SettlementError);
}

/// Forwards progress to the `log` facade.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn message(&mut self, file_name: &str, message: &str) {
        log::info!("{file_name}: {message}");
    }

    fn rejected(&mut self, file_name: &str, at: FileStage, error: &SettlementError) {
        log::warn!("{file_name}: rejected at {at:?}: {error}");
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub reports: Vec<FileReport>,
    pub table:   SettlementTable,
}

impl BatchOutcome {
    /// Advance every normalized file to Appended once the ledger write succeeded.
    pub fn mark_appended(&mut self) {
        for report in &mut self.reports {
            if let FileStatus::Normalized { rows } = report.status {
                report.status = FileStatus::Appended { rows };
            }
        }
    }

    pub fn rejected(&self) -> impl Iterator<Item = &FileReport> {
        self.reports
            .iter()
            .filter(|r| matches!(r.status, FileStatus::Rejected { .. }))
    }
}

pub struct BatchProcessor<'a> {
    config: &'a IngestConfig,
}

impl<'a> BatchProcessor<'a> {
    pub fn new(config: &'a IngestConfig) -> Self {
        Self { config }
    }

    pub fn process(
        &self,
        files: &[UploadedFile],
        progress: &mut dyn ProgressSink,
    ) -> SettlementResult<BatchOutcome> {
        let mut reports = Vec::with_capacity(files.len());
        let mut batches = Vec::with_capacity(files.len());

        for file in files {
            progress.message(&file.name, "processing");
            match self.process_file(file, progress) {
                Ok(batch) => {
                    progress.message(&file.name, &format!("{} rows normalized", batch.len()));
                    reports.push(FileReport {
                        file_name: file.name.clone(),
                        status: FileStatus::Normalized { rows: batch.len() },
                    });
                    batches.push(batch);
                }
                Err((at, err)) if err.is_per_file() => {
                    progress.rejected(&file.name, at, &err);
                    reports.push(FileReport {
                        file_name: file.name.clone(),
                        status: FileStatus::Rejected { at, reason: err.to_string() },
                    });
                }
                Err((_, err)) => return Err(err),
            }
        }

        let table = SettlementTable::concat(&batches);
        log::info!(
            "batch: {} files, {} rejected, {} rows",
            files.len(),
            files.len() - batches.len(),
            table.len()
        );
        Ok(BatchOutcome { reports, table })
    }

    fn process_file(
        &self,
        file: &UploadedFile,
        progress: &mut dyn ProgressSink,
    ) -> Result<RecordBatch, (FileStage, SettlementError)> {
        let parsed = parse_filename(&file.name).map_err(|e| (FileStage::Parsing, e))?;
        progress.message(&file.name, &format!("settlement month: {}", parsed.settlement_month));
        progress.message(&file.name, &format!("normalized distributor: '{}'", parsed.partner));

        let profile = self
            .config
            .profiles
            .resolve(&parsed.partner, parsed.settlement_month)
            .map_err(|e| (FileStage::ProfileResolved, e))?;
        let ctx = FileContext::new(
            file.name.clone(),
            parsed.partner.clone(),
            parsed.settlement_month,
            profile.lag_months,
        );
        progress.message(&file.name, &format!("sale month: {}", ctx.sale_month));

        let sheet = decode_upload(file, profile.header_row, profile.worksheet.as_deref())
            .map_err(|e| (FileStage::Decoded, e))?
            .skip_rows(profile.skip_rows());

        RecordNormalizer::new(&self.config.platforms, &self.config.artists)
            .normalize(&sheet, profile, &ctx)
            .map_err(|e| (FileStage::Normalized, e))
    }
}
