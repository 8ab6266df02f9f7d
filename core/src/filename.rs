//! Filename convention: `YYYY-MM_<partner>[ (N)].<ext>`.
//!
//! Partner name and settlement month are extracted independently;
//! a file must satisfy both.

use crate::{
    error::{SettlementError, SettlementResult},
    types::{PartnerName, YearMonth},
};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

fn numbered_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}_(.+?)\s*\(\d+\)?\.").expect("invalid numbered name regex"))
}

fn plain_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}_(.+?)\.").expect("invalid plain name regex"))
}

fn settlement_month_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d{4}-\d{2})_(.+)").expect("invalid settlement month regex"))
}

/// How the file body is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Legacy `.xls` exports: tab-delimited text in cp949.
    DelimitedText,
    /// Any other extension: a binary workbook.
    Workbook,
}

impl FileKind {
    pub fn from_file_name(file_name: &str) -> Self {
        let is_xls = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xls"));
        if is_xls {
            FileKind::DelimitedText
        } else {
            FileKind::Workbook
        }
    }
}

/// Everything the filename tells us about an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    pub partner: PartnerName,
    pub settlement_month: YearMonth,
    pub kind: FileKind,
}

/// Final path component of an upload name.
pub fn base_name(file_name: &str) -> &str {
    Path::new(file_name)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(file_name)
}

/// Raw partner name as written in the filename (not yet normalized).
pub fn extract_company_name(file_name: &str) -> SettlementResult<String> {
    let base = base_name(file_name);
    numbered_name_re()
        .captures(base)
        .or_else(|| plain_name_re().captures(base))
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| SettlementError::InvalidFilename {
            file_name: file_name.to_string(),
        })
}

pub fn extract_settlement_month(file_name: &str) -> SettlementResult<YearMonth> {
    let invalid = || SettlementError::InvalidFilename {
        file_name: file_name.to_string(),
    };
    let caps = settlement_month_re().captures(base_name(file_name)).ok_or_else(invalid)?;
    YearMonth::parse(&caps[1]).ok_or_else(invalid)
}

pub fn normalize_text(text: &str) -> String {
    text.nfkc().collect()
}

pub fn parse_filename(file_name: &str) -> SettlementResult<ParsedFilename> {
    let partner = normalize_text(&extract_company_name(file_name)?);
    let settlement_month = extract_settlement_month(file_name)?;
    Ok(ParsedFilename {
        partner,
        settlement_month,
        kind: FileKind::from_file_name(file_name),
    })
}
