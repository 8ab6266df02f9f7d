//! Canonical settlement records and the tables built from them.
//!
//! Column order is fixed by `CanonicalField::ALL` and never depends on
//! the order files were processed in.

use crate::types::Cell;
use serde::{Deserialize, Serialize};

/// Workflow flag columns trailing the canonical columns in the ledger.
pub const DISTRIBUTOR_SETTLED_COLUMN: &str = "유통사_회사정산";
pub const ARTIST_SETTLED_COLUMN: &str = "회사_아티스트정산";
pub const FLAG_COLUMNS: [&str; 2] = [DISTRIBUTOR_SETTLED_COLUMN, ARTIST_SETTLED_COLUMN];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    SettlementMonth,
    SaleMonth,
    Distributor,
    ArtistName,
    AlbumName,
    TrackName,
    Platform,
    ServiceType,
    SaleCount,
    Revenue,
    SettlementAmount,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 11] = [
        CanonicalField::SettlementMonth,
        CanonicalField::SaleMonth,
        CanonicalField::Distributor,
        CanonicalField::ArtistName,
        CanonicalField::AlbumName,
        CanonicalField::TrackName,
        CanonicalField::Platform,
        CanonicalField::ServiceType,
        CanonicalField::SaleCount,
        CanonicalField::Revenue,
        CanonicalField::SettlementAmount,
    ];

    /// Ledger header text.
    pub fn header(&self) -> &'static str {
        match self {
            CanonicalField::SettlementMonth  => "정산월",
            CanonicalField::SaleMonth        => "판매월",
            CanonicalField::Distributor      => "유통사",
            CanonicalField::ArtistName       => "아티스트명",
            CanonicalField::AlbumName        => "앨범명",
            CanonicalField::TrackName        => "곡명",
            CanonicalField::Platform         => "플랫폼",
            CanonicalField::ServiceType      => "서비스구분",
            CanonicalField::SaleCount        => "판매횟수",
            CanonicalField::Revenue          => "매출",
            CanonicalField::SettlementAmount => "정산금",
        }
    }

    pub fn headers() -> Vec<&'static str> {
        Self::ALL.iter().map(|f| f.header()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub settlement_month:  String,
    pub sale_month:        String,
    pub distributor:       String,
    pub artist_name:       Cell,
    pub album_name:        Cell,
    pub track_name:        Cell,
    pub platform:          Cell,
    pub service_type:      Cell,
    pub sale_count:        Cell,
    pub revenue:           Cell,
    pub settlement_amount: Cell,
}

impl SettlementRecord {
    pub fn get(&self, field: CanonicalField) -> Cell {
        match field {
            CanonicalField::SettlementMonth  => Cell::text(&self.settlement_month),
            CanonicalField::SaleMonth        => Cell::text(&self.sale_month),
            CanonicalField::Distributor      => Cell::text(&self.distributor),
            CanonicalField::ArtistName       => self.artist_name.clone(),
            CanonicalField::AlbumName        => self.album_name.clone(),
            CanonicalField::TrackName        => self.track_name.clone(),
            CanonicalField::Platform         => self.platform.clone(),
            CanonicalField::ServiceType      => self.service_type.clone(),
            CanonicalField::SaleCount        => self.sale_count.clone(),
            CanonicalField::Revenue          => self.revenue.clone(),
            CanonicalField::SettlementAmount => self.settlement_amount.clone(),
        }
    }
}

/// One file's normalized output. `columns` lists only the canonical
/// columns holding at least one non-null value in this file.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    pub source:  String,
    pub columns: Vec<CanonicalField>,
    rows:        Vec<Vec<Cell>>,
}

impl RecordBatch {
    /// Build a batch, dropping columns that are null in every record.
    pub fn from_records(source: impl Into<String>, records: &[SettlementRecord]) -> Self {
        let columns: Vec<CanonicalField> = CanonicalField::ALL
            .into_iter()
            .filter(|field| records.iter().any(|r| !r.get(*field).is_null()))
            .collect();
        let rows = records
            .iter()
            .map(|r| columns.iter().map(|field| r.get(*field)).collect())
            .collect();
        Self {
            source: source.into(),
            columns,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, field: CanonicalField) -> bool {
        self.columns.contains(&field)
    }

    /// Rows widened to the full canonical schema; dropped columns read as null.
    pub fn canonical_rows(&self) -> impl Iterator<Item = Vec<Cell>> + '_ {
        self.rows.iter().map(move |row| {
            CanonicalField::ALL
                .iter()
                .map(|field| {
                    self.columns
                        .iter()
                        .position(|c| c == field)
                        .map(|i| row[i].clone())
                        .unwrap_or(Cell::Null)
                })
                .collect()
        })
    }
}

/// The concatenated canonical table across all normalized files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettlementTable {
    rows: Vec<Vec<Cell>>,
}

impl SettlementTable {
    pub fn concat<'a>(batches: impl IntoIterator<Item = &'a RecordBatch>) -> Self {
        let rows = batches
            .into_iter()
            .filter(|batch| !batch.is_empty())
            .flat_map(|batch| batch.canonical_rows())
            .collect();
        Self { rows }
    }

    pub fn from_rows(rows: Vec<Vec<Cell>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == CanonicalField::ALL.len()));
        Self { rows }
    }

    pub fn columns(&self) -> &'static [CanonicalField] {
        &CanonicalField::ALL
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value(&self, row: usize, field: CanonicalField) -> Option<&Cell> {
        let col = CanonicalField::ALL.iter().position(|f| *f == field)?;
        self.rows.get(row).map(|r| &r[col])
    }
}
