//! Record normalizer: one decoded partner file to canonical records.
//!
//! Field rules:
//!   - artist/album/track: mandatory columns; a missing one fails the file.
//!   - platform: alias-resolved; absent column, unmapped, or null → "".
//!   - service_type: absent column or unmapped → "", otherwise verbatim.
//!   - sale_count/revenue/settlement_amount: Sum → total of numeric
//!     contributors, Column → value or null if absent, Absent → "".

use crate::{
    alias::AliasTable,
    decode::DecodedSheet,
    error::{SettlementError, SettlementResult},
    profile::{ColumnSource, PartnerProfile},
    record::{RecordBatch, SettlementRecord},
    types::{Cell, YearMonth},
};

/// Per-file values shared by every record of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileContext {
    pub source:           String,
    pub distributor:      String,
    pub settlement_month: YearMonth,
    pub sale_month:       YearMonth,
}

impl FileContext {
    pub fn new(
        source: impl Into<String>,
        distributor: impl Into<String>,
        settlement_month: YearMonth,
        lag_months: u32,
    ) -> Self {
        Self {
            source: source.into(),
            distributor: distributor.into(),
            settlement_month,
            sale_month: settlement_month.minus_lag_months(lag_months),
        }
    }
}

pub struct RecordNormalizer<'a> {
    platforms: &'a AliasTable,
    artists:   &'a AliasTable,
}

/// A column lookup resolved once per file against the sheet headers.
enum Lookup {
    Index(usize),
    Indices(Vec<usize>),
    MissingColumn,
    Unmapped,
}

impl Lookup {
    fn resolve(sheet: &DecodedSheet, source: &ColumnSource) -> Self {
        match source {
            ColumnSource::Column(name) => sheet
                .column_index(name)
                .map(Lookup::Index)
                .unwrap_or(Lookup::MissingColumn),
            // Contributors missing from the file count as zero.
            ColumnSource::Sum(names) => Lookup::Indices(
                names.iter().filter_map(|n| sheet.column_index(n)).collect(),
            ),
            ColumnSource::Absent => Lookup::Unmapped,
        }
    }
}

impl<'a> RecordNormalizer<'a> {
    pub fn new(platforms: &'a AliasTable, artists: &'a AliasTable) -> Self {
        Self { platforms, artists }
    }

    pub fn normalize(
        &self,
        sheet: &DecodedSheet,
        profile: &PartnerProfile,
        ctx: &FileContext,
    ) -> SettlementResult<RecordBatch> {
        let cols = &profile.columns;
        let required = |name: &str| {
            sheet
                .column_index(name)
                .ok_or_else(|| SettlementError::MissingColumn {
                    column: name.to_string(),
                })
        };
        let artist = required(&cols.artist_name)?;
        let album = required(&cols.album_name)?;
        let track = required(&cols.track_name)?;

        let platform = Lookup::resolve(sheet, &cols.platform);
        let service_type = Lookup::resolve(sheet, &cols.service_type);
        let sale_count = Lookup::resolve(sheet, &cols.sale_count);
        let revenue = Lookup::resolve(sheet, &cols.revenue);
        let settlement_amount = Lookup::resolve(sheet, &cols.settlement_amount);

        let settlement_month = ctx.settlement_month.to_string();
        let sale_month = ctx.sale_month.to_string();

        let records: Vec<SettlementRecord> = sheet
            .rows
            .iter()
            .map(|row| SettlementRecord {
                settlement_month: settlement_month.clone(),
                sale_month: sale_month.clone(),
                distributor: ctx.distributor.clone(),
                artist_name: resolve_alias(&row[artist], self.artists),
                album_name: row[album].clone(),
                track_name: row[track].clone(),
                platform: self.platform_value(row, &platform),
                service_type: text_value(row, &service_type),
                sale_count: numeric_value(row, &sale_count, &ctx.source),
                revenue: numeric_value(row, &revenue, &ctx.source),
                settlement_amount: numeric_value(row, &settlement_amount, &ctx.source),
            })
            .collect();

        let batch = RecordBatch::from_records(ctx.source.clone(), &records);
        log::debug!(
            "{}: {} records, {} non-null columns",
            ctx.source,
            batch.len(),
            batch.columns.len()
        );
        Ok(batch)
    }

    fn platform_value(&self, row: &[Cell], lookup: &Lookup) -> Cell {
        match lookup {
            Lookup::Index(i) if !row[*i].is_null() => resolve_alias(&row[*i], self.platforms),
            _ => Cell::text(""),
        }
    }
}

fn resolve_alias(cell: &Cell, table: &AliasTable) -> Cell {
    match cell {
        Cell::Text(name) => Cell::text(table.resolve(name)),
        other => other.clone(),
    }
}

fn text_value(row: &[Cell], lookup: &Lookup) -> Cell {
    match lookup {
        Lookup::Index(i) => row[*i].clone(),
        Lookup::Indices(_) | Lookup::MissingColumn | Lookup::Unmapped => Cell::text(""),
    }
}

fn numeric_value(row: &[Cell], lookup: &Lookup, source: &str) -> Cell {
    match lookup {
        Lookup::Index(i) => row[*i].clone(),
        Lookup::Indices(indices) => {
            let total: f64 = indices
                .iter()
                .map(|i| &row[*i])
                .filter(|cell| !cell.is_null())
                .filter_map(|cell| {
                    let value = cell.as_number();
                    if value.is_none() {
                        log::warn!("{source}: non-numeric value {cell:?} skipped in sum");
                    }
                    value
                })
                .sum();
            Cell::Number(total)
        }
        Lookup::MissingColumn => Cell::Null,
        Lookup::Unmapped => Cell::text(""),
    }
}
