//! File body decoding: uploaded bytes to a header-named table of cells.
//!
//! Two paths, chosen by extension:
//!   - `.xls`: tab-delimited text in cp949; first line is the header.
//!   - other: binary workbook via calamine, with a configurable header
//!     row and optional worksheet name.

use crate::{
    error::{SettlementError, SettlementResult},
    filename::{base_name, FileKind},
    types::{parse_finite, render_number, Cell},
};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

/// Text values read as null in delimited exports.
const NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// An uploaded settlement file: its original name and raw bytes.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name:  String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }

    pub fn from_path(path: &Path) -> SettlementResult<Self> {
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Ok(Self { name, bytes })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedSheet {
    pub headers: Vec<String>,
    pub rows:    Vec<Vec<Cell>>,
}

impl DecodedSheet {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Discard the first `n` data rows.
    pub fn skip_rows(mut self, n: usize) -> Self {
        let n = n.min(self.rows.len());
        self.rows.drain(..n);
        self
    }

    /// Build from absolute sheet rows: `header_row` names the columns and
    /// every later non-blank row is data.
    pub fn from_grid(grid: Vec<Vec<Cell>>, header_row: usize) -> Option<Self> {
        if header_row >= grid.len() {
            return None;
        }
        let mut grid = grid;
        let data: Vec<Vec<Cell>> = grid
            .split_off(header_row + 1)
            .into_iter()
            .filter(|row| row.iter().any(|c| !c.is_null()))
            .collect();
        let header_cells = grid.pop().unwrap_or_default();

        let width = data
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(header_cells.len()))
            .max()
            .unwrap_or(0);
        let headers = header_names(&header_cells, width);
        let rows = data
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Null);
                row
            })
            .collect();
        Some(Self { headers, rows })
    }
}

/// Column names from a header row. Blank names become `Unnamed: i`;
/// repeated names get `.1`, `.2`, ... suffixes.
fn header_names(cells: &[Cell], width: usize) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    (0..width)
        .map(|i| {
            let base = match cells.get(i) {
                None | Some(Cell::Null) => format!("Unnamed: {i}"),
                Some(Cell::Number(n)) => render_number(*n),
                Some(Cell::Text(s)) => s.clone(),
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let name = if *count == 0 { base } else { format!("{base}.{count}") };
            *count += 1;
            name
        })
        .collect()
}

pub fn decode_upload(
    file: &UploadedFile,
    header_row: usize,
    worksheet: Option<&str>,
) -> SettlementResult<DecodedSheet> {
    match FileKind::from_file_name(&file.name) {
        FileKind::DelimitedText => decode_delimited(&file.name, &file.bytes),
        FileKind::Workbook => decode_workbook(&file.name, &file.bytes, header_row, worksheet),
    }
}

fn decode_error(file_name: &str, reason: impl Into<String>) -> SettlementError {
    SettlementError::Decode {
        file_name: base_name(file_name).to_string(),
        reason: reason.into(),
    }
}

/// Tab-delimited cp949 text. Types are inferred per column: a column is
/// numeric only when every non-null value parses as a number.
pub fn decode_delimited(file_name: &str, bytes: &[u8]) -> SettlementResult<DecodedSheet> {
    let (text, _, had_errors) = encoding_rs::EUC_KR.decode(bytes);
    if had_errors {
        return Err(decode_error(file_name, "not valid cp949 text"));
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut lines: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| decode_error(file_name, e.to_string()))?;
        lines.push(record.iter().map(str::to_string).collect());
    }
    if lines.is_empty() {
        return Err(decode_error(file_name, "file has no header line"));
    }

    let width = lines.iter().map(Vec::len).max().unwrap_or(0);
    let numeric: Vec<bool> = (0..width)
        .map(|col| {
            let mut values = lines[1..]
                .iter()
                .filter_map(|line| line.get(col))
                .filter(|v| !NA_VALUES.contains(&v.as_str()))
                .peekable();
            values.peek().is_some() && values.all(|v| parse_finite(v).is_some())
        })
        .collect();

    let mut grid: Vec<Vec<Cell>> = Vec::with_capacity(lines.len());
    let mut lines = lines.into_iter();
    if let Some(header) = lines.next() {
        grid.push(header.into_iter().map(Cell::Text).collect());
    }
    for line in lines {
        let row = line
            .into_iter()
            .enumerate()
            .map(|(col, value)| {
                if NA_VALUES.contains(&value.as_str()) {
                    Cell::Null
                } else if numeric[col] {
                    parse_finite(&value).map(Cell::Number).unwrap_or(Cell::Text(value))
                } else {
                    Cell::Text(value)
                }
            })
            .collect();
        grid.push(row);
    }

    DecodedSheet::from_grid(grid, 0).ok_or_else(|| decode_error(file_name, "file has no header line"))
}

pub fn decode_workbook(
    file_name: &str,
    bytes: &[u8],
    header_row: usize,
    worksheet: Option<&str>,
) -> SettlementResult<DecodedSheet> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| decode_error(file_name, e.to_string()))?;

    let range = match worksheet {
        Some(name) => workbook
            .worksheet_range(name)
            .map_err(|e| decode_error(file_name, format!("worksheet '{name}': {e}")))?,
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| decode_error(file_name, "workbook has no worksheets"))?
            .map_err(|e| decode_error(file_name, e.to_string()))?,
    };

    // calamine ranges start at the first used cell; pad so row indices
    // stay absolute sheet rows.
    let (start_row, start_col) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));
    let mut grid: Vec<Vec<Cell>> = vec![Vec::new(); start_row];
    for row in range.rows() {
        let mut cells = vec![Cell::Null; start_col];
        cells.extend(row.iter().map(workbook_cell));
        grid.push(cells);
    }

    log::debug!(
        "{}: {} sheet rows, header at row {header_row}",
        base_name(file_name),
        grid.len()
    );

    DecodedSheet::from_grid(grid, header_row).ok_or_else(|| {
        decode_error(file_name, format!("header row {header_row} is past the last row"))
    })
}

fn workbook_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Null,
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::String(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}
