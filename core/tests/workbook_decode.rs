//! Integration tests for binary workbook uploads.
//!
//! Workbooks are assembled in memory as minimal OOXML packages, so the
//! calamine path runs on real bytes. Tests verify:
//! 1. A profile's named worksheet is read instead of the first sheet
//! 2. The header row is an absolute sheet row even when the used range
//!    starts lower
//! 3. Sum contributors add up, with missing cells counting as zero
//! 4. Without a worksheet name the first sheet is used

use settlement_core::{
    batch::{BatchProcessor, FileStage, FileStatus, LogProgress},
    config::IngestConfig,
    decode::{decode_workbook, UploadedFile},
    error::SettlementError,
    record::CanonicalField,
    types::Cell,
};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

enum Fx {
    S(&'static str),
    N(f64),
    Blank,
}

/// One worksheet: name plus `(0-based row, cells from column A)`.
type SheetFixture = (&'static str, Vec<(u32, Vec<Fx>)>);

fn column_letter(col: usize) -> char {
    (b'A' + col as u8) as char
}

fn sheet_xml(rows: &[(u32, Vec<Fx>)]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (row, cells) in rows {
        let r = row + 1;
        xml.push_str(&format!(r#"<row r="{r}">"#));
        for (col, cell) in cells.iter().enumerate() {
            let reference = format!("{}{r}", column_letter(col));
            match cell {
                Fx::S(text) => xml.push_str(&format!(
                    r#"<c r="{reference}" t="inlineStr"><is><t>{text}</t></is></c>"#
                )),
                Fx::N(value) => xml.push_str(&format!(r#"<c r="{reference}"><v>{value}</v></c>"#)),
                Fx::Blank => {}
            }
        }
        xml.push_str("</row>");
    }
    xml.push_str("</sheetData></worksheet>");
    xml
}

fn xlsx(sheets: &[SheetFixture]) -> Vec<u8> {
    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#,
    );
    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut workbook_rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (i, (name, _)) in sheets.iter().enumerate() {
        let n = i + 1;
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
        workbook.push_str(&format!(r#"<sheet name="{name}" sheetId="{n}" r:id="rId{n}"/>"#));
        workbook_rels.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{n}.xml"/>"#
        ));
    }
    content_types.push_str("</Types>");
    workbook.push_str("</sheets></workbook>");
    workbook_rels.push_str("</Relationships>");

    let root_rels = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        let mut part = |path: &str, body: &str| {
            zip.start_file(path, options).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        };
        part("[Content_Types].xml", &content_types);
        part("_rels/.rels", root_rels);
        part("xl/workbook.xml", &workbook);
        part("xl/_rels/workbook.xml.rels", &workbook_rels);
        for (i, (_, rows)) in sheets.iter().enumerate() {
            part(&format!("xl/worksheets/sheet{}.xml", i + 1), &sheet_xml(rows));
        }
        zip.finish().unwrap();
    }
    buf
}

/// Settlement report in the layout 비스킷사운드 sends: a summary sheet
/// first, the detail sheet second with its header on sheet row 3.
fn biscuit_sound_workbook() -> Vec<u8> {
    use Fx::*;
    xlsx(&[
        (
            "요약",
            vec![
                (0, vec![S("정산 요약")]),
                (1, vec![S("합계"), N(999.0)]),
            ],
        ),
        (
            "음원 상세내역",
            vec![
                // Row 0 is empty, so the used range starts at row 1.
                (1, vec![S("2024년 6월 음원 정산 상세")]),
                (
                    3,
                    vec![
                        S("아티스트명"), S("앨범명"), S("트랙명"), S("서비스사이트"), S("MEDIA"),
                        S("스트리밍"), S("다운로드"), S("기타수량"), S("저작인접권료"), S("인세"),
                    ],
                ),
                (
                    4,
                    vec![
                        S("스원"), S("봄"), S("밤"), S("Spotify Premium"), S("스트리밍"),
                        N(10.0), N(2.0), Blank, N(120.5), N(60.0),
                    ],
                ),
                // Row 5 is blank and is not a record.
                (
                    6,
                    vec![
                        S("나노말"), S("여름"), S("낮"), S("멜론"), S("다운로드"),
                        N(0.0), N(1.0), N(1.0), N(7.0), N(3.0),
                    ],
                ),
            ],
        ),
    ])
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: named worksheet, absolute header row, sums
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn named_sheet_with_offset_header_normalizes() {
    let config = IngestConfig::builtin();
    let files = vec![UploadedFile::new("2024-06_비스킷사운드.xlsx", biscuit_sound_workbook())];

    let outcome = BatchProcessor::new(&config)
        .process(&files, &mut LogProgress)
        .unwrap();

    assert_eq!(outcome.reports[0].status, FileStatus::Normalized { rows: 2 });
    let table = &outcome.table;
    assert_eq!(table.value(0, CanonicalField::SaleMonth), Some(&Cell::text("2024-05")));
    assert_eq!(table.value(0, CanonicalField::ArtistName), Some(&Cell::text("스원")));
    assert_eq!(table.value(0, CanonicalField::TrackName), Some(&Cell::text("밤")));
    assert_eq!(table.value(0, CanonicalField::Platform), Some(&Cell::text("스포티파이")));
    assert_eq!(table.value(0, CanonicalField::ServiceType), Some(&Cell::text("스트리밍")));
    assert_eq!(table.value(0, CanonicalField::SaleCount), Some(&Cell::Number(12.0)));
    assert_eq!(table.value(0, CanonicalField::Revenue), Some(&Cell::Number(120.5)));
    assert_eq!(table.value(0, CanonicalField::SettlementAmount), Some(&Cell::Number(60.0)));

    assert_eq!(table.value(1, CanonicalField::ArtistName), Some(&Cell::text("나노말")));
    assert_eq!(table.value(1, CanonicalField::SaleCount), Some(&Cell::Number(2.0)));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: decoder behaviour without the batch
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn header_row_counts_from_the_top_of_the_sheet() {
    let sheet = decode_workbook(
        "2024-06_비스킷사운드.xlsx",
        &biscuit_sound_workbook(),
        3,
        Some("음원 상세내역"),
    )
    .unwrap();

    assert_eq!(sheet.headers[0], "아티스트명");
    assert_eq!(sheet.headers.len(), 10);
    assert_eq!(sheet.rows.len(), 2, "blank row between records is dropped");
    assert_eq!(sheet.rows[0][7], Cell::Null);
}

#[test]
fn first_sheet_used_when_none_named() {
    let sheet = decode_workbook("f.xlsx", &biscuit_sound_workbook(), 0, None).unwrap();
    assert_eq!(sheet.headers, vec!["정산 요약", "Unnamed: 1"]);
    assert_eq!(sheet.rows, vec![vec![Cell::text("합계"), Cell::Number(999.0)]]);
}

#[test]
fn missing_sheet_or_short_sheet_is_a_decode_error() {
    let bytes = biscuit_sound_workbook();

    let err = decode_workbook("f.xlsx", &bytes, 0, Some("없는시트")).unwrap_err();
    assert!(matches!(err, SettlementError::Decode { .. }));

    let err = decode_workbook("f.xlsx", &bytes, 40, Some("음원 상세내역")).unwrap_err();
    assert!(matches!(err, SettlementError::Decode { .. }));
}

#[test]
fn wrong_sheet_layout_rejects_the_file() {
    // Detail sheet renamed: the profile's worksheet no longer exists.
    use Fx::*;
    let bytes = xlsx(&[("Sheet1", vec![(3, vec![S("아티스트명")])])]);
    let files = vec![UploadedFile::new("2024-06_비스킷사운드.xlsx", bytes)];

    let outcome = BatchProcessor::new(&IngestConfig::builtin())
        .process(&files, &mut LogProgress)
        .unwrap();

    assert!(matches!(
        outcome.reports[0].status,
        FileStatus::Rejected { at: FileStage::Decoded, .. }
    ));
    assert!(outcome.table.is_empty());
}
