//! Student spreadsheets: CSV or XLSX with one student per row.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use log::{info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;

use crate::error::{CertissueError, Result};
use crate::record::{parse_date, StudentRow, MISSING};
use crate::store::Store;

/// Column headers, in sample-sheet order.
pub const HEADERS: [&str; 10] = [
    "Name",
    "Course",
    "Roll No",
    "College Name",
    "Affiliated Name",
    "Start Date",
    "End Date",
    "Email",
    "Contact",
    "Gender",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Csv,
    Xlsx,
}

impl SheetFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "csv" => Some(SheetFormat::Csv),
            "xlsx" | "xlsm" | "xls" | "ods" => Some(SheetFormat::Xlsx),
            _ => None,
        }
    }

    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime = content_type.split(';').next()?.trim().to_ascii_lowercase();
        match mime.as_str() {
            "text/csv" | "text/plain" | "application/csv" => Some(SheetFormat::Csv),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-excel"
            | "application/vnd.oasis.opendocument.spreadsheet" => Some(SheetFormat::Xlsx),
            _ => None,
        }
    }
}

/// A row that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 1-based, header row not counted
    pub row: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    /// Rows whose roll number was already waiting
    pub skipped: usize,
    pub errors: Vec<RowError>,
}

type RawRow = HashMap<String, String>;

/// One data row as read from the sheet.
#[derive(Debug, Clone)]
pub struct SheetRow {
    /// 1-based, header row not counted
    pub row: usize,
    /// Cells keyed by lower-cased header, or why the row could not be read
    pub cells: std::result::Result<RawRow, String>,
}

fn header_key(header: &str) -> String {
    header.trim().to_ascii_lowercase()
}

fn keyed<'a>(headers: &[String], cells: impl Iterator<Item = &'a str>) -> RawRow {
    headers.iter().cloned().zip(cells.map(str::to_string)).collect()
}

fn read_csv(bytes: &[u8]) -> Result<Vec<SheetRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);
    let headers: Vec<String> = reader.headers()?.iter().map(header_key).collect();

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let cells = match record {
            Ok(record) => Ok(keyed(&headers, record.iter())),
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => Err(format!("unreadable row: {}", e)),
        };
        rows.push(SheetRow { row: idx + 1, cells });
    }
    Ok(rows)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.date().format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        Data::DateTimeIso(s) => s.clone(),
        // numeric roll numbers and phone numbers come back as floats
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string().trim().to_string(),
    }
}

/// Keys the rows under `header` by header text. Numbering happens before
/// blank rows are dropped so errors point at the sheet row.
fn workbook_rows<'a>(header: &[Data], rows: impl Iterator<Item = &'a [Data]>) -> Vec<SheetRow> {
    let headers: Vec<String> = header.iter().map(|c| header_key(&cell_text(c))).collect();
    rows.enumerate()
        .filter(|(_, row)| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|(idx, row)| {
            let texts: Vec<String> = row.iter().map(cell_text).collect();
            SheetRow {
                row: idx + 1,
                cells: Ok(keyed(&headers, texts.iter().map(String::as_str))),
            }
        })
        .collect()
}

fn read_workbook(bytes: &[u8]) -> Result<Vec<SheetRow>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| CertissueError::Config("workbook has no sheets".to_string()))??;

    let mut rows = range.rows();
    match rows.next() {
        Some(header) => Ok(workbook_rows(header, rows)),
        None => Ok(Vec::new()),
    }
}

/// Reads all data rows in sheet order.
pub fn read_rows(bytes: &[u8], format: SheetFormat) -> Result<Vec<SheetRow>> {
    match format {
        SheetFormat::Csv => read_csv(bytes),
        SheetFormat::Xlsx => read_workbook(bytes),
    }
}

fn required(raw: &RawRow, header: &str) -> std::result::Result<String, String> {
    raw.get(&header_key(header))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| format!("missing '{}'", header))
}

fn optional(raw: &RawRow, header: &str) -> String {
    raw.get(&header_key(header))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("nan"))
        .unwrap_or(MISSING)
        .to_string()
}

fn date(raw: &RawRow, header: &str) -> std::result::Result<chrono::NaiveDate, String> {
    let value = required(raw, header)?;
    parse_date(&value).ok_or_else(|| format!("invalid '{}': {}", header, value))
}

/// Turns one spreadsheet row into a student, naming every problem.
pub fn parse_row(raw: &RawRow) -> std::result::Result<StudentRow, String> {
    let mut problems = Vec::new();
    let mut take = |r: std::result::Result<String, String>| {
        r.map_err(|e| problems.push(e)).unwrap_or_default()
    };

    let full_name = take(required(raw, "Name"));
    let course = take(required(raw, "Course"));
    let roll_number = take(required(raw, "Roll No"));
    let college_name = take(required(raw, "College Name"));
    let affiliated_name = take(required(raw, "Affiliated Name"));
    let email = take(required(raw, "Email"));
    let start_date = date(raw, "Start Date").map_err(|e| problems.push(e)).ok();
    let end_date = date(raw, "End Date").map_err(|e| problems.push(e)).ok();

    match (start_date, end_date) {
        (Some(start_date), Some(end_date)) if problems.is_empty() => Ok(StudentRow {
            full_name,
            course,
            roll_number,
            college_name,
            affiliated_name,
            start_date,
            end_date,
            email,
            contact: optional(raw, "Contact"),
            gender: optional(raw, "Gender"),
        }),
        _ => Err(problems.join(", ")),
    }
}

/// Queues every valid row for certificate generation. Bad rows are
/// reported and the remaining rows still imported.
pub fn import_students(store: &Store, bytes: &[u8], format: SheetFormat) -> Result<ImportReport> {
    let rows = read_rows(bytes, format)?;
    let mut report = ImportReport::default();

    for sheet_row in &rows {
        match sheet_row.cells.as_ref().map_err(String::clone).and_then(parse_row) {
            Ok(student) => {
                if store.insert_student(&student)? {
                    report.imported += 1;
                } else {
                    report.skipped += 1;
                }
            }
            Err(message) => {
                warn!("Row {} rejected: {}", sheet_row.row, message);
                report.errors.push(RowError {
                    row: sheet_row.row,
                    message,
                });
            }
        }
    }

    info!(
        "Import finished: {} imported, {} skipped, {} rejected",
        report.imported,
        report.skipped,
        report.errors.len()
    );
    Ok(report)
}

/// CSV with the expected headers and one example row.
pub fn sample_sheet() -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADERS)?;
    writer.write_record([
        "Jane Doe",
        "Internship Program in Data Science",
        "CS2024001",
        "Tech University",
        "State University",
        "2024-01-01",
        "2024-03-31",
        "jane.doe@example.com",
        "9876543210",
        "Female",
    ])?;
    writer
        .into_inner()
        .map_err(|e| CertissueError::Io(e.into_error()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = "\
Name,Course,Roll No,College Name,Affiliated Name,Start Date,End Date,Email,Contact,Gender
Jane Doe,Data Science,CS001,Tech College,State University,2024-01-01,31/03/2024,jane@example.com,,F
Bad Row,Data Science,,Tech College,State University,someday,2024-03-31,bad@example.com,123,M
Jane Again,Data Science,CS001,Tech College,State University,2024-01-01,2024-03-31,j2@example.com,,
";

    #[test]
    fn test_format_detection() {
        assert_eq!(SheetFormat::from_path(Path::new("students.CSV")), Some(SheetFormat::Csv));
        assert_eq!(SheetFormat::from_path(Path::new("students.xlsx")), Some(SheetFormat::Xlsx));
        assert_eq!(SheetFormat::from_path(Path::new("students.txt")), None);
        assert_eq!(SheetFormat::from_content_type("text/csv; charset=utf-8"), Some(SheetFormat::Csv));
    }

    #[test]
    fn test_parse_row_defaults_optional_columns() {
        let rows = read_rows(SHEET.as_bytes(), SheetFormat::Csv).unwrap();
        let student = parse_row(rows[0].cells.as_ref().unwrap()).unwrap();
        assert_eq!(student.roll_number, "CS001");
        assert_eq!(student.contact, MISSING);
        assert_eq!(student.gender, "F");
        assert_eq!(student.end_date, chrono::NaiveDate::from_ymd_opt(2024, 3, 31).unwrap());
    }

    #[test]
    fn test_parse_row_names_all_problems() {
        let rows = read_rows(SHEET.as_bytes(), SheetFormat::Csv).unwrap();
        assert_eq!(rows[1].row, 2);
        let err = parse_row(rows[1].cells.as_ref().unwrap()).unwrap_err();
        assert!(err.contains("missing 'Roll No'"));
        assert!(err.contains("invalid 'Start Date': someday"));
    }

    #[test]
    fn test_import_partial_failure() {
        let store = Store::in_memory().unwrap();
        let report = import_students(&store, SHEET.as_bytes(), SheetFormat::Csv).unwrap();
        assert_eq!(report.imported, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].row, 2);
        assert_eq!(store.count_pending().unwrap(), 1);
    }

    #[test]
    fn test_sample_sheet_imports_cleanly() {
        let sample = sample_sheet().unwrap();
        let rows = read_rows(&sample, SheetFormat::Csv).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(parse_row(rows[0].cells.as_ref().unwrap()).is_ok());
    }

    #[test]
    fn test_workbook_rows_keep_sheet_numbering() {
        let text = |s: &str| Data::String(s.to_string());
        let header = vec![text("Name"), text("Roll No")];
        let rows = vec![
            vec![text("Asha Rao"), Data::Float(100.0)],
            vec![Data::Empty, Data::Empty],
            vec![text("Ravi Kumar"), text("R101")],
        ];

        let numbered = workbook_rows(&header, rows.iter().map(Vec::as_slice));
        assert_eq!(numbered.len(), 2);
        assert_eq!(numbered[0].row, 1);
        assert_eq!(numbered[1].row, 3);
        let ravi = numbered[1].cells.as_ref().unwrap();
        assert_eq!(ravi["roll no"], "R101");
        assert_eq!(numbered[0].cells.as_ref().unwrap()["roll no"], "100");
    }

    #[test]
    fn test_undecodable_row_is_rejected_alone() {
        let mut sheet = Vec::new();
        sheet.extend_from_slice(HEADERS.join(",").as_bytes());
        sheet.extend_from_slice(
            b"\nAsha Rao,Data Science,R100,Tech College,State University,2024-01-01,2024-03-31,asha@example.com,,F",
        );
        sheet.extend_from_slice(
            b"\nBad \xff Row,Data Science,R101,Tech College,State University,2024-01-01,2024-03-31,bad@example.com,,M",
        );
        sheet.extend_from_slice(
            b"\nRavi Kumar,Data Science,R102,Tech College,State University,2024-01-01,2024-03-31,ravi@example.com,,M\n",
        );

        let store = Store::in_memory().unwrap();
        let report = import_students(&store, &sheet, SheetFormat::Csv).unwrap();
        assert_eq!(report.imported, 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].row, 2);
        assert!(report.errors[0].message.starts_with("unreadable row"));
        assert_eq!(store.count_pending().unwrap(), 2);
    }
}
