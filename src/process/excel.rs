use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::{debug, instrument};

use crate::process::{date_parser::excel_serial_to_datetime, Cell, RawTable};
use crate::report::{Outcome, Warning, WarningKind};

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Null,
        Data::Int(i) => Cell::Int(*i),
        // integral floats read back as integers, the way spreadsheets display them
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Cell::Int(*f as i64),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::String(s) if s.trim().is_empty() => Cell::Null,
        Data::String(s) => Cell::Text(s.clone()),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64())
            .map(Cell::DateTime)
            .unwrap_or(Cell::Null),
        Data::DateTimeIso(s) => chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
            .map(Cell::DateTime)
            .unwrap_or_else(|_| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

/// Load one sheet of a workbook. When `sheet` is missing from the file the
/// first sheet is used and a `SheetFallback` warning is recorded.
/// The first row of the sheet's used range is the header.
#[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_excel<P: AsRef<Path>>(path: P, sheet: Option<&str>) -> Result<Outcome<RawTable>> {
    let path = path.as_ref();
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("opening workbook {:?}", path))?;
    let names = workbook.sheet_names();
    debug!(sheets = ?names, "workbook sheets");

    let mut warnings = Vec::new();
    let chosen = match sheet {
        Some(wanted) if names.iter().any(|n| n == wanted) => wanted.to_string(),
        _ => {
            let first = names
                .first()
                .cloned()
                .ok_or_else(|| anyhow!("workbook {:?} has no sheets", path))?;
            let file = path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            warnings.push(Warning::new(
                WarningKind::SheetFallback,
                file,
                format!(
                    "sheet {:?} not found, using first available sheet `{}`",
                    sheet.unwrap_or_default(),
                    first
                ),
            ));
            first
        }
    };

    let range = workbook
        .worksheet_range(&chosen)
        .with_context(|| format!("reading sheet `{}` of {:?}", chosen, path))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Outcome::with_warnings(RawTable::default(), warnings));
    };
    let mut table = RawTable::from_raw_headers(header_row.iter().map(|c| c.to_string()));
    for row in rows {
        let cells: Vec<Cell> = row.iter().map(to_cell).collect();
        // the used range can carry fully blank rows at the bottom
        if cells.iter().all(Cell::is_null) {
            continue;
        }
        table.push_row(cells);
    }
    debug!(sheet = %chosen, rows = table.rows.len(), "loaded sheet");

    Ok(Outcome::with_warnings(table, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;
    use tempfile::tempdir;

    #[test]
    fn reads_requested_sheet() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("Season_2022.xlsx");
        let mut wb = Workbook::new();
        let other = wb.add_worksheet();
        other.set_name("Summary")?;
        other.write_string(0, 0, "ignored")?;
        let ws = wb.add_worksheet();
        ws.set_name("Box score")?;
        ws.write_string(0, 0, "Team")?;
        ws.write_string(0, 1, "Goals")?;
        ws.write_string(1, 0, "Aalborg")?;
        ws.write_number(1, 1, 4.0)?;
        ws.write_string(2, 0, "Herning")?;
        ws.write_number(2, 1, 2.5)?;
        wb.save(&path)?;

        let out = read_excel(&path, Some("Box score"))?;
        assert!(out.warnings.is_empty());
        let t = out.value;
        assert_eq!(t.headers, vec!["team", "goals"]);
        assert_eq!(t.rows[0], vec![Cell::Text("Aalborg".into()), Cell::Int(4)]);
        assert_eq!(t.rows[1][1], Cell::Float(2.5));
        Ok(())
    }

    #[test]
    fn falls_back_to_first_sheet() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("games 2021.xlsx");
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        ws.set_name("Sheet1")?;
        ws.write_string(0, 0, "Opponent")?;
        ws.write_string(1, 0, "Rungsted")?;
        wb.save(&path)?;

        let out = read_excel(&path, Some("Box score"))?;
        assert!(out.has(WarningKind::SheetFallback));
        assert_eq!(out.value.headers, vec!["opponent"]);
        assert_eq!(out.value.rows.len(), 1);
        Ok(())
    }

    #[test]
    fn garbage_file_is_an_error() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"this is not a zip archive")?;
        assert!(read_excel(&path, None).is_err());
        Ok(())
    }
}
