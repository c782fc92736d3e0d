use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use std::{fs, path::Path};
use tracing::{debug, info, instrument};

use crate::process::{utils::infer_cell_from_str, RawTable};

/// Parse `data` as CSV with the given delimiter. Rows longer than the
/// header are an error; shorter rows are padded with nulls.
fn parse_with_delimiter(data: &[u8], delimiter: u8) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(data);

    let headers = rdr.byte_headers().context("reading CSV header")?.clone();
    let mut table =
        RawTable::from_raw_headers(headers.iter().map(|h| String::from_utf8_lossy(h).into_owned()));

    for (idx, result) in rdr.byte_records().enumerate() {
        let record = result.with_context(|| format!("CSV parse error at record {}", idx))?;
        if record.len() > table.headers.len() {
            bail!(
                "record {} has {} fields, header has {}",
                idx,
                record.len(),
                table.headers.len()
            );
        }
        let row = record
            .iter()
            .map(|f| infer_cell_from_str(&String::from_utf8_lossy(f)))
            .collect();
        table.push_row(row);
    }
    Ok(table)
}

/// Load a CSV file, sniffing the delimiter: `;` first, then `,` when the
/// semicolon parse fails or finds fewer than two columns.
#[instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let path = path.as_ref();
    let data = fs::read(path).with_context(|| format!("reading {:?}", path))?;

    match parse_with_delimiter(&data, b';') {
        Ok(table) if table.headers.len() > 1 => {
            info!(delimiter = ";", columns = table.headers.len(), "parsed CSV");
            return Ok(table);
        }
        Ok(_) => debug!("semicolon parse produced a single column, retrying with comma"),
        Err(e) => debug!("semicolon parse failed ({}), retrying with comma", e),
    }

    let table = parse_with_delimiter(&data, b',')
        .with_context(|| format!("parsing {:?} with ',' delimiter", path))?;
    info!(delimiter = ",", columns = table.headers.len(), "parsed CSV");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::Cell;
    use tempfile::tempdir;

    #[test]
    fn semicolon_file() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("league_2023.csv");
        fs::write(&path, "id;Name;Date\n1;Aalborg Pirates;2023-09-14\n2;Odense;\n")?;

        let t = read_csv(&path)?;
        assert_eq!(t.headers, vec!["id", "name", "date"]);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[0][0], Cell::Int(1));
        assert_eq!(t.rows[0][1], Cell::Text("Aalborg Pirates".into()));
        assert_eq!(t.rows[1][2], Cell::Null);
        Ok(())
    }

    #[test]
    fn falls_back_to_comma() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("players.csv");
        fs::write(&path, "id,Player Name,Points\n7,Jensen,12\n8,Nielsen,3.5\n")?;

        let t = read_csv(&path)?;
        assert_eq!(t.headers, vec!["id", "player_name", "points"]);
        assert_eq!(t.rows[1][2], Cell::Float(3.5));
        Ok(())
    }

    #[test]
    fn short_rows_are_padded() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("short.csv");
        fs::write(&path, "a;b;c\n1;2\n")?;

        let t = read_csv(&path)?;
        assert_eq!(t.rows[0], vec![Cell::Int(1), Cell::Int(2), Cell::Null]);
        Ok(())
    }

    #[test]
    fn ragged_rows_fail_both_delimiters() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("bad.csv");
        fs::write(&path, "a;b\n1,2;3;4,5\n")?;
        assert!(read_csv(&path).is_err());
        Ok(())
    }
}
