//! CSV ingestion and export
//!
//! Column types are inferred from the first data record: all-digit fields
//! become int columns, fields with one decimal separator become doubles,
//! everything else is a string. Parse failures on later rows fall back to
//! the column default rather than rejecting the row.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::frame::FrameError;
use crate::frame::column::ColumnType;
use crate::frame::dataframe::DataFrame;

/// Guess a column type from one textual cell.
pub(crate) fn detect_type(value: &str) -> ColumnType {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return ColumnType::String;
    }

    let digits = trimmed
        .strip_prefix(['-', '+'])
        .unwrap_or(trimmed);
    if digits.is_empty() {
        return ColumnType::String;
    }

    let mut has_decimal = false;
    for c in digits.chars() {
        match c {
            '.' | ',' => {
                if has_decimal {
                    return ColumnType::String;
                }
                has_decimal = true;
            }
            c if c.is_ascii_digit() => {}
            _ => return ColumnType::String,
        }
    }

    if has_decimal {
        ColumnType::Double
    } else {
        ColumnType::Int
    }
}

/// Normalize a numeric cell before parsing: trims and accepts a decimal
/// comma.
fn normalize_numeric(value: &str) -> String {
    value.trim().replace(',', ".")
}

/// Read a CSV file into a frame, inferring column types from the first
/// data record.
pub fn read_csv(
    path: impl AsRef<Path>,
    delimiter: u8,
    has_header: bool,
) -> Result<DataFrame, FrameError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_header)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path.as_ref())?;

    let mut frame = DataFrame::new();
    let headers: Vec<String> = if has_header {
        reader.headers()?.iter().map(str::to_owned).collect()
    } else {
        Vec::new()
    };

    let mut initialized = false;
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        if !initialized {
            let names: Vec<String> = if has_header {
                headers.clone()
            } else {
                (0..record.len()).map(|i| format!("col{i}")).collect()
            };
            for (i, name) in names.iter().enumerate() {
                let cell = record.get(i).unwrap_or("");
                match detect_type(cell) {
                    ColumnType::Int => frame.add_int_column(name.clone())?,
                    ColumnType::Double => frame.add_double_column(name.clone())?,
                    ColumnType::String => frame.add_string_column(name.clone())?,
                }
            }
            initialized = true;
        }

        let values: Vec<String> = (0..frame.column_count())
            .map(|i| {
                let cell = record.get(i).unwrap_or("");
                match frame.columns()[i].column_type() {
                    ColumnType::String => cell.to_owned(),
                    _ => normalize_numeric(cell),
                }
            })
            .collect();
        frame.add_row(&values)?;
    }

    Ok(frame)
}

/// Write a frame as CSV.
pub fn write_csv(
    frame: &DataFrame,
    path: impl AsRef<Path>,
    delimiter: u8,
    include_header: bool,
) -> Result<(), FrameError> {
    let file = File::create(path.as_ref())?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(BufWriter::new(file));

    if include_header {
        writer.write_record(frame.column_names())?;
    }
    for row in 0..frame.row_count() {
        let record: Vec<String> = frame.columns().iter().map(|c| c.text_at(row)).collect();
        writer.write_record(&record)?;
    }
    writer.into_inner().map_err(|e| e.into_error())?.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn detect_type_cases() {
        assert_eq!(detect_type("42"), ColumnType::Int);
        assert_eq!(detect_type("-7"), ColumnType::Int);
        assert_eq!(detect_type("3.14"), ColumnType::Double);
        assert_eq!(detect_type("3,14"), ColumnType::Double);
        assert_eq!(detect_type("1.2.3"), ColumnType::String);
        assert_eq!(detect_type("abc"), ColumnType::String);
        assert_eq!(detect_type(""), ColumnType::String);
        assert_eq!(detect_type("-"), ColumnType::String);
    }

    #[test]
    fn read_csv_infers_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "id,name,price").unwrap();
        writeln!(f, "1,Apple,1.50").unwrap();
        writeln!(f, "2,Banana,0.75").unwrap();
        drop(f);

        let frame = read_csv(&path, b',', true).unwrap();
        assert_eq!(frame.column_names(), vec!["id", "name", "price"]);
        assert_eq!(frame.column("id").unwrap().column_type(), ColumnType::Int);
        assert_eq!(
            frame.column("name").unwrap().column_type(),
            ColumnType::String
        );
        assert_eq!(
            frame.column("price").unwrap().column_type(),
            ColumnType::Double
        );
        assert_eq!(frame.row_count(), 2);
        assert_eq!(frame.column("price").unwrap().as_double().unwrap().at(1), 0.75);
    }

    #[test]
    fn read_csv_without_header_names_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "1;x\n2;y\n").unwrap();

        let frame = read_csv(&path, b';', false).unwrap();
        assert_eq!(frame.column_names(), vec!["col0", "col1"]);
        assert_eq!(frame.row_count(), 2);
    }

    #[test]
    fn bad_numeric_cells_fall_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "n\n5\nnot-a-number\n").unwrap();

        let frame = read_csv(&path, b',', true).unwrap();
        assert_eq!(frame.column("n").unwrap().as_int().unwrap().data(), &[5, 0]);
    }

    #[test]
    fn roundtrip_write_read() {
        let mut frame = DataFrame::new();
        frame.add_int_column("id").unwrap();
        frame.add_string_column("name").unwrap();
        frame.add_row(&["1", "Apple"]).unwrap();
        frame.add_row(&["2", "Banana"]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        write_csv(&frame, &path, b',', true).unwrap();
        let back = read_csv(&path, b',', true).unwrap();
        assert_eq!(back.column_names(), frame.column_names());
        assert_eq!(back.row_count(), 2);
        assert_eq!(back.column("name").unwrap().as_str().unwrap().at(1), "Banana");
    }
}
