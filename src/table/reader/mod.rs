
use std::fs;
use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{CellValue, Record};
use crate::{RagError, Result};

/// Supported on-disk table formats, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Spreadsheet,
    Csv,
    Json,
    JsonLines,
}

impl TableFormat {
    #[inline]
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Some(Self::Spreadsheet),
            "csv" => Some(Self::Csv),
            "json" => Some(Self::Json),
            "jsonl" | "ndjson" => Some(Self::JsonLines),
            _ => None,
        }
    }
}

/// Read every data row of a table file.
///
/// The first row (or the object keys for JSON) names the columns.
#[inline]
pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    if !path.is_file() {
        return Err(RagError::Input(format!(
            "No file found at {}",
            path.display()
        )));
    }

    let format = TableFormat::from_path(path).ok_or_else(|| {
        RagError::Input(format!(
            "Unsupported table format for {} (expected xlsx, xls, ods, csv, json or jsonl)",
            path.display()
        ))
    })?;

    debug!("Reading {:?} table from {}", format, path.display());

    let records = match format {
        TableFormat::Spreadsheet => read_spreadsheet(path)?,
        TableFormat::Csv => read_csv(path)?,
        TableFormat::Json => read_json(path)?,
        TableFormat::JsonLines => read_json_lines(path)?,
    };

    info!("Read {} records from {}", records.len(), path.display());
    Ok(records)
}

fn read_spreadsheet(path: &Path) -> Result<Vec<Record>> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| RagError::Table(format!("Failed to open workbook: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| RagError::Table("Workbook contains no worksheets".to_string()))?
        .map_err(|e| RagError::Table(format!("Failed to read first worksheet: {}", e)))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| cell.to_string().trim().to_string())
        .collect();

    let records: Vec<Record> = rows
        .map(|row| {
            headers
                .iter()
                .zip(row.iter())
                .filter(|(header, _)| !header.is_empty())
                .map(|(header, cell)| (header.clone(), cell_from_spreadsheet(cell)))
                .collect()
        })
        .collect();

    Ok(records)
}

fn cell_from_spreadsheet(cell: &Data) -> CellValue {
    match cell {
        Data::Empty | Data::Error(_) => CellValue::Empty,
        Data::String(text) => CellValue::Text(text.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Integer(*n),
        Data::Bool(b) => CellValue::Bool(*b),
        other => CellValue::Text(other.to_string()),
    }
}

fn read_csv(path: &Path) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|e| RagError::Table(format!("Failed to open CSV file: {}", e)))?;

    let headers = reader
        .headers()
        .map_err(|e| RagError::Table(format!("Failed to read CSV header: {}", e)))?
        .clone();

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row =
            row.map_err(|e| RagError::Table(format!("Malformed CSV row {}: {}", line + 1, e)))?;

        let record: Record = headers
            .iter()
            .zip(row.iter())
            .map(|(header, value)| {
                let cell = if value.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::Text(value.to_string())
                };
                (header, cell)
            })
            .collect();
        records.push(record);
    }

    Ok(records)
}

fn read_json(path: &Path) -> Result<Vec<Record>> {
    let content = fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)
        .map_err(|e| RagError::Table(format!("Invalid JSON table: {}", e)))?;

    let Value::Array(rows) = value else {
        return Err(RagError::Table(
            "JSON table must be an array of objects".to_string(),
        ));
    };

    Ok(rows
        .iter()
        .enumerate()
        .map(|(row, value)| record_from_json(row, value))
        .collect())
}

fn read_json_lines(path: &Path) -> Result<Vec<Record>> {
    let content = fs::read_to_string(path)?;

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .map(|(row, line)| {
            let value: Value = serde_json::from_str(line).map_err(|e| {
                RagError::Table(format!("Invalid JSON on record {}: {}", row + 1, e))
            })?;
            Ok(record_from_json(row, &value))
        })
        .collect()
}

fn record_from_json(row: usize, value: &Value) -> Record {
    let Value::Object(map) = value else {
        warn!("Record {} is not a JSON object, treating it as empty", row);
        return Record::new();
    };

    map.iter()
        .map(|(key, value)| {
            let cell = match value {
                Value::Null => CellValue::Empty,
                Value::String(text) => CellValue::Text(text.clone()),
                // Integers past 2^53 would round through f64
                Value::Number(n) => match (n.as_i64(), n.as_f64()) {
                    (Some(int), _) => CellValue::Integer(int),
                    (None, Some(float)) if !n.is_u64() => CellValue::Number(float),
                    _ => CellValue::Text(n.to_string()),
                },
                Value::Bool(b) => CellValue::Bool(*b),
                nested => CellValue::Text(nested.to_string()),
            };
            (key.clone(), cell)
        })
        .collect()
}
