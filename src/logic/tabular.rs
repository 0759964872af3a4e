use log::warn;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, WorkflowError};
use crate::files;

/// Header row of a combined heat-flow table.
pub const HEAT_FLOW_HEADERS: [&str; 3] = ["Time", "Internal heat flow", "External heat flow"];

/// CSV text split into a header row and data rows of equal width.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Rows as dictionaries keyed by header.
    pub fn records(&self) -> Vec<BTreeMap<&str, &str>> {
        self.rows
            .iter()
            .map(|row| {
                self.headers
                    .iter()
                    .map(String::as_str)
                    .zip(row.iter().map(String::as_str))
                    .collect()
            })
            .collect()
    }

    /// Values under `header`, or `None` when the header is unknown or a row
    /// is too short to hold it.
    pub fn column(&self, header: &str) -> Option<Vec<&str>> {
        let index = self.headers.iter().position(|h| h == header)?;
        self.rows
            .iter()
            .map(|row| row.get(index).map(String::as_str))
            .collect()
    }
}

/// A data row with the sum of its non-time columns appended.
#[derive(Debug, Clone, PartialEq)]
pub struct SummedRow {
    pub fields: Vec<String>,
    pub sum: f64,
}

impl SummedRow {
    pub fn time(&self) -> &str {
        self.fields.first().map(String::as_str).unwrap_or_default()
    }

    pub fn to_fields(&self) -> Vec<String> {
        let mut fields = self.fields.clone();
        fields.push(format_number(self.sum));
        fields
    }
}

/// One instant of two combined series.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedRow {
    pub time: String,
    pub internal: f64,
    pub external: f64,
}

impl CombinedRow {
    pub fn to_fields(&self) -> Vec<String> {
        vec![
            self.time.clone(),
            format_number(self.internal),
            format_number(self.external),
        ]
    }
}

fn format_number(value: f64) -> String {
    // Debug keeps the trailing ".0" of whole numbers.
    format!("{:?}", value)
}

fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, quoted) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', _) => quoted = !quoted,
            (',', false) => fields.push(std::mem::take(&mut field)),
            (c, _) => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Parse CSV text with a header row. Blank lines are skipped; every data row
/// must have as many fields as the header.
pub fn read_csv(text: &str) -> Result<Table> {
    let mut lines = text.lines().map(str::trim_end).filter(|line| !line.is_empty());
    let headers = match lines.next() {
        Some(line) => split_line(line),
        None => return Ok(Table::default()),
    };

    let rows = lines
        .enumerate()
        .map(|(i, line)| {
            let row = split_line(line);
            if row.len() == headers.len() {
                Ok(row)
            } else {
                Err(WorkflowError::Parse(format!(
                    "csv row {} has {} fields, header has {}",
                    i + 1,
                    row.len(),
                    headers.len()
                )))
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Table { headers, rows })
}

/// Sum every column after the first (time) column of each row.
pub fn process_data(rows: &[Vec<String>]) -> Result<Vec<SummedRow>> {
    rows.iter()
        .map(|row| {
            let sum = row
                .iter()
                .skip(1)
                .map(|value| {
                    value
                        .trim()
                        .parse::<f64>()
                        .map_err(|_| WorkflowError::Parse(format!("'{}' is not a number", value)))
                })
                .sum::<Result<f64>>()?;
            Ok(SummedRow {
                fields: row.clone(),
                sum,
            })
        })
        .collect()
}

/// Pair two equally indexed summed series into (time, internal, external).
pub fn combine_series(internal: &[SummedRow], external: &[SummedRow]) -> Result<Vec<CombinedRow>> {
    if internal.len() != external.len() {
        return Err(WorkflowError::InvalidState(format!(
            "cannot combine series of {} and {} rows",
            internal.len(),
            external.len()
        )));
    }
    Ok(internal
        .iter()
        .zip(external)
        .map(|(inner, outer)| {
            if inner.time() != outer.time() {
                warn!("Combining rows at different times: {} and {}", inner.time(), outer.time());
            }
            CombinedRow {
                time: inner.time().to_string(),
                internal: inner.sum,
                external: outer.sum,
            }
        })
        .collect())
}

/// Sum both heat-flow tables and write the combined series to `path`.
pub async fn write_heat_flow(path: &Path, internal_csv: &str, external_csv: &str) -> Result<Vec<CombinedRow>> {
    let internal = process_data(&read_csv(internal_csv)?.rows)?;
    let external = process_data(&read_csv(external_csv)?.rows)?;
    let combined = combine_series(&internal, &external)?;
    let rows: Vec<Vec<String>> = combined.iter().map(CombinedRow::to_fields).collect();
    files::write_csv(path, &HEAT_FLOW_HEADERS, &rows).await?;
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|row| row.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_process_data_appends_sum() {
        let summed = process_data(&rows(&[&["0", "1.0", "2.0"], &["1", "3.0", "4.0"]])).unwrap();
        assert_eq!(summed[0].sum, 3.0);
        assert_eq!(summed[1].sum, 7.0);
        assert_eq!(summed[1].to_fields(), vec!["1", "3.0", "4.0", "7.0"]);
        assert!(process_data(&rows(&[&["0", "n/a"]])).is_err());
    }

    #[test]
    fn test_read_csv_records() {
        let table = read_csv("Time,\"inlet, top\",outlet\r\n0,1.5,2\r\n\r\n10,2.5,3\r\n").unwrap();
        assert_eq!(table.headers, vec!["Time", "inlet, top", "outlet"]);
        assert_eq!(table.rows.len(), 2);
        let records = table.records();
        assert_eq!(records[1]["inlet, top"], "2.5");
        assert_eq!(table.column("outlet"), Some(vec!["2", "3"]));

        assert!(read_csv("a,b\n1\n").is_err());
        assert_eq!(read_csv("").unwrap(), Table::default());
    }

    #[test]
    fn test_column_of_ragged_table() {
        let table = Table {
            headers: vec!["Time".to_string(), "outlet".to_string()],
            rows: rows(&[&["0", "2"], &["1"]]),
        };
        assert_eq!(table.column("Time"), Some(vec!["0", "1"]));
        assert_eq!(table.column("outlet"), None);
        assert_eq!(table.column("missing"), None);
    }

    #[test]
    fn test_combine_series() {
        let internal = process_data(&rows(&[&["0", "1.0", "2.0"], &["1", "3.0", "4.0"]])).unwrap();
        let external = process_data(&rows(&[&["0", "-1.0"], &["1", "-2.5"]])).unwrap();
        let combined = combine_series(&internal, &external).unwrap();
        assert_eq!(
            combined[1],
            CombinedRow {
                time: "1".to_string(),
                internal: 7.0,
                external: -2.5
            }
        );
        assert!(combine_series(&internal, &external[..1]).is_err());
    }

    #[tokio::test]
    async fn test_write_heat_flow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heat_flow.csv");
        write_heat_flow(&path, "t,a,b\n0,1,2\n", "t,c\n0,4\n").await.unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text, "Time,Internal heat flow,External heat flow\r\n0,3.0,4.0\r\n");
    }
}
