//! Rectangular record tables for herd data.

use crate::error::{H2Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

/// Tokens read as missing when loading delimited text.
const MISSING_TOKENS: &[&str] = &["", "NA", "na", "NaN", "nan"];

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Free text.
    Text(String),
    /// Numeric value.
    Number(f64),
    /// Missing value.
    Missing,
}

impl Value {
    /// Interpret a raw field the way the loader does.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if MISSING_TOKENS.contains(&trimmed) {
            Value::Missing
        } else {
            Value::Text(trimmed.to_string())
        }
    }

    /// Check if this is a missing value.
    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Missing)
    }

    /// Try to get as text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as a number (no coercion).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Coerce to a finite number. Text is parsed; anything else is `None`.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            Value::Number(v) if v.is_finite() => Some(*v),
            Value::Number(_) => None,
            Value::Text(s) => parse_number(s),
            Value::Missing => None,
        }
    }

    /// Render as trimmed text. Missing becomes the empty string.
    pub fn to_text(&self) -> String {
        match self {
            Value::Text(s) => s.trim().to_string(),
            Value::Number(v) => format_number(*v),
            Value::Missing => String::new(),
        }
    }

    /// Whether the value carries a non-blank identifier.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Text(s) => s.trim().is_empty(),
            Value::Number(v) => !v.is_finite(),
            Value::Missing => true,
        }
    }
}

/// Parse a numeric field, accepting a decimal comma. Non-finite results are rejected.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let parsed = match s.parse::<f64>() {
        Ok(v) => Some(v),
        Err(_) if s.matches(',').count() == 1 && !s.contains('.') => {
            s.replace(',', ".").parse::<f64>().ok()
        }
        Err(_) => None,
    };
    parsed.filter(|v| v.is_finite())
}

fn format_number(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

/// Inferred kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Every present value is a number.
    Numeric,
    /// At least one present value is text.
    Text,
    /// No present values.
    Empty,
}

/// Column-oriented table of records (one row per animal-lactation).
#[derive(Debug, Clone, PartialEq)]
pub struct RecordTable {
    column_names: Vec<String>,
    columns: Vec<Vec<Value>>,
    n_rows: usize,
}

impl RecordTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            column_names: Vec::new(),
            columns: Vec::new(),
            n_rows: 0,
        }
    }

    /// Build a table from named columns. All columns must have the same length
    /// and names must be unique.
    pub fn from_columns(columns: Vec<(String, Vec<Value>)>) -> Result<Self> {
        let mut table = Self::new();
        if let Some((_, first)) = columns.first() {
            table.n_rows = first.len();
        }
        for (name, values) in columns {
            if table.has_column(&name) {
                return Err(H2Error::InvalidParameter(format!(
                    "Duplicate column '{}'",
                    name
                )));
            }
            table.set_column(&name, values)?;
        }
        Ok(table)
    }

    /// Load a delimited file. `.tsv`/`.tab` use tabs; otherwise the delimiter
    /// is `;` when the header has semicolons and no commas, else `,`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut content = String::new();
        BufReader::new(File::open(path)?).read_to_string(&mut content)?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let delimiter = match ext.as_deref() {
            Some("tsv") | Some("tab") => b'\t',
            _ => sniff_delimiter(&content),
        };
        Self::from_reader(content.as_bytes(), delimiter)
    }

    /// Load delimited text from any reader.
    ///
    /// Headers are trimmed, spreadsheet index columns (`Unnamed: …`) are
    /// dropped and duplicated headers keep their first occurrence. A column
    /// becomes numeric when every non-missing field parses as a number.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();
        if headers.is_empty() {
            return Err(H2Error::EmptyData("Missing header row".to_string()));
        }

        let mut seen = HashSet::new();
        let kept: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.starts_with("Unnamed:"))
            .filter(|(_, h)| seen.insert(h.to_string()))
            .map(|(i, _)| i)
            .collect();

        let mut raw: Vec<Vec<Value>> = vec![Vec::new(); kept.len()];
        for record in csv_reader.records() {
            let record = record?;
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            for (slot, &col_idx) in kept.iter().enumerate() {
                let value = record.get(col_idx).map(Value::from_raw).unwrap_or(Value::Missing);
                raw[slot].push(value);
            }
        }

        let columns = kept
            .iter()
            .zip(raw)
            .map(|(&idx, values)| (headers[idx].clone(), infer_numeric(values)))
            .collect();
        Self::from_columns(columns)
    }

    /// Write the table as comma-separated text.
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        self.to_writer(file)
    }

    /// Write the table as comma-separated text to any writer.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        csv_writer.write_record(&self.column_names)?;
        for row in 0..self.n_rows {
            let record: Vec<String> = self.columns.iter().map(|c| c[row].to_text()).collect();
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// Number of columns.
    pub fn n_columns(&self) -> usize {
        self.column_names.len()
    }

    /// Whether the table holds no rows.
    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    /// Column names in order.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Check if a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names.iter().position(|c| c == name)
    }

    /// All values of a column.
    pub fn column(&self, name: &str) -> Result<&[Value]> {
        self.column_index(name)
            .map(|i| self.columns[i].as_slice())
            .ok_or_else(|| H2Error::MissingColumn(name.to_string()))
    }

    /// A single cell.
    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        self.column_index(name).and_then(|i| self.columns[i].get(row))
    }

    /// Column coerced to finite numbers.
    pub fn numeric_column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        Ok(self.column(name)?.iter().map(Value::to_number).collect())
    }

    /// Column rendered as trimmed text; missing cells become `""`.
    pub fn text_column(&self, name: &str) -> Result<Vec<String>> {
        Ok(self.column(name)?.iter().map(Value::to_text).collect())
    }

    /// Inferred kind of a column.
    pub fn column_kind(&self, name: &str) -> Option<ColumnKind> {
        let values = self.column(name).ok()?;
        let mut any_present = false;
        for v in values {
            match v {
                Value::Text(_) => return Some(ColumnKind::Text),
                Value::Number(_) => any_present = true,
                Value::Missing => {}
            }
        }
        Some(if any_present {
            ColumnKind::Numeric
        } else {
            ColumnKind::Empty
        })
    }

    /// Insert a column, or replace it if it already exists.
    pub fn set_column(&mut self, name: &str, values: Vec<Value>) -> Result<()> {
        if self.column_names.is_empty() && self.columns.is_empty() {
            self.n_rows = values.len();
        }
        if values.len() != self.n_rows {
            return Err(H2Error::InvalidParameter(format!(
                "Column '{}' has {} values, table has {} rows",
                name,
                values.len(),
                self.n_rows
            )));
        }
        match self.column_index(name) {
            Some(i) => self.columns[i] = values,
            None => {
                self.column_names.push(name.to_string());
                self.columns.push(values);
            }
        }
        Ok(())
    }

    /// Rename a column. Fails if the target name is taken by another column.
    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return Ok(());
        }
        if self.has_column(to) {
            return Err(H2Error::InvalidParameter(format!(
                "Cannot rename '{}' to '{}': column exists",
                from, to
            )));
        }
        let idx = self
            .column_index(from)
            .ok_or_else(|| H2Error::MissingColumn(from.to_string()))?;
        self.column_names[idx] = to.to_string();
        Ok(())
    }

    /// Keep only the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|c| rows.iter().filter_map(|&r| c.get(r).cloned()).collect())
            .collect();
        Self {
            column_names: self.column_names.clone(),
            columns,
            n_rows: rows.iter().filter(|&&r| r < self.n_rows).count(),
        }
    }

    /// Keep only the named columns (unknown names are ignored).
    pub fn select_columns(&self, names: &[&str]) -> Self {
        let mut out = Self::new();
        out.n_rows = self.n_rows;
        for name in names {
            if let Some(i) = self.column_index(name) {
                out.column_names.push(self.column_names[i].clone());
                out.columns.push(self.columns[i].clone());
            }
        }
        out
    }

    /// Cells of one row, in column order.
    pub fn row(&self, row: usize) -> Vec<&Value> {
        self.columns.iter().filter_map(|c| c.get(row)).collect()
    }
}

impl Default for RecordTable {
    fn default() -> Self {
        Self::new()
    }
}

fn sniff_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or("");
    if header.contains(';') && !header.contains(',') {
        b';'
    } else if header.contains('\t') && !header.contains(',') {
        b'\t'
    } else {
        b','
    }
}

fn infer_numeric(values: Vec<Value>) -> Vec<Value> {
    let all_numeric = values.iter().all(|v| match v {
        Value::Text(s) => parse_number(s).is_some(),
        _ => true,
    });
    let any_present = values.iter().any(|v| !v.is_missing());
    if !(all_numeric && any_present) {
        return values;
    }
    values
        .into_iter()
        .map(|v| match v.to_number() {
            Some(x) => Value::Number(x),
            None => Value::Missing,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn csv_file() -> NamedTempFile {
        tempfile::Builder::new().suffix(".csv").tempfile().unwrap()
    }

    fn create_test_csv() -> NamedTempFile {
        let mut file = csv_file();
        writeln!(file, "ID,Kg Lait,% MG,Sex,Unnamed: 0").unwrap();
        writeln!(file, "A1,6500,3.8,Male,0").unwrap();
        writeln!(file, "A2,7200,NA,Female,1").unwrap();
        writeln!(file, "A3,,4.1,,2").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_csv() {
        let file = create_test_csv();
        let table = RecordTable::from_path(file.path()).unwrap();

        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.column_names(), &["ID", "Kg Lait", "% MG", "Sex"]);
        assert_eq!(table.column_kind("Kg Lait"), Some(ColumnKind::Numeric));
        assert_eq!(table.column_kind("Sex"), Some(ColumnKind::Text));
        assert!(table.get(1, "% MG").unwrap().is_missing());
        assert_eq!(table.get(0, "Kg Lait").unwrap().as_number(), Some(6500.0));
    }

    #[test]
    fn test_semicolon_and_decimal_comma() {
        let mut file = csv_file();
        writeln!(file, "ID;Taux_mg").unwrap();
        writeln!(file, "A1;3,5").unwrap();
        writeln!(file, "A2;4,25").unwrap();
        file.flush().unwrap();

        let table = RecordTable::from_path(file.path()).unwrap();
        assert_eq!(table.numeric_column("Taux_mg").unwrap(), vec![Some(3.5), Some(4.25)]);
    }

    #[test]
    fn test_value_coercion() {
        assert_eq!(Value::Text(" 12.5 ".into()).to_number(), Some(12.5));
        assert_eq!(Value::Text("abc".into()).to_number(), None);
        assert_eq!(Value::Number(f64::INFINITY).to_number(), None);
        assert_eq!(Value::Number(12345.0).to_text(), "12345");
        assert_eq!(Value::Missing.to_text(), "");
        assert!(Value::Text("  ".into()).is_blank());
    }

    #[test]
    fn test_set_column_length_mismatch() {
        let mut table = RecordTable::from_columns(vec![(
            "id".to_string(),
            vec![Value::Text("a".into()), Value::Text("b".into())],
        )])
        .unwrap();
        assert!(table.set_column("x", vec![Value::Missing]).is_err());
        assert!(table.set_column("x", vec![Value::Missing, Value::Number(1.0)]).is_ok());
        assert_eq!(table.n_columns(), 2);
    }

    #[test]
    fn test_rename_and_select() {
        let mut table = RecordTable::from_columns(vec![
            ("a".to_string(), vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]),
            ("b".to_string(), vec![Value::Missing, Value::Missing, Value::Missing]),
        ])
        .unwrap();
        table.rename_column("a", "c").unwrap();
        assert!(table.rename_column("c", "b").is_err());

        let subset = table.select_rows(&[2, 0]);
        assert_eq!(subset.n_rows(), 2);
        assert_eq!(subset.numeric_column("c").unwrap(), vec![Some(3.0), Some(1.0)]);
        assert_eq!(subset.column_kind("b"), Some(ColumnKind::Empty));
    }

    #[test]
    fn test_csv_round_trip_file() {
        let file = create_test_csv();
        let table = RecordTable::from_path(file.path()).unwrap();

        let out = csv_file();
        table.to_csv(out.path()).unwrap();
        let reloaded = RecordTable::from_path(out.path()).unwrap();
        assert_eq!(reloaded, table);
    }
}
