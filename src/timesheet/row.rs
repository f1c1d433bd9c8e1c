//! Timesheet rows as read from the worksheet.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use tracing::debug;

/// A single cell value.
///
/// Numeric-looking text is promoted to a number, the way a records reader
/// over a spreadsheet yields it.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Blank,
    Text(String),
    Integer(i64),
    Float(f64),
}

impl CellValue {
    /// Converts a raw sheet value into a cell.
    #[must_use]
    pub fn from_sheet(value: &Value) -> Self {
        match value {
            Value::Null => Self::Blank,
            Value::String(text) => Self::from_text(text),
            Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float))
                .unwrap_or_else(|| Self::Text(n.to_string())),
            Value::Bool(b) => Self::Text(if *b { "TRUE" } else { "FALSE" }.to_owned()),
            other => Self::Text(other.to_string()),
        }
    }

    /// Numericises formatted text: integers, then finite floats, else text.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        if text.is_empty() {
            return Self::Blank;
        }
        let trimmed = text.trim();
        if let Ok(n) = trimmed.parse::<i64>() {
            return Self::Integer(n);
        }
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() && trimmed.bytes().any(|b| b.is_ascii_digit()) => {
                Self::Float(f)
            }
            _ => Self::Text(text.to_owned()),
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank => Ok(()),
            Self::Text(text) => f.write_str(text),
            Self::Integer(n) => write!(f, "{n}"),
            // Whole floats keep one decimal place ("2.0"), like the sheet shows them.
            Self::Float(x) if x.fract() == 0.0 && x.abs() < 1e16 => write!(f, "{x:.1}"),
            Self::Float(x) => write!(f, "{x}"),
        }
    }
}

/// One worksheet record: header → cell value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskRow {
    cells: BTreeMap<String, CellValue>,
}

impl TaskRow {
    /// Builds a row from `(header, value)` pairs. The first occurrence of a
    /// duplicated header wins.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, CellValue)>,
        K: Into<String>,
    {
        let mut cells = BTreeMap::new();
        for (header, value) in pairs {
            cells.entry(header.into()).or_insert(value);
        }
        Self { cells }
    }

    /// Returns the cell under `header`.
    #[must_use]
    pub fn get(&self, header: &str) -> Option<&CellValue> {
        self.cells.get(header)
    }

    /// Renders the cell under `header`; missing headers render empty.
    #[must_use]
    pub fn text(&self, header: &str) -> String {
        self.get(header).map(ToString::to_string).unwrap_or_default()
    }

    /// Number of columns in the row.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Whether the row has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Turns a worksheet value grid into records.
///
/// The first row holds the headers. Each later row is padded with blanks up
/// to the header width; cells beyond the header are dropped.
#[must_use]
pub fn records_from_values(values: &[Vec<Value>]) -> Vec<TaskRow> {
    let Some((header_row, data)) = values.split_first() else {
        return Vec::new();
    };

    let headers: Vec<String> = header_row
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => CellValue::from_sheet(other).to_string(),
        })
        .collect();

    debug!("Worksheet headers: {:?}", headers);

    data.iter()
        .map(|row| {
            TaskRow::from_pairs(headers.iter().enumerate().map(|(i, header)| {
                let value = row.get(i).map_or(CellValue::Blank, CellValue::from_sheet);
                (header.clone(), value)
            }))
        })
        .collect()
}
