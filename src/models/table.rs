//! Generic tabular data exchanged with storage, reshaping and chart code

use chrono::NaiveDate;
use std::fmt;

/// A single table value
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Number(f64),
    Text(String),
    Date(NaiveDate),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        match self {
            Cell::Null => true,
            Cell::Number(n) => n.is_nan(),
            _ => false,
        }
    }

    /// Numeric view of the cell; numeric text is parsed. Only finite
    /// numbers count, so `"NaN"` and `"inf"` read as missing.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().replace(',', "").parse().ok(),
            _ => None,
        };
        value.filter(|v: &f64| v.is_finite())
    }

    /// Date view of the cell; `YYYY-MM-DD` text (optionally followed by a time) is parsed
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            Cell::Text(s) => {
                let s = s.trim();
                let day = s.get(..10).unwrap_or(s);
                NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
            }
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::Text(value)
    }
}

impl From<NaiveDate> for Cell {
    fn from(value: NaiveDate) -> Self {
        Cell::Date(value)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Null)
    }
}

/// Rows of cells under named columns. Every row has one cell per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with the given headers
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Add a row, padding short rows with nulls and dropping extra cells
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Null);
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cells of one column, top to bottom
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Cell> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// The first `n` rows under the same headers
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Render the table as a fixed-width text preview
    pub fn render(&self) -> String {
        let mut col_widths: Vec<usize> = self.columns.iter().map(|h| h.chars().count()).collect();
        let rendered_rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect();

        // Update column widths
        for row in &rendered_rows {
            for (i, col) in row.iter().enumerate() {
                if i < col_widths.len() {
                    col_widths[i] = col_widths[i].max(col.chars().count());
                }
            }
        }

        let mut output = String::new();
        output.push_str(&Self::render_row(&self.columns, &col_widths));
        output.push('\n');
        output.push_str(&Self::render_separator(&col_widths));
        for row in &rendered_rows {
            output.push('\n');
            output.push_str(&Self::render_row(row, &col_widths));
        }
        output
    }

    /// Render a single row with proper spacing
    fn render_row(row: &[String], col_widths: &[usize]) -> String {
        let mut line = String::new();
        for (i, col) in row.iter().enumerate() {
            if let Some(&width) = col_widths.get(i) {
                line.push_str(&format!("{:<width$}", col, width = width));
                if i < row.len() - 1 {
                    line.push_str(" | ");
                }
            }
        }
        line.trim_end().to_string()
    }

    /// Render a separator line
    fn render_separator(col_widths: &[usize]) -> String {
        col_widths
            .iter()
            .map(|&width| "-".repeat(width))
            .collect::<Vec<_>>()
            .join("-+-")
    }
}
