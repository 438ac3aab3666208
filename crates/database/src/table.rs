use crate::error::DbError;
use crate::value::Value;
use std::fmt;
use std::ops::Index;

/// An in-memory tabular query result: ordered rows aligned with ordered
/// column names.
///
/// Construction validates the shape once, so every later access can assume
/// each row is exactly as wide as the header.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Builds a table from row tuples and column names, rejecting any row
    /// whose width differs from the column count.
    pub fn new(rows: Vec<Vec<Value>>, columns: Vec<String>) -> Result<Self, DbError> {
        for (row_index, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(DbError::ShapeMismatch {
                    row_index,
                    row_width: row.len(),
                    column_count: columns.len(),
                });
            }
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Value> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Position of the named column, if present.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell addressed by row number and column name.
    pub fn get_named(&self, row: usize, column: &str) -> Option<&Value> {
        self.get(row, self.column_index(column)?)
    }
}

impl Index<(usize, usize)> for Table {
    type Output = Value;

    fn index(&self, (row, col): (usize, usize)) -> &Value {
        &self.rows[row][col]
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut rendered = comfy_table::Table::new();
        rendered.set_header(self.columns.clone());
        for row in &self.rows {
            rendered.add_row(row.iter().map(Value::to_string).collect::<Vec<_>>());
        }
        write!(f, "{rendered}")
    }
}
