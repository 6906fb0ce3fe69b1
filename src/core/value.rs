//! Purpose: In-memory table model consumed by the writer and produced by the reader.
//! Exports: `Value`, `Row`, `Table`, `ColumnValues`, `ColumnBatch`.
//! Role: Caller-facing data shapes; no I/O or format knowledge lives here.
//! Invariants: `Value::Missing` and empty text are the same "missing" sentinel; no null survives decode.
//! Invariants: Column order is preserved end to end (first row's key order or declaration order).

use std::fmt;

use serde_json::{Map, Number};

use crate::core::error::{Error, ErrorKind};
use crate::core::format::ColumnType;

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Missing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// True for `Missing` and for empty text.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Missing => true,
            Value::Text(text) => text.is_empty(),
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            Value::Bool(value) => Some(i64::from(*value)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            Value::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Missing => serde_json::Value::Null,
            Value::Bool(value) => serde_json::Value::Bool(*value),
            Value::Int(value) => serde_json::Value::from(*value),
            Value::Float(value) => Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(text) => serde_json::Value::String(text.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => Ok(()),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Int(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{value}"),
            Value::Text(text) => f.write_str(text),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&serde_json::Value> for Value {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Missing,
            serde_json::Value::Bool(value) => Value::Bool(*value),
            serde_json::Value::Number(num) => match num.as_i64() {
                Some(int) => Value::Int(int),
                None => Value::Float(num.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(text) => Value::Text(text.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

/// Ordered name/value pairs for one row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Replaces an existing field in place, otherwise appends.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut map = Map::new();
        for (name, value) in &self.fields {
            map.insert(name.clone(), value.to_json());
        }
        serde_json::Value::Object(map)
    }

    pub fn from_json(object: &Map<String, serde_json::Value>) -> Self {
        let fields = object
            .iter()
            .map(|(key, value)| (key.clone(), Value::from(value)))
            .collect();
        Self { fields }
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, value) in iter {
            row.insert(name, value);
        }
        row
    }
}

/// Writer input in either orientation.
#[derive(Clone, Debug, PartialEq)]
pub enum Table {
    Rows(Vec<Row>),
    Columns(Vec<(String, Vec<Value>)>),
}

/// A column normalized for serialization, borrowing from the source table.
#[derive(Debug)]
pub(crate) struct ColumnRef<'a> {
    pub name: &'a str,
    pub values: Vec<&'a Value>,
}

impl Table {
    /// Builds a row-oriented table from a JSON array of objects.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, Error> {
        let items = value.as_array().ok_or_else(|| {
            Error::new(ErrorKind::Usage).with_message("expected a JSON array of objects")
        })?;
        let mut rows = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let object = item.as_object().ok_or_else(|| {
                Error::new(ErrorKind::Usage)
                    .with_message(format!("row {idx} is not a JSON object"))
            })?;
            rows.push(Row::from_json(object));
        }
        Ok(Table::Rows(rows))
    }

    pub fn row_count(&self) -> usize {
        match self {
            Table::Rows(rows) => rows.len(),
            Table::Columns(columns) => columns.first().map(|(_, values)| values.len()).unwrap_or(0),
        }
    }

    /// Normalizes either orientation into per-column sequences in declared order.
    pub(crate) fn columns(&self) -> Result<Vec<ColumnRef<'_>>, Error> {
        let columns = match self {
            Table::Rows(rows) => {
                let first = rows.first().ok_or_else(empty_input)?;
                let mut columns: Vec<ColumnRef<'_>> = first
                    .names()
                    .map(|name| ColumnRef {
                        name,
                        values: Vec::with_capacity(rows.len()),
                    })
                    .collect();
                for (idx, row) in rows.iter().enumerate() {
                    for column in columns.iter_mut() {
                        let value = row.get(column.name).ok_or_else(|| {
                            Error::new(ErrorKind::NonUniformLength)
                                .with_message(format!("row {idx} has no value for this column"))
                                .with_column(column.name)
                        })?;
                        column.values.push(value);
                    }
                }
                columns
            }
            Table::Columns(columns) => {
                let expected = columns.first().map(|(_, values)| values.len()).ok_or_else(empty_input)?;
                for (name, values) in columns {
                    if values.len() != expected {
                        return Err(Error::new(ErrorKind::NonUniformLength)
                            .with_message(format!(
                                "column has {} values, expected {expected}",
                                values.len()
                            ))
                            .with_column(name.as_str()));
                    }
                }
                for (idx, (name, _)) in columns.iter().enumerate() {
                    if columns[..idx].iter().any(|(other, _)| other == name) {
                        return Err(Error::new(ErrorKind::Usage)
                            .with_message("duplicate column name")
                            .with_column(name.as_str()));
                    }
                }
                columns
                    .iter()
                    .map(|(name, values)| ColumnRef {
                        name,
                        values: values.iter().collect(),
                    })
                    .collect()
            }
        };

        if columns.is_empty() || columns[0].values.is_empty() {
            return Err(empty_input());
        }
        Ok(columns)
    }
}

fn empty_input() -> Error {
    Error::new(ErrorKind::EmptyInput).with_message("cannot encode a table with zero rows")
}

/// Decoded values for one column.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnValues {
    Int32(Vec<i32>),
    Float64(Vec<f64>),
    String(Vec<String>),
}

impl ColumnValues {
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnValues::Int32(_) => ColumnType::Int32,
            ColumnValues::Float64(_) => ColumnType::Float64,
            ColumnValues::String(_) => ColumnType::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Int32(values) => values.len(),
            ColumnValues::Float64(values) => values.len(),
            ColumnValues::String(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, idx: usize) -> Option<Value> {
        match self {
            ColumnValues::Int32(values) => values.get(idx).map(|v| Value::Int(i64::from(*v))),
            ColumnValues::Float64(values) => values.get(idx).map(|v| Value::Float(*v)),
            ColumnValues::String(values) => values.get(idx).map(|v| Value::Text(v.clone())),
        }
    }
}

/// Ordered name to column mapping returned by selective reads.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColumnBatch {
    columns: Vec<(String, ColumnValues)>,
}

impl ColumnBatch {
    pub(crate) fn push(&mut self, name: String, values: ColumnValues) {
        self.columns.push((name, values));
    }

    pub fn get(&self, name: &str) -> Option<&ColumnValues> {
        self.columns
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, values)| values)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ColumnValues)> {
        self.columns.iter().map(|(key, values)| (key.as_str(), values))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Zips columns index by index into rows.
    pub fn into_rows(self, row_count: usize) -> Vec<Row> {
        (0..row_count)
            .map(|idx| {
                self.columns
                    .iter()
                    .map(|(name, values)| {
                        (name.clone(), values.get(idx).unwrap_or(Value::Missing))
                    })
                    .collect::<Row>()
            })
            .collect()
    }
}

impl IntoIterator for ColumnBatch {
    type Item = (String, ColumnValues);
    type IntoIter = std::vec::IntoIter<(String, ColumnValues)>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}
