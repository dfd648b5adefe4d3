use crate::error::{OrmError, Result};
use crate::value::Value;
use chrono::{DateTime, NaiveDateTime};

const TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// One result record, keyed by column name.
///
/// Lookups try an exact match first and fall back to an ASCII
/// case-insensitive match, since SQL identifiers are case-insensitive.
/// Every typed getter returns `Ok(None)` for SQL NULL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column value, builder style.
    pub fn with_value(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: &str, value: impl Into<Value>) {
        self.columns.push(column.to_string());
        self.values.push(value.into());
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(column)))
    }

    fn value(&self, column: &str) -> Result<&Value> {
        self.position(column)
            .map(|idx| &self.values[idx])
            .ok_or_else(|| OrmError::conversion(column, "column not present in row"))
    }

    /// The stored value, unconverted.
    pub fn get_raw(&self, column: &str) -> Result<Value> {
        self.value(column).cloned()
    }

    pub fn get_long(&self, column: &str) -> Result<Option<i64>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            v => v
                .as_i64()
                .map(Some)
                .ok_or_else(|| mismatch(column, v, "bigint")),
        }
    }

    pub fn get_int(&self, column: &str) -> Result<Option<i32>> {
        self.narrowed(column, "int")
    }

    pub fn get_short(&self, column: &str) -> Result<Option<i16>> {
        self.narrowed(column, "smallint")
    }

    fn narrowed<N: TryFrom<i64>>(&self, column: &str, target: &str) -> Result<Option<N>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            v => {
                let wide = v.as_i64().ok_or_else(|| mismatch(column, v, target))?;
                N::try_from(wide).map(Some).map_err(|_| {
                    OrmError::conversion(column, format!("{wide} is out of range for {target}"))
                })
            }
        }
    }

    pub fn get_double(&self, column: &str) -> Result<Option<f64>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Double(v) => Ok(Some(*v)),
            Value::Float(v) => Ok(Some(f64::from(*v))),
            v => v
                .as_i64()
                .map(|i| Some(i as f64))
                .ok_or_else(|| mismatch(column, v, "double")),
        }
    }

    pub fn get_float(&self, column: &str) -> Result<Option<f32>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Float(v) => Ok(Some(*v)),
            Value::Double(v) => {
                let narrow = *v as f32;
                if v.is_finite() && !narrow.is_finite() {
                    return Err(OrmError::conversion(
                        column,
                        format!("{v} is out of range for float"),
                    ));
                }
                Ok(Some(narrow))
            }
            v => v
                .as_i64()
                .map(|i| Some(i as f32))
                .ok_or_else(|| mismatch(column, v, "float")),
        }
    }

    pub fn get_boolean(&self, column: &str) -> Result<Option<bool>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Boolean(v) => Ok(Some(*v)),
            v => v
                .as_i64()
                .map(|i| Some(i != 0))
                .ok_or_else(|| mismatch(column, v, "boolean")),
        }
    }

    pub fn get_timestamp(&self, column: &str) -> Result<Option<NaiveDateTime>> {
        match self.value(column)? {
            Value::Null => Ok(None),
            Value::Timestamp(ts) => Ok(Some(*ts)),
            Value::Text(text) => parse_timestamp(text)
                .map(Some)
                .ok_or_else(|| OrmError::conversion(column, format!("`{text}` is not a timestamp"))),
            v => match v.as_i64() {
                Some(secs) => DateTime::from_timestamp(secs, 0)
                    .map(|dt| Some(dt.naive_utc()))
                    .ok_or_else(|| {
                        OrmError::conversion(column, format!("{secs} is out of range for timestamp"))
                    }),
                None => Err(mismatch(column, v, "timestamp")),
            },
        }
    }
}

fn mismatch(column: &str, value: &Value, target: &str) -> OrmError {
    OrmError::conversion(
        column,
        format!("cannot read {} value as {target}", value.type_name()),
    )
}

fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

/// Rows returned by one query execution, in the order the engine produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    rows: Vec<Row>,
}

impl RowSet {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Row> {
        self.rows.iter()
    }
}

impl From<Vec<Row>> for RowSet {
    fn from(rows: Vec<Row>) -> Self {
        Self::new(rows)
    }
}

impl IntoIterator for RowSet {
    type Item = Row;
    type IntoIter = std::vec::IntoIter<Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

impl<'a> IntoIterator for &'a RowSet {
    type Item = &'a Row;
    type IntoIter = std::slice::Iter<'a, Row>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
