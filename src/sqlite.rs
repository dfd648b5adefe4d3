use crate::access::{Connection, ConnectionProvider, PreparedStatement};
use crate::error::{OrmError, Result};
use crate::row::{Row, RowSet};
use crate::value::Value;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_foreign_keys() -> bool {
    true
}

/// SQLite connection provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqliteConfig {
    /// Path to the SQLite database file
    pub db_path: String,
    /// How long a connection waits on a locked database
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// Value of `PRAGMA foreign_keys` on every connection
    #[serde(default = "default_foreign_keys")]
    pub foreign_keys: bool,
    /// SQL batch run once when the provider is created
    #[serde(default)]
    pub init_sql: Option<String>,
}

impl SqliteConfig {
    /// Create a new SQLite config for the database at `db_path`
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout_ms: default_busy_timeout_ms(),
            foreign_keys: default_foreign_keys(),
            init_sql: None,
        }
    }

    pub fn with_busy_timeout_ms(mut self, millis: u64) -> Self {
        self.busy_timeout_ms = millis;
        self
    }

    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    pub fn with_init_sql(mut self, sql: impl Into<String>) -> Self {
        self.init_sql = Some(sql.into());
        self
    }
}

/// Opens a fresh rusqlite connection for every `acquire`.
#[derive(Debug, Clone)]
pub struct SqliteConnectionProvider {
    config: SqliteConfig,
}

impl SqliteConnectionProvider {
    /// Create the provider, running `init_sql` if configured.
    pub fn new(config: SqliteConfig) -> Result<Self> {
        let provider = Self { config };
        if let Some(sql) = &provider.config.init_sql {
            debug!(path = %provider.config.db_path, "running sqlite init batch");
            let conn = provider.open()?;
            conn.execute_batch(sql)?;
            conn.close().map_err(|(_, e)| OrmError::from(e))?;
        }
        Ok(provider)
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    fn open(&self) -> Result<rusqlite::Connection> {
        let conn = rusqlite::Connection::open(&self.config.db_path)?;
        conn.busy_timeout(Duration::from_millis(self.config.busy_timeout_ms))?;
        conn.pragma_update(None, "foreign_keys", self.config.foreign_keys)?;
        Ok(conn)
    }
}

impl ConnectionProvider for SqliteConnectionProvider {
    type Connection = SqliteConnection;

    fn acquire(&self) -> Result<SqliteConnection> {
        debug!(path = %self.config.db_path, "opening sqlite connection");
        Ok(SqliteConnection { inner: self.open()? })
    }
}

pub struct SqliteConnection {
    inner: rusqlite::Connection,
}

impl SqliteConnection {
    /// Wrap an already opened rusqlite connection.
    pub fn from_rusqlite(inner: rusqlite::Connection) -> Self {
        Self { inner }
    }
}

impl Connection for SqliteConnection {
    type Statement<'c> = SqliteStatement<'c>
    where
        Self: 'c;

    fn execute_query(&self, sql: &str) -> Result<RowSet> {
        let mut stmt = self.inner.prepare(sql)?;
        let names = column_names(&stmt);
        let rows = stmt.query([])?;
        collect_rows(rows, &names)
    }

    fn prepare(&self, sql: &str) -> Result<SqliteStatement<'_>> {
        Ok(SqliteStatement {
            stmt: self.inner.prepare(sql)?,
            conn: &self.inner,
        })
    }

    fn close(self) -> Result<()> {
        self.inner.close().map_err(|(_, e)| OrmError::from(e))
    }
}

pub struct SqliteStatement<'c> {
    stmt: rusqlite::Statement<'c>,
    conn: &'c rusqlite::Connection,
}

impl PreparedStatement for SqliteStatement<'_> {
    fn bind(&mut self, position: usize, value: &Value) -> Result<()> {
        self.stmt.raw_bind_parameter(position, value)?;
        Ok(())
    }

    fn execute(&mut self) -> Result<usize> {
        Ok(self.stmt.raw_execute()?)
    }

    fn query(&mut self) -> Result<RowSet> {
        let names = column_names(&self.stmt);
        collect_rows(self.stmt.raw_query(), &names)
    }

    fn generated_id(&self) -> Result<i64> {
        Ok(self.conn.last_insert_rowid())
    }

    fn close(self) -> Result<()> {
        Ok(self.stmt.finalize()?)
    }
}

fn column_names(stmt: &rusqlite::Statement<'_>) -> Vec<String> {
    stmt.column_names().into_iter().map(String::from).collect()
}

fn collect_rows(mut rows: rusqlite::Rows<'_>, names: &[String]) -> Result<RowSet> {
    let mut collected = Vec::new();
    while let Some(row) = rows.next()? {
        let mut out = Row::new();
        for (idx, name) in names.iter().enumerate() {
            out.push(name, value_from_sql(name, row.get_ref(idx)?)?);
        }
        collected.push(out);
    }
    Ok(RowSet::new(collected))
}

fn value_from_sql(column: &str, value: ValueRef<'_>) -> Result<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::BigInt(v),
        ValueRef::Real(v) => Value::Double(v),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => Value::Text(text.to_string()),
            Err(err) => {
                return Err(OrmError::conversion(column, format!("text is not valid UTF-8: {err}")))
            }
        },
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    })
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let value = match self {
            Value::Null => rusqlite::types::Value::Null,
            Value::BigInt(v) => rusqlite::types::Value::Integer(*v),
            Value::Int(v) => rusqlite::types::Value::Integer(i64::from(*v)),
            Value::SmallInt(v) => rusqlite::types::Value::Integer(i64::from(*v)),
            Value::Double(v) => rusqlite::types::Value::Real(*v),
            Value::Float(v) => rusqlite::types::Value::Real(f64::from(*v)),
            Value::Boolean(v) => rusqlite::types::Value::Integer(i64::from(*v)),
            Value::Text(s) => return Ok(ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes()))),
            Value::Blob(b) => return Ok(ToSqlOutput::Borrowed(ValueRef::Blob(b))),
            Value::Timestamp(ts) => return ts.to_sql(),
        };
        Ok(ToSqlOutput::Owned(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_and_builders() {
        let config = SqliteConfig::new("app.db")
            .with_busy_timeout_ms(250)
            .with_foreign_keys(false);
        assert_eq!(config.db_path, "app.db");
        assert_eq!(config.busy_timeout_ms, 250);
        assert!(!config.foreign_keys);
        assert_eq!(config.init_sql, None);
        assert_eq!(SqliteConfig::new("x").busy_timeout_ms, 5_000);
    }

    #[test]
    fn test_values_bind_as_sqlite_storage_classes() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        let mut stmt = conn.prepare("SELECT ? AS a, ? AS b, ? AS c, typeof(?) AS d").unwrap();
        stmt.raw_bind_parameter(1, Value::Int(4)).unwrap();
        stmt.raw_bind_parameter(2, Value::Boolean(true)).unwrap();
        stmt.raw_bind_parameter(3, Value::Float(0.5)).unwrap();
        stmt.raw_bind_parameter(4, Value::Null).unwrap();
        let names = column_names(&stmt);
        let rows = collect_rows(stmt.raw_query(), &names).unwrap();
        let row = rows.first().unwrap();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert_eq!(row.get_raw("a").unwrap(), Value::BigInt(4));
        assert_eq!(row.get_raw("b").unwrap(), Value::BigInt(1));
        assert_eq!(row.get_raw("c").unwrap(), Value::Double(0.5));
        assert_eq!(row.get_raw("d").unwrap(), Value::Text("null".into()));
    }

    #[test]
    fn test_invalid_utf8_text_is_conversion_error() {
        let conn = SqliteConnection::from_rusqlite(rusqlite::Connection::open_in_memory().unwrap());
        let err = conn
            .execute_query("SELECT CAST(X'61FF62' AS TEXT) AS body")
            .unwrap_err();
        assert!(matches!(err, OrmError::Conversion { ref column, .. } if column == "body"));

        let rows = conn.execute_query("SELECT CAST(X'616263' AS TEXT) AS body").unwrap();
        assert_eq!(
            rows.first().unwrap().get_raw("body").unwrap(),
            Value::Text("abc".into())
        );
        conn.close().unwrap();
    }
}
