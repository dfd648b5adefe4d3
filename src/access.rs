//! Capabilities the repository consumes from the surrounding infrastructure.
//!
//! Implementations own pooling, timeouts and transactions; the repository
//! only acquires, uses and closes.

use crate::error::Result;
use crate::row::RowSet;
use crate::value::Value;

/// Hands out connections. One connection per repository call.
pub trait ConnectionProvider: Send + Sync {
    type Connection: Connection;

    fn acquire(&self) -> Result<Self::Connection>;
}

pub trait Connection: Sized {
    type Statement<'c>: PreparedStatement
    where
        Self: 'c;

    /// Run a parameterless query and collect its rows.
    fn execute_query(&self, sql: &str) -> Result<RowSet>;

    fn prepare(&self, sql: &str) -> Result<Self::Statement<'_>>;

    fn close(self) -> Result<()>;
}

pub trait PreparedStatement: Sized {
    /// Bind `value` to the 1-based placeholder `position`.
    fn bind(&mut self, position: usize, value: &Value) -> Result<()>;

    /// Execute a write; returns the number of affected rows.
    fn execute(&mut self) -> Result<usize>;

    /// Execute a read with the bound parameters.
    fn query(&mut self) -> Result<RowSet>;

    /// Key generated by the last insert on this statement's connection.
    fn generated_id(&self) -> Result<i64>;

    fn close(self) -> Result<()>;
}
