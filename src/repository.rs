use crate::access::{Connection, ConnectionProvider, PreparedStatement};
use crate::entity::Entity;
use crate::error::{OrmError, Result};
use crate::materializer::{extract_write_parameters, populate_from_row};
use crate::metadata::EntityMetadata;
use crate::query::QueryBuilder;
use crate::value::Value;
use std::fmt;
use tracing::{debug, warn};

/// Generic CRUD repository for one mapped type.
///
/// Metadata is read and validated once at construction. Every call acquires
/// its own connection from the provider and closes it before returning, on
/// success and on failure. Calls may run concurrently from several threads;
/// there is no locking and no transaction spanning calls.
///
/// # Example
///
/// ```ignore
/// let provider = SqliteConnectionProvider::new(SqliteConfig::new("app.db"))?;
/// let customers = Repository::<Customer, _>::new(provider)?;
/// let id = customers.add(&customer)?;
/// let stored = customers.fetch_by_id(id)?;
/// ```
pub struct Repository<T, P> {
    provider: P,
    metadata: EntityMetadata<T>,
}

impl<T: Entity, P: ConnectionProvider> Repository<T, P> {
    /// Bind the repository to its connection provider.
    ///
    /// Fails with [`OrmError::Configuration`] if `T`'s mapping is unusable.
    pub fn new(provider: P) -> Result<Self> {
        Ok(Self {
            provider,
            metadata: EntityMetadata::load()?,
        })
    }

    pub fn metadata(&self) -> &EntityMetadata<T> {
        &self.metadata
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn queries(&self) -> QueryBuilder<'_, T> {
        QueryBuilder::new(&self.metadata)
    }

    fn table(&self) -> &str {
        self.metadata.get_table_name().unwrap_or_default()
    }

    /// All rows of the table, in the order the database returns them.
    pub fn list(&self) -> Result<Vec<T>> {
        let sql = self.queries().select_all()?;
        let id_column = self.metadata.get_id_column_name()?;
        let rows = self.with_connection(|conn| conn.execute_query(&sql))?;
        debug!(table = self.table(), rows = rows.len(), "listed entities");

        rows.iter()
            .map(|row| {
                let mut entity: T = populate_from_row(row, &self.metadata)?;
                let id = row.get_long(&id_column)?.ok_or_else(|| {
                    OrmError::conversion(id_column.as_str(), "identity column is NULL")
                })?;
                entity.identity_mut().assign(id);
                Ok(entity)
            })
            .collect()
    }

    /// Insert `entity` and return the generated identity.
    ///
    /// The id is not written back onto `entity`; assign it through
    /// [`Entity::identity_mut`] if the caller needs it there.
    pub fn add(&self, entity: &T) -> Result<i64> {
        let sql = self.queries().insert()?;
        let params = extract_write_parameters(entity, &self.metadata)?;
        let id = self.with_connection(|conn| {
            run_statement(conn, &sql, &params, |stmt| {
                stmt.execute()?;
                stmt.generated_id()
            })
        })?;
        debug!(table = self.table(), id, "added entity");
        Ok(id)
    }

    /// Overwrite the stored row of `entity` with its current field values.
    pub fn update(&self, entity: &T) -> Result<()> {
        let id = entity.identity().get().ok_or_else(|| {
            OrmError::configuration(format!(
                "cannot update `{}` entity without an identity",
                self.table()
            ))
        })?;
        let sql = self.queries().update()?;
        let mut params = extract_write_parameters(entity, &self.metadata)?;
        params.push(Value::BigInt(id));
        let affected = self.with_connection(|conn| {
            run_statement(conn, &sql, &params, |stmt| stmt.execute())
        })?;
        debug!(table = self.table(), id, affected, "updated entity");
        Ok(())
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        let sql = self.queries().delete()?;
        let affected = self.with_connection(|conn| {
            run_statement(conn, &sql, &[Value::BigInt(id)], |stmt| stmt.execute())
        })?;
        debug!(table = self.table(), id, affected, "deleted entity");
        Ok(())
    }

    /// The entity stored under `id`, if any.
    ///
    /// The returned identity is always `id`, whatever the row's own id column
    /// holds. If several rows match, the first one wins.
    pub fn fetch_by_id(&self, id: i64) -> Result<Option<T>> {
        let sql = self.queries().select_by_id()?;
        let rows = self.with_connection(|conn| {
            run_statement(conn, &sql, &[Value::BigInt(id)], |stmt| stmt.query())
        })?;
        if rows.len() > 1 {
            warn!(table = self.table(), id, rows = rows.len(), "identity matched several rows");
        }
        let Some(row) = rows.first() else {
            debug!(table = self.table(), id, "entity not found");
            return Ok(None);
        };
        let mut entity: T = populate_from_row(row, &self.metadata)?;
        entity.identity_mut().assign(id);
        Ok(Some(entity))
    }

    fn with_connection<R>(&self, work: impl FnOnce(&P::Connection) -> Result<R>) -> Result<R> {
        let conn = self.provider.acquire()?;
        let outcome = work(&conn);
        release(outcome, conn.close(), "connection")
    }
}

impl<T, P: fmt::Debug> fmt::Debug for Repository<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("provider", &self.provider)
            .field("metadata", &self.metadata)
            .finish()
    }
}

/// Prepare `sql`, bind `params` in order, run `work`, then close the statement.
fn run_statement<'c, C, R, F>(conn: &'c C, sql: &str, params: &[Value], work: F) -> Result<R>
where
    C: Connection,
    F: FnOnce(&mut C::Statement<'c>) -> Result<R>,
{
    let mut stmt = conn.prepare(sql)?;
    let outcome = bind_all(&mut stmt, params).and_then(|()| work(&mut stmt));
    release(outcome, stmt.close(), "statement")
}

fn bind_all<S: PreparedStatement>(stmt: &mut S, params: &[Value]) -> Result<()> {
    for (idx, value) in params.iter().enumerate() {
        stmt.bind(idx + 1, value)?;
    }
    Ok(())
}

/// Combine the outcome of the work with the outcome of releasing its resource.
/// The first error wins; a release error behind it is logged.
fn release<R>(outcome: Result<R>, released: Result<()>, resource: &'static str) -> Result<R> {
    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) | (Err(err), Ok(())) => Err(err),
        (Err(primary), Err(secondary)) => {
            warn!(resource, error = %secondary, "release failed after an earlier error");
            Err(primary)
        }
    }
}
