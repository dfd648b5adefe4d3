//! Object-relational mapping core for the Runar ecosystem.
//!
//! # Intention
//!
//! - Map plain structs to rows of a single table through explicit, per-type
//!   registration (table marker plus column markers).
//! - Generate parameterized insert/update/delete/select SQL from that metadata.
//! - Convert typed fields to and from generic rows, including date/time and
//!   numeric widening.
//!
//! # Architectural Boundaries
//!
//! - Connections come from a [`ConnectionProvider`]; pooling, transactions,
//!   retries and timeouts belong to the provider, not here.
//! - Single-table CRUD by primary key only. No joins, no migrations.
//! - The SQLite provider in [`sqlite`] is the bundled backend.
//!
//! # Example
//!
//! ```ignore
//! rust_orm::entity! {
//!     #[table = "customer"]
//!     pub struct Customer {
//!         #[column = "full_name"]
//!         pub name: String,
//!         #[column = "email_addr"]
//!         pub email: String,
//!     }
//! }
//!
//! let provider = SqliteConnectionProvider::new(SqliteConfig::new("app.db"))?;
//! let customers = Repository::<Customer, _>::new(provider)?;
//! let id = customers.add(&Customer { name: "Ann".into(), ..Default::default() })?;
//! ```

pub mod access;
pub mod entity;
pub mod error;
pub mod materializer;
pub mod metadata;
pub mod query;
pub mod repository;
pub mod row;
pub mod sqlite;
pub mod value;

pub use access::{Connection, ConnectionProvider, PreparedStatement};
pub use entity::{same_entity, Entity, Identity};
pub use error::{OrmError, Result};
pub use materializer::{extract_write_parameters, populate_from_row};
pub use metadata::{EntityMetadata, FieldKind, FieldMapping, FieldType, Mapping};
pub use query::QueryBuilder;
pub use repository::Repository;
pub use row::{Row, RowSet};
pub use sqlite::{SqliteConfig, SqliteConnectionProvider};
pub use value::Value;

pub mod prelude {
    //! Re-exports of the most commonly used types.
    pub use crate::{
        Entity, Identity, Mapping, OrmError, Repository, SqliteConfig, SqliteConnectionProvider,
        Value,
    };
}
