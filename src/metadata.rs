//! Per-type mapping tables.
//!
//! Each [`Entity`] registers its table marker and `(field, column, kind)`
//! tuples once through [`Mapping`]; [`EntityMetadata`] is the read side used by
//! the query builder, the materializer and the repository.

use crate::entity::Entity;
use crate::error::{OrmError, Result};
use crate::query::is_valid_identifier;
use crate::row::Row;
use crate::value::Value;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;

const ID_COLUMN_SUFFIX: &str = "_id";

/// Closed set of supported field shapes. Selects the row getter used on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Int64,
    Int32,
    Float64,
    Float32,
    Int16,
    Bool,
    Timestamp,
    /// Anything else: the row's raw value is handed to the field unchanged.
    Raw,
}

impl FieldKind {
    /// Read `column` from `row` using this kind's getter.
    pub fn read(self, row: &Row, column: &str) -> Result<Value> {
        Ok(match self {
            FieldKind::Int64 => row.get_long(column)?.into(),
            FieldKind::Int32 => row.get_int(column)?.into(),
            FieldKind::Float64 => row.get_double(column)?.into(),
            FieldKind::Float32 => row.get_float(column)?.into(),
            FieldKind::Int16 => row.get_short(column)?.into(),
            FieldKind::Bool => row.get_boolean(column)?.into(),
            FieldKind::Timestamp => row.get_timestamp(column)?.into(),
            FieldKind::Raw => row.get_raw(column)?,
        })
    }
}

/// A Rust type that can back a column-mapped field.
///
/// `Option<T>` is the nullable form of `T`: it reads SQL NULL as `None` and
/// writes `None` as NULL. Non-optional fields reject NULL.
pub trait FieldType: Sized + Send + Sync + 'static {
    const KIND: FieldKind;

    /// Current value as a write parameter.
    fn to_value(&self) -> Value;

    /// Convert a value produced by [`FieldKind::read`]; `None` if it does not fit.
    fn from_value(value: Value) -> Option<Self>;
}

macro_rules! scalar_field {
    ($ty:ty, $kind:ident, $variant:ident) => {
        impl FieldType for $ty {
            const KIND: FieldKind = FieldKind::$kind;

            fn to_value(&self) -> Value {
                Value::$variant(*self)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }

        impl FieldType for Option<$ty> {
            const KIND: FieldKind = FieldKind::$kind;

            fn to_value(&self) -> Value {
                self.map_or(Value::Null, Value::$variant)
            }

            fn from_value(value: Value) -> Option<Self> {
                match value {
                    Value::Null => Some(None),
                    Value::$variant(v) => Some(Some(v)),
                    _ => None,
                }
            }
        }
    };
}

scalar_field!(i64, Int64, BigInt);
scalar_field!(i32, Int32, Int);
scalar_field!(f64, Float64, Double);
scalar_field!(f32, Float32, Float);
scalar_field!(i16, Int16, SmallInt);
scalar_field!(bool, Bool, Boolean);

impl FieldType for DateTime<Utc> {
    const KIND: FieldKind = FieldKind::Timestamp;

    fn to_value(&self) -> Value {
        Value::Timestamp(self.naive_utc())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Timestamp(ts) => Some(ts.and_utc()),
            _ => None,
        }
    }
}

impl FieldType for Option<DateTime<Utc>> {
    const KIND: FieldKind = FieldKind::Timestamp;

    fn to_value(&self) -> Value {
        self.map_or(Value::Null, |dt| Value::Timestamp(dt.naive_utc()))
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            Value::Timestamp(ts) => Some(Some(ts.and_utc())),
            _ => None,
        }
    }
}

impl FieldType for String {
    const KIND: FieldKind = FieldKind::Raw;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl FieldType for Option<String> {
    const KIND: FieldKind = FieldKind::Raw;

    fn to_value(&self) -> Value {
        self.clone().map_or(Value::Null, Value::Text)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            Value::Text(s) => Some(Some(s)),
            _ => None,
        }
    }
}

impl FieldType for Vec<u8> {
    const KIND: FieldKind = FieldKind::Raw;

    fn to_value(&self) -> Value {
        Value::Blob(self.clone())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }
}

impl FieldType for Value {
    const KIND: FieldKind = FieldKind::Raw;

    fn to_value(&self) -> Value {
        self.clone()
    }

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

type Getter<T> = Box<dyn Fn(&T) -> Value + Send + Sync>;
type Setter<T> = Box<dyn Fn(&mut T, Value) -> Result<()> + Send + Sync>;

/// One column-mapped field of `T`.
pub struct FieldMapping<T> {
    field: &'static str,
    column: String,
    kind: FieldKind,
    getter: Getter<T>,
    setter: Setter<T>,
}

impl<T> FieldMapping<T> {
    pub fn field_name(&self) -> &'static str {
        self.field
    }

    pub fn column_name(&self) -> &str {
        &self.column
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Current value of the field on `entity`.
    pub fn read(&self, entity: &T) -> Value {
        (self.getter)(entity)
    }

    /// Store `value` into the field, failing if it does not fit the field type.
    pub fn assign(&self, entity: &mut T, value: Value) -> Result<()> {
        (self.setter)(entity, value)
    }
}

impl<T> fmt::Debug for FieldMapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMapping")
            .field("field", &self.field)
            .field("column", &self.column)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Registration builder handed to [`Entity::map`].
pub struct Mapping<T> {
    table: Option<String>,
    fields: Vec<FieldMapping<T>>,
}

impl<T: 'static> Mapping<T> {
    fn new() -> Self {
        Self {
            table: None,
            fields: Vec::new(),
        }
    }

    /// Table marker.
    pub fn table(&mut self, name: &str) -> &mut Self {
        self.table = Some(name.to_string());
        self
    }

    /// Column marker for one field. Call order is declaration order.
    pub fn column<F: FieldType>(
        &mut self,
        field: &'static str,
        column: &str,
        get: fn(&T) -> &F,
        get_mut: fn(&mut T) -> &mut F,
    ) -> &mut Self {
        let column = column.to_string();
        let setter_column = column.clone();
        self.fields.push(FieldMapping {
            field,
            column,
            kind: F::KIND,
            getter: Box::new(move |entity| get(entity).to_value()),
            setter: Box::new(move |entity, value| {
                let found = value.type_name();
                let converted = F::from_value(value).ok_or_else(|| {
                    OrmError::conversion(
                        setter_column.as_str(),
                        format!(
                            "cannot assign {found} value to field `{field}` of type {}",
                            std::any::type_name::<F>()
                        ),
                    )
                })?;
                *get_mut(entity) = converted;
                Ok(())
            }),
        });
        self
    }
}

/// Metadata of one mapped type, read from its registration.
pub struct EntityMetadata<T> {
    table: Option<String>,
    fields: Vec<FieldMapping<T>>,
}

impl<T: Entity> EntityMetadata<T> {
    /// Run `T::map` and capture the result. Does not validate.
    pub fn read() -> Self {
        let mut mapping = Mapping::new();
        T::map(&mut mapping);
        Self {
            table: mapping.table,
            fields: mapping.fields,
        }
    }

    /// Read and validate in one step.
    pub fn load() -> Result<Self> {
        let metadata = Self::read();
        metadata.validate()?;
        Ok(metadata)
    }
}

impl<T> EntityMetadata<T> {
    /// Column-mapped fields in declaration order. Empty means misconfigured.
    pub fn get_column_mapped_fields(&self) -> &[FieldMapping<T>] {
        &self.fields
    }

    pub fn get_table_name(&self) -> Result<&str> {
        self.table
            .as_deref()
            .ok_or_else(|| OrmError::configuration("mapped type declares no table"))
    }

    /// Synthetic primary key column: `<table>_id`.
    pub fn get_id_column_name(&self) -> Result<String> {
        Ok(id_column_for(self.get_table_name()?))
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.column_name()).collect()
    }

    /// Check the registration is usable for query generation.
    pub fn validate(&self) -> Result<()> {
        let table = self.get_table_name()?;
        if !is_valid_identifier(table) {
            return Err(OrmError::configuration(format!(
                "invalid table name `{table}`"
            )));
        }
        if self.fields.is_empty() {
            return Err(OrmError::configuration(format!(
                "table `{table}` has no column-mapped fields"
            )));
        }
        let id_column = id_column_for(table);
        let mut seen = HashSet::new();
        for field in &self.fields {
            let column = field.column_name();
            if !is_valid_identifier(column) {
                return Err(OrmError::configuration(format!(
                    "invalid column name `{column}` on field `{}`",
                    field.field_name()
                )));
            }
            if column.eq_ignore_ascii_case(&id_column) {
                return Err(OrmError::configuration(format!(
                    "field `{}` is mapped to the identity column `{id_column}`",
                    field.field_name()
                )));
            }
            if !seen.insert(column.to_ascii_lowercase()) {
                return Err(OrmError::configuration(format!(
                    "column `{column}` is mapped more than once in `{table}`"
                )));
            }
        }
        Ok(())
    }
}

impl<T> fmt::Debug for EntityMetadata<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMetadata")
            .field("table", &self.table)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Identity column naming rule.
pub fn id_column_for(table: &str) -> String {
    format!("{table}{ID_COLUMN_SUFFIX}")
}

pub fn get_column_mapped_fields<T: Entity>() -> Vec<FieldMapping<T>> {
    EntityMetadata::<T>::read().fields
}

pub fn get_table_name<T: Entity>() -> Result<String> {
    EntityMetadata::<T>::read().get_table_name().map(str::to_string)
}

pub fn get_id_column_name<T: Entity>() -> Result<String> {
    EntityMetadata::<T>::read().get_id_column_name()
}
