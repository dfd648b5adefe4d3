use crate::entity::Entity;
use crate::error::{OrmError, Result};
use crate::metadata::EntityMetadata;
use crate::row::Row;
use crate::value::Value;

/// Build a `T` from `row`: default-construct, then fill every column-mapped
/// field through its kind's getter. The identity is left to the caller.
pub fn populate_from_row<T: Entity>(row: &Row, metadata: &EntityMetadata<T>) -> Result<T> {
    let fields = non_empty_fields(metadata)?;
    let mut entity = T::default();
    for field in fields {
        let value = field.kind().read(row, field.column_name())?;
        field.assign(&mut entity, value)?;
    }
    Ok(entity)
}

/// Write parameters of `entity`, in the column order used by the insert and
/// update statements. Date/time fields come out as `Value::Timestamp`.
pub fn extract_write_parameters<T: Entity>(
    entity: &T,
    metadata: &EntityMetadata<T>,
) -> Result<Vec<Value>> {
    let fields = non_empty_fields(metadata)?;
    Ok(fields.iter().map(|field| field.read(entity)).collect())
}

fn non_empty_fields<T>(
    metadata: &EntityMetadata<T>,
) -> Result<&[crate::metadata::FieldMapping<T>]> {
    let fields = metadata.get_column_mapped_fields();
    if fields.is_empty() {
        let table = metadata.get_table_name().unwrap_or("<unnamed>");
        return Err(OrmError::configuration(format!(
            "`{table}` has no column-mapped fields"
        )));
    }
    Ok(fields)
}
