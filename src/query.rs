//! SQL text for single-table CRUD by primary key.
//!
//! Every value travels as a positional `?` placeholder; only table and column
//! identifiers from metadata are spliced into the text.

use crate::error::{OrmError, Result};
use crate::metadata::EntityMetadata;
use tracing::debug;

/// Build `INSERT INTO t(c1,c2) VALUES(?,?)`.
pub fn build_insert(table: &str, columns: &[&str]) -> Result<String> {
    require_columns(table, columns, "insert")?;
    let placeholders = vec!["?"; columns.len()].join(",");
    Ok(format!(
        "INSERT INTO {table}({}) VALUES({placeholders})",
        columns.join(",")
    ))
}

/// Build `UPDATE t SET c1=?,c2=? WHERE t_id = ?`. The identity placeholder is last.
pub fn build_update(table: &str, id_column: &str, columns: &[&str]) -> Result<String> {
    require_columns(table, columns, "update")?;
    let assignments: Vec<String> = columns.iter().map(|c| format!("{c}=?")).collect();
    Ok(format!(
        "UPDATE {table} SET {} WHERE {id_column} = ?",
        assignments.join(",")
    ))
}

pub fn build_delete(table: &str, id_column: &str) -> String {
    format!("DELETE FROM {table} WHERE {id_column} = ?")
}

pub fn build_select_all(table: &str) -> String {
    format!("SELECT * FROM {table}")
}

/// Build `SELECT t_id, c1,c2 FROM t WHERE t_id = ?`.
pub fn build_select_by_id(table: &str, id_column: &str, columns: &[&str]) -> Result<String> {
    require_columns(table, columns, "select")?;
    Ok(format!(
        "SELECT {id_column}, {} FROM {table} WHERE {id_column} = ?",
        columns.join(",")
    ))
}

fn require_columns(table: &str, columns: &[&str], statement: &str) -> Result<()> {
    if columns.is_empty() {
        return Err(OrmError::configuration(format!(
            "cannot build {statement} for `{table}` without column-mapped fields"
        )));
    }
    Ok(())
}

/// The statements of one mapped type, generated from its metadata.
#[derive(Debug)]
pub struct QueryBuilder<'a, T> {
    metadata: &'a EntityMetadata<T>,
}

impl<'a, T> QueryBuilder<'a, T> {
    pub fn new(metadata: &'a EntityMetadata<T>) -> Self {
        Self { metadata }
    }

    pub fn insert(&self) -> Result<String> {
        let sql = build_insert(self.metadata.get_table_name()?, &self.metadata.column_names())?;
        trace_sql("insert", &sql);
        Ok(sql)
    }

    pub fn update(&self) -> Result<String> {
        let sql = build_update(
            self.metadata.get_table_name()?,
            &self.metadata.get_id_column_name()?,
            &self.metadata.column_names(),
        )?;
        trace_sql("update", &sql);
        Ok(sql)
    }

    pub fn delete(&self) -> Result<String> {
        let sql = build_delete(
            self.metadata.get_table_name()?,
            &self.metadata.get_id_column_name()?,
        );
        trace_sql("delete", &sql);
        Ok(sql)
    }

    pub fn select_all(&self) -> Result<String> {
        let sql = build_select_all(self.metadata.get_table_name()?);
        trace_sql("select_all", &sql);
        Ok(sql)
    }

    pub fn select_by_id(&self) -> Result<String> {
        let sql = build_select_by_id(
            self.metadata.get_table_name()?,
            &self.metadata.get_id_column_name()?,
            &self.metadata.column_names(),
        )?;
        trace_sql("select_by_id", &sql);
        Ok(sql)
    }
}

fn trace_sql(kind: &str, sql: &str) {
    debug!(kind, sql, "generated statement");
}

/// True for plain SQL identifiers: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert() {
        let sql = build_insert("customer", &["full_name", "email_addr"]).unwrap();
        assert_eq!(sql, "INSERT INTO customer(full_name,email_addr) VALUES(?,?)");
    }

    #[test]
    fn test_insert_placeholder_count_matches_columns() {
        let columns = ["a", "b", "c", "d", "e"];
        let sql = build_insert("t", &columns).unwrap();
        assert_eq!(sql.matches('?').count(), columns.len());
        assert!(sql.ends_with("VALUES(?,?,?,?,?)"));
    }

    #[test]
    fn test_update_puts_identity_last() {
        let sql = build_update("customer", "customer_id", &["full_name", "email_addr"]).unwrap();
        assert_eq!(
            sql,
            "UPDATE customer SET full_name=?,email_addr=? WHERE customer_id = ?"
        );
    }

    #[test]
    fn test_delete_and_select_all() {
        assert_eq!(
            build_delete("customer", "customer_id"),
            "DELETE FROM customer WHERE customer_id = ?"
        );
        assert_eq!(build_select_all("customer"), "SELECT * FROM customer");
    }

    #[test]
    fn test_select_by_id_lists_id_first() {
        let sql =
            build_select_by_id("customer", "customer_id", &["full_name", "email_addr"]).unwrap();
        assert_eq!(
            sql,
            "SELECT customer_id, full_name,email_addr FROM customer WHERE customer_id = ?"
        );
    }

    #[test]
    fn test_empty_columns_rejected() {
        assert!(matches!(
            build_insert("t", &[]),
            Err(OrmError::Configuration(_))
        ));
        assert!(matches!(
            build_update("t", "t_id", &[]),
            Err(OrmError::Configuration(_))
        ));
        assert!(matches!(
            build_select_by_id("t", "t_id", &[]),
            Err(OrmError::Configuration(_))
        ));
    }

    #[test]
    fn test_identifiers() {
        assert!(is_valid_identifier("customer_id"));
        assert!(is_valid_identifier("_x1"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1abc"));
        assert!(!is_valid_identifier("users;drop"));
        assert!(!is_valid_identifier("a b"));
    }
}
