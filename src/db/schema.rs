//! Table schema descriptors for record types.
//!
//! Every record type describes its table up front: the table name and the
//! ordered list of non-identifier columns. The repository validates the
//! descriptor once, builds its SQL from it, and never inspects the record
//! type again.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use rusqlite::types::{ToSql, ToSqlOutput, Value};
use serde::Serialize;

use crate::error::{AppError, AppResult};

/// Name of the surrogate key column every table carries.
pub const ID_COLUMN: &str = "id";

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Semantic type of a stored field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    Real,
    Text,
    Timestamp,
}

impl FieldType {
    /// Column type declared in `CREATE TABLE`. Timestamps are stored as text.
    pub fn sql(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text | Self::Timestamp => "TEXT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub name: &'static str,
    pub field_type: FieldType,
}

impl Field {
    pub const fn new(name: &'static str, field_type: FieldType) -> Self {
        Self { name, field_type }
    }
}

/// Ordered description of one record type's table, excluding the `id` column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    pub table: &'static str,
    pub fields: Vec<Field>,
}

impl Schema {
    pub fn new(table: &'static str, fields: Vec<Field>) -> Self {
        Self { table, fields }
    }

    /// Checks that every name is a plain SQL identifier and that field names
    /// are unique and distinct from the `id` column.
    pub fn validate(&self) -> AppResult<()> {
        ensure_identifier(self.table)?;
        if self.fields.is_empty() {
            return Err(AppError::MalformedQueryInput(format!(
                "table '{}' declares no fields",
                self.table
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            ensure_identifier(field.name)?;
            if field.name.eq_ignore_ascii_case(ID_COLUMN) {
                return Err(AppError::MalformedQueryInput(format!(
                    "field '{}' in table '{}' collides with the identifier column",
                    field.name, self.table
                )));
            }
            if !seen.insert(field.name.to_ascii_lowercase()) {
                return Err(AppError::MalformedQueryInput(format!(
                    "duplicate field '{}' in table '{}'",
                    field.name, self.table
                )));
            }
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.name).collect()
    }

    /// `id, field1, field2, ...` in declared order.
    pub fn select_list(&self) -> String {
        std::iter::once(ID_COLUMN)
            .chain(self.fields.iter().map(|f| f.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn create_table_sql(&self) -> String {
        let columns = self
            .fields
            .iter()
            .map(|f| format!("{} {}", f.name, f.field_type.sql()))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({} INTEGER PRIMARY KEY, {})",
            self.table, ID_COLUMN, columns
        )
    }

    pub fn drop_table_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.table)
    }

    pub fn insert_sql(&self) -> String {
        let placeholders = vec!["?"; self.fields.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.table,
            self.column_names().join(", "),
            placeholders
        )
    }

    pub fn update_sql(&self) -> String {
        let assignments = self
            .fields
            .iter()
            .map(|f| format!("{} = ?", f.name))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "UPDATE {} SET {} WHERE {} = ?",
            self.table, assignments, ID_COLUMN
        )
    }
}

fn ensure_identifier(name: &str) -> AppResult<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(AppError::MalformedQueryInput(format!(
            "'{}' is not a valid SQL identifier",
            name
        )))
    }
}

/// A single bound value, as written to or compared against a column.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Timestamp(NaiveDateTime),
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            FieldValue::Null => Ok(ToSqlOutput::Owned(Value::Null)),
            FieldValue::Integer(v) => v.to_sql(),
            FieldValue::Real(v) => v.to_sql(),
            FieldValue::Text(v) => v.to_sql(),
            FieldValue::Timestamp(v) => v.to_sql(),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Integer(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Real(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<NaiveDateTime> for FieldValue {
    fn from(v: NaiveDateTime) -> Self {
        FieldValue::Timestamp(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}
