//! Generic single-table repository.
//!
//! A [`SqliteRepository<T>`] stores one record type in one table whose layout
//! comes from the type's [`Schema`]. All SQL is generated from the validated
//! schema once, at construction; every value reaches SQLite through a bound
//! parameter.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::path::PathBuf;

use rusqlite::{params_from_iter, OptionalExtension, Row};
use tracing::{debug, info, trace, warn};

use crate::db::schema::{FieldValue, Schema, ID_COLUMN};
use crate::db::storage::Storage;
use crate::error::{AppError, AppResult};
use crate::models::{Budget, Category, Expense};

/// A flat record persisted in its own table.
pub trait Record: Sized {
    /// Table descriptor, excluding the `id` column.
    fn schema() -> Schema;

    /// Surrogate key, 0 while the record has not been stored.
    fn pk(&self) -> i64;

    fn set_pk(&mut self, pk: i64);

    /// Non-identifier field values in schema order.
    fn values(&self) -> Vec<FieldValue>;

    /// Decodes a row selected as `id, field1, field2, ...`.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

/// Equality conditions on record fields, joined with `AND`.
///
/// Conditions whose value is null are dropped rather than turned into
/// `IS NULL`, so optional form inputs can be passed through unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, FieldValue)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn equals(mut self, field: &str, value: impl Into<FieldValue>) -> Self {
        let value = value.into();
        if value != FieldValue::Null {
            self.conditions.push((field.to_string(), value));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[(String, FieldValue)] {
        &self.conditions
    }
}

/// Extra boolean condition with `?` placeholders, e.g. a correlated subquery.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawClause {
    sql: String,
    params: Vec<FieldValue>,
}

impl RawClause {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn bind(mut self, value: impl Into<FieldValue>) -> Self {
        self.params.push(value.into());
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[FieldValue] {
        &self.params
    }

    fn validate(&self) -> AppResult<()> {
        if self.sql.contains(';') {
            return Err(AppError::MalformedQueryInput(format!(
                "clause must be a single condition: {}",
                self.sql
            )));
        }
        let placeholders = self.sql.matches('?').count();
        if placeholders != self.params.len() {
            return Err(AppError::MalformedQueryInput(format!(
                "clause has {} placeholders but {} bound values",
                placeholders,
                self.params.len()
            )));
        }
        Ok(())
    }
}

pub struct SqliteRepository<T> {
    storage: Storage,
    schema: Schema,
    select_list: String,
    insert_sql: String,
    update_sql: String,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> SqliteRepository<T> {
    /// Repository for `T` using the type's own schema descriptor.
    pub fn new(storage: Storage) -> AppResult<Self> {
        Self::with_schema(T::schema(), storage)
    }

    /// Repository for `T` with an explicit schema descriptor. Creates the
    /// table if it does not exist yet; existing tables are left untouched.
    pub fn with_schema(schema: Schema, storage: Storage) -> AppResult<Self> {
        schema.validate()?;
        let repo = Self {
            select_list: schema.select_list(),
            insert_sql: schema.insert_sql(),
            update_sql: schema.update_sql(),
            storage,
            schema,
            _record: PhantomData,
        };
        repo.create_table()?;
        Ok(repo)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    fn table(&self) -> &'static str {
        self.schema.table
    }

    fn create_table(&self) -> AppResult<()> {
        let sql = self.schema.create_table_sql();
        self.storage.with_connection(|conn| {
            conn.execute(&sql, [])?;
            Ok(())
        })?;
        debug!(table = self.table(), db = %self.storage.path().display(), "Ensured table exists");
        Ok(())
    }

    fn drop_table(&self) -> AppResult<()> {
        let sql = self.schema.drop_table_sql();
        self.storage.with_connection(|conn| {
            conn.execute(&sql, [])?;
            Ok(())
        })?;
        warn!(table = self.table(), db = %self.storage.path().display(), "Dropped table");
        Ok(())
    }

    fn checked_values(&self, record: &T) -> AppResult<Vec<FieldValue>> {
        let values = record.values();
        if values.len() != self.schema.fields.len() {
            return Err(AppError::MalformedQueryInput(format!(
                "table '{}' has {} fields but the record supplied {} values",
                self.table(),
                self.schema.fields.len(),
                values.len()
            )));
        }
        Ok(values)
    }

    /// Builds ` WHERE ...` from a filter and an extra clause, plus the values
    /// to bind in placeholder order.
    fn where_clause(
        &self,
        filter: Option<&Filter>,
        clause: Option<&RawClause>,
    ) -> AppResult<(String, Vec<FieldValue>)> {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(filter) = filter {
            for (field, value) in filter.conditions() {
                let known = self.schema.field(field).is_some() || field == ID_COLUMN;
                if !known {
                    return Err(AppError::MalformedQueryInput(format!(
                        "table '{}' has no field '{}'",
                        self.table(),
                        field
                    )));
                }
                conditions.push(format!("{} = ?", field));
                params.push(value.clone());
            }
        }

        if let Some(clause) = clause {
            clause.validate()?;
            if !clause.sql().trim().is_empty() {
                conditions.push(format!("({})", clause.sql().trim()));
                params.extend(clause.params().iter().cloned());
            }
        }

        if conditions.is_empty() {
            Ok((String::new(), params))
        } else {
            Ok((format!(" WHERE {}", conditions.join(" AND ")), params))
        }
    }

    /// Stores a new record and writes the generated key back into it.
    pub fn add(&self, record: &mut T) -> AppResult<i64> {
        if record.pk() != 0 {
            return Err(AppError::InvalidState(format!(
                "cannot add {} record that already has pk {}",
                self.table(),
                record.pk()
            )));
        }
        let values = self.checked_values(record)?;

        let pk = self.storage.with_connection(|conn| {
            conn.execute(&self.insert_sql, params_from_iter(values.iter()))?;
            Ok(conn.last_insert_rowid())
        })?;

        record.set_pk(pk);
        debug!(table = self.table(), pk, "Added record");
        Ok(pk)
    }

    pub fn get(&self, pk: i64) -> AppResult<Option<T>> {
        trace!(table = self.table(), pk, "Fetching record");
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            self.select_list,
            self.table(),
            ID_COLUMN
        );
        self.storage.with_connection(|conn| {
            Ok(conn.query_row(&sql, [pk], |row| T::from_row(row)).optional()?)
        })
    }

    /// All matching records in insertion (pk) order.
    pub fn get_all(
        &self,
        filter: Option<&Filter>,
        clause: Option<&RawClause>,
    ) -> AppResult<Vec<T>> {
        let (where_sql, params) = self.where_clause(filter, clause)?;
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY {}",
            self.select_list,
            self.table(),
            where_sql,
            ID_COLUMN
        );

        let records = self.storage.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let records = stmt
                .query_map(params_from_iter(params.iter()), |row| T::from_row(row))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })?;

        debug!(table = self.table(), count = records.len(), "Listed records");
        Ok(records)
    }

    pub fn list(&self) -> AppResult<Vec<T>> {
        self.get_all(None, None)
    }

    pub fn count(&self, filter: Option<&Filter>) -> AppResult<i64> {
        let (where_sql, params) = self.where_clause(filter, None)?;
        let sql = format!("SELECT COUNT(*) FROM {}{}", self.table(), where_sql);
        self.storage.with_connection(|conn| {
            Ok(conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?)
        })
    }

    /// Overwrites every field of the stored row with the record's values.
    pub fn update(&self, record: &T) -> AppResult<()> {
        let pk = record.pk();
        if pk == 0 {
            return Err(AppError::InvalidState(format!(
                "cannot update {} record without a pk",
                self.table()
            )));
        }
        let mut values = self.checked_values(record)?;
        values.push(FieldValue::Integer(pk));

        let rows = self.storage.with_connection(|conn| {
            Ok(conn.execute(&self.update_sql, params_from_iter(values.iter()))?)
        })?;

        if rows == 0 {
            return Err(AppError::NotFound(format!(
                "{} record with pk {}",
                self.table(),
                pk
            )));
        }
        debug!(table = self.table(), pk, "Updated record");
        Ok(())
    }

    /// Removes the row with `pk`. Returns whether a row was removed; deleting
    /// a missing pk is a no-op.
    pub fn delete(&self, pk: i64) -> AppResult<bool> {
        if pk == 0 {
            return Err(AppError::InvalidState(format!(
                "cannot delete {} record without a pk",
                self.table()
            )));
        }
        let sql = format!("DELETE FROM {} WHERE {} = ?", self.table(), ID_COLUMN);
        let rows = self
            .storage
            .with_connection(|conn| Ok(conn.execute(&sql, [pk])?))?;
        if rows > 0 {
            debug!(table = self.table(), pk, "Deleted record");
        }
        Ok(rows > 0)
    }

    /// Drops this record type's table, switches to `path` and recreates the
    /// table there empty. Existing rows are not carried over.
    pub fn reset_storage_location(&mut self, path: impl Into<PathBuf>) -> AppResult<()> {
        let path = path.into();
        let relocated = self.storage.relocate(&path)?;
        self.drop_table()?;
        self.storage = relocated;
        self.create_table()?;
        info!(table = self.table(), db = %path.display(), "Reset storage location");
        Ok(())
    }
}

impl<T> Clone for SqliteRepository<T> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            schema: self.schema.clone(),
            select_list: self.select_list.clone(),
            insert_sql: self.insert_sql.clone(),
            update_sql: self.update_sql.clone(),
            _record: PhantomData,
        }
    }
}

impl<T> fmt::Debug for SqliteRepository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteRepository")
            .field("table", &self.schema.table)
            .field("storage", &self.storage)
            .finish()
    }
}

/// One repository per record type, all sharing a storage location.
pub struct RepositoryRegistry {
    storage: Storage,
    repositories: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl RepositoryRegistry {
    pub fn new(storage: Storage) -> Self {
        Self {
            storage,
            repositories: HashMap::new(),
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Creates (or replaces) the repository for `T`.
    pub fn register<T: Record + 'static>(mut self) -> AppResult<Self> {
        let repo = SqliteRepository::<T>::new(self.storage.clone())?;
        self.repositories.insert(TypeId::of::<T>(), Box::new(repo));
        Ok(self)
    }

    pub fn get<T: Record + 'static>(&self) -> Option<&SqliteRepository<T>> {
        self.repositories
            .get(&TypeId::of::<T>())
            .and_then(|repo| repo.downcast_ref::<SqliteRepository<T>>())
    }

    pub fn get_mut<T: Record + 'static>(&mut self) -> Option<&mut SqliteRepository<T>> {
        self.repositories
            .get_mut(&TypeId::of::<T>())
            .and_then(|repo| repo.downcast_mut::<SqliteRepository<T>>())
    }

    /// Like [`get`](Self::get), but a missing registration is an error.
    pub fn require<T: Record + 'static>(&self) -> AppResult<&SqliteRepository<T>> {
        self.get::<T>().ok_or_else(|| {
            AppError::NotFound(format!(
                "no repository registered for table '{}'",
                T::schema().table
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}

/// Registry holding repositories for every bookkeeping record type.
pub fn repository_factory(storage: Storage) -> AppResult<RepositoryRegistry> {
    RepositoryRegistry::new(storage)
        .register::<Category>()?
        .register::<Expense>()?
        .register::<Budget>()
}
