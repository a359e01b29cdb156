//! Generic Repository
//!
//! `Repository<E>` gives every table-backed entity the same contract:
//! `get_by_id`, `list_all`, `list_by` (predicate form through `Criteria`),
//! `add`, `update`, `delete`, `count` and `any`. Each call is a single SQL
//! statement; there is no caching and no retry.
//!
//! Soft-deletable entities are excluded from `list_all`, `list_by`, `count`
//! and `any` unless `Criteria::include_deleted` is set. `get_by_id` does not
//! filter on the flag and returns soft-deleted rows.
//!
//! The `*_with` variants accept any SQLite executor so the same statements
//! can run inside a `UnitOfWork` transaction.

use std::marker::PhantomData;

use chrono::Utc;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};
use tracing::debug;

use crate::db::map_write_error;
use crate::shared::error::{PlatformError, Result};

pub type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// A record stored in its own table with a TSID primary key named `id`.
pub trait Entity: for<'r> FromRow<'r, SqliteRow> + Send + Sync + Unpin + 'static {
    const TABLE: &'static str;
    /// Name used in error messages
    const NAME: &'static str;
    /// Written columns excluding `id`, in `bind_columns` order
    const COLUMNS: &'static [&'static str];
    /// Table carries `is_deleted` / `deleted_at`
    const SOFT_DELETE: bool = false;

    fn id(&self) -> &str;

    fn bind_columns<'q>(&'q self, query: SqliteQuery<'q>) -> SqliteQuery<'q>;
}

/// Value bound into a `Criteria` condition.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Bool(bool),
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

#[derive(Debug, Clone)]
enum Condition {
    Eq(&'static str, SqlValue),
    /// Case-insensitive substring match on any of the columns
    Contains(Vec<&'static str>, String),
    IsNull(&'static str),
}

/// Predicate over trusted column names, with ordering and paging.
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    conditions: Vec<Condition>,
    order_by: Option<(&'static str, bool)>,
    limit: Option<i64>,
    offset: Option<i64>,
    include_deleted: bool,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<SqlValue>) -> Self {
        self.conditions.push(Condition::Eq(column, value.into()));
        self
    }

    pub fn contains(mut self, columns: &[&'static str], term: &str) -> Self {
        let term = term.trim();
        if !term.is_empty() && !columns.is_empty() {
            self.conditions.push(Condition::Contains(columns.to_vec(), term.to_lowercase()));
        }
        self
    }

    pub fn is_null(mut self, column: &'static str) -> Self {
        self.conditions.push(Condition::IsNull(column));
        self
    }

    pub fn order_by(mut self, column: &'static str, descending: bool) -> Self {
        self.order_by = Some((column, descending));
        self
    }

    /// Zero-based page of `size` rows.
    pub fn page(mut self, page: u32, size: u32) -> Self {
        self.limit = Some(size as i64);
        self.offset = Some(page as i64 * size as i64);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn include_deleted(mut self) -> Self {
        self.include_deleted = true;
        self
    }

    /// Same filter without ordering or paging, for counting.
    pub fn without_paging(&self) -> Self {
        Self {
            conditions: self.conditions.clone(),
            order_by: None,
            limit: None,
            offset: None,
            include_deleted: self.include_deleted,
        }
    }

    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>, soft_delete: bool) {
        qb.push(" WHERE 1 = 1");
        if soft_delete && !self.include_deleted {
            qb.push(" AND is_deleted = 0");
        }

        for condition in &self.conditions {
            match condition {
                Condition::Eq(column, value) => {
                    qb.push(" AND ").push(*column).push(" = ");
                    match value {
                        SqlValue::Text(v) => qb.push_bind(v.clone()),
                        SqlValue::Integer(v) => qb.push_bind(*v),
                        SqlValue::Bool(v) => qb.push_bind(*v),
                    };
                }
                Condition::Contains(columns, term) => {
                    qb.push(" AND (");
                    for (i, column) in columns.iter().enumerate() {
                        if i > 0 {
                            qb.push(" OR ");
                        }
                        qb.push("LOWER(").push(*column).push(") LIKE ");
                        qb.push_bind(like_pattern(term)).push(" ESCAPE '\\'");
                    }
                    qb.push(")");
                }
                Condition::IsNull(column) => {
                    qb.push(" AND ").push(*column).push(" IS NULL");
                }
            }
        }
    }

    fn push_order_and_page(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        if let Some((column, descending)) = self.order_by {
            qb.push(" ORDER BY ").push(column).push(if descending { " DESC" } else { " ASC" });
        }
        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                qb.push(" LIMIT ").push_bind(limit);
                if let Some(offset) = offset {
                    qb.push(" OFFSET ").push_bind(offset);
                }
            }
            (None, Some(offset)) => {
                qb.push(" LIMIT -1 OFFSET ").push_bind(offset);
            }
            (None, None) => {}
        }
    }
}

/// Substring pattern matching `term` literally, escaped for `ESCAPE '\'`.
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub struct Repository<E> {
    pool: SqlitePool,
    _entity: PhantomData<fn() -> E>,
}

impl<E> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Option<E>> {
        self.get_by_id_with(&self.pool, id).await
    }

    pub async fn get_by_id_with<'e, X>(&self, executor: X, id: &str) -> Result<Option<E>>
    where
        X: SqliteExecutor<'e>,
    {
        let sql = format!("SELECT * FROM {} WHERE id = ?", E::TABLE);
        let entity = sqlx::query_as::<_, E>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(entity)
    }

    pub async fn list_all(&self) -> Result<Vec<E>> {
        self.list_by(&Criteria::new()).await
    }

    pub async fn list_by(&self, criteria: &Criteria) -> Result<Vec<E>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {}", E::TABLE));
        criteria.push_where(&mut qb, E::SOFT_DELETE);
        criteria.push_order_and_page(&mut qb);

        let rows = qb.build_query_as::<E>().fetch_all(&self.pool).await?;
        debug!(table = E::TABLE, rows = rows.len(), "Listed entities");
        Ok(rows)
    }

    pub async fn find_one(&self, criteria: &Criteria) -> Result<Option<E>> {
        let criteria = criteria.clone().limit(1);
        Ok(self.list_by(&criteria).await?.into_iter().next())
    }

    pub async fn count(&self, criteria: &Criteria) -> Result<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {}", E::TABLE));
        criteria.without_paging().push_where(&mut qb, E::SOFT_DELETE);
        Ok(qb.build_query_scalar::<i64>().fetch_one(&self.pool).await?)
    }

    pub async fn any(&self, criteria: &Criteria) -> Result<bool> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT EXISTS (SELECT 1 FROM {}", E::TABLE));
        criteria.without_paging().push_where(&mut qb, E::SOFT_DELETE);
        qb.push(")");
        Ok(qb.build_query_scalar::<bool>().fetch_one(&self.pool).await?)
    }

    pub async fn add(&self, entity: &E) -> Result<()> {
        self.add_with(&self.pool, entity).await
    }

    pub async fn add_with<'e, X>(&self, executor: X, entity: &E) -> Result<()>
    where
        X: SqliteExecutor<'e>,
    {
        let placeholders = vec!["?"; E::COLUMNS.len() + 1].join(", ");
        let sql = format!(
            "INSERT INTO {} (id, {}) VALUES ({})",
            E::TABLE,
            E::COLUMNS.join(", "),
            placeholders
        );

        entity
            .bind_columns(sqlx::query(&sql).bind(entity.id()))
            .execute(executor)
            .await
            .map_err(|e| map_write_error(E::NAME, e))?;

        debug!(table = E::TABLE, id = entity.id(), "Inserted entity");
        Ok(())
    }

    pub async fn update(&self, entity: &E) -> Result<()> {
        self.update_with(&self.pool, entity).await
    }

    /// Overwrite every column of an existing row.
    pub async fn update_with<'e, X>(&self, executor: X, entity: &E) -> Result<()>
    where
        X: SqliteExecutor<'e>,
    {
        let assignments = E::COLUMNS
            .iter()
            .map(|c| format!("{} = ?", c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE {} SET {} WHERE id = ?", E::TABLE, assignments);

        let result = entity
            .bind_columns(sqlx::query(&sql))
            .bind(entity.id())
            .execute(executor)
            .await
            .map_err(|e| map_write_error(E::NAME, e))?;

        if result.rows_affected() == 0 {
            return Err(PlatformError::not_found(E::NAME, entity.id()));
        }
        Ok(())
    }

    /// Physically remove a row. Returns whether a row existed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.delete_with(&self.pool, id).await
    }

    pub async fn delete_with<'e, X>(&self, executor: X, id: &str) -> Result<bool>
    where
        X: SqliteExecutor<'e>,
    {
        let sql = format!("DELETE FROM {} WHERE id = ?", E::TABLE);
        let result = sqlx::query(&sql).bind(id).execute(executor).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flip the soft-delete flag. Returns whether a live row was flagged.
    pub async fn soft_delete(&self, id: &str) -> Result<bool> {
        if !E::SOFT_DELETE {
            return Err(PlatformError::internal(format!("{} does not support soft delete", E::NAME)));
        }
        let sql = format!(
            "UPDATE {} SET is_deleted = 1, deleted_at = ? WHERE id = ? AND is_deleted = 0",
            E::TABLE
        );
        let result = sqlx::query(&sql)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("mjones"), "%mjones%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn test_contains_declares_escape_character() {
        let criteria = Criteria::new().contains(&["user_name", "email"], "a_b");
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM identity_users");
        criteria.push_where(&mut qb, true);
        let sql = qb.sql();
        assert_eq!(sql.matches("ESCAPE '\\'").count(), 2);
    }
}
