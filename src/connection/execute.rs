use crate::error::{Result, SqlMarshalError};
use crate::marshal::{BindCursor, FromColumns, Param, ToParam, bind_param, read_row};
use crate::primitive::StatementBinder;
use crate::statement::Statement;

use super::Connection;

/// Reset-and-bind phase shared by every calling convention.
///
/// The placeholder count is checked before anything is bound so a mismatched call
/// leaves no partial bindings behind.
fn bind_all(
    stmt: &mut rusqlite::Statement<'_>,
    sql: &str,
    param: &Param<'_>,
    max_blob_len: usize,
) -> Result<()> {
    let expected = stmt.parameter_count();
    let supplied = param.width();
    if expected != supplied {
        return Err(SqlMarshalError::ParameterError(format!(
            "`{sql}` expects {expected} parameters, {supplied} supplied"
        )));
    }
    let mut cursor = BindCursor::new();
    let mut binder = StatementBinder::new(stmt, max_blob_len);
    bind_param(&mut binder, &mut cursor, param)
}

/// Step to completion, discarding any rows.
pub(crate) fn run_execute(
    stmt: &mut rusqlite::Statement<'_>,
    sql: &str,
    param: &Param<'_>,
    max_blob_len: usize,
) -> Result<()> {
    bind_all(stmt, sql, param, max_blob_len)?;
    let mut rows = stmt.raw_query();
    let mut discarded = 0_usize;
    while rows.next()?.is_some() {
        discarded += 1;
    }
    if discarded > 0 {
        tracing::trace!(sql, discarded, "execute discarded rows");
    }
    Ok(())
}

/// Step once and require completion; a row is a protocol violation.
pub(crate) fn run_expect_no_rows(stmt: &mut rusqlite::Statement<'_>, sql: &str) -> Result<()> {
    bind_all(stmt, sql, &Param::Fields(Vec::new()), 0)?;
    let mut rows = stmt.raw_query();
    if rows.next()?.is_some() {
        return Err(SqlMarshalError::UnexpectedRow {
            sql: sql.to_owned(),
        });
    }
    Ok(())
}

pub(crate) fn run_for_optional<T: FromColumns>(
    stmt: &mut rusqlite::Statement<'_>,
    sql: &str,
    param: &Param<'_>,
    max_blob_len: usize,
) -> Result<Option<T>> {
    bind_all(stmt, sql, param, max_blob_len)?;
    let shape = T::shape();
    let mut rows = stmt.raw_query();
    let value = match rows.next()? {
        Some(row) => Some(read_row::<T, _>(row, &shape)?),
        None => None,
    };
    while rows.next()?.is_some() {}
    Ok(value)
}

pub(crate) fn run_for_multiple<T: FromColumns>(
    stmt: &mut rusqlite::Statement<'_>,
    sql: &str,
    param: &Param<'_>,
    max_blob_len: usize,
) -> Result<Vec<T>> {
    bind_all(stmt, sql, param, max_blob_len)?;
    let shape = T::shape();
    let mut rows = stmt.raw_query();
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(read_row::<T, _>(row, &shape)?);
    }
    Ok(out)
}

impl Connection {
    /// Run `stmt` for its side effects. Rows it yields are drained and discarded.
    ///
    /// # Errors
    /// Returns `SqlMarshalError` if compiling, binding or stepping fails.
    pub fn execute<'c>(&'c self, stmt: &mut Statement<'c>, params: impl ToParam) -> Result<()> {
        let param = params.to_param();
        let (sql, compiled) = stmt.compiled(self)?;
        run_execute(compiled, sql, &param, self.max_blob_len())
    }

    /// Run `stmt` and read exactly one row; remaining rows are drained.
    ///
    /// # Errors
    /// Returns `SqlMarshalError::NoResult` if no row is produced, or any compile,
    /// bind, step or read error.
    pub fn execute_for_one<'c, T: FromColumns>(
        &'c self,
        stmt: &mut Statement<'c>,
        params: impl ToParam,
    ) -> Result<T> {
        let param = params.to_param();
        let (sql, compiled) = stmt.compiled(self)?;
        run_for_optional(compiled, sql, &param, self.max_blob_len())?.ok_or_else(|| {
            SqlMarshalError::NoResult {
                sql: sql.to_owned(),
            }
        })
    }

    /// Like [`Connection::execute_for_one`], but a missing row yields `None`.
    ///
    /// # Errors
    /// Returns `SqlMarshalError` if compiling, binding, stepping or reading fails.
    pub fn execute_for_optional<'c, T: FromColumns>(
        &'c self,
        stmt: &mut Statement<'c>,
        params: impl ToParam,
    ) -> Result<Option<T>> {
        let param = params.to_param();
        let (sql, compiled) = stmt.compiled(self)?;
        run_for_optional(compiled, sql, &param, self.max_blob_len())
    }

    /// Read one typed value per row, in the order the engine returns them.
    ///
    /// # Errors
    /// Returns `SqlMarshalError` if compiling, binding, stepping or reading fails.
    pub fn execute_for_multiple<'c, T: FromColumns>(
        &'c self,
        stmt: &mut Statement<'c>,
        params: impl ToParam,
    ) -> Result<Vec<T>> {
        let param = params.to_param();
        let (sql, compiled) = stmt.compiled(self)?;
        run_for_multiple(compiled, sql, &param, self.max_blob_len())
    }

    /// Issue one of the fixed transaction-control statements.
    pub(crate) fn run_control(&self, sql: &'static str) -> Result<()> {
        let mut cached = self
            .raw()
            .prepare_cached(sql)
            .map_err(|source| SqlMarshalError::PrepareError {
                sql: sql.to_owned(),
                source,
            })?;
        run_expect_no_rows(&mut cached, sql)
    }
}
