use std::fmt;

use crate::connection::{Connection, ConnectionId};
use crate::error::{Result, SqlMarshalError};

/// Reusable handle to one SQL text, compiled on first execution.
///
/// ```rust
/// use sql_marshal::prelude::*;
///
/// # fn main() -> Result<(), SqlMarshalError> {
/// let conn = Connection::open_in_memory()?;
/// let mut plus_one = Statement::new("select ? + 1");
/// assert!(!plus_one.is_compiled());
/// assert_eq!(conn.execute_for_one::<i64>(&mut plus_one, 41)?, 42);
/// assert!(plus_one.is_compiled());
/// # Ok(())
/// # }
/// ```
pub struct Statement<'conn> {
    sql: String,
    compiled: Option<Compiled<'conn>>,
}

struct Compiled<'conn> {
    owner: ConnectionId,
    stmt: rusqlite::Statement<'conn>,
}

impl<'conn> Statement<'conn> {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            compiled: None,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    /// Compile against `conn` if needed and hand back the SQL text with the compiled form.
    pub(crate) fn compiled(
        &mut self,
        conn: &'conn Connection,
    ) -> Result<(&str, &mut rusqlite::Statement<'conn>)> {
        if let Some(existing) = &self.compiled
            && existing.owner != conn.id()
        {
            return Err(SqlMarshalError::ForeignStatement {
                sql: self.sql.clone(),
            });
        }

        let compiled = match self.compiled.take() {
            Some(existing) => existing,
            None => {
                let stmt =
                    conn.raw()
                        .prepare(&self.sql)
                        .map_err(|source| SqlMarshalError::PrepareError {
                            sql: self.sql.clone(),
                            source,
                        })?;
                tracing::debug!(sql = %self.sql, "compiled statement");
                Compiled {
                    owner: conn.id(),
                    stmt,
                }
            }
        };
        let compiled = self.compiled.insert(compiled);
        Ok((&self.sql, &mut compiled.stmt))
    }
}

impl fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}
