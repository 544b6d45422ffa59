use std::sync::Arc;

use crate::error::{Result, SqlMarshalError};

use super::Connection;

const BEGIN: &str = "BEGIN";
const COMMIT: &str = "COMMIT";
const ROLLBACK: &str = "ROLLBACK";

/// Callbacks fired when the outermost transaction boundary is crossed.
///
/// Nested begin/commit/rollback calls never reach the hook. Every method has an
/// empty default, so implementors override only the points they care about.
pub trait TransactionHook: Send + Sync {
    fn after_begin(&self) {}
    fn before_commit(&self) {}
    fn after_commit(&self) {}
    fn after_rollback(&self) {}
}

/// Rolls back one level if the unit of work unwinds without returning.
struct RollbackOnUnwind<'a> {
    conn: &'a Connection,
    armed: bool,
}

impl Drop for RollbackOnUnwind<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.conn.rollback_quietly("unit of work panicked");
        }
    }
}

impl Connection {
    /// Attach `hook`, returning whichever hook was attached before.
    pub fn set_transaction_hook(
        &self,
        hook: Option<Arc<dyn TransactionHook>>,
    ) -> Option<Arc<dyn TransactionHook>> {
        self.hook.replace(hook)
    }

    /// Current nesting depth; zero means no transaction is open.
    #[must_use]
    pub fn transaction_depth(&self) -> u32 {
        self.depth.get()
    }

    #[must_use]
    pub fn in_transaction(&self) -> bool {
        self.depth.get() > 0
    }

    fn current_hook(&self) -> Option<Arc<dyn TransactionHook>> {
        self.hook.borrow().clone()
    }

    /// Open a transaction scope. Only the outermost scope issues `BEGIN`.
    ///
    /// # Errors
    /// Returns `SqlMarshalError` if the engine rejects `BEGIN`, or
    /// `SqlMarshalError::TransactionState` if the depth counter would overflow.
    pub fn begin(&self) -> Result<()> {
        if self.enter()? {
            self.notify_after_begin();
        }
        Ok(())
    }

    /// Raise the depth by one, issuing `BEGIN` at depth zero. Returns whether the
    /// real transaction was opened.
    fn enter(&self) -> Result<bool> {
        let depth = self.depth.get();
        if depth > 0 {
            let next = depth.checked_add(1).ok_or_else(|| {
                SqlMarshalError::TransactionState("transaction nesting too deep".into())
            })?;
            self.depth.set(next);
            tracing::trace!(depth = next, "nested begin");
            return Ok(false);
        }

        self.run_control(BEGIN)?;
        self.depth.set(1);
        tracing::debug!(connection = ?self.id(), "transaction begun");
        Ok(true)
    }

    fn notify_after_begin(&self) {
        if let Some(hook) = self.current_hook() {
            hook.after_begin();
        }
    }

    /// Close one scope. Only the outermost scope issues `COMMIT`.
    ///
    /// # Errors
    /// Returns `SqlMarshalError::TransactionState` at depth zero, or the engine's
    /// error if `COMMIT` fails.
    pub fn commit(&self) -> Result<()> {
        match self.depth.get() {
            0 => Err(SqlMarshalError::TransactionState(
                "commit without an open transaction".into(),
            )),
            1 => {
                let hook = self.current_hook();
                if let Some(hook) = &hook {
                    hook.before_commit();
                }
                self.finish_outermost(COMMIT)?;
                tracing::debug!(connection = ?self.id(), "transaction committed");
                if let Some(hook) = &hook {
                    hook.after_commit();
                }
                Ok(())
            }
            depth => {
                self.depth.set(depth - 1);
                tracing::trace!(depth = depth - 1, "nested commit");
                Ok(())
            }
        }
    }

    /// Close one scope, undoing its work only if it is the outermost.
    ///
    /// A nested rollback just unwinds the depth; the outermost scope still decides
    /// whether the real transaction commits or rolls back.
    ///
    /// # Errors
    /// Returns `SqlMarshalError::TransactionState` at depth zero, or the engine's
    /// error if `ROLLBACK` fails.
    pub fn rollback(&self) -> Result<()> {
        match self.depth.get() {
            0 => Err(SqlMarshalError::TransactionState(
                "rollback without an open transaction".into(),
            )),
            1 => {
                self.finish_outermost(ROLLBACK)?;
                tracing::debug!(connection = ?self.id(), "transaction rolled back");
                if let Some(hook) = self.current_hook() {
                    hook.after_rollback();
                }
                Ok(())
            }
            depth => {
                self.depth.set(depth - 1);
                tracing::trace!(depth = depth - 1, "nested rollback");
                Ok(())
            }
        }
    }

    /// Run `work` inside a transaction scope.
    ///
    /// `work` receives the connection with the same lifetime as `self`, so statements
    /// declared outside the closure can be executed inside it.
    ///
    /// Commits when `work` returns `Ok`. On `Err` the scope is rolled back and the
    /// original error returned unchanged; a failure to roll back is only logged.
    /// If the outermost commit fails, a rollback is attempted before the commit
    /// error is returned. A panic in `work` or in the `after_begin` hook rolls the
    /// scope back while unwinding.
    ///
    /// ```rust
    /// use sql_marshal::prelude::*;
    ///
    /// # fn main() -> Result<(), SqlMarshalError> {
    /// let conn = Connection::open_in_memory()?;
    /// conn.execute_batch("create table t (v INTEGER)")?;
    /// let mut insert = Statement::new("insert into t (v) values (?)");
    ///
    /// let failed: Result<(), SqlMarshalError> = conn.transaction(|conn| {
    ///     conn.execute(&mut insert, 1)?;
    ///     Err(SqlMarshalError::Other("abandon".into()))
    /// });
    /// assert!(failed.is_err());
    ///
    /// let mut count = Statement::new("select count(*) from t");
    /// assert_eq!(conn.execute_for_one::<i64>(&mut count, ())?, 0);
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns whatever `work` returns, or the begin/commit error converted into `E`.
    pub fn transaction<'c, T, E, F>(&'c self, work: F) -> Result<T, E>
    where
        F: FnOnce(&'c Self) -> Result<T, E>,
        E: From<SqlMarshalError>,
    {
        let outermost = self.enter()?;
        let mut guard = RollbackOnUnwind {
            conn: self,
            armed: true,
        };
        if outermost {
            self.notify_after_begin();
        }
        let outcome = work(self);
        guard.armed = false;

        match outcome {
            Ok(value) => {
                let depth = self.depth.get();
                if let Err(err) = self.commit() {
                    if self.depth.get() == depth {
                        self.rollback_quietly("commit failed");
                    }
                    return Err(err.into());
                }
                Ok(value)
            }
            Err(err) => {
                self.rollback_quietly("unit of work failed");
                Err(err)
            }
        }
    }

    /// Issue the real `COMMIT`/`ROLLBACK` and settle the depth counter.
    ///
    /// If the statement fails but the engine is back in autocommit mode, the
    /// transaction is already gone and the depth drops to zero anyway.
    fn finish_outermost(&self, sql: &'static str) -> Result<()> {
        let result = self.run_control(sql);
        if result.is_ok() || self.raw().is_autocommit() {
            self.depth.set(0);
        }
        result
    }

    fn rollback_quietly(&self, reason: &str) {
        if self.depth.get() == 0 {
            return;
        }
        if let Err(err) = self.rollback() {
            tracing::warn!(reason, error = %err, "rollback failed");
        }
    }
}
