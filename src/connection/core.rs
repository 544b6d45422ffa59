use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::config::{ConnectionOptions, ConnectionOptionsBuilder};
use crate::error::{Result, SqlMarshalError};

use super::tx::TransactionHook;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Connection`], used to pin compiled statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

/// One open database file plus its transaction nesting state.
///
/// A connection may move between threads but is not shareable across them; callers
/// serialize access themselves (one connection per worker, or an external mutex).
pub struct Connection {
    raw: rusqlite::Connection,
    id: ConnectionId,
    max_blob_len: usize,
    pub(crate) depth: Cell<u32>,
    pub(crate) hook: RefCell<Option<Arc<dyn TransactionHook>>>,
}

impl Connection {
    /// Open (creating if needed) the database at `db_path` with default options.
    ///
    /// # Errors
    /// Returns `SqlMarshalError::ConnectionError` if the file cannot be opened.
    pub fn open(db_path: impl Into<String>) -> Result<Self> {
        Self::open_with(ConnectionOptions::new(db_path))
    }

    /// # Errors
    /// Returns `SqlMarshalError::ConnectionError` if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        Self::open_with(ConnectionOptions::default())
    }

    #[must_use]
    pub fn builder(db_path: impl Into<String>) -> ConnectionOptionsBuilder {
        ConnectionOptionsBuilder::new(db_path)
    }

    /// Open a connection and apply the configured pragmas.
    ///
    /// # Errors
    /// Returns `SqlMarshalError::ConfigError` for invalid options and
    /// `SqlMarshalError::ConnectionError` if opening or initial setup fails.
    pub fn open_with(opts: ConnectionOptions) -> Result<Self> {
        opts.validate()?;
        let raw = rusqlite::Connection::open(&opts.db_path).map_err(|e| {
            SqlMarshalError::ConnectionError(format!("failed to open `{}`: {e}", opts.db_path))
        })?;

        if let Some(millis) = opts.busy_timeout_ms {
            raw.busy_timeout(Duration::from_millis(millis)).map_err(|e| {
                SqlMarshalError::ConnectionError(format!("failed to set busy timeout: {e}"))
            })?;
        }
        let pragmas = opts.pragma_script();
        if !pragmas.is_empty() {
            raw.execute_batch(&pragmas).map_err(|e| {
                SqlMarshalError::ConnectionError(format!("failed to apply pragmas: {e}"))
            })?;
        }

        let id = ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(db_path = %opts.db_path, id = id.0, "opened connection");
        Ok(Self {
            raw,
            id,
            max_blob_len: opts.max_blob_len,
            depth: Cell::new(0),
            hook: RefCell::new(None),
        })
    }

    /// Close the handle, surfacing any error the engine reports.
    ///
    /// An open transaction is rolled back by the engine.
    ///
    /// # Errors
    /// Returns `SqlMarshalError::ConnectionError` if the engine refuses to close.
    pub fn close(self) -> Result<()> {
        if self.depth.get() > 0 {
            tracing::warn!(
                depth = self.depth.get(),
                "closing connection with an open transaction"
            );
        }
        self.raw.close().map_err(|(_, e)| {
            SqlMarshalError::ConnectionError(format!("failed to close connection: {e}"))
        })
    }

    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    #[must_use]
    pub fn max_blob_len(&self) -> usize {
        self.max_blob_len
    }

    /// Rows modified by the most recent INSERT, UPDATE or DELETE.
    #[must_use]
    #[allow(clippy::unnecessary_cast)]
    pub fn changes(&self) -> u64 {
        self.raw.changes() as u64
    }

    #[must_use]
    pub fn last_insert_rowid(&self) -> i64 {
        self.raw.last_insert_rowid()
    }

    /// Run a script of semicolon-separated statements without parameters.
    ///
    /// # Errors
    /// Returns `SqlMarshalError::SqliteError` if any statement fails.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.raw.execute_batch(sql)?;
        Ok(())
    }

    /// Hand the text of every statement SQLite runs to `callback`; `None` stops it.
    #[cfg(feature = "trace")]
    pub fn trace(&mut self, callback: Option<fn(&str)>) {
        self.raw.trace(callback);
    }

    pub(crate) fn raw(&self) -> &rusqlite::Connection {
        &self.raw
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("max_blob_len", &self.max_blob_len)
            .field("depth", &self.depth.get())
            .finish_non_exhaustive()
    }
}
