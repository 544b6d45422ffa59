use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::error::{Result, SqlMarshalError};

/// Largest byte/text payload accepted by a single bind unless configured otherwise.
pub const DEFAULT_MAX_BLOB_LEN: usize = 4096;

const JOURNAL_MODES: &[&str] = &["DELETE", "TRUNCATE", "PERSIST", "MEMORY", "WAL", "OFF"];

/// Options for opening a [`Connection`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Passed through unmodified to `SQLite`; `:memory:` opens a private in-memory database.
    pub db_path: String,
    pub max_blob_len: usize,
    pub busy_timeout_ms: Option<u64>,
    pub journal_mode: Option<String>,
    pub foreign_keys: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            db_path: ":memory:".to_string(),
            max_blob_len: DEFAULT_MAX_BLOB_LEN,
            busy_timeout_ms: None,
            journal_mode: None,
            foreign_keys: false,
        }
    }
}

impl ConnectionOptions {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }

    /// Parse options from a JSON document. Missing fields take their defaults.
    ///
    /// # Errors
    /// Returns `SqlMarshalError::ConfigError` if the document is malformed or the
    /// resulting options fail validation.
    pub fn from_json(json: &str) -> Result<Self> {
        let opts: Self = serde_json::from_str(json)
            .map_err(|e| SqlMarshalError::ConfigError(format!("invalid options JSON: {e}")))?;
        opts.validate()?;
        Ok(opts)
    }

    /// # Errors
    /// Returns `SqlMarshalError::ConfigError` describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.max_blob_len == 0 {
            return Err(SqlMarshalError::ConfigError(
                "max_blob_len must be greater than zero".into(),
            ));
        }
        if i32::try_from(self.max_blob_len).is_err() {
            return Err(SqlMarshalError::ConfigError(format!(
                "max_blob_len {} exceeds the engine's blob size range",
                self.max_blob_len
            )));
        }
        if let Some(mode) = &self.journal_mode
            && !JOURNAL_MODES.contains(&mode.to_ascii_uppercase().as_str())
        {
            return Err(SqlMarshalError::ConfigError(format!(
                "unknown journal_mode `{mode}`"
            )));
        }
        Ok(())
    }

    /// PRAGMA script applied right after the file is opened.
    pub(crate) fn pragma_script(&self) -> String {
        let mut script = String::new();
        if let Some(mode) = &self.journal_mode {
            script.push_str(&format!("PRAGMA journal_mode = {};", mode.to_ascii_uppercase()));
        }
        if self.foreign_keys {
            script.push_str("PRAGMA foreign_keys = ON;");
        }
        script
    }
}

/// Fluent builder for [`ConnectionOptions`].
#[derive(Debug, Clone)]
pub struct ConnectionOptionsBuilder {
    opts: ConnectionOptions,
}

impl ConnectionOptionsBuilder {
    #[must_use]
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            opts: ConnectionOptions::new(db_path),
        }
    }

    #[must_use]
    pub fn max_blob_len(mut self, max_blob_len: usize) -> Self {
        self.opts.max_blob_len = max_blob_len;
        self
    }

    #[must_use]
    pub fn busy_timeout_ms(mut self, millis: u64) -> Self {
        self.opts.busy_timeout_ms = Some(millis);
        self
    }

    #[must_use]
    pub fn journal_mode(mut self, mode: impl Into<String>) -> Self {
        self.opts.journal_mode = Some(mode.into());
        self
    }

    #[must_use]
    pub fn foreign_keys(mut self, enabled: bool) -> Self {
        self.opts.foreign_keys = enabled;
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectionOptions {
        self.opts
    }

    /// Open a connection with the accumulated options.
    ///
    /// # Errors
    /// Returns `SqlMarshalError` if validation fails or the file cannot be opened.
    pub fn open(self) -> Result<Connection> {
        Connection::open_with(self.finish())
    }
}
