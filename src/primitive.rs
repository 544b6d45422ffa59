//! Positional bind/read primitives over a compiled `rusqlite` statement.
//!
//! Everything structured is flattened onto these four calls by [`crate::marshal`].
//! Bind positions are 1-based, column positions 0-based.

use std::borrow::Cow;

use rusqlite::types::ValueRef;

use crate::error::{Result, SqlMarshalError};
use crate::marshal::Elements;

/// Receives flattened parameter binds.
pub trait ParamSink {
    /// # Errors
    /// Returns `SqlMarshalError` if the engine rejects the bind.
    fn bind_integer(&mut self, pos: usize, value: i64) -> Result<()>;

    /// # Errors
    /// Returns `SqlMarshalError::BlobTooLarge` above the size limit, or the engine's error.
    fn bind_bytes(&mut self, pos: usize, bytes: &[u8]) -> Result<()>;

    /// Element slices are a byte bind of their encoding unless the sink can
    /// check the length first.
    ///
    /// # Errors
    /// Same as [`ParamSink::bind_bytes`].
    fn bind_elements(&mut self, pos: usize, items: &Elements<'_>) -> Result<()> {
        self.bind_bytes(pos, &items.encode())
    }

    /// Text is a byte bind unless the sink can tag it as text.
    ///
    /// # Errors
    /// Same as [`ParamSink::bind_bytes`].
    fn bind_text(&mut self, pos: usize, text: &str) -> Result<()> {
        self.bind_bytes(pos, text.as_bytes())
    }
}

/// Supplies result columns for one row.
pub trait ColumnSource {
    /// # Errors
    /// Returns `SqlMarshalError` if the column is missing or has no integer reading.
    fn read_integer(&self, pos: usize) -> Result<i64>;

    /// Raw bytes of the column; numbers come back as their text rendering.
    ///
    /// # Errors
    /// Returns `SqlMarshalError` if the column is missing.
    fn read_bytes(&self, pos: usize) -> Result<Cow<'_, [u8]>>;
}

/// Bind side of the accessor: a statement plus the configured payload limit.
pub struct StatementBinder<'s, 'conn> {
    stmt: &'s mut rusqlite::Statement<'conn>,
    max_blob_len: usize,
}

impl<'s, 'conn> StatementBinder<'s, 'conn> {
    pub fn new(stmt: &'s mut rusqlite::Statement<'conn>, max_blob_len: usize) -> Self {
        Self { stmt, max_blob_len }
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len > self.max_blob_len {
            return Err(SqlMarshalError::BlobTooLarge {
                len,
                max: self.max_blob_len,
            });
        }
        Ok(())
    }
}

impl ParamSink for StatementBinder<'_, '_> {
    fn bind_integer(&mut self, pos: usize, value: i64) -> Result<()> {
        tracing::trace!(pos, value, "bind integer");
        self.stmt.raw_bind_parameter(pos, value)?;
        Ok(())
    }

    fn bind_bytes(&mut self, pos: usize, bytes: &[u8]) -> Result<()> {
        self.check_len(bytes.len())?;
        tracing::trace!(pos, len = bytes.len(), "bind bytes");
        self.stmt.raw_bind_parameter(pos, bytes)?;
        Ok(())
    }

    fn bind_elements(&mut self, pos: usize, items: &Elements<'_>) -> Result<()> {
        self.check_len(items.byte_len())?;
        tracing::trace!(pos, len = items.byte_len(), "bind elements");
        let blob = items.encode();
        self.stmt.raw_bind_parameter(pos, blob.as_ref())?;
        Ok(())
    }

    fn bind_text(&mut self, pos: usize, text: &str) -> Result<()> {
        self.check_len(text.len())?;
        tracing::trace!(pos, len = text.len(), "bind text");
        self.stmt.raw_bind_parameter(pos, text)?;
        Ok(())
    }
}

impl ColumnSource for rusqlite::Row<'_> {
    fn read_integer(&self, pos: usize) -> Result<i64> {
        match self.get_ref(pos)? {
            ValueRef::Integer(i) => Ok(i),
            ValueRef::Null => Ok(0),
            #[allow(clippy::cast_possible_truncation)]
            ValueRef::Real(f) => Ok(f as i64),
            ValueRef::Text(text) => integer_from_text(text).ok_or_else(|| {
                SqlMarshalError::TypeMismatch(format!(
                    "column {pos} holds text that is not a number"
                ))
            }),
            ValueRef::Blob(_) => Err(SqlMarshalError::TypeMismatch(format!(
                "column {pos} holds a blob, expected an integer"
            ))),
        }
    }

    fn read_bytes(&self, pos: usize) -> Result<Cow<'_, [u8]>> {
        match self.get_ref(pos)? {
            ValueRef::Blob(bytes) | ValueRef::Text(bytes) => Ok(Cow::Borrowed(bytes)),
            ValueRef::Null => Ok(Cow::Borrowed(&[][..])),
            ValueRef::Integer(i) => Ok(Cow::Owned(i.to_string().into_bytes())),
            ValueRef::Real(f) => Ok(Cow::Owned(real_to_text(f).into_bytes())),
        }
    }
}

/// Integer reading of a text value: whole numbers exactly, decimals truncated.
fn integer_from_text(text: &[u8]) -> Option<i64> {
    let text = std::str::from_utf8(text).ok()?.trim();
    if let Ok(value) = text.parse::<i64>() {
        return Some(value);
    }
    let real = text.parse::<f64>().ok().filter(|f| f.is_finite())?;
    #[allow(clippy::cast_possible_truncation)]
    let truncated = real as i64;
    Some(truncated)
}

/// Text form of a REAL; whole numbers keep their `.0` as in SQLite's own rendering.
fn real_to_text(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}
