//! Recursive flattening of [`Param`] and [`Shape`] trees onto the primitive accessor.

use crate::error::{Result, SqlMarshalError};
use crate::primitive::{ColumnSource, ParamSink};

use super::cursor::{BindCursor, ReadCursor};
use super::param::Param;
use super::shape::{Datum, FromColumns, Shape};

/// Bind `param` starting at the cursor's position, advancing it once per leaf.
///
/// # Errors
/// Returns the first error raised by the sink; binds already issued stay issued.
pub fn bind_param<S>(sink: &mut S, cursor: &mut BindCursor, param: &Param<'_>) -> Result<()>
where
    S: ParamSink + ?Sized,
{
    match param {
        Param::Integer(value) => sink.bind_integer(cursor.advance(), *value),
        Param::Bytes(bytes) => sink.bind_bytes(cursor.advance(), bytes),
        Param::Elements(items) => sink.bind_elements(cursor.advance(), items),
        Param::Text(text) => sink.bind_text(cursor.advance(), text),
        Param::Pair(first, second) => {
            bind_param(sink, cursor, first)?;
            bind_param(sink, cursor, second)
        }
        Param::Fields(fields) => fields
            .iter()
            .try_for_each(|field| bind_param(sink, cursor, field)),
    }
}

/// Read one value of `shape` starting at the cursor's column.
///
/// # Errors
/// Returns `SqlMarshalError::LengthMismatch` when a blob is not a whole number of
/// elements, or whatever the source reports.
pub fn read_datum<C>(source: &C, cursor: &mut ReadCursor, shape: &Shape) -> Result<Datum>
where
    C: ColumnSource + ?Sized,
{
    match shape {
        Shape::Integer => Ok(Datum::Integer(source.read_integer(cursor.advance())?)),
        Shape::Bytes { element_size } => {
            let pos = cursor.advance();
            let bytes = source.read_bytes(pos)?;
            let element_size = (*element_size).max(1);
            if bytes.len() % element_size != 0 {
                return Err(SqlMarshalError::LengthMismatch {
                    len: bytes.len(),
                    element_size,
                });
            }
            tracing::trace!(pos, len = bytes.len(), "read bytes");
            Ok(Datum::Bytes(bytes.into_owned()))
        }
        Shape::Pair(first, second) => {
            let first = read_datum(source, cursor, first)?;
            let second = read_datum(source, cursor, second)?;
            Ok(Datum::Pair(Box::new(first), Box::new(second)))
        }
        Shape::Fields(fields) => fields
            .iter()
            .map(|field| read_datum(source, cursor, field))
            .collect::<Result<Vec<_>>>()
            .map(Datum::Fields),
    }
}

/// Read a full typed row from column 0.
///
/// # Errors
/// See [`read_datum`] and [`FromColumns::from_datum`].
pub fn read_row<T, C>(source: &C, shape: &Shape) -> Result<T>
where
    T: FromColumns,
    C: ColumnSource + ?Sized,
{
    let mut cursor = ReadCursor::new();
    let datum = read_datum(source, &mut cursor, shape)?;
    T::from_datum(datum)
}
