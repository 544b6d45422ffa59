use crate::error::{Result, SqlMarshalError};

use super::element::{Element, decode_elements};

/// Column layout a result type expects, mirroring [`super::Param`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shape {
    Integer,
    /// One byte/text column whose length must be a multiple of `element_size`.
    Bytes { element_size: usize },
    Pair(Box<Shape>, Box<Shape>),
    Fields(Vec<Shape>),
}

impl Shape {
    /// Number of result columns consumed by one read of this shape.
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            Shape::Integer | Shape::Bytes { .. } => 1,
            Shape::Pair(first, second) => first.width() + second.width(),
            Shape::Fields(fields) => fields.iter().map(Shape::width).sum(),
        }
    }
}

/// Raw values read for a [`Shape`], before conversion to the caller's type.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Integer(i64),
    Bytes(Vec<u8>),
    Pair(Box<Datum>, Box<Datum>),
    Fields(Vec<Datum>),
}

impl Datum {
    fn kind(&self) -> &'static str {
        match self {
            Datum::Integer(_) => "integer",
            Datum::Bytes(_) => "bytes",
            Datum::Pair(..) => "pair",
            Datum::Fields(_) => "fields",
        }
    }

    fn mismatch(&self, expected: &str) -> SqlMarshalError {
        SqlMarshalError::TypeMismatch(format!("expected {expected}, read {}", self.kind()))
    }

    /// # Errors
    /// Returns `SqlMarshalError::TypeMismatch` for any other variant.
    pub fn into_integer(self) -> Result<i64> {
        match self {
            Datum::Integer(value) => Ok(value),
            other => Err(other.mismatch("integer")),
        }
    }

    /// # Errors
    /// Returns `SqlMarshalError::TypeMismatch` for any other variant.
    pub fn into_bytes(self) -> Result<Vec<u8>> {
        match self {
            Datum::Bytes(bytes) => Ok(bytes),
            other => Err(other.mismatch("bytes")),
        }
    }

    /// # Errors
    /// Returns `SqlMarshalError::TypeMismatch` for any other variant.
    pub fn into_pair(self) -> Result<(Datum, Datum)> {
        match self {
            Datum::Pair(first, second) => Ok((*first, *second)),
            other => Err(other.mismatch("pair")),
        }
    }

    /// # Errors
    /// Returns `SqlMarshalError::TypeMismatch` for other variants or a different field count.
    pub fn into_fields(self, count: usize) -> Result<Vec<Datum>> {
        match self {
            Datum::Fields(fields) if fields.len() == count => Ok(fields),
            Datum::Fields(fields) => Err(SqlMarshalError::TypeMismatch(format!(
                "expected {count} fields, read {}",
                fields.len()
            ))),
            other => Err(other.mismatch("fields")),
        }
    }
}

/// Types that can be reassembled from one result row.
pub trait FromColumns: Sized {
    fn shape() -> Shape;

    /// # Errors
    /// Returns `SqlMarshalError` if the datum does not fit this type.
    fn from_datum(datum: Datum) -> Result<Self>;
}

impl FromColumns for i64 {
    fn shape() -> Shape {
        Shape::Integer
    }

    fn from_datum(datum: Datum) -> Result<Self> {
        datum.into_integer()
    }
}

impl FromColumns for u64 {
    fn shape() -> Shape {
        Shape::Integer
    }

    #[allow(clippy::cast_sign_loss)]
    fn from_datum(datum: Datum) -> Result<Self> {
        datum.into_integer().map(|value| value as u64)
    }
}

macro_rules! impl_narrow_integer {
    ($($ty:ty),*) => {
        $(
            impl FromColumns for $ty {
                fn shape() -> Shape {
                    Shape::Integer
                }

                fn from_datum(datum: Datum) -> Result<Self> {
                    let value = datum.into_integer()?;
                    <$ty>::try_from(value).map_err(|_| {
                        SqlMarshalError::TypeMismatch(format!(
                            "{value} does not fit in {}",
                            stringify!($ty)
                        ))
                    })
                }
            }
        )*
    };
}

impl_narrow_integer!(i32, u32);

impl FromColumns for bool {
    fn shape() -> Shape {
        Shape::Integer
    }

    fn from_datum(datum: Datum) -> Result<Self> {
        datum.into_integer().map(|value| value != 0)
    }
}

impl FromColumns for String {
    fn shape() -> Shape {
        Shape::Bytes { element_size: 1 }
    }

    fn from_datum(datum: Datum) -> Result<Self> {
        String::from_utf8(datum.into_bytes()?)
            .map_err(|e| SqlMarshalError::TypeMismatch(format!("text is not valid UTF-8: {e}")))
    }
}

impl<T: Element> FromColumns for Vec<T> {
    fn shape() -> Shape {
        Shape::Bytes {
            element_size: T::SIZE,
        }
    }

    fn from_datum(datum: Datum) -> Result<Self> {
        let bytes = datum.into_bytes()?;
        decode_elements(&bytes).ok_or(SqlMarshalError::LengthMismatch {
            len: bytes.len(),
            element_size: T::SIZE,
        })
    }
}

impl<A: FromColumns, B: FromColumns> FromColumns for (A, B) {
    fn shape() -> Shape {
        Shape::Pair(Box::new(A::shape()), Box::new(B::shape()))
    }

    fn from_datum(datum: Datum) -> Result<Self> {
        let (first, second) = datum.into_pair()?;
        Ok((A::from_datum(first)?, B::from_datum(second)?))
    }
}

macro_rules! impl_from_columns_fields {
    ($count:expr; $($name:ident),+) => {
        impl<$($name: FromColumns),+> FromColumns for ($($name,)+) {
            fn shape() -> Shape {
                Shape::Fields(vec![$($name::shape()),+])
            }

            fn from_datum(datum: Datum) -> Result<Self> {
                let mut fields = datum.into_fields($count)?.into_iter();
                Ok(($(
                    match fields.next() {
                        Some(field) => $name::from_datum(field)?,
                        None => {
                            return Err(SqlMarshalError::TypeMismatch(
                                "ran out of fields".into(),
                            ))
                        }
                    },
                )+))
            }
        }
    };
}

impl_from_columns_fields!(1; A);
impl_from_columns_fields!(3; A, B, C);
impl_from_columns_fields!(4; A, B, C, D);
impl_from_columns_fields!(5; A, B, C, D, E);
impl_from_columns_fields!(6; A, B, C, D, E, F);
impl_from_columns_fields!(7; A, B, C, D, E, F, G);
impl_from_columns_fields!(8; A, B, C, D, E, F, G, H);
