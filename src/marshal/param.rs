use std::borrow::Cow;

use super::element::{Element, Elements};

/// A parameter value reduced to the shapes the binder understands.
///
/// ```rust
/// use sql_marshal::prelude::*;
///
/// let row = (7_i64, "seven");
/// assert_eq!(
///     row.to_param(),
///     Param::Pair(
///         Box::new(Param::Integer(7)),
///         Box::new(Param::Text("seven".into())),
///     )
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Param<'a> {
    /// One integer bind.
    Integer(i64),
    /// One raw byte bind.
    Bytes(Cow<'a, [u8]>),
    /// One byte bind of fixed-size elements, encoded when bound so the size limit
    /// is checked first.
    Elements(Elements<'a>),
    /// One bind of UTF-8 bytes, stored with the text storage class so it compares
    /// equal to TEXT columns. Same size limit as [`Param::Bytes`].
    Text(Cow<'a, str>),
    /// First value fully, then the second.
    Pair(Box<Param<'a>>, Box<Param<'a>>),
    /// Each field in order, left to right.
    Fields(Vec<Param<'a>>),
}

impl Param<'_> {
    /// Number of positional placeholders this value occupies.
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            Param::Integer(_) | Param::Bytes(_) | Param::Elements(_) | Param::Text(_) => 1,
            Param::Pair(first, second) => first.width() + second.width(),
            Param::Fields(fields) => fields.iter().map(Param::width).sum(),
        }
    }
}

/// Types that can be bound as statement parameters.
pub trait ToParam {
    fn to_param(&self) -> Param<'_>;
}

impl ToParam for Param<'_> {
    fn to_param(&self) -> Param<'_> {
        self.clone()
    }
}

impl<T: ToParam + ?Sized> ToParam for &T {
    fn to_param(&self) -> Param<'_> {
        (**self).to_param()
    }
}

impl ToParam for i64 {
    fn to_param(&self) -> Param<'_> {
        Param::Integer(*self)
    }
}

impl ToParam for i32 {
    fn to_param(&self) -> Param<'_> {
        Param::Integer(i64::from(*self))
    }
}

impl ToParam for u32 {
    fn to_param(&self) -> Param<'_> {
        Param::Integer(i64::from(*self))
    }
}

impl ToParam for u64 {
    // Bit pattern is kept; values above i64::MAX come back intact through `u64`.
    #[allow(clippy::cast_possible_wrap)]
    fn to_param(&self) -> Param<'_> {
        Param::Integer(*self as i64)
    }
}

impl ToParam for bool {
    fn to_param(&self) -> Param<'_> {
        Param::Integer(i64::from(*self))
    }
}

impl ToParam for str {
    fn to_param(&self) -> Param<'_> {
        Param::Text(Cow::Borrowed(self))
    }
}

impl ToParam for String {
    fn to_param(&self) -> Param<'_> {
        self.as_str().to_param()
    }
}

impl<T: Element> ToParam for [T] {
    fn to_param(&self) -> Param<'_> {
        Param::Elements(Elements::new(self))
    }
}

impl<T: Element> ToParam for Vec<T> {
    fn to_param(&self) -> Param<'_> {
        self.as_slice().to_param()
    }
}

impl ToParam for () {
    fn to_param(&self) -> Param<'_> {
        Param::Fields(Vec::new())
    }
}

impl<A: ToParam, B: ToParam> ToParam for (A, B) {
    fn to_param(&self) -> Param<'_> {
        Param::Pair(Box::new(self.0.to_param()), Box::new(self.1.to_param()))
    }
}

macro_rules! impl_to_param_fields {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: ToParam),+> ToParam for ($($name,)+) {
            fn to_param(&self) -> Param<'_> {
                Param::Fields(vec![$(self.$idx.to_param()),+])
            }
        }
    };
}

impl_to_param_fields!(A: 0);
impl_to_param_fields!(A: 0, B: 1, C: 2);
impl_to_param_fields!(A: 0, B: 1, C: 2, D: 3);
impl_to_param_fields!(A: 0, B: 1, C: 2, D: 3, E: 4);
impl_to_param_fields!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
impl_to_param_fields!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
impl_to_param_fields!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);
