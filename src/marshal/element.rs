use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Fixed-size value that can be packed into a blob and recovered from it.
///
/// Elements are stored little-endian, back to back, with no padding.
pub trait Element: Copy + Send + Sync {
    const SIZE: usize;

    fn put_le(self, out: &mut Vec<u8>);

    /// Decode one element from a chunk of exactly [`Element::SIZE`] bytes.
    fn from_le(chunk: &[u8]) -> Option<Self>;

    fn encode_slice(items: &[Self]) -> Cow<'_, [u8]> {
        let mut out = Vec::with_capacity(items.len() * Self::SIZE);
        for item in items {
            item.put_le(&mut out);
        }
        Cow::Owned(out)
    }
}

impl Element for u8 {
    const SIZE: usize = 1;

    fn put_le(self, out: &mut Vec<u8>) {
        out.push(self);
    }

    fn from_le(chunk: &[u8]) -> Option<Self> {
        chunk.first().copied()
    }

    fn encode_slice(items: &[Self]) -> Cow<'_, [u8]> {
        Cow::Borrowed(items)
    }
}

macro_rules! impl_numeric_element {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Element for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn put_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn from_le(chunk: &[u8]) -> Option<Self> {
                    chunk.try_into().ok().map(<$ty>::from_le_bytes)
                }
            }
        )*
    };
}

impl_numeric_element!(i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// A borrowed element slice whose blob is only produced when it is bound.
///
/// The byte length is known up front, so an oversized slice is rejected without
/// being copied.
#[derive(Clone)]
pub struct Elements<'a> {
    byte_len: usize,
    encode: Arc<dyn Fn() -> Cow<'a, [u8]> + Send + Sync + 'a>,
}

impl<'a> Elements<'a> {
    pub fn new<T: Element>(items: &'a [T]) -> Self {
        Self {
            byte_len: items.len() * T::SIZE,
            encode: Arc::new(move || T::encode_slice(items)),
        }
    }

    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    #[must_use]
    pub fn encode(&self) -> Cow<'a, [u8]> {
        (self.encode)()
    }
}

impl fmt::Debug for Elements<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Elements")
            .field("byte_len", &self.byte_len)
            .finish_non_exhaustive()
    }
}

impl PartialEq for Elements<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.byte_len == other.byte_len && self.encode() == other.encode()
    }
}

/// Split `bytes` into elements; `None` if the length is not a whole number of them.
pub(crate) fn decode_elements<T: Element>(bytes: &[u8]) -> Option<Vec<T>> {
    let chunks = bytes.chunks_exact(T::SIZE);
    if !chunks.remainder().is_empty() {
        return None;
    }
    chunks.map(T::from_le).collect()
}
