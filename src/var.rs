//! Variable-length side data for recorded calls.
//!
//! A `Call` is a fixed-size value, so anything whose length isn't known in
//! advance (attribute lists, function names) lives in a separate
//! variable-length stream, and the `Call` holds a `Var` giving its byte offset
//! there.
//!
//! Sequences are written as a `usize` length, followed by the elements. The
//! length and the elements are each preceded by padding to align them for
//! their type. Alignment is relative to the start of the stream, not to any
//! address, so the data can be read back from a plain `Vec<u8>` wherever the
//! allocator happened to put it.
//!
//! Strings are written as sequences of UTF-8 bytes.
//!
//! Values are written in their in-memory form, so recordings are specific to a
//! particular endianness and word size.

use crate::raw;

use std::marker::PhantomData;
use std::{fmt, io, mem};

/// Placeholder for a `T` value stored in the variable-length section.
///
/// `T` is the serialization form, from this module: `Seq<i32>`, `Str`, and so
/// on.
pub struct Var<T> {
    offset: usize,
    _referent: PhantomData<*const T>,
}

impl<T> Var<T> {
    pub fn new(offset: usize) -> Var<T> {
        Var {
            offset,
            _referent: PhantomData,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Deserialize the value this `Var` refers to from `variable`.
    pub fn get<'b, U>(self, variable: &'b [u8]) -> Result<U, DeserializeError>
    where
        T: DeserializeAs<'b, U>,
    {
        let mut reader = Reader::at(variable, self.offset)?;
        <T as DeserializeAs<'b, U>>::deserialize(&mut reader)
    }
}

// We can't derive `Copy`, `Clone`, or `Debug`, because of the `PhantomData`:
// https://github.com/rust-lang/rust/issues/26925
impl<T> Clone for Var<T> {
    fn clone(&self) -> Var<T> {
        Var::new(self.offset)
    }
}

impl<T> Copy for Var<T> {}

impl<T> fmt::Debug for Var<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "Var at {}", self.offset)
    }
}

/// A sequence of values: slices, vectors.
///
/// A `Seq` is serialized as a `usize` length, followed by that many values.
pub struct Seq<T> {
    _referent: PhantomData<*const T>,
}

/// A UTF-8 string.
///
/// A `Str` is serialized as a `usize` length, followed by the UTF-8 form of the
/// string.
pub struct Str;

/// An `io::Write` stream that knows how many bytes have been written to it.
pub trait MarkedWrite: io::Write {
    /// Return the current byte offset in the stream.
    fn mark(&self) -> usize;

    /// Write padding bytes as needed to align the stream for a `T`.
    fn align_for<T>(&mut self) -> io::Result<()> {
        let padding_length = padding_for::<T>(self.mark());
        if padding_length > 0 {
            static PADDING: [u8; 64] = [b'P'; 64];
            assert!(padding_length <= PADDING.len());
            self.write_all(&PADDING[..padding_length])?;
        }
        Ok(())
    }

    /// Write the contents of `slice`, preceded by padding as needed to align
    /// it for elements of type `T`. Return its start position, after any
    /// padding.
    fn write_aligned_slice<T: raw::Simple>(&mut self, slice: &[T]) -> io::Result<usize> {
        self.align_for::<T>()?;
        let pos = self.mark();
        self.write_all(raw::slice_as_bytes(slice))?;
        Ok(pos)
    }
}

/// An in-memory variable-length stream.
impl MarkedWrite for Vec<u8> {
    fn mark(&self) -> usize {
        self.len()
    }
}

fn padding_for<T>(pos: usize) -> usize {
    pos.wrapping_neg() & (mem::align_of::<T>() - 1)
}

/// A type that can be written to the variable-length stream.
pub trait Serialize {
    /// The form in which `Self` values are serialized, using the types from
    /// this module.
    type Form;

    /// Serialize `self`. On success, return the byte offset it was written to
    /// in `stream`.
    fn serialize<S: MarkedWrite>(&self, stream: &mut S) -> io::Result<usize>;
}

impl<T: raw::Simple> Serialize for [T] {
    type Form = Seq<T>;
    fn serialize<S: MarkedWrite>(&self, stream: &mut S) -> io::Result<usize> {
        let pos = stream.write_aligned_slice(&[self.len()])?;
        stream.write_aligned_slice(self)?;
        Ok(pos)
    }
}

impl<T: raw::Simple> Serialize for Vec<T> {
    type Form = Seq<T>;
    fn serialize<S: MarkedWrite>(&self, stream: &mut S) -> io::Result<usize> {
        self[..].serialize(stream)
    }
}

impl Serialize for str {
    type Form = Str;
    fn serialize<S: MarkedWrite>(&self, stream: &mut S) -> io::Result<usize> {
        self.as_bytes().serialize(stream)
    }
}

/// References are transparent to serialization: `&T` is serialized just like `T`.
impl<T: Serialize + ?Sized> Serialize for &T {
    type Form = T::Form;
    fn serialize<S: MarkedWrite>(&self, stream: &mut S) -> io::Result<usize> {
        (**self).serialize(stream)
    }
}

/// Serialize `value` and return a `Var` referring to it.
pub fn write_var<T, S>(value: &T, stream: &mut S) -> io::Result<Var<T::Form>>
where
    T: Serialize + ?Sized,
    S: MarkedWrite,
{
    Ok(Var::new(value.serialize(stream)?))
}

/// A cursor over the variable-length data.
///
/// The cursor remembers its absolute position, so that it can respect the
/// stream-relative alignment the data was written with.
pub struct Reader<'b> {
    data: &'b [u8],
    pos: usize,
}

impl<'b> Reader<'b> {
    pub fn at(data: &'b [u8], offset: usize) -> Result<Reader<'b>, DeserializeError> {
        if offset > data.len() {
            return Err(DeserializeError::OffsetOutOfRange(offset));
        }
        Ok(Reader { data, pos: offset })
    }

    /// Skip padding so that the cursor is aligned for a `T`.
    fn align_for<T>(&mut self) {
        self.pos = self.pos.saturating_add(padding_for::<T>(self.pos));
    }

    /// Borrow the next `len` bytes, and advance past them.
    fn take(&mut self, len: usize) -> Result<&'b [u8], DeserializeError> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or(DeserializeError::UnexpectedEof)?;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(DeserializeError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    /// Borrow `count` aligned values of type `T`, as bytes.
    fn take_aligned<T>(&mut self, count: usize) -> Result<&'b [u8], DeserializeError> {
        let len = count
            .checked_mul(mem::size_of::<T>())
            .ok_or(DeserializeError::UnexpectedEof)?;
        self.align_for::<T>();
        self.take(len)
    }
}

/// A serialized form that can be deserialized to produce a value of type `T`.
///
/// This trait gets implemented for forms like `Seq<T>` or `Str`. The actual
/// Rust type that gets produced is the trait's type parameter, so `Seq<u8>`
/// can produce both `&[u8]` and `Vec<u8>`.
///
/// The `'b` lifetime is that of the buffer we deserialize from, so
/// implementations can return types that borrow from it.
pub trait DeserializeAs<'b, T> {
    fn deserialize(reader: &mut Reader<'b>) -> Result<T, DeserializeError>;
}

/// Integer types, for which every bit pattern is a valid value.
macro_rules! implement_deserialize_for_integers {
    ( $( $type:ty ),* ) => {
        $(
            impl<'b> DeserializeAs<'b, $type> for $type {
                fn deserialize(reader: &mut Reader<'b>) -> Result<$type, DeserializeError> {
                    let bytes = reader.take_aligned::<$type>(1)?;
                    // Safe because every bit pattern is a valid integer.
                    Ok(unsafe { raw::read_unaligned(bytes) })
                }
            }

            impl<'b> DeserializeAs<'b, Vec<$type>> for Seq<$type> {
                fn deserialize(reader: &mut Reader<'b>) -> Result<Vec<$type>, DeserializeError> {
                    let len = usize::deserialize(reader)?;
                    let bytes = reader.take_aligned::<$type>(len)?;
                    Ok(bytes
                        .chunks_exact(mem::size_of::<$type>())
                        .map(|chunk| unsafe { raw::read_unaligned(chunk) })
                        .collect())
                }
            }
        )*
    }
}

implement_deserialize_for_integers!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize);

impl<'b> DeserializeAs<'b, &'b [u8]> for Seq<u8> {
    fn deserialize(reader: &mut Reader<'b>) -> Result<&'b [u8], DeserializeError> {
        let len = usize::deserialize(reader)?;
        reader.take(len)
    }
}

impl<'b> DeserializeAs<'b, &'b str> for Str {
    fn deserialize(reader: &mut Reader<'b>) -> Result<&'b str, DeserializeError> {
        let bytes = <Seq<u8> as DeserializeAs<'b, &'b [u8]>>::deserialize(reader)?;
        std::str::from_utf8(bytes).map_err(|_| DeserializeError::BadUtf8)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeserializeError {
    #[error("recorded call argument data truncated")]
    UnexpectedEof,
    #[error("recorded call argument data included bad UTF-8")]
    BadUtf8,
    #[error("recorded call argument offset {0} is past the end of the variable-length data")]
    OffsetOutOfRange(usize),
}

#[test]
fn test_seq_alignment() {
    let mut stream: Vec<u8> = vec![];
    let name = write_var("glXQueryVersion", &mut stream).unwrap();
    let attribs = write_var(&[0x2091_i32, 3, 0x2092, 2, 0][..], &mut stream).unwrap();

    // The attribute list's length must land on a `usize` boundary, even though
    // the string before it had an odd length.
    assert_eq!(attribs.offset() % mem::align_of::<usize>(), 0);

    let name: &str = name.get(&stream).unwrap();
    assert_eq!(name, "glXQueryVersion");
    let attribs: Vec<i32> = attribs.get(&stream).unwrap();
    assert_eq!(attribs, vec![0x2091, 3, 0x2092, 2, 0]);
}

#[test]
fn test_truncated() {
    let mut stream: Vec<u8> = vec![];
    let attribs = write_var(&[1_i32, 2, 3][..], &mut stream).unwrap();
    stream.truncate(stream.len() - 1);
    let result: Result<Vec<i32>, _> = attribs.get(&stream);
    assert_eq!(result, Err(DeserializeError::UnexpectedEof));

    let past_end: Var<Str> = Var::new(stream.len() + 1);
    let result: Result<&str, _> = past_end.get(&stream);
    assert_eq!(result, Err(DeserializeError::OffsetOutOfRange(stream.len() + 1)));
}
