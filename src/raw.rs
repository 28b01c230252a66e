//! Utilities for raw pointer and slice handling.

/// A marker trait for types that can be treated as blocks of bytes.
///
/// When `Self` implements `Simple`, that means:
///
/// - It can be written out in one process and read back in a new process on
///   the same kind of machine simply by copying the bytes.
///
/// - Its lifetime is `'static`.
///
/// This is stricter than `Copy + 'static`: for example, `&'static str` meets
/// those bounds and yet is not `Simple`, because an address is only meaningful
/// in the address space in which it's created.
pub unsafe trait Simple: Copy {}

/// Given a reference, return a byte slice of the value's representation.
pub fn as_bytes<T: Simple>(r: &T) -> &[u8] {
    slice_as_bytes(std::slice::from_ref(r))
}

/// Given a slice, return a byte slice of its contents.
pub fn slice_as_bytes<T: Simple>(r: &[T]) -> &[u8] {
    // Safe because `T::Simple`.
    unsafe { std::slice::from_raw_parts(r.as_ptr() as *const u8, std::mem::size_of_val(r)) }
}

/// Read a `T` out of the front of `bytes`, which need not be aligned.
///
/// Safety: the first `size_of::<T>()` bytes must hold a valid `T`. `Simple`
/// doesn't imply that every bit pattern is a valid `T` (think `bool`, or an
/// enum's discriminant), so the caller has to check that first.
pub unsafe fn read_unaligned<T: Simple>(bytes: &[u8]) -> T {
    assert!(bytes.len() >= std::mem::size_of::<T>());
    std::ptr::read_unaligned(bytes.as_ptr() as *const T)
}

macro_rules! implement_simple {
    ( $( $type:ty ),* ) => {
        $(
            unsafe impl Simple for $type { }
        )*
    }
}

implement_simple!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64);

#[test]
fn test_read_unaligned() {
    let value: u32 = 0x1234_5678;
    let mut bytes = vec![0_u8];
    bytes.extend_from_slice(as_bytes(&value));
    let back: u32 = unsafe { read_unaligned(&bytes[1..]) };
    assert_eq!(back, value);
}
