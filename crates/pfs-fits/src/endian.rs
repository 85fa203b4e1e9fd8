//! Big-endian byte conversion for FITS data.
//!
//! FITS stores all binary data in big-endian (most-significant byte first)
//! format. [`BeElement`] covers the numeric element types that appear in
//! binary-table cells and heap arrays. Whole arrays are converted in bulk: the
//! values are reinterpreted as bytes with `bytemuck` and swapped in place,
//! rather than being written one element at a time.

use bytemuck::Pod;

/// A numeric type that can be stored in a FITS binary table.
pub trait BeElement: Pod + PartialEq + core::fmt::Debug {
    /// Width of one element in bytes.
    const SIZE: usize;

    /// Read one value from the first `SIZE` bytes of `buf`.
    fn read_be(buf: &[u8]) -> Self;

    /// Write one value into the first `SIZE` bytes of `buf`.
    fn write_be(self, buf: &mut [u8]);
}

macro_rules! impl_be_element {
    ($t:ty, $size:expr) => {
        impl BeElement for $t {
            const SIZE: usize = $size;

            #[inline]
            fn read_be(buf: &[u8]) -> Self {
                let mut bytes = [0u8; $size];
                bytes.copy_from_slice(&buf[..$size]);
                <$t>::from_be_bytes(bytes)
            }

            #[inline]
            fn write_be(self, buf: &mut [u8]) {
                buf[..$size].copy_from_slice(&self.to_be_bytes());
            }
        }
    };
}

impl_be_element!(i16, 2);
impl_be_element!(i32, 4);
impl_be_element!(i64, 8);
impl_be_element!(f32, 4);
impl_be_element!(f64, 8);

/// Swap every `size`-byte element of `buf` between big-endian and native
/// order. The operation is its own inverse; on big-endian targets it does
/// nothing.
///
/// # Panics
/// Panics if `buf.len()` is not a multiple of `size`.
pub fn swap_be_native(buf: &mut [u8], size: usize) {
    assert!(
        size > 0 && buf.len() % size == 0,
        "buffer length must be a multiple of {size}"
    );
    if cfg!(target_endian = "little") {
        for chunk in buf.chunks_exact_mut(size) {
            chunk.reverse();
        }
    }
}

/// Append `values` to `out` as big-endian bytes.
pub fn extend_be<T: BeElement>(out: &mut Vec<u8>, values: &[T]) {
    let start = out.len();
    out.extend_from_slice(bytemuck::cast_slice(values));
    swap_be_native(&mut out[start..], T::SIZE);
}

/// Decode a run of big-endian bytes into native values.
///
/// # Panics
/// Panics if `bytes.len()` is not a multiple of `T::SIZE`.
pub fn decode_be<T: BeElement>(bytes: &[u8]) -> Vec<T> {
    let mut native = bytes.to_vec();
    swap_be_native(&mut native, T::SIZE);
    bytemuck::pod_collect_to_vec(&native)
}
