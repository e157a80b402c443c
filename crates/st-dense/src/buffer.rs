// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Buffer descriptors exchanged with binding layers.
//!
//! A [`BufferDescriptor`] is the metadata bundle a foreign runtime needs to
//! interpret a memory region as a multi-dimensional array: data pointer,
//! element size, format tag, shape, and byte strides. It never owns the
//! memory it points at. Descriptors exported by [`crate::DenseMatrix`] borrow
//! the matrix, so the storage cannot be mutated through the matrix, moved, or
//! freed while the descriptor is alive.

use std::marker::PhantomData;
use std::mem;

/// Format tag exported by [`crate::DenseMatrix::buffer_descriptor`].
pub const FLOAT32_FORMAT: &str = "float32";

/// Python `struct` code for a native 32-bit float, as used by the buffer protocol.
pub const FLOAT32_STRUCT_CODE: &str = "f";

pub(crate) const ELEMENT_SIZE: usize = mem::size_of::<f32>();

/// Returns `true` when `tag` names a 32-bit IEEE-754 float in host byte order.
pub fn is_float32_format(tag: &str) -> bool {
    match tag {
        FLOAT32_FORMAT | FLOAT32_STRUCT_CODE | "@f" | "=f" => true,
        "<f" => cfg!(target_endian = "little"),
        ">f" | "!f" => cfg!(target_endian = "big"),
        _ => false,
    }
}

/// Non-owning view of a strided memory region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferDescriptor<'a> {
    ptr: *const u8,
    element_size: usize,
    format: &'a str,
    shape: Vec<usize>,
    strides: Vec<isize>,
    readonly: bool,
    _marker: PhantomData<&'a [u8]>,
}

impl<'a> BufferDescriptor<'a> {
    /// Describe a foreign buffer.
    ///
    /// `strides` are in bytes, one per dimension; an empty vector means the
    /// buffer is C-contiguous.
    ///
    /// # Safety
    /// For the lifetime `'a`, every element addressed by `shape` and `strides`
    /// (or, for empty `strides`, the `product(shape) * element_size` bytes
    /// starting at `ptr`) must be readable and must not be written through
    /// any other path. `ptr` may only be null when `shape` contains a zero.
    pub unsafe fn from_raw_parts(
        ptr: *const u8,
        element_size: usize,
        format: &'a str,
        shape: Vec<usize>,
        strides: Vec<isize>,
        readonly: bool,
    ) -> Self {
        Self {
            ptr,
            element_size,
            format,
            shape,
            strides,
            readonly,
            _marker: PhantomData,
        }
    }

    /// Descriptor for dense row-major `f32` storage owned by a matrix.
    ///
    /// Matrix construction guarantees `cols * 4` fits in `isize`.
    pub(crate) fn dense_f32(ptr: *const f32, rows: usize, cols: usize, readonly: bool) -> Self {
        Self {
            ptr: ptr.cast(),
            element_size: ELEMENT_SIZE,
            format: FLOAT32_FORMAT,
            shape: vec![rows, cols],
            strides: vec![(cols * ELEMENT_SIZE) as isize, ELEMENT_SIZE as isize],
            readonly,
            _marker: PhantomData,
        }
    }

    /// Start of the described region.
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr
    }

    /// Mutable start of the region, or `None` for read-only descriptors.
    pub fn as_mut_ptr(&self) -> Option<*mut u8> {
        (!self.readonly).then_some(self.ptr as *mut u8)
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    pub fn format(&self) -> &'a str {
        self.format
    }

    /// Number of dimensions, i.e. `shape().len()`.
    pub fn dimensionality(&self) -> usize {
        self.shape.len()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Byte strides; empty when the producer declared a C-contiguous buffer.
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Whether the format tag and element size describe a host-order `f32`.
    pub fn is_float32(&self) -> bool {
        self.element_size == ELEMENT_SIZE && is_float32_format(self.format)
    }

    /// Total number of elements, or `None` on overflow.
    pub fn volume(&self) -> Option<usize> {
        self.shape
            .iter()
            .try_fold(1usize, |acc, &extent| acc.checked_mul(extent))
    }

    /// Byte strides of a C-contiguous buffer with this shape and element size.
    pub fn contiguous_strides(&self) -> Vec<isize> {
        let mut strides = vec![0isize; self.shape.len()];
        let mut step = self.element_size as isize;
        for (stride, &extent) in strides.iter_mut().zip(&self.shape).rev() {
            *stride = step;
            step = step.saturating_mul(extent.max(1) as isize);
        }
        strides
    }

    /// Returns `true` when elements are laid out C-contiguously.
    ///
    /// Strides along axes of extent one are ignored, and empty buffers are
    /// trivially contiguous.
    pub fn is_c_contiguous(&self) -> bool {
        if self.strides.is_empty() || self.shape.contains(&0) {
            return true;
        }
        if self.strides.len() != self.shape.len() {
            return false;
        }
        self.contiguous_strides()
            .iter()
            .zip(&self.strides)
            .zip(&self.shape)
            .all(|((expected, actual), &extent)| extent == 1 || expected == actual)
    }
}
