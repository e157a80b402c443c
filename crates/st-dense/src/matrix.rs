// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::mem;
use std::ops::{Index, IndexMut};
use std::ptr;

use spiral_config::StridePolicy;

use crate::buffer::{BufferDescriptor, ELEMENT_SIZE};
use crate::error::{MatrixError, MatrixResult};
use crate::observability::{emit_matrix_event, MatrixEventKind};

/// Element count of a `rows x cols` matrix.
///
/// Exported descriptors carry `isize` byte strides, so the byte extent of
/// each axis and of the whole block must fit in `isize`, even when the
/// matrix holds no elements.
fn volume(rows: usize, cols: usize) -> MatrixResult<usize> {
    let overflow = || MatrixError::VolumeOverflow { rows, cols };
    let len = rows.checked_mul(cols).ok_or_else(overflow)?;
    let addressable = |count: usize| {
        count
            .checked_mul(ELEMENT_SIZE)
            .is_some_and(|bytes| isize::try_from(bytes).is_ok())
    };
    if addressable(rows) && addressable(cols) && addressable(len) {
        Ok(len)
    } else {
        Err(overflow())
    }
}

/// A dense 2D `f32` matrix stored contiguously in row-major order.
///
/// Element `(i, j)` lives at offset `i * cols + j`. The matrix exclusively
/// owns its storage: [`Clone`] deep copies it, [`DenseMatrix::take`] moves it
/// out and leaves `0x0` behind, and dropping releases it. A matrix with a
/// zero dimension holds no storage.
#[derive(Debug, Default, PartialEq)]
pub struct DenseMatrix {
    rows: usize,
    cols: usize,
    elements: Vec<f32>,
}

impl DenseMatrix {
    fn assemble(rows: usize, cols: usize, elements: Vec<f32>, kind: MatrixEventKind) -> Self {
        debug_assert_eq!(elements.len(), rows * cols);
        emit_matrix_event(kind, rows, cols);
        Self {
            rows,
            cols,
            elements,
        }
    }

    /// Create a matrix filled with zeros.
    ///
    /// # Panics
    /// Panics when the shape is not addressable (see [`DenseMatrix::try_zeros`]).
    /// Allocation failure aborts.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        match Self::try_zeros(rows, cols) {
            Ok(matrix) => matrix,
            Err(err) => panic!("{err}"),
        }
    }

    /// Create a matrix filled with zeros, failing with
    /// [`MatrixError::VolumeOverflow`] when `rows * cols` overflows or the
    /// shape spans more than `isize::MAX` bytes along some axis.
    pub fn try_zeros(rows: usize, cols: usize) -> MatrixResult<Self> {
        let len = volume(rows, cols)?;
        Ok(Self::assemble(
            rows,
            cols,
            vec![0.0; len],
            MatrixEventKind::Created,
        ))
    }

    /// Alias for [`DenseMatrix::zeros`].
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::zeros(rows, cols)
    }

    /// Create a matrix from row-major data. `data` must hold exactly
    /// `rows * cols` elements.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> MatrixResult<Self> {
        let expected = volume(rows, cols)?;
        if data.len() != expected {
            return Err(MatrixError::DataLength {
                expected,
                got: data.len(),
            });
        }
        Ok(Self::assemble(rows, cols, data, MatrixEventKind::Created))
    }

    /// Construct a matrix by applying a generator function to each coordinate.
    pub fn from_fn<F>(rows: usize, cols: usize, mut f: F) -> MatrixResult<Self>
    where
        F: FnMut(usize, usize) -> f32,
    {
        let mut elements = Vec::with_capacity(volume(rows, cols)?);
        for r in 0..rows {
            for c in 0..cols {
                elements.push(f(r, c));
            }
        }
        Ok(Self::assemble(rows, cols, elements, MatrixEventKind::Created))
    }

    /// Build a matrix by copying a foreign buffer, using the stride policy
    /// from [`spiral_config::interop`].
    pub fn from_buffer(descriptor: &BufferDescriptor<'_>) -> MatrixResult<Self> {
        Self::from_buffer_with_policy(descriptor, spiral_config::interop::stride_policy())
    }

    /// Build a matrix by copying a foreign buffer.
    ///
    /// The descriptor must describe a two-dimensional host-order `f32` array;
    /// anything else fails with [`MatrixError::IncompatibleFormat`] before any
    /// allocation happens. Contiguous row-major buffers are copied verbatim.
    /// Other layouts are rejected under [`StridePolicy::Contiguous`] and
    /// gathered element by element under [`StridePolicy::Strided`].
    pub fn from_buffer_with_policy(
        descriptor: &BufferDescriptor<'_>,
        policy: StridePolicy,
    ) -> MatrixResult<Self> {
        let (rows, cols) = match (descriptor.is_float32(), descriptor.shape()) {
            (true, &[rows, cols]) => (rows, cols),
            _ => {
                return Err(MatrixError::IncompatibleFormat {
                    format: descriptor.format().to_string(),
                    element_size: descriptor.element_size(),
                    ndim: descriptor.dimensionality(),
                })
            }
        };

        let strides = descriptor.strides();
        if !strides.is_empty() && strides.len() != 2 {
            return Err(MatrixError::StrideCount {
                ndim: 2,
                strides: strides.len(),
            });
        }

        let len = volume(rows, cols)?;
        if len == 0 {
            return Ok(Self::assemble(
                rows,
                cols,
                Vec::new(),
                MatrixEventKind::Imported,
            ));
        }

        let src = descriptor.as_ptr();
        if src.is_null() {
            return Err(MatrixError::NullBuffer { rows, cols });
        }

        let contiguous = descriptor.is_c_contiguous();
        let elements = if contiguous {
            // SAFETY: the descriptor contract guarantees `len` readable elements at `src`.
            unsafe { copy_contiguous(src, len) }
        } else {
            match policy {
                StridePolicy::Contiguous => {
                    return Err(MatrixError::NonContiguous {
                        strides: strides.to_vec(),
                        rows,
                        cols,
                    })
                }
                // SAFETY: the descriptor contract guarantees every strided element is readable.
                StridePolicy::Strided => unsafe {
                    copy_strided(src, rows, cols, strides[0], strides[1])?
                },
            }
        };

        tracing::debug!(rows, cols, contiguous, %policy, "imported foreign f32 buffer");
        Ok(Self::assemble(
            rows,
            cols,
            elements,
            MatrixEventKind::Imported,
        ))
    }

    /// Move the storage out, leaving this matrix empty (`0x0`).
    pub fn take(&mut self) -> DenseMatrix {
        let moved = mem::take(self);
        emit_matrix_event(MatrixEventKind::Moved, moved.rows, moved.cols);
        moved
    }

    /// Move `source` into this matrix, releasing the storage held before.
    /// `source` is left empty (`0x0`).
    ///
    /// The borrow checker rules out `source` aliasing `self`, so there is no
    /// self-assignment case to guard.
    pub fn move_from(&mut self, source: &mut DenseMatrix) {
        let incoming = mem::take(source);
        let (rows, cols) = incoming.shape();
        *self = incoming;
        emit_matrix_event(MatrixEventKind::MoveAssigned, rows, cols);
    }

    /// Consume the matrix and return its row-major elements.
    pub fn into_vec(mut self) -> Vec<f32> {
        emit_matrix_event(MatrixEventKind::Moved, self.rows, self.cols);
        mem::take(&mut self.elements)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Returns the `(rows, cols)` pair of the matrix.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Total number of elements stored in the matrix.
    #[inline]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.elements
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.elements
    }

    /// Pointer to the first element. Dangling (but non-null) for empty matrices.
    pub fn as_ptr(&self) -> *const f32 {
        self.elements.as_ptr()
    }

    /// Read element `(row, col)`.
    ///
    /// Bounds are the caller's responsibility; use [`DenseMatrix::try_get`]
    /// at API boundaries.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        debug_assert!(row < self.rows && col < self.cols);
        self.elements[row * self.cols + col]
    }

    /// Write element `(row, col)`. Bounds are the caller's responsibility.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        debug_assert!(row < self.rows && col < self.cols);
        self.elements[row * self.cols + col] = value;
    }

    /// Export a read-only descriptor aliasing the storage.
    ///
    /// The descriptor borrows the matrix: the pointer stays valid exactly as
    /// long as the borrow does. No data is copied.
    pub fn buffer_descriptor(&self) -> BufferDescriptor<'_> {
        emit_matrix_event(MatrixEventKind::Exported, self.rows, self.cols);
        BufferDescriptor::dense_f32(self.elements.as_ptr(), self.rows, self.cols, true)
    }

    /// Export a writable descriptor aliasing the storage.
    pub fn buffer_descriptor_mut(&mut self) -> BufferDescriptor<'_> {
        emit_matrix_event(MatrixEventKind::Exported, self.rows, self.cols);
        BufferDescriptor::dense_f32(self.elements.as_mut_ptr(), self.rows, self.cols, false)
    }
}

// Checked access for binding layers. Failures leave the matrix untouched.
impl DenseMatrix {
    fn checked_offset(&self, row: usize, col: usize) -> MatrixResult<usize> {
        if row >= self.rows || col >= self.cols {
            return Err(MatrixError::IndexOutOfBounds {
                row,
                col,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(row * self.cols + col)
    }

    /// Read element `(row, col)`, failing with [`MatrixError::IndexOutOfBounds`].
    pub fn try_get(&self, row: usize, col: usize) -> MatrixResult<f32> {
        let offset = self.checked_offset(row, col)?;
        Ok(self.elements[offset])
    }

    /// Write element `(row, col)`, failing with [`MatrixError::IndexOutOfBounds`].
    pub fn try_set(&mut self, row: usize, col: usize, value: f32) -> MatrixResult<()> {
        let offset = self.checked_offset(row, col)?;
        self.elements[offset] = value;
        Ok(())
    }
}

impl Clone for DenseMatrix {
    fn clone(&self) -> Self {
        emit_matrix_event(MatrixEventKind::Copied, self.rows, self.cols);
        Self {
            rows: self.rows,
            cols: self.cols,
            elements: self.elements.clone(),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        if self.elements.len() == source.elements.len() {
            self.elements.copy_from_slice(&source.elements);
        } else {
            self.elements = source.elements.clone();
        }
        self.rows = source.rows;
        self.cols = source.cols;
        emit_matrix_event(MatrixEventKind::CopyAssigned, self.rows, self.cols);
    }
}

impl Drop for DenseMatrix {
    fn drop(&mut self) {
        if !self.elements.is_empty() {
            emit_matrix_event(MatrixEventKind::Released, self.rows, self.cols);
        }
    }
}

impl Index<(usize, usize)> for DenseMatrix {
    type Output = f32;

    fn index(&self, (row, col): (usize, usize)) -> &f32 {
        debug_assert!(row < self.rows && col < self.cols);
        &self.elements[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for DenseMatrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f32 {
        debug_assert!(row < self.rows && col < self.cols);
        &mut self.elements[row * self.cols + col]
    }
}

/// # Safety
/// `src` must point at `len * 4` readable bytes.
unsafe fn copy_contiguous(src: *const u8, len: usize) -> Vec<f32> {
    let mut elements = Vec::<f32>::with_capacity(len);
    // Byte copy: foreign buffers are not guaranteed to be 4-byte aligned.
    ptr::copy_nonoverlapping(src, elements.as_mut_ptr().cast::<u8>(), len * ELEMENT_SIZE);
    elements.set_len(len);
    elements
}

/// # Safety
/// Every `src + r * row_stride + c * col_stride` for `r < rows`, `c < cols`
/// must address four readable bytes.
unsafe fn copy_strided(
    src: *const u8,
    rows: usize,
    cols: usize,
    row_stride: isize,
    col_stride: isize,
) -> MatrixResult<Vec<f32>> {
    let overflow = MatrixError::VolumeOverflow { rows, cols };
    let mut elements = Vec::with_capacity(rows * cols);
    for r in 0..rows {
        let row_offset = isize::try_from(r)
            .ok()
            .and_then(|r| r.checked_mul(row_stride))
            .ok_or_else(|| overflow.clone())?;
        for c in 0..cols {
            let offset = isize::try_from(c)
                .ok()
                .and_then(|c| c.checked_mul(col_stride))
                .and_then(|c| c.checked_add(row_offset))
                .ok_or_else(|| overflow.clone())?;
            elements.push(src.offset(offset).cast::<f32>().read_unaligned());
        }
    }
    Ok(elements)
}
