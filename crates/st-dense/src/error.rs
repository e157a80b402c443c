// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

/// Result alias used throughout the crate.
pub type MatrixResult<T> = Result<T, MatrixError>;

/// Errors emitted by matrix construction, buffer import, and checked access.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MatrixError {
    /// The descriptor does not describe a two-dimensional `f32` buffer.
    #[error(
        "incompatible buffer format: expected 2-D float32 with 4-byte elements, \
         got '{format}' ({element_size}-byte elements) with {ndim} dimension(s)"
    )]
    IncompatibleFormat {
        format: String,
        element_size: usize,
        ndim: usize,
    },
    /// The strides do not describe a contiguous row-major layout and the
    /// active stride policy does not translate them.
    #[error("strides {strides:?} do not describe a contiguous row-major {rows}x{cols} buffer")]
    NonContiguous {
        strides: Vec<isize>,
        rows: usize,
        cols: usize,
    },
    /// The descriptor lists a stride count that differs from its dimensionality.
    #[error("buffer descriptor lists {strides} stride(s) for {ndim} dimension(s)")]
    StrideCount { ndim: usize, strides: usize },
    /// `rows * cols` does not fit in `usize`, or the shape spans more than
    /// `isize::MAX` bytes along some axis.
    #[error("matrix volume {rows}x{cols} overflows the address space")]
    VolumeOverflow { rows: usize, cols: usize },
    /// A non-empty buffer was described with a null data pointer.
    #[error("buffer descriptor for a {rows}x{cols} matrix points at null storage")]
    NullBuffer { rows: usize, cols: usize },
    /// Element data does not match the requested shape.
    #[error("data length mismatch: expected {expected} elements, got {got}")]
    DataLength { expected: usize, got: usize },
    /// A checked accessor received an index outside the matrix.
    #[error("index ({row}, {col}) is out of bounds for a {rows}x{cols} matrix")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },
}

impl MatrixError {
    /// Returns `true` for the rejections a buffer import reports when the
    /// foreign buffer cannot be read as a dense 2-D `f32` array.
    pub fn is_incompatible_format(&self) -> bool {
        matches!(
            self,
            MatrixError::IncompatibleFormat { .. }
                | MatrixError::NonContiguous { .. }
                | MatrixError::StrideCount { .. }
        )
    }

    /// Returns `true` when the error came from a bounds check.
    pub fn is_index_error(&self) -> bool {
        matches!(self, MatrixError::IndexOutOfBounds { .. })
    }
}
