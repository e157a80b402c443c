// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Dense row-major `f32` matrices that trade their storage with foreign
//! runtimes through buffer descriptors.
//!
//! [`DenseMatrix`] owns its elements and behaves like a value: cloning deep
//! copies, [`DenseMatrix::take`] moves the storage out and leaves an empty
//! `0x0` matrix behind. [`DenseMatrix::buffer_descriptor`] hands out a
//! [`BufferDescriptor`] that aliases the live storage without copying, and
//! [`DenseMatrix::from_buffer`] builds a matrix from a descriptor supplied by
//! a binding layer.

pub mod buffer;
pub mod error;
pub mod matrix;
pub mod observability;

pub use buffer::{BufferDescriptor, FLOAT32_FORMAT, FLOAT32_STRUCT_CODE};
pub use error::{MatrixError, MatrixResult};
pub use matrix::DenseMatrix;
pub use observability::{MatrixEvent, MatrixEventKind, MatrixObserver};
pub use spiral_config::StridePolicy;
