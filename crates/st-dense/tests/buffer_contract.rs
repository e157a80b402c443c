// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use st_dense::{BufferDescriptor, DenseMatrix, MatrixError, StridePolicy};

fn sample(rows: usize, cols: usize) -> DenseMatrix {
    DenseMatrix::from_fn(rows, cols, |r, c| r as f32 * 0.5 - c as f32 * 1.25 + 0.125).unwrap()
}

fn shapes() -> Vec<(usize, usize)> {
    vec![(0, 0), (0, 3), (4, 0), (1, 1), (1, 7), (7, 1), (2, 3), (16, 9)]
}

#[test]
fn zeros_reports_shape_and_reads_zero() {
    for (rows, cols) in shapes() {
        let matrix = DenseMatrix::zeros(rows, cols);
        assert_eq!(matrix.rows(), rows);
        assert_eq!(matrix.cols(), cols);
        for r in 0..rows {
            for c in 0..cols {
                assert_eq!(matrix.get(r, c), 0.0);
            }
        }
    }
}

#[test]
fn clone_is_equal_but_owns_separate_storage() {
    for (rows, cols) in shapes() {
        let original = sample(rows, cols);
        let copy = original.clone();
        assert_eq!(copy, original);
        if !original.is_empty() {
            assert_ne!(copy.as_ptr(), original.as_ptr());
        }
    }
}

#[test]
fn clone_does_not_share_writes() {
    let mut original = sample(2, 2);
    let copy = original.clone();
    original.set(1, 1, 100.0);
    assert_ne!(copy.get(1, 1), 100.0);
}

#[test]
fn take_moves_value_and_empties_source() {
    for (rows, cols) in shapes() {
        let mut source = sample(rows, cols);
        let expected = source.as_slice().to_vec();
        let destination = source.take();
        assert_eq!(destination.shape(), (rows, cols));
        assert_eq!(destination.as_slice(), expected.as_slice());
        assert_eq!(source.rows(), 0);
        assert_eq!(source.cols(), 0);
    }
}

#[test]
fn export_then_import_round_trips() {
    for (rows, cols) in shapes() {
        let original = sample(rows, cols);
        let restored = {
            let desc = original.buffer_descriptor();
            DenseMatrix::from_buffer(&desc).unwrap()
        };
        assert_eq!(restored, original);
    }
}

#[test]
fn import_rejects_three_dimensional_buffers() {
    let data = [0.0f32; 8];
    let desc = unsafe {
        BufferDescriptor::from_raw_parts(
            data.as_ptr().cast(),
            4,
            "f",
            vec![2, 2, 2],
            vec![16, 8, 4],
            true,
        )
    };
    let err = DenseMatrix::from_buffer(&desc).unwrap_err();
    assert_eq!(
        err,
        MatrixError::IncompatibleFormat {
            format: "f".to_string(),
            element_size: 4,
            ndim: 3,
        }
    );
}

#[test]
fn import_rejects_non_float_formats() {
    let data = [0i32; 4];
    for format in ["i", "d", "float64", "B"] {
        let desc = unsafe {
            BufferDescriptor::from_raw_parts(
                data.as_ptr().cast(),
                4,
                format,
                vec![2, 2],
                Vec::new(),
                true,
            )
        };
        for policy in [StridePolicy::Contiguous, StridePolicy::Strided] {
            let err = DenseMatrix::from_buffer_with_policy(&desc, policy).unwrap_err();
            assert!(
                matches!(err, MatrixError::IncompatibleFormat { .. }),
                "{format}: {err}"
            );
        }
    }
}

#[test]
fn two_by_three_scenario() {
    let mut matrix = DenseMatrix::zeros(2, 3);
    matrix.set(0, 0, 1.5);
    matrix.set(1, 2, 9.0);
    assert_eq!(matrix.get(0, 0), 1.5);
    assert_eq!(matrix.get(1, 2), 9.0);
    for r in 0..2 {
        for c in 0..3 {
            if (r, c) != (0, 0) && (r, c) != (1, 2) {
                assert_eq!(matrix.get(r, c), 0.0);
            }
        }
    }
}

#[test]
fn boundary_access_out_of_range_leaves_matrix_unchanged() {
    let mut matrix = sample(2, 3);
    let snapshot = matrix.clone();
    let err = matrix.try_get(2, 0).unwrap_err();
    assert!(err.is_index_error());
    let err = matrix.try_set(2, 0, 1.0).unwrap_err();
    assert!(err.is_index_error());
    assert_eq!(matrix, snapshot);
}

#[test]
fn exporting_twice_yields_identical_descriptors() {
    let matrix = sample(3, 5);
    let first = matrix.buffer_descriptor();
    let second = matrix.buffer_descriptor();
    assert_eq!(first, second);
    assert_eq!(first.as_ptr(), second.as_ptr());
    assert_eq!(first.shape(), second.shape());
    assert_eq!(first.strides(), second.strides());
}

#[test]
fn copy_assign_and_move_assign_follow_construction_contracts() {
    let source = sample(3, 2);

    let mut copied = DenseMatrix::zeros(5, 5);
    copied.clone_from(&source);
    assert_eq!(copied, source);
    assert_ne!(copied.as_ptr(), source.as_ptr());

    let mut donor = source.clone();
    let mut moved = DenseMatrix::zeros(1, 1);
    moved.move_from(&mut donor);
    assert_eq!(moved, source);
    assert_eq!(donor.shape(), (0, 0));
}
