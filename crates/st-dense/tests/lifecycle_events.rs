// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use std::sync::{Arc, Mutex, OnceLock};

use st_dense::observability::set_matrix_observer;
use st_dense::{
    BufferDescriptor, DenseMatrix, MatrixEvent, MatrixEventKind, StridePolicy,
};

// Tests in this binary run concurrently, so each one uses a shape no other
// test allocates and filters the shared log by it.
fn recorded() -> &'static Mutex<Vec<MatrixEvent>> {
    static LOG: OnceLock<Mutex<Vec<MatrixEvent>>> = OnceLock::new();
    static INSTALL: OnceLock<()> = OnceLock::new();
    let log = LOG.get_or_init(|| Mutex::new(Vec::new()));
    INSTALL.get_or_init(|| {
        set_matrix_observer(Some(Arc::new(|event: &MatrixEvent| {
            if let Some(log) = LOG.get() {
                log.lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .push(*event);
            }
        })));
    });
    log
}

fn kinds_for(rows: usize, cols: usize) -> Vec<MatrixEventKind> {
    recorded()
        .lock()
        .unwrap()
        .iter()
        .filter(|event| event.rows == rows && event.cols == cols)
        .map(|event| event.kind)
        .collect()
}

#[test]
fn construction_copy_and_drop_are_reported() {
    recorded();
    {
        let matrix = DenseMatrix::zeros(7, 11);
        let _copy = matrix.clone();
    }
    assert_eq!(
        kinds_for(7, 11),
        vec![
            MatrixEventKind::Created,
            MatrixEventKind::Copied,
            MatrixEventKind::Released,
            MatrixEventKind::Released,
        ]
    );
}

#[test]
fn moved_from_matrices_release_nothing() {
    recorded();
    {
        let mut source = DenseMatrix::zeros(13, 3);
        let _destination = source.take();
    }
    assert_eq!(
        kinds_for(13, 3),
        vec![
            MatrixEventKind::Created,
            MatrixEventKind::Moved,
            MatrixEventKind::Released,
        ]
    );
}

#[test]
fn export_and_import_are_reported() {
    recorded();
    let matrix = DenseMatrix::zeros(5, 17);
    let restored = DenseMatrix::from_buffer(&matrix.buffer_descriptor()).unwrap();
    drop(restored);
    assert_eq!(
        kinds_for(5, 17),
        vec![
            MatrixEventKind::Created,
            MatrixEventKind::Exported,
            MatrixEventKind::Imported,
            MatrixEventKind::Released,
        ]
    );
}

#[test]
fn move_assignment_releases_previous_storage() {
    recorded();
    let mut target = DenseMatrix::zeros(19, 2);
    let mut source = DenseMatrix::zeros(2, 19);
    target.move_from(&mut source);
    assert_eq!(
        kinds_for(19, 2),
        vec![MatrixEventKind::Created, MatrixEventKind::Released]
    );
    assert_eq!(
        kinds_for(2, 19),
        vec![MatrixEventKind::Created, MatrixEventKind::MoveAssigned]
    );
}

fn describe<'a>(
    data: &'a [f32],
    format: &'a str,
    shape: Vec<usize>,
    strides: Vec<isize>,
) -> BufferDescriptor<'a> {
    unsafe {
        BufferDescriptor::from_raw_parts(data.as_ptr().cast(), 4, format, shape, strides, true)
    }
}

#[test]
fn rejected_imports_construct_nothing() {
    recorded();
    let data = vec![1.0_f32; 43 * 5];

    let wrong_format = describe(&data, "i", vec![37, 3], Vec::new());
    assert!(DenseMatrix::from_buffer(&wrong_format).is_err());

    let three_dims = describe(&data, "float32", vec![41, 2, 1], Vec::new());
    assert!(DenseMatrix::from_buffer(&three_dims).is_err());

    let transposed = describe(&data, "float32", vec![43, 5], vec![4, 43 * 4]);
    assert!(
        DenseMatrix::from_buffer_with_policy(&transposed, StridePolicy::Contiguous).is_err()
    );

    let null = unsafe {
        BufferDescriptor::from_raw_parts(
            std::ptr::null(),
            4,
            "float32",
            vec![47, 1],
            Vec::new(),
            true,
        )
    };
    assert!(DenseMatrix::from_buffer(&null).is_err());

    let unaddressable = describe(&data, "float32", vec![0, usize::MAX / 2], Vec::new());
    assert!(DenseMatrix::from_buffer(&unaddressable).is_err());

    for (rows, cols) in [(37, 3), (41, 2), (43, 5), (47, 1), (0, usize::MAX / 2)] {
        assert_eq!(kinds_for(rows, cols), Vec::new(), "{rows}x{cols}");
    }
}
