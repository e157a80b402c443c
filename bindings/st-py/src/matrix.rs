use std::ffi::{c_int, c_void, CStr};
use std::os::raw::c_char;
use std::{ptr, slice};

use pyo3::exceptions::{PyBufferError, PyIndexError, PyRuntimeError, PyValueError};
use pyo3::ffi;
use pyo3::prelude::*;
use pyo3::types::PyAny;
use st_dense::{BufferDescriptor, DenseMatrix, MatrixError};

pyo3::create_exception!(
    spiraldense,
    IncompatibleFormatError,
    PyRuntimeError,
    "Raised when a buffer cannot be read as a two-dimensional float32 array."
);

const FLOAT32_FORMAT: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"f\0") };

/// Shape followed by strides, in the layout handed to `Py_buffer`.
type ExportLayout = [ffi::Py_ssize_t; 4];

pub(crate) fn matrix_err_to_py(err: MatrixError) -> PyErr {
    if err.is_index_error() {
        PyIndexError::new_err(err.to_string())
    } else if err.is_incompatible_format() {
        IncompatibleFormatError::new_err(err.to_string())
    } else {
        PyValueError::new_err(err.to_string())
    }
}

fn export_layout(descriptor: &BufferDescriptor<'_>) -> PyResult<ExportLayout> {
    let mut layout: ExportLayout = [0; 4];
    for (slot, &extent) in layout[..2].iter_mut().zip(descriptor.shape()) {
        *slot = ffi::Py_ssize_t::try_from(extent)
            .map_err(|_| PyBufferError::new_err(format!("extent {extent} exceeds Py_ssize_t")))?;
    }
    layout[2..].copy_from_slice(descriptor.strides());
    Ok(layout)
}

/// A buffer obtained from a Python exporter. Released on drop.
struct ForeignBuffer {
    view: Box<ffi::Py_buffer>,
}

impl ForeignBuffer {
    fn request(source: &Bound<'_, PyAny>) -> PyResult<Self> {
        let mut raw = Box::new(std::mem::MaybeUninit::<ffi::Py_buffer>::uninit());
        unsafe {
            if ffi::PyObject_GetBuffer(source.as_ptr(), raw.as_mut_ptr(), ffi::PyBUF_RECORDS_RO)
                != 0
            {
                return Err(PyErr::fetch(source.py()));
            }
            // SAFETY: PyObject_GetBuffer filled the view.
            let view = Box::from_raw(Box::into_raw(raw).cast::<ffi::Py_buffer>());
            Ok(Self { view })
        }
    }

    fn descriptor(&self) -> PyResult<BufferDescriptor<'_>> {
        let view = &*self.view;
        let malformed = |what: &str| IncompatibleFormatError::new_err(format!("malformed buffer: {what}"));

        let ndim = usize::try_from(view.ndim).map_err(|_| malformed("negative ndim"))?;
        let element_size =
            usize::try_from(view.itemsize).map_err(|_| malformed("negative itemsize"))?;
        let format = if view.format.is_null() {
            "B"
        } else {
            unsafe { CStr::from_ptr(view.format) }
                .to_str()
                .map_err(|_| malformed("format is not valid UTF-8"))?
        };

        let shape = if view.shape.is_null() {
            match ndim {
                0 => Vec::new(),
                _ => vec![(view.len / view.itemsize.max(1)) as usize],
            }
        } else {
            unsafe { slice::from_raw_parts(view.shape, ndim) }
                .iter()
                .map(|&extent| usize::try_from(extent).map_err(|_| malformed("negative extent")))
                .collect::<PyResult<Vec<_>>>()?
        };
        let strides = if view.strides.is_null() {
            Vec::new()
        } else {
            unsafe { slice::from_raw_parts(view.strides, ndim) }.to_vec()
        };

        // SAFETY: the exporter keeps the region alive and readable until
        // PyBuffer_Release, which runs when `self` drops.
        Ok(unsafe {
            BufferDescriptor::from_raw_parts(
                view.buf as *const u8,
                element_size,
                format,
                shape,
                strides,
                view.readonly != 0,
            )
        })
    }
}

impl Drop for ForeignBuffer {
    fn drop(&mut self) {
        unsafe { ffi::PyBuffer_Release(&mut *self.view) };
    }
}

#[pyclass(module = "spiraldense", name = "Matrix")]
pub(crate) struct PyMatrix {
    pub(crate) inner: DenseMatrix,
}

#[pymethods]
impl PyMatrix {
    /// `Matrix(rows, cols)` allocates zeros; `Matrix(buffer)` copies any
    /// object exporting a 2-D float32 buffer.
    #[new]
    #[pyo3(signature = (source, cols=None))]
    fn new(source: &Bound<'_, PyAny>, cols: Option<usize>) -> PyResult<Self> {
        let inner = match cols {
            Some(cols) => {
                let rows: usize = source.extract()?;
                DenseMatrix::try_zeros(rows, cols).map_err(matrix_err_to_py)?
            }
            None => {
                let buffer = ForeignBuffer::request(source)?;
                let descriptor = buffer.descriptor()?;
                DenseMatrix::from_buffer(&descriptor).map_err(matrix_err_to_py)?
            }
        };
        Ok(Self { inner })
    }

    fn rows(&self) -> usize {
        self.inner.rows()
    }

    fn cols(&self) -> usize {
        self.inner.cols()
    }

    #[getter]
    fn shape(&self) -> (usize, usize) {
        self.inner.shape()
    }

    fn __getitem__(&self, index: (usize, usize)) -> PyResult<f32> {
        self.inner
            .try_get(index.0, index.1)
            .map_err(matrix_err_to_py)
    }

    fn __setitem__(&mut self, index: (usize, usize), value: f32) -> PyResult<()> {
        self.inner
            .try_set(index.0, index.1, value)
            .map_err(matrix_err_to_py)
    }

    /// Deep copy with independent storage.
    fn copy(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }

    fn __copy__(&self) -> Self {
        self.copy()
    }

    fn __deepcopy__(&self, _memo: &Bound<'_, PyAny>) -> Self {
        self.copy()
    }

    fn __repr__(&self) -> String {
        format!(
            "Matrix(rows={}, cols={})",
            self.inner.rows(),
            self.inner.cols()
        )
    }

    unsafe fn __getbuffer__(
        slf: Bound<'_, Self>,
        view: *mut ffi::Py_buffer,
        flags: c_int,
    ) -> PyResult<()> {
        if view.is_null() {
            return Err(PyBufferError::new_err("received a null Py_buffer"));
        }

        let (buf, len, itemsize, layout) = {
            let mut this = slf.borrow_mut();
            let (rows, cols) = this.inner.shape();
            if (flags & ffi::PyBUF_F_CONTIGUOUS) == ffi::PyBUF_F_CONTIGUOUS && rows > 1 && cols > 1
            {
                return Err(PyBufferError::new_err(
                    "matrix storage is row-major, not Fortran-contiguous",
                ));
            }
            let descriptor = this.inner.buffer_descriptor_mut();
            let itemsize = descriptor.element_size();
            (
                descriptor.as_ptr() as *mut c_void,
                (rows * cols * itemsize) as ffi::Py_ssize_t,
                itemsize as ffi::Py_ssize_t,
                Box::new(export_layout(&descriptor)?),
            )
        };

        let layout = Box::into_raw(layout);
        (*view).obj = slf.clone().into_any().into_ptr();
        (*view).buf = buf;
        (*view).len = len;
        (*view).readonly = 0;
        (*view).itemsize = itemsize;
        (*view).format = if (flags & ffi::PyBUF_FORMAT) == ffi::PyBUF_FORMAT {
            FLOAT32_FORMAT.as_ptr() as *mut c_char
        } else {
            ptr::null_mut()
        };
        (*view).ndim = 2;
        (*view).shape = if (flags & ffi::PyBUF_ND) == ffi::PyBUF_ND {
            (*layout).as_mut_ptr()
        } else {
            ptr::null_mut()
        };
        (*view).strides = if (flags & ffi::PyBUF_STRIDES) == ffi::PyBUF_STRIDES {
            (*layout).as_mut_ptr().add(2)
        } else {
            ptr::null_mut()
        };
        (*view).suboffsets = ptr::null_mut();
        (*view).internal = layout.cast();
        Ok(())
    }

    unsafe fn __releasebuffer__(&self, view: *mut ffi::Py_buffer) {
        let internal = (*view).internal;
        if !internal.is_null() {
            drop(Box::from_raw(internal.cast::<ExportLayout>()));
            (*view).internal = ptr::null_mut();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_matrix<R>(
        rows: usize,
        cols: usize,
        body: impl FnOnce(Python<'_>, &Bound<'_, PyMatrix>) -> R,
    ) -> R {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| {
            let matrix = Bound::new(
                py,
                PyMatrix {
                    inner: DenseMatrix::zeros(rows, cols),
                },
            )
            .unwrap();
            body(py, &matrix)
        })
    }

    #[test]
    fn export_layout_matches_row_major_strides() {
        let matrix = DenseMatrix::zeros(3, 5);
        let layout = export_layout(&matrix.buffer_descriptor()).unwrap();
        assert_eq!(layout, [3, 5, 20, 4]);
    }

    #[test]
    fn out_of_range_subscripts_raise_index_error() {
        with_matrix(2, 3, |py, matrix| {
            let err = matrix.as_any().get_item((2usize, 0usize)).unwrap_err();
            assert!(err.is_instance_of::<PyIndexError>(py));

            let err = matrix
                .as_any()
                .set_item((0usize, 3usize), 1.0_f32)
                .unwrap_err();
            assert!(err.is_instance_of::<PyIndexError>(py));
            assert!(matrix.borrow().inner.as_slice().iter().all(|&v| v == 0.0));

            let value: f32 = matrix
                .as_any()
                .get_item((1usize, 2usize))
                .unwrap()
                .extract()
                .unwrap();
            assert_eq!(value, 0.0);
        });
    }

    #[test]
    fn import_rejections_raise_incompatible_format_error() {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| {
            let rejections = [
                MatrixError::IncompatibleFormat {
                    format: "d".to_string(),
                    element_size: 8,
                    ndim: 2,
                },
                MatrixError::NonContiguous {
                    strides: vec![4, 8],
                    rows: 2,
                    cols: 2,
                },
                MatrixError::StrideCount { ndim: 2, strides: 3 },
            ];
            for err in rejections {
                let raised = matrix_err_to_py(err);
                assert!(raised.is_instance_of::<IncompatibleFormatError>(py));
                assert!(raised.is_instance_of::<PyRuntimeError>(py));
            }

            let raised = matrix_err_to_py(MatrixError::VolumeOverflow { rows: 0, cols: 1 });
            assert!(raised.is_instance_of::<PyValueError>(py));
        });
    }

    #[test]
    fn unaddressable_shapes_raise_value_error() {
        pyo3::prepare_freethreaded_python();
        Python::with_gil(|py| {
            let rows = 0usize.into_py(py).into_bound(py);
            let err = PyMatrix::new(&rows, Some(usize::MAX / 2)).err().unwrap();
            assert!(err.is_instance_of::<PyValueError>(py));
        });
    }
}
