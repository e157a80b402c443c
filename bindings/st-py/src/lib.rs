//! PyO3 module `spiraldense`: dense float32 matrices for Python that speak
//! the buffer protocol in both directions.
//!
//! ```python
//! import numpy as np, spiraldense
//! m = spiraldense.Matrix(np.arange(6, dtype=np.float32).reshape(2, 3))
//! view = np.asarray(m)      # zero-copy view of the matrix storage
//! ```

use pyo3::prelude::*;
use spiral_config::tracing::InitError;

mod matrix;

pub use matrix::IncompatibleFormatError;

#[pymodule]
fn spiraldense(m: &Bound<'_, PyModule>) -> PyResult<()> {
    match spiral_config::tracing::init_tracing() {
        Ok(()) | Err(InitError::AlreadyInitialised) => {}
        Err(err) => tracing::warn!("[spiraldense] tracing disabled: {err}"),
    }

    m.add_class::<matrix::PyMatrix>()?;
    m.add(
        "IncompatibleFormatError",
        m.py().get_type_bound::<IncompatibleFormatError>(),
    )?;
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    Ok(())
}
