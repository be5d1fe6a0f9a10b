//! sardine-idan: IDAN speckle filtering for polarimetric SAR
//!
//! Implements the intensity-driven adaptive neighbourhood (IDAN) filter for
//! 2x2 and 3x3 covariance/coherency matrix imagery. Each pixel grows a
//! neighbourhood of statistically similar pixels in two passes and is then
//! shrunk towards the neighbourhood mean with an MMSE weight computed from
//! the span, so all matrix elements are filtered consistently.

pub mod types;
pub mod core;

// Re-export main types and functions for easier access
pub use types::{IdanError, IdanResult, PixelCoord, Rect};

pub use crate::core::{
    FilteredTile, IdanFilter, IdanParams, MatrixElement, MatrixVariant, PixelResult, PolMatrixType,
    PolarimetricWindow,
};

#[cfg(feature = "python")]
mod python {
    use crate::core::{IdanFilter, IdanParams, PolMatrixType, PolarimetricWindow};
    use crate::types::{IdanError, Rect, ScatteringSample};
    use numpy::{PyReadonlyArray2, ToPyArray};
    use pyo3::exceptions::PyValueError;
    use pyo3::prelude::*;
    use pyo3::types::PyDict;

    fn to_py_err(e: IdanError) -> PyErr {
        PyValueError::new_err(format!("IDAN filtering failed: {}", e))
    }

    fn build_filter(matrix_type: &str, an_size: usize, num_looks: f64) -> PyResult<(PolMatrixType, IdanFilter)> {
        let matrix_type: PolMatrixType = matrix_type.parse().map_err(to_py_err)?;
        let params = IdanParams {
            an_size,
            num_looks,
            ..Default::default()
        };
        let filter = IdanFilter::new(matrix_type, params).map_err(to_py_err)?;
        Ok((matrix_type, filter))
    }

    fn filter_to_dict(
        py: Python,
        filter: &IdanFilter,
        matrix_type: PolMatrixType,
        window: &PolarimetricWindow,
    ) -> PyResult<PyObject> {
        let filtered = py.allow_threads(|| filter.filter_image(window)).map_err(to_py_err)?;

        let result = PyDict::new(py);
        for (name, grid) in filtered.into_bands(matrix_type) {
            result.set_item(name, grid.to_pyarray(py))?;
        }
        Ok(result.to_object(py))
    }

    /// Filter matrix element bands given as {"C11": array, "C12_real": array, ...}
    #[pyfunction]
    #[pyo3(signature = (bands, matrix_type, an_size = 50, num_looks = 1.0))]
    fn idan_filter(
        py: Python,
        bands: &PyDict,
        matrix_type: &str,
        an_size: usize,
        num_looks: f64,
    ) -> PyResult<PyObject> {
        let (matrix_type, filter) = build_filter(matrix_type, an_size, num_looks)?;

        let mut grids = Vec::with_capacity(bands.len());
        for (key, value) in bands.iter() {
            let name: String = key.extract()?;
            let array: PyReadonlyArray2<f64> = value.extract()?;
            grids.push((name, array.as_array().to_owned()));
        }
        let (rows, cols) = grids
            .first()
            .map(|(_, grid)| grid.dim())
            .ok_or_else(|| PyValueError::new_err("No bands given"))?;

        let window = PolarimetricWindow::from_bands(
            Rect::new(0, 0, cols, rows),
            filter.variant().matrix_variant(),
            grids,
        )
        .map_err(to_py_err)?;

        filter_to_dict(py, &filter, matrix_type, &window)
    }

    /// Build C2 from a dual-pol scattering pair and filter it
    #[pyfunction]
    #[pyo3(signature = (s1, s2, an_size = 50, num_looks = 1.0))]
    fn idan_filter_dual_pol(
        py: Python,
        s1: PyReadonlyArray2<ScatteringSample>,
        s2: PyReadonlyArray2<ScatteringSample>,
        an_size: usize,
        num_looks: f64,
    ) -> PyResult<PyObject> {
        let (matrix_type, filter) = build_filter("C2", an_size, num_looks)?;

        let s1 = s1.as_array().to_owned();
        let s2 = s2.as_array().to_owned();
        let (rows, cols) = s1.dim();
        let window = PolarimetricWindow::from_dual_pol(Rect::new(0, 0, cols, rows), &s1, &s2)
            .map_err(to_py_err)?;

        filter_to_dict(py, &filter, matrix_type, &window)
    }

    /// Python module definition
    #[pymodule]
    fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
        m.add_function(wrap_pyfunction!(idan_filter, m)?)?;
        m.add_function(wrap_pyfunction!(idan_filter_dual_pol, m)?)?;
        Ok(())
    }
}
