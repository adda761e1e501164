//! Conversions between ndarray (public API) and nalgebra (factorizations).

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, ArrayView2};

use crate::error::Result;

/// Convert an ndarray Array2 to a nalgebra DMatrix.
///
/// # Arguments
///
/// * `arr` - The ndarray Array2 to convert
///
/// # Returns
///
/// * A nalgebra DMatrix with the same data
pub fn ndarray_to_nalgebra(arr: &Array2<f64>) -> Result<DMatrix<f64>> {
    Ok(view_to_nalgebra(arr.view()))
}

pub(crate) fn view_to_nalgebra(arr: ArrayView2<'_, f64>) -> DMatrix<f64> {
    DMatrix::from_fn(arr.nrows(), arr.ncols(), |i, j| arr[[i, j]])
}

/// Convert a nalgebra DMatrix to an ndarray Array2.
pub fn nalgebra_to_ndarray(mat: &DMatrix<f64>) -> Result<Array2<f64>> {
    Ok(Array2::from_shape_fn((mat.nrows(), mat.ncols()), |(i, j)| {
        mat[(i, j)]
    }))
}

/// Convert an ndarray Array1 to a nalgebra DVector.
pub fn ndarray_vec_to_nalgebra(arr: &Array1<f64>) -> Result<DVector<f64>> {
    Ok(DVector::from_iterator(arr.len(), arr.iter().copied()))
}

/// Convert a nalgebra DVector to an ndarray Array1.
pub fn nalgebra_vec_to_ndarray(vec: &DVector<f64>) -> Result<Array1<f64>> {
    Ok(vec.iter().copied().collect())
}
