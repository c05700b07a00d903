use ndarray::{Array2, ArrayView1, ArrayView2};

/// Matrix of derivatives of calculated values (rows) with respect to parameters (columns)
pub trait Jacobian {
    fn n_rows(&self) -> usize;

    fn n_cols(&self) -> usize;

    fn get(&self, row: usize, col: usize) -> f64;

    fn set(&mut self, row: usize, col: usize, value: f64);
}

/// Owned row-major Jacobian
#[derive(Clone, Debug, PartialEq)]
pub struct DenseJacobian {
    matrix: Array2<f64>,
}

impl DenseJacobian {
    pub fn zeros(n_rows: usize, n_cols: usize) -> Self {
        Self {
            matrix: Array2::zeros((n_rows, n_cols)),
        }
    }

    pub fn matrix(&self) -> ArrayView2<'_, f64> {
        self.matrix.view()
    }

    pub fn column(&self, col: usize) -> ArrayView1<'_, f64> {
        self.matrix.column(col)
    }

    pub fn into_inner(self) -> Array2<f64> {
        self.matrix
    }
}

impl Jacobian for DenseJacobian {
    #[inline]
    fn n_rows(&self) -> usize {
        self.matrix.nrows()
    }

    #[inline]
    fn n_cols(&self) -> usize {
        self.matrix.ncols()
    }

    #[inline]
    fn get(&self, row: usize, col: usize) -> f64 {
        self.matrix[(row, col)]
    }

    #[inline]
    fn set(&mut self, row: usize, col: usize, value: f64) {
        self.matrix[(row, col)] = value;
    }
}

/// Window into another Jacobian shifted by a row and a column offset
///
/// A member of a composite function writes its derivatives at local indices, the window maps
/// them onto its block of the global matrix.
pub struct PartialJacobian<'a> {
    inner: &'a mut dyn Jacobian,
    row_offset: usize,
    col_offset: usize,
}

impl<'a> PartialJacobian<'a> {
    pub fn new(inner: &'a mut dyn Jacobian, row_offset: usize, col_offset: usize) -> Self {
        assert!(row_offset <= inner.n_rows(), "row offset is out of range");
        assert!(col_offset <= inner.n_cols(), "column offset is out of range");
        Self {
            inner,
            row_offset,
            col_offset,
        }
    }
}

impl Jacobian for PartialJacobian<'_> {
    fn n_rows(&self) -> usize {
        self.inner.n_rows() - self.row_offset
    }

    fn n_cols(&self) -> usize {
        self.inner.n_cols() - self.col_offset
    }

    fn get(&self, row: usize, col: usize) -> f64 {
        self.inner.get(row + self.row_offset, col + self.col_offset)
    }

    fn set(&mut self, row: usize, col: usize, value: f64) {
        self.inner
            .set(row + self.row_offset, col + self.col_offset, value);
    }
}
