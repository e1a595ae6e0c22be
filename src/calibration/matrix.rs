//! Dense row-major matrix on a single flat buffer.
//!
//! Only the operations the normal equations need: transpose, products and
//! Gauss-Jordan inversion with partial pivoting.
use crate::error::MatrixError;

#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { rows, cols, data: vec![0.0; rows * cols] }
    }

    pub fn identity(n: usize) -> Self {
        let mut m = Self::zeros(n, n);
        for i in 0..n {
            m.data[i * n + i] = 1.0;
        }
        m
    }

    /// Builds from row vectors, which must all have the same length.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, MatrixError> {
        let cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != cols {
                return Err(MatrixError::DimensionMismatch {
                    msg: format!("row {} has {} columns, expected {}", i, row.len(), cols),
                });
            }
            data.extend_from_slice(row);
        }
        Ok(Self { rows: rows.len(), cols, data })
    }

    pub fn rows(&self) -> usize { self.rows }
    pub fn cols(&self) -> usize { self.cols }

    #[inline(always)]
    pub fn get(&self, r: usize, c: usize) -> f64 { self.data[r * self.cols + c] }

    #[inline(always)]
    pub fn row(&self, r: usize) -> &[f64] {
        &self.data[r * self.cols..(r + 1) * self.cols]
    }

    pub fn transpose(&self) -> Self {
        let mut t = Self::zeros(self.cols, self.rows);
        for r in 0..self.rows {
            for c in 0..self.cols {
                t.data[c * self.rows + r] = self.get(r, c);
            }
        }
        t
    }

    pub fn multiply(&self, other: &Matrix) -> Result<Matrix, MatrixError> {
        if self.cols != other.rows {
            return Err(MatrixError::DimensionMismatch {
                msg: format!("{}x{} * {}x{}", self.rows, self.cols, other.rows, other.cols),
            });
        }
        let mut out = Self::zeros(self.rows, other.cols);
        for r in 0..self.rows {
            for k in 0..self.cols {
                let a = self.get(r, k);
                if a == 0.0 { continue; }
                let src = other.row(k);
                let dst = &mut out.data[r * other.cols..(r + 1) * other.cols];
                for (d, b) in dst.iter_mut().zip(src) {
                    *d += a * b;
                }
            }
        }
        Ok(out)
    }

    pub fn mul_vec(&self, v: &[f64]) -> Result<Vec<f64>, MatrixError> {
        if self.cols != v.len() {
            return Err(MatrixError::DimensionMismatch {
                msg: format!("{}x{} * vector of {}", self.rows, self.cols, v.len()),
            });
        }
        Ok((0..self.rows)
            .map(|r| self.row(r).iter().zip(v).map(|(a, b)| a * b).sum())
            .collect())
    }

    fn swap_rows(&mut self, a: usize, b: usize) {
        if a == b { return; }
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let (head, tail) = self.data.split_at_mut(hi * self.cols);
        head[lo * self.cols..(lo + 1) * self.cols].swap_with_slice(&mut tail[..self.cols]);
    }

    /// Gauss-Jordan inversion on an `n x 2n` augmented buffer.
    ///
    /// At each column the row with the largest pivot magnitude is swapped
    /// into place; a pivot below `epsilon` after the swap means the matrix
    /// is singular.
    pub fn invert(&self, epsilon: f64) -> Result<Matrix, MatrixError> {
        if self.rows != self.cols {
            return Err(MatrixError::DimensionMismatch {
                msg: format!("cannot invert a {}x{} matrix", self.rows, self.cols),
            });
        }
        let n = self.rows;
        let width = 2 * n;
        let mut aug = Self::zeros(n, width);
        for r in 0..n {
            aug.data[r * width..r * width + n].copy_from_slice(self.row(r));
            aug.data[r * width + n + r] = 1.0;
        }

        for col in 0..n {
            let pivot_row = (col..n)
                .max_by(|&a, &b| aug.get(a, col).abs().total_cmp(&aug.get(b, col).abs()))
                .unwrap_or(col);
            aug.swap_rows(col, pivot_row);

            let pivot = aug.get(col, col);
            if pivot.abs() < epsilon {
                return Err(MatrixError::Singular { column: col, pivot });
            }

            for c in 0..width {
                aug.data[col * width + c] /= pivot;
            }

            for r in 0..n {
                if r == col { continue; }
                let factor = aug.get(r, col);
                if factor == 0.0 { continue; }
                for c in 0..width {
                    let v = aug.data[col * width + c];
                    aug.data[r * width + c] -= factor * v;
                }
            }
        }

        let mut inv = Self::zeros(n, n);
        for r in 0..n {
            inv.data[r * n..(r + 1) * n].copy_from_slice(&aug.data[r * width + n..(r + 1) * width]);
        }
        Ok(inv)
    }
}
