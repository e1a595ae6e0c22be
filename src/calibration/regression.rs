//! Ordinary least squares through the normal equations.
use super::matrix::Matrix;
use crate::error::MatrixError;

#[derive(Debug, Clone, PartialEq)]
pub struct OlsFit {
    pub intercept: f64,
    /// One coefficient per predictor column, in column order.
    pub coefficients: Vec<f64>,
}

/// Fits `y ~ 1 + X` by solving `(XᵗX)⁻¹ Xᵗy` with an intercept column
/// prepended to `x`.
pub fn ordinary_least_squares(x: &[Vec<f64>], y: &[f64], pivot_epsilon: f64) -> Result<OlsFit, MatrixError> {
    if x.len() != y.len() {
        return Err(MatrixError::DimensionMismatch {
            msg: format!("{} predictor rows for {} targets", x.len(), y.len()),
        });
    }

    let design_rows: Vec<Vec<f64>> = x.iter()
        .map(|row| std::iter::once(1.0).chain(row.iter().copied()).collect())
        .collect();
    let design = Matrix::from_rows(&design_rows)?;
    let design_t = design.transpose();

    let gram = design_t.multiply(&design)?;
    let moment = design_t.mul_vec(y)?;
    let beta = gram.invert(pivot_epsilon)?.mul_vec(&moment)?;

    let (intercept, coefficients) = match beta.split_first() {
        Some((b0, rest)) => (*b0, rest.to_vec()),
        None => (0.0, Vec::new()),
    };
    Ok(OlsFit { intercept, coefficients })
}
