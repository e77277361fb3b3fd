//! Linear regressors: ordinary least squares, ridge, lasso and elastic net

use crate::error::{AutoRegError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Relative pivot below which a Cholesky factorization is treated as singular
const PIVOT_EPS: f64 = 1e-12;

/// Solve the symmetric positive-definite system `a x = b` by Cholesky.
///
/// Returns `None` when a pivot collapses.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }
    let max_diag = a.diag().iter().fold(0.0f64, |m, v| m.max(v.abs()));
    let mut l = Array2::<f64>::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= PIVOT_EPS * max_diag.max(1.0) {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // L^T x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Gauss-Jordan elimination with partial pivoting, used when Cholesky fails
fn gauss_jordan_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut aug = Array2::<f64>::zeros((n, n + 1));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = a[[i, j]];
        }
        aug[[i, n]] = b[i];
    }

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&r1, &r2| aug[[r1, col]].abs().total_cmp(&aug[[r2, col]].abs()))?;
        if aug[[pivot_row, col]].abs() < 1e-10 {
            return None;
        }
        if pivot_row != col {
            for j in 0..=n {
                aug.swap([col, j], [pivot_row, j]);
            }
        }

        let pivot = aug[[col, col]];
        for j in 0..=n {
            aug[[col, j]] /= pivot;
        }
        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                if factor != 0.0 {
                    for j in 0..=n {
                        aug[[row, j]] -= factor * aug[[col, j]];
                    }
                }
            }
        }
    }

    Some(aug.column(n).to_owned())
}

/// Solve `(XᵀX + alpha·I) w = Xᵀy`.
///
/// Tries Cholesky, then Cholesky with a small diagonal jitter, then
/// Gauss-Jordan.
fn solve_normal_equations(x: &Array2<f64>, y: &Array1<f64>, alpha: f64) -> Result<Array1<f64>> {
    let n_features = x.ncols();
    let mut xtx = x.t().dot(x);
    for i in 0..n_features {
        xtx[[i, i]] += alpha;
    }
    let xty = x.t().dot(y);

    if let Some(w) = cholesky_solve(&xtx, &xty) {
        return Ok(w);
    }

    let mean_diag = xtx.diag().iter().map(|v| v.abs()).sum::<f64>() / n_features.max(1) as f64;
    let mut jittered = xtx.clone();
    for i in 0..n_features {
        jittered[[i, i]] += 1e-8 * mean_diag.max(1e-12);
    }
    if let Some(w) = cholesky_solve(&jittered, &xty) {
        return Ok(w);
    }

    gauss_jordan_solve(&xtx, &xty)
        .ok_or_else(|| AutoRegError::ComputationError("singular normal equations".to_string()))
}

/// Column means and centered copies of `x` and `y`
struct Centered {
    x: Array2<f64>,
    y: Array1<f64>,
    x_mean: Array1<f64>,
    y_mean: f64,
}

fn check_xy(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(AutoRegError::ShapeError {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    if x.nrows() == 0 {
        return Err(AutoRegError::TrainingError("cannot fit on zero rows".to_string()));
    }
    Ok(())
}

fn center(x: &Array2<f64>, y: &Array1<f64>, fit_intercept: bool) -> Result<Centered> {
    if !fit_intercept {
        return Ok(Centered {
            x: x.clone(),
            y: y.clone(),
            x_mean: Array1::zeros(x.ncols()),
            y_mean: 0.0,
        });
    }
    let x_mean = x
        .mean_axis(Axis(0))
        .ok_or_else(|| AutoRegError::ComputationError("empty feature matrix".to_string()))?;
    let y_mean = y.mean().unwrap_or(0.0);
    Ok(Centered {
        x: x - &x_mean.view().insert_axis(Axis(0)),
        y: y - y_mean,
        x_mean,
        y_mean,
    })
}

/// Coefficients and intercept shared by every linear model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    pub coefficients: Array1<f64>,
    pub intercept: f64,
}

impl LinearFit {
    fn from_centered(coefficients: Array1<f64>, c: &Centered) -> Result<Self> {
        if coefficients.iter().any(|w| !w.is_finite()) {
            return Err(AutoRegError::ComputationError(
                "non-finite coefficients".to_string(),
            ));
        }
        let intercept = c.y_mean - coefficients.dot(&c.x_mean);
        Ok(Self {
            coefficients,
            intercept,
        })
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coefficients.len() {
            return Err(AutoRegError::ShapeError {
                expected: format!("{} features", self.coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(&self.coefficients) + self.intercept)
    }
}

fn predict_fitted(fit: &Option<LinearFit>, x: &Array2<f64>) -> Result<Array1<f64>> {
    fit.as_ref().ok_or(AutoRegError::ModelNotFitted)?.predict(x)
}

/// Ordinary least squares
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    pub fit_intercept: bool,
    pub fitted: Option<LinearFit>,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            fit_intercept: true,
            fitted: None,
        }
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        let c = center(x, y, self.fit_intercept)?;
        let w = solve_normal_equations(&c.x, &c.y, 0.0)?;
        self.fitted = Some(LinearFit::from_centered(w, &c)?);
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        predict_fitted(&self.fitted, x)
    }
}

/// L2-regularized least squares
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RidgeRegression {
    /// L2 regularization strength
    pub alpha: f64,
    pub fit_intercept: bool,
    pub fitted: Option<LinearFit>,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl RidgeRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            fit_intercept: true,
            fitted: None,
        }
    }

    pub fn with_fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if self.alpha < 0.0 {
            return Err(AutoRegError::invalid_parameter("alpha", self.alpha, "must be >= 0"));
        }
        check_xy(x, y)?;
        let c = center(x, y, self.fit_intercept)?;
        let w = solve_normal_equations(&c.x, &c.y, self.alpha)?;
        self.fitted = Some(LinearFit::from_centered(w, &c)?);
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        predict_fitted(&self.fitted, x)
    }
}

/// Soft-threshold operator for the L1 proximal step
fn soft_threshold(val: f64, threshold: f64) -> f64 {
    if val > threshold {
        val - threshold
    } else if val < -threshold {
        val + threshold
    } else {
        0.0
    }
}

/// Cyclic coordinate descent on
/// `1/(2n)·‖y − Xw‖² + alpha·l1_ratio·‖w‖₁ + alpha·(1 − l1_ratio)/2·‖w‖²`
fn coordinate_descent(
    x: &Array2<f64>,
    y: &Array1<f64>,
    alpha: f64,
    l1_ratio: f64,
    max_iter: usize,
    tol: f64,
) -> Array1<f64> {
    let n_features = x.ncols();
    let n = x.nrows() as f64;
    let l1_penalty = alpha * l1_ratio * n;
    let l2_penalty = alpha * (1.0 - l1_ratio) * n;

    let col_norms: Vec<f64> = (0..n_features)
        .map(|j| x.column(j).mapv(|v| v * v).sum())
        .collect();

    let mut w = Array1::<f64>::zeros(n_features);
    let mut r = y.clone();

    for _ in 0..max_iter {
        let mut max_delta = 0.0f64;

        for j in 0..n_features {
            let denom = col_norms[j] + l2_penalty;
            if col_norms[j] < 1e-15 || denom < 1e-15 {
                w[j] = 0.0;
                continue;
            }
            let rho = x.column(j).dot(&r) + col_norms[j] * w[j];
            let old = w[j];
            w[j] = soft_threshold(rho, l1_penalty) / denom;

            let delta = old - w[j];
            if delta != 0.0 {
                r.scaled_add(delta, &x.column(j));
                max_delta = max_delta.max(delta.abs());
            }
        }

        if max_delta < tol {
            break;
        }
    }

    w
}

/// L1-regularized least squares fitted by coordinate descent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LassoRegression {
    /// L1 regularization strength
    pub alpha: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub fit_intercept: bool,
    pub fitted: Option<LinearFit>,
}

impl Default for LassoRegression {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl LassoRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            max_iter: 1000,
            tol: 1e-6,
            fit_intercept: true,
            fitted: None,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if self.alpha < 0.0 {
            return Err(AutoRegError::invalid_parameter("alpha", self.alpha, "must be >= 0"));
        }
        check_xy(x, y)?;
        let c = center(x, y, self.fit_intercept)?;
        let w = coordinate_descent(&c.x, &c.y, self.alpha, 1.0, self.max_iter, self.tol);
        self.fitted = Some(LinearFit::from_centered(w, &c)?);
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        predict_fitted(&self.fitted, x)
    }
}

/// Mixed L1/L2-regularized least squares fitted by coordinate descent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticNetRegression {
    /// Overall regularization strength
    pub alpha: f64,
    /// 0.0 is pure ridge, 1.0 is pure lasso
    pub l1_ratio: f64,
    pub max_iter: usize,
    pub tol: f64,
    pub fit_intercept: bool,
    pub fitted: Option<LinearFit>,
}

impl Default for ElasticNetRegression {
    fn default() -> Self {
        Self::new(1.0, 0.5)
    }
}

impl ElasticNetRegression {
    pub fn new(alpha: f64, l1_ratio: f64) -> Self {
        Self {
            alpha,
            l1_ratio,
            max_iter: 1000,
            tol: 1e-6,
            fit_intercept: true,
            fitted: None,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if self.alpha < 0.0 {
            return Err(AutoRegError::invalid_parameter("alpha", self.alpha, "must be >= 0"));
        }
        if !(0.0..=1.0).contains(&self.l1_ratio) {
            return Err(AutoRegError::invalid_parameter(
                "l1_ratio",
                self.l1_ratio,
                "must be within [0, 1]",
            ));
        }
        check_xy(x, y)?;
        let c = center(x, y, self.fit_intercept)?;
        let w = coordinate_descent(&c.x, &c.y, self.alpha, self.l1_ratio, self.max_iter, self.tol);
        self.fitted = Some(LinearFit::from_centered(w, &c)?);
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        predict_fitted(&self.fitted, x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn line() -> (Array2<f64>, Array1<f64>) {
        // y = 2x + 1
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![3.0, 5.0, 7.0, 9.0, 11.0];
        (x, y)
    }

    #[test]
    fn test_linear_regression_simple() {
        let (x, y) = line();
        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let fit = model.fitted.as_ref().unwrap();
        assert!((fit.coefficients[0] - 2.0).abs() < 1e-8);
        assert!((fit.intercept - 1.0).abs() < 1e-8);

        let pred = model.predict(&array![[6.0]]).unwrap();
        assert!((pred[0] - 13.0).abs() < 1e-8);
    }

    #[test]
    fn test_collinear_features_still_fit() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-4);
        }
    }

    #[test]
    fn test_ridge_shrinks() {
        let (x, y) = line();
        let mut ols = RidgeRegression::new(0.0);
        ols.fit(&x, &y).unwrap();
        let mut ridge = RidgeRegression::new(10.0);
        ridge.fit(&x, &y).unwrap();

        let w_ols = ols.fitted.as_ref().unwrap().coefficients[0];
        let w_ridge = ridge.fitted.as_ref().unwrap().coefficients[0];
        assert!(w_ridge.abs() < w_ols.abs());
    }

    #[test]
    fn test_lasso_zeroes_irrelevant_feature() {
        let x = array![
            [1.0, 0.3],
            [2.0, -0.1],
            [3.0, 0.2],
            [4.0, -0.3],
            [5.0, 0.1],
            [6.0, -0.2]
        ];
        let y = array![2.0, 4.0, 6.0, 8.0, 10.0, 12.0];
        let mut model = LassoRegression::new(0.1);
        model.fit(&x, &y).unwrap();

        let w = &model.fitted.as_ref().unwrap().coefficients;
        assert!(w[0] > 1.5);
        assert_eq!(w[1], 0.0);
    }

    #[test]
    fn test_elastic_net() {
        let (x, y) = line();
        let mut model = ElasticNetRegression::new(0.01, 0.5);
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        assert!((pred[2] - 7.0).abs() < 0.5);

        let mut bad = ElasticNetRegression::new(0.1, 1.5);
        assert!(bad.fit(&x, &y).is_err());
    }

    #[test]
    fn test_not_fitted_and_shape_errors() {
        let model = LassoRegression::default();
        assert!(matches!(
            model.predict(&array![[1.0]]),
            Err(AutoRegError::ModelNotFitted)
        ));

        let (x, _) = line();
        let mut model = LinearRegression::new();
        assert!(matches!(
            model.fit(&x, &array![1.0, 2.0]),
            Err(AutoRegError::ShapeError { .. })
        ));
    }
}
