//! Levenberg-Marquardt nonlinear least squares.
//!
//! Minimises `Σ (f(p)_i - y_i)²` for a model `f` that predicts every
//! observation from a parameter vector. The Jacobian is taken numerically
//! with central differences, damping is Marquardt's (scaled by the diagonal
//! of `JᵀJ`) and the loop stops on any of:
//!
//! - relative cost reduction below `ftol`
//! - relative step size below `xtol`
//! - gradient orthogonal to the Jacobian columns within `gtol`
//!
//! The tolerance defaults are `√ε`, as in MINPACK.
//!
//! The parameter covariance is computed explicitly at the optimum as
//! `pinv(JᵀJ) · SSE / (n - p)`. Standard errors reported by the fitters are
//! the square roots of its diagonal.

use std::time::{Duration, Instant};

use nalgebra::{DMatrix, DVector};

use crate::math::{pseudo_inverse, solve_least_squares};

#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    pub max_iterations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    /// Starting damping factor.
    pub initial_lambda: f64,
    /// Wall-clock budget for one solve.
    pub timeout: Option<Duration>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        let tol = f64::EPSILON.sqrt();
        Self {
            max_iterations: 200,
            ftol: tol,
            xtol: tol,
            gtol: tol,
            initial_lambda: 1e-3,
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeastSquaresFit {
    pub params: Vec<f64>,
    /// Sum of squared residuals at `params`.
    pub cost: f64,
    pub iterations: usize,
    /// Parameter covariance, `+inf` everywhere when it is undetermined.
    pub covariance: DMatrix<f64>,
}

impl LeastSquaresFit {
    /// `|sqrt(diag(covariance))|`, positional with `params`.
    pub fn standard_errors(&self) -> Vec<f64> {
        self.covariance.diagonal().iter().map(|v| v.abs().sqrt()).collect()
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("{0}")]
    InvalidProblem(String),

    #[error("no convergence after {iterations} iterations (cost {cost:.6e})")]
    NonConvergence { iterations: usize, cost: f64 },

    #[error("model produced non-finite values at iteration {iteration}")]
    NonFinite { iteration: usize },

    #[error("timed out after {} ms", .elapsed.as_millis())]
    Timeout { elapsed: Duration },
}

const MAX_LAMBDA: f64 = 1e16;

/// Fit `model` to `observed` starting from `initial`.
pub fn levenberg_marquardt<F>(
    model: F,
    observed: &[f64],
    initial: &[f64],
    options: &SolverOptions,
) -> Result<LeastSquaresFit, SolveError>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let n = observed.len();
    let p = initial.len();
    if n == 0 || p == 0 {
        return Err(SolveError::InvalidProblem(format!(
            "need at least one observation and one parameter (got {n} and {p})"
        )));
    }
    let observed = DVector::from_column_slice(observed);
    let residuals = |params: &DVector<f64>| -> Result<DVector<f64>, usize> {
        let predicted = model(params.as_slice());
        if predicted.len() != n {
            return Err(predicted.len());
        }
        Ok(DVector::from_vec(predicted) - &observed)
    };
    let wrong_len = |got: usize| {
        SolveError::InvalidProblem(format!("model returned {got} values for {n} observations"))
    };

    let start = Instant::now();
    let mut params = DVector::from_column_slice(initial);
    let mut r = residuals(&params).map_err(wrong_len)?;
    if !all_finite(&r) {
        return Err(SolveError::NonFinite { iteration: 0 });
    }
    let mut cost = r.norm_squared();
    let mut lambda = options.initial_lambda;

    for iteration in 1..=options.max_iterations {
        check_timeout(start, options.timeout)?;

        let jac = jacobian(&residuals, &params, &r).map_err(wrong_len)?;
        if !all_finite_matrix(&jac) {
            return Err(SolveError::NonFinite { iteration });
        }
        let gradient = jac.transpose() * &r;
        let jtj = jac.transpose() * &jac;
        // Finite entries can still overflow once squared and summed.
        if !cost.is_finite() || !all_finite(&gradient) || !all_finite_matrix(&jtj) {
            return Err(SolveError::NonFinite { iteration });
        }
        if cost == 0.0 || gradient_orthogonal(&jac, &gradient, cost, options.gtol) {
            return finish(&residuals, params, cost, iteration, n).map_err(wrong_len);
        }

        loop {
            let mut damped = jtj.clone();
            for j in 0..p {
                damped[(j, j)] += lambda * jtj[(j, j)].max(f64::MIN_POSITIVE.sqrt());
            }
            if !all_finite_matrix(&damped) {
                return Err(SolveError::NonFinite { iteration });
            }
            let rhs = -&gradient;
            let step = match damped.clone().cholesky() {
                Some(chol) => chol.solve(&rhs),
                None => match solve_least_squares(&damped, &rhs) {
                    Some(step) => step,
                    None => DVector::zeros(p),
                },
            };

            let step_small = step.norm() <= options.xtol * (params.norm() + options.xtol);
            let candidate = &params + &step;
            let candidate_r = residuals(&candidate).map_err(wrong_len)?;
            let candidate_cost = candidate_r.norm_squared();

            if all_finite(&candidate_r) && candidate_cost < cost {
                let reduction = (cost - candidate_cost) / cost;
                params = candidate;
                r = candidate_r;
                cost = candidate_cost;
                lambda = (lambda / 10.0).max(1e-12);
                if reduction <= options.ftol || step_small || cost == 0.0 {
                    return finish(&residuals, params, cost, iteration, n).map_err(wrong_len);
                }
                break;
            }

            // Rejected: no descent left at this point.
            if step_small || lambda > MAX_LAMBDA {
                return finish(&residuals, params, cost, iteration, n).map_err(wrong_len);
            }
            lambda *= 10.0;
            check_timeout(start, options.timeout)?;
        }
    }

    Err(SolveError::NonConvergence {
        iterations: options.max_iterations,
        cost,
    })
}

fn check_timeout(start: Instant, timeout: Option<Duration>) -> Result<(), SolveError> {
    match timeout {
        Some(limit) if start.elapsed() >= limit => Err(SolveError::Timeout {
            elapsed: start.elapsed(),
        }),
        _ => Ok(()),
    }
}

fn all_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|x| x.is_finite())
}

fn all_finite_matrix(m: &DMatrix<f64>) -> bool {
    m.iter().all(|x| x.is_finite())
}

/// Central-difference Jacobian of the residual vector.
fn jacobian<R>(residuals: &R, params: &DVector<f64>, r: &DVector<f64>) -> Result<DMatrix<f64>, usize>
where
    R: Fn(&DVector<f64>) -> Result<DVector<f64>, usize>,
{
    let p = params.len();
    let scale = params.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let rel = f64::EPSILON.cbrt();
    let mut jac = DMatrix::zeros(r.len(), p);
    let mut shifted = params.clone();
    for j in 0..p {
        let h = rel * params[j].abs().max(1e-3 * scale).max(1e-12);
        shifted[j] = params[j] + h;
        let forward = residuals(&shifted)?;
        shifted[j] = params[j] - h;
        let backward = residuals(&shifted)?;
        shifted[j] = params[j];
        jac.set_column(j, &((forward - backward) / (2.0 * h)));
    }
    Ok(jac)
}

/// MINPACK's `gnorm` test: the largest cosine between the residual vector
/// and any Jacobian column.
fn gradient_orthogonal(jac: &DMatrix<f64>, gradient: &DVector<f64>, cost: f64, gtol: f64) -> bool {
    let r_norm = cost.sqrt();
    let mut worst = 0.0_f64;
    for (j, column) in jac.column_iter().enumerate() {
        let c_norm = column.norm();
        if c_norm > 0.0 {
            worst = worst.max(gradient[j].abs() / (c_norm * r_norm));
        }
    }
    worst <= gtol
}

fn finish<R>(
    residuals: &R,
    params: DVector<f64>,
    cost: f64,
    iterations: usize,
    n: usize,
) -> Result<LeastSquaresFit, usize>
where
    R: Fn(&DVector<f64>) -> Result<DVector<f64>, usize>,
{
    let p = params.len();
    let r = residuals(&params)?;
    let covariance = if n > p {
        let jac = jacobian(residuals, &params, &r)?;
        let jtj = jac.transpose() * &jac;
        match pseudo_inverse(&jtj, f64::EPSILON * p.max(n) as f64) {
            Some(inv) if all_finite_matrix(&jac) => inv * (cost / (n - p) as f64),
            _ => DMatrix::from_element(p, p, f64::INFINITY),
        }
    } else {
        DMatrix::from_element(p, p, f64::INFINITY)
    };
    Ok(LeastSquaresFit {
        params: params.iter().copied().collect(),
        cost,
        iterations,
        covariance,
    })
}
