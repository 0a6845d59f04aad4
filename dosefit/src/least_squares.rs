use crate::{Curve, Error, Result};
use faer::{Mat, linalg::solvers::Solve};
use faer_ext::IntoFaer;
use nalgebra::{DMatrix, DVector, SMatrix, SVector};
use std::sync::Arc;

/// Configuration of [LeastSquares].
#[derive(Debug, Clone, PartialEq)]
pub struct LeastSquaresOptions {
    max_iter: usize,
    ftol: f64,
    xtol: f64,
    lambda_init: f64,
    lambda_up: f64,
    lambda_down: f64,
    lambda_max: f64,
}

impl Default for LeastSquaresOptions {
    fn default() -> Self {
        Self {
            max_iter: 1_000,
            ftol: 1e-14,
            xtol: 1e-12,
            lambda_init: 1e-3,
            lambda_up: 10.,
            lambda_down: 0.1,
            lambda_max: 1e12,
        }
    }
}

impl LeastSquaresOptions {
    /// Creates a new least squares configuration with its default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns options with given iteration budget.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Returns options with given relative cost reduction at which the solver stops.
    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.ftol = ftol;
        self
    }
}

/// Box constraint of the curve parameters, infinite entries leave a side open.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBound<const P: usize> {
    /// Lower bound.
    pub lower: SVector<f64, P>,
    /// Upper bound.
    pub upper: SVector<f64, P>,
}

impl<const P: usize> ParameterBound<P> {
    /// Creates the parameter bound.
    pub fn new(lower: SVector<f64, P>, upper: SVector<f64, P>) -> Result<Self> {
        let invalid = |i: &usize| lower[*i].is_nan() || upper[*i].is_nan() || lower[*i] > upper[*i];
        if let Some(dim) = (0..P).find(invalid) {
            return Err(Error::InvalidInput {
                field: "bound",
                reason: format!(
                    "lower bound {} exceeds upper bound {} on parameter {dim}",
                    lower[dim], upper[dim]
                ),
            });
        }
        Ok(Self { lower, upper })
    }

    /// Bound without constraints.
    pub fn unbounded() -> Self {
        Self {
            lower: SVector::from_element(f64::NEG_INFINITY),
            upper: SVector::from_element(f64::INFINITY),
        }
    }

    /// Projects `params` onto the box.
    pub fn project(&self, params: &SVector<f64, P>) -> SVector<f64, P> {
        SVector::from_fn(|i, _| params[i].clamp(self.lower[i], self.upper[i]))
    }
}

/// Converged state of a [LeastSquares] run.
#[derive(Debug, Clone, PartialEq)]
pub struct LeastSquaresReport<const P: usize> {
    /// Fitted parameters.
    pub params: SVector<f64, P>,
    /// Half the residual sum of squares at `params`.
    pub cost: f64,
    /// Accepted and rejected iterations.
    pub iterations: usize,
}

struct NormalEquations<const P: usize> {
    cost: f64,
    jtj: SMatrix<f64, P, P>,
    jtr: SVector<f64, P>,
}

/// Bounded nonlinear least squares solver fitting a [Curve] to data.
///
/// Projected Levenberg-Marquardt: the Marquardt-scaled Gauss-Newton step is solved with a
/// dense LU over the parameters not held at a bound and projected onto the
/// [ParameterBound]; it is accepted when the cost decreases, otherwise the damping grows until
/// the step becomes a short projected gradient step.
pub struct LeastSquares<const P: usize> {
    options: LeastSquaresOptions,
    bound: ParameterBound<P>,
    curve: Arc<dyn Curve<P> + Send + Sync>,
}

impl<const P: usize> LeastSquares<P> {
    /// Initialize the least squares solver.
    pub fn new(
        options: LeastSquaresOptions,
        bound: ParameterBound<P>,
        curve: Arc<dyn Curve<P> + Send + Sync>,
    ) -> Self {
        Self {
            options,
            bound,
            curve,
        }
    }

    /// Returns the parameters minimizing the residual sum of squares between the curve at `x`
    /// and `y`, starting from `p0`.
    pub fn minimize(
        &self,
        x: &DVector<f64>,
        y: &DVector<f64>,
        p0: SVector<f64, P>,
    ) -> Result<LeastSquaresReport<P>> {
        if x.len() != y.len() {
            return Err(Error::ShapeMismatch {
                vec1: "x",
                vec2: "y",
                len1: x.len(),
                len2: y.len(),
            });
        }
        let mut params = self.bound.project(&p0);
        let mut eq = self.normal_equations(x, y, &params);
        if !eq.cost.is_finite() {
            return Err(Error::FitDivergence {
                iterations: 0,
                reason: "non-finite residuals at the initial guess",
            });
        }

        let mut lambda = self.options.lambda_init;
        for iter in 1..=self.options.max_iter {
            let step = self.damped_step(&eq, &params, lambda);
            let candidate = self.bound.project(&(params + step));
            let candidate_eq = self.normal_equations(x, y, &candidate);

            if candidate_eq.cost.is_finite() && candidate_eq.cost < eq.cost {
                let reduction = eq.cost - candidate_eq.cost;
                let moved = (candidate - params).norm();
                let converged = reduction <= self.options.ftol * eq.cost
                    || moved <= self.options.xtol * (params.norm() + self.options.xtol);
                params = candidate;
                eq = candidate_eq;
                lambda = (lambda * self.options.lambda_down).max(1e-15);
                if converged || eq.cost == 0. {
                    return Ok(self.report(params, eq.cost, iter));
                }
            } else {
                lambda *= self.options.lambda_up;
                if lambda > self.options.lambda_max {
                    // no descent left along the projected gradient
                    return Ok(self.report(params, eq.cost, iter));
                }
            }
        }
        Err(Error::FitDivergence {
            iterations: self.options.max_iter,
            reason: "iteration budget exhausted",
        })
    }

    fn report(
        &self,
        params: SVector<f64, P>,
        cost: f64,
        iterations: usize,
    ) -> LeastSquaresReport<P> {
        tracing::debug!(cost, iterations, "least squares converged");
        LeastSquaresReport {
            params,
            cost,
            iterations,
        }
    }

    fn normal_equations(
        &self,
        x: &DVector<f64>,
        y: &DVector<f64>,
        params: &SVector<f64, P>,
    ) -> NormalEquations<P> {
        let mut cost = 0.;
        let mut jtj = SMatrix::<f64, P, P>::zeros();
        let mut jtr = SVector::<f64, P>::zeros();
        for (&xi, &yi) in x.iter().zip(y.iter()) {
            let (val, grad) = self.curve.val_grad(xi, params);
            let r = val - yi;
            cost += 0.5 * r * r;
            jtj += grad * grad.transpose();
            jtr += grad * r;
        }
        NormalEquations { cost, jtj, jtr }
    }

    fn damped_step(
        &self,
        eq: &NormalEquations<P>,
        params: &SVector<f64, P>,
        lambda: f64,
    ) -> SVector<f64, P> {
        // parameters held at a bound by the gradient are frozen for this step
        let active = (0..P)
            .map(|i| {
                (params[i] <= self.bound.lower[i] && eq.jtr[i] > 0.)
                    || (params[i] >= self.bound.upper[i] && eq.jtr[i] < 0.)
            })
            .collect::<Vec<_>>();
        let a = DMatrix::from_fn(P, P, |i, j| {
            if active[i] || active[j] {
                if i == j { 1. } else { 0. }
            } else if i == j {
                eq.jtj[(i, i)] + lambda * eq.jtj[(i, i)].max(1e-12)
            } else {
                eq.jtj[(i, j)]
            }
        });
        let b = DVector::from_fn(P, |i, _| if active[i] { 0. } else { -eq.jtr[i] });
        let a: Mat<f64> = a.view_range(.., ..).into_faer().to_owned();
        let b: Mat<f64> = b.view_range(.., ..).into_faer().to_owned();
        let step = a.partial_piv_lu().solve(&b);
        SVector::from_fn(|i, _| step[(i, 0)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CurveFunction;
    use dosefit_derive::Curve;
    use num_dual::DualNum;

    #[derive(Curve)]
    #[parameters = 2]
    struct Hyperbola;

    impl CurveFunction<2> for Hyperbola {
        fn f<D: DualNum<f64>>(&self, x: f64, params: &SVector<D, 2>) -> D {
            params[0].clone() * D::from(x) / (params[1].clone() + D::from(x))
        }
    }

    fn hyperbola_data(vmax: f64, km: f64) -> (DVector<f64>, DVector<f64>) {
        let x = DVector::from_vec(vec![0.5, 1., 2., 5., 10., 20., 50.]);
        let y = x.map(|s| vmax * s / (km + s));
        (x, y)
    }

    #[test]
    fn test_least_squares_unbounded() -> Result<()> {
        let (x, y) = hyperbola_data(2., 4.);
        let solver = LeastSquares::new(
            LeastSquaresOptions::new(),
            ParameterBound::unbounded(),
            Arc::new(Hyperbola),
        );
        let report = solver.minimize(&x, &y, SVector::<f64, 2>::new(1., 1.))?;
        assert!((report.params[0] - 2.).abs() < 1e-6);
        assert!((report.params[1] - 4.).abs() < 1e-6);
        assert!(report.cost < 1e-12);
        Ok(())
    }

    #[test]
    fn test_least_squares_active_bound() -> Result<()> {
        let (x, y) = hyperbola_data(2., 4.);
        let bound = ParameterBound::new(
            SVector::<f64, 2>::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            SVector::<f64, 2>::new(1.5, f64::INFINITY),
        )?;
        let solver = LeastSquares::new(LeastSquaresOptions::new(), bound, Arc::new(Hyperbola));
        let report = solver.minimize(&x, &y, SVector::<f64, 2>::new(1., 1.))?;
        assert!(report.params[0] <= 1.5);
        assert!((report.params[0] - 1.5).abs() < 1e-6);
        Ok(())
    }

    #[test]
    fn test_least_squares_shape_mismatch() -> Result<()> {
        let solver = LeastSquares::new(
            LeastSquaresOptions::new(),
            ParameterBound::unbounded(),
            Arc::new(Hyperbola),
        );
        let x = DVector::from_vec(vec![1., 2.]);
        let y = DVector::from_vec(vec![1.]);
        let report = solver.minimize(&x, &y, SVector::<f64, 2>::new(1., 1.));
        assert_eq!(
            report,
            Err(Error::ShapeMismatch {
                vec1: "x",
                vec2: "y",
                len1: 2,
                len2: 1,
            })
        );
        Ok(())
    }

    #[test]
    fn test_least_squares_budget() -> Result<()> {
        let (x, y) = hyperbola_data(2., 4.);
        let solver = LeastSquares::new(
            LeastSquaresOptions::new().with_max_iter(1).with_ftol(0.),
            ParameterBound::unbounded(),
            Arc::new(Hyperbola),
        );
        let report = solver.minimize(&x, &y, SVector::<f64, 2>::new(100., 100.));
        assert!(matches!(report, Err(Error::FitDivergence { iterations: 1, .. })));
        Ok(())
    }

    #[test]
    fn test_parameter_bound() -> Result<()> {
        let bound = ParameterBound::new(
            SVector::<f64, 2>::new(0., 0.),
            SVector::<f64, 2>::new(1., f64::INFINITY),
        )?;
        let p = bound.project(&SVector::<f64, 2>::new(-1., 5.));
        assert_eq!(p, SVector::<f64, 2>::new(0., 5.));
        let bound = ParameterBound::new(
            SVector::<f64, 2>::new(0., 2.),
            SVector::<f64, 2>::new(1., 1.),
        );
        assert!(matches!(bound, Err(Error::InvalidInput { field: "bound", .. })));
        Ok(())
    }
}
