use crate::grid::geomspace;
use dosefit_derive::Curve;
use nalgebra::{DVector, SVector};
use num_dual::DualNum;

/// Required value function for [Curve] derive.
pub trait CurveFunction<const P: usize> {
    /// Defines the response at concentration `x` for the given curve parameters.
    fn f<D: DualNum<f64>>(&self, x: f64, params: &SVector<D, P>) -> D;
}

/// Defines the value and parameter gradient of a parametric dose-response curve.
pub trait Curve<const P: usize> {
    /// Value function.
    fn val(&self, x: f64, params: &SVector<f64, P>) -> f64;
    /// Value and gradient with respect to the curve parameters.
    fn val_grad(&self, x: f64, params: &SVector<f64, P>) -> (f64, SVector<f64, P>);
}

/// Index of the lower asymptote in [FourParameterLogistic] parameters.
pub const BOTTOM: usize = 0;
/// Index of the upper asymptote in [FourParameterLogistic] parameters.
pub const TOP: usize = 1;
/// Index of the natural log of the half-effect concentration.
pub const LN_EC: usize = 2;
/// Index of the Hill slope.
pub const HILL: usize = 3;

#[cfg_attr(doc, katexit::katexit)]
/// Four parameter logistic dose-response model
///
/// $$ y(x) = B + \frac{T - B}{1 + (EC/x)^p} $$
///
/// parametrized as $(B, T, \ln EC, p)$ so the half-effect concentration stays positive while
/// the fit moves across several decades of concentration.
#[derive(Curve, Debug, Clone, Copy, Default)]
#[parameters = 4]
pub struct FourParameterLogistic;

impl CurveFunction<4> for FourParameterLogistic {
    fn f<D: DualNum<f64>>(&self, x: f64, params: &SVector<D, 4>) -> D {
        let bottom = params[BOTTOM].clone();
        let top = params[TOP].clone();
        let z = (params[LN_EC].clone() - D::from(x.ln())) * params[HILL].clone();
        bottom.clone() + (top - bottom) / (z.exp() + D::from(1.))
    }
}

/// Fitted four parameter logistic curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticCurve {
    /// Response as x approaches zero.
    pub bottom: f64,
    /// Response as x approaches infinity.
    pub top: f64,
    /// Half-effect concentration (EC50 or IC50) in the unit of x.
    pub ec: f64,
    /// Hill slope.
    pub hill: f64,
}

impl LogisticCurve {
    /// Creates a curve from its natural parameters.
    pub fn new(bottom: f64, top: f64, ec: f64, hill: f64) -> Self {
        Self {
            bottom,
            top,
            ec,
            hill,
        }
    }

    /// Creates a curve from the [FourParameterLogistic] parameter vector.
    pub fn from_params(params: &SVector<f64, 4>) -> Self {
        Self::new(
            params[BOTTOM],
            params[TOP],
            params[LN_EC].exp(),
            params[HILL],
        )
    }

    /// Returns the [FourParameterLogistic] parameter vector.
    pub fn params(&self) -> SVector<f64, 4> {
        SVector::<f64, 4>::new(self.bottom, self.top, self.ec.ln(), self.hill)
    }

    /// Evaluates the curve at `x`.
    pub fn evaluate(&self, x: f64) -> f64 {
        let z = self.hill * (self.ec.ln() - x.ln());
        // logistic of -z without overflowing exp
        let frac = if z > 0. {
            let e = (-z).exp();
            e / (1. + e)
        } else {
            1. / (1. + z.exp())
        };
        self.bottom + (self.top - self.bottom) * frac
    }

    /// Evaluates the curve at every element of `x`.
    pub fn evaluate_all(&self, x: &DVector<f64>) -> DVector<f64> {
        x.map(|v| self.evaluate(v))
    }

    /// Dense fitted trace of `num` log-spaced points between `x_min` and `x_max`.
    pub fn trace(&self, x_min: f64, x_max: f64, num: usize) -> (DVector<f64>, DVector<f64>) {
        let x = geomspace(x_min, x_max, num);
        let y = self.evaluate_all(&x);
        (x, y)
    }

    #[cfg_attr(doc, katexit::katexit)]
    /// Returns the negative derivative of the curve with respect to its Hill slope,
    ///
    /// $$ -\frac{\partial y}{\partial p} = \frac{(x/EC)^p (B - T) \ln(x/EC)}{((x/EC)^p + 1)^2} $$
    ///
    /// whose minimum over x marks the maximum bend point of the sigmoid.
    pub fn hill_sensitivity(&self, x: f64) -> f64 {
        let l = (x / self.ec).ln();
        (self.bottom - self.top) * l / (2. + 2. * (self.hill * l).cosh())
    }
}
