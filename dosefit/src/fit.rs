use crate::{
    Error, FourParameterLogistic, LeastSquares, LeastSquaresOptions, LogisticCurve,
    ParameterBound, Result,
    curve::{BOTTOM, HILL, LN_EC, TOP},
    grid::distinct_count,
    utils::round_to,
};
use nalgebra::{DVector, SVector};
use std::{fmt::Display, sync::Arc};

/// Number of points of a dense fitted trace.
pub const FIT_TRACE_POINTS: usize = 50_000;

/// Admissible Hill slope range.
pub const HILL_BOUNDS: (f64, f64) = (0.5, 2.5);

/// Whether a half-effect concentration stimulates or inhibits the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PotencyKind {
    /// Half maximal effective concentration.
    EC50,
    /// Half maximal inhibitory concentration.
    IC50,
}

impl Display for PotencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PotencyKind::EC50 => write!(f, "EC50"),
            PotencyKind::IC50 => write!(f, "IC50"),
        }
    }
}

/// Potency read off a fitted [LogisticCurve].
///
/// Concentrations are assumed to be in uM: the negative log transform converts the fitted
/// half-effect concentration to molar before taking the logarithm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Potency {
    /// EC50 or IC50.
    pub kind: PotencyKind,
    /// Half-effect concentration in uM, rounded to 5 decimals.
    pub value: f64,
    /// pEC50 or pIC50, rounded to 2 decimals.
    pub p_value: f64,
}

impl Potency {
    /// Reads the potency off a fitted curve.
    pub fn from_curve(curve: &LogisticCurve, kind: PotencyKind) -> Self {
        Self {
            kind,
            value: round_to(curve.ec, 5),
            p_value: round_to(-(curve.ec * 1e-6).log10(), 2),
        }
    }
}

impl Display for Potency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} = {} uM, p{} = {:.2}",
            self.kind, self.value, self.kind, self.p_value
        )
    }
}

/// Fits the four parameter logistic to dose-response data.
///
/// Bounds are derived from the data: the lower asymptote is at least the smallest response,
/// the upper asymptote at most the largest response and the Hill slope lies within
/// [HILL_BOUNDS]. The half-effect concentration is searched on a log scale within the tested
/// concentrations widened by `ec_margin_decades` on both sides.
#[derive(Debug, Clone, PartialEq)]
pub struct DoseResponseFitter {
    options: LeastSquaresOptions,
    ec_margin_decades: f64,
}

impl Default for DoseResponseFitter {
    fn default() -> Self {
        Self {
            options: LeastSquaresOptions::default(),
            ec_margin_decades: 4.,
        }
    }
}

impl DoseResponseFitter {
    /// Creates the fitter with default solver options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fitter with given [LeastSquaresOptions].
    pub fn with_options(mut self, options: LeastSquaresOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the fitter with given search margin of the half-effect concentration.
    pub fn with_ec_margin_decades(mut self, decades: f64) -> Self {
        self.ec_margin_decades = decades;
        self
    }

    /// Fits `y = Bottom + (Top - Bottom) / (1 + (EC/x)^p)` to the concentrations `x` and
    /// responses `y`.
    pub fn fit(&self, x: &DVector<f64>, y: &DVector<f64>) -> Result<LogisticCurve> {
        if x.len() != y.len() {
            return Err(Error::ShapeMismatch {
                vec1: "concentrations",
                vec2: "responses",
                len1: x.len(),
                len2: y.len(),
            });
        }
        if let Some(v) = x.iter().find(|v| !v.is_finite() || **v <= 0.) {
            return Err(Error::InvalidInput {
                field: "concentrations",
                reason: format!("concentrations must be positive and finite, found {v}"),
            });
        }
        if let Some(v) = y.iter().find(|v| !v.is_finite()) {
            return Err(Error::InvalidInput {
                field: "responses",
                reason: format!("responses must be finite, found {v}"),
            });
        }
        if distinct_count(x.as_slice()) < 4 {
            return Err(Error::FitDivergence {
                iterations: 0,
                reason: "fewer than 4 distinct concentrations for 4 curve parameters",
            });
        }

        let margin = self.ec_margin_decades * std::f64::consts::LN_10;
        let lower = SVector::<f64, 4>::new(
            y.min(),
            f64::NEG_INFINITY,
            x.min().ln() - margin,
            HILL_BOUNDS.0,
        );
        let upper = SVector::<f64, 4>::new(
            f64::INFINITY,
            y.max(),
            x.max().ln() + margin,
            HILL_BOUNDS.1,
        );
        let bound = ParameterBound::new(lower, upper)?;

        let solver =
            LeastSquares::new(self.options.clone(), bound, Arc::new(FourParameterLogistic));
        let report = solver.minimize(x, y, initial_guess(x, y))?;
        let curve = LogisticCurve::from_params(&report.params);
        tracing::debug!(
            bottom = curve.bottom,
            top = curve.top,
            ec = curve.ec,
            hill = curve.hill,
            iterations = report.iterations,
            "logistic fitted"
        );
        Ok(curve)
    }

    /// Fits the data and returns the curve together with its dense trace between the lowest
    /// and highest concentration.
    pub fn fit_with_trace(
        &self,
        x: &DVector<f64>,
        y: &DVector<f64>,
    ) -> Result<(LogisticCurve, (DVector<f64>, DVector<f64>))> {
        let curve = self.fit(x, y)?;
        let trace = curve.trace(x.min(), x.max(), FIT_TRACE_POINTS);
        Ok((curve, trace))
    }
}

/// Starting point taken from the data: asymptotes at the responses of the lowest and highest
/// concentration, EC where the response crosses its midpoint.
fn initial_guess(x: &DVector<f64>, y: &DVector<f64>) -> SVector<f64, 4> {
    let mut pairs = x.iter().copied().zip(y.iter().copied()).collect::<Vec<_>>();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
    let bottom = pairs[0].1;
    let top = pairs[pairs.len() - 1].1;
    let mid = 0.5 * (bottom + top);
    let ln_ec = pairs
        .windows(2)
        .find(|w| (w[0].1 - mid) * (w[1].1 - mid) <= 0. && w[0].1 != w[1].1)
        .map(|w| {
            let t = (mid - w[0].1) / (w[1].1 - w[0].1);
            w[0].0.ln() + t * (w[1].0.ln() - w[0].0.ln())
        })
        .unwrap_or_else(|| 0.5 * (pairs[0].0.ln() + pairs[pairs.len() - 1].0.ln()));

    let mut p0 = SVector::<f64, 4>::zeros();
    p0[BOTTOM] = bottom;
    p0[TOP] = top;
    p0[LN_EC] = ln_ec;
    p0[HILL] = 1.;
    p0
}
