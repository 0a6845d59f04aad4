use crate::{Error, LogisticCurve, Result, utils::round_to};
use argmin::{
    core::{CostFunction, Executor, State, TerminationReason, TerminationStatus},
    solver::neldermead::NelderMead,
};
use nalgebra::DVector;

const SOLVER: &str = "nelder-mead";

/// Hill sensitivity of a curve on `log10(x)`, walled off outside the domain.
struct BendObjective {
    curve: LogisticCurve,
    scale: f64,
    lo: f64,
    hi: f64,
}

impl BendObjective {
    fn new(curve: &LogisticCurve, lo: f64, hi: f64) -> Self {
        let amplitude = (curve.top - curve.bottom).abs();
        Self {
            curve: *curve,
            scale: if amplitude > 0. { amplitude } else { 1. },
            lo,
            hi,
        }
    }
}

impl CostFunction for BendObjective {
    type Param = f64;
    type Output = f64;

    fn cost(&self, u: &f64) -> std::result::Result<f64, argmin::core::Error> {
        if *u < self.lo || *u > self.hi {
            return Ok(f64::INFINITY);
        }
        Ok(self.curve.hill_sensitivity(10_f64.powf(*u)) / self.scale)
    }
}

/// Locates the maximum bend point of a fitted sigmoid, used as the effective submaximal
/// concentration of a ligand.
///
/// The objective is [LogisticCurve::hill_sensitivity], minimized with the argmin
/// Nelder-Mead solver on `log10(x)` inside `[min(x_domain), max(x_domain)]`. The simplex
/// is seeded at the domain maximum with its second vertex a fraction of the log-domain
/// width further inwards.
#[derive(Debug, Clone)]
pub struct SubmaximalPointFinder {
    max_iter: u64,
    initial_step: f64,
}

impl Default for SubmaximalPointFinder {
    fn default() -> Self {
        Self {
            max_iter: 1_000,
            initial_step: 0.05,
        }
    }
}

impl SubmaximalPointFinder {
    /// Creates the finder with an iteration budget of 1000.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the finder with given simplex iteration budget.
    pub fn with_max_iter(mut self, max_iter: u64) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Returns the finder with given initial simplex size as fraction of the log-domain width.
    pub fn with_initial_step(mut self, fraction: f64) -> Self {
        self.initial_step = fraction;
        self
    }

    /// Submaximal concentration of `curve` within the range of `x_domain`, rounded to 3
    /// decimals.
    pub fn find(&self, curve: &LogisticCurve, x_domain: &DVector<f64>) -> Result<f64> {
        let (lo, hi) = log_domain(x_domain)?;
        self.search(curve, lo, hi, hi)
    }

    /// Same as [SubmaximalPointFinder::find] with the simplex seeded at concentration `seed`.
    pub fn find_from(
        &self,
        curve: &LogisticCurve,
        x_domain: &DVector<f64>,
        seed: f64,
    ) -> Result<f64> {
        let (lo, hi) = log_domain(x_domain)?;
        if !seed.is_finite() || seed <= 0. {
            return Err(Error::InvalidInput {
                field: "seed",
                reason: format!("seed concentration must be positive and finite, got {seed}"),
            });
        }
        self.search(curve, lo, hi, seed.log10().clamp(lo, hi))
    }

    fn search(&self, curve: &LogisticCurve, lo: f64, hi: f64, seed: f64) -> Result<f64> {
        // step inwards from whichever edge the seed is closer to
        let width = (hi - lo) * self.initial_step;
        let step = if hi - seed < seed - lo { -width } else { width };
        let solver = NelderMead::new(vec![seed, seed + step]);
        let res = Executor::new(BendObjective::new(curve, lo, hi), solver)
            .configure(|state| state.max_iters(self.max_iter))
            .run()
            .map_err(|e| Error::SolverFailure {
                solver: SOLVER,
                message: e.to_string(),
            })?;

        let state = res.state();
        match state.get_termination_status() {
            TerminationStatus::Terminated(TerminationReason::SolverConverged) => {}
            TerminationStatus::Terminated(TerminationReason::MaxItersReached) => {
                return Err(Error::NoConvergence {
                    solver: SOLVER,
                    max_iter: self.max_iter as usize,
                });
            }
            status => {
                return Err(Error::SolverFailure {
                    solver: SOLVER,
                    message: status.to_string(),
                });
            }
        }
        let u = state.get_best_param().copied().ok_or_else(|| Error::SolverFailure {
            solver: SOLVER,
            message: "no best vertex".to_string(),
        })?;
        let x = round_to(10_f64.powf(u), 3);
        tracing::debug!(x, iterations = state.get_iter(), "submaximal concentration found");
        Ok(x)
    }
}

fn log_domain(x_domain: &DVector<f64>) -> Result<(f64, f64)> {
    if x_domain.iter().any(|v| !v.is_finite() || *v <= 0.) {
        return Err(Error::InvalidInput {
            field: "x_domain",
            reason: "domain concentrations must be positive and finite".to_string(),
        });
    }
    if x_domain.len() < 2 || x_domain.min() == x_domain.max() {
        return Err(Error::InvalidInput {
            field: "x_domain",
            reason: "domain needs two distinct concentrations".to_string(),
        });
    }
    Ok((x_domain.min().log10(), x_domain.max().log10()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::geomspace;

    // maximizer of u ln(u) / (1 + u)^2 over u > 1
    const BEND: f64 = 4.680_498_6;

    #[test]
    fn test_submaximal_unit_curve() -> Result<()> {
        let curve = LogisticCurve::new(0., 100., 1., 1.);
        let x = SubmaximalPointFinder::new().find(&curve, &geomspace(1e-3, 1e3, 7))?;
        assert!((x - BEND).abs() <= 1e-3);
        Ok(())
    }

    #[test]
    fn test_submaximal_scales_with_curve() -> Result<()> {
        let domain = geomspace(1e-4, 1e3, 8);
        for (ec, hill) in [(0.01, 1.), (0.5, 2.), (2., 0.7)] {
            let curve = LogisticCurve::new(0., 1., ec, hill);
            let x = SubmaximalPointFinder::new().find(&curve, &domain)?;
            let expected = ec * BEND.powf(1. / hill);
            assert!((x - expected).abs() <= 1e-3 + 1e-6 * expected);
            assert!(x > domain.min() && x < domain.max());
        }
        Ok(())
    }

    #[test]
    fn test_submaximal_small_amplitude() -> Result<()> {
        // receptor occupancy in uM spans only a fraction of a nanomolar
        let curve = LogisticCurve::new(0., 1e-4, 0.01, 1.);
        let x = SubmaximalPointFinder::new().find(&curve, &geomspace(1e-5, 1e2, 8))?;
        assert!((x - 0.01 * BEND).abs() <= 1e-3);
        Ok(())
    }

    #[test]
    fn test_submaximal_from_seed() -> Result<()> {
        let curve = LogisticCurve::new(0., 100., 1., 1.);
        let domain = geomspace(1e-3, 1e3, 7);
        let x = SubmaximalPointFinder::new().find_from(&curve, &domain, 2.)?;
        assert!((x - BEND).abs() <= 1e-3);
        assert!(matches!(
            SubmaximalPointFinder::new().find_from(&curve, &domain, -1.),
            Err(Error::InvalidInput { field: "seed", .. })
        ));
        Ok(())
    }

    #[test]
    fn test_submaximal_budget() -> Result<()> {
        let curve = LogisticCurve::new(0., 100., 1., 1.);
        let x = SubmaximalPointFinder::new()
            .with_max_iter(2)
            .find(&curve, &geomspace(1e-3, 1e3, 7));
        assert_eq!(
            x,
            Err(Error::NoConvergence {
                solver: "nelder-mead",
                max_iter: 2,
            })
        );
        Ok(())
    }

    #[test]
    fn test_submaximal_degenerate_domain() -> Result<()> {
        let curve = LogisticCurve::new(0., 100., 1., 1.);
        let x = SubmaximalPointFinder::new().find(&curve, &DVector::from_element(3, 1.));
        assert!(matches!(x, Err(Error::InvalidInput { field: "x_domain", .. })));
        Ok(())
    }
}
