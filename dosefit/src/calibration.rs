use crate::{
    Error, NetworkSeed, Parameters, Result, SignalingNetwork, Simulator, TimeGrid,
    utils::{find_peaks, round_to, stated_decimals},
};
use std::ops::ControlFlow;

/// Parameter holding the warm-up time excluded from peak detection.
pub const TIME_IN: &str = "time_in";

/// Configuration of a [ParameterCalibrationSearch].
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationConfig {
    target_parameter: String,
    observable: String,
    target_ratio: f64,
    seed: f64,
    increment: f64,
    decrement: f64,
    max_iter: usize,
    time_in: Option<f64>,
    total_time: Option<f64>,
    steps: Option<usize>,
    overrides: Parameters,
}

impl CalibrationConfig {
    /// Calibrates `target_parameter` until the peak of `observable` changes by
    /// `target_ratio`.
    pub fn new(
        target_parameter: impl Into<String>,
        observable: impl Into<String>,
        target_ratio: f64,
    ) -> Self {
        Self {
            target_parameter: target_parameter.into(),
            observable: observable.into(),
            target_ratio,
            seed: 1.,
            increment: 0.1,
            decrement: 0.1,
            max_iter: 100,
            time_in: None,
            total_time: None,
            steps: None,
            overrides: Parameters::new(),
        }
    }

    /// Returns the config with given initial scale factor.
    pub fn with_seed(mut self, seed: f64) -> Self {
        self.seed = seed;
        self
    }

    /// Returns the config with given scale factor steps taken when the ratio is below or
    /// above the target.
    pub fn with_steps(mut self, increment: f64, decrement: f64) -> Self {
        self.increment = increment;
        self.decrement = decrement;
        self
    }

    /// Returns the config with given maximum number of trials.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Returns the config with given warm-up time in seconds, taking precedence over the
    /// `time_in` parameter.
    pub fn with_time_in(mut self, time_in: f64) -> Self {
        self.time_in = Some(time_in);
        self
    }

    /// Returns the config with given simulated time in seconds and number of time points.
    pub fn with_time(mut self, total_time: f64, steps: usize) -> Self {
        self.total_time = Some(total_time);
        self.steps = Some(steps);
        self
    }

    /// Returns the config with parameters overriding the network defaults.
    pub fn with_overrides(mut self, overrides: Parameters) -> Self {
        self.overrides = overrides;
        self
    }

    fn validate(&self) -> Result<TimeGrid> {
        let positive = |field: &'static str, value: f64| {
            if value.is_finite() && value > 0. {
                Ok(())
            } else {
                Err(Error::InvalidInput {
                    field,
                    reason: format!("must be positive and finite, got {value}"),
                })
            }
        };
        positive("target_ratio", self.target_ratio)?;
        positive("increment", self.increment)?;
        positive("decrement", self.decrement)?;
        if !self.seed.is_finite() {
            return Err(Error::InvalidInput {
                field: "seed",
                reason: format!("must be finite, got {}", self.seed),
            });
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidInput {
                field: "max_iter",
                reason: "at least one trial is required".to_string(),
            });
        }
        if self.observable.is_empty() {
            return Err(Error::InvalidInput {
                field: "observable",
                reason: "observable name is empty".to_string(),
            });
        }
        if let Some(time_in) = self.time_in {
            if !time_in.is_finite() || time_in < 0. {
                return Err(Error::InvalidInput {
                    field: "time_in",
                    reason: format!("must be non-negative and finite, got {time_in}"),
                });
            }
        }
        let missing = |field: &'static str| Error::InvalidInput {
            field,
            reason: "required field is not set".to_string(),
        };
        let total_time = self.total_time.ok_or_else(|| missing("total_time"))?;
        let steps = self.steps.ok_or_else(|| missing("steps"))?;
        TimeGrid::new(total_time, steps)
    }
}

/// Observable time course after the warm-up window with its local maxima.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakTrace {
    /// Time points after the warm-up window.
    pub time: Vec<f64>,
    /// Observable at `time`.
    pub values: Vec<f64>,
    /// Indices of the local maxima in `values`.
    pub peaks: Vec<usize>,
}

impl PeakTrace {
    /// Cuts the warm-up window `t <= time_in` and detects the local maxima.
    pub fn new(time: &[f64], values: &[f64], time_in: f64) -> Self {
        let (time, values): (Vec<_>, Vec<_>) = time
            .iter()
            .zip(values)
            .filter(|(t, _)| **t > time_in)
            .map(|(t, v)| (*t, *v))
            .unzip();
        let peaks = find_peaks(&values);
        Self {
            time,
            values,
            peaks,
        }
    }

    /// Value of the last local maximum.
    pub fn last_peak(&self) -> Option<f64> {
        self.peaks.last().map(|&i| self.values[i])
    }

    /// Area under the curve by the trapezoidal rule.
    pub fn auc(&self) -> f64 {
        self.time
            .windows(2)
            .zip(self.values.windows(2))
            .map(|(t, v)| 0.5 * (t[1] - t[0]) * (v[0] + v[1]))
            .sum()
    }
}

/// One evaluated scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Trial {
    /// Scale factor of the target parameter.
    pub seed: f64,
    /// Rounded peak ratio of perturbed over baseline run.
    pub ratio: f64,
}

/// Termination of a calibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationOutcome {
    /// The ratio matched the target, `fold` is the seed at the target's precision.
    Converged {
        /// Calibrated scale factor.
        fold: f64,
    },
    /// Every trial was spent without a match.
    Exhausted,
}

/// Progress of a calibration after one trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationProgress {
    /// Completed trials.
    pub iteration: usize,
    /// Trial budget.
    pub max_iter: usize,
    /// Evaluated trial.
    pub trial: Trial,
}

/// Result of a [ParameterCalibrationSearch].
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationReport {
    /// Calibrated parameter.
    pub target_parameter: String,
    /// Experimental ratio.
    pub target_ratio: f64,
    /// Converged or exhausted.
    pub outcome: CalibrationOutcome,
    /// Trials in evaluation order.
    pub trials: Vec<Trial>,
    /// Baseline observable.
    pub baseline: PeakTrace,
    /// Observable of the last trial.
    pub perturbed: PeakTrace,
}

impl CalibrationReport {
    /// Trial with the ratio closest to the target, the earliest one on ties.
    pub fn best(&self) -> Option<Trial> {
        self.trials.iter().copied().reduce(|best, t| {
            if (t.ratio - self.target_ratio).abs() < (best.ratio - self.target_ratio).abs() {
                t
            } else {
                best
            }
        })
    }

    /// Plot series of the search: trial number, seed and ratio.
    pub fn iteration_series(&self) -> (Vec<usize>, Vec<f64>, Vec<f64>) {
        let iterations = (1..=self.trials.len()).collect();
        let seeds = self.trials.iter().map(|t| t.seed).collect();
        let ratios = self.trials.iter().map(|t| t.ratio).collect();
        (iterations, seeds, ratios)
    }

    /// Last peak of the baseline and of the last trial.
    pub fn amplitudes(&self) -> (Option<f64>, Option<f64>) {
        (self.baseline.last_peak(), self.perturbed.last_peak())
    }
}

/// Step search of the scale factor of one kinetic parameter matching an experimental peak
/// ratio.
///
/// The baseline is simulated once with kinetic binding and the merged parameters. Every
/// trial sets the target parameter to its network default times the seed, compares the
/// rounded peak ratio with the target at the target's stated precision and moves the seed up
/// by the increment or down by the decrement. The steps do not adapt, so too coarse steps
/// may oscillate around the target until the budget is spent.
pub struct ParameterCalibrationSearch<N, S>
where
    N: SignalingNetwork,
    S: Simulator<N::Model>,
{
    config: CalibrationConfig,
    network: N,
    simulator: S,
}

impl<N, S> ParameterCalibrationSearch<N, S>
where
    N: SignalingNetwork,
    S: Simulator<N::Model>,
{
    /// Creates the search.
    pub fn new(config: CalibrationConfig, network: N, simulator: S) -> Self {
        Self {
            config,
            network,
            simulator,
        }
    }

    /// Runs the search.
    pub fn run(&mut self) -> Result<CalibrationReport> {
        self.run_with_progress(|_| ControlFlow::Continue(()))
    }

    /// Runs the search, calling `progress` after each trial. Returning [ControlFlow::Break]
    /// stops the search with [Error::Interrupted].
    pub fn run_with_progress<F>(&mut self, mut progress: F) -> Result<CalibrationReport>
    where
        F: FnMut(&CalibrationProgress) -> ControlFlow<()>,
    {
        let grid = self.config.validate()?;
        let cfg = self.config.clone();
        let defaults = self.network.default_parameters();
        let default_value = defaults
            .get(&cfg.target_parameter)
            .ok_or_else(|| Error::InvalidInput {
                field: "target_parameter",
                reason: format!("network has no parameter {}", cfg.target_parameter),
            })?;
        let merged = defaults.merge_overrides(&cfg.overrides);
        let time_in = cfg.time_in.or_else(|| merged.get(TIME_IN)).unwrap_or(0.);
        let decimals = stated_decimals(cfg.target_ratio);

        let baseline = self.peak_trace(&merged, &grid, time_in, 1.)?;
        let baseline_peak = self.last_peak(&baseline, time_in)?;
        tracing::info!(
            parameter = %cfg.target_parameter,
            target_ratio = cfg.target_ratio,
            baseline_peak,
            "calibration baseline simulated"
        );

        let mut seed = cfg.seed;
        let mut trials = Vec::with_capacity(cfg.max_iter);
        let mut perturbed = baseline.clone();
        for iteration in 1..=cfg.max_iter {
            let params = merged
                .clone()
                .with(cfg.target_parameter.clone(), default_value * seed);
            perturbed = self.peak_trace(&params, &grid, time_in, seed)?;
            let ratio = round_to(self.last_peak(&perturbed, time_in)? / baseline_peak, decimals);
            let trial = Trial { seed, ratio };
            trials.push(trial);
            tracing::info!(iteration, seed, ratio, "calibration trial");

            let flow = progress(&CalibrationProgress {
                iteration,
                max_iter: cfg.max_iter,
                trial,
            });

            let scale = 10_f64.powi(decimals as i32);
            let (got, wanted) = ((ratio * scale).round(), (cfg.target_ratio * scale).round());
            if got == wanted {
                let fold = round_to(seed, decimals);
                tracing::info!(fold, iterations = iteration, "calibration converged");
                let outcome = CalibrationOutcome::Converged { fold };
                return Ok(self.report(outcome, trials, baseline, perturbed));
            }
            if flow.is_break() && iteration < cfg.max_iter {
                tracing::warn!(iteration, "calibration interrupted by caller");
                return Err(Error::Interrupted {
                    ligand: cfg.target_parameter.clone(),
                    completed: iteration,
                    total: cfg.max_iter,
                });
            }
            if got < wanted {
                seed += cfg.increment;
            } else {
                seed -= cfg.decrement;
            }
        }
        tracing::warn!(iterations = cfg.max_iter, "calibration exhausted its trials");
        Ok(self.report(CalibrationOutcome::Exhausted, trials, baseline, perturbed))
    }

    fn report(
        &self,
        outcome: CalibrationOutcome,
        trials: Vec<Trial>,
        baseline: PeakTrace,
        perturbed: PeakTrace,
    ) -> CalibrationReport {
        CalibrationReport {
            target_parameter: self.config.target_parameter.clone(),
            target_ratio: self.config.target_ratio,
            outcome,
            trials,
            baseline,
            perturbed,
        }
    }

    fn last_peak(&self, trace: &PeakTrace, time_in: f64) -> Result<f64> {
        trace.last_peak().ok_or_else(|| Error::NoPeak {
            observable: self.config.observable.clone(),
            time_in,
        })
    }

    fn peak_trace(
        &mut self,
        params: &Parameters,
        grid: &TimeGrid,
        time_in: f64,
        seed: f64,
    ) -> Result<PeakTrace> {
        let failure = |message: String| Error::SimulationFailure {
            ligand: self.config.target_parameter.clone(),
            concentration: seed,
            message,
        };
        let model = self
            .network
            .build(NetworkSeed::Kinetic, params)
            .map_err(|e| failure(e.to_string()))?;
        let trajectory = self
            .simulator
            .simulate(&model, grid)
            .map_err(|e| failure(e.to_string()))?;
        trajectory
            .check(std::slice::from_ref(&self.config.observable), grid)
            .map_err(&failure)?;
        let series = trajectory
            .get(&self.config.observable)
            .ok_or_else(|| failure(format!("observable {} missing", self.config.observable)))?;
        Ok(PeakTrace::new(grid.points.as_slice(), series.as_slice(), time_in))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_trace_window() -> Result<()> {
        let time = [1., 2., 3., 4., 5., 6., 7.];
        let values = [0., 5., 0., 1., 2., 1., 0.];
        let trace = PeakTrace::new(&time, &values, 0.);
        assert_eq!(trace.peaks, vec![1, 4]);
        assert_eq!(trace.last_peak(), Some(2.));

        let trace = PeakTrace::new(&time, &values, 2.);
        assert_eq!(trace.time, vec![3., 4., 5., 6., 7.]);
        assert_eq!(trace.last_peak(), Some(2.));

        let trace = PeakTrace::new(&time, &values, 5.);
        assert_eq!(trace.last_peak(), None);
        Ok(())
    }

    #[test]
    fn test_peak_trace_auc() -> Result<()> {
        let trace = PeakTrace::new(&[0.5, 1., 2., 3.], &[9., 0., 2., 0.], 0.6);
        assert_eq!(trace.auc(), 2.);
        Ok(())
    }

    #[test]
    fn test_best_trial() -> Result<()> {
        let trace = PeakTrace::new(&[], &[], 0.);
        let report = CalibrationReport {
            target_parameter: "k".to_string(),
            target_ratio: 1.5,
            outcome: CalibrationOutcome::Exhausted,
            trials: vec![
                Trial { seed: 1., ratio: 1.2 },
                Trial { seed: 1.2, ratio: 1.45 },
                Trial { seed: 1.4, ratio: 1.6 },
            ],
            baseline: trace.clone(),
            perturbed: trace,
        };
        assert_eq!(report.best(), Some(Trial { seed: 1.2, ratio: 1.45 }));
        let (it, seeds, ratios) = report.iteration_series();
        assert_eq!(it, vec![1, 2, 3]);
        assert_eq!(seeds, vec![1., 1.2, 1.4]);
        assert_eq!(ratios, vec![1.2, 1.45, 1.6]);
        Ok(())
    }
}
