use crate::{Error, Result};
use nalgebra::DVector;

/// Start of every simulated time grid in seconds.
pub const TIME_EPSILON: f64 = 1e-5;

/// Returns `num` points spaced evenly on a log scale between `start` and `stop`, both
/// included.
pub fn geomspace(start: f64, stop: f64, num: usize) -> DVector<f64> {
    match num {
        0 => DVector::zeros(0),
        1 => DVector::from_element(1, start),
        _ => {
            let (log_start, log_stop) = (start.log10(), stop.log10());
            let delta = (log_stop - log_start) / (num - 1) as f64;
            let mut points =
                DVector::from_fn(num, |i, _| 10_f64.powf(log_start + i as f64 * delta));
            points[0] = start;
            points[num - 1] = stop;
            points
        }
    }
}

/// Ordered ligand concentrations in uM shared by all ligands of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct ConcentrationRange {
    values: DVector<f64>,
}

impl ConcentrationRange {
    /// Creates the range from user supplied concentrations, keeping their order.
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if let Some(v) = values.iter().find(|v| !v.is_finite() || **v <= 0.) {
            return Err(Error::InvalidInput {
                field: "concentration_range",
                reason: format!("concentrations must be positive and finite, found {v}"),
            });
        }
        let values = DVector::from_vec(values);
        if distinct_count(values.as_slice()) < 2 {
            return Err(Error::InvalidInput {
                field: "concentration_range",
                reason: "at least 2 distinct concentrations are required".to_string(),
            });
        }
        Ok(Self { values })
    }

    /// Creates `num` log-spaced concentrations between `min` and `max`.
    pub fn geometric(min: f64, max: f64, num: usize) -> Result<Self> {
        if !(min.is_finite() && max.is_finite() && min > 0. && max > min) {
            return Err(Error::InvalidInput {
                field: "concentration_range",
                reason: format!("geometric range needs 0 < min < max, got [{min}, {max}]"),
            });
        }
        Self::new(geomspace(min, max, num).as_slice().to_vec())
    }

    /// Concentrations in range order.
    pub fn values(&self) -> &DVector<f64> {
        &self.values
    }

    /// Iterates the concentrations in range order.
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }

    /// Number of concentration points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false for a validated range.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Lowest concentration.
    pub fn min(&self) -> f64 {
        self.values.min()
    }

    /// Highest concentration.
    pub fn max(&self) -> f64 {
        self.values.max()
    }
}

/// Number of distinct values of a slice.
pub(crate) fn distinct_count(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

/// Geometric time grid from [TIME_EPSILON] to the total simulated time.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    /// Time points in seconds, strictly increasing.
    pub points: DVector<f64>,
}

impl TimeGrid {
    /// Creates a grid of `steps` points ending at `total_time` seconds.
    pub fn new(total_time: f64, steps: usize) -> Result<Self> {
        if !total_time.is_finite() || total_time <= TIME_EPSILON {
            return Err(Error::InvalidInput {
                field: "total_time",
                reason: format!("total time must exceed {TIME_EPSILON} s, got {total_time}"),
            });
        }
        if steps < 2 {
            return Err(Error::InvalidInput {
                field: "steps",
                reason: format!("at least 2 time steps are required, got {steps}"),
            });
        }
        Ok(Self {
            points: geomspace(TIME_EPSILON, total_time, steps),
        })
    }

    /// Number of time points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false for a validated grid.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Last time point.
    pub fn total_time(&self) -> f64 {
        self.points[self.points.len() - 1]
    }
}
