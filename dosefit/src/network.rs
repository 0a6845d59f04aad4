use crate::{Error, Parameters, Result, TimeGrid};
use nalgebra::DVector;
use std::{collections::BTreeMap, fmt::Display, str::FromStr};

/// Error reported by an external network builder or simulator.
pub type ExternalError = Box<dyn std::error::Error + Send + Sync>;

/// G protein signaling pathway, deciding which observable is read and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pathway {
    /// Stimulatory, response is the cAMP peak.
    Gs,
    /// Inhibitory, response is one minus the cAMP peak. Also parsed from `Gz(Gi)`.
    Gi,
    /// Phospholipase C, response is the IP3 peak.
    Gq,
}

impl Pathway {
    /// Observable carrying the pathway readout.
    pub fn observable(&self) -> &'static str {
        match self {
            Pathway::Gs | Pathway::Gi => "obs_cAMP",
            Pathway::Gq => "obs_IP3",
        }
    }

    /// Whether the readout decreases with receptor activation.
    pub fn is_inverse_readout(&self) -> bool {
        matches!(self, Pathway::Gi)
    }

    /// Reduces the readout time course to the scalar response of one concentration point.
    pub fn response(&self, series: &DVector<f64>) -> f64 {
        let peak = series.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if self.is_inverse_readout() {
            1. - peak
        } else {
            peak
        }
    }
}

impl FromStr for Pathway {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "Gs" => Ok(Pathway::Gs),
            "Gi" | "Gz(Gi)" => Ok(Pathway::Gi),
            "Gq" => Ok(Pathway::Gq),
            other => Err(Error::UnknownPathway {
                pathway: other.to_string(),
            }),
        }
    }
}

impl Display for Pathway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Pathway::Gs => "Gs",
            Pathway::Gi => "Gi",
            Pathway::Gq => "Gq",
        };
        write!(f, "{name}")
    }
}

/// Initial receptor state handed to [SignalingNetwork::build].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NetworkSeed {
    /// Receptor-ligand complex fixed at its equilibrium concentration in uM.
    Equilibrium {
        /// Complex concentration.
        complex: f64,
    },
    /// Receptor and ligand start unbound, `R_init` and `L_init` are in the parameters.
    Kinetic,
}

/// Time courses of the observables of one simulation, aligned to its [TimeGrid].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    series: BTreeMap<String, DVector<f64>>,
}

impl Trajectory {
    /// Creates an empty trajectory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the trajectory with the time course of `observable` added.
    pub fn with(mut self, observable: impl Into<String>, series: DVector<f64>) -> Self {
        self.series.insert(observable.into(), series);
        self
    }

    /// Adds the time course of `observable`.
    pub fn insert(&mut self, observable: impl Into<String>, series: DVector<f64>) {
        self.series.insert(observable.into(), series);
    }

    /// Time course of `observable`.
    pub fn get(&self, observable: &str) -> Option<&DVector<f64>> {
        self.series.get(observable)
    }

    /// Names of the recorded observables.
    pub fn observables(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Number of recorded observables.
    pub fn len(&self) -> usize {
        self.series.len()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Checks that every declared observable is present on the full grid.
    pub(crate) fn check(
        &self,
        observables: &[String],
        grid: &TimeGrid,
    ) -> std::result::Result<(), String> {
        for name in observables {
            match self.series.get(name) {
                None => return Err(format!("observable {name} missing from trajectory")),
                Some(s) if s.len() != grid.len() => {
                    return Err(format!(
                        "observable {name} has {} points, time grid has {}",
                        s.len(),
                        grid.len()
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }
}

/// Reaction network of a signaling pathway, built and integrated outside of this crate.
pub trait SignalingNetwork {
    /// Runnable model handed to the [Simulator].
    type Model;

    /// Declared observable species.
    fn observables(&self) -> Vec<String>;

    /// Default kinetic parameters and initial conditions.
    fn default_parameters(&self) -> Parameters;

    /// Builds the model from the receptor seed and the merged parameters.
    fn build(
        &self,
        seed: NetworkSeed,
        parameters: &Parameters,
    ) -> std::result::Result<Self::Model, ExternalError>;
}

/// Numerical integrator of a [SignalingNetwork] model.
pub trait Simulator<M> {
    /// Integrates `model` and returns every observable on `grid`.
    fn simulate(
        &mut self,
        model: &M,
        grid: &TimeGrid,
    ) -> std::result::Result<Trajectory, ExternalError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pathway_parsing() -> Result<()> {
        assert_eq!("Gs".parse::<Pathway>()?, Pathway::Gs);
        assert_eq!("Gi".parse::<Pathway>()?, Pathway::Gi);
        assert_eq!("Gz(Gi)".parse::<Pathway>()?, Pathway::Gi);
        assert_eq!(" Gq ".parse::<Pathway>()?, Pathway::Gq);
        assert_eq!(
            "Gx".parse::<Pathway>(),
            Err(Error::UnknownPathway {
                pathway: "Gx".to_string(),
            })
        );
        Ok(())
    }

    #[test]
    fn test_pathway_response() -> Result<()> {
        let series = DVector::from_vec(vec![0.1, 0.4, 0.3]);
        assert_eq!(Pathway::Gs.response(&series), 0.4);
        assert_eq!(Pathway::Gq.response(&series), 0.4);
        assert_eq!(Pathway::Gi.response(&series), 0.6);
        assert_eq!(Pathway::Gi.observable(), "obs_cAMP");
        assert_eq!(Pathway::Gq.observable(), "obs_IP3");
        Ok(())
    }

    #[test]
    fn test_trajectory_check() -> Result<()> {
        let grid = TimeGrid::new(10., 3)?;
        let trajectory = Trajectory::new().with("obs_cAMP", DVector::zeros(3));
        assert!(trajectory.check(&["obs_cAMP".to_string()], &grid).is_ok());
        assert!(trajectory.check(&["obs_IP3".to_string()], &grid).is_err());
        let short = Trajectory::new().with("obs_cAMP", DVector::zeros(2));
        assert!(short.check(&["obs_cAMP".to_string()], &grid).is_err());
        Ok(())
    }
}
