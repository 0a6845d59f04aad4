#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![doc = include_str!("../README.md")]
mod analysis;
mod binding;
mod calibration;
mod convert;
mod curve;
mod engine;
mod error;
mod fit;
mod grid;
mod least_squares;
mod ligand;
mod network;
mod parameters;
mod submaximal;
mod utils;

pub use analysis::{DoseResponseDataset, PotencyAnalyzer, PotencyReport};
pub use binding::{BindingCurve, occupancy, pkd_to_kd};
pub use calibration::{
    CalibrationConfig, CalibrationOutcome, CalibrationProgress, CalibrationReport,
    ParameterCalibrationSearch, PeakTrace, TIME_IN, Trial,
};
pub use convert::{
    AVOGADRO, GAS_CONSTANT, TemperatureUnit, binding_free_energy, kinetic_temperature_scale,
    micrograms_to_nanomolar,
};
pub use curve::{
    BOTTOM, Curve, CurveFunction, FourParameterLogistic, HILL, LN_EC, LogisticCurve, TOP,
};
pub use dosefit_derive::Curve;
pub use engine::{
    DoseResponseEngine, LIGAND_INIT, LigandSweep, Mode, RECEPTOR_INIT, SimulationRun, Sweep,
    SweepConfig, SweepOutput, SweepProgress, SweepState,
};
pub use error::{Error, Result};
pub use fit::{DoseResponseFitter, FIT_TRACE_POINTS, HILL_BOUNDS, Potency, PotencyKind};
pub use grid::{ConcentrationRange, TIME_EPSILON, TimeGrid, geomspace};
pub use least_squares::{LeastSquares, LeastSquaresOptions, LeastSquaresReport, ParameterBound};
pub use ligand::{Ligand, Role};
pub use network::{ExternalError, NetworkSeed, Pathway, SignalingNetwork, Simulator, Trajectory};
pub use parameters::Parameters;
pub use submaximal::SubmaximalPointFinder;
pub use utils::{find_peaks, min_max_scale, round_to, stated_decimals};
