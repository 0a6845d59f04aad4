/// Main error type
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    /// A required input is missing or malformed.
    #[error("invalid input {field}: {reason}")]
    InvalidInput {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// A valid but disallowed combination of settings.
    #[error("unsupported configuration: {reason}")]
    UnsupportedConfiguration {
        /// Description of the disallowed combination.
        reason: &'static str,
    },
    /// Pathway identifier outside the supported set.
    #[error("unknown pathway {pathway:?}, available pathways are Gs, Gi (Gz(Gi)) and Gq")]
    UnknownPathway {
        /// Identifier as given by the caller.
        pathway: String,
    },
    /// The external simulator failed for one concentration point.
    #[error("simulation of ligand {ligand} at {concentration} uM failed: {message}")]
    SimulationFailure {
        /// Ligand whose sweep was aborted.
        ligand: String,
        /// Concentration point at fault.
        concentration: f64,
        /// Message reported by the simulator.
        message: String,
    },
    /// Curve fit did not converge.
    #[error("curve fit diverged after {iterations} iterations: {reason}")]
    FitDivergence {
        /// Iterations performed before giving up.
        iterations: usize,
        /// Cause of the divergence.
        reason: &'static str,
    },
    /// A minimizer exceeded its iteration budget.
    #[error("{solver} did not converge within {max_iter} iterations")]
    NoConvergence {
        /// Name of the minimizer.
        solver: &'static str,
        /// Iteration budget.
        max_iter: usize,
    },
    /// A minimizer stopped without a usable result.
    #[error("{solver} failed: {message}")]
    SolverFailure {
        /// Name of the minimizer.
        solver: &'static str,
        /// Reported reason.
        message: String,
    },
    /// Analysis requested before the dose-response sweep completed.
    #[error("there is no simulation data, the dose-response sweep must be completed first")]
    NoSimulationData,
    /// A step was invoked before the step it depends on.
    #[error("{step} requires {required} to be run first")]
    SimulationUnprocessed {
        /// Step that was invoked.
        step: &'static str,
        /// Step that has to run before.
        required: &'static str,
    },
    /// The caller stopped a sweep or calibration between two iterations.
    #[error("interrupted by caller after {completed} of {total} iterations of {ligand}")]
    Interrupted {
        /// Ligand or parameter being processed.
        ligand: String,
        /// Completed iterations.
        completed: usize,
        /// Planned iterations.
        total: usize,
    },
    /// No local maximum was found in an observable time course.
    #[error("no peak found in observable {observable} after t = {time_in} s")]
    NoPeak {
        /// Observable name.
        observable: String,
        /// Start of the inspected window.
        time_in: f64,
    },
    /// Two given vectors do not have the same length.
    #[error("vector {vec1} with len {len1} and {vec2} with len {len2} have different length")]
    ShapeMismatch {
        /// Name of vector 1.
        vec1: &'static str,
        /// Name of vector 2.
        vec2: &'static str,
        /// Length of vector 1.
        len1: usize,
        /// Length of vector 2.
        len2: usize,
    },
    /// Reading or writing a csv table failed.
    #[error("csv table error: {0}")]
    Csv(String),
}

impl From<csv::Error> for Error {
    fn from(e: csv::Error) -> Self {
        Error::Csv(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Csv(e.to_string())
    }
}

/// Main result type
pub type Result<T> = std::result::Result<T, Error>;
