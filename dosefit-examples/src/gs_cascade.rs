use dosefit::{
    ExternalError, LIGAND_INIT, NetworkSeed, Parameters, RECEPTOR_INIT, SignalingNetwork,
    Simulator, TimeGrid, Trajectory,
};
use nalgebra::{DVector, SVector};

type State = SVector<f64, 6>;

// state layout
const RECEPTOR: usize = 0;
const LIGAND: usize = 1;
const COMPLEX: usize = 2;
const DESENSITIZED: usize = 3;
const G_ACTIVE: usize = 4;
const CAMP: usize = 5;

#[derive(Debug, Clone, PartialEq)]
struct Rates {
    kon: f64,
    koff: f64,
    k_des: f64,
    g_total: f64,
    k_act: f64,
    k_gtp: f64,
    k_ac: f64,
    k_pde: f64,
}

/// Initialized toy Gs cascade ready for integration.
#[derive(Debug, Clone, PartialEq)]
pub struct GsModel {
    rates: Rates,
    kinetic: bool,
    init: State,
}

impl GsModel {
    fn derivative(&self, s: &State) -> State {
        let r = &self.rates;
        let binding = if self.kinetic {
            r.kon * s[RECEPTOR] * s[LIGAND] - r.koff * s[COMPLEX]
        } else {
            0.
        };
        let desensitization = r.k_des * s[COMPLEX];
        let activation = r.k_act * s[COMPLEX] * (r.g_total - s[G_ACTIVE]) - r.k_gtp * s[G_ACTIVE];
        State::from_column_slice(&[
            -binding,
            -binding,
            binding - desensitization,
            desensitization,
            activation,
            r.k_ac * s[G_ACTIVE] - r.k_pde * s[CAMP],
        ])
    }

    fn rk4_step(&self, s: &State, h: f64) -> State {
        let k1 = self.derivative(s);
        let k2 = self.derivative(&(s + k1 * (h / 2.)));
        let k3 = self.derivative(&(s + k2 * (h / 2.)));
        let k4 = self.derivative(&(s + k3 * h));
        s + (k1 + k2 * 2. + k3 * 2. + k4) * (h / 6.)
    }
}

/// Toy Gs pathway: the receptor complex activates G protein, which drives adenylyl cyclase
/// to produce cAMP degraded by phosphodiesterase. The complex desensitizes over time so cAMP
/// rises and decays in a single pulse.
///
/// Concentrations are in uM and rates in 1/s or 1/(uM s).
#[derive(Debug, Clone, Copy, Default)]
pub struct GsCascade;

impl SignalingNetwork for GsCascade {
    type Model = GsModel;

    fn observables(&self) -> Vec<String> {
        vec!["obs_Ga".to_string(), "obs_cAMP".to_string()]
    }

    fn default_parameters(&self) -> Parameters {
        Parameters::new()
            .with(RECEPTOR_INIT, 0.001)
            .with(LIGAND_INIT, 0.)
            .with("kon", 10.)
            .with("koff", 0.1)
            .with("k_des", 0.05)
            .with("G_total", 1.)
            .with("k_act", 50.)
            .with("k_gtp", 1.)
            .with("k_ac", 10.)
            .with("k_pde", 0.5)
    }

    fn build(
        &self,
        seed: NetworkSeed,
        parameters: &Parameters,
    ) -> Result<Self::Model, ExternalError> {
        let get = |name: &str| {
            parameters
                .get(name)
                .ok_or_else(|| ExternalError::from(format!("parameter {name} is missing")))
        };
        let rates = Rates {
            kon: get("kon")?,
            koff: get("koff")?,
            k_des: get("k_des")?,
            g_total: get("G_total")?,
            k_act: get("k_act")?,
            k_gtp: get("k_gtp")?,
            k_ac: get("k_ac")?,
            k_pde: get("k_pde")?,
        };
        let receptor = get(RECEPTOR_INIT)?;
        let (kinetic, init) = match seed {
            NetworkSeed::Equilibrium { complex } => (
                false,
                State::from_column_slice(&[receptor - complex, 0., complex, 0., 0., 0.]),
            ),
            NetworkSeed::Kinetic => (
                true,
                State::from_column_slice(&[receptor, get(LIGAND_INIT)?, 0., 0., 0., 0.]),
            ),
        };
        if let Some(v) = init.iter().find(|v| !v.is_finite() || **v < 0.) {
            return Err(format!("initial concentrations must be non-negative, got {v}").into());
        }
        Ok(GsModel {
            rates,
            kinetic,
            init,
        })
    }
}

/// Classic fourth order Runge-Kutta integrator with a bounded step size.
#[derive(Debug, Clone)]
pub struct Rk4 {
    max_step: f64,
}

impl Default for Rk4 {
    fn default() -> Self {
        Self { max_step: 0.01 }
    }
}

impl Rk4 {
    /// Creates the integrator with a maximum step of 10 ms.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the integrator with given maximum step in seconds.
    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = max_step;
        self
    }
}

impl Simulator<GsModel> for Rk4 {
    fn simulate(&mut self, model: &GsModel, grid: &TimeGrid) -> Result<Trajectory, ExternalError> {
        if !(self.max_step.is_finite() && self.max_step > 0.) {
            return Err(format!("step size must be positive, got {}", self.max_step).into());
        }
        let mut g_active = DVector::zeros(grid.len());
        let mut camp = DVector::zeros(grid.len());
        let mut state = model.init;
        let mut t = 0.;
        for (i, &target) in grid.points.iter().enumerate() {
            let span = target - t;
            let substeps = (span / self.max_step).ceil().max(1.) as usize;
            let h = span / substeps as f64;
            for _ in 0..substeps {
                state = model.rk4_step(&state, h);
            }
            t = target;
            if state.iter().any(|v| !v.is_finite()) {
                return Err(format!("state diverged at t = {t} s").into());
            }
            g_active[i] = state[G_ACTIVE];
            camp[i] = state[CAMP];
        }
        Ok(Trajectory::new()
            .with("obs_Ga", g_active)
            .with("obs_cAMP", camp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dosefit::{PeakTrace, occupancy};

    #[test]
    fn test_camp_pulse() -> Result<(), ExternalError> {
        let grid = TimeGrid::new(100., 200)?;
        let complex = occupancy(0.001, 0.1, 0., 8., 0.)?;
        let model = GsCascade.build(
            NetworkSeed::Equilibrium { complex },
            &GsCascade.default_parameters(),
        )?;
        let trajectory = Rk4::new().simulate(&model, &grid)?;
        let camp = trajectory.get("obs_cAMP").ok_or("obs_cAMP missing")?;
        let trace = PeakTrace::new(grid.points.as_slice(), camp.as_slice(), 0.);
        assert_eq!(trace.peaks.len(), 1);
        assert!(camp[grid.len() - 1] < trace.last_peak().unwrap_or(0.));
        Ok(())
    }

    #[test]
    fn test_kinetic_binding_drives_camp() -> Result<(), ExternalError> {
        let grid = TimeGrid::new(50., 100)?;
        let params = GsCascade.default_parameters().with(LIGAND_INIT, 1.);
        let model = GsCascade.build(NetworkSeed::Kinetic, &params)?;
        let trajectory = Rk4::new().simulate(&model, &grid)?;
        let camp = trajectory.get("obs_cAMP").ok_or("obs_cAMP missing")?;
        assert!(camp.max() > 0.);

        let unbound = GsCascade.build(NetworkSeed::Kinetic, &GsCascade.default_parameters())?;
        let trajectory = Rk4::new().simulate(&unbound, &grid)?;
        assert_eq!(trajectory.get("obs_cAMP").map(|s| s.max()), Some(0.));
        Ok(())
    }

    #[test]
    fn test_missing_parameter() {
        let params = Parameters::new().with(RECEPTOR_INIT, 0.001);
        let err = GsCascade
            .build(NetworkSeed::Kinetic, &params)
            .err()
            .map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("parameter kon is missing"));
    }
}
