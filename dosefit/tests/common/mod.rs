use dosefit::{
    ExternalError, LIGAND_INIT, NetworkSeed, Parameters, RECEPTOR_INIT, SignalingNetwork,
    Simulator, TimeGrid, Trajectory, occupancy,
};

pub const CAMP: &str = "obs_cAMP";
pub const IP3: &str = "obs_IP3";

/// Network whose observables pulse once, peaking at `tau` seconds with a height of the
/// receptor complex times `k_cat`.
pub struct PulseNetwork;

pub struct PulseModel {
    pub height: f64,
    pub tau: f64,
}

impl SignalingNetwork for PulseNetwork {
    type Model = PulseModel;

    fn observables(&self) -> Vec<String> {
        vec![CAMP.to_string(), IP3.to_string()]
    }

    fn default_parameters(&self) -> Parameters {
        Parameters::new()
            .with("k_cat", 2.)
            .with("tau", 10.)
            .with("pKd", 8.)
            .with(RECEPTOR_INIT, 1e-4)
            .with(LIGAND_INIT, 1.)
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
        let complex = match seed {
            NetworkSeed::Equilibrium { complex } => complex,
            NetworkSeed::Kinetic => {
                occupancy(get(RECEPTOR_INIT)?, get(LIGAND_INIT)?, 0., get("pKd")?, 0.)?
            }
        };
        Ok(PulseModel {
            height: complex * get("k_cat")?,
            tau: get("tau")?,
        })
    }
}

/// Evaluates the pulse analytically, optionally failing on one call.
#[derive(Default)]
pub struct PulseSimulator {
    pub calls: usize,
    pub fail_on_call: Option<usize>,
}

impl PulseSimulator {
    pub fn failing_on(call: usize) -> Self {
        Self {
            calls: 0,
            fail_on_call: Some(call),
        }
    }
}

impl Simulator<PulseModel> for PulseSimulator {
    fn simulate(
        &mut self,
        model: &PulseModel,
        grid: &TimeGrid,
    ) -> Result<Trajectory, ExternalError> {
        self.calls += 1;
        if self.fail_on_call == Some(self.calls) {
            return Err("integrator step size underflow".into());
        }
        let pulse = grid
            .points
            .map(|t| model.height * (t / model.tau) * (1. - t / model.tau).exp());
        Ok(Trajectory::new()
            .with(CAMP, pulse.clone())
            .with(IP3, pulse))
    }
}
