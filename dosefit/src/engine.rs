use crate::{
    ConcentrationRange, Error, Ligand, NetworkSeed, Parameters, Pathway, Result,
    SignalingNetwork, Simulator, TimeGrid, Trajectory, binding::occupancy,
};
use nalgebra::DVector;
use std::{collections::HashSet, ops::ControlFlow};

/// Parameter receiving the total receptor concentration.
pub const RECEPTOR_INIT: &str = "R_init";
/// Parameter receiving the ligand concentration when binding is simulated kinetically.
pub const LIGAND_INIT: &str = "L_init";

/// Whether the swept ligands activate the receptor or antagonize a fixed agonist.
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Swept ligands are agonists, their complex drives the network.
    Activation,
    /// Swept ligands compete with `agonist` held at its submaximal concentration.
    Inhibition {
        /// Agonist present at every concentration point.
        agonist: Ligand,
        /// Agonist concentration in uM.
        agonist_submaximal: f64,
    },
}

/// Configuration of a [DoseResponseEngine].
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    mode: Mode,
    ligands: Vec<Ligand>,
    pathway: Option<String>,
    receptor_conc: Option<f64>,
    range: Option<ConcentrationRange>,
    total_time: Option<f64>,
    steps: Option<usize>,
    binding_kinetics: bool,
    overrides: Parameters,
}

impl SweepConfig {
    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            ligands: vec![],
            pathway: None,
            receptor_conc: None,
            range: None,
            total_time: None,
            steps: None,
            binding_kinetics: false,
            overrides: Parameters::new(),
        }
    }

    /// Sweep of agonists.
    pub fn activation() -> Self {
        Self::with_mode(Mode::Activation)
    }

    /// Sweep of antagonists against `agonist` at `agonist_submaximal` uM.
    pub fn inhibition(agonist: Ligand, agonist_submaximal: f64) -> Self {
        Self::with_mode(Mode::Inhibition {
            agonist,
            agonist_submaximal,
        })
    }

    /// Returns the config with given swept ligands.
    pub fn with_ligands(mut self, ligands: Vec<Ligand>) -> Self {
        self.ligands = ligands;
        self
    }

    /// Returns the config with given pathway identifier, one of `Gs`, `Gi`, `Gz(Gi)`, `Gq`.
    pub fn with_pathway(mut self, pathway: impl Into<String>) -> Self {
        self.pathway = Some(pathway.into());
        self
    }

    /// Returns the config with given total receptor concentration in uM.
    pub fn with_receptor_conc(mut self, receptor_conc: f64) -> Self {
        self.receptor_conc = Some(receptor_conc);
        self
    }

    /// Returns the config with given ligand concentrations.
    pub fn with_concentration_range(mut self, range: ConcentrationRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Returns the config with given simulated time in seconds and number of time points.
    pub fn with_time(mut self, total_time: f64, steps: usize) -> Self {
        self.total_time = Some(total_time);
        self.steps = Some(steps);
        self
    }

    /// Returns the config simulating receptor-ligand binding kinetically instead of seeding
    /// the equilibrium complex.
    pub fn with_binding_kinetics(mut self, binding_kinetics: bool) -> Self {
        self.binding_kinetics = binding_kinetics;
        self
    }

    /// Returns the config with parameters overriding the network defaults.
    pub fn with_overrides(mut self, overrides: Parameters) -> Self {
        self.overrides = overrides;
        self
    }

    /// Checks every field and resolves the pathway and time grid.
    pub fn validate(&self) -> Result<Sweep> {
        let missing = |field: &'static str| Error::InvalidInput {
            field,
            reason: "required field is not set".to_string(),
        };
        if self.binding_kinetics && matches!(self.mode, Mode::Inhibition { .. }) {
            return Err(Error::UnsupportedConfiguration {
                reason: "kinetic binding is not supported in inhibition mode",
            });
        }
        if let Mode::Inhibition {
            agonist,
            agonist_submaximal,
        } = &self.mode
        {
            agonist.validate("agonist")?;
            if !agonist_submaximal.is_finite() || *agonist_submaximal <= 0. {
                return Err(Error::InvalidInput {
                    field: "agonist_submaximal",
                    reason: format!("must be positive and finite, got {agonist_submaximal}"),
                });
            }
        }
        if self.ligands.is_empty() {
            return Err(Error::InvalidInput {
                field: "ligands",
                reason: "at least one ligand is required".to_string(),
            });
        }
        let mut names = HashSet::new();
        for ligand in &self.ligands {
            ligand.validate("ligands")?;
            if !names.insert(ligand.name()) {
                return Err(Error::InvalidInput {
                    field: "ligands",
                    reason: format!("ligand {} is listed twice", ligand.name()),
                });
            }
        }
        let pathway = self
            .pathway
            .as_deref()
            .ok_or_else(|| missing("pathway"))?
            .parse::<Pathway>()?;
        let receptor_conc = self.receptor_conc.ok_or_else(|| missing("receptor_conc"))?;
        if !receptor_conc.is_finite() || receptor_conc <= 0. {
            return Err(Error::InvalidInput {
                field: "receptor_conc",
                reason: format!("must be positive and finite, got {receptor_conc}"),
            });
        }
        let range = self.range.clone().ok_or_else(|| missing("concentration_range"))?;
        let total_time = self.total_time.ok_or_else(|| missing("total_time"))?;
        let steps = self.steps.ok_or_else(|| missing("steps"))?;
        let grid = TimeGrid::new(total_time, steps)?;

        Ok(Sweep {
            mode: self.mode.clone(),
            ligands: self.ligands.clone(),
            pathway,
            receptor_conc,
            range,
            grid,
            binding_kinetics: self.binding_kinetics,
            overrides: self.overrides.clone(),
        })
    }
}

/// Validated, immutable sweep configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Sweep {
    /// Activation or inhibition.
    pub mode: Mode,
    /// Swept ligands in sweep order.
    pub ligands: Vec<Ligand>,
    /// Pathway read by the analysis.
    pub pathway: Pathway,
    /// Total receptor concentration in uM.
    pub receptor_conc: f64,
    /// Ligand concentrations.
    pub range: ConcentrationRange,
    /// Simulated time points.
    pub grid: TimeGrid,
    /// Kinetic instead of equilibrium receptor seeding.
    pub binding_kinetics: bool,
    /// Parameters overriding the network defaults.
    pub overrides: Parameters,
}

/// Simulation of one concentration point.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationRun {
    /// Ligand concentration in uM.
    pub concentration: f64,
    /// Time points in seconds.
    pub time: DVector<f64>,
    /// Time course of every declared observable.
    pub trajectory: Trajectory,
}

/// Simulations of one ligand over the whole concentration range.
#[derive(Debug, Clone, PartialEq)]
pub struct LigandSweep {
    /// Swept ligand.
    pub ligand: Ligand,
    /// One run per concentration, in range order.
    pub runs: Vec<SimulationRun>,
}

/// Collected simulations of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepOutput {
    /// Activation or inhibition.
    pub mode: Mode,
    /// Pathway of the simulated network.
    pub pathway: Pathway,
    /// Swept concentrations.
    pub range: ConcentrationRange,
    /// Completed ligands in sweep order.
    pub sweeps: Vec<LigandSweep>,
}

/// Progress of a sweep after one concentration point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepProgress<'a> {
    /// Ligand being swept.
    pub ligand: &'a str,
    /// Completed points of this ligand.
    pub current: usize,
    /// Points per ligand.
    pub total: usize,
    /// Concentration of the completed point.
    pub concentration: f64,
}

/// Lifecycle of a [DoseResponseEngine].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepState {
    /// Validated, nothing simulated yet.
    Configured,
    /// Sweep in progress.
    Running,
    /// Every ligand was swept.
    Completed,
    /// A ligand failed or the sweep was interrupted, earlier ligands are kept.
    Failed,
}

/// Drives the external simulator over every ligand and concentration of a [Sweep].
pub struct DoseResponseEngine<N, S>
where
    N: SignalingNetwork,
    S: Simulator<N::Model>,
{
    sweep: Sweep,
    network: N,
    simulator: S,
    state: SweepState,
    output: SweepOutput,
}

impl<N, S> DoseResponseEngine<N, S>
where
    N: SignalingNetwork,
    S: Simulator<N::Model>,
{
    /// Validates `config` and creates the engine in [SweepState::Configured].
    pub fn new(config: &SweepConfig, network: N, simulator: S) -> Result<Self> {
        let sweep = config.validate()?;
        let output = SweepOutput {
            mode: sweep.mode.clone(),
            pathway: sweep.pathway,
            range: sweep.range.clone(),
            sweeps: vec![],
        };
        Ok(Self {
            sweep,
            network,
            simulator,
            state: SweepState::Configured,
            output,
        })
    }

    /// Current state.
    pub fn state(&self) -> SweepState {
        self.state
    }

    /// Validated configuration.
    pub fn sweep(&self) -> &Sweep {
        &self.sweep
    }

    /// Simulations of a completed sweep.
    pub fn output(&self) -> Result<&SweepOutput> {
        match self.state {
            SweepState::Completed => Ok(&self.output),
            _ => Err(Error::NoSimulationData),
        }
    }

    /// Simulations of the ligands completed so far.
    pub fn partial_output(&self) -> &SweepOutput {
        &self.output
    }

    /// Sweeps every ligand from the start.
    pub fn run(&mut self) -> Result<()> {
        self.run_with_progress(|_| ControlFlow::Continue(()))
    }

    /// Sweeps every ligand from the start, calling `progress` after each concentration point.
    /// Returning [ControlFlow::Break] stops the sweep with [Error::Interrupted].
    pub fn run_with_progress<F>(&mut self, progress: F) -> Result<()>
    where
        F: FnMut(&SweepProgress<'_>) -> ControlFlow<()>,
    {
        self.output.sweeps.clear();
        self.sweep_from_next(progress)
    }

    /// Continues a failed sweep at the ligand that failed, keeping earlier ligands.
    pub fn resume(&mut self) -> Result<()> {
        self.resume_with_progress(|_| ControlFlow::Continue(()))
    }

    /// [DoseResponseEngine::resume] with a progress callback.
    pub fn resume_with_progress<F>(&mut self, progress: F) -> Result<()>
    where
        F: FnMut(&SweepProgress<'_>) -> ControlFlow<()>,
    {
        match self.state {
            SweepState::Configured => Err(Error::SimulationUnprocessed {
                step: "resume",
                required: "run",
            }),
            SweepState::Completed => Ok(()),
            SweepState::Running | SweepState::Failed => {
                if let Some(ligand) = self.sweep.ligands.get(self.output.sweeps.len()) {
                    tracing::info!(ligand = ligand.name(), "resuming sweep");
                }
                self.sweep_from_next(progress)
            }
        }
    }

    fn sweep_from_next<F>(&mut self, mut progress: F) -> Result<()>
    where
        F: FnMut(&SweepProgress<'_>) -> ControlFlow<()>,
    {
        self.state = SweepState::Running;
        let defaults = self.network.default_parameters().merge_overrides(&self.sweep.overrides);
        let observables = self.network.observables();

        for idx in self.output.sweeps.len()..self.sweep.ligands.len() {
            let ligand = self.sweep.ligands[idx].clone();
            let last_ligand = idx + 1 == self.sweep.ligands.len();
            match self.sweep_ligand(&ligand, &defaults, &observables, last_ligand, &mut progress) {
                Ok((sweep, flow)) => {
                    self.output.sweeps.push(sweep);
                    if flow.is_break() && !last_ligand {
                        self.state = SweepState::Failed;
                        let total = self.sweep.range.len();
                        tracing::warn!(ligand = ligand.name(), "sweep interrupted by caller");
                        return Err(Error::Interrupted {
                            ligand: ligand.name().to_string(),
                            completed: total,
                            total,
                        });
                    }
                }
                Err(e) => {
                    self.state = SweepState::Failed;
                    tracing::error!(ligand = ligand.name(), error = %e, "ligand sweep aborted");
                    return Err(e);
                }
            }
        }
        self.state = SweepState::Completed;
        tracing::info!(ligands = self.output.sweeps.len(), "dose-response sweep completed");
        Ok(())
    }

    fn sweep_ligand<F>(
        &mut self,
        ligand: &Ligand,
        defaults: &Parameters,
        observables: &[String],
        last_ligand: bool,
        progress: &mut F,
    ) -> Result<(LigandSweep, ControlFlow<()>)>
    where
        F: FnMut(&SweepProgress<'_>) -> ControlFlow<()>,
    {
        let concentrations = self.sweep.range.iter().collect::<Vec<_>>();
        let total = concentrations.len();
        tracing::info!(ligand = ligand.name(), points = total, "sweeping ligand");
        let mut runs = Vec::with_capacity(total);

        for (idx, conc) in concentrations.into_iter().enumerate() {
            let run = self.simulate_point(ligand, conc, defaults, observables)?;
            runs.push(run);

            let current = idx + 1;
            tracing::debug!(
                ligand = ligand.name(),
                current,
                total,
                concentration = conc,
                "concentration point simulated"
            );
            let flow = progress(&SweepProgress {
                ligand: ligand.name(),
                current,
                total,
                concentration: conc,
            });
            if flow.is_break() {
                if current < total {
                    tracing::warn!(
                        ligand = ligand.name(),
                        current,
                        total,
                        "sweep interrupted by caller"
                    );
                    return Err(Error::Interrupted {
                        ligand: ligand.name().to_string(),
                        completed: current,
                        total,
                    });
                }
                if !last_ligand {
                    return Ok((self.ligand_sweep(ligand, runs), ControlFlow::Break(())));
                }
            }
        }
        Ok((self.ligand_sweep(ligand, runs), ControlFlow::Continue(())))
    }

    fn ligand_sweep(&self, ligand: &Ligand, runs: Vec<SimulationRun>) -> LigandSweep {
        LigandSweep {
            ligand: ligand.clone(),
            runs,
        }
    }

    fn simulate_point(
        &mut self,
        ligand: &Ligand,
        conc: f64,
        defaults: &Parameters,
        observables: &[String],
    ) -> Result<SimulationRun> {
        let mut params = defaults.clone();
        params.insert(RECEPTOR_INIT, self.sweep.receptor_conc);
        let seed = if self.sweep.binding_kinetics {
            params.insert(LIGAND_INIT, conc);
            NetworkSeed::Kinetic
        } else {
            let complex = match &self.sweep.mode {
                Mode::Activation => {
                    occupancy(self.sweep.receptor_conc, conc, 0., ligand.pkd(), 0.)?
                }
                Mode::Inhibition {
                    agonist,
                    agonist_submaximal,
                } => occupancy(
                    self.sweep.receptor_conc,
                    *agonist_submaximal,
                    conc,
                    agonist.pkd(),
                    ligand.pkd(),
                )?,
            };
            NetworkSeed::Equilibrium { complex }
        };

        let failure = |message: String| Error::SimulationFailure {
            ligand: ligand.name().to_string(),
            concentration: conc,
            message,
        };
        let model = self
            .network
            .build(seed, &params)
            .map_err(|e| failure(e.to_string()))?;
        let trajectory = self
            .simulator
            .simulate(&model, &self.sweep.grid)
            .map_err(|e| failure(e.to_string()))?;
        trajectory.check(observables, &self.sweep.grid).map_err(failure)?;

        Ok(SimulationRun {
            concentration: conc,
            time: self.sweep.grid.points.clone(),
            trajectory,
        })
    }
}
