//! Calibration of the adenylyl cyclase rate to an experimental fold change
//!
//! A measured 1.5 fold increase of the cAMP peak is matched by scaling `k_ac` from its
//! default in steps of 0.1.

use dosefit::{
    CalibrationConfig, CalibrationOutcome, LIGAND_INIT, ParameterCalibrationSearch, Parameters,
    Result,
};
use dosefit_examples::{GsCascade, Rk4};
use std::ops::ControlFlow;

fn main() -> Result<()> {
    dosefit_examples::init_tracing();

    let config = CalibrationConfig::new("k_ac", "obs_cAMP", 1.5)
        .with_steps(0.1, 0.1)
        .with_max_iter(20)
        .with_time(100., 200)
        .with_overrides(Parameters::new().with(LIGAND_INIT, 0.1));

    let mut search = ParameterCalibrationSearch::new(config, GsCascade, Rk4::new());
    let report = search.run_with_progress(|progress| {
        println!(
            "trial {}/{}: seed {:.2} ratio {}",
            progress.iteration, progress.max_iter, progress.trial.seed, progress.trial.ratio
        );
        ControlFlow::Continue(())
    })?;

    match report.outcome {
        CalibrationOutcome::Converged { fold } => println!("k_ac calibrated to {fold} x default"),
        CalibrationOutcome::Exhausted => println!("no match, best trial {:?}", report.best()),
    }
    let (baseline, perturbed) = report.amplitudes();
    println!("cAMP peak: baseline {baseline:?}, calibrated {perturbed:?}");

    Ok(())
}
