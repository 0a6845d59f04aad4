//! Potency of two agonists on a toy Gs pathway
//!
//! Every concentration point seeds the equilibrium receptor complex, integrates the cascade
//! and reduces the cAMP time course to its peak. The peaks of each ligand are normalized and
//! fitted with a four parameter logistic.

use dosefit::{
    ConcentrationRange, DoseResponseEngine, Ligand, PotencyAnalyzer, Result, SweepConfig,
};
use dosefit_examples::{GsCascade, Rk4};
use std::ops::ControlFlow;

fn main() -> Result<()> {
    dosefit_examples::init_tracing();

    let config = SweepConfig::activation()
        .with_ligands(vec![Ligand::new("full-agonist", 8.5), Ligand::new("weak-agonist", 7.)])
        .with_pathway("Gs")
        .with_receptor_conc(0.001)
        .with_concentration_range(ConcentrationRange::geometric(1e-6, 1e2, 17)?)
        .with_time(100., 200);

    let mut engine = DoseResponseEngine::new(&config, GsCascade, Rk4::new())?;
    engine.run_with_progress(|progress| {
        if progress.current == progress.total {
            println!("{}: {} points simulated", progress.ligand, progress.total);
        }
        ControlFlow::Continue(())
    })?;

    let report = PotencyAnalyzer::new().analyze_engine(&engine)?;
    for (ligand, potency) in report.potencies() {
        println!("{ligand}: {potency}");
    }
    println!();
    report.to_csv_writer(std::io::stdout())?;

    Ok(())
}
