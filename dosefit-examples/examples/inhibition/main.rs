//! Potency of two antagonists against an agonist held at its submaximal concentration
//!
//! The agonist level is the maximum bend point of its binding curve. Each antagonist
//! concentration seeds the complex of the agonist in competition with the antagonist, so the
//! cAMP peak falls with antagonist and the fit yields IC50 values.

use dosefit::{
    BindingCurve, ConcentrationRange, DoseResponseEngine, Ligand, PotencyAnalyzer, Result,
    SweepConfig, pkd_to_kd,
};
use dosefit_examples::{GsCascade, Rk4};

const RECEPTOR: f64 = 0.001;

fn main() -> Result<()> {
    dosefit_examples::init_tracing();

    let agonist = Ligand::new("agonist", 8.);
    let binding_range = ConcentrationRange::geometric(1e-6, 1e2, 49)?;
    let submaximal = BindingCurve::bind(RECEPTOR, &binding_range, agonist.pkd())?.submaximal()?;
    println!("{agonist} held at {submaximal} uM");

    let antagonists = vec![Ligand::new("antagonist-a", 7.), Ligand::new("antagonist-b", 6.)];
    let config = SweepConfig::inhibition(agonist.clone(), submaximal)
        .with_ligands(antagonists.clone())
        .with_pathway("Gs")
        .with_receptor_conc(RECEPTOR)
        .with_concentration_range(ConcentrationRange::geometric(1e-5, 1e4, 19)?)
        .with_time(100., 200);

    let mut engine = DoseResponseEngine::new(&config, GsCascade, Rk4::new())?;
    engine.run()?;
    let report = PotencyAnalyzer::new().analyze_engine(&engine)?;

    for (antagonist, (label, potency)) in antagonists.iter().zip(report.potencies()) {
        // Cheng-Prusoff for a competitive antagonist
        let expected = pkd_to_kd(antagonist.pkd()) * (1. + submaximal / pkd_to_kd(agonist.pkd()));
        println!("{label}: {potency} (competitive binding predicts {expected:.5} uM)");
    }

    Ok(())
}
