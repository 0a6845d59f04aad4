mod common;

use common::{CAMP, IP3, PulseNetwork, PulseSimulator};
use dosefit::{
    BindingCurve, ConcentrationRange, DoseResponseEngine, Error, Ligand, PotencyAnalyzer,
    PotencyKind, Result, SweepConfig, SweepState, pkd_to_kd,
};

fn activation(pathway: &str, range: ConcentrationRange) -> SweepConfig {
    SweepConfig::activation()
        .with_ligands(vec![Ligand::new("A", 8.), Ligand::new("B", 7.)])
        .with_pathway(pathway)
        .with_receptor_conc(1e-4)
        .with_concentration_range(range)
        .with_time(100., 200)
}

#[test]
fn test_sweep_collects_every_observable() -> Result<()> {
    let range = ConcentrationRange::geometric(1e-3, 10., 5)?;
    let mut engine = DoseResponseEngine::new(
        &activation("Gs", range.clone()),
        PulseNetwork,
        PulseSimulator::default(),
    )?;
    engine.run()?;
    assert_eq!(engine.state(), SweepState::Completed);

    let output = engine.output()?;
    assert_eq!(output.sweeps.len(), 2);
    for sweep in &output.sweeps {
        assert_eq!(sweep.runs.len(), 5);
        for (run, conc) in sweep.runs.iter().zip(range.iter()) {
            assert_eq!(run.concentration, conc);
            assert_eq!(run.time.len(), 200);
            for observable in [CAMP, IP3] {
                assert_eq!(run.trajectory.get(observable).map(|s| s.len()), Some(200));
            }
        }
    }
    Ok(())
}

#[test]
fn test_activation_potency() -> Result<()> {
    let range = ConcentrationRange::geometric(1e-6, 1e2, 17)?;
    let mut engine = DoseResponseEngine::new(
        &activation("Gs", range),
        PulseNetwork,
        PulseSimulator::default(),
    )?;
    engine.run()?;
    let report = PotencyAnalyzer::new()
        .with_trace_points(1_000)
        .analyze_engine(&engine)?;

    assert_eq!(report.kind, PotencyKind::EC50);
    let expected = [("A", 8.), ("B", 7.)];
    for ((label, potency), (name, pkd)) in report.potencies().into_iter().zip(expected) {
        assert_eq!(label, name);
        assert!((potency.p_value - pkd).abs() <= 0.02, "{label}: {potency}");
    }
    let a = report.get("A").ok_or(Error::NoSimulationData)?;
    assert!((a.curve.hill - 1.).abs() < 5e-2);
    assert_eq!(a.normalized.max(), 100.);
    Ok(())
}

#[test]
fn test_gi_activation_reads_inverse_camp() -> Result<()> {
    let range = ConcentrationRange::geometric(1e-6, 1e2, 17)?;
    let mut engine = DoseResponseEngine::new(
        &activation("Gz(Gi)", range),
        PulseNetwork,
        PulseSimulator::default(),
    )?;
    engine.run()?;
    let report = PotencyAnalyzer::new()
        .with_trace_points(1_000)
        .analyze_engine(&engine)?;
    let a = report.get("A").ok_or(Error::NoSimulationData)?;
    assert!(a.curve.top < a.curve.bottom);
    assert!((a.potency.p_value - 8.).abs() <= 0.02);
    Ok(())
}

#[test]
fn test_inhibition_follows_cheng_prusoff() -> Result<()> {
    let agonist = Ligand::new("agonist", 8.);
    let binding_range = ConcentrationRange::geometric(1e-6, 1e2, 17)?;
    let submaximal = BindingCurve::bind(1e-4, &binding_range, agonist.pkd())?.submaximal()?;
    assert!(submaximal > pkd_to_kd(8.) && submaximal < 0.1);

    let config = SweepConfig::inhibition(agonist, submaximal)
        .with_ligands(vec![Ligand::new("antagonist", 7.)])
        .with_pathway("Gs")
        .with_receptor_conc(1e-4)
        .with_concentration_range(ConcentrationRange::geometric(1e-5, 1e4, 19)?)
        .with_time(100., 200);
    let mut engine = DoseResponseEngine::new(&config, PulseNetwork, PulseSimulator::default())?;
    engine.run()?;
    let report = PotencyAnalyzer::new()
        .with_trace_points(1_000)
        .analyze_engine(&engine)?;

    assert_eq!(report.kind, PotencyKind::IC50);
    let data = &report.datasets[0];
    assert!(data.curve.top < data.curve.bottom);
    let expected = pkd_to_kd(7.) * (1. + submaximal / pkd_to_kd(8.));
    assert!((data.curve.ec - expected).abs() / expected < 2e-2);
    Ok(())
}

#[test]
fn test_failure_names_point_and_resume_keeps_ligands() -> Result<()> {
    let range = ConcentrationRange::geometric(1e-3, 10., 5)?;
    let second_point = range.values()[1];
    let mut engine = DoseResponseEngine::new(
        &activation("Gs", range),
        PulseNetwork,
        PulseSimulator::failing_on(7),
    )?;

    match engine.run() {
        Err(Error::SimulationFailure {
            ligand,
            concentration,
            message,
        }) => {
            assert_eq!(ligand, "B");
            assert_eq!(concentration, second_point);
            assert!(message.contains("underflow"));
        }
        other => panic!("expected a simulation failure, got {other:?}"),
    }
    assert_eq!(engine.state(), SweepState::Failed);
    assert_eq!(engine.output(), Err(Error::NoSimulationData));
    assert_eq!(engine.partial_output().sweeps.len(), 1);

    engine.resume()?;
    assert_eq!(engine.state(), SweepState::Completed);
    assert_eq!(engine.output()?.sweeps.len(), 2);
    Ok(())
}

#[test]
fn test_kinetic_inhibition_is_rejected() -> Result<()> {
    let config = SweepConfig::inhibition(Ligand::new("agonist", 8.), 0.05)
        .with_ligands(vec![Ligand::new("antagonist", 7.)])
        .with_pathway("Gs")
        .with_receptor_conc(1e-4)
        .with_concentration_range(ConcentrationRange::geometric(1e-3, 10., 5)?)
        .with_time(100., 200)
        .with_binding_kinetics(true);
    assert!(matches!(
        DoseResponseEngine::new(&config, PulseNetwork, PulseSimulator::default()),
        Err(Error::UnsupportedConfiguration { .. })
    ));
    Ok(())
}

#[test]
fn test_analysis_requires_completed_sweep() -> Result<()> {
    let engine = DoseResponseEngine::new(
        &activation("Gq", ConcentrationRange::geometric(1e-3, 10., 5)?),
        PulseNetwork,
        PulseSimulator::default(),
    )?;
    assert!(matches!(
        PotencyAnalyzer::new().analyze_engine(&engine),
        Err(Error::NoSimulationData)
    ));
    Ok(())
}
