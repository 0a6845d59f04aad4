use crate::{
    DoseResponseEngine, DoseResponseFitter, Error, LogisticCurve, Mode, Pathway, Potency,
    PotencyKind, Result, SignalingNetwork, Simulator, SweepOutput, fit::FIT_TRACE_POINTS,
    utils::min_max_scale,
};
use nalgebra::DVector;
use serde::Serialize;
use std::{io::Write, path::Path};

#[derive(Debug, Serialize)]
struct PotencyRow<'a> {
    ligand: &'a str,
    value: f64,
    p_value: f64,
}

/// Dose-response data and fit of one ligand.
#[derive(Debug, Clone, PartialEq)]
pub struct DoseResponseDataset {
    /// Ligand name.
    pub label: String,
    /// Swept concentrations in uM.
    pub concentrations: DVector<f64>,
    /// Pathway response per concentration.
    pub raw: DVector<f64>,
    /// Responses min-max scaled onto 0..100.
    pub normalized: DVector<f64>,
    /// Concentrations of the dense fitted trace.
    pub fitted_x: DVector<f64>,
    /// Fitted responses at `fitted_x`.
    pub fitted_y: DVector<f64>,
    /// Logistic fitted to the normalized responses.
    pub curve: LogisticCurve,
    /// EC50 or IC50 of `curve`.
    pub potency: Potency,
}

/// Potencies of every ligand of a sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct PotencyReport {
    /// Pathway the responses were read from.
    pub pathway: Pathway,
    /// EC50 for activation, IC50 for inhibition sweeps.
    pub kind: PotencyKind,
    /// One dataset per ligand in sweep order.
    pub datasets: Vec<DoseResponseDataset>,
}

impl PotencyReport {
    /// Dataset of `ligand`.
    pub fn get(&self, ligand: &str) -> Option<&DoseResponseDataset> {
        self.datasets.iter().find(|d| d.label == ligand)
    }

    /// Ligand names with their potencies.
    pub fn potencies(&self) -> Vec<(&str, Potency)> {
        self.datasets
            .iter()
            .map(|d| (d.label.as_str(), d.potency))
            .collect()
    }

    /// Writes the potency table, one row per ligand.
    pub fn to_csv_writer<W: Write>(&self, writer: W) -> Result<()> {
        // headers carry the potency kind
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        let value_header = format!("{} (uM)", self.kind);
        let p_header = format!("p{}", self.kind);
        writer.write_record(["Ligand", value_header.as_str(), p_header.as_str()])?;
        for (ligand, potency) in self.potencies() {
            writer.serialize(PotencyRow {
                ligand,
                value: potency.value,
                p_value: potency.p_value,
            })?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Writes the potency table to a csv file.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_csv_writer(std::fs::File::create(path)?)
    }
}

/// Reduces swept time courses to dose-response curves and fits their potency.
///
/// Each concentration point is reduced to [Pathway::response] of the pathway observable,
/// the responses of one ligand are min-max scaled to percent and fitted with a
/// [DoseResponseFitter].
#[derive(Debug, Clone)]
pub struct PotencyAnalyzer {
    fitter: DoseResponseFitter,
    trace_points: usize,
}

impl Default for PotencyAnalyzer {
    fn default() -> Self {
        Self {
            fitter: DoseResponseFitter::default(),
            trace_points: FIT_TRACE_POINTS,
        }
    }
}

impl PotencyAnalyzer {
    /// Creates the analyzer with the default fitter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the analyzer with given fitter.
    pub fn with_fitter(mut self, fitter: DoseResponseFitter) -> Self {
        self.fitter = fitter;
        self
    }

    /// Returns the analyzer with given number of fitted trace points.
    pub fn with_trace_points(mut self, trace_points: usize) -> Self {
        self.trace_points = trace_points;
        self
    }

    /// Analyzes the output of a completed engine.
    pub fn analyze_engine<N, S>(&self, engine: &DoseResponseEngine<N, S>) -> Result<PotencyReport>
    where
        N: SignalingNetwork,
        S: Simulator<N::Model>,
    {
        self.analyze(engine.output()?)
    }

    /// Fits every ligand of `output`.
    pub fn analyze(&self, output: &SweepOutput) -> Result<PotencyReport> {
        if output.sweeps.is_empty() {
            return Err(Error::NoSimulationData);
        }
        let kind = match output.mode {
            Mode::Activation => PotencyKind::EC50,
            Mode::Inhibition { .. } => PotencyKind::IC50,
        };
        let pathway = output.pathway;
        let observable = pathway.observable();

        let mut datasets = Vec::with_capacity(output.sweeps.len());
        for sweep in &output.sweeps {
            let label = sweep.ligand.name().to_string();
            let concentrations = DVector::from_iterator(
                sweep.runs.len(),
                sweep.runs.iter().map(|r| r.concentration),
            );
            let raw = sweep
                .runs
                .iter()
                .map(|run| {
                    run.trajectory
                        .get(observable)
                        .map(|series| pathway.response(series))
                        .ok_or_else(|| Error::InvalidInput {
                            field: "observable",
                            reason: format!(
                                "{observable} not recorded for {label} at {} uM",
                                run.concentration
                            ),
                        })
                })
                .collect::<Result<Vec<_>>>()?;
            let raw = DVector::from_vec(raw);
            let normalized = min_max_scale(&raw, 100.);

            let curve = self.fitter.fit(&concentrations, &normalized).inspect_err(|e| {
                tracing::error!(ligand = %label, error = %e, "dose-response fit failed");
            })?;
            let (fitted_x, fitted_y) =
                curve.trace(concentrations.min(), concentrations.max(), self.trace_points);
            let potency = Potency::from_curve(&curve, kind);
            tracing::info!(ligand = %label, %potency, "potency estimated");

            datasets.push(DoseResponseDataset {
                label,
                concentrations,
                raw,
                normalized,
                fitted_x,
                fitted_y,
                curve,
                potency,
            });
        }
        Ok(PotencyReport {
            pathway,
            kind,
            datasets,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ConcentrationRange, Ligand, LigandSweep, SimulationRun, Trajectory, grid::geomspace,
    };

    fn output(pathway: Pathway, mode: Mode, curve: &LogisticCurve) -> Result<SweepOutput> {
        let range = ConcentrationRange::new(geomspace(1e-7, 1e3, 11).as_slice().to_vec())?;
        let runs = range
            .iter()
            .map(|conc| {
                let level = curve.evaluate(conc);
                SimulationRun {
                    concentration: conc,
                    time: DVector::from_vec(vec![0., 1., 2.]),
                    trajectory: Trajectory::new().with(
                        pathway.observable(),
                        DVector::from_vec(vec![0., level, 0.5 * level]),
                    ),
                }
            })
            .collect();
        Ok(SweepOutput {
            mode,
            pathway,
            range,
            sweeps: vec![LigandSweep {
                ligand: Ligand::new("L1", 8.),
                runs,
            }],
        })
    }

    #[test]
    fn test_analyze_activation() -> Result<()> {
        let truth = LogisticCurve::new(0.1, 0.9, 0.02, 1.);
        let report = PotencyAnalyzer::new()
            .with_trace_points(100)
            .analyze(&output(Pathway::Gs, Mode::Activation, &truth)?)?;
        assert_eq!(report.kind, PotencyKind::EC50);
        let data = report.get("L1").ok_or(Error::NoSimulationData)?;
        assert_eq!(data.raw.len(), 11);
        assert_eq!(data.normalized.min(), 0.);
        assert_eq!(data.normalized.max(), 100.);
        assert_eq!(data.fitted_x.len(), 100);
        assert!((data.curve.ec - 0.02).abs() / 0.02 < 1e-2);
        assert!((data.potency.p_value - 7.7).abs() < 0.01);
        Ok(())
    }

    #[test]
    fn test_analyze_gi_inverse_readout() -> Result<()> {
        // cAMP drops with ligand, the inverse readout rises
        let truth = LogisticCurve::new(0.8, 0.2, 0.5, 1.);
        let mode = Mode::Inhibition {
            agonist: Ligand::new("agonist", 8.),
            agonist_submaximal: 0.05,
        };
        let report = PotencyAnalyzer::new()
            .with_trace_points(100)
            .analyze(&output(Pathway::Gi, mode, &truth)?)?;
        assert_eq!(report.kind, PotencyKind::IC50);
        let data = &report.datasets[0];
        assert!(data.raw.as_slice().windows(2).all(|w| w[1] > w[0]));
        assert!(data.curve.top > data.curve.bottom);
        assert!((data.curve.ec - 0.5).abs() / 0.5 < 1e-2);
        Ok(())
    }

    #[test]
    fn test_analyze_missing_observable() -> Result<()> {
        let truth = LogisticCurve::new(0., 1., 0.02, 1.);
        let mut out = output(Pathway::Gs, Mode::Activation, &truth)?;
        out.pathway = Pathway::Gq;
        assert!(matches!(
            PotencyAnalyzer::new().analyze(&out),
            Err(Error::InvalidInput {
                field: "observable",
                ..
            })
        ));
        out.sweeps.clear();
        assert_eq!(PotencyAnalyzer::new().analyze(&out), Err(Error::NoSimulationData));
        Ok(())
    }

    #[test]
    fn test_potency_csv() -> Result<()> {
        let truth = LogisticCurve::new(0., 1., 0.02, 1.);
        let report = PotencyAnalyzer::new()
            .with_trace_points(10)
            .analyze(&output(Pathway::Gs, Mode::Activation, &truth)?)?;
        let mut buf = vec![];
        report.to_csv_writer(&mut buf)?;
        let text = String::from_utf8(buf).map_err(|e| Error::Csv(e.to_string()))?;
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Ligand,EC50 (uM),pEC50"));
        assert!(
            lines
                .next()
                .is_some_and(|l| l.starts_with("L1,") && l.ends_with(",7.7"))
        );
        // rows are serialized without a second header line
        assert_eq!(lines.next(), None);
        Ok(())
    }
}
