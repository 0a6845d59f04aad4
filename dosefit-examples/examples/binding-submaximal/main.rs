//! Equilibrium receptor occupancy of an agonist and its submaximal concentration
//!
//! The submaximal concentration is the maximum bend point of the logistic fitted to the
//! occupancy, the agonist level used against antagonists in inhibition sweeps.
//!
//! References:
//! - Sebaugh & McCray (2003), Pharmaceutical Statistics 2:167-174

use dosefit::{
    BindingCurve, ConcentrationRange, Potency, PotencyKind, Result, TemperatureUnit,
    kinetic_temperature_scale, micrograms_to_nanomolar,
};

// receptor of 52 kDa expressed at 50 ug/L
const RECEPTOR_MASS: f64 = 52_000.;
const RECEPTOR_UG: f64 = 50.;
const PKD: f64 = 8.;

fn main() -> Result<()> {
    dosefit_examples::init_tracing();

    let receptor = micrograms_to_nanomolar(RECEPTOR_MASS, RECEPTOR_UG)? * 1e-3;
    println!("Receptor: {RECEPTOR_UG} ug/L of {RECEPTOR_MASS} Da = {receptor} uM");

    let range = ConcentrationRange::geometric(1e-6, 1e2, 49)?;
    let binding = BindingCurve::bind(receptor, &range, PKD)?;
    let curve = binding.fit()?;
    println!("Fitted occupancy: {curve:?}");
    println!("{}", Potency::from_curve(&curve, PotencyKind::EC50));
    println!("Submaximal concentration: {} uM", binding.submaximal()?);

    let (x, y) = binding.percent_trace(9)?;
    println!("\n{:>12} {:>10}", "ligand uM", "bound %");
    for (xi, yi) in x.iter().zip(y.iter()) {
        println!("{xi:>12.3e} {yi:>10.2}");
    }

    let (kon, koff) = kinetic_temperature_scale(10., 0.1, 25., 37., TemperatureUnit::Celsius)?;
    println!("\nRate constants at 37 C: kon = {kon} 1/(uM s), koff = {koff} 1/s");

    Ok(())
}
