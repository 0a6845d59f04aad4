use crate::{Error, Result, utils::round_to};

/// Molar gas constant in J/(mol K).
pub const GAS_CONSTANT: f64 = 8.314_462_618;

/// Avogadro constant in 1/mol.
pub const AVOGADRO: f64 = 6.022_140_76e23;

const DALTON_TO_GRAM: f64 = 1.660_530_000_001_3e-24;

/// Unit of a temperature argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemperatureUnit {
    /// Kelvin.
    #[default]
    Kelvin,
    /// Degree Celsius.
    Celsius,
}

impl TemperatureUnit {
    /// Converts `value` in this unit to Kelvin.
    pub fn to_kelvin(&self, value: f64) -> f64 {
        match self {
            TemperatureUnit::Kelvin => value,
            TemperatureUnit::Celsius => value + 273.15,
        }
    }
}

#[cfg_attr(doc, katexit::katexit)]
/// Binding free energy in J/mol of a reaction with rate constants `kon` and `koff` at
/// `temperature` Kelvin,
///
/// $$ \Delta G = -R T \ln\frac{k_{off}}{k_{on}}. $$
pub fn binding_free_energy(kon: f64, koff: f64, temperature: f64) -> f64 {
    -GAS_CONSTANT * temperature * (koff / kon).ln()
}

#[cfg_attr(doc, katexit::katexit)]
/// Rescales the rate constants `kon` and `koff` measured at `t1` to the temperature `t2` by
/// the ratio of the binding free energies,
///
/// $$ s = \frac{\Delta G(T_2)}{\Delta G(T_1)}, \quad k'_{on} = s\,k_{on}, \quad k'_{off} = s\,k_{off}. $$
///
/// Both scaled constants are rounded to 3 decimals.
pub fn kinetic_temperature_scale(
    kon: f64,
    koff: f64,
    t1: f64,
    t2: f64,
    unit: TemperatureUnit,
) -> Result<(f64, f64)> {
    for (field, rate) in [("kon", kon), ("koff", koff)] {
        if !(rate.is_finite() && rate > 0.) {
            return Err(Error::InvalidInput {
                field,
                reason: format!("rate constant must be positive and finite, got {rate}"),
            });
        }
    }
    let (t1, t2) = (unit.to_kelvin(t1), unit.to_kelvin(t2));
    for (field, t) in [("t1", t1), ("t2", t2)] {
        if !(t.is_finite() && t > 0.) {
            return Err(Error::InvalidInput {
                field,
                reason: format!("absolute temperature must be positive, got {t} K"),
            });
        }
    }
    if t1 == t2 {
        return Ok((round_to(kon, 3), round_to(koff, 3)));
    }
    let dg1 = binding_free_energy(kon, koff, t1);
    if dg1 == 0. {
        return Err(Error::InvalidInput {
            field: "koff",
            reason: "kon equals koff, the binding free energy vanishes".to_string(),
        });
    }
    let scale = binding_free_energy(kon, koff, t2) / dg1;
    Ok((round_to(kon * scale, 3), round_to(koff * scale, 3)))
}

/// Converts a protein mass concentration in ug/L to nM given its molecular mass in Da,
/// rounded to 4 decimals.
pub fn micrograms_to_nanomolar(molecular_mass: f64, concentration: f64) -> Result<f64> {
    if !(molecular_mass.is_finite() && molecular_mass > 0.) {
        return Err(Error::InvalidInput {
            field: "molecular_mass",
            reason: format!("must be positive and finite, got {molecular_mass}"),
        });
    }
    if !(concentration.is_finite() && concentration >= 0.) {
        return Err(Error::InvalidInput {
            field: "concentration",
            reason: format!("must be non-negative and finite, got {concentration}"),
        });
    }
    // single molecule mass in ug
    let molecule = molecular_mass * DALTON_TO_GRAM / 1e-6;
    let molar = concentration / molecule / AVOGADRO;
    Ok(round_to(molar / 1e-9, 4))
}
