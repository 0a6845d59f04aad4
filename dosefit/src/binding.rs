use crate::{
    ConcentrationRange, DoseResponseFitter, Error, LogisticCurve, Result, SubmaximalPointFinder,
    utils::min_max_scale,
};
use nalgebra::DVector;

/// Dissociation constant in uM of an affinity given as pKd.
pub fn pkd_to_kd(pkd: f64) -> f64 {
    10_f64.powf(6. - pkd)
}

fn check_concentration(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0. {
        return Err(Error::InvalidInput {
            field,
            reason: format!("concentration must be non-negative and finite, got {value}"),
        });
    }
    Ok(())
}

fn check_pkd(field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::InvalidInput {
            field,
            reason: format!("pKd must be finite, got {value}"),
        });
    }
    Ok(())
}

#[cfg_attr(doc, katexit::katexit)]
/// Receptor-ligand complex concentration at equilibrium, all concentrations in uM.
///
/// Without competitor the one-site depletion-aware solution
///
/// $$ [RL] = \frac{2 R_0 L_0}{s + \sqrt{s^2 - 4 R_0 L_0}}, \quad s = R_0 + L_0 + K_L $$
///
/// is used. With a competitor `C` the free receptor concentration $R$ is the root of the
/// receptor mass balance of the two-ligand competitive equilibrium
///
/// $$ g(R) = R + \frac{L_0 R}{K_L + R} + \frac{C_0 R}{K_C + R} - R_0 = 0 $$
///
/// which is increasing and concave on $[0, R_0]$. The analytic root of its cubic form is
/// refined to machine precision, and $[RL] = L_0 R / (K_L + R)$.
pub fn occupancy(
    receptor_total: f64,
    ligand_conc: f64,
    competitor_conc: f64,
    ligand_pkd: f64,
    competitor_pkd: f64,
) -> Result<f64> {
    check_concentration("receptor_total", receptor_total)?;
    check_concentration("ligand_conc", ligand_conc)?;
    check_concentration("competitor_conc", competitor_conc)?;
    check_pkd("ligand_pkd", ligand_pkd)?;
    check_pkd("competitor_pkd", competitor_pkd)?;
    if receptor_total == 0. || ligand_conc == 0. {
        return Ok(0.);
    }

    let (p0, a0) = (receptor_total, ligand_conc);
    let ka = pkd_to_kd(ligand_pkd);
    if competitor_conc == 0. {
        let s = p0 + a0 + ka;
        let disc = (s * s - 4. * p0 * a0).max(0.);
        let complex = 2. * p0 * a0 / (s + disc.sqrt());
        return Ok(complex.min(p0.min(a0)));
    }
    let free = free_receptor(p0, a0, competitor_conc, ka, pkd_to_kd(competitor_pkd));
    Ok(a0 * free / (ka + free))
}

const MAX_BALANCE_ITER: usize = 200;

#[cfg_attr(doc, katexit::katexit)]
/// Free receptor of the competitive two-ligand equilibrium.
///
/// Starts from the trigonometric root of the cubic (Wang, FEBS Lett. 1995)
///
/// $$ R^3 + a R^2 + b R + c = 0 $$
/// $$ a = K_L + K_C + L_0 + C_0 - R_0, \quad
///    b = K_C (L_0 - R_0) + K_L (C_0 - R_0) + K_L K_C, \quad
///    c = -K_L K_C R_0 $$
///
/// which cancels badly once the competitor is in large excess, and refines it with Newton
/// steps on the mass balance kept inside a bisection bracket.
fn free_receptor(p0: f64, a0: f64, b0: f64, ka: f64, kb: f64) -> f64 {
    let balance = |r: f64| {
        let val = r + a0 * r / (ka + r) + b0 * r / (kb + r) - p0;
        let grad = 1. + a0 * ka / (ka + r).powi(2) + b0 * kb / (kb + r).powi(2);
        (val, grad)
    };
    let (mut lo, mut hi) = (0., p0);
    let mut free = match cubic_root(p0, a0, b0, ka, kb) {
        r if r > 0. && r < p0 => r,
        // the tangent at zero undershoots the root of a concave balance
        _ => p0 / balance(0.).1,
    };
    for _ in 0..MAX_BALANCE_ITER {
        let (val, grad) = balance(free);
        if val == 0. {
            return free;
        }
        if val < 0. {
            lo = free;
        } else {
            hi = free;
        }
        let newton = free - val / grad;
        let next = if newton > lo && newton < hi {
            newton
        } else {
            0.5 * (lo + hi)
        };
        if (next - free).abs() <= f64::EPSILON * next {
            return next;
        }
        free = next;
    }
    free
}

fn cubic_root(p0: f64, a0: f64, b0: f64, ka: f64, kb: f64) -> f64 {
    let a = ka + kb + a0 + b0 - p0;
    let b = kb * (a0 - p0) + ka * (b0 - p0) + ka * kb;
    let c = -ka * kb * p0;
    let disc = (a * a - 3. * b).max(0.);
    if disc == 0. {
        return -a / 3.;
    }
    let arg = (-2. * a.powi(3) + 9. * a * b - 27. * c) / (2. * disc.powf(1.5));
    let theta = arg.clamp(-1., 1.).acos();
    (-a + 2. * disc.sqrt() * (theta / 3.).cos()) / 3.
}

/// Occupancy of a receptor over a ligand concentration range at equilibrium.
///
/// Used to derive the submaximal agonist concentration fed into inhibition sweeps.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingCurve {
    receptor_total: f64,
    pkd: f64,
    range: ConcentrationRange,
    occupancy: DVector<f64>,
}

impl BindingCurve {
    /// Computes the complex concentration at every point of `range`.
    pub fn bind(receptor_total: f64, range: &ConcentrationRange, pkd: f64) -> Result<Self> {
        let occupancy = range
            .iter()
            .map(|conc| occupancy(receptor_total, conc, 0., pkd, 0.))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            receptor_total,
            pkd,
            range: range.clone(),
            occupancy: DVector::from_vec(occupancy),
        })
    }

    /// Complex concentrations in range order.
    pub fn occupancy(&self) -> &DVector<f64> {
        &self.occupancy
    }

    /// Ligand concentrations.
    pub fn range(&self) -> &ConcentrationRange {
        &self.range
    }

    /// Total receptor concentration.
    pub fn receptor_total(&self) -> f64 {
        self.receptor_total
    }

    /// Ligand affinity.
    pub fn pkd(&self) -> f64 {
        self.pkd
    }

    /// Logistic fit of the complex concentrations.
    pub fn fit(&self) -> Result<LogisticCurve> {
        DoseResponseFitter::new().fit(self.range.values(), &self.occupancy)
    }

    /// Maximum bend point of the fitted binding curve.
    pub fn submaximal(&self) -> Result<f64> {
        let curve = self.fit()?;
        SubmaximalPointFinder::new().find(&curve, self.range.values())
    }

    /// Dense trace of the curve fitted to percent occupancy, rescaled onto 0..100.
    pub fn percent_trace(&self, num: usize) -> Result<(DVector<f64>, DVector<f64>)> {
        let percent = min_max_scale(&self.occupancy, 100.);
        let curve = DoseResponseFitter::new().fit(self.range.values(), &percent)?;
        let (x, y) = curve.trace(self.range.min(), self.range.max(), num);
        Ok((x, min_max_scale(&y, 100.)))
    }
}
