use nalgebra::DVector;

/// Rounds `value` to the given number of decimals.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let scale = 10_f64.powi(decimals as i32);
    (value * scale).round() / scale
}

/// Number of fractional digits of the shortest decimal representation of `value`, i.e. the
/// precision at which `value` was stated (`1.25` -> 2, `2.0` -> 0).
pub fn stated_decimals(value: f64) -> u32 {
    let repr = format!("{value}");
    match repr.split_once('.') {
        Some((_, fraction)) => fraction.trim_end_matches('0').len() as u32,
        None => 0,
    }
}

/// Min-max scales `values` onto `[0, scale]`. A constant vector maps to zeros.
pub fn min_max_scale(values: &DVector<f64>, scale: f64) -> DVector<f64> {
    let (min, max) = (values.min(), values.max());
    let span = max - min;
    if span == 0. {
        return DVector::zeros(values.len());
    }
    values.map(|v| (v - min) / span * scale)
}

/// Indices of the local maxima of `values`. Flat peaks report their middle index, edges are
/// never peaks.
pub fn find_peaks(values: &[f64]) -> Vec<usize> {
    let mut peaks = vec![];
    let n = values.len();
    let mut i = 1;
    while i + 1 < n {
        if values[i - 1] < values[i] {
            let mut ahead = i + 1;
            while ahead + 1 < n && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    peaks
}
