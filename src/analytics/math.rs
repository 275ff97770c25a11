//! Guarded arithmetic for report figures.

/// Round `value` half away from zero to `places` decimals.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

/// `numerator / denominator`, or 0 when the quotient is not finite.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let value = numerator / denominator;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// `part / whole × 100` rounded to `places`, 0 when `whole` is 0.
pub fn percentage(part: f64, whole: f64, places: u32) -> f64 {
    round_to(ratio(part, whole) * 100.0, places)
}
