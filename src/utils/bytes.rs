//! Human-readable byte deltas.

const UNITS: [&str; 7] = ["B", "kiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// Format a signed byte count with binary units and three significant
/// digits, e.g. `+1.21 kiB`, `-300 B`.
///
/// Zero gets a space where the sign would be, so it lines up with signed
/// values: `" 0 B"`.
pub fn format_delta(delta: i64) -> String {
    if delta == 0 {
        return format!(" 0 {}", UNITS[0]);
    }

    let sign = if delta < 0 { '-' } else { '+' };
    let magnitude = delta.unsigned_abs() as f64;
    let mut exponent = ((magnitude.ln() / 1024f64.ln()).floor() as usize).min(UNITS.len() - 1);
    let mut value = magnitude / 1024f64.powi(exponent as i32);
    // log rounding can land one unit short on exact powers of 1024
    if value >= 1024.0 && exponent < UNITS.len() - 1 {
        exponent += 1;
        value /= 1024.0;
    }

    format!("{sign}{} {}", significant(value), UNITS[exponent])
}

/// Three significant digits, trailing zeros dropped.
fn significant(value: f64) -> String {
    let decimals = if value >= 100.0 {
        0
    } else if value >= 10.0 {
        1
    } else {
        2
    };
    let formatted = format!("{value:.decimals$}");
    if formatted.contains('.') {
        formatted
            .trim_end_matches('0')
            .trim_end_matches('.')
            .to_string()
    } else {
        formatted
    }
}
