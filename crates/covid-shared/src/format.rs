//! Reply text helpers.

/// Render an integer with `,` thousands separators (`1234567` -> `1,234,567`).
pub fn number_with_commas(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Location phrase used in replies: `in <country>` or `worldwide`.
///
/// Uses the country as the user said it, not the dataset's canonical name.
pub fn result_location(country: Option<&str>) -> String {
    match country {
        Some(c) if !c.is_empty() => format!("in {}", c),
        _ => "worldwide".to_string(),
    }
}

/// Death rate as a percentage with two decimals, e.g. `10.00`.
///
/// Halves round away from zero (`0.125` -> `0.13`).
pub fn death_rate(deaths: i64, confirmed: i64) -> String {
    let rate = deaths as f64 / confirmed as f64 * 100.0;
    format!("{:.2}", (rate * 100.0).round() / 100.0)
}
