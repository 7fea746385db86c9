//! Country name normalization.
//!
//! The agent recognizes countries by their common English names, while the
//! dataset's `country_region` column uses the JHU CSSE naming. This table
//! bridges the handful of names that differ.

/// Recognized alias -> canonical dataset name.
pub const COUNTRY_ALIASES: &[(&str, &str)] = &[
    ("United States of America", "US"),
    ("United States", "US"),
    ("Cape Verde", "Cabo Verde"),
    ("Democratic Republic of the Congo", "Congo (Kinshasa)"),
    ("Republic of the Congo", "Congo (Brazzaville)"),
    ("Côte d'Ivoire", "Cote d'Ivoire"),
    ("Vatikan", "Holy See"),
    ("South Korea", "Korea, South"),
    ("Taiwan", "Taiwan*"),
];

/// Map a raw country name to the dataset's canonical name.
///
/// Matching is exact. Unknown names are returned unchanged; a name the dataset
/// doesn't know simply matches no rows later on.
pub fn normalize_country(raw: &str) -> &str {
    COUNTRY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == raw)
        .map(|(_, canonical)| *canonical)
        .unwrap_or(raw)
}
