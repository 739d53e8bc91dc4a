//! Formatting helpers shared by the projections and reports.

pub const UNAVAILABLE: &str = "N/A";

/// `7/10`, `6.5/10`, or `N/A` when the score is unavailable.
pub fn score_out_of_ten(score: Option<f64>) -> String {
    match score {
        Some(value) if value.is_finite() => format!("{}/10", round2(value)),
        _ => UNAVAILABLE.to_string(),
    }
}

/// Two-decimal rendering with the `N/A` sentinel.
pub fn two_decimals(value: Option<f64>) -> String {
    match value {
        Some(value) if value.is_finite() => format!("{value:.2}"),
        _ => UNAVAILABLE.to_string(),
    }
}

/// Cut `text` to at most `max_chars` characters, appending `...` when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

/// `has_external_validation` → `Has External Validation`.
pub fn title_case(name: &str) -> String {
    name.replace('_', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn indicator_marker(satisfied: bool) -> &'static str {
    if satisfied { "✅" } else { "❌" }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
