//! Danish number and address text conventions.
//!
//! Source text uses `.` as thousands separator and `,` as decimal
//! separator, and amounts often carry a trailing `,-`.

/// Parses an integer amount like `1.234.567` or `1.234.567,-`.
///
/// Returns `None` on anything that is not a clean amount; absence is a
/// normal outcome, never an error.
pub fn parse_amount(text: &str) -> Option<i64> {
    let cleaned = text.trim().trim_end_matches(",-").replace('.', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Parses a decimal like `-3,25` into a float.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let cleaned = text.trim().replace('.', "").replace(',', ".");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// Flattens a multi-line field to one comma-separated line, dropping
/// empty segments.
pub fn flatten_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Splits a listing title into street address, postal code and city.
///
/// Everything up to the last comma is the street address; the remainder
/// starts with the postal code token, and all tokens after it join into
/// the city name. Titles without a comma become address-only.
pub fn split_address(title: &str) -> (String, String, String) {
    let title = title.trim();
    let Some(idx) = title.rfind(',') else {
        return (title.to_string(), String::new(), String::new());
    };
    let address = title[..idx].trim().to_string();
    let mut rest = title[idx + 1..].split_whitespace();
    let postal_code = rest.next().unwrap_or_default().to_string();
    let city = rest.collect::<Vec<_>>().join(" ");
    (address, postal_code, city)
}
