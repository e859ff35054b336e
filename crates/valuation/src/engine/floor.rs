//! Free-text floor descriptor parsing shared by both valuation domains.

/// Mid-floor default used whenever a descriptor cannot be understood.
const DEFAULT_FLOOR: i64 = 5;

/// Midpoints for the known range codes. Only consulted after the hyphen
/// and "+" branches, so "01-05" resolves through the hyphen average and
/// "41+" resolves to 41, not 43.
const RANGE_CODES: [(&str, i64); 9] = [
    ("01-05", 3),
    ("06-10", 8),
    ("11-15", 13),
    ("16-20", 18),
    ("21-25", 23),
    ("26-30", 28),
    ("31-35", 33),
    ("36-40", 38),
    ("41+", 43),
];

/// Converts a floor descriptor such as "01-05", "12", "ground", or "41+"
/// into an integer floor number. Total: every malformed input resolves to
/// the mid-floor default instead of failing.
pub fn floor_number(floor_level: Option<&str>) -> i64 {
    let Some(raw) = floor_level else {
        return DEFAULT_FLOOR;
    };
    let text = raw.trim();
    if text.is_empty() {
        return DEFAULT_FLOOR;
    }

    if text.contains('-') {
        let mut parts = text.split('-');
        let (low, high) = (parts.next().unwrap_or(""), parts.next().unwrap_or(""));
        return match (low.trim().parse::<i64>(), high.trim().parse::<i64>()) {
            // Integer-truncating average, matching floor division.
            (Ok(low), Ok(high)) => (low + high).div_euclid(2),
            _ => DEFAULT_FLOOR,
        };
    }

    if !text.is_empty() && text.chars().all(|c| c.is_ascii_digit()) {
        return text.parse().unwrap_or(DEFAULT_FLOOR);
    }

    if text.eq_ignore_ascii_case("ground") || text.eq_ignore_ascii_case("g") {
        return 1;
    }

    if text.contains('+') {
        return text
            .replace('+', "")
            .trim()
            .parse()
            .unwrap_or(DEFAULT_FLOOR);
    }

    RANGE_CODES
        .iter()
        .find(|(code, _)| *code == text)
        .map(|(_, floor)| *floor)
        .unwrap_or(DEFAULT_FLOOR)
}
