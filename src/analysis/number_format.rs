/// Magnitude tiers, largest first.
const TIERS: [(u64, &str); 5] = [
    (1_000_000_000_000_000, "Q"),
    (1_000_000_000_000, "T"),
    (1_000_000_000, "B"),
    (1_000_000, "M"),
    (1_000, "K"),
];

pub const DEFAULT_PRECISION: usize = 1;

/// Abbreviate a count for display (`1500` -> `"1.5K"`), one fractional digit.
pub fn format_number(n: u64) -> String {
    format_number_with_precision(n, DEFAULT_PRECISION)
}

/// Abbreviate a count keeping at most `precision` fractional digits.
/// Digits are truncated, never rounded; a precision of 0 drops the fraction.
pub fn format_number_with_precision(n: u64, precision: usize) -> String {
    if n < 1 {
        return "0".to_string();
    }
    if n < 1000 {
        return n.to_string();
    }

    for (threshold, suffix) in TIERS {
        if n >= threshold {
            return shorten(n / threshold, n % threshold, threshold, precision, suffix);
        }
    }

    n.to_string()
}

fn shorten(whole: u64, remainder: u64, threshold: u64, precision: usize, suffix: &str) -> String {
    if remainder == 0 || precision == 0 {
        return format!("{whole}{suffix}");
    }

    // Thresholds are powers of ten, so the fraction is the zero-padded remainder.
    let width = threshold.to_string().len() - 1;
    let padded = format!("{remainder:0width$}");
    let fraction = padded.trim_end_matches('0');
    let digits: String = fraction.chars().take(precision).collect();

    format!("{whole}.{digits}{suffix}")
}
