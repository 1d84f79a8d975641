/// Fraction digits kept when the caller does not specify a precision.
pub const DEFAULT_MAX_FRACTION_DIGITS: usize = 6;

/// Formats a raw integer token amount into a human-readable decimal string,
/// scaling by `decimals`, with at most [`DEFAULT_MAX_FRACTION_DIGITS`]
/// fraction digits.
pub fn format_units(value: &str, decimals: u8) -> String {
    format_units_with(value, decimals, DEFAULT_MAX_FRACTION_DIGITS)
}

/// Like [`format_units`] with an explicit fraction-digit cap.
///
/// Trailing fraction zeros are trimmed; anything beyond `max_fraction_digits`
/// is truncated, never rounded. A leading `-` is preserved. The input must be
/// an integer in base 10; non-digit characters after the sign are kept as-is
/// since amounts arrive from typed RPC decoding, not user input.
pub fn format_units_with(value: &str, decimals: u8, max_fraction_digits: usize) -> String {
    let (sign, digits) = match value.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", value),
    };
    let trimmed = digits.trim_start_matches('0');
    let trimmed = if trimmed.is_empty() { "0" } else { trimmed };

    let decimals = usize::from(decimals);
    if decimals == 0 {
        return format!("{sign}{trimmed}");
    }

    let padded = format!("{:0>width$}", trimmed, width = decimals.saturating_add(1));
    let split = padded.len().saturating_sub(decimals);
    let integer_part = &padded[..split];
    let fraction_part = padded[split..].trim_end_matches('0');
    let fraction_part = if fraction_part.len() > max_fraction_digits {
        // Truncation can expose new trailing zeros, e.g. "000000001" capped
        // at six digits.
        padded[split..][..max_fraction_digits].trim_end_matches('0')
    } else {
        fraction_part
    };

    if fraction_part.is_empty() {
        format!("{sign}{integer_part}")
    } else {
        format!("{sign}{integer_part}.{fraction_part}")
    }
}
