/// Render `value` with `decimals` fraction digits and comma-grouped thousands.
/// A value that rounds to zero is printed without a sign.
///
/// # Examples
///
/// ```
/// use insight_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5,  1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    let scale = 10_u64.pow(decimals);
    // Scale by (1 + ε) so decimal midpoints like 1.005 round away from zero.
    let units = (value.abs() * scale as f64 * (1.0 + f64::EPSILON)).round() as u64;

    let whole = group_thousands(&(units / scale).to_string());
    let body = if decimals == 0 {
        whole
    } else {
        format!(
            "{}.{:0width$}",
            whole,
            units % scale,
            width = decimals as usize
        )
    };

    if value < 0.0 && units > 0 {
        format!("-{}", body)
    } else {
        body
    }
}

/// Format a count with thousands separators.
///
/// ```
/// use insight_core::formatting::format_count;
///
/// assert_eq!(format_count(12_345), "12,345");
/// ```
pub fn format_count(count: usize) -> String {
    group_thousands(&count.to_string())
}

/// Format a signed change with an explicit sign, or `"-"` when there is no
/// previous value to compare against.
///
/// ```
/// use insight_core::formatting::format_delta;
///
/// assert_eq!(format_delta(Some(12.0), 0), "+12");
/// assert_eq!(format_delta(Some(-0.125), 2), "-0.13");
/// assert_eq!(format_delta(Some(0.0), 1), "0.0");
/// assert_eq!(format_delta(None, 1), "-");
/// ```
pub fn format_delta(delta: Option<f64>, decimals: u32) -> String {
    match delta {
        None => "-".to_string(),
        Some(d) => {
            let body = format_number(d, decimals);
            if d > 0.0 && body.trim_start_matches(&['0', '.', ','][..]).is_empty() {
                body
            } else if d > 0.0 {
                format!("+{}", body)
            } else {
                body
            }
        }
    }
}

/// Format a fraction in `0..=1` as a percentage string.
///
/// ```
/// use insight_core::formatting::format_ratio;
///
/// assert_eq!(format_ratio(0.4567, 1), "45.7%");
/// ```
pub fn format_ratio(fraction: f64, decimals: u32) -> String {
    format!("{}%", format_number(fraction * 100.0, decimals))
}

/// Shorten `text` to at most `max_chars` characters, appending `…` when cut.
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    let single_line: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if single_line.chars().count() <= max_chars {
        return single_line;
    }
    let mut out: String = single_line.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert a comma before every group of three trailing ASCII digits.
fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number_zero() {
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_number(0.0, 2), "0.00");
    }

    #[test]
    fn test_format_number_with_thousands() {
        assert_eq!(format_number(1_234.5, 1), "1,234.5");
        assert_eq!(format_number(1_000.0, 0), "1,000");
    }

    #[test]
    fn test_format_number_negative() {
        assert_eq!(format_number(-9_876.5, 1), "-9,876.5");
    }

    #[test]
    fn test_format_number_negative_rounding_to_zero_has_no_sign() {
        assert_eq!(format_number(-0.001, 1), "0.0");
    }

    #[test]
    fn test_format_number_rounds_up() {
        assert_eq!(format_number(1.005, 2), "1.01");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }

    #[test]
    fn test_format_delta_signs() {
        assert_eq!(format_delta(Some(3.5), 1), "+3.5");
        assert_eq!(format_delta(Some(-3.5), 1), "-3.5");
        assert_eq!(format_delta(Some(0.0), 0), "0");
        assert_eq!(format_delta(Some(0.0001), 2), "0.00");
        assert_eq!(format_delta(None, 2), "-");
    }

    #[test]
    fn test_format_ratio() {
        assert_eq!(format_ratio(0.0, 0), "0%");
        assert_eq!(format_ratio(1.0, 1), "100.0%");
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("line one\nline two", 40), "line one line two");
        assert_eq!(truncate_text("abcdefghij", 5), "abcd…");
        assert_eq!(truncate_text("렉이 너무 심해요", 4), "렉이 …");
    }
}
