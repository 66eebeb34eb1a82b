//! Free-text configuration parsing for the funding monitor.
//!
//! Malformed input never fails: a typo disables a filter instead of
//! crashing, so every parser degrades to "no constraint".

/// Parses a comma-separated minute list ("15, 5") into a sorted, deduplicated
/// ascending list. Float-like tokens are truncated to integers; unparseable
/// or negative tokens are discarded.
pub fn parse_minute_list(text: &str) -> Vec<u32> {
    let mut minutes: Vec<u32> = text
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            let value = part.parse::<f64>().ok()?;
            if !value.is_finite() || value < 0.0 {
                return None;
            }
            Some(value.trunc() as u32)
        })
        .collect();
    minutes.sort_unstable();
    minutes.dedup();
    minutes
}

/// Parses a single percent threshold. Zero, negative or unparseable input
/// means "threshold disabled".
pub fn parse_threshold(text: &str) -> Option<f64> {
    let value = text.trim().parse::<f64>().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    Some(value)
}

/// Threshold filter over a signed funding rate percentage. With both sides
/// disabled everything passes; otherwise the sides are OR'd, not AND'd.
pub fn passes_threshold(
    signed_rate_pct: f64,
    threshold_pos: Option<f64>,
    threshold_neg: Option<f64>,
) -> bool {
    if threshold_pos.is_none() && threshold_neg.is_none() {
        return true;
    }
    if let Some(pos) = threshold_pos {
        if signed_rate_pct >= pos {
            return true;
        }
    }
    if let Some(neg) = threshold_neg {
        if signed_rate_pct <= -neg {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_list_discards_invalid_and_negative_then_sorts_and_dedups() {
        assert_eq!(parse_minute_list("15, 5, abc, -3, 15"), vec![5, 15]);
    }

    #[test]
    fn minute_list_truncates_float_like_tokens() {
        assert_eq!(parse_minute_list("7.9, 2.1"), vec![2, 7]);
    }

    #[test]
    fn minute_list_of_garbage_is_empty() {
        assert!(parse_minute_list("").is_empty());
        assert!(parse_minute_list("x,,-1,nan").is_empty());
    }

    #[test]
    fn threshold_rejects_zero_negative_and_garbage() {
        assert_eq!(parse_threshold("1.0"), Some(1.0));
        assert_eq!(parse_threshold(" 0.25 "), Some(0.25));
        assert_eq!(parse_threshold("0"), None);
        assert_eq!(parse_threshold("-2"), None);
        assert_eq!(parse_threshold("abc"), None);
    }

    #[test]
    fn threshold_filter_uses_or_semantics() {
        assert!(passes_threshold(2.0, Some(1.0), None));
        assert!(passes_threshold(-2.0, Some(1.0), Some(1.0)));
        assert!(!passes_threshold(0.5, Some(1.0), Some(1.0)));
        assert!(passes_threshold(0.5, None, None));
    }

    #[test]
    fn negative_side_alone_still_filters() {
        assert!(passes_threshold(-1.5, None, Some(1.0)));
        assert!(!passes_threshold(1.5, None, Some(1.0)));
    }
}
