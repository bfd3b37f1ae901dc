//! Token-usage extraction.
//!
//! Providers report usage under different shapes depending on API version:
//! a flat total, separate input/output counts, prompt/completion counts, or
//! counts nested under `meta`. The extractor tries a fixed ordered list of
//! shape matchers and falls back to 0 -- a missing usage field must never
//! fail an otherwise-successful call.

use serde_json::Value;
use tracing::debug;

type ShapeMatcher = fn(&Value) -> Option<u64>;

/// Matchers tried in order; the first match wins.
const SHAPE_MATCHERS: &[(&str, ShapeMatcher)] = &[
    ("usage.total_tokens", flat_total),
    ("usage.input/output_tokens", input_output),
    ("usage.prompt/completion_tokens", prompt_completion),
    ("meta.billed_units", billed_units),
    ("meta.tokens", meta_tokens),
];

/// Extract a normalized token count from a raw provider response body.
pub fn extract_tokens(raw: &Value) -> u64 {
    for (shape, matcher) in SHAPE_MATCHERS {
        if let Some(tokens) = matcher(raw) {
            debug!(shape, tokens, "Token usage extracted");
            return tokens;
        }
    }
    debug!("No known token usage shape in response, defaulting to 0");
    0
}

fn flat_total(raw: &Value) -> Option<u64> {
    as_count(&raw["usage"]["total_tokens"])
}

fn input_output(raw: &Value) -> Option<u64> {
    sum_pair(&raw["usage"]["input_tokens"], &raw["usage"]["output_tokens"])
}

fn prompt_completion(raw: &Value) -> Option<u64> {
    sum_pair(
        &raw["usage"]["prompt_tokens"],
        &raw["usage"]["completion_tokens"],
    )
}

fn billed_units(raw: &Value) -> Option<u64> {
    let units = &raw["meta"]["billed_units"];
    sum_pair(&units["input_tokens"], &units["output_tokens"])
}

fn meta_tokens(raw: &Value) -> Option<u64> {
    let tokens = &raw["meta"]["tokens"];
    sum_pair(&tokens["input_tokens"], &tokens["output_tokens"])
}

/// A pair shape matches when at least one side is present; the missing side
/// counts as 0.
fn sum_pair(a: &Value, b: &Value) -> Option<u64> {
    match (as_count(a), as_count(b)) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
    }
}

/// Read a token count from a JSON number. Some providers bill in fractional
/// units and serialize counts as floats, so those are rounded rather than
/// rejected.
fn as_count(value: &Value) -> Option<u64> {
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    match value.as_f64() {
        Some(f) if f >= 0.0 => Some(f.round() as u64),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_total() {
        let raw = json!({ "usage": { "total_tokens": 120 } });
        assert_eq!(extract_tokens(&raw), 120);
    }

    #[test]
    fn test_input_output_pair() {
        let raw = json!({ "usage": { "input_tokens": 30, "output_tokens": 90 } });
        assert_eq!(extract_tokens(&raw), 120);
    }

    #[test]
    fn test_prompt_completion_pair() {
        let raw = json!({ "usage": { "prompt_tokens": 10, "completion_tokens": 5 } });
        assert_eq!(extract_tokens(&raw), 15);
    }

    #[test]
    fn test_nested_billed_units() {
        let raw = json!({
            "meta": { "billed_units": { "input_tokens": 18, "output_tokens": 82 } }
        });
        assert_eq!(extract_tokens(&raw), 100);
    }

    #[test]
    fn test_nested_meta_tokens() {
        let raw = json!({
            "meta": { "tokens": { "input_tokens": 7, "output_tokens": 3 } }
        });
        assert_eq!(extract_tokens(&raw), 10);
    }

    #[test]
    fn test_flat_total_wins_over_pairs() {
        // The flat total is tried first; overlapping shapes must not double
        // count.
        let raw = json!({
            "usage": {
                "total_tokens": 15,
                "prompt_tokens": 10,
                "completion_tokens": 5
            }
        });
        assert_eq!(extract_tokens(&raw), 15);
    }

    #[test]
    fn test_partial_pair_counts_present_side() {
        let raw = json!({ "usage": { "output_tokens": 40 } });
        assert_eq!(extract_tokens(&raw), 40);
    }

    #[test]
    fn test_float_billed_units_rounded() {
        let raw = json!({
            "meta": { "billed_units": { "input_tokens": 17.6, "output_tokens": 2.0 } }
        });
        assert_eq!(extract_tokens(&raw), 20);
    }

    #[test]
    fn test_missing_usage_defaults_to_zero() {
        let raw = json!({ "generations": [{ "text": "hello" }] });
        assert_eq!(extract_tokens(&raw), 0);
    }

    #[test]
    fn test_non_numeric_usage_defaults_to_zero() {
        let raw = json!({ "usage": { "total_tokens": "lots" } });
        assert_eq!(extract_tokens(&raw), 0);
    }

    #[test]
    fn test_non_object_body_defaults_to_zero() {
        assert_eq!(extract_tokens(&json!(null)), 0);
        assert_eq!(extract_tokens(&json!("plain text")), 0);
        assert_eq!(extract_tokens(&json!([1, 2, 3])), 0);
    }

    #[test]
    fn test_negative_count_rejected() {
        let raw = json!({ "usage": { "total_tokens": -5 } });
        assert_eq!(extract_tokens(&raw), 0);
    }
}
