//! Lenient parsing of command parameters.
//!
//! The control surface never rejects a request for bad input. Each helper
//! takes the raw parameter text (if any) and yields a value inside the
//! documented range, substituting the caller's default when the text is
//! missing or not a number.

/// Parse an integer and clamp it into `lo..=hi`.
///
/// Whole-number text parses directly; fractional text (as produced by JSON
/// numbers like `42.7`) is truncated toward zero. Anything else yields
/// `default`, which is returned unclamped.
pub fn clamp_int(raw: Option<&str>, lo: i64, hi: i64, default: i64) -> i64 {
    match parse_int(raw) {
        Some(v) => v.clamp(lo, hi),
        None => default,
    }
}

/// Parse an integer that must already lie in `lo..=hi`; otherwise `default`.
///
/// Used for the drive speed, where an out-of-range value is treated the same
/// as garbage rather than pulled to the nearest bound.
pub fn int_in_range_or(raw: Option<&str>, lo: i64, hi: i64, default: i64) -> i64 {
    match parse_int(raw) {
        Some(v) if (lo..=hi).contains(&v) => v,
        _ => default,
    }
}

/// Parse a finite float and clamp it into `lo..=hi`; otherwise `default`.
pub fn clamp_float(raw: Option<&str>, lo: f64, hi: f64, default: f64) -> f64 {
    match raw.map(str::trim).and_then(|s| s.parse::<f64>().ok()) {
        Some(v) if v.is_finite() => v.clamp(lo, hi),
        _ => default,
    }
}

/// `true` when the parameter clamps to 1 on a 0/1 switch (default off).
pub fn switch_state(raw: Option<&str>) -> bool {
    clamp_int(raw, 0, 1, 0) == 1
}

fn parse_int(raw: Option<&str>) -> Option<i64> {
    let text = raw?.trim();
    if let Ok(v) = text.parse::<i64>() {
        return Some(v);
    }
    let f = text.parse::<f64>().ok()?;
    if !f.is_finite() {
        return None;
    }
    Some(f.trunc().clamp(i64::MIN as f64, i64::MAX as f64) as i64)
}
