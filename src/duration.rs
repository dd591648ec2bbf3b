//! Parsing of the short duration expressions typed into moderation prompts.

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)([smhd])").expect("duration pattern is valid"));

/// Parse `<integer><unit>` with unit one of `s`, `m`, `h`, `d`.
///
/// The first pair found in the input wins, so `"2h30m"` is two hours.
/// Returns `None` for input without a pair, for a zero amount, and on overflow.
#[must_use]
pub fn parse_duration(input: &str) -> Option<Duration> {
    let captures = DURATION_RE.captures(input)?;
    let amount: u64 = captures.get(1)?.as_str().parse().ok()?;
    let unit_secs = match captures.get(2)?.as_str() {
        "s" => 1,
        "m" => 60,
        "h" => 3_600,
        "d" => 86_400,
        _ => return None,
    };
    let secs = amount.checked_mul(unit_secs)?;
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Render a duration back in its largest whole unit, e.g. `90m` becomes `1h 30m`.
#[must_use]
pub fn describe(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    let mut parts = Vec::new();
    for (unit, size) in [("d", 86_400), ("h", 3_600), ("m", 60), ("s", 1)] {
        if secs >= size {
            parts.push(format!("{}{unit}", secs / size));
            secs %= size;
        }
    }
    if parts.is_empty() {
        "0s".to_string()
    } else {
        parts.join(" ")
    }
}
