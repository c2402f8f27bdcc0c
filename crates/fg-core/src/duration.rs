// SPDX-License-Identifier: MIT OR Apache-2.0
//! Parsing for the unit-suffixed duration strings used throughout the
//! definition files (`ttl`, `window`, workflow and step `timeout`).
//!
//! Accepted forms: `"250ms"`, `"30s"`, `"5m"`, `"24h"`, `"7d"`, and a bare
//! integer which is read as seconds.  Anything else yields `None`; callers
//! decide whether that means "no expiry" or a configuration error.

use std::time::Duration;

/// Parse a duration string. Returns `None` when the string is unparseable.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (digits, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) if idx > 0 => s.split_at(idx),
        Some(_) => return None,
        None => (s, "s"),
    };
    let n: u64 = digits.parse().ok()?;

    match unit {
        "ms" => Some(Duration::from_millis(n)),
        "s" => Some(Duration::from_secs(n)),
        "m" => Some(Duration::from_secs(n * 60)),
        "h" => Some(Duration::from_secs(n * 3600)),
        "d" => Some(Duration::from_secs(n * 86_400)),
        _ => None,
    }
}
