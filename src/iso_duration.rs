use std::sync::OnceLock;

use regex_lite::{Regex, RegexBuilder};

/// Parses the `PT#H#M#S` subset of ISO-8601 durations into seconds.
///
/// Returns `None` for anything else, including day components and fractional seconds.
pub fn parse_seconds(s: &str) -> Option<u64> {
    static REGEXP: OnceLock<Regex> = OnceLock::new();

    let regexp = REGEXP.get_or_init(|| {
        RegexBuilder::new(
            r"
            ^PT
            (?:(?<hours>   \d+)H)?
            (?:(?<minutes> \d+)M)?
            (?:(?<seconds> \d+)S)?
            $",
        )
        .ignore_whitespace(true)
        .build()
        .expect("the ISO duration regexp is valid")
    });
    let captures = regexp.captures(s.trim())?;

    let part = |name: &str| -> Option<Option<u64>> {
        match captures.name(name) {
            Some(m) => m.as_str().parse().ok().map(Some),
            None => Some(None),
        }
    };

    let hours = part("hours")?;
    let minutes = part("minutes")?;
    let seconds = part("seconds")?;

    if hours.is_none() && minutes.is_none() && seconds.is_none() {
        return None;
    }

    hours
        .unwrap_or(0)
        .checked_mul(60)?
        .checked_add(minutes.unwrap_or(0))?
        .checked_mul(60)?
        .checked_add(seconds.unwrap_or(0))
}
