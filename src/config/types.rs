use std::fmt;
use std::sync::OnceLock;

use regex_lite::{Regex, RegexBuilder};
use serde::de::Visitor;
use serde::{Deserialize, Deserializer};
use time::format_description::{self, BorrowedFormatItem, OwnedFormatItem};
use time::macros::format_description;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Duration(std::time::Duration);

impl Duration {
    pub fn from_secs(seconds: u64) -> Self {
        Self(std::time::Duration::from_secs(seconds))
    }

    pub fn from_millis(millis: u64) -> Self {
        Self(std::time::Duration::from_millis(millis))
    }

    pub fn as_secs(&self) -> u64 {
        self.0.as_secs()
    }
}

/// Parses strings like `1d 2h`, `90s` or `250ms` into a duration.
fn parse_duration(v: &str) -> Result<Duration, String> {
    static REGEXP: OnceLock<Regex> = OnceLock::new();

    let regexp = REGEXP.get_or_init(|| {
        RegexBuilder::new(
            r"
            ^
            (?:(?<days>    \d+)d)?  \s*
            (?:(?<hours>   \d+)h)?  \s*
            (?:(?<minutes> \d+)m)?  \s*
            (?:(?<seconds> \d+)s)?  \s*
            (?:(?<millis>  \d+)ms)?
            $",
        )
        .ignore_whitespace(true)
        .build()
        .expect("the duration regexp is valid")
    });
    let Some(captures) = regexp.captures(v.trim()) else {
        return Err(format!("`{v}` is not a duration"));
    };

    let parse = |name: &str| {
        if let Some(s) = captures.name(name).map(|m| m.as_str()) {
            s.parse::<u64>()
                .map(Some)
                .map_err(|e| format!("could not parse {name} (`{s}`): {e}"))
        } else {
            Ok(None)
        }
    };

    let days = parse("days")?;
    let hours = parse("hours")?;
    let minutes = parse("minutes")?;
    let seconds = parse("seconds")?;
    let millis = parse("millis")?;

    if [days, hours, minutes, seconds, millis].iter().all(Option::is_none) {
        return Err(format!("`{v}` is not a duration"));
    }

    days.unwrap_or(0)
        .checked_mul(24)
        .and_then(|h| h.checked_add(hours.unwrap_or(0)))
        .and_then(|h| h.checked_mul(60))
        .and_then(|m| m.checked_add(minutes.unwrap_or(0)))
        .and_then(|m| m.checked_mul(60))
        .and_then(|s| s.checked_add(seconds.unwrap_or(0)))
        .and_then(|s| s.checked_mul(1000))
        .and_then(|ms| ms.checked_add(millis.unwrap_or(0)))
        .map(Duration::from_millis)
        .ok_or_else(|| format!("duration `{v}` is too large"))
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurationVisitor;

        impl<'de> Visitor<'de> for DurationVisitor {
            type Value = Duration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a duration")
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                self.visit_u64(v.try_into().map_err(E::custom)?)
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(Duration::from_secs(v))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                parse_duration(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(DurationVisitor)
    }
}

impl From<std::time::Duration> for Duration {
    fn from(duration: std::time::Duration) -> Self {
        Self(duration)
    }
}

impl From<Duration> for std::time::Duration {
    fn from(duration: Duration) -> Self {
        duration.0
    }
}

#[derive(Debug, Clone)]
pub struct DateTimeFormat(OwnedFormatItem);

impl DateTimeFormat {
    pub fn as_item(&self) -> &OwnedFormatItem {
        &self.0
    }
}

impl Default for DateTimeFormat {
    fn default() -> Self {
        static DEFAULT: &[BorrowedFormatItem<'_>] = format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second] \
                [offset_hour sign:mandatory]:[offset_minute]"
        );

        Self(OwnedFormatItem::from(DEFAULT))
    }
}

impl<'de> Deserialize<'de> for DateTimeFormat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DateTimeFormatVisitor;

        impl<'de> Visitor<'de> for DateTimeFormatVisitor {
            type Value = DateTimeFormat;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a datetime format")
            }

            fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                format_description::parse_owned::<2>(s)
                    .map(DateTimeFormat)
                    .map_err(E::custom)
            }
        }

        deserializer.deserialize_str(DateTimeFormatVisitor)
    }
}

/// A fixed UTC offset written as `+09:00`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtcOffset(time::UtcOffset);

impl UtcOffset {
    pub fn into_inner(self) -> time::UtcOffset {
        self.0
    }
}

impl Default for UtcOffset {
    fn default() -> Self {
        Self(time::macros::offset!(+9))
    }
}

impl<'de> Deserialize<'de> for UtcOffset {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct UtcOffsetVisitor;

        impl<'de> Visitor<'de> for UtcOffsetVisitor {
            type Value = UtcOffset;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(formatter, "a UTC offset like `+09:00`")
            }

            fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                static FORMAT: &[BorrowedFormatItem<'_>] =
                    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

                time::UtcOffset::parse(s, FORMAT)
                    .map(UtcOffset)
                    .map_err(E::custom)
            }
        }

        deserializer.deserialize_str(UtcOffsetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compound_durations() {
        assert_eq!(parse_duration("1h 30m"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("2s"), Ok(Duration::from_secs(2)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("1d"), Ok(Duration::from_secs(86400)));
    }

    #[test]
    fn rejects_garbage_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("5 minutes").is_err());
    }

    #[test]
    fn parses_offsets() {
        #[derive(Deserialize)]
        struct Wrapper {
            offset: UtcOffset,
        }

        let w: Wrapper = toml::from_str(r#"offset = "-05:30""#).unwrap();
        assert_eq!(w.offset.into_inner().whole_minutes(), -330);
    }
}
