//! Go-style durations (`1h`, `1h30m`, `90s`, `500ms`)
//!
//! Both object kinds carry timeouts in the format the orchestrator writes
//! them, so values round-trip through the wire as strings. Negative values
//! parse; rejecting them is the validator's job.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};
use std::str::FromStr;

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;
const NANOS_PER_MIN: u64 = 60 * NANOS_PER_SEC;
const NANOS_PER_HOUR: u64 = 60 * NANOS_PER_MIN;

/// Signed duration with nanosecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Duration {
    nanos: i64,
}

impl Duration {
    /// Zero duration
    pub const ZERO: Self = Self { nanos: 0 };

    /// Create from nanoseconds
    #[must_use]
    pub const fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    /// Create from whole seconds
    #[must_use]
    pub const fn from_secs(secs: i64) -> Self {
        Self {
            nanos: secs.saturating_mul(NANOS_PER_SEC as i64),
        }
    }

    /// Create from whole minutes
    #[must_use]
    pub const fn from_mins(mins: i64) -> Self {
        Self {
            nanos: mins.saturating_mul(NANOS_PER_MIN as i64),
        }
    }

    /// Create from whole hours
    #[must_use]
    pub const fn from_hours(hours: i64) -> Self {
        Self {
            nanos: hours.saturating_mul(NANOS_PER_HOUR as i64),
        }
    }

    /// Total nanoseconds
    #[must_use]
    pub const fn as_nanos(&self) -> i64 {
        self.nanos
    }

    /// Whether the duration is below zero
    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.nanos < 0
    }

    /// Convert to a std duration; `None` when negative
    #[must_use]
    pub fn to_std(&self) -> Option<std::time::Duration> {
        u64::try_from(self.nanos)
            .ok()
            .map(std::time::Duration::from_nanos)
    }
}

impl From<std::time::Duration> for Duration {
    fn from(value: std::time::Duration) -> Self {
        Self {
            nanos: i64::try_from(value.as_nanos()).unwrap_or(i64::MAX),
        }
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.nanos == 0 {
            return f.write_str("0s");
        }

        let mut out = String::new();
        if self.nanos < 0 {
            out.push('-');
        }
        let mut nanos = self.nanos.unsigned_abs();

        if nanos < NANOS_PER_SEC {
            let (unit, scale) = if nanos < NANOS_PER_MICRO {
                ("ns", 1)
            } else if nanos < NANOS_PER_MILLI {
                ("µs", NANOS_PER_MICRO)
            } else {
                ("ms", NANOS_PER_MILLI)
            };
            out.push_str(&fraction(nanos, scale));
            out.push_str(unit);
            return f.write_str(&out);
        }

        let hours = nanos / NANOS_PER_HOUR;
        nanos %= NANOS_PER_HOUR;
        let minutes = nanos / NANOS_PER_MIN;
        nanos %= NANOS_PER_MIN;

        if hours > 0 {
            write!(out, "{hours}h{minutes}m")?;
        } else if minutes > 0 {
            write!(out, "{minutes}m")?;
        }
        out.push_str(&fraction(nanos, NANOS_PER_SEC));
        out.push('s');
        f.write_str(&out)
    }
}

/// Render `value / scale` with trailing zeros of the fraction trimmed
fn fraction(value: u64, scale: u64) -> String {
    let whole = value / scale;
    let rem = value % scale;
    if rem == 0 {
        return whole.to_string();
    }
    let width = scale.to_string().len() - 1;
    let digits = format!("{rem:0width$}");
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

fn unit_scale(unit: &str) -> Option<u64> {
    match unit {
        "ns" => Some(1),
        "us" | "µs" | "μs" => Some(NANOS_PER_MICRO),
        "ms" => Some(NANOS_PER_MILLI),
        "s" => Some(NANOS_PER_SEC),
        "m" => Some(NANOS_PER_MIN),
        "h" => Some(NANOS_PER_HOUR),
        _ => None,
    }
}

impl FromStr for Duration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidDuration {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        let (negative, mut rest) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        if rest == "0" {
            return Ok(Self::ZERO);
        }
        if rest.is_empty() {
            return Err(invalid("empty duration"));
        }

        let mut total: i128 = 0;
        while !rest.is_empty() {
            let number_end = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .ok_or_else(|| invalid("missing unit"))?;
            let number = &rest[..number_end];
            rest = &rest[number_end..];

            let unit_end = rest
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(rest.len());
            let unit = &rest[..unit_end];
            rest = &rest[unit_end..];

            let scale = unit_scale(unit).ok_or_else(|| invalid("unknown unit"))?;
            let (whole, frac) = number.split_once('.').unwrap_or((number, ""));
            if whole.is_empty() && frac.is_empty() {
                return Err(invalid("missing number"));
            }

            let whole: i128 = if whole.is_empty() {
                0
            } else {
                whole.parse().map_err(|_| invalid("number out of range"))?
            };
            let out_of_range = || invalid("duration out of range");
            total = whole
                .checked_mul(i128::from(scale))
                .and_then(|amount| total.checked_add(amount))
                .ok_or_else(out_of_range)?;

            // Digits beyond nanosecond precision are dropped.
            let mut place = i128::from(scale);
            for digit in frac.chars() {
                place /= 10;
                if place == 0 {
                    break;
                }
                total = total
                    .checked_add(i128::from(digit.to_digit(10).unwrap_or(0)) * place)
                    .ok_or_else(out_of_range)?;
            }

            if total > i128::from(i64::MAX) {
                return Err(invalid("duration out of range"));
            }
        }

        let nanos = if negative { -total } else { total };
        Ok(Self {
            nanos: nanos as i64,
        })
    }
}

impl TryFrom<String> for Duration {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Duration> for String {
    fn from(value: Duration) -> Self {
        value.to_string()
    }
}
