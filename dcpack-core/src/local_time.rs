//! Wall-clock timestamps with explicit UTC offsets.
//!
//! DCP XML carries issue dates and content-version stamps in the form
//! `YYYY-MM-DDTHH:MM:SS.sss+HH:MM`; the offset is stored separately so that
//! the original zone survives a round trip.

use crate::error::{Error, Result};
use chrono::{Datelike, Local, Offset, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A signed offset from UTC.
///
/// The hour must lie in [-11, 12] and the minute in [-30, 30]; both carry
/// the sign, so Newfoundland is `(-3, -30)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UtcOffset {
    hour: i32,
    minute: i32,
}

impl UtcOffset {
    /// Create an offset, validating both fields.
    pub fn new(hour: i32, minute: i32) -> Result<Self> {
        let mut offset = Self::default();
        offset.set_hour(hour)?;
        offset.set_minute(minute)?;
        Ok(offset)
    }

    /// Hour component.
    pub fn hour(&self) -> i32 {
        self.hour
    }

    /// Minute component.
    pub fn minute(&self) -> i32 {
        self.minute
    }

    /// Set the hour component; values outside [-11, 12] are rejected.
    pub fn set_hour(&mut self, hour: i32) -> Result<()> {
        if !(-11..=12).contains(&hour) {
            return Err(Error::bad_setting(format!("UTC offset hour {hour}")));
        }
        self.hour = hour;
        Ok(())
    }

    /// Set the minute component; values outside [-30, 30] are rejected.
    pub fn set_minute(&mut self, minute: i32) -> Result<()> {
        if !(-30..=30).contains(&minute) {
            return Err(Error::bad_setting(format!("UTC offset minute {minute}")));
        }
        self.minute = minute;
        Ok(())
    }
}

impl fmt::Display for UtcOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.hour < 0 || (self.hour == 0 && self.minute < 0) {
            '-'
        } else {
            '+'
        };
        write!(f, "{}{:02}:{:02}", sign, self.hour.abs(), self.minute.abs())
    }
}

/// A local date and time with its UTC offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalTime {
    /// Year.
    pub year: i32,
    /// Month (1-12).
    pub month: u32,
    /// Day of month (1-31).
    pub day: u32,
    /// Hour (0-23).
    pub hour: u32,
    /// Minute (0-59).
    pub minute: u32,
    /// Second (0-59).
    pub second: u32,
    /// Millisecond (0-999).
    pub millisecond: u32,
    /// Offset from UTC.
    pub offset: UtcOffset,
}

impl LocalTime {
    /// The current local time, with the system's UTC offset.
    pub fn now() -> Self {
        let now = Local::now();
        let offset_seconds = now.offset().fix().local_minus_utc();
        let hour = offset_seconds / 3600;
        let minute = (offset_seconds % 3600) / 60;
        Self {
            year: now.year(),
            month: now.month(),
            day: now.day(),
            hour: now.hour(),
            minute: now.minute(),
            second: now.second(),
            millisecond: now.timestamp_subsec_millis().min(999),
            offset: UtcOffset::new(hour, minute).unwrap_or_default(),
        }
    }

    /// The XML form, e.g. `2024-03-01T09:30:00.000+01:00`.
    pub fn as_string(&self) -> String {
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}{}",
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
            self.millisecond,
            self.offset
        )
    }
}

impl fmt::Display for LocalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl FromStr for LocalTime {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::misc(format!("bad local time '{s}'"));

        // Date and time halves around the mandatory 'T'.
        let (date, rest) = s.split_once('T').ok_or_else(bad)?;
        let date: Vec<&str> = date.split('-').collect();
        if date.len() != 3 {
            return Err(bad());
        }

        // The offset begins at the last '+' or '-' of the time half; 'Z' is
        // accepted as UTC.
        let (time, offset) = if let Some(t) = rest.strip_suffix('Z') {
            (t, ("+".to_string(), "00".to_string(), "00".to_string()))
        } else {
            let pos = rest.rfind(['+', '-']).ok_or_else(bad)?;
            let (time, tail) = rest.split_at(pos);
            let (oh, om) = tail[1..].split_once(':').ok_or_else(bad)?;
            (time, (tail[..1].to_string(), oh.to_string(), om.to_string()))
        };

        let (hms, millis) = match time.split_once('.') {
            Some((hms, frac)) => (hms, frac.parse::<u32>().map_err(|_| bad())?),
            None => (time, 0),
        };
        let hms: Vec<&str> = hms.split(':').collect();
        if hms.len() != 3 {
            return Err(bad());
        }

        let sign: i32 = if offset.0 == "-" { -1 } else { 1 };
        let offset = UtcOffset::new(
            sign * offset.1.parse::<i32>().map_err(|_| bad())?,
            sign * offset.2.parse::<i32>().map_err(|_| bad())?,
        )?;

        Ok(Self {
            year: date[0].parse().map_err(|_| bad())?,
            month: date[1].parse().map_err(|_| bad())?,
            day: date[2].parse().map_err(|_| bad())?,
            hour: hms[0].parse().map_err(|_| bad())?,
            minute: hms[1].parse().map_err(|_| bad())?,
            second: hms[2].parse().map_err(|_| bad())?,
            millisecond: millis,
            offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_bounds() {
        assert!(UtcOffset::new(-11, -30).is_ok());
        assert!(UtcOffset::new(12, 30).is_ok());
        assert!(UtcOffset::new(-12, 0).is_err());
        assert!(UtcOffset::new(13, 0).is_err());
        assert!(UtcOffset::new(0, 31).is_err());
    }

    #[test]
    fn test_offset_display() {
        assert_eq!(UtcOffset::new(1, 0).unwrap().to_string(), "+01:00");
        assert_eq!(UtcOffset::new(-3, -30).unwrap().to_string(), "-03:30");
        assert_eq!(UtcOffset::default().to_string(), "+00:00");
    }

    #[test]
    fn test_round_trip() {
        let s = "2024-03-01T09:30:05.250-03:30";
        let t: LocalTime = s.parse().unwrap();
        assert_eq!(t.year, 2024);
        assert_eq!(t.millisecond, 250);
        assert_eq!(t.offset, UtcOffset::new(-3, -30).unwrap());
        assert_eq!(t.as_string(), s);
    }

    #[test]
    fn test_parse_without_millis() {
        let t: LocalTime = "2020-01-02T03:04:05+00:00".parse().unwrap();
        assert_eq!(t.millisecond, 0);
        let z: LocalTime = "2020-01-02T03:04:05Z".parse().unwrap();
        assert_eq!(z.offset, UtcOffset::default());
    }
}
