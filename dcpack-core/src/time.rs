//! Timecode values for subtitle timing and markers.
//!
//! A [`Time`] is the classic HH:MM:SS:EE form where the editable-unit field
//! counts ticks of `1/tcr` seconds. Times at different tick rates can be
//! compared and subtracted; arithmetic normalises through a tick count.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

/// A point in time (or a duration) at a given tick rate.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Time {
    /// Hours.
    pub h: i64,
    /// Minutes (0-59).
    pub m: i64,
    /// Seconds (0-59).
    pub s: i64,
    /// Editable units (0 to tcr-1).
    pub e: i64,
    /// Ticks per second.
    pub tcr: i64,
}

impl Time {
    /// Create a new time.
    ///
    /// # Panics
    ///
    /// Panics if the tick rate is not positive.
    pub fn new(h: i64, m: i64, s: i64, e: i64, tcr: i64) -> Self {
        assert!(tcr > 0, "Tick rate must be positive");
        Self { h, m, s, e, tcr }
    }

    /// Build a time from a number of editable units at a rate.
    pub fn from_editable_units(units: i64, rate: i64) -> Self {
        assert!(rate > 0, "Rate must be positive");
        Self::from_ticks(units, rate)
    }

    /// Parse the `HH:MM:SS:EE` form, interpreting the last field at `tcr`
    /// ticks per second.
    pub fn from_string(s: &str, tcr: i64) -> Result<Self> {
        let fields: Vec<&str> = s.split(':').collect();
        if fields.len() != 4 {
            return Err(Error::misc(format!("bad time '{s}'")));
        }
        let mut parsed = [0i64; 4];
        for (i, f) in fields.iter().enumerate() {
            parsed[i] = f
                .parse()
                .map_err(|_| Error::misc(format!("bad time '{s}'")))?;
        }
        Ok(Self::new(parsed[0], parsed[1], parsed[2], parsed[3], tcr))
    }

    /// Total number of ticks since zero, at this time's own rate.
    pub fn as_ticks(&self) -> i64 {
        ((self.h * 3600) + (self.m * 60) + self.s) * self.tcr + self.e
    }

    /// Convert to a whole number of editable units at `rate`.
    pub fn as_editable_units(&self, rate: i64) -> i64 {
        let seconds_part = (self.h * 3600 + self.m * 60 + self.s) * rate;
        // Round the sub-second part rather than truncate, as a tick at one
        // rate rarely lands exactly on a unit boundary at another.
        let sub = ((self.e * rate) as f64 / self.tcr as f64).round() as i64;
        seconds_part + sub
    }

    /// Total seconds as a float.
    pub fn as_seconds(&self) -> f64 {
        self.as_ticks() as f64 / self.tcr as f64
    }

    /// Re-express this time at another tick rate, rounding the editable
    /// field.
    pub fn rebase(&self, tcr: i64) -> Self {
        assert!(tcr > 0, "Tick rate must be positive");
        let seconds = self.h * 3600 + self.m * 60 + self.s;
        let e = ((self.e * tcr) as f64 / self.tcr as f64).round() as i64;
        Self::from_ticks(seconds * tcr + e, tcr)
    }

    fn from_ticks(ticks: i64, tcr: i64) -> Self {
        let total_seconds = ticks.div_euclid(tcr);
        let e = ticks.rem_euclid(tcr);
        Self {
            h: total_seconds / 3600,
            m: (total_seconds % 3600) / 60,
            s: total_seconds % 60,
            e,
            tcr,
        }
    }
}

impl Default for Time {
    fn default() -> Self {
        Self::new(0, 0, 0, 0, 24)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}",
            self.h, self.m, self.s, self.e
        )
    }
}

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Time {}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.as_ticks() as i128 * other.tcr as i128;
        let rhs = other.as_ticks() as i128 * self.tcr as i128;
        lhs.cmp(&rhs)
    }
}

impl Add for Time {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        let rhs = rhs.rebase(self.tcr);
        Self::from_ticks(self.as_ticks() + rhs.as_ticks(), self.tcr)
    }
}

impl Sub for Time {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        let rhs = rhs.rebase(self.tcr);
        Self::from_ticks(self.as_ticks() - rhs.as_ticks(), self.tcr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_string() {
        let t = Time::from_string("01:02:03:04", 24).unwrap();
        assert_eq!(t, Time::new(1, 2, 3, 4, 24));
        assert!(Time::from_string("01:02:03", 24).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Time::new(1, 2, 3, 4, 24).to_string(), "01:02:03:04");
    }

    #[test]
    fn test_as_editable_units() {
        assert_eq!(Time::new(0, 0, 4, 0, 24).as_editable_units(24), 96);
        // 125 ticks at 250/s is half a second, 12 frames at 24 fps.
        assert_eq!(Time::new(0, 0, 0, 125, 250).as_editable_units(24), 12);
    }

    #[test]
    fn test_cross_rate_compare() {
        let a = Time::new(0, 0, 1, 0, 24);
        let b = Time::new(0, 0, 0, 250, 250);
        assert_eq!(a, b);
        assert!(Time::new(0, 0, 1, 1, 24) > b);
    }

    #[test]
    fn test_arithmetic_normalises() {
        let a = Time::new(0, 0, 59, 23, 24);
        let b = Time::new(0, 0, 0, 1, 24);
        assert_eq!(a + b, Time::new(0, 1, 0, 0, 24));
        assert_eq!(
            Time::new(0, 1, 0, 0, 24) - Time::new(0, 0, 0, 1, 24),
            Time::new(0, 0, 59, 23, 24)
        );
    }

    #[test]
    fn test_subtitle_length() {
        let t_in = Time::from_string("00:00:10:000", 250).unwrap();
        let t_out = Time::from_string("00:00:10:150", 250).unwrap();
        assert_eq!((t_out - t_in).as_editable_units(24), 14);
    }
}
