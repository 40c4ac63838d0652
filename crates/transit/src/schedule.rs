//! Service-day clock: wall-clock stop times and midnight-crossing trips.
//!
//! GTFS-style stop times are relative to the service day's midnight and may
//! exceed 24:00 (e.g. "25:30:00" for 1:30am the following calendar day). A
//! trip whose stop sequence crosses local midnight mixes late-evening hours
//! with early-morning hours of the same logical service day; which calendar
//! day each visit lands on depends on when "now" is, and must be corrected
//! per visit, not once per trip.

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::models::types::{Result, TransitError, Trip};

const SECS_PER_DAY: u32 = 86_400;

/// A time of day as seconds since service-day midnight. Hours may exceed 24.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ServiceTime(u32);

impl ServiceTime {
    pub fn from_seconds(secs: u32) -> Self {
        Self(secs)
    }

    pub fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self(hours * 3600 + minutes * 60 + seconds)
    }

    /// Parse an "HH:MM:SS" string. Hours past 24 are accepted.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || TransitError::InvalidTime(s.to_string());
        let mut parts = s.split(':');
        let hours: u32 = parts
            .next()
            .and_then(|p| p.trim().parse().ok())
            .ok_or_else(invalid)?;
        let minutes: u32 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        let seconds: u32 = parts
            .next()
            .and_then(|p| p.parse().ok())
            .ok_or_else(invalid)?;
        if parts.next().is_some() || minutes >= 60 || seconds >= 60 {
            return Err(invalid());
        }
        Ok(Self::from_hms(hours, minutes, seconds))
    }

    pub fn seconds(&self) -> u32 {
        self.0
    }

    /// Time of day with any whole days folded out.
    pub fn time_of_day(&self) -> NaiveTime {
        NaiveTime::MIN + Duration::seconds((self.0 % SECS_PER_DAY) as i64)
    }

    /// Resolve to an absolute timestamp: midnight of `base + day_offset`
    /// days, plus this time of day (including whole days implied by an hour
    /// value past 24).
    pub fn resolve(&self, base: NaiveDate, day_offset: i64) -> NaiveDateTime {
        base.and_time(NaiveTime::MIN) + Duration::days(day_offset) + Duration::seconds(self.0 as i64)
    }
}

/// Resolve every visit of a trip to an absolute timestamp on the service
/// day containing `now`, applying the midnight-crossing correction.
///
/// A crossing trip is detected by its first zero-offset time resolving
/// later than its last. When `now` is in the early-morning segment (at or
/// before the trip's last time of day), the pre-midnight visits belong to
/// yesterday; otherwise the post-midnight visits belong to tomorrow. The
/// correction applies per visit because only the visits on one side of the
/// boundary need it.
pub fn resolve_visit_times(trip: &Trip, now: NaiveDateTime) -> Vec<(usize, NaiveDateTime)> {
    let base = now.date();
    let mut resolved: Vec<(usize, NaiveDateTime)> = trip
        .visits
        .iter()
        .enumerate()
        .map(|(i, v)| (i, v.time.resolve(base, 0)))
        .collect();

    let (first, last) = match (resolved.first(), resolved.last()) {
        (Some(&(_, f)), Some(&(_, l))) => (f, l),
        _ => return resolved,
    };
    if first <= last {
        return resolved;
    }

    // Midnight-crossing trip. Visits resolving before the first visit are
    // the post-midnight segment.
    let past_midnight_now = now.time() <= last.time();
    for (_, t) in resolved.iter_mut() {
        let after_midnight_visit = *t < first;
        if past_midnight_now {
            if !after_midnight_visit {
                *t -= Duration::days(1);
            }
        } else if after_midnight_visit {
            *t += Duration::days(1);
        }
    }
    resolved
}
