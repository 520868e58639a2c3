//! IANA timezone resolution and wall-clock conversion.

use crate::error::{Error, Result};
use chrono::{Duration, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::{Tz, TZ_VARIANTS};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{PoisonError, RwLock};

/// Fallback suggestions shown when an unknown id matches nothing.
const FALLBACK_SUGGESTIONS: &[&str] = &[
    "UTC",
    "America/New_York",
    "Europe/London",
    "Asia/Tokyo",
    "Australia/Sydney",
];

/// Cap on "did you mean" suggestions.
const MAX_SUGGESTIONS: usize = 5;

/// Probe step for nonexistent local times inside a DST gap, in
/// minutes. Half-hour steps cover the 30-minute DST zones.
const GAP_PROBE_MINUTES: i64 = 30;

/// Longest gap worth probing across (double-DST historical gaps stay
/// under two hours).
const GAP_PROBE_STEPS: i64 = 4;

/// Resolves timezone ids to handles, caching resolved handles for the
/// process lifetime. Safe for concurrent lookup and insert; racing
/// inserts of the same id are idempotent.
#[derive(Default)]
pub struct TimezoneResolver {
    cache: RwLock<HashMap<String, Tz>>,
}

impl TimezoneResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an IANA id, with near-miss suggestions on failure.
    pub fn resolve(&self, id: &str) -> Result<Tz> {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(tz) = cache.get(id) {
                return Ok(*tz);
            }
        }

        let tz = Tz::from_str(id).map_err(|_| Error::UnknownTimezone {
            id: id.to_string(),
            suggestions: suggest(id),
        })?;

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.insert(id.to_string(), tz);
        Ok(tz)
    }
}

/// Check whether an id resolves against the IANA database.
pub fn is_valid_timezone(id: &str) -> bool {
    Tz::from_str(id).is_ok()
}

/// All known IANA ids, sorted.
pub fn list_timezones() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = TZ_VARIANTS.iter().map(|tz| tz.name()).collect();
    names.sort_unstable();
    names
}

/// "Did you mean" candidates for an unknown id: case-insensitive
/// substring matches against the known set, falling back to a short
/// list of common zones.
pub fn suggest(id: &str) -> Vec<String> {
    let needle = id.trim().to_lowercase();
    if !needle.is_empty() {
        let matches: Vec<String> = list_timezones()
            .into_iter()
            .filter(|name| name.to_lowercase().contains(&needle))
            .take(MAX_SUGGESTIONS)
            .map(String::from)
            .collect();
        if !matches.is_empty() {
            return matches;
        }
    }
    FALLBACK_SUGGESTIONS.iter().map(|s| s.to_string()).collect()
}

/// Reinterpret a wall-clock time from the source zone into the target
/// zone.
///
/// DST resolution is deliberately lenient: an ambiguous time takes the
/// earlier of its two valid offsets, and a time inside a spring-forward
/// gap is shifted past the gap instead of rejected. Both zones are
/// assumed to be pre-validated; this function cannot produce a
/// validation error.
pub fn convert(value: NaiveDateTime, source: Tz, target: Tz) -> Result<NaiveDateTime> {
    let instant = resolve_local(value, source)?;
    Ok(instant.with_timezone(&target).naive_local())
}

/// Map a naive wall-clock time onto a definite instant in `tz`.
fn resolve_local(value: NaiveDateTime, tz: Tz) -> Result<chrono::DateTime<Tz>> {
    match tz.from_local_datetime(&value) {
        LocalResult::Single(dt) => Ok(dt),
        LocalResult::Ambiguous(earlier, _later) => Ok(earlier),
        LocalResult::None => {
            for step in 1..=GAP_PROBE_STEPS {
                let probe = value + Duration::minutes(GAP_PROBE_MINUTES * step);
                if let Some(dt) = tz.from_local_datetime(&probe).earliest() {
                    return Ok(dt);
                }
            }
            Err(Error::Internal { code: "tz-gap" })
        }
    }
}
