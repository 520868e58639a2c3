//! Heuristic date-time parsing.
//!
//! The parser never guesses a timezone: it produces naive wall-clock
//! values which the caller reinterprets in the request's source zone.

mod patterns;

pub use patterns::{ParsePattern, PatternCache, COMMON_LAYOUTS};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::Arc;

/// Layout used to render converted values back into text cells when
/// the source text matched no registered layout.
pub const RENDER_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

/// A successful parse: the value plus the layout that matched, when a
/// registered pattern (rather than the generic fallback) produced it.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub value: NaiveDateTime,
    pub layout: Option<String>,
}

/// ISO-style dynamic candidates for texts containing a literal `T`,
/// with a trailing `Z`.
const ISO_UTC_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%MZ",
];

/// ISO-style dynamic candidates without the UTC suffix.
const ISO_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Slash-separated dynamic candidates, month-first before day-first.
const SLASH_LAYOUTS: &[&str] = &[
    "%m/%d/%Y %I:%M:%S %p",
    "%d/%m/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y/%m/%d",
];

/// Dash-separated dynamic candidates, year-first, then day-first, then
/// month-first.
const DASH_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%d-%m-%Y %H:%M:%S",
    "%m-%d-%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d",
    "%d-%m-%Y",
    "%m-%d-%Y",
];

/// Heuristic text-to-datetime parser over a shared [`PatternCache`].
///
/// One parser instance serves one conversion call; the cache behind it
/// may outlive the call and be shared across calls.
pub struct DateTimeParser {
    cache: Arc<PatternCache>,
    warned_layouts: RefCell<HashSet<String>>,
    warnings: RefCell<Vec<String>>,
}

impl DateTimeParser {
    pub fn new(cache: Arc<PatternCache>) -> Self {
        Self {
            cache,
            warned_layouts: RefCell::new(HashSet::new()),
            warnings: RefCell::new(Vec::new()),
        }
    }

    /// Parse a text into a naive date-time.
    pub fn parse(&self, text: &str) -> Option<NaiveDateTime> {
        self.parse_detailed(text).map(|p| p.value)
    }

    /// Parse a text, also reporting which layout matched.
    ///
    /// Attempt order: every cached pattern, then dynamic candidates
    /// derived from the text's shape (registered into the cache for
    /// later cells), then a generic ISO/RFC fallback.
    pub fn parse_detailed(&self, text: &str) -> Option<Parsed> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        for pattern in self.cache.snapshot() {
            if let Some(value) = pattern.parse(text) {
                return Some(Parsed {
                    value,
                    layout: Some(pattern.layout().to_string()),
                });
            }
        }

        for layout in dynamic_candidates(text) {
            match self.cache.get_or_create(layout) {
                Some(pattern) => {
                    if let Some(value) = pattern.parse(text) {
                        return Some(Parsed {
                            value,
                            layout: Some(pattern.layout().to_string()),
                        });
                    }
                }
                None => self.warn_failed_layout(layout),
            }
        }

        generic_parse(text).map(|value| Parsed {
            value,
            layout: None,
        })
    }

    /// Warnings accumulated during this run (one per unusable layout).
    pub fn take_warnings(&self) -> Vec<String> {
        std::mem::take(&mut *self.warnings.borrow_mut())
    }

    fn warn_failed_layout(&self, layout: &str) {
        let mut warned = self.warned_layouts.borrow_mut();
        if warned.insert(layout.to_string()) {
            self.warnings
                .borrow_mut()
                .push(format!("skipping unusable date-time layout \"{layout}\""));
        }
    }
}

/// Derive candidate layouts from the text's surface features.
fn dynamic_candidates(text: &str) -> &'static [&'static str] {
    if text.contains('T') {
        if text.ends_with('Z') {
            ISO_UTC_LAYOUTS
        } else {
            ISO_LAYOUTS
        }
    } else if text.contains('/') {
        SLASH_LAYOUTS
    } else if text.contains('-') {
        DASH_LAYOUTS
    } else {
        &[]
    }
}

/// Locale-invariant generic fallback parse.
fn generic_parse(text: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = text.parse::<NaiveDateTime>() {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
        return Some(dt.naive_local());
    }
    text.parse::<NaiveDate>()
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}
