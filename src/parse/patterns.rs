//! Parse pattern registry.

use chrono::format::{Fixed, Item, Numeric, StrftimeItems};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// A validated date-time layout.
///
/// Patterns are pure functions of their layout string: compiling the
/// same layout twice yields an equivalent pattern, which is what makes
/// racing cache inserts harmless.
#[derive(Debug)]
pub struct ParsePattern {
    layout: String,
    has_time: bool,
}

impl ParsePattern {
    /// Validate a layout. Returns `None` when the layout contains
    /// malformed format items.
    fn compile(layout: &str) -> Option<Self> {
        let mut has_time = false;
        for item in StrftimeItems::new(layout) {
            match item {
                Item::Error => return None,
                Item::Numeric(n, _) => {
                    if matches!(
                        n,
                        Numeric::Hour | Numeric::Hour12 | Numeric::Minute | Numeric::Second
                    ) {
                        has_time = true;
                    }
                }
                Item::Fixed(f) => {
                    if matches!(
                        f,
                        Fixed::LowerAmPm
                            | Fixed::UpperAmPm
                            | Fixed::Nanosecond
                            | Fixed::Nanosecond3
                            | Fixed::Nanosecond6
                            | Fixed::Nanosecond9
                    ) {
                        has_time = true;
                    }
                }
                _ => {}
            }
        }

        Some(Self {
            layout: layout.to_string(),
            has_time,
        })
    }

    /// The layout string this pattern was compiled from.
    pub fn layout(&self) -> &str {
        &self.layout
    }

    /// Try the pattern against a text. Date-only layouts resolve to
    /// midnight.
    pub fn parse(&self, text: &str) -> Option<NaiveDateTime> {
        if self.has_time {
            NaiveDateTime::parse_from_str(text, &self.layout).ok()
        } else {
            NaiveDate::parse_from_str(text, &self.layout)
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        }
    }
}

/// The fixed common set, pre-seeded at startup. Order matters where
/// two layouts match the same text: month-first wins over day-first.
pub const COMMON_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%d-%m-%Y",
    "%m/%d/%Y %I:%M:%S %p",
    "%d/%m/%Y %H:%M:%S",
];

#[derive(Default)]
struct CacheInner {
    /// layout -> index into `patterns`, or `None` for a layout that
    /// failed to compile and must not be retried.
    by_layout: HashMap<String, Option<usize>>,
    /// Patterns in insertion order.
    patterns: Vec<Arc<ParsePattern>>,
}

/// Process-lifetime registry of compiled patterns.
///
/// Read-mostly: lookups take a shared lock, only a first-time layout
/// takes the write lock. Safe to share across concurrent conversion
/// calls.
#[derive(Default)]
pub struct PatternCache {
    inner: RwLock<CacheInner>,
}

impl PatternCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache seeded with [`COMMON_LAYOUTS`].
    pub fn with_common_patterns() -> Self {
        let cache = Self::new();
        for layout in COMMON_LAYOUTS {
            cache.get_or_create(layout);
        }
        cache
    }

    /// Get the pattern for a layout, compiling and registering it on
    /// first request. Returns `None` for layouts that do not compile;
    /// the failure is remembered and the layout is never retried.
    pub fn get_or_create(&self, layout: &str) -> Option<Arc<ParsePattern>> {
        {
            let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(slot) = inner.by_layout.get(layout) {
                return slot.map(|idx| Arc::clone(&inner.patterns[idx]));
            }
        }

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have raced us here; their insert is
        // equivalent to ours.
        if let Some(slot) = inner.by_layout.get(layout) {
            return slot.map(|idx| Arc::clone(&inner.patterns[idx]));
        }

        match ParsePattern::compile(layout) {
            Some(pattern) => {
                let pattern = Arc::new(pattern);
                let idx = inner.patterns.len();
                inner.patterns.push(Arc::clone(&pattern));
                inner.by_layout.insert(layout.to_string(), Some(idx));
                Some(pattern)
            }
            None => {
                inner.by_layout.insert(layout.to_string(), None);
                None
            }
        }
    }

    /// Whether a layout is registered as a known compile failure.
    pub fn is_failed(&self, layout: &str) -> bool {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        matches!(inner.by_layout.get(layout), Some(None))
    }

    /// Snapshot of all usable patterns in insertion order.
    pub fn snapshot(&self) -> Vec<Arc<ParsePattern>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.patterns.clone()
    }

    /// Number of usable patterns.
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.patterns.len()
    }

    /// Check if the cache holds no patterns.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_rejects_malformed_layout() {
        assert!(ParsePattern::compile("%Y-%m-%d").is_some());
        assert!(ParsePattern::compile("%Q").is_none());
    }

    #[test]
    fn test_date_only_layout_parses_to_midnight() {
        let pattern = ParsePattern::compile("%m/%d/%Y").unwrap();
        let dt = pattern.parse("1/15/2024").unwrap();
        assert_eq!(dt.to_string(), "2024-01-15 00:00:00");

        // Trailing time must not silently match a date-only layout.
        assert!(pattern.parse("1/15/2024 10:00:00").is_none());
    }

    #[test]
    fn test_all_common_layouts_compile() {
        let cache = PatternCache::with_common_patterns();
        assert_eq!(cache.len(), COMMON_LAYOUTS.len());
    }

    #[test]
    fn test_failed_layout_not_retried() {
        let cache = PatternCache::new();
        assert!(cache.get_or_create("%Q bad").is_none());
        assert!(cache.is_failed("%Q bad"));
        assert!(cache.get_or_create("%Q bad").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let cache = PatternCache::new();
        let a = cache.get_or_create("%Y-%m-%d").unwrap();
        let b = cache.get_or_create("%Y-%m-%d").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_snapshot_preserves_insertion_order() {
        let cache = PatternCache::new();
        cache.get_or_create("%Y-%m-%d");
        cache.get_or_create("%m/%d/%Y");
        let layouts: Vec<_> = cache.snapshot().iter().map(|p| p.layout().to_string()).collect();
        assert_eq!(layouts, vec!["%Y-%m-%d", "%m/%d/%Y"]);
    }
}
