//! Index ranges over a single dimension.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error for a range whose end lies before its start.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid range for dimension {name}: end {end} is before start {start}")]
pub struct InvalidRange {
    /// Dimension the range was built for.
    pub name: String,
    /// Requested start index.
    pub start: u64,
    /// Requested end index.
    pub end: u64,
}

/// Inclusive index range `[start, end]` over a named dimension.
///
/// Invariant: `end >= start`, so a range always covers at least one index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DimensionRange {
    /// Dimension name.
    pub name: String,
    /// First index (inclusive).
    pub start: u64,
    /// Last index (inclusive).
    pub end: u64,
    /// Whether the dimension is a record (unlimited) dimension.
    pub unbounded: bool,
}

impl DimensionRange {
    /// Create a new range, rejecting `end < start`.
    pub fn new(
        name: impl Into<String>,
        start: u64,
        end: u64,
        unbounded: bool,
    ) -> Result<Self, InvalidRange> {
        let name = name.into();
        if end < start {
            return Err(InvalidRange { name, start, end });
        }
        Ok(Self {
            name,
            start,
            end,
            unbounded,
        })
    }

    /// Range covering a whole dimension of `length` indices.
    ///
    /// Returns `None` for an empty dimension, which has no inclusive range.
    pub fn full(name: impl Into<String>, length: u64, unbounded: bool) -> Option<Self> {
        if length == 0 {
            return None;
        }
        Some(Self {
            name: name.into(),
            start: 0,
            end: length - 1,
            unbounded,
        })
    }

    /// Number of indices covered.
    pub fn size(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Whether `index` falls within the range.
    pub fn contains(&self, index: u64) -> bool {
        index >= self.start && index <= self.end
    }

    /// Split into consecutive windows of `slice_count` indices.
    ///
    /// The windows tile `[start, end]` in order without gaps or overlaps;
    /// only the last window may be shorter. A `slice_count` of zero is
    /// treated as one.
    pub fn windows(&self, slice_count: u64) -> Vec<DimensionRange> {
        let step = slice_count.max(1);
        let mut windows = Vec::with_capacity((self.size() / step + 1) as usize);
        let mut offset = self.start;
        loop {
            let last = offset.saturating_add(step - 1).min(self.end);
            windows.push(Self {
                name: self.name.clone(),
                start: offset,
                end: last,
                unbounded: self.unbounded,
            });
            if last == self.end {
                break;
            }
            offset = last + 1;
        }
        windows
    }

    /// The first window of `slice_count` indices.
    pub fn first_window(&self, slice_count: u64) -> DimensionRange {
        let step = slice_count.max(1);
        Self {
            name: self.name.clone(),
            start: self.start,
            end: self.start.saturating_add(step - 1).min(self.end),
            unbounded: self.unbounded,
        }
    }
}

impl fmt::Display for DimensionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}..={}]", self.name, self.start, self.end)?;
        if self.unbounded {
            write!(f, "(currently)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_is_inclusive() {
        let r = DimensionRange::new("time", 10, 19, false).unwrap();
        assert_eq!(r.size(), 10);
        assert!(r.contains(10));
        assert!(r.contains(19));
        assert!(!r.contains(20));
    }

    #[test]
    fn test_rejects_reversed_range() {
        let err = DimensionRange::new("time", 5, 4, false).unwrap_err();
        assert_eq!(err.start, 5);
        assert_eq!(err.end, 4);
    }

    #[test]
    fn test_full_range() {
        let r = DimensionRange::full("rows", 100, true).unwrap();
        assert_eq!((r.start, r.end), (0, 99));
        assert!(r.unbounded);
        assert!(DimensionRange::full("rows", 0, true).is_none());
    }

    #[test]
    fn test_windows_tile_range() {
        let r = DimensionRange::full("rows", 10, false).unwrap();
        let windows = r.windows(3);

        let bounds: Vec<_> = windows.iter().map(|w| (w.start, w.end)).collect();
        assert_eq!(bounds, vec![(0, 2), (3, 5), (6, 8), (9, 9)]);
        assert_eq!(windows.iter().map(DimensionRange::size).sum::<u64>(), 10);
    }

    #[test]
    fn test_windows_larger_than_range() {
        let r = DimensionRange::new("lat", 4, 7, false).unwrap();
        let windows = r.windows(100);
        assert_eq!(windows, vec![r.clone()]);
        assert_eq!(r.first_window(100), r);
    }

    #[test]
    fn test_display() {
        let r = DimensionRange::new("time", 0, 11, true).unwrap();
        assert_eq!(r.to_string(), "time[0..=11](currently)");
    }
}
