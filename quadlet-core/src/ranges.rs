//! Identity range algebra for uid/gid remapping
//!
//! An [`IdRanges`] is an ascending set of non-overlapping, non-adjacent
//! [`Interval`]s over the valid id space `0..=4294967294`. Id `u32::MAX` is the
//! kernel's "no id" marker and is never part of a range.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ConversionError;

/// Highest id that can be stored in a range
pub const MAX_ID: u32 = u32::MAX - 1;

/// Exclusive upper bound of the valid id space
const ID_SPACE_END: u64 = u32::MAX as u64;

/// A span of ids `[start, start + length)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    /// First id of the span
    pub start: u32,
    /// Number of ids in the span
    pub length: u32,
}

impl Interval {
    /// Create an interval
    #[must_use]
    pub const fn new(start: u32, length: u32) -> Self {
        Self { start, length }
    }

    /// Exclusive end of the span
    #[must_use]
    pub fn end(self) -> u64 {
        u64::from(self.start) + u64::from(self.length)
    }

    /// Whether the interval contains no ids
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.length == 0
    }

    /// Whether `id` falls inside the span
    #[must_use]
    pub fn contains(self, id: u32) -> bool {
        id >= self.start && u64::from(id) < self.end()
    }

    // Callers guarantee lo < hi <= ID_SPACE_END.
    #[allow(clippy::cast_possible_truncation)]
    const fn from_bounds(lo: u64, hi: u64) -> Self {
        Self {
            start: lo as u32,
            length: (hi - lo) as u32,
        }
    }
}

/// Ordered, merged set of id intervals
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdRanges {
    intervals: Vec<Interval>,
}

impl IdRanges {
    /// Create an empty set
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            intervals: Vec::new(),
        }
    }

    /// Create a set holding the single span `[start, start + length)`
    ///
    /// Degenerate spans yield an empty set.
    #[must_use]
    pub fn of(start: u32, length: u32) -> Self {
        let mut ranges = Self::empty();
        ranges.add(start, length);
        ranges
    }

    /// Parse the textual range grammar
    ///
    /// The text is a comma separated list of `N`, `N-M` (inclusive) or `N-`
    /// (up to the highest valid id). Surrounding whitespace is ignored.
    pub fn parse(text: &str) -> Result<Self, ConversionError> {
        let mut ranges = Self::empty();
        if text.trim().is_empty() {
            return Ok(ranges);
        }

        for token in text.split(',') {
            let token = token.trim();
            if token.is_empty() {
                return Err(parse_error(text, "empty range entry"));
            }

            let (first, last) = match token.split_once('-') {
                None => {
                    let id = parse_id(text, token)?;
                    (id, id)
                }
                Some((start, "")) => (parse_id(text, start)?, MAX_ID),
                Some((start, end)) => (parse_id(text, start)?, parse_id(text, end)?),
            };

            if last < first {
                return Err(parse_error(
                    text,
                    &format!("range '{token}' ends before it starts"),
                ));
            }

            ranges.add(first, last - first + 1);
        }

        Ok(ranges)
    }

    /// Insert a span, merging it with overlapping or adjacent intervals
    ///
    /// The span is clipped to the valid id space.
    pub fn add(&mut self, start: u32, length: u32) {
        if length == 0 || start > MAX_ID {
            return;
        }
        let mut lo = u64::from(start);
        let mut hi = (lo + u64::from(length)).min(ID_SPACE_END);

        let mut merged = Vec::with_capacity(self.intervals.len() + 1);
        let mut inserted = false;
        for interval in &self.intervals {
            let (s, e) = (u64::from(interval.start), interval.end());
            if e < lo {
                merged.push(*interval);
            } else if s > hi {
                if !inserted {
                    merged.push(Interval::from_bounds(lo, hi));
                    inserted = true;
                }
                merged.push(*interval);
            } else {
                lo = lo.min(s);
                hi = hi.max(e);
            }
        }
        if !inserted {
            merged.push(Interval::from_bounds(lo, hi));
        }

        self.intervals = merged;
    }

    /// Remove the span `[start, start + length)` from the set
    ///
    /// Intervals that intersect the span are replaced by what remains on
    /// either side of it. Removing a span that intersects nothing is a no-op.
    pub fn remove(&mut self, start: u32, length: u32) {
        if length == 0 || self.intervals.is_empty() {
            return;
        }
        let lo = u64::from(start);
        let hi = lo + u64::from(length);

        let mut kept = Vec::with_capacity(self.intervals.len() + 1);
        for interval in &self.intervals {
            let (s, e) = (u64::from(interval.start), interval.end());
            if e <= lo || s >= hi {
                kept.push(*interval);
                continue;
            }
            if s < lo {
                kept.push(Interval::from_bounds(s, lo));
            }
            if e > hi {
                kept.push(Interval::from_bounds(hi, e));
            }
        }

        self.intervals = kept;
    }

    /// Lowest interval, if any
    #[must_use]
    pub fn first(&self) -> Option<Interval> {
        self.intervals.first().copied()
    }

    /// Iterate the intervals in ascending order
    pub fn iter(&self) -> impl Iterator<Item = Interval> + '_ {
        self.intervals.iter().copied()
    }

    /// The intervals in ascending order
    #[must_use]
    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    /// Whether the set holds no ids
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Number of intervals
    #[must_use]
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Number of ids across all intervals
    #[must_use]
    pub fn total_len(&self) -> u64 {
        self.intervals.iter().map(|i| u64::from(i.length)).sum()
    }

    /// Whether `id` is in the set
    #[must_use]
    pub fn contains(&self, id: u32) -> bool {
        self.intervals.iter().any(|i| i.contains(id))
    }
}

fn parse_error(text: &str, reason: &str) -> ConversionError {
    ConversionError::ParseError {
        text: text.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_id(text: &str, value: &str) -> Result<u32, ConversionError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(parse_error(text, &format!("'{value}' is not a number")));
    }
    match value.parse::<u32>() {
        Ok(id) if id <= MAX_ID => Ok(id),
        _ => Err(parse_error(text, &format!("id {value} is out of range"))),
    }
}

impl fmt::Display for IdRanges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, interval) in self.intervals.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            if interval.length == 1 {
                write!(f, "{}", interval.start)?;
            } else if interval.end() == ID_SPACE_END {
                write!(f, "{}-", interval.start)?;
            } else {
                write!(f, "{}-{}", interval.start, interval.end() - 1)?;
            }
        }
        Ok(())
    }
}

impl FromStr for IdRanges {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for IdRanges {
    type Error = ConversionError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<IdRanges> for String {
    fn from(ranges: IdRanges) -> Self {
        ranges.to_string()
    }
}

impl<'a> IntoIterator for &'a IdRanges {
    type Item = &'a Interval;
    type IntoIter = std::slice::Iter<'a, Interval>;

    fn into_iter(self) -> Self::IntoIter {
        self.intervals.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_span_is_ignored() {
        assert!(IdRanges::of(10, 0).is_empty());
        assert!(IdRanges::of(u32::MAX, 5).is_empty());
    }

    #[test]
    fn test_add_merges_overlapping_and_adjacent() {
        let mut ranges = IdRanges::of(10, 10);
        ranges.add(20, 5);
        ranges.add(0, 3);
        ranges.add(15, 20);
        assert_eq!(
            ranges.intervals(),
            &[Interval::new(0, 3), Interval::new(10, 25)]
        );
    }

    #[test]
    fn test_add_clips_to_id_space() {
        let ranges = IdRanges::of(MAX_ID, 100);
        assert_eq!(ranges.intervals(), &[Interval::new(MAX_ID, 1)]);
        assert!(!ranges.contains(u32::MAX));
    }

    #[test]
    fn test_remove_disjoint_span_is_noop() {
        let mut ranges = IdRanges::of(100, 50);
        let before = ranges.clone();
        ranges.remove(0, 100);
        ranges.remove(150, 10);
        ranges.remove(120, 0);
        assert_eq!(ranges, before);
    }

    #[test]
    fn test_remove_sub_span_splits_interval() {
        let mut ranges = IdRanges::of(100, 50);
        ranges.remove(110, 5);
        assert_eq!(
            ranges.intervals(),
            &[Interval::new(100, 10), Interval::new(115, 35)]
        );
        assert_eq!(ranges.total_len(), 45);
    }

    #[test]
    fn test_remove_across_intervals() {
        let mut ranges = IdRanges::parse("0-9,20-29,40-49").unwrap();
        ranges.remove(5, 40);
        assert_eq!(
            ranges.intervals(),
            &[Interval::new(0, 5), Interval::new(45, 5)]
        );
    }

    #[test]
    fn test_remove_from_full_space() {
        let mut ranges = IdRanges::of(0, u32::MAX);
        ranges.remove(0, 1);
        ranges.remove(MAX_ID, 1);
        assert_eq!(ranges.intervals(), &[Interval::new(1, MAX_ID - 1)]);
    }

    #[test]
    fn test_copy_is_independent() {
        let original = IdRanges::of(0, 100);
        let mut copy = original.clone();
        copy.remove(0, 50);
        assert_eq!(original.total_len(), 100);
        assert_eq!(copy.total_len(), 50);
    }

    #[test]
    fn test_parse_grammar() {
        let ranges = IdRanges::parse(" 5, 100-199 ,1000-").unwrap();
        assert_eq!(
            ranges.intervals(),
            &[
                Interval::new(5, 1),
                Interval::new(100, 100),
                Interval::new(1000, MAX_ID - 1000 + 1),
            ]
        );
        assert!(IdRanges::parse("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for text in ["1,,2", "abc", "10-5", "-5", "+3", "1-2-3", "4294967295"] {
            assert!(
                matches!(IdRanges::parse(text), Err(ConversionError::ParseError { .. })),
                "{text} should be rejected"
            );
        }
    }

    #[test]
    fn test_display_uses_grammar() {
        let ranges = IdRanges::parse("7,10-19,100000-").unwrap();
        assert_eq!(ranges.to_string(), "7,10-19,100000-");
    }

    #[test]
    fn test_serde_through_text() {
        let ranges = IdRanges::parse("0-9,20").unwrap();
        let json = serde_json::to_string(&ranges).unwrap();
        assert_eq!(json, "\"0-9,20\"");
        let back: IdRanges = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ranges);
        assert!(serde_json::from_str::<IdRanges>("\"x\"").is_err());
    }
}
