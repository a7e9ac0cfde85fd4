use crate::Error;
use std::ops::{Range, RangeInclusive};

/// A selection of indices to invalidate with [crate::Cache::unset].
///
/// Targets can be freely mixed and nested; they are normalized into a sorted list of disjoint,
/// inclusive ranges before being applied, so grouping has no effect on the outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// A single index.
    Index(u64),

    /// All indices from `start` to `end` (inclusive).
    Range { start: u64, end: u64 },

    /// A group of targets.
    Many(Vec<Target>),
}

impl Target {
    /// Normalizes `targets` into sorted, disjoint, non-adjacent inclusive ranges.
    ///
    /// Returns [Error::InvalidRange] if any range ends before it starts.
    pub fn normalize(
        targets: impl IntoIterator<Item = Target>,
    ) -> Result<Vec<RangeInclusive<u64>>, Error> {
        // Flatten without recursion (nesting depth is caller-controlled)
        let mut stack: Vec<Target> = targets.into_iter().collect();
        let mut ranges = Vec::new();
        while let Some(target) = stack.pop() {
            match target {
                Target::Index(index) => ranges.push((index, index)),
                Target::Range { start, end } => {
                    if start > end {
                        return Err(Error::InvalidRange { start, end });
                    }
                    ranges.push((start, end));
                }
                Target::Many(targets) => stack.extend(targets),
            }
        }

        // Merge overlapping and adjacent ranges
        ranges.sort_unstable();
        let mut merged: Vec<(u64, u64)> = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            match merged.last_mut() {
                Some((_, last)) if start <= last.saturating_add(1) => {
                    *last = (*last).max(end);
                }
                _ => merged.push((start, end)),
            }
        }
        Ok(merged.into_iter().map(|(start, end)| start..=end).collect())
    }
}

impl From<u64> for Target {
    fn from(index: u64) -> Self {
        Target::Index(index)
    }
}

impl From<RangeInclusive<u64>> for Target {
    fn from(range: RangeInclusive<u64>) -> Self {
        let (start, end) = range.into_inner();
        Target::Range { start, end }
    }
}

impl From<Range<u64>> for Target {
    fn from(range: Range<u64>) -> Self {
        match range.end.checked_sub(1) {
            // Empty (`a..a`) selects nothing; inverted ranges stay inverted and are rejected
            _ if range.start == range.end => Target::Many(Vec::new()),
            Some(end) if range.start <= end => Target::Range {
                start: range.start,
                end,
            },
            _ => Target::Range {
                start: range.start,
                end: range.end,
            },
        }
    }
}

impl<T: Into<Target>> From<Vec<T>> for Target {
    fn from(targets: Vec<T>) -> Self {
        Target::Many(targets.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Target>, const N: usize> From<[T; N]> for Target {
    fn from(targets: [T; N]) -> Self {
        Target::Many(targets.into_iter().map(Into::into).collect())
    }
}
