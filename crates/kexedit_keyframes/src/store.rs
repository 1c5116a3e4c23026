// SPDX-License-Identifier: MIT OR Apache-2.0
//! Flat keyframe storage indexed by property key.
//!
//! All curves share one keyframe array. Each curve is a contiguous slice
//! described by a [`KeyframeRange`]. Ranges decoded from disk are stored
//! as-is, so [`KeyframeStore::check_ranges`] is the place to find out
//! whether they actually fit the array.

use crate::keyframe::Keyframe;
use indexmap::IndexMap;
use kexedit_graph::{CompositeKey, NodeId};
use serde::{Deserialize, Serialize};

/// Slice of the flat keyframe array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyframeRange {
    /// First keyframe index
    pub start: i32,
    /// Number of keyframes
    pub length: i32,
}

impl KeyframeRange {
    /// Create a new range
    pub fn new(start: i32, length: i32) -> Self {
        Self { start, length }
    }

    /// Exclusive end, widened so it cannot overflow
    pub fn end(self) -> i64 {
        i64::from(self.start) + i64::from(self.length)
    }

    /// Whether the range lies within an array of `count` keyframes
    pub fn fits(self, count: usize) -> bool {
        self.start >= 0 && self.length >= 0 && self.end() <= count as i64
    }

    fn as_span(self) -> std::ops::Range<usize> {
        self.start as usize..(self.start as usize + self.length as usize)
    }
}

/// A problem with the range index
#[derive(Debug, Clone, PartialEq)]
pub enum RangeIssue {
    /// Range reaches outside the keyframe array
    OutOfBounds {
        /// Curve key
        key: CompositeKey,
        /// Offending range
        range: KeyframeRange,
        /// Keyframe array length
        count: usize,
    },
    /// Two curves share keyframes
    Overlap {
        /// Earlier range by start index
        first: CompositeKey,
        /// Later range by start index
        second: CompositeKey,
    },
}

/// Error when editing the store
#[derive(Debug, thiserror::Error)]
pub enum KeyframeError {
    /// Keyframe array would exceed the 32-bit index space
    #[error("Keyframe store full: {0} keyframes cannot be indexed")]
    CapacityExceeded(usize),
}

/// Range-indexed keyframe storage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyframeStore {
    keyframes: Vec<Keyframe>,
    ranges: IndexMap<CompositeKey, KeyframeRange>,
}

impl KeyframeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a store from decoded parts without checking them
    pub fn from_parts(keyframes: Vec<Keyframe>, ranges: IndexMap<CompositeKey, KeyframeRange>) -> Self {
        Self { keyframes, ranges }
    }

    /// The flat keyframe array
    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// The range index in insertion order
    pub fn ranges(&self) -> &IndexMap<CompositeKey, KeyframeRange> {
        &self.ranges
    }

    /// Total keyframe count
    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    /// Whether the store holds no keyframes and no ranges
    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty() && self.ranges.is_empty()
    }

    /// Replace the curve stored under `key`. An empty slice just removes it.
    pub fn set(&mut self, key: CompositeKey, keyframes: &[Keyframe]) -> Result<(), KeyframeError> {
        self.remove(key);
        if keyframes.is_empty() {
            return Ok(());
        }

        let total = self.keyframes.len() + keyframes.len();
        if total > i32::MAX as usize {
            return Err(KeyframeError::CapacityExceeded(total));
        }

        let range = KeyframeRange::new(self.keyframes.len() as i32, keyframes.len() as i32);
        self.keyframes.extend_from_slice(keyframes);
        self.ranges.insert(key, range);
        Ok(())
    }

    /// Curve stored under `key`, `None` if missing or out of bounds
    pub fn get(&self, key: CompositeKey) -> Option<&[Keyframe]> {
        let range = *self.ranges.get(&key)?;
        range.fits(self.keyframes.len()).then(|| &self.keyframes[range.as_span()])
    }

    /// Range stored under `key`
    pub fn range(&self, key: CompositeKey) -> Option<KeyframeRange> {
        self.ranges.get(&key).copied()
    }

    /// Whether a curve is stored under `key`
    pub fn contains(&self, key: CompositeKey) -> bool {
        self.ranges.contains_key(&key)
    }

    /// Remove a curve and return its keyframes.
    ///
    /// A valid slice is cut out of the array and later ranges shift down.
    /// An out-of-bounds range is dropped from the index only.
    pub fn remove(&mut self, key: CompositeKey) -> Option<Vec<Keyframe>> {
        let range = self.ranges.shift_remove(&key)?;
        if !range.fits(self.keyframes.len()) {
            return Some(Vec::new());
        }

        let removed: Vec<Keyframe> = self.keyframes.drain(range.as_span()).collect();
        for other in self.ranges.values_mut() {
            if other.start >= range.end() as i32 {
                other.start -= range.length;
            }
        }
        Some(removed)
    }

    /// Keys belonging to `node`
    pub fn keys_for_node(&self, node: NodeId) -> impl Iterator<Item = CompositeKey> + '_ {
        self.ranges.keys().copied().filter(move |k| k.node() == node)
    }

    /// Remove every curve belonging to `node`
    pub fn remove_node(&mut self, node: NodeId) -> usize {
        let keys: Vec<_> = self.keys_for_node(node).collect();
        for key in &keys {
            self.remove(*key);
        }
        keys.len()
    }

    /// Move every curve of `from` onto `to`, keeping index order
    pub fn remap_node(&mut self, from: NodeId, to: NodeId) {
        self.ranges = self
            .ranges
            .drain(..)
            .map(|(key, range)| {
                let key = if key.node() == from { key.with_node(to) } else { key };
                (key, range)
            })
            .collect();
    }

    /// Rewrite the array so that every valid range is contiguous and in
    /// index order. Out-of-bounds ranges are dropped. Returns how many.
    pub fn compact(&mut self) -> usize {
        let mut keyframes = Vec::with_capacity(self.keyframes.len());
        let mut ranges = IndexMap::with_capacity(self.ranges.len());
        let mut dropped = 0;

        for (key, range) in &self.ranges {
            if !range.fits(self.keyframes.len()) {
                dropped += 1;
                continue;
            }
            let start = keyframes.len() as i32;
            keyframes.extend_from_slice(&self.keyframes[range.as_span()]);
            ranges.insert(*key, KeyframeRange::new(start, range.length));
        }

        self.keyframes = keyframes;
        self.ranges = ranges;
        dropped
    }

    /// Report ranges that are out of bounds or overlap another range
    pub fn check_ranges(&self) -> Vec<RangeIssue> {
        let count = self.keyframes.len();
        let mut issues = Vec::new();
        let mut spans = Vec::new();

        for (key, range) in &self.ranges {
            if !range.fits(count) {
                issues.push(RangeIssue::OutOfBounds {
                    key: *key,
                    range: *range,
                    count,
                });
            } else if range.length > 0 {
                spans.push((*key, *range));
            }
        }

        spans.sort_by_key(|(_, r)| r.start);
        for pair in spans.windows(2) {
            let (first, a) = pair[0];
            let (second, b) = pair[1];
            if i64::from(b.start) < a.end() {
                issues.push(RangeIssue::Overlap { first, second });
            }
        }
        issues
    }
}
