//! Deduplication: collapse symmetric duplicate segments after snapping.
//!
//! Once endpoints are canonical, `(A, B)` and `(B, A)` name the same edge.
//! Only the first occurrence of each unordered pair survives, and segments
//! whose endpoints collapsed into one cluster are dropped. The output
//! therefore has at most one edge per node pair and no self-loops.

use std::collections::HashSet;

use crate::types::CanonicalSegment;

/// Surviving segments and what was removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Deduplication {
    /// Unique, non-degenerate segments in first-occurrence order.
    pub segments: Vec<CanonicalSegment>,
    /// Repeated occurrences of an already-seen node pair.
    pub duplicates_removed: usize,
    /// Segments whose two endpoints share a cluster.
    pub self_loops_removed: usize,
}

/// Remove self-loops and repeated unordered pairs.
#[must_use]
pub fn deduplicate(segments: &[CanonicalSegment]) -> Deduplication {
    let mut seen = HashSet::with_capacity(segments.len());
    let mut out = Deduplication {
        segments: Vec::with_capacity(segments.len()),
        ..Deduplication::default()
    };

    for segment in segments {
        if segment.is_self_loop() {
            out.self_loops_removed += 1;
        } else if seen.insert(segment.key()) {
            out.segments.push(*segment);
        } else {
            out.duplicates_removed += 1;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClusterId;

    fn seg(a: usize, b: usize) -> CanonicalSegment {
        CanonicalSegment::new(ClusterId(a), ClusterId(b))
    }

    #[test]
    fn reversed_duplicate_is_removed() {
        let out = deduplicate(&[seg(0, 1), seg(1, 0)]);
        assert_eq!(out.segments, vec![seg(0, 1)]);
        assert_eq!(out.duplicates_removed, 1);
    }

    #[test]
    fn same_direction_duplicate_is_removed() {
        let out = deduplicate(&[seg(2, 3), seg(2, 3), seg(2, 3)]);
        assert_eq!(out.segments.len(), 1);
        assert_eq!(out.duplicates_removed, 2);
    }

    #[test]
    fn self_loops_are_dropped() {
        let out = deduplicate(&[seg(4, 4), seg(0, 1)]);
        assert_eq!(out.segments, vec![seg(0, 1)]);
        assert_eq!(out.self_loops_removed, 1);
        assert_eq!(out.duplicates_removed, 0);
    }

    #[test]
    fn first_occurrence_keeps_its_orientation_and_position() {
        let out = deduplicate(&[seg(5, 1), seg(0, 2), seg(1, 5), seg(2, 0), seg(3, 4)]);
        assert_eq!(out.segments, vec![seg(5, 1), seg(0, 2), seg(3, 4)]);
    }

    #[test]
    fn output_has_one_edge_per_pair() {
        let input: Vec<CanonicalSegment> = (0..6)
            .flat_map(|i| [seg(i % 3, (i + 1) % 3), seg((i + 1) % 3, i % 3)])
            .collect();
        let out = deduplicate(&input);
        let keys: HashSet<_> = out.segments.iter().map(CanonicalSegment::key).collect();
        assert_eq!(keys.len(), out.segments.len());
        assert_eq!(out.segments.len(), 3);
    }
}
