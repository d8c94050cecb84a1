use crate::Domain;
use serde::{Deserialize, Serialize};

/// Routing record mapping a lower-bound domain to a normal and optional
/// migrate shard. Segments form a sorted-ascending list by `domain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub domain: Domain,
    pub normal_server: String,
    pub migrate_server: Option<String>,
}

impl Segment {
    pub fn new(domain: Domain, normal_server: impl Into<String>) -> Self {
        Self {
            domain,
            normal_server: normal_server.into(),
            migrate_server: None,
        }
    }
}

/// Returns the segment with the greatest `domain <= d`, or `None` if every
/// segment's lower bound exceeds `d`. `segments` must be sorted ascending by
/// `domain` (the invariant the selector's segment list maintains).
pub fn find_perfect_segment(segments: &[Segment], d: Domain) -> Option<&Segment> {
    // binary search for the rightmost segment whose domain <= d
    match segments.binary_search_by_key(&d, |s| s.domain) {
        Ok(idx) => Some(&segments[idx]),
        Err(0) => None,
        Err(idx) => Some(&segments[idx - 1]),
    }
}

/// Inserts or replaces `update` in `segments`, keeping it sorted ascending by
/// `domain`. If a segment with the same `domain` and payload already exists
/// and `delete_on_equal` is set, the existing segment is removed instead of
/// re-inserted (mirrors the notice loop's `segmentDeletion` toggle).
pub fn upsert_segment(segments: &mut Vec<Segment>, update: Segment, delete_on_equal: bool) {
    match segments.binary_search_by_key(&update.domain, |s| s.domain) {
        Ok(idx) => {
            if delete_on_equal && segments[idx] == update {
                segments.remove(idx);
            } else {
                segments[idx] = update;
            }
        }
        Err(idx) => segments.insert(idx, update),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(d: Domain, name: &str) -> Segment {
        Segment::new(d, name)
    }

    #[test]
    fn finds_greatest_lower_bound() {
        let segments = vec![seg(1, "a"), seg(5, "b"), seg(22, "c"), seg(100, "d")];
        assert_eq!(find_perfect_segment(&segments, 0), None);
        assert_eq!(find_perfect_segment(&segments, 1).unwrap().normal_server, "a");
        assert_eq!(find_perfect_segment(&segments, 4).unwrap().normal_server, "a");
        assert_eq!(find_perfect_segment(&segments, 5).unwrap().normal_server, "b");
        assert_eq!(find_perfect_segment(&segments, 21).unwrap().normal_server, "b");
        assert_eq!(find_perfect_segment(&segments, 22).unwrap().normal_server, "c");
        assert_eq!(find_perfect_segment(&segments, 1000).unwrap().normal_server, "d");
    }

    // Scenario S4: build up the list through inserts/dup-insert/exact-equal insert,
    // then check every queried domain in [1,100] resolves to the greatest <= d.
    #[test]
    fn s4_segment_update_sequence() {
        let mut segments = vec![seg(1, "a1")];
        for d in [2, 7, 5, 100, 22, 9] {
            upsert_segment(&mut segments, seg(d, "a1"), false);
        }
        // duplicate insert of domain 5 with a distinct payload replaces it in place.
        let mut replacement = seg(5, "a1");
        replacement.migrate_server = Some("b1".to_string());
        upsert_segment(&mut segments, replacement.clone(), false);
        upsert_segment(&mut segments, seg(13, "a1"), false);
        // exact-equal insert with deletion enabled removes it.
        upsert_segment(&mut segments, replacement, true);

        assert!(segments.windows(2).all(|w| w[0].domain < w[1].domain));
        assert!(segments.iter().all(|s| s.domain != 5));

        for d in 1..=100 {
            let found = find_perfect_segment(&segments, d);
            assert!(found.is_some(), "domain {d} should resolve to a segment");
            let found = found.unwrap();
            assert!(found.domain <= d);
            assert!(segments.iter().all(|s| !(found.domain < s.domain && s.domain <= d)));
        }
    }
}
