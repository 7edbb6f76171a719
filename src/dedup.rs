use crate::category::{Candidate, Category};
use crate::report::Event;
use std::collections::BTreeMap;

/// Suppresses re-detections of the same ongoing real-world occurrence.
///
/// A garbage pile or pothole stays visible across many consecutive sampled
/// frames; without suppression the report would contain one near-identical
/// entry per sampled frame. An accepted event claims a fixed window around
/// its timestamp: later same-category candidates inside that window are
/// dropped, so the first detection of an occurrence is the one reported.
///
/// Two distinct occurrences of the same category closer together than the
/// window are indistinguishable from one prolonged occurrence and are
/// reported as a single event.
pub struct TemporalDeduplicator {
    window_secs: f64,
    min_confidence: f32,
    accepted: BTreeMap<Category, Vec<f64>>,
}

impl TemporalDeduplicator {
    pub fn new(window_secs: f64, min_confidence: f32) -> Self {
        Self {
            window_secs,
            min_confidence,
            accepted: BTreeMap::new(),
        }
    }

    /// Decides whether a candidate is a genuinely new occurrence.
    ///
    /// Returns the created event on acceptance; `None` when the candidate is
    /// below the confidence threshold or falls inside the window of an
    /// already accepted event of the same category. Candidates are expected
    /// in non-decreasing timestamp order, but the window test itself is
    /// symmetric.
    pub fn submit(&mut self, candidate: &Candidate, timestamp_secs: f64) -> Option<Event> {
        if candidate.confidence < self.min_confidence {
            log::debug!(
                "rejected {} '{}' at {:.3}s: confidence {:.3} below threshold",
                candidate.category,
                candidate.label,
                timestamp_secs,
                candidate.confidence
            );
            return None;
        }

        let seen = self.accepted.entry(candidate.category).or_default();
        if seen
            .iter()
            .any(|t| (t - timestamp_secs).abs() < self.window_secs)
        {
            log::debug!(
                "suppressed {} at {:.3}s as duplicate of an ongoing event",
                candidate.category,
                timestamp_secs
            );
            return None;
        }

        seen.push(timestamp_secs);
        Some(Event::new(candidate, timestamp_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BBox;

    fn candidate(category: Category, confidence: f32) -> Candidate {
        Candidate {
            category,
            label: "bottle".to_string(),
            confidence,
            bbox: BBox::new(0.0, 0.0, 10.0, 10.0),
        }
    }

    #[test]
    fn test_accepted_events_are_never_closer_than_the_window() {
        let mut dedup = TemporalDeduplicator::new(1.0, 0.5);
        let c = candidate(Category::Garbage, 0.9);

        let mut accepted = Vec::new();
        let mut t = 0.0;
        while t < 10.0 {
            if let Some(event) = dedup.submit(&c, t) {
                accepted.push(event.timestamp_seconds);
            }
            t += 0.3;
        }

        assert!(!accepted.is_empty());
        for (i, a) in accepted.iter().enumerate() {
            for b in accepted.iter().skip(i + 1) {
                assert!((a - b).abs() >= 1.0, "{a} and {b} violate the window");
            }
        }
    }

    #[test]
    fn test_first_detection_in_window_wins() {
        let mut dedup = TemporalDeduplicator::new(1.0, 0.5);
        let c = candidate(Category::Garbage, 0.6);

        let first = dedup.submit(&c, 0.0);
        assert!(first.is_some());
        assert_eq!(first.unwrap().timestamp_seconds, 0.0);

        // Later detections of the same occurrence are pure suppression.
        assert!(dedup.submit(&c, 0.167).is_none());
        assert!(dedup.submit(&c, 0.333).is_none());
    }

    #[test]
    fn test_gap_of_exactly_one_window_is_a_new_event() {
        let mut dedup = TemporalDeduplicator::new(1.0, 0.5);
        let c = candidate(Category::Pothole, 0.8);

        assert!(dedup.submit(&c, 0.0).is_some());
        // strict inequality: |1.0 - 0.0| < 1.0 is false
        assert!(dedup.submit(&c, 1.0).is_some());
    }

    #[test]
    fn test_window_does_not_extend_from_suppressed_detections() {
        let mut dedup = TemporalDeduplicator::new(1.0, 0.5);
        let c = candidate(Category::Garbage, 0.8);

        assert!(dedup.submit(&c, 0.0).is_some());
        assert!(dedup.submit(&c, 0.9).is_none());
        // 1.1s is outside the window anchored at 0.0, even though the
        // suppressed detection at 0.9 was closer.
        assert!(dedup.submit(&c, 1.1).is_some());
    }

    #[test]
    fn test_confidence_threshold_gate() {
        let mut dedup = TemporalDeduplicator::new(1.0, 0.5);

        assert!(dedup.submit(&candidate(Category::Garbage, 0.3), 0.0).is_none());
        // a candidate at exactly the threshold passes
        assert!(dedup.submit(&candidate(Category::Garbage, 0.5), 0.0).is_some());
    }

    #[test]
    fn test_categories_deduplicate_independently() {
        let mut dedup = TemporalDeduplicator::new(1.0, 0.5);

        assert!(dedup.submit(&candidate(Category::Garbage, 0.9), 0.0).is_some());
        assert!(dedup.submit(&candidate(Category::Pothole, 0.9), 0.2).is_some());
        assert!(dedup.submit(&candidate(Category::Garbage, 0.9), 0.2).is_none());
    }
}
