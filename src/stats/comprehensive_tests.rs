//! Property-based tests for the loss and RTT calculations

use super::*;
use proptest::collection::vec;
use proptest::prelude::*;

/// Property-based test generators
mod generators {
    use super::*;

    /// Timestamps within a few minutes of a realistic epoch value
    pub fn timestamps(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
        vec(0u32..300_000, 0..max_len).prop_map(|offsets| {
            offsets
                .into_iter()
                .map(|ms| 1_700_000_000.0 + ms as f64 / 1000.0)
                .collect()
        })
    }

    pub fn rtt_samples() -> impl Strategy<Value = Vec<f64>> {
        vec(0.0f64..5_000.0, 1..200)
    }
}

proptest! {
    #[test]
    fn prop_buckets_account_for_every_event(
        sent in generators::timestamps(200),
        recv in generators::timestamps(200),
    ) {
        let buckets = per_second_loss(&sent, &recv);
        if sent.is_empty() {
            prop_assert!(buckets.is_empty());
        } else {
            prop_assert_eq!(buckets.iter().map(|b| b.sent).sum::<u64>(), sent.len() as u64);
            prop_assert_eq!(buckets.iter().map(|b| b.received).sum::<u64>(), recv.len() as u64);
        }
    }

    #[test]
    fn prop_bucket_loss_is_finite_and_bounded_above(
        sent in generators::timestamps(100),
        recv in generators::timestamps(100),
    ) {
        for bucket in per_second_loss(&sent, &recv) {
            prop_assert!(bucket.loss_pct.is_finite());
            prop_assert!(bucket.loss_pct <= 100.0);
            if bucket.sent == 0 {
                prop_assert_eq!(bucket.loss_pct, 0.0);
            }
        }
    }

    #[test]
    fn prop_buckets_are_consecutive_seconds(sent in generators::timestamps(100)) {
        let buckets = per_second_loss(&sent, &[]);
        for (i, bucket) in buckets.iter().enumerate() {
            prop_assert_eq!(bucket.second, i as u64);
        }
    }

    #[test]
    fn prop_rtt_summary_is_ordered(samples in generators::rtt_samples()) {
        let summary = RttSummary::from_samples(&samples).unwrap();
        prop_assert_eq!(summary.count, samples.len());
        prop_assert!(summary.min_ms <= summary.mean_ms + 1e-9);
        prop_assert!(summary.mean_ms <= summary.max_ms + 1e-9);
        prop_assert!(summary.min_ms <= summary.p95_ms + 1e-9);
        prop_assert!(summary.p95_ms <= summary.max_ms + 1e-9);
    }

    #[test]
    fn prop_written_timestamps_parse_back(ts in generators::timestamps(50)) {
        let text: String = ts.iter().map(|t| format!("{:.6}\n", t)).collect();
        let parsed = parse_timestamps(&text);
        prop_assert_eq!(parsed.len(), ts.len());
        for (a, b) in parsed.iter().zip(&ts) {
            prop_assert!((a - b).abs() < 1e-5);
        }
    }

    #[test]
    fn prop_parsers_never_panic(text in ".{0,200}") {
        let _ = parse_timestamps(&text);
        let _ = parse_rtt_samples(&text);
    }
}

#[test]
fn test_single_event_session() {
    let analysis = SessionAnalysis::from_samples(&[42.0], &[42.0005], &[0.5]);
    assert_eq!(analysis.sent, 1);
    assert_eq!(analysis.received, 1);
    assert_eq!(analysis.loss_pct, Some(0.0));
    assert_eq!(analysis.timeline.len(), 1);
    assert_eq!(analysis.rtt.unwrap().p95_ms, 0.5);
}

#[test]
fn test_more_acks_than_sends_in_a_second() {
    // Acks delayed past a second boundary land in the next bucket.
    let buckets = per_second_loss(&[0.0, 0.9], &[0.5, 1.2]);
    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0].loss_pct, 50.0);
    assert_eq!((buckets[1].sent, buckets[1].received), (0, 1));
    assert_eq!(buckets[1].loss_pct, 0.0);
}
