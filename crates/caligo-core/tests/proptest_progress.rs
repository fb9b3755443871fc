use caligo_core::progress::{compute_metrics, progress_bar, PROGRESS_BAR_WIDTH};
use caligo_core::{Direction, ProgressReporter, ProgressState};
use proptest::prelude::*;
use std::time::{Duration, Instant};

proptest! {
    /// No two emitted updates are closer than five seconds, whatever the tick pattern.
    #[test]
    fn at_most_one_update_per_window(
        mut offsets_ms in proptest::collection::vec(0u64..60_000, 1..200),
        shuffle in proptest::bool::ANY,
    ) {
        if !shuffle {
            offsets_ms.sort_unstable();
        }

        let start = Instant::now();
        let reporter = ProgressReporter::new(Direction::Download, "file.bin");
        let mut state = ProgressState::started_at(1_000, start);
        let mut emitted: Vec<Instant> = Vec::new();

        for (i, offset) in offsets_ms.iter().enumerate() {
            let now = start + Duration::from_millis(*offset);
            let current = u64::try_from(i).unwrap_or(u64::MAX);
            if reporter.on_progress_at(current, 1_000, &mut state, now).is_some() {
                emitted.push(now);
                prop_assert_eq!(state.last_emitted_at, Some(now));
            }
        }

        prop_assert!(!emitted.is_empty(), "first tick must emit");
        for pair in emitted.windows(2) {
            prop_assert!(
                pair[1].saturating_duration_since(pair[0]) >= Duration::from_secs(5),
                "updates emitted {:?} apart",
                pair[1].saturating_duration_since(pair[0])
            );
        }
    }

    /// Speed and ETA stay finite and non-negative for any counters.
    #[test]
    fn metrics_are_finite(
        current in any::<u64>(),
        total in any::<u64>(),
        elapsed_ms in 0u64..10_000_000,
    ) {
        let metrics = compute_metrics(current, total, Duration::from_millis(elapsed_ms));
        prop_assert!(metrics.speed.is_finite() && metrics.speed >= 0.0);
        prop_assert!(metrics.percent.is_finite());
        prop_assert!((0.0..=1.0).contains(&metrics.percent));
        prop_assert!(metrics.eta.as_secs_f64().is_finite());
    }

    /// The bar never grows past its fixed width.
    #[test]
    fn bar_width_is_fixed(percent in -10.0f64..10.0) {
        prop_assert_eq!(progress_bar(percent).chars().count(), PROGRESS_BAR_WIDTH);
    }
}

#[test]
fn degenerate_counters_are_zero() {
    let metrics = compute_metrics(0, 0, Duration::ZERO);
    assert!(metrics.speed.abs() < f64::EPSILON);
    assert_eq!(metrics.eta, Duration::ZERO);
}
