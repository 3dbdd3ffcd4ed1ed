//! Time-pruned history of recent samples.
//!
//! [`HistoryWindow`] keeps the samples received within a trailing
//! retention duration. Every append prunes the front of the window, so the
//! window never grows beyond what the sensor produced during that span.

use std::collections::VecDeque;
use std::time::Duration;

use airbox_types::Sample;

use crate::config::DEFAULT_RETENTION;

/// Append-only window of samples bounded to a trailing duration.
///
/// Insertion order is time order while timestamps are monotonic. If the
/// clock steps backwards the window falls back to a full re-scan until it
/// is ordered again.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    samples: VecDeque<Sample>,
    retention: Duration,
    ordered: bool,
}

impl Default for HistoryWindow {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}

impl HistoryWindow {
    /// Create an empty window with the given retention.
    pub fn new(retention: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            retention,
            ordered: true,
        }
    }

    /// The retention duration of this window.
    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Append a sample and drop everything older than
    /// `sample.timestamp - retention`.
    pub fn append(&mut self, sample: Sample) {
        if let Some(last) = self.samples.back()
            && sample.timestamp < last.timestamp
        {
            self.ordered = false;
        }
        self.samples.push_back(sample);

        let cutoff = sample.timestamp - self.retention;
        if self.ordered {
            while self
                .samples
                .front()
                .is_some_and(|oldest| oldest.timestamp < cutoff)
            {
                self.samples.pop_front();
            }
        } else {
            self.samples.retain(|s| s.timestamp >= cutoff);
            self.ordered = self
                .samples
                .iter()
                .zip(self.samples.iter().skip(1))
                .all(|(a, b)| a.timestamp <= b.timestamp);
        }
    }

    /// Independent copy of the retained samples, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    /// The most recently appended sample.
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    /// Number of retained samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use time::OffsetDateTime;

    proptest! {
        #[test]
        fn window_holds_exactly_the_trailing_span(
            steps in proptest::collection::vec(1i64..900, 1..200),
            retention_secs in 1u64..7200,
        ) {
            let retention = Duration::from_secs(retention_secs);
            let mut window = HistoryWindow::new(retention);
            let mut all = Vec::new();
            let mut now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();

            for (i, step) in steps.iter().enumerate() {
                now += time::Duration::seconds(*step);
                let sample = Sample::new(now, i as f64);
                all.push(sample);
                window.append(sample);

                let cutoff = now - retention;
                let expected: Vec<Sample> =
                    all.iter().copied().filter(|s| s.timestamp >= cutoff).collect();
                prop_assert_eq!(window.snapshot(), expected);
            }
        }
    }
}
