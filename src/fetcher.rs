use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use chrono::NaiveDate;

use crate::client::{failure_message, normalize, AnalyticsSource};
use crate::error::Result;
use crate::models::AnalyticsSnapshot;
use crate::range::{DateRange, RangeViolation};

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    /// Nothing requested yet.
    Idle,
    Loading,
    Ready(AnalyticsSnapshot),
    /// The range failed validation; no request was made.
    Invalid(RangeViolation),
    /// The request failed. Holds the message shown to the user.
    Failed(String),
}

struct Outcome {
    generation: u64,
    result: Result<AnalyticsSnapshot>,
}

/// Runs one analytics request at a time on a worker thread.
///
/// Every request bumps a generation counter. Results that come back for an
/// older generation are dropped, so the newest request always wins even when
/// an earlier one is still in flight. Superseded requests are not cancelled.
pub struct Fetcher {
    source: Arc<dyn AnalyticsSource>,
    tx: Sender<Outcome>,
    rx: Receiver<Outcome>,
    generation: u64,
    requested: Option<DateRange>,
    state: LoadState,
}

impl Fetcher {
    pub fn new(source: Arc<dyn AnalyticsSource>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            source,
            tx,
            rx,
            generation: 0,
            requested: None,
            state: LoadState::Idle,
        }
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn snapshot(&self) -> Option<&AnalyticsSnapshot> {
        match &self.state {
            LoadState::Ready(s) => Some(s),
            _ => None,
        }
    }

    #[cfg(test)]
    pub fn is_loading(&self) -> bool {
        matches!(self.state, LoadState::Loading)
    }

    /// The range of the most recent request that passed validation.
    #[cfg(test)]
    pub fn requested(&self) -> Option<DateRange> {
        self.requested
    }

    /// Fetch data for `range` after it changed. Re-applying the range that is
    /// already loaded (or loading) does not issue a second request.
    /// Returns true when a request was started.
    pub fn request(&mut self, range: DateRange, today: NaiveDate) -> bool {
        if !self.check(&range, today) {
            return false;
        }
        let same_range = self.requested == Some(range);
        if same_range && matches!(self.state, LoadState::Ready(_) | LoadState::Loading) {
            return false;
        }
        self.issue(range);
        true
    }

    /// Reload / Retry: always issues a request for a valid range.
    pub fn refresh(&mut self, range: DateRange, today: NaiveDate) -> bool {
        if !self.check(&range, today) {
            return false;
        }
        self.issue(range);
        true
    }

    fn check(&mut self, range: &DateRange, today: NaiveDate) -> bool {
        match range.validate(today) {
            Ok(()) => true,
            Err(violation) => {
                tracing::info!(start = %range.start, end = %range.end, %violation, "range rejected");
                // Anything still in flight must not overwrite the error.
                self.generation += 1;
                self.state = LoadState::Invalid(violation);
                false
            }
        }
    }

    fn issue(&mut self, range: DateRange) {
        self.generation += 1;
        let generation = self.generation;
        self.requested = Some(range);
        self.state = LoadState::Loading;
        tracing::info!(generation, start = %range.start, end = %range.end, "fetching analytics");

        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let result = source.fetch(&range).and_then(|raw| normalize(raw, &range));
            // The receiver is gone once the dashboard closes; nothing to do then.
            let _ = tx.send(Outcome { generation, result });
        });
    }

    /// Apply finished requests. Returns true when the state changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(outcome) = self.rx.try_recv() {
            changed |= self.apply(outcome);
        }
        changed
    }

    /// Block until the current request finishes.
    #[cfg(test)]
    pub fn wait(&mut self) {
        while self.is_loading() {
            match self.rx.recv() {
                Ok(outcome) => {
                    self.apply(outcome);
                }
                Err(_) => break,
            }
        }
    }

    fn apply(&mut self, outcome: Outcome) -> bool {
        if outcome.generation != self.generation {
            tracing::debug!(
                stale = outcome.generation,
                current = self.generation,
                "discarding superseded analytics result"
            );
            return false;
        }
        self.state = match outcome.result {
            Ok(snapshot) => {
                tracing::info!(
                    generation = outcome.generation,
                    types = snapshot.distribution.len(),
                    empty = snapshot.is_empty(),
                    "analytics loaded"
                );
                LoadState::Ready(snapshot)
            }
            Err(e) => {
                tracing::warn!(generation = outcome.generation, error = %e, "analytics fetch failed");
                LoadState::Failed(failure_message(&e))
            }
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::client::parse_response;
    use crate::client::tests::{CountingSource, SAMPLE};
    use crate::error::AppError;
    use crate::models::AnalyticsResponse;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn today() -> NaiveDate {
        d(2025, 6, 30)
    }

    fn march() -> DateRange {
        DateRange::new(d(2025, 3, 1), d(2025, 3, 31))
    }

    fn april() -> DateRange {
        DateRange::new(d(2025, 4, 1), d(2025, 4, 30))
    }

    /// Answers slowly for March, immediately otherwise; fails for May.
    /// `totalReports` echoes the month so results can be told apart.
    struct MonthSource;

    impl AnalyticsSource for MonthSource {
        fn fetch(&self, range: &DateRange) -> Result<AnalyticsResponse> {
            use chrono::Datelike;
            let month = range.start.month();
            if month == 3 {
                thread::sleep(Duration::from_millis(150));
            }
            if month == 5 {
                return Err(AppError::Server("Analytics database unavailable".to_string()));
            }
            parse_response(&format!(r#"{{"summaryStats": {{"totalReports": {month}}}}}"#))
        }
    }

    fn counting() -> Arc<CountingSource> {
        Arc::new(CountingSource { calls: AtomicUsize::new(0), body: SAMPLE })
    }

    #[test]
    fn test_request_loads_snapshot() {
        let mut f = Fetcher::new(counting());
        assert_eq!(f.state(), &LoadState::Idle);
        assert!(f.request(march(), today()));
        assert!(f.is_loading());
        f.wait();
        let snap = f.snapshot().unwrap();
        assert_eq!(snap.summary.total_reports, 17);
        assert_eq!(f.requested(), Some(march()));
    }

    #[test]
    fn test_invalid_range_makes_no_request() {
        let source = counting();
        let mut f = Fetcher::new(source.clone());
        let future = DateRange::new(d(2025, 6, 1), d(2025, 7, 1));
        assert!(!f.request(future, today()));
        assert_eq!(f.state(), &LoadState::Invalid(RangeViolation::EndInFuture));
        assert!(!f.refresh(future, today()));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_same_range_is_idempotent() {
        let source = counting();
        let mut f = Fetcher::new(source.clone());
        f.request(march(), today());
        f.wait();
        let first = f.snapshot().cloned();
        assert!(!f.request(march(), today()));
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        assert!(f.refresh(march(), today()));
        f.wait();
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert_eq!(f.snapshot().cloned(), first);
    }

    #[test]
    fn test_last_write_wins() {
        let mut f = Fetcher::new(Arc::new(MonthSource));
        f.request(march(), today());
        f.request(april(), today());
        f.wait();
        assert_eq!(f.snapshot().unwrap().summary.total_reports, 4);

        // The slow March answer arrives later and is ignored.
        thread::sleep(Duration::from_millis(300));
        assert!(!f.poll());
        assert_eq!(f.snapshot().unwrap().summary.total_reports, 4);
        assert_eq!(f.requested(), Some(april()));
    }

    #[test]
    fn test_failure_clears_snapshot() {
        let mut f = Fetcher::new(Arc::new(MonthSource));
        f.request(april(), today());
        f.wait();
        assert!(f.snapshot().is_some());

        let may = DateRange::new(d(2025, 5, 1), d(2025, 5, 31));
        f.request(may, today());
        f.wait();
        assert_eq!(
            f.state(),
            &LoadState::Failed("Analytics database unavailable".to_string())
        );
        assert!(f.snapshot().is_none());
    }

    #[test]
    fn test_validation_error_supersedes_in_flight_request() {
        let mut f = Fetcher::new(Arc::new(MonthSource));
        f.request(march(), today());
        let backwards = DateRange::new(d(2025, 3, 31), d(2025, 3, 1));
        f.request(backwards, today());
        thread::sleep(Duration::from_millis(300));
        f.poll();
        assert_eq!(f.state(), &LoadState::Invalid(RangeViolation::StartAfterEnd));
    }
}
