//! Request metrics
//!
//! Recorded through the `metrics` facade; installing an exporter is left
//! to the embedding application.

use std::time::{Duration, Instant};

/// Record request duration
pub fn record_request_duration(operation: &str, duration: Duration) {
    metrics::histogram!(
        "easysearch_request_duration_seconds",
        "operation" => operation.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record request success
pub fn record_request_success(operation: &str) {
    metrics::counter!(
        "easysearch_requests_total",
        "operation" => operation.to_string(),
        "status" => "ok",
    )
    .increment(1);
}

/// Record request error
pub fn record_request_error(operation: &str, error_type: &str) {
    metrics::counter!(
        "easysearch_requests_total",
        "operation" => operation.to_string(),
        "status" => "error",
    )
    .increment(1);

    metrics::counter!(
        "easysearch_errors_total",
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string(),
    )
    .increment(1);
}

/// Record the outcome of one bulk-file line
pub fn record_bulk_line(accepted: bool) {
    let status = if accepted { "accepted" } else { "rejected" };
    metrics::counter!("easysearch_bulk_lines_total", "status" => status).increment(1);
}

/// Record a schema cache lookup
pub fn record_schema_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    metrics::counter!("easysearch_schema_cache_total", "result" => result).increment(1);
}

/// Timer guard for one helper operation
pub struct RequestTimer {
    operation: &'static str,
    start: Instant,
}

impl RequestTimer {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }

    /// Record success and duration
    pub fn success(self) {
        record_request_duration(self.operation, self.start.elapsed());
        record_request_success(self.operation);
    }

    /// Record error and duration
    pub fn error(self, error_type: &str) {
        record_request_duration(self.operation, self.start.elapsed());
        record_request_error(self.operation, error_type);
    }

    /// Record the outcome of `result` and pass it through
    pub fn finish<T>(self, result: crate::Result<T>) -> crate::Result<T> {
        match &result {
            Ok(_) => self.success(),
            Err(e) => self.error(e.error_type()),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics::{
        Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_request_timer() {
        let timer = RequestTimer::new("query");
        std::thread::sleep(Duration::from_millis(1));
        timer.success();

        let timer = RequestTimer::new("aggregate");
        let result: crate::Result<()> = timer.finish(Err(crate::Error::Transport("reset".into())));
        assert!(result.is_err());
    }

    /// Counts every counter increment under `name{label=value,...}`
    #[derive(Default)]
    struct CountingRecorder {
        counters: Mutex<HashMap<String, Arc<AtomicU64>>>,
    }

    impl CountingRecorder {
        fn count(&self, key: &str) -> u64 {
            self.counters
                .lock()
                .get(key)
                .map(|c| c.load(Ordering::Relaxed))
                .unwrap_or(0)
        }
    }

    fn render(key: &Key) -> String {
        let labels: Vec<String> = key
            .labels()
            .map(|l| format!("{}={}", l.key(), l.value()))
            .collect();
        format!("{}{{{}}}", key.name(), labels.join(","))
    }

    impl Recorder for CountingRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
            let counter = Arc::clone(self.counters.lock().entry(render(key)).or_default());
            Counter::from_arc(counter)
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_counters_are_labelled() {
        let recorder = CountingRecorder::default();
        metrics::with_local_recorder(&recorder, || {
            record_bulk_line(true);
            record_bulk_line(true);
            record_bulk_line(false);
            record_schema_cache(false);
            let _ = RequestTimer::new("get").finish::<()>(Err(crate::Error::Engine {
                status: 404,
                reason: "missing".into(),
            }));
            RequestTimer::new("query").success();
        });

        assert_eq!(recorder.count("easysearch_bulk_lines_total{status=accepted}"), 2);
        assert_eq!(recorder.count("easysearch_bulk_lines_total{status=rejected}"), 1);
        assert_eq!(recorder.count("easysearch_schema_cache_total{result=miss}"), 1);
        assert_eq!(recorder.count("easysearch_schema_cache_total{result=hit}"), 0);
        assert_eq!(
            recorder.count("easysearch_requests_total{operation=get,status=error}"),
            1
        );
        assert_eq!(
            recorder.count("easysearch_errors_total{operation=get,error_type=engine}"),
            1
        );
        assert_eq!(
            recorder.count("easysearch_requests_total{operation=query,status=ok}"),
            1
        );
    }
}
