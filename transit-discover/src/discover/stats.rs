//! Throughput tracking and progress snapshots.
//!
//! Two sliding windows: the average duration of provider requests, and the
//! rate at which new stops are discovered. The ETA assumes every queued task
//! takes about as long as discovering one stop currently does.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Default number of buckets in the request-duration window.
const REQUEST_WINDOW_BUCKETS: usize = 30;

/// Default width of one request-duration bucket.
const REQUEST_WINDOW_RESOLUTION: Duration = Duration::from_secs(1);

/// Default width of the discovery-rate window.
const DISCOVERY_WINDOW: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
struct Bucket {
    start: Instant,
    sum: f64,
    count: u32,
}

/// Average over the samples of the last `buckets` time buckets.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    max_buckets: usize,
    resolution: Duration,
    buckets: VecDeque<Bucket>,
}

impl MovingAverage {
    pub fn new(max_buckets: usize, resolution: Duration) -> Self {
        Self {
            max_buckets: max_buckets.max(1),
            resolution,
            buckets: VecDeque::new(),
        }
    }

    pub fn push(&mut self, value: f64, now: Instant) {
        match self.buckets.back_mut() {
            Some(bucket) if now.saturating_duration_since(bucket.start) < self.resolution => {
                bucket.sum += value;
                bucket.count += 1;
            }
            _ => self.buckets.push_back(Bucket {
                start: now,
                sum: value,
                count: 1,
            }),
        }
        self.evict(now);
    }

    /// Current average, or 0 when the window is empty.
    pub fn average(&mut self, now: Instant) -> f64 {
        self.evict(now);
        let (sum, count) = self
            .buckets
            .iter()
            .fold((0.0, 0u64), |(s, c), b| (s + b.sum, c + u64::from(b.count)));
        if count == 0 { 0.0 } else { sum / count as f64 }
    }

    fn evict(&mut self, now: Instant) {
        let span = self.resolution * self.max_buckets as u32;
        while self.buckets.len() > self.max_buckets
            || self
                .buckets
                .front()
                .is_some_and(|b| now.saturating_duration_since(b.start) >= span)
        {
            self.buckets.pop_front();
        }
    }
}

/// Events per second over a fixed time window.
#[derive(Debug, Clone)]
pub struct RateWindow {
    window: Duration,
    started: Instant,
    events: VecDeque<Instant>,
}

impl RateWindow {
    pub fn new(window: Duration, started: Instant) -> Self {
        Self {
            window,
            started,
            events: VecDeque::new(),
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.events.push_back(now);
        self.evict(now);
    }

    /// Events per second. Until a full window has elapsed, the rate is
    /// taken over the elapsed time (at least one second).
    pub fn rate(&mut self, now: Instant) -> f64 {
        self.evict(now);
        let elapsed = now
            .saturating_duration_since(self.started)
            .clamp(Duration::from_secs(1), self.window.max(Duration::from_secs(1)));
        self.events.len() as f64 / elapsed.as_secs_f64()
    }

    fn evict(&mut self, now: Instant) {
        while self
            .events
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) > self.window)
        {
            self.events.pop_front();
        }
    }
}

/// Progress snapshot of a crawl.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stats {
    /// Stops and stations discovered so far.
    pub nodes: u64,
    /// Edges discovered so far.
    pub edges: u64,
    /// Provider requests issued so far, including ones still running.
    pub requests: u64,
    /// Sliding-window average request duration.
    pub avg_request_ms: u64,
    /// Sliding-window discovery rate (stops per second).
    pub discovery_rate: f64,
    /// Tasks waiting in the queue.
    pub queued: usize,
    /// Estimated time until the queue drains; `None` means unknown.
    #[serde(rename = "eta_secs", serialize_with = "serialize_eta")]
    pub eta: Option<Duration>,
}

fn serialize_eta<S: serde::Serializer>(eta: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match eta {
        Some(d) => s.serialize_some(&d.as_secs()),
        None => s.serialize_none(),
    }
}

impl Stats {
    /// A snapshot before anything happened.
    pub fn empty() -> Self {
        Self {
            nodes: 0,
            edges: 0,
            requests: 0,
            avg_request_ms: 0,
            discovery_rate: 0.0,
            queued: 0,
            eta: None,
        }
    }
}

/// ETA in whole seconds: `ceil(queued / rate)`, or `None` if nothing is
/// being discovered.
pub fn eta(queued: usize, rate: f64) -> Option<Duration> {
    if rate <= 0.0 || !rate.is_finite() {
        return None;
    }
    Some(Duration::from_secs((queued as f64 / rate).ceil() as u64))
}

/// Number of provider requests issued, shared with running tasks.
#[derive(Debug, Clone, Default)]
pub struct RequestCounter(Arc<AtomicU64>);

impl RequestCounter {
    /// Count a request about to be sent.
    pub fn issue(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Counters and windows of one crawl.
#[derive(Debug, Clone)]
pub struct ThroughputTracker {
    requests: RequestCounter,
    nodes: u64,
    edges: u64,
    durations: MovingAverage,
    discoveries: RateWindow,
}

impl ThroughputTracker {
    pub fn new(started: Instant) -> Self {
        Self {
            requests: RequestCounter::default(),
            nodes: 0,
            edges: 0,
            durations: MovingAverage::new(REQUEST_WINDOW_BUCKETS, REQUEST_WINDOW_RESOLUTION),
            discoveries: RateWindow::new(DISCOVERY_WINDOW, started),
        }
    }

    /// Handle for counting requests as they are issued.
    pub fn requests(&self) -> RequestCounter {
        self.requests.clone()
    }

    /// Record how long one completed provider request took.
    pub fn record_duration(&mut self, took: Duration, now: Instant) {
        self.durations.push(took.as_secs_f64() * 1000.0, now);
    }

    /// Record one newly discovered stop.
    pub fn record_node(&mut self, now: Instant) {
        self.nodes += 1;
        self.discoveries.record(now);
    }

    /// Record one newly discovered edge.
    pub fn record_edge(&mut self) {
        self.edges += 1;
    }

    pub fn snapshot(&mut self, queued: usize, now: Instant) -> Stats {
        let rate = self.discoveries.rate(now);
        Stats {
            nodes: self.nodes,
            edges: self.edges,
            requests: self.requests.get(),
            avg_request_ms: self.durations.average(now).round() as u64,
            discovery_rate: rate,
            queued,
            eta: eta(queued, rate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn moving_average_of_recent_samples() {
        let t0 = Instant::now();
        let mut avg = MovingAverage::new(3, secs(1));

        avg.push(100.0, t0);
        avg.push(300.0, t0 + Duration::from_millis(500));
        assert_eq!(avg.average(t0 + Duration::from_millis(600)), 200.0);

        avg.push(600.0, t0 + secs(2));
        assert_eq!(avg.average(t0 + secs(2)), (100.0 + 300.0 + 600.0) / 3.0);

        // first bucket falls out of the 3 s window
        assert_eq!(avg.average(t0 + secs(3)), 600.0);
        assert_eq!(avg.average(t0 + secs(10)), 0.0);
    }

    #[test]
    fn moving_average_caps_bucket_count() {
        let t0 = Instant::now();
        let mut avg = MovingAverage::new(2, Duration::from_millis(10));
        avg.push(1.0, t0);
        avg.push(2.0, t0 + Duration::from_millis(10));
        avg.push(3.0, t0 + Duration::from_millis(15));
        avg.push(4.0, t0 + Duration::from_millis(20));

        assert_eq!(avg.buckets.len(), 2);
        assert_eq!(avg.average(t0 + Duration::from_millis(20)), 3.0);
    }

    #[test]
    fn rate_over_elapsed_then_window() {
        let t0 = Instant::now();
        let mut rate = RateWindow::new(secs(30), t0);

        for i in 0..10 {
            rate.record(t0 + secs(i));
        }
        // 10 events in 10 s
        assert_eq!(rate.rate(t0 + secs(10)), 1.0);

        // after 60 s the window is 30 s and old events are gone
        rate.record(t0 + secs(60));
        assert_eq!(rate.rate(t0 + secs(60)), 1.0 / 30.0);
    }

    #[test]
    fn rate_uses_at_least_one_second() {
        let t0 = Instant::now();
        let mut rate = RateWindow::new(secs(30), t0);
        rate.record(t0);
        rate.record(t0);
        assert_eq!(rate.rate(t0 + Duration::from_millis(100)), 2.0);
    }

    #[test]
    fn eta_rounds_up() {
        assert_eq!(eta(10, 3.0), Some(secs(4)));
        assert_eq!(eta(0, 3.0), Some(secs(0)));
        assert_eq!(eta(10, 0.0), None);
    }

    #[test]
    fn snapshot_reflects_counters() {
        let t0 = Instant::now();
        let mut tracker = ThroughputTracker::new(t0);

        let requests = tracker.requests();
        requests.issue();
        requests.issue();
        requests.issue();
        tracker.record_duration(Duration::from_millis(200), t0);
        tracker.record_duration(Duration::from_millis(400), t0);
        tracker.record_node(t0);
        tracker.record_node(t0);
        tracker.record_edge();

        let stats = tracker.snapshot(4, t0 + secs(1));
        // one request still running
        assert_eq!(stats.requests, 3);
        assert_eq!(stats.avg_request_ms, 300);
        assert_eq!(stats.nodes, 2);
        assert_eq!(stats.edges, 1);
        assert_eq!(stats.discovery_rate, 2.0);
        assert_eq!(stats.queued, 4);
        assert_eq!(stats.eta, Some(secs(2)));
    }

    #[test]
    fn empty_snapshot_has_no_eta() {
        let t0 = Instant::now();
        let mut tracker = ThroughputTracker::new(t0);
        let stats = tracker.snapshot(5, t0);
        assert_eq!(stats.eta, None);
        assert_eq!(stats.avg_request_ms, 0);
    }

    #[test]
    fn stats_serialize_eta_as_seconds() {
        let mut stats = Stats::empty();
        let json = serde_json::to_value(&stats).unwrap();
        assert!(json["eta_secs"].is_null());

        stats.eta = Some(secs(42));
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["eta_secs"], 42);
    }
}
