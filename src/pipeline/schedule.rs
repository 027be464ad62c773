// src/pipeline/schedule.rs

//! Per-destination polling schedule.
//!
//! Each destination gets at most one subscription: a task that waits the
//! first-fire delay, then runs a detection cycle every interval and delivers
//! the results. A subscription's cycles never overlap because they run on a
//! single task; a slow cycle delays the next tick instead of stacking it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::models::{Destination, Listing, ScheduleConfig};
use crate::services::Notifier;

use super::detect::ChangeDetector;

/// Result of a `start` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new subscription was created
    Armed,
    /// The destination already had a live subscription; nothing changed
    AlreadyRunning,
}

/// Snapshot of an active subscription.
#[derive(Debug, Clone)]
pub struct Subscription {
    pub destination: Destination,
    pub interval: Duration,
    pub next_due: Instant,
}

struct Entry {
    handle: JoinHandle<()>,
    next_due: Arc<Mutex<Instant>>,
}

/// Deliver listings one message each, in order. Returns how many were sent.
///
/// A failed send is logged and does not stop the remaining deliveries.
pub async fn deliver(
    notifier: &dyn Notifier,
    destination: &Destination,
    listings: &[Listing],
) -> usize {
    let mut sent = 0;
    for listing in listings {
        match notifier.send_listing(destination, listing).await {
            Ok(()) => sent += 1,
            Err(e) => log::warn!("Delivery of {} to {} failed: {}", listing.link, destination, e),
        }
    }
    sent
}

/// Owns one timer per destination.
pub struct Scheduler {
    detector: Arc<ChangeDetector>,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    first_delay: Duration,
    subscriptions: Mutex<HashMap<Destination, Entry>>,
}

impl Scheduler {
    pub fn new(
        detector: Arc<ChangeDetector>,
        notifier: Arc<dyn Notifier>,
        config: &ScheduleConfig,
    ) -> Self {
        Self {
            detector,
            notifier,
            // tokio intervals reject a zero period
            interval: config.interval().max(Duration::from_millis(1)),
            first_delay: config.first_delay(),
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<Destination, Entry>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Arm a subscription for `destination` unless one is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, destination: &Destination) -> StartOutcome {
        let mut entries = self.entries();
        if let Some(entry) = entries.get(destination) {
            if !entry.handle.is_finished() {
                log::info!("Schedule for {} already running", destination);
                return StartOutcome::AlreadyRunning;
            }
        }

        let first_due = Instant::now() + self.first_delay;
        let next_due = Arc::new(Mutex::new(first_due));
        let handle = tokio::spawn(run_subscription(
            Arc::clone(&self.detector),
            Arc::clone(&self.notifier),
            destination.clone(),
            first_due,
            self.interval,
            Arc::clone(&next_due),
        ));

        entries.insert(destination.clone(), Entry { handle, next_due });
        log::info!(
            "Armed schedule for {} (first check in {:?}, then every {:?})",
            destination,
            self.first_delay,
            self.interval
        );
        StartOutcome::Armed
    }

    /// Cancel the subscription for `destination`. Returns whether one existed.
    pub fn stop(&self, destination: &Destination) -> bool {
        match self.entries().remove(destination) {
            Some(entry) => {
                entry.handle.abort();
                log::info!("Stopped schedule for {}", destination);
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, destination: &Destination) -> bool {
        self.entries()
            .get(destination)
            .is_some_and(|e| !e.handle.is_finished())
    }

    /// Live subscriptions, sorted by destination.
    pub fn subscriptions(&self) -> Vec<Subscription> {
        let mut subs: Vec<Subscription> = self
            .entries()
            .iter()
            .filter(|(_, e)| !e.handle.is_finished())
            .map(|(dest, e)| Subscription {
                destination: dest.clone(),
                interval: self.interval,
                next_due: *e.next_due.lock().unwrap_or_else(|p| p.into_inner()),
            })
            .collect();
        subs.sort_by(|a, b| a.destination.cmp(&b.destination));
        subs
    }

    /// Abort every subscription.
    pub fn shutdown(&self) {
        let mut entries = self.entries();
        for (destination, entry) in entries.drain() {
            entry.handle.abort();
            log::debug!("Aborted schedule for {}", destination);
        }
        log::info!("Scheduler stopped");
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for entry in self.entries().values() {
            entry.handle.abort();
        }
    }
}

async fn run_subscription(
    detector: Arc<ChangeDetector>,
    notifier: Arc<dyn Notifier>,
    destination: Destination,
    first_due: Instant,
    interval: Duration,
    next_due: Arc<Mutex<Instant>>,
) {
    let mut ticker = tokio::time::interval_at(first_due, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let fired = ticker.tick().await;
        *next_due.lock().unwrap_or_else(|p| p.into_inner()) = fired + interval;

        log::info!("Scheduled check for {}", destination);
        let report = detector.run_cycle(None).await;
        if report.is_source_unavailable() {
            continue;
        }

        let sent = deliver(notifier.as_ref(), &destination, &report.listings).await;
        if sent > 0 {
            log::info!("Delivered {} new listings to {}", sent, destination);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;
    use crate::pipeline::testutil::*;
    use crate::storage::SeenStore;

    struct Fixture {
        source: Arc<StaticSource>,
        notifier: Arc<RecordingNotifier>,
        scheduler: Scheduler,
    }

    fn fixture() -> Fixture {
        let config = Config::default();
        let source = Arc::new(StaticSource::new(page(&[
            card(1, "A", "1500 zł"),
            card(2, "B", "2500 zł"),
            card(3, "C", "3500 zł"),
        ])));
        let notifier = Arc::new(RecordingNotifier::default());
        let detector = Arc::new(
            ChangeDetector::new(&config, source.clone(), Arc::new(SeenStore::in_memory())).unwrap(),
        );
        let scheduler = Scheduler::new(detector, notifier.clone(), &config.schedule);
        Fixture {
            source,
            notifier,
            scheduler,
        }
    }

    async fn advance(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_delay_then_interval() {
        let f = fixture();
        let chat = Destination::from("100");

        assert_eq!(f.scheduler.start(&chat), StartOutcome::Armed);
        advance(4).await;
        assert_eq!(f.source.fetches(), 0);

        advance(2).await;
        assert_eq!(f.source.fetches(), 1);
        assert_eq!(f.notifier.links_for(&chat), vec![link(1), link(2), link(3)]);

        advance(3600).await;
        assert_eq!(f.source.fetches(), 2);
        assert_eq!(f.notifier.links_for(&chat).len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_does_not_stack_timers() {
        let f = fixture();
        let chat = Destination::from("100");

        assert_eq!(f.scheduler.start(&chat), StartOutcome::Armed);
        assert_eq!(f.scheduler.start(&chat), StartOutcome::AlreadyRunning);
        assert_eq!(f.scheduler.start(&chat), StartOutcome::AlreadyRunning);

        advance(6).await;
        assert_eq!(f.source.fetches(), 1);

        f.source.set_body(page(&[card(4, "D", "4500 zł")]));
        advance(3600).await;
        assert_eq!(f.source.fetches(), 2);
        assert_eq!(f.notifier.links_for(&chat), vec![link(1), link(2), link(3), link(4)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_then_rearm() {
        let f = fixture();
        let chat = Destination::from("100");

        f.scheduler.start(&chat);
        assert!(f.scheduler.stop(&chat));
        assert!(!f.scheduler.is_armed(&chat));
        assert!(!f.scheduler.stop(&chat));

        advance(10).await;
        assert_eq!(f.source.fetches(), 0);

        assert_eq!(f.scheduler.start(&chat), StartOutcome::Armed);
        advance(6).await;
        assert_eq!(f.source.fetches(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_destinations_share_one_fetch_and_seen_set() {
        let f = fixture();
        let a = Destination::from("1");
        let b = Destination::from("2");

        f.scheduler.start(&a);
        f.scheduler.start(&b);
        advance(6).await;

        assert_eq!(f.source.fetches(), 1);
        let total = f.notifier.links_for(&a).len() + f.notifier.links_for(&b).len();
        assert_eq!(total, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriptions_report_next_due() {
        let f = fixture();
        let chat = Destination::from("100");
        let armed_at = Instant::now();
        f.scheduler.start(&chat);

        let subs = f.scheduler.subscriptions();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].destination, chat);
        assert_eq!(subs[0].next_due, armed_at + Duration::from_secs(5));

        advance(6).await;
        let subs = f.scheduler.subscriptions();
        assert_eq!(subs[0].next_due, armed_at + Duration::from_secs(5 + 3600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_everything() {
        let f = fixture();
        f.scheduler.start(&Destination::from("1"));
        f.scheduler.start(&Destination::from("2"));
        f.scheduler.shutdown();

        assert!(f.scheduler.subscriptions().is_empty());
        advance(10).await;
        assert_eq!(f.source.fetches(), 0);
    }
}
