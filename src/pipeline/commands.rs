// src/pipeline/commands.rs

//! Command surface for the messaging transport.
//!
//! - `start`: arm the polling schedule for a chat
//! - `check`: run one capped on-demand cycle and reply immediately

use std::sync::Arc;

use crate::error::Result;
use crate::models::{Destination, Messages};
use crate::services::Notifier;

use super::detect::ChangeDetector;
use super::schedule::{Scheduler, StartOutcome, deliver};

/// Result of an on-demand check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// This many new listings were delivered
    Delivered(usize),
    /// The page had nothing new
    NoNewListings,
    /// The page could not be fetched
    SourceUnavailable,
}

/// Handles `start` and `check` for any destination.
pub struct CommandHandler {
    detector: Arc<ChangeDetector>,
    scheduler: Arc<Scheduler>,
    notifier: Arc<dyn Notifier>,
    messages: Messages,
    check_limit: usize,
}

impl CommandHandler {
    pub fn new(
        detector: Arc<ChangeDetector>,
        scheduler: Arc<Scheduler>,
        notifier: Arc<dyn Notifier>,
        messages: Messages,
        check_limit: usize,
    ) -> Self {
        Self {
            detector,
            scheduler,
            notifier,
            messages,
            check_limit: check_limit.max(1),
        }
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// Arm the schedule for `destination` and acknowledge it.
    pub async fn start(&self, destination: &Destination) -> Result<StartOutcome> {
        let outcome = self.scheduler.start(destination);
        let reply = match outcome {
            StartOutcome::Armed => &self.messages.started,
            StartOutcome::AlreadyRunning => &self.messages.already_running,
        };
        self.notifier.send_text(destination, reply).await?;
        Ok(outcome)
    }

    /// Run one on-demand cycle and deliver up to the check limit.
    ///
    /// Always answers: listings, "no new listings", or "source unavailable".
    pub async fn check(&self, destination: &Destination) -> Result<CheckOutcome> {
        self.notifier
            .send_text(destination, &self.messages.checking)
            .await?;

        let report = self.detector.run_cycle(Some(self.check_limit)).await;

        if report.is_source_unavailable() {
            self.notifier
                .send_text(destination, &self.messages.source_unavailable)
                .await?;
            return Ok(CheckOutcome::SourceUnavailable);
        }

        if report.listings.is_empty() {
            self.notifier
                .send_text(destination, &self.messages.no_new_listings)
                .await?;
            return Ok(CheckOutcome::NoNewListings);
        }

        let sent = deliver(self.notifier.as_ref(), destination, &report.listings).await;
        log::info!(
            "Check for {}: delivered {} of {} new listings ({} deferred)",
            destination,
            sent,
            report.listings.len(),
            report.deferred
        );
        Ok(CheckOutcome::Delivered(sent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;
    use crate::pipeline::testutil::*;
    use crate::services::PageSource;
    use crate::storage::SeenStore;

    fn handler(source: Arc<dyn PageSource>, notifier: Arc<RecordingNotifier>) -> CommandHandler {
        let mut config = Config::default();
        config.source.coalesce_secs = 0;
        config.schedule.check_limit = 2;

        let detector = Arc::new(
            ChangeDetector::new(&config, source, Arc::new(SeenStore::in_memory())).unwrap(),
        );
        let scheduler = Arc::new(Scheduler::new(
            detector.clone(),
            notifier.clone(),
            &config.schedule,
        ));
        CommandHandler::new(
            detector,
            scheduler,
            notifier,
            config.messages.clone(),
            config.schedule.check_limit,
        )
    }

    fn three_listings() -> String {
        page(&[
            card(1, "A", "1500 zł"),
            card(2, "B", "2500 zł"),
            card(3, "C", "3500 zł"),
        ])
    }

    #[tokio::test]
    async fn test_check_caps_and_defers() {
        let notifier = Arc::new(RecordingNotifier::default());
        let h = handler(Arc::new(StaticSource::new(three_listings())), notifier.clone());
        let chat = Destination::from("7");

        assert_eq!(h.check(&chat).await.unwrap(), CheckOutcome::Delivered(2));
        assert_eq!(notifier.links_for(&chat), vec![link(1), link(2)]);

        assert_eq!(h.check(&chat).await.unwrap(), CheckOutcome::Delivered(1));
        assert_eq!(notifier.links_for(&chat), vec![link(1), link(2), link(3)]);
    }

    #[tokio::test]
    async fn test_check_with_nothing_new_says_so() {
        let notifier = Arc::new(RecordingNotifier::default());
        let h = handler(
            Arc::new(StaticSource::new(page(&[card(1, "Tania", "100 zł")]))),
            notifier.clone(),
        );
        let chat = Destination::from("7");

        assert_eq!(h.check(&chat).await.unwrap(), CheckOutcome::NoNewListings);
        let messages = Messages::default();
        assert_eq!(
            notifier.texts_for(&chat),
            vec![messages.checking, messages.no_new_listings]
        );
    }

    #[tokio::test]
    async fn test_check_reports_unavailable_source() {
        let notifier = Arc::new(RecordingNotifier::default());
        let h = handler(Arc::new(FailingSource), notifier.clone());
        let chat = Destination::from("7");

        assert_eq!(h.check(&chat).await.unwrap(), CheckOutcome::SourceUnavailable);
        assert_eq!(
            notifier.texts_for(&chat).last(),
            Some(&Messages::default().source_unavailable)
        );
        assert!(notifier.links_for(&chat).is_empty());
    }

    #[tokio::test]
    async fn test_start_acknowledges_once_armed() {
        let notifier = Arc::new(RecordingNotifier::default());
        let h = handler(Arc::new(StaticSource::new(three_listings())), notifier.clone());
        let chat = Destination::from("7");

        assert_eq!(h.start(&chat).await.unwrap(), StartOutcome::Armed);
        assert_eq!(h.start(&chat).await.unwrap(), StartOutcome::AlreadyRunning);
        assert!(h.scheduler().is_armed(&chat));

        let messages = Messages::default();
        assert_eq!(
            notifier.texts_for(&chat),
            vec![messages.started, messages.already_running]
        );
        h.scheduler().shutdown();
    }
}
