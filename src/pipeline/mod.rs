//! Pipeline entry points for watcher operations.
//!
//! - `ChangeDetector`: fetch → extract → filter → dedup cycle
//! - `Scheduler`: one recurring cycle per destination
//! - `CommandHandler`: `start` / `check` commands from the transport

pub mod commands;
pub mod detect;
pub mod schedule;

#[cfg(test)]
pub(crate) mod testutil;

pub use commands::{CheckOutcome, CommandHandler};
pub use detect::{ChangeDetector, CycleReport};
pub use schedule::{Scheduler, StartOutcome, Subscription, deliver};
