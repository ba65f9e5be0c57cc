//! Cron-driven job scheduling with per-run panic isolation.
//!
//! The scheduler sleeps until the next occurrence of its cron
//! expression, runs the job to completion, then sleeps again, so runs
//! never overlap. A panic inside one run is caught and logged (the
//! process panic hook has already printed the backtrace by then) so the
//! loop survives and later runs still fire.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use cron::Schedule;
use futures::FutureExt;
use tracing::{error, info};

/// A unit of scheduled work. The scheduler holds no knowledge of what
/// the job does.
#[async_trait]
pub(crate) trait Job: Send {
    async fn run(&mut self);
}

pub(crate) struct Scheduler {
    schedule: Schedule,
}

impl Scheduler {
    /// Schedule validity is the config layer's concern; by the time a
    /// [`Schedule`] exists it is well-formed.
    pub(crate) fn new(schedule: Schedule) -> Self {
        Self { schedule }
    }

    /// Runs `job` on every upcoming occurrence until the schedule is
    /// exhausted (which, for recurring expressions, is never).
    pub(crate) async fn run<J: Job>(&self, mut job: J) {
        info!(schedule = %self.schedule, "Scheduler started");

        loop {
            let Some(next) = self.schedule.upcoming(Utc).next() else {
                info!("Schedule has no further occurrences, stopping");
                return;
            };

            let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;

            run_isolated(&mut job).await;
        }
    }
}

/// Invokes one run, converting a panic into a logged event instead of
/// unwinding into the scheduling loop.
pub(crate) async fn run_isolated<J: Job>(job: &mut J) {
    if let Err(panic) = AssertUnwindSafe(job.run()).catch_unwind().await {
        error!(reason = panic_message(&panic), "Scheduled run panicked");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FlakyJob {
        runs: usize,
        panic_on_first: bool,
    }

    #[async_trait]
    impl Job for FlakyJob {
        async fn run(&mut self) {
            self.runs += 1;
            if self.panic_on_first && self.runs == 1 {
                panic!("boom");
            }
        }
    }

    #[tokio::test]
    async fn panicking_run_does_not_stop_subsequent_runs() {
        let mut job = FlakyJob {
            runs: 0,
            panic_on_first: true,
        };

        run_isolated(&mut job).await;
        run_isolated(&mut job).await;

        assert_eq!(job.runs, 2);
    }

    #[tokio::test]
    async fn normal_runs_pass_through_the_isolation_wrapper() {
        let mut job = FlakyJob {
            runs: 0,
            panic_on_first: false,
        };

        run_isolated(&mut job).await;

        assert_eq!(job.runs, 1);
    }
}
