//! Per-day draw orchestration.
//!
//! One [`DrawJob`] owns the attempt bookkeeping for every day the
//! process has seen. Each scheduled run resolves the day's record,
//! consults the on-chain draw state, and either submits the draw
//! transaction, records completion, or waits. Repeated failure within a
//! day escalates through the [`AlarmSink`].
//!
//! The record map lives in memory only: restarting the process forgets
//! all attempt history, and the map is never evicted. Runs are invoked
//! sequentially by the scheduler, so the map needs no locking.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use chrono::{NaiveDate, Utc};
use tracing::{error, info, warn};

use crate::alarm::{AlarmContext, AlarmSink};
use crate::contract::{DrawState, LotteryDraw};

/// Unsuccessful runs tolerated per day before the alarm fires.
pub(crate) const MAX_DRAW_ATTEMPTS: u8 = 2;

/// Attempt bookkeeping for one calendar day. Once `is_drawn` flips to
/// true the record is never mutated again.
#[derive(Debug)]
struct DailyRecord {
    lottery_number: u64,
    is_drawn: bool,
    try_count: u8,
}

pub(crate) struct DrawJob<C, A> {
    contract: C,
    alarm: A,
    records: HashMap<NaiveDate, DailyRecord>,
}

impl<C: LotteryDraw, A: AlarmSink> DrawJob<C, A> {
    pub(crate) fn new(contract: C, alarm: A) -> Self {
        Self {
            contract,
            alarm,
            records: HashMap::new(),
        }
    }

    /// One orchestration pass for `today`. Side-effecting only: every
    /// contract failure is handled here, none propagate to the caller.
    pub(crate) async fn run_once(&mut self, today: NaiveDate) {
        info!(%today, "Draw job tick");

        let record = match self.records.entry(today) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                // The lottery number identifies the draw for every later
                // step; without it this run cannot proceed.
                let lottery_number = match self.contract.current_lottery_number().await {
                    Ok(number) => number,
                    Err(err) => {
                        error!(%today, %err, "Failed to fetch current lottery number");
                        self.alarm
                            .notify(
                                "failed to fetch current lottery number",
                                &AlarmContext {
                                    day: today,
                                    lottery_number: None,
                                    try_count: 0,
                                    last_error: Some(err.to_string()),
                                },
                            )
                            .await;
                        return;
                    }
                };

                entry.insert(DailyRecord {
                    lottery_number,
                    is_drawn: false,
                    try_count: 0,
                })
            }
        };

        if record.is_drawn {
            // Idempotence: after success a run performs zero contract calls.
            return;
        }

        let lottery_number = record.lottery_number;
        let mut last_error = None;

        match self.contract.draw_state(lottery_number).await {
            Ok(Some(DrawState::Drawn)) => {
                // Covers a prior run whose transaction landed but whose
                // in-memory update never did, and draws triggered by
                // another actor.
                record.is_drawn = true;
                info!(lottery_number, "Draw already completed on chain");
            }
            Ok(Some(DrawState::Drawing)) => {
                info!(lottery_number, "Draw in progress, leaving it alone");
            }
            Ok(Some(DrawState::NotDrawn)) => match self.contract.draw(lottery_number).await {
                Ok(()) => {
                    record.is_drawn = true;
                    info!(lottery_number, "Draw succeeded");
                }
                Err(err) => {
                    error!(lottery_number, %err, "Draw transaction failed");
                    last_error = Some(err.to_string());
                }
            },
            Ok(None) => {
                warn!(lottery_number, "Unrecognized draw state, taking no action");
            }
            Err(err) => {
                error!(lottery_number, %err, "Failed to query draw state");
                last_error = Some(err.to_string());
            }
        }

        if !record.is_drawn {
            record.try_count = record.try_count.saturating_add(1);

            if record.try_count >= MAX_DRAW_ATTEMPTS {
                error!(
                    lottery_number,
                    try_count = record.try_count,
                    "Draw retry budget exhausted"
                );
                self.alarm
                    .notify(
                        "draw retry budget exhausted",
                        &AlarmContext {
                            day: today,
                            lottery_number: Some(lottery_number),
                            try_count: record.try_count,
                            last_error,
                        },
                    )
                    .await;
            }
        }
    }
}

#[async_trait::async_trait]
impl<C: LotteryDraw, A: AlarmSink> crate::scheduler::Job for DrawJob<C, A> {
    async fn run(&mut self) {
        self.run_once(Utc::now().date_naive()).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::*;
    use crate::error::GatewayError;

    /// Scripted contract double. `state` is returned on every
    /// `draw_state` call; `None` for any scripted operation means "fail
    /// with a gateway error".
    struct ScriptedContract {
        lottery_number: Option<u64>,
        state: Mutex<Option<Option<DrawState>>>,
        draw_succeeds: bool,
        number_calls: AtomicUsize,
        state_calls: AtomicUsize,
        draw_calls: AtomicUsize,
    }

    impl ScriptedContract {
        fn new(state: Option<DrawState>, draw_succeeds: bool) -> Self {
            Self {
                lottery_number: Some(42),
                state: Mutex::new(Some(state)),
                draw_succeeds,
                number_calls: AtomicUsize::new(0),
                state_calls: AtomicUsize::new(0),
                draw_calls: AtomicUsize::new(0),
            }
        }

        fn failing_number() -> Self {
            let mut contract = Self::new(Some(DrawState::NotDrawn), true);
            contract.lottery_number = None;
            contract
        }

        fn failing_state() -> Self {
            let contract = Self::new(Some(DrawState::NotDrawn), true);
            *contract.state.lock().unwrap() = None;
            contract
        }

        fn set_state(&self, state: Option<DrawState>) {
            *self.state.lock().unwrap() = Some(state);
        }

        fn test_error() -> GatewayError {
            GatewayError::UnknownFunction {
                function: "scripted failure".to_string(),
            }
        }
    }

    #[async_trait]
    impl LotteryDraw for ScriptedContract {
        async fn current_lottery_number(&self) -> Result<u64, GatewayError> {
            self.number_calls.fetch_add(1, Ordering::SeqCst);
            self.lottery_number.ok_or_else(Self::test_error)
        }

        async fn draw_state(&self, _lottery_number: u64) -> Result<Option<DrawState>, GatewayError> {
            self.state_calls.fetch_add(1, Ordering::SeqCst);
            self.state.lock().unwrap().ok_or_else(Self::test_error)
        }

        async fn draw(&self, _lottery_number: u64) -> Result<(), GatewayError> {
            self.draw_calls.fetch_add(1, Ordering::SeqCst);
            if self.draw_succeeds {
                Ok(())
            } else {
                Err(Self::test_error())
            }
        }
    }

    #[derive(Default)]
    struct RecordingAlarm {
        calls: Mutex<Vec<(String, AlarmContext)>>,
    }

    impl RecordingAlarm {
        fn calls(&self) -> Vec<(String, AlarmContext)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AlarmSink for RecordingAlarm {
        async fn notify(&self, reason: &str, context: &AlarmContext) {
            self.calls
                .lock()
                .unwrap()
                .push((reason.to_string(), context.clone()));
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn job(
        contract: &Arc<ScriptedContract>,
        alarm: &Arc<RecordingAlarm>,
    ) -> DrawJob<Arc<ScriptedContract>, Arc<RecordingAlarm>> {
        DrawJob::new(Arc::clone(contract), Arc::clone(alarm))
    }

    #[tokio::test]
    async fn not_drawn_submits_exactly_one_draw_and_marks_record() {
        let contract = Arc::new(ScriptedContract::new(Some(DrawState::NotDrawn), true));
        let alarm = Arc::new(RecordingAlarm::default());
        let mut job = job(&contract, &alarm);

        job.run_once(day()).await;

        assert_eq!(contract.draw_calls.load(Ordering::SeqCst), 1);
        assert!(job.records[&day()].is_drawn);
        assert!(alarm.calls().is_empty());
    }

    #[tokio::test]
    async fn runs_after_success_perform_zero_contract_calls() {
        let contract = Arc::new(ScriptedContract::new(Some(DrawState::NotDrawn), true));
        let alarm = Arc::new(RecordingAlarm::default());
        let mut job = job(&contract, &alarm);

        job.run_once(day()).await;
        let tries_after_success = job.records[&day()].try_count;

        job.run_once(day()).await;
        job.run_once(day()).await;

        assert_eq!(contract.number_calls.load(Ordering::SeqCst), 1);
        assert_eq!(contract.state_calls.load(Ordering::SeqCst), 1);
        assert_eq!(contract.draw_calls.load(Ordering::SeqCst), 1);
        assert_eq!(job.records[&day()].try_count, tries_after_success);
    }

    #[tokio::test]
    async fn drawn_state_marks_record_without_a_transaction() {
        let contract = Arc::new(ScriptedContract::new(Some(DrawState::Drawn), true));
        let alarm = Arc::new(RecordingAlarm::default());
        let mut job = job(&contract, &alarm);

        job.run_once(day()).await;

        assert_eq!(contract.draw_calls.load(Ordering::SeqCst), 0);
        assert!(job.records[&day()].is_drawn);
    }

    #[tokio::test]
    async fn drawing_state_takes_no_action() {
        let contract = Arc::new(ScriptedContract::new(Some(DrawState::Drawing), true));
        let alarm = Arc::new(RecordingAlarm::default());
        let mut job = job(&contract, &alarm);

        job.run_once(day()).await;

        assert_eq!(contract.draw_calls.load(Ordering::SeqCst), 0);
        assert!(!job.records[&day()].is_drawn);
        assert_eq!(job.records[&day()].try_count, 1);
        assert!(alarm.calls().is_empty());
    }

    #[tokio::test]
    async fn unrecognized_state_is_not_actionable() {
        let contract = Arc::new(ScriptedContract::new(None, true));
        let alarm = Arc::new(RecordingAlarm::default());
        let mut job = job(&contract, &alarm);

        job.run_once(day()).await;

        assert_eq!(contract.draw_calls.load(Ordering::SeqCst), 0);
        assert!(!job.records[&day()].is_drawn);
    }

    #[tokio::test]
    async fn alarm_fires_exactly_on_the_second_failed_run() {
        let contract = Arc::new(ScriptedContract::new(Some(DrawState::NotDrawn), false));
        let alarm = Arc::new(RecordingAlarm::default());
        let mut job = job(&contract, &alarm);

        job.run_once(day()).await;
        assert!(alarm.calls().is_empty(), "alarm must not fire before the budget is spent");

        job.run_once(day()).await;
        let calls = alarm.calls();
        assert_eq!(calls.len(), 1);

        let (reason, context) = &calls[0];
        assert_eq!(reason, "draw retry budget exhausted");
        assert_eq!(context.try_count, 2);
        assert_eq!(context.lottery_number, Some(42));
        assert!(context.last_error.is_some());
    }

    #[tokio::test]
    async fn draw_state_query_failure_counts_toward_the_budget() {
        let contract = Arc::new(ScriptedContract::failing_state());
        let alarm = Arc::new(RecordingAlarm::default());
        let mut job = job(&contract, &alarm);

        job.run_once(day()).await;
        job.run_once(day()).await;

        assert_eq!(contract.draw_calls.load(Ordering::SeqCst), 0);
        assert_eq!(alarm.calls().len(), 1);
    }

    #[tokio::test]
    async fn lottery_number_fetch_failure_alarms_and_creates_no_record() {
        let contract = Arc::new(ScriptedContract::failing_number());
        let alarm = Arc::new(RecordingAlarm::default());
        let mut job = job(&contract, &alarm);

        job.run_once(day()).await;

        assert!(job.records.is_empty());
        let calls = alarm.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "failed to fetch current lottery number");
        assert_eq!(calls[0].1.lottery_number, None);
        assert_eq!(contract.state_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn draw_completed_elsewhere_is_recovered_without_resubmitting() {
        let contract = Arc::new(ScriptedContract::new(Some(DrawState::NotDrawn), false));
        let alarm = Arc::new(RecordingAlarm::default());
        let mut job = job(&contract, &alarm);

        // First run: submission fails after the state check.
        job.run_once(day()).await;
        assert!(!job.records[&day()].is_drawn);

        // Another actor completed the draw in the meantime.
        contract.set_state(Some(DrawState::Drawn));
        job.run_once(day()).await;

        assert!(job.records[&day()].is_drawn);
        assert_eq!(contract.draw_calls.load(Ordering::SeqCst), 1);
        assert!(alarm.calls().is_empty());
    }

    #[tokio::test]
    async fn records_are_tracked_per_day() {
        let contract = Arc::new(ScriptedContract::new(Some(DrawState::NotDrawn), true));
        let alarm = Arc::new(RecordingAlarm::default());
        let mut job = job(&contract, &alarm);

        let next_day = day().succ_opt().unwrap();
        job.run_once(day()).await;
        job.run_once(next_day).await;

        assert_eq!(contract.number_calls.load(Ordering::SeqCst), 2);
        assert!(job.records[&day()].is_drawn);
        assert!(job.records[&next_day].is_drawn);
    }
}
