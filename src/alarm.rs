//! Escalation channel for draw failures.
//!
//! The orchestrator calls the sink when the current lottery number
//! cannot be fetched or when the retry budget is exhausted without a
//! successful draw. Delivery beyond the log (paging, messaging) is not
//! wired up yet; implementations plug in behind [`AlarmSink`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::error;

/// What was known about the day's draw when the alarm fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AlarmContext {
    pub(crate) day: NaiveDate,
    pub(crate) lottery_number: Option<u64>,
    pub(crate) try_count: u8,
    pub(crate) last_error: Option<String>,
}

#[async_trait]
pub(crate) trait AlarmSink: Send + Sync {
    async fn notify(&self, reason: &str, context: &AlarmContext);
}

/// Log-only alarm sink.
pub(crate) struct LogAlarm;

#[async_trait]
impl AlarmSink for LogAlarm {
    async fn notify(&self, reason: &str, context: &AlarmContext) {
        error!(
            day = %context.day,
            lottery_number = context.lottery_number,
            try_count = context.try_count,
            last_error = context.last_error.as_deref(),
            "ALARM: {reason}"
        );
    }
}

#[async_trait]
impl<T: AlarmSink> AlarmSink for Arc<T> {
    async fn notify(&self, reason: &str, context: &AlarmContext) {
        (**self).notify(reason, context).await;
    }
}
