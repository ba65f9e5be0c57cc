//! Keeper process for a daily on-chain lottery draw.
//!
//! A cron schedule drives a per-day orchestrator that reads the
//! contract's draw state and submits the draw transaction at most once
//! per day, with bounded retries and alarm escalation on repeated
//! failure. See the module docs on [`orchestrator`] for the state
//! machine and [`gateway`] for the chain access layer.

use tracing::info;

mod alarm;
pub mod config;
mod contract;
mod error;
mod gateway;
mod orchestrator;
mod revert;
mod scheduler;

pub use config::{Ctx, Env, setup_tracing};

use crate::alarm::LogAlarm;
use crate::contract::DailyLotteryContract;
use crate::orchestrator::DrawJob;
use crate::scheduler::Scheduler;

/// Wires the contract gateway, orchestrator, and scheduler, then runs
/// until the schedule is exhausted or a shutdown signal arrives.
pub async fn launch(ctx: Ctx) -> anyhow::Result<()> {
    let contract = DailyLotteryContract::new(ctx.lottery)?;
    let job = DrawJob::new(contract, LogAlarm);
    let scheduler = Scheduler::new(ctx.draw_schedule);

    tokio::select! {
        () = scheduler.run(job) => {
            info!("Scheduler stopped");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal, shutting down gracefully...");
        }
    }

    Ok(())
}
