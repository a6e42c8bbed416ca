// src/scheduler.rs
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::updater::Updater;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval: Duration,
    /// Force only the first cycle (e.g. to resend after a restart).
    pub force_first: bool,
}

/// Tick every `cfg.interval` until `shutdown` resolves.
///
/// Each cycle is awaited to completion before the next tick is taken, so
/// cycles never overlap and a slow cycle delays the schedule instead of
/// piling up ticks. Shutdown is only observed between cycles. Returns the
/// updater so callers can inspect the ledger afterwards.
pub async fn run<F>(mut updater: Updater, cfg: SchedulerCfg, shutdown: F) -> Updater
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(cfg.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut force = cfg.force_first;
    let mut ticks: u64 = 0;
    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!(target: "scheduler", ticks, "shutdown requested; stopping");
                break;
            }
            _ = ticker.tick() => {
                ticks += 1;
                let outcome = updater.run_cycle(force).await;
                force = false;
                tracing::debug!(target: "scheduler", ticks, outcome = outcome.label(), "tick done");
            }
        }
    }
    updater
}

/// Spawn [`run`] on the current runtime.
pub fn spawn<F>(updater: Updater, cfg: SchedulerCfg, shutdown: F) -> JoinHandle<Updater>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(run(updater, cfg, shutdown))
}
