//! Periodic background jobs.
//!
//! A job runs once per tick of its trigger until it is stopped. A failed run
//! is logged and the loop waits for the next tick.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use domains::Result;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

#[async_trait]
pub trait PeriodicJob: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// One pass of the job. Returns the number of rows it removed.
    async fn run_once(&self) -> Result<u64>;
}

/// What makes a job run.
pub enum JobTrigger {
    /// Every `period`, first run one full period after spawning.
    Interval(Duration),
    /// Once per message; the loop ends when every sender is dropped.
    Manual(mpsc::Receiver<()>),
}

pub struct JobHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl JobHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the loop after the current run, if any, and waits for it.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            warn!(job = self.name, error = %err, "job task ended abnormally");
        }
    }
}

enum Ticker {
    Interval(tokio::time::Interval),
    Manual(mpsc::Receiver<()>),
}

impl Ticker {
    /// `false` once the trigger can no longer fire.
    async fn tick(&mut self) -> bool {
        match self {
            Ticker::Interval(interval) => {
                interval.tick().await;
                true
            }
            Ticker::Manual(rx) => rx.recv().await.is_some(),
        }
    }
}

pub fn spawn_job<J: PeriodicJob>(job: Arc<J>, trigger: JobTrigger) -> JobHandle {
    let name = job.name();
    let (shutdown, mut stop_rx) = watch::channel(false);

    let mut ticker = match trigger {
        JobTrigger::Interval(period) => {
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(job = name, period_secs = period.as_secs(), "job scheduled");
            Ticker::Interval(interval)
        }
        JobTrigger::Manual(rx) => Ticker::Manual(rx),
    };

    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = stop_rx.changed() => break,
                fired = ticker.tick() => {
                    if !fired {
                        break;
                    }
                    match job.run_once().await {
                        Ok(removed) => debug!(job = name, removed, "job run finished"),
                        Err(err) => warn!(job = name, error = %err, "job run failed"),
                    }
                }
            }
        }
        debug!(job = name, "job stopped");
    });

    JobHandle {
        name,
        shutdown,
        task,
    }
}
