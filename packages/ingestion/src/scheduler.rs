//! Fixed-interval background runner.
//!
//! One dedicated task invokes `run_once` immediately and then on every
//! interval tick. Cancellation is cooperative: the stop token is checked
//! around the sleep, never mid-run.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::Engine;
use crate::types::IngestionRunResult;

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    pub interval_seconds: Option<u64>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_run: Option<IngestionRunResult>,
}

#[derive(Default)]
struct SchedulerState {
    interval: Option<Duration>,
    last_run_at: Option<DateTime<Utc>>,
    last_run: Option<IngestionRunResult>,
}

pub struct IngestScheduler {
    engine: Arc<Engine>,
    state: Arc<Mutex<SchedulerState>>,
    task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl IngestScheduler {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            state: Arc::new(Mutex::new(SchedulerState::default())),
            task: Mutex::new(None),
        }
    }

    /// Start the periodic loop, replacing any previous one.
    pub async fn start(&self, interval: Duration, adapter_names: Option<Vec<String>>) {
        self.stop().await;

        let token = CancellationToken::new();
        let task_token = token.clone();
        let engine = self.engine.clone();
        let state = self.state.clone();

        {
            let mut locked = state.lock().expect("scheduler state lock poisoned");
            locked.interval = Some(interval);
        }

        let handle = tokio::spawn(async move {
            loop {
                let result = engine.run_once(adapter_names.as_deref()).await;
                {
                    let mut locked = state.lock().expect("scheduler state lock poisoned");
                    locked.last_run_at = Some(Utc::now());
                    match result {
                        Ok(run) => locked.last_run = Some(run),
                        Err(e) => warn!(error = %e, "scheduled run failed"),
                    }
                }

                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }
            info!("scheduler loop stopped");
        });

        *self.task.lock().expect("scheduler task lock poisoned") = Some((token, handle));
    }

    /// Signal the loop to stop and wait for it to wind down.
    pub async fn stop(&self) {
        let task = self
            .task
            .lock()
            .expect("scheduler task lock poisoned")
            .take();
        if let Some((token, handle)) = task {
            token.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "scheduler task did not shut down cleanly");
            }
        }
    }

    pub fn status(&self) -> SchedulerStatus {
        let running = self
            .task
            .lock()
            .expect("scheduler task lock poisoned")
            .as_ref()
            .map(|(_, handle)| !handle.is_finished())
            .unwrap_or(false);
        let state = self.state.lock().expect("scheduler state lock poisoned");
        SchedulerStatus {
            running,
            interval_seconds: state.interval.map(|i| i.as_secs()),
            last_run_at: state.last_run_at,
            last_run: state.last_run.clone(),
        }
    }
}
