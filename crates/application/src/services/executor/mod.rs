//! Scenario execution engine
//!
//! Runs an execution plan against a fault injector and a metric provider.
//! Each scenario run fans its chains out concurrently behind a shared start
//! barrier, joins them all, then reverts anything still live before the
//! report is assembled.

mod chain;
mod dispatch;
mod ledger;
mod report;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use domain::{ExecutionPlan, ScenarioRun};
use tokio::sync::{Barrier, mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout};
use tracing::{error, info, instrument, warn};

use self::chain::{ChainContext, run_chain};
use self::dispatch::FaultDispatcher;
use self::ledger::FaultLedger;
pub use self::report::{
    ChainReport, ChainStatus, DirectiveRecord, DirectiveStatus, RunReport, RunStatus,
    ScenarioReport,
};
use crate::error::ApplicationError;
use crate::ports::{FaultInjectorPort, MetricPort};

/// Default budget for a single backend call
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Default wait before the one revert retry
const DEFAULT_REVERT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Timing knobs of the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Bound on every resolve, apply, revert, and metric query
    pub call_timeout: Duration,
    pub revert_retry_backoff: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            revert_retry_backoff: DEFAULT_REVERT_RETRY_BACKOFF,
        }
    }
}

/// Executes plans; construct one per run with explicit backends
pub struct ScenarioExecutor {
    config: ExecutorConfig,
    injector: Arc<dyn FaultInjectorPort>,
    metrics: Arc<dyn MetricPort>,
}

impl std::fmt::Debug for ScenarioExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioExecutor")
            .field("config", &self.config)
            .field("injector", &self.injector.name())
            .field("metrics", &"<MetricPort>")
            .finish()
    }
}

impl ScenarioExecutor {
    #[must_use]
    pub fn new(injector: Arc<dyn FaultInjectorPort>, metrics: Arc<dyn MetricPort>) -> Self {
        Self {
            config: ExecutorConfig::default(),
            injector,
            metrics,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub const fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Confirm the fault injector is reachable before anything is applied
    ///
    /// An unreachable metric provider is only logged: conditions degrade to
    /// `skipped-condition-error` rather than stopping the run.
    #[instrument(skip(self), fields(injector = self.injector.name()))]
    pub async fn preflight(&self) -> Result<(), ApplicationError> {
        let budget = self.config.call_timeout;
        let injector_up = timeout(budget, self.injector.is_available())
            .await
            .unwrap_or(false);
        if !injector_up {
            return Err(ApplicationError::BackendUnavailable(format!(
                "fault injector `{}` is not reachable",
                self.injector.name()
            )));
        }

        let metrics_up = timeout(budget, self.metrics.is_available())
            .await
            .unwrap_or(false);
        if !metrics_up {
            warn!("Metric provider unreachable, conditions will be skipped");
        }
        Ok(())
    }

    /// Run every scenario in plan order
    ///
    /// Once `cancel` is set the current run is cleaned up and the remaining
    /// runs are listed as not started.
    #[instrument(skip_all, fields(runs = plan.runs.len()))]
    pub async fn run_plan(&self, plan: &ExecutionPlan, cancel: watch::Receiver<bool>) -> RunReport {
        let mut scenarios = Vec::with_capacity(plan.runs.len());
        let mut not_started = Vec::new();
        for run in &plan.runs {
            let stop = *cancel.borrow();
            if stop {
                not_started.push(run.name.clone());
                continue;
            }
            scenarios.push(self.run_scenario(run, cancel.clone()).await);
        }
        let cancelled = *cancel.borrow();
        let report = RunReport::new(scenarios, not_started, cancelled);
        info!(
            status = report.status.as_str(),
            handles = report.handles_created(),
            reverts = report.revert_attempts(),
            cancelled,
            "Plan finished"
        );
        report
    }

    /// Run one scenario to a fully reverted end state
    #[instrument(skip_all, fields(scenario = %run.name, chains = run.chains.len()))]
    pub async fn run_scenario(
        &self,
        run: &ScenarioRun,
        cancel: watch::Receiver<bool>,
    ) -> ScenarioReport {
        let started_at = Utc::now();
        let t0 = Instant::now();
        let dispatcher = FaultDispatcher::new(
            Arc::clone(&self.injector),
            Arc::clone(&self.metrics),
            self.config,
        );
        let (events, mut inbox) = mpsc::unbounded_channel();
        let ctx = ChainContext {
            dispatcher: dispatcher.clone(),
            events,
            cancel: cancel.clone(),
            t0,
        };

        let barrier = Arc::new(Barrier::new(run.chains.len()));
        let mut tasks = JoinSet::new();
        let mut spawned = HashMap::with_capacity(run.chains.len());
        for chain in &run.chains {
            let task = tasks.spawn(run_chain(
                ctx.clone(),
                chain.clone(),
                Some(Arc::clone(&barrier)),
            ));
            spawned.insert(task.id(), (chain.id.clone(), chain.label.clone()));
        }
        // Chains hold the only senders from here on
        drop(ctx);
        info!("Chains started");

        let mut ledger = FaultLedger::default();
        let mut chains: Vec<ChainReport> = Vec::with_capacity(run.chains.len());
        loop {
            tokio::select! {
                Some(event) = inbox.recv() => ledger.record(event),
                joined = tasks.join_next_with_id() => match joined {
                    Some(Ok((_, reports))) => chains.extend(reports),
                    Some(Err(err)) => {
                        let (id, label) = spawned
                            .remove(&err.id())
                            .unwrap_or_else(|| ("?".to_string(), String::new()));
                        error!(chain = %id, error = %err, "Chain task failed");
                        chains.push(ChainReport::lost(id, label, format!("chain task failed: {err}")));
                    },
                    None => break,
                },
            }
        }
        while let Ok(event) = inbox.try_recv() {
            ledger.record(event);
        }

        let outstanding = ledger.drain_newest_first();
        if !outstanding.is_empty() {
            info!(count = outstanding.len(), "Reverting outstanding faults");
        }
        for live in outstanding {
            ledger.note_revert_attempt();
            let result = dispatcher.revert_with_retry(&live.handle).await;
            if let Err(error) = &result {
                warn!(handle = %live.handle.id, %error, "Fault may still be live");
            }
            let at_ms = u64::try_from(t0.elapsed().as_millis()).unwrap_or(u64::MAX);
            settle_record(&mut chains, &live, result.map_err(|e| e.to_string()), at_ms);
        }

        chains.sort_by_key(ChainReport::sort_key);
        let status = RunStatus::from_chains(&chains);
        let cancelled = *cancel.borrow();
        let report = ScenarioReport {
            name: run.name.clone(),
            declared: run.declared,
            status,
            cancelled,
            started_at,
            elapsed_ms: u64::try_from(t0.elapsed().as_millis()).unwrap_or(u64::MAX),
            chains,
            handles_created: ledger.created(),
            revert_attempts: ledger.revert_attempts(),
        };
        info!(
            status = status.as_str(),
            handles = report.handles_created,
            reverts = report.revert_attempts,
            elapsed_ms = report.elapsed_ms,
            "Scenario finished"
        );
        report
    }
}

/// Settle the record a force-reverted handle belongs to
///
/// A chain whose task died left no records behind; the handle is then added
/// to that chain's placeholder so it is still accounted for.
fn settle_record(
    chains: &mut Vec<ChainReport>,
    live: &ledger::LiveFault,
    outcome: Result<(), String>,
    at_ms: u64,
) {
    if let Some(record) = chains
        .iter_mut()
        .find(|chain| chain.id == live.chain)
        .and_then(|chain| chain.records.get_mut(live.record))
    {
        record.settle(outcome, at_ms);
        return;
    }

    let mut record = DirectiveRecord::applied(
        format!("{}: {}", live.handle.target, live.handle.fault),
        vec![live.handle.target.to_string()],
        live.handle.id,
        0,
    );
    record.applied_at_ms = None;
    record.settle(outcome, at_ms);
    match chains.iter_mut().find(|chain| chain.id == live.chain) {
        Some(chain) => chain.records.push(record),
        None => {
            let mut chain = ChainReport::lost(live.chain.clone(), String::new(), "chain task failed");
            chain.records.push(record);
            chains.push(chain);
        },
    }
}
