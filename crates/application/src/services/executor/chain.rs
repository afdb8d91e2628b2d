//! Directive chain runner
//!
//! A chain executes its steps in order and owns the timers of the handles it
//! created. It never issues two calls at once, so a target only ever sees one
//! outstanding apply or revert from its chain.

use std::future::pending;
use std::sync::Arc;

use domain::{
    ConditionSubject, Directive, DirectiveChain, FaultDirective, FaultHandle, FaultTarget,
    ForkDirective, GuardDirective, Subject, Target, TargetSelector,
};
use futures::future::{BoxFuture, FutureExt, join_all};
use tokio::sync::{Barrier, mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use super::dispatch::FaultDispatcher;
use super::ledger::LedgerEvent;
use super::report::{ChainReport, ChainStatus, DirectiveRecord};
use crate::error::ApplicationError;

/// Shared by every chain of one scenario run
#[derive(Debug, Clone)]
pub(super) struct ChainContext {
    pub dispatcher: FaultDispatcher,
    pub events: mpsc::UnboundedSender<LedgerEvent>,
    pub cancel: watch::Receiver<bool>,
    pub t0: Instant,
}

impl ChainContext {
    fn offset_ms(&self) -> u64 {
        u64::try_from(self.t0.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Why a chain stopped before its last step
#[derive(Debug)]
enum Halt {
    Aborted(String),
    Cancelled,
}

impl Halt {
    fn reason(&self) -> String {
        match self {
            Self::Aborted(error) => format!("chain aborted: {error}"),
            Self::Cancelled => "run cancelled".to_string(),
        }
    }
}

/// A live handle with its pending auto-revert
#[derive(Debug)]
struct Owned {
    handle: FaultHandle,
    record: usize,
    /// None means it stays until the end of the run
    deadline: Option<Instant>,
}

/// Resolve once `cancel` flips to true; never resolve if the sender is gone
pub(super) async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let closed = cancel.wait_for(|flag| *flag).await.is_err();
    if closed {
        pending::<()>().await;
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending::<()>().await,
    }
}

/// Run a chain to completion, returning its report followed by the reports
/// of any scenarios it forked
pub(super) fn run_chain(
    ctx: ChainContext,
    chain: DirectiveChain,
    barrier: Option<Arc<Barrier>>,
) -> BoxFuture<'static, Vec<ChainReport>> {
    async move {
        if let Some(barrier) = barrier {
            barrier.wait().await;
        }
        debug!(chain = %chain.id, label = %chain.label, "Chain started");

        let mut run = ChainRun::new(ctx, chain.id.clone());
        let outcome = match run.execute(&chain.steps).await {
            Ok(()) => run.wait_for_timers().await,
            Err(halt) => Err(halt),
        };
        run.finish(chain, outcome).await
    }
    .boxed()
}

struct ChainRun {
    ctx: ChainContext,
    id: String,
    records: Vec<DirectiveRecord>,
    owned: Vec<Owned>,
    forked: Vec<ChainReport>,
}

impl ChainRun {
    fn new(ctx: ChainContext, id: String) -> Self {
        Self {
            ctx,
            id,
            records: Vec::new(),
            owned: Vec::new(),
            forked: Vec::new(),
        }
    }

    fn execute<'a>(&'a mut self, steps: &'a [Directive]) -> BoxFuture<'a, Result<(), Halt>> {
        async move {
            for (index, step) in steps.iter().enumerate() {
                self.fire_due().await;
                let stop = *self.ctx.cancel.borrow();
                if stop {
                    self.skip_all(&steps[index..], &Halt::Cancelled);
                    return Err(Halt::Cancelled);
                }
                let result = match step {
                    Directive::Fault(directive) => self.apply(directive).await,
                    Directive::Guard(guard) => self.guard(guard).await,
                    Directive::Fork(fork) => self.fork(fork).await,
                };
                if let Err(halt) = result {
                    self.skip_all(&steps[index + 1..], &halt);
                    return Err(halt);
                }
            }
            Ok(())
        }
        .boxed()
    }

    async fn apply(&mut self, directive: &FaultDirective) -> Result<(), Halt> {
        let description = directive.to_string();
        let placements = match self.resolve(&directive.subject).await {
            Ok(placements) => placements,
            Err(error) => {
                warn!(chain = %self.id, %description, %error, "Target resolution failed");
                self.records.push(DirectiveRecord::failed_to_apply(
                    description,
                    Vec::new(),
                    error.to_string(),
                ));
                return Err(Halt::Aborted(error.to_string()));
            },
        };

        for placement in placements {
            let targets = vec![placement.to_string()];
            match self.ctx.dispatcher.apply(&placement, &directive.fault).await {
                Ok(handle) => {
                    // The hold is measured from apply completion
                    let applied_at = Instant::now();
                    let record = self.records.len();
                    if handle.is_reversible() {
                        let _ = self.ctx.events.send(LedgerEvent::Applied {
                            handle: handle.clone(),
                            chain: self.id.clone(),
                            record,
                        });
                    }
                    info!(
                        chain = %self.id,
                        target = %placement,
                        fault = %directive.fault,
                        handle = %handle.id,
                        "Fault applied"
                    );
                    self.records.push(DirectiveRecord::applied(
                        description.clone(),
                        targets,
                        handle.id,
                        self.ctx.offset_ms(),
                    ));
                    if handle.is_reversible() {
                        let deadline = directive.hold.and_then(|hold| {
                            let deadline = hold
                                .to_duration()
                                .and_then(|held| applied_at.checked_add(held));
                            if deadline.is_none() {
                                warn!(chain = %self.id, %hold, "Hold out of range, kept until run end");
                            }
                            deadline
                        });
                        self.owned.push(Owned {
                            handle,
                            record,
                            deadline,
                        });
                    }
                },
                Err(error) => {
                    warn!(chain = %self.id, target = %placement, %error, "Fault apply failed");
                    self.records.push(DirectiveRecord::failed_to_apply(
                        description,
                        targets,
                        error.to_string(),
                    ));
                    return Err(Halt::Aborted(error.to_string()));
                },
            }
        }
        Ok(())
    }

    /// Turn a subject into the placements the injector applies to
    async fn resolve(&self, subject: &Subject) -> Result<Vec<FaultTarget>, ApplicationError> {
        let dispatcher = &self.ctx.dispatcher;
        match subject {
            Subject::Node { service } => {
                let targets = dispatcher
                    .resolve(&TargetSelector::Service(service.clone()))
                    .await?;
                Ok(targets.into_iter().map(FaultTarget::Node).collect())
            },
            Subject::Link { from, to } => {
                let sources = dispatcher
                    .resolve(&TargetSelector::Service(from.clone()))
                    .await?;
                let peers: Vec<Target> = dispatcher
                    .resolve(&TargetSelector::Service(to.clone()))
                    .await?;
                Ok(sources
                    .into_iter()
                    .map(|source| FaultTarget::Link {
                        from: source,
                        to: peers.clone(),
                    })
                    .collect())
            },
            Subject::Partition { left, right } => {
                let left_targets = dispatcher
                    .resolve(&TargetSelector::Filter(left.clone()))
                    .await?;
                let right_targets = dispatcher
                    .resolve(&TargetSelector::Filter(right.clone()))
                    .await?;
                Ok(vec![FaultTarget::Partition {
                    left_filter: left.clone(),
                    right_filter: right.clone(),
                    left: left_targets,
                    right: right_targets,
                }])
            },
        }
    }

    async fn guard(&mut self, guard: &GuardDirective) -> Result<(), Halt> {
        let condition = &guard.condition;
        let description = format!("if {condition}");
        #[allow(clippy::cast_precision_loss)]
        let observed = match &condition.subject {
            ConditionSubject::Bound { value, .. } => Ok(*value as f64),
            ConditionSubject::Metric { name } => self.ctx.dispatcher.query(name).await,
        };

        let observed = match observed {
            Ok(value) => value,
            Err(error) => {
                warn!(chain = %self.id, %condition, %error, "Condition skipped");
                self.records
                    .push(DirectiveRecord::condition_error(description, error.to_string()));
                return Ok(());
            },
        };

        let holds = condition.operator.evaluate(observed, condition.threshold);
        debug!(chain = %self.id, %condition, observed, holds, "Condition evaluated");
        let branch = if holds {
            Some(("then", &guard.then_branch))
        } else {
            guard.else_branch.as_ref().map(|steps| ("else", steps))
        };
        match branch {
            Some((name, steps)) => {
                self.records.push(DirectiveRecord::branch_taken(
                    description,
                    format!("{name} branch (observed {observed})"),
                ));
                self.execute(steps).await
            },
            None => {
                self.records.push(DirectiveRecord::skipped(
                    description,
                    format!("condition false (observed {observed})"),
                ));
                Ok(())
            },
        }
    }

    /// Run a nested scenario's chains concurrently while this chain's own
    /// timers keep firing
    async fn fork(&mut self, fork: &ForkDirective) -> Result<(), Halt> {
        info!(chain = %self.id, scenario = %fork.scenario, chains = fork.chains.len(), "Scenario forked");
        let children = join_all(
            fork.chains
                .iter()
                .cloned()
                .map(|chain| run_chain(self.ctx.clone(), chain, None)),
        );
        tokio::pin!(children);

        loop {
            tokio::select! {
                reports = &mut children => {
                    self.forked.extend(reports.into_iter().flatten());
                    let stop = *self.ctx.cancel.borrow();
                    return if stop { Err(Halt::Cancelled) } else { Ok(()) };
                }
                () = sleep_until_deadline(self.next_deadline()) => self.fire_due().await,
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.owned.iter().filter_map(|owned| owned.deadline).min()
    }

    /// Revert every handle whose hold has elapsed, earliest deadline first
    async fn fire_due(&mut self) {
        let now = Instant::now();
        let mut due: Vec<Owned> = Vec::new();
        let mut index = 0;
        while index < self.owned.len() {
            if self.owned[index].deadline.is_some_and(|deadline| deadline <= now) {
                due.push(self.owned.remove(index));
            } else {
                index += 1;
            }
        }
        due.sort_by_key(|owned| owned.deadline);
        for owned in due {
            self.revert(owned).await;
        }
    }

    /// Wait until every timed handle has been reverted
    async fn wait_for_timers(&mut self) -> Result<(), Halt> {
        loop {
            self.fire_due().await;
            let Some(deadline) = self.next_deadline() else {
                return Ok(());
            };
            let mut cancel = self.ctx.cancel.clone();
            tokio::select! {
                () = sleep_until(deadline) => {}
                () = cancelled(&mut cancel) => return Err(Halt::Cancelled),
            }
        }
    }

    async fn revert(&mut self, owned: Owned) {
        let result = self.ctx.dispatcher.revert_with_retry(&owned.handle).await;
        match &result {
            Ok(()) => info!(chain = %self.id, handle = %owned.handle.id, "Fault reverted"),
            Err(error) => {
                warn!(chain = %self.id, handle = %owned.handle.id, %error, "Fault may still be live");
            },
        }
        let at_ms = self.ctx.offset_ms();
        if let Some(record) = self.records.get_mut(owned.record) {
            record.settle(result.map_err(|e| e.to_string()), at_ms);
        }
        let _ = self.ctx.events.send(LedgerEvent::Settled {
            id: owned.handle.id,
        });
    }

    fn skip_all(&mut self, steps: &[Directive], halt: &Halt) {
        let reason = halt.reason();
        for step in steps {
            let description = match step {
                Directive::Fault(directive) => directive.to_string(),
                Directive::Guard(guard) => format!("if {}", guard.condition),
                Directive::Fork(fork) => format!("scenario {}", fork.scenario),
            };
            self.records
                .push(DirectiveRecord::skipped(description, reason.clone()));
        }
    }

    async fn finish(mut self, chain: DirectiveChain, outcome: Result<(), Halt>) -> Vec<ChainReport> {
        let (status, error) = match outcome {
            Ok(()) => (ChainStatus::Completed, None),
            Err(Halt::Aborted(error)) => {
                // Newest first; the coordinator only sees what is left
                while let Some(owned) = self.owned.pop() {
                    self.revert(owned).await;
                }
                (ChainStatus::Aborted, Some(error))
            },
            // Left to the coordinator, which reverts everything still live
            Err(Halt::Cancelled) => (ChainStatus::Cancelled, None),
        };
        debug!(chain = %chain.id, ?status, "Chain finished");

        let mut reports = Vec::with_capacity(1 + self.forked.len());
        reports.push(ChainReport {
            id: chain.id,
            label: chain.label,
            status,
            error,
            records: self.records,
        });
        reports.extend(self.forked);
        reports
    }
}
