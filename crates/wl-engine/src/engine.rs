//! The automation engine: a condition-gated periodic scheduler.
//!
//! Tasks are scanned on a fixed period. A due task passes through the gas
//! and yield gates ([`policy::decide`]) and is either executed through its
//! action's [`StrategyExecutor`], pushed back for a retry, or marked failed.
//! The scan loop starts lazily with the first task; [`AutomationEngine::stop`]
//! halts it, and the next created task (or an explicit
//! [`AutomationEngine::start`]) arms a fresh loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use wl_chain::executor::{ExecutionContext, ExecutorSet};
use wl_chain::gas::GasMonitor;
use wl_chain::pools::YieldMonitor;
use wl_core::config::EngineConfig;
use wl_core::types::{ActionKind, AgentTask, ParamsError, StrategyParams, TaskId, TaskStatus};

use crate::delegation::{self, DelegationError, SubAgentSpec};
use crate::events::{EngineEvent, EventBus, RescheduleReason};
use crate::policy::{self, Decision};
use crate::registry::TaskRegistry;
use crate::shutdown::ShutdownSignal;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    InvalidParams(#[from] ParamsError),
}

/// Tally of one scheduler pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub due: usize,
    pub executed: usize,
    pub rescheduled_gas: usize,
    pub rescheduled_yield: usize,
    pub failed: usize,
}

enum TaskOutcome {
    Executed,
    RescheduledGas,
    RescheduledYield,
    Failed,
}

// ---------------------------------------------------------------------------
// AutomationEngine
// ---------------------------------------------------------------------------

/// Cloneable handle to the scheduler. All clones share one task registry,
/// one event bus, and one scan loop.
#[derive(Clone)]
pub struct AutomationEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    registry: TaskRegistry,
    gas: Arc<dyn GasMonitor>,
    pools: Arc<dyn YieldMonitor>,
    executors: ExecutorSet,
    events: EventBus,
    scan_period: Duration,
    scan_loop: Mutex<Option<ScanLoop>>,
}

/// One live scan loop run. Each run owns its shutdown signal; stopping
/// takes the whole pair, so a trigger can only ever reach a loop that is
/// installed and listening.
struct ScanLoop {
    shutdown: ShutdownSignal,
    handle: JoinHandle<()>,
}

impl AutomationEngine {
    pub fn new(
        config: &EngineConfig,
        gas: Arc<dyn GasMonitor>,
        pools: Arc<dyn YieldMonitor>,
        executors: ExecutorSet,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                registry: TaskRegistry::new(),
                gas,
                pools,
                executors,
                events: EventBus::new(),
                scan_period: Duration::from_secs(config.scan_period_secs),
                scan_loop: Mutex::new(None),
            }),
        }
    }

    /// Register a validated task and lazily start the scan loop. The first
    /// execution is one full frequency interval out.
    pub fn create_task(
        &self,
        owner_id: impl Into<String>,
        params: StrategyParams,
        grant_ref: impl Into<String>,
    ) -> Result<TaskId, EngineError> {
        params.validate()?;
        let task = AgentTask::new(owner_id, params, grant_ref);
        let id = task.id.clone();
        info!(
            task_id = %id,
            owner_id = %task.owner_id,
            action = %task.params.action,
            frequency = %task.params.frequency,
            amount = %task.params.amount,
            "task created"
        );
        let owner_id = task.owner_id.clone();
        self.inner.registry.insert(task);
        self.inner.events.publish(EngineEvent::TaskCreated {
            task_id: id.clone(),
            owner_id,
        });
        self.ensure_started();
        Ok(id)
    }

    /// Spawn a specialized sub-agent under an existing task. The sub-agent
    /// is an ordinary task afterwards: same scan loop, same gates, its own
    /// derived grant reference.
    pub fn create_sub_agent(
        &self,
        parent_id: &TaskId,
        spec: SubAgentSpec,
    ) -> Result<TaskId, DelegationError> {
        let parent = self
            .inner
            .registry
            .get(parent_id)
            .ok_or_else(|| DelegationError::ParentNotFound(parent_id.clone()))?;
        let params = delegation::derive_params(&parent.params, &spec)?;
        let task = AgentTask::new_sub_agent(&parent, params);
        let id = task.id.clone();
        info!(
            task_id = %id,
            parent_task_id = %parent_id,
            name = %spec.name,
            specialization = %spec.specialization,
            allocation_percent = spec.allocation_percent,
            "sub-agent created"
        );
        self.inner.registry.insert(task);
        self.inner.events.publish(EngineEvent::SubAgentCreated {
            task_id: id.clone(),
            parent_task_id: parent_id.clone(),
            specialization: spec.specialization,
        });
        self.ensure_started();
        Ok(id)
    }

    /// Pause an active task. False when the task is missing or not active.
    pub fn pause_task(&self, id: &TaskId) -> bool {
        let paused = self.inner.registry.transition(id, TaskStatus::Paused);
        if paused {
            info!(task_id = %id, "task paused");
            self.inner
                .events
                .publish(EngineEvent::TaskPaused { task_id: id.clone() });
        }
        paused
    }

    /// Resume a paused task. The next run is a full interval out, so a
    /// task paused past its schedule does not fire the moment it resumes.
    pub fn resume_task(&self, id: &TaskId) -> bool {
        let now = Utc::now();
        let resumed = self
            .inner
            .registry
            .with_task_mut(id, |task| {
                if !task.status.can_transition_to(&TaskStatus::Active) {
                    return false;
                }
                task.status = TaskStatus::Active;
                task.next_execution_at = Some(now + task.params.frequency.interval());
                true
            })
            .unwrap_or(false);
        if resumed {
            info!(task_id = %id, "task resumed");
            self.inner
                .events
                .publish(EngineEvent::TaskResumed { task_id: id.clone() });
        }
        resumed
    }

    pub fn task(&self, id: &TaskId) -> Option<AgentTask> {
        self.inner.registry.get(id)
    }

    pub fn tasks_for_owner(&self, owner_id: &str) -> Vec<AgentTask> {
        self.inner.registry.for_owner(owner_id)
    }

    pub fn task_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Subscribe to engine events. Only events published after the call
    /// are delivered.
    pub fn subscribe(&self) -> flume::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.inner
            .scan_loop
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    /// Run one scheduler pass immediately, outside the periodic loop.
    pub async fn scan_once(&self) -> ScanReport {
        self.inner.run_scan().await
    }

    /// Start the scan loop now instead of waiting for the first task.
    /// Idempotent while a loop is live; after a stop it arms a fresh one.
    pub fn start(&self) {
        self.ensure_started();
    }

    fn ensure_started(&self) {
        let mut slot = self
            .inner
            .scan_loop
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            return;
        }

        // Fresh signal per run, subscribed before the spawn and installed
        // under the same lock stop() takes it from, so no stop can slip
        // between the spawn and the install.
        let shutdown = ShutdownSignal::new();
        let mut shutdown_rx = shutdown.subscribe();
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.scan_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; consume it so the
            // first scan lands one full period after start.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        inner.run_scan().await;
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });
        *slot = Some(ScanLoop { shutdown, handle });

        self.inner.events.publish(EngineEvent::EngineStarted);
        info!(
            scan_period_secs = self.inner.scan_period.as_secs(),
            "automation engine started"
        );
    }

    /// Stop the scan loop and wait for any in-flight pass to finish. Tasks
    /// stay registered; creating another task (or calling
    /// [`start`](Self::start)) arms a new loop.
    pub async fn stop(&self) {
        let stopped = self
            .inner
            .scan_loop
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let Some(scan_loop) = stopped else { return };

        scan_loop.shutdown.trigger();
        let _ = scan_loop.handle.await;
        self.inner.events.publish(EngineEvent::EngineStopped);
        info!("automation engine stopped");
    }
}

impl EngineInner {
    async fn run_scan(&self) -> ScanReport {
        let now = Utc::now();
        let due = self.registry.due_ids(now);
        let mut report = ScanReport {
            due: due.len(),
            ..ScanReport::default()
        };

        if report.due > 0 {
            debug!(due = report.due, "processing due tasks");
        }

        for id in due {
            let Some(task) = self.registry.get(&id) else {
                continue;
            };
            // A concurrent pause or failure since the listing skips it.
            if !task.is_due(now) {
                continue;
            }
            match self.process_task(task).await {
                TaskOutcome::Executed => report.executed += 1,
                TaskOutcome::RescheduledGas => report.rescheduled_gas += 1,
                TaskOutcome::RescheduledYield => report.rescheduled_yield += 1,
                TaskOutcome::Failed => report.failed += 1,
            }
        }

        report
    }

    async fn process_task(&self, task: AgentTask) -> TaskOutcome {
        let gas_price = self.gas.current_gas_price_gwei().await;
        let best_pool = if task.params.action == ActionKind::Yield {
            self.pools.best_pool(task.params.min_yield_percent).await
        } else {
            None
        };
        let now = Utc::now();

        match policy::decide(&task.params, gas_price, best_pool.as_ref(), now) {
            Decision::RescheduleGas { until } => {
                info!(
                    task_id = %task.id,
                    gas_price_gwei = gas_price,
                    ceiling_gwei = task.params.gas_ceiling_gwei,
                    "gas above ceiling, deferring"
                );
                self.registry.with_task_mut(&task.id, |t| t.reschedule(until));
                self.events.publish(EngineEvent::TaskRescheduled {
                    task_id: task.id.clone(),
                    reason: RescheduleReason::GasPrice,
                    until,
                });
                TaskOutcome::RescheduledGas
            }
            Decision::RescheduleYield { until } => {
                info!(
                    task_id = %task.id,
                    min_yield_percent = %task.params.min_yield_percent,
                    "no pool meets the yield floor, deferring"
                );
                self.registry.with_task_mut(&task.id, |t| t.reschedule(until));
                self.events.publish(EngineEvent::TaskRescheduled {
                    task_id: task.id.clone(),
                    reason: RescheduleReason::YieldFloor,
                    until,
                });
                TaskOutcome::RescheduledYield
            }
            Decision::Execute => {
                let context = ExecutionContext {
                    gas_price_gwei: gas_price,
                    best_pool,
                };
                let executor = self.executors.for_action(task.params.action);
                match executor.execute(&task, &context).await {
                    Ok(result) => {
                        let executed_at = Utc::now();
                        self.registry.with_task_mut(&task.id, |t| {
                            t.record_execution(executed_at, result.amount, result.yield_earned);
                        });
                        info!(
                            task_id = %task.id,
                            amount = %result.amount,
                            yield_earned = %result.yield_earned,
                            tx_ref = %result.tx_ref,
                            "task executed"
                        );
                        self.events.publish(EngineEvent::TaskExecuted {
                            task_id: task.id.clone(),
                            amount: result.amount,
                            yield_earned: result.yield_earned,
                            gas_used: result.gas_used,
                            tx_ref: result.tx_ref,
                        });
                        TaskOutcome::Executed
                    }
                    Err(e) => {
                        error!(task_id = %task.id, error = %e, "task execution failed");
                        self.registry.transition(&task.id, TaskStatus::Failed);
                        self.events.publish(EngineEvent::TaskFailed {
                            task_id: task.id.clone(),
                            error: e.to_string(),
                        });
                        TaskOutcome::Failed
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
