//! Concurrent task store.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use wl_core::types::{AgentTask, TaskId, TaskStatus};

/// Shared store of every task the engine owns, keyed by id.
///
/// Tasks are never removed: terminal tasks stay behind as the audit
/// record of what ran and what failed.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: DashMap<TaskId, AgentTask>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
        }
    }

    pub fn insert(&self, task: AgentTask) {
        self.tasks.insert(task.id.clone(), task);
    }

    /// Snapshot of a task by id.
    pub fn get(&self, id: &TaskId) -> Option<AgentTask> {
        self.tasks.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// All tasks belonging to `owner_id`, ordered by id. Ids embed their
    /// creation timestamp, so this is creation order for distinct millis.
    pub fn for_owner(&self, owner_id: &str) -> Vec<AgentTask> {
        let mut tasks: Vec<AgentTask> = self
            .tasks
            .iter()
            .filter(|entry| entry.owner_id == owner_id)
            .map(|entry| entry.value().clone())
            .collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        tasks
    }

    /// Ids of tasks due at `now`, ordered by id for a deterministic pass.
    pub fn due_ids(&self, now: DateTime<Utc>) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self
            .tasks
            .iter()
            .filter(|entry| entry.is_due(now))
            .map(|entry| entry.id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Run `f` against the stored task under its shard lock. The closure
    /// must not touch the registry again or it may deadlock.
    pub fn with_task_mut<R>(&self, id: &TaskId, f: impl FnOnce(&mut AgentTask) -> R) -> Option<R> {
        self.tasks.get_mut(id).map(|mut entry| f(&mut entry))
    }

    /// Move a task to `to` if the status graph allows it. Returns false
    /// for unknown tasks and refused transitions.
    pub fn transition(&self, id: &TaskId, to: TaskStatus) -> bool {
        self.with_task_mut(id, |task| {
            if task.status.can_transition_to(&to) {
                task.status = to;
                true
            } else {
                false
            }
        })
        .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use wl_core::types::{
        ActionKind, Advisory, Asset, Complexity, Frequency, MarketContext, Protocol, RiskLevel,
        Sentiment, StrategyParams, Volatility,
    };

    fn params() -> StrategyParams {
        StrategyParams {
            amount: dec!(100),
            asset: Asset::Usdc,
            protocol: Protocol::Aave,
            frequency: Frequency::Weekly,
            gas_ceiling_gwei: 25,
            min_yield_percent: dec!(2.5),
            action: ActionKind::Yield,
            advisory: Advisory {
                confidence: 80,
                risk_level: RiskLevel::Low,
                complexity: Complexity::Simple,
                optimizations: vec![],
                market_context: MarketContext {
                    sentiment: Sentiment::Neutral,
                    volatility: Volatility::Medium,
                    recommendation: "hold".to_string(),
                },
            },
        }
    }

    fn task_for(owner: &str) -> AgentTask {
        AgentTask::new(owner, params(), "grant-1")
    }

    #[test]
    fn insert_and_get_round_trip() {
        let registry = TaskRegistry::new();
        let task = task_for("user-1");
        let id = task.id.clone();

        registry.insert(task);

        assert!(registry.contains(&id));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&id).unwrap().owner_id, "user-1");
    }

    #[test]
    fn get_unknown_id_is_none() {
        let registry = TaskRegistry::new();
        assert!(registry.get(&TaskId::from("task_0_missing")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn for_owner_filters_and_sorts() {
        let registry = TaskRegistry::new();
        let mine_a = task_for("user-1");
        let mine_b = task_for("user-1");
        let other = task_for("user-2");
        registry.insert(mine_b.clone());
        registry.insert(other);
        registry.insert(mine_a.clone());

        let tasks = registry.for_owner("user-1");

        assert_eq!(tasks.len(), 2);
        assert!(tasks[0].id <= tasks[1].id);
        assert!(tasks.iter().all(|t| t.owner_id == "user-1"));
    }

    #[test]
    fn due_ids_skips_future_and_paused_tasks() {
        let registry = TaskRegistry::new();
        let now = Utc::now();

        let mut due = task_for("user-1");
        due.next_execution_at = Some(now - Duration::minutes(1));
        let due_id = due.id.clone();

        let future = task_for("user-1");

        let mut paused = task_for("user-1");
        paused.next_execution_at = Some(now - Duration::minutes(1));
        paused.status = TaskStatus::Paused;

        registry.insert(due);
        registry.insert(future);
        registry.insert(paused);

        assert_eq!(registry.due_ids(now), vec![due_id]);
    }

    #[test]
    fn with_task_mut_applies_closure() {
        let registry = TaskRegistry::new();
        let task = task_for("user-1");
        let id = task.id.clone();
        registry.insert(task);

        let count = registry.with_task_mut(&id, |t| {
            t.execution_count += 1;
            t.execution_count
        });

        assert_eq!(count, Some(1));
        assert_eq!(registry.get(&id).unwrap().execution_count, 1);
    }

    #[test]
    fn with_task_mut_unknown_id_is_none() {
        let registry = TaskRegistry::new();
        let touched = registry.with_task_mut(&TaskId::from("task_0_missing"), |_| ());
        assert!(touched.is_none());
    }

    #[test]
    fn transition_follows_status_graph() {
        let registry = TaskRegistry::new();
        let task = task_for("user-1");
        let id = task.id.clone();
        registry.insert(task);

        assert!(registry.transition(&id, TaskStatus::Paused));
        assert!(registry.transition(&id, TaskStatus::Active));
        assert!(registry.transition(&id, TaskStatus::Failed));
        assert_eq!(registry.get(&id).unwrap().status, TaskStatus::Failed);
    }

    #[test]
    fn transition_refuses_invalid_moves() {
        let registry = TaskRegistry::new();
        let task = task_for("user-1");
        let id = task.id.clone();
        registry.insert(task);

        assert!(registry.transition(&id, TaskStatus::Paused));
        // Paused tasks cannot complete without resuming first.
        assert!(!registry.transition(&id, TaskStatus::Completed));
        assert_eq!(registry.get(&id).unwrap().status, TaskStatus::Paused);
    }

    #[test]
    fn transition_unknown_id_is_false() {
        let registry = TaskRegistry::new();
        assert!(!registry.transition(&TaskId::from("task_0_missing"), TaskStatus::Paused));
    }
}
