use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use wl_core::types::{ActionKind, AgentTask, TaskId};

use crate::pools::PoolInfo;

// Synthetic gas figures per strategy, carried over from the product's
// economic model.
const YIELD_GAS_USED: u64 = 150_000;
const SWAP_GAS_USED: u64 = 120_000;
const DCA_GAS_USED: u64 = 180_000;

// ---------------------------------------------------------------------------
// ExecutionContext / ExecutionResult / ExecutionError
// ---------------------------------------------------------------------------

/// Snapshot of the gating inputs the scheduler already fetched; executors
/// must not re-query monitors.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub gas_price_gwei: f64,
    /// Present when the yield gate ran and found a qualifying pool.
    pub best_pool: Option<PoolInfo>,
}

/// Uniform outcome of one strategy execution. The economic model only; the
/// transaction reference points at the external submitter's record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub amount: Decimal,
    pub gas_used: u64,
    pub yield_earned: Decimal,
    pub tx_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionError {
    #[error("no qualifying yield pool available")]
    PoolUnavailable,
    #[error("transaction submission failed: {0}")]
    Submission(String),
    #[error("yield accrual overflow: {amount} at {apy_percent}% APY")]
    Overflow {
        amount: Decimal,
        apy_percent: Decimal,
    },
}

// ---------------------------------------------------------------------------
// StrategyExecutor trait
// ---------------------------------------------------------------------------

/// One strategy handler. The scheduler dispatches on
/// [`action`](Self::action) after the gating decision passes.
#[async_trait]
pub trait StrategyExecutor: Send + Sync {
    fn action(&self) -> ActionKind;

    async fn execute(
        &self,
        task: &AgentTask,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ExecutionError>;
}

/// Opaque 0x-prefixed reference for the external transaction submitter.
fn synthetic_tx_ref() -> String {
    format!(
        "0x{}{}",
        Uuid::new_v4().as_simple(),
        Uuid::new_v4().as_simple()
    )
}

/// One week's slice of a pool's quoted annual rate. This is the documented
/// accrual model: each execution earns `amount * apy / 100 / 52`. `None`
/// when the product exceeds the `Decimal` range; task amounts have no
/// upper bound, so the multiply must not be allowed to panic.
pub fn weekly_yield(amount: Decimal, apy_percent: Decimal) -> Option<Decimal> {
    amount
        .checked_mul(apy_percent)?
        .checked_div(dec!(100))?
        .checked_div(dec!(52))
}

// ---------------------------------------------------------------------------
// YieldDepositExecutor
// ---------------------------------------------------------------------------

/// Deposit into the best qualifying lending pool. Requires the yield gate's
/// pool in the context.
#[derive(Debug, Default)]
pub struct YieldDepositExecutor;

#[async_trait]
impl StrategyExecutor for YieldDepositExecutor {
    fn action(&self) -> ActionKind {
        ActionKind::Yield
    }

    async fn execute(
        &self,
        task: &AgentTask,
        ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ExecutionError> {
        let pool = ctx.best_pool.as_ref().ok_or(ExecutionError::PoolUnavailable)?;
        let amount = task.params.amount;
        let yield_earned =
            weekly_yield(amount, pool.apy).ok_or(ExecutionError::Overflow {
                amount,
                apy_percent: pool.apy,
            })?;

        info!(
            task_id = %task.id,
            amount = %amount,
            asset = %task.params.asset,
            pool = %pool.pool_address,
            apy = %pool.apy,
            "depositing into yield pool"
        );

        Ok(ExecutionResult {
            amount,
            gas_used: YIELD_GAS_USED,
            yield_earned,
            tx_ref: synthetic_tx_ref(),
        })
    }
}

// ---------------------------------------------------------------------------
// SwapExecutor
// ---------------------------------------------------------------------------

/// Exchange the configured asset. No yield accrues on swaps.
#[derive(Debug, Default)]
pub struct SwapExecutor;

#[async_trait]
impl StrategyExecutor for SwapExecutor {
    fn action(&self) -> ActionKind {
        ActionKind::Swap
    }

    async fn execute(
        &self,
        task: &AgentTask,
        _ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ExecutionError> {
        let amount = task.params.amount;
        info!(
            task_id = %task.id,
            amount = %amount,
            asset = %task.params.asset,
            "swapping"
        );

        Ok(ExecutionResult {
            amount,
            gas_used: SWAP_GAS_USED,
            yield_earned: Decimal::ZERO,
            tx_ref: synthetic_tx_ref(),
        })
    }
}

// ---------------------------------------------------------------------------
// DcaExecutor
// ---------------------------------------------------------------------------

/// Recurring buy of the configured asset. No yield accrues; the invested
/// total is the observable outcome.
#[derive(Debug, Default)]
pub struct DcaExecutor;

#[async_trait]
impl StrategyExecutor for DcaExecutor {
    fn action(&self) -> ActionKind {
        ActionKind::Dca
    }

    async fn execute(
        &self,
        task: &AgentTask,
        _ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ExecutionError> {
        let amount = task.params.amount;
        info!(
            task_id = %task.id,
            amount = %amount,
            asset = %task.params.asset,
            "dca buy"
        );

        Ok(ExecutionResult {
            amount,
            gas_used: DCA_GAS_USED,
            yield_earned: Decimal::ZERO,
            tx_ref: synthetic_tx_ref(),
        })
    }
}

// ---------------------------------------------------------------------------
// ExecutorSet
// ---------------------------------------------------------------------------

/// The full strategy dispatch table the engine is constructed with. One
/// executor per action; the closed enum keeps dispatch total.
#[derive(Clone)]
pub struct ExecutorSet {
    yield_deposit: Arc<dyn StrategyExecutor>,
    swap: Arc<dyn StrategyExecutor>,
    dca: Arc<dyn StrategyExecutor>,
}

impl ExecutorSet {
    pub fn new(
        yield_deposit: Arc<dyn StrategyExecutor>,
        swap: Arc<dyn StrategyExecutor>,
        dca: Arc<dyn StrategyExecutor>,
    ) -> Self {
        Self {
            yield_deposit,
            swap,
            dca,
        }
    }

    /// The built-in synthetic executors.
    pub fn builtin() -> Self {
        Self::new(
            Arc::new(YieldDepositExecutor),
            Arc::new(SwapExecutor),
            Arc::new(DcaExecutor),
        )
    }

    pub fn for_action(&self, action: ActionKind) -> &Arc<dyn StrategyExecutor> {
        match action {
            ActionKind::Yield => &self.yield_deposit,
            ActionKind::Swap => &self.swap,
            ActionKind::Dca => &self.dca,
        }
    }
}

// ---------------------------------------------------------------------------
// MockExecutor
// ---------------------------------------------------------------------------

/// Scripted executor for scheduler tests: replays queued outcomes and
/// records which tasks it was invoked for.
pub struct MockExecutor {
    action: ActionKind,
    outcomes: Mutex<VecDeque<Result<ExecutionResult, ExecutionError>>>,
    invoked: Mutex<Vec<TaskId>>,
}

impl MockExecutor {
    pub fn new(action: ActionKind) -> Self {
        Self {
            action,
            outcomes: Mutex::new(VecDeque::new()),
            invoked: Mutex::new(Vec::new()),
        }
    }

    pub fn with_result(self, result: ExecutionResult) -> Self {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(result));
        self
    }

    pub fn with_error(self, error: ExecutionError) -> Self {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(error));
        self
    }

    /// Task ids this executor has run for, in order.
    pub fn invocations(&self) -> Vec<TaskId> {
        self.invoked.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl StrategyExecutor for MockExecutor {
    fn action(&self) -> ActionKind {
        self.action
    }

    async fn execute(
        &self,
        task: &AgentTask,
        _ctx: &ExecutionContext,
    ) -> Result<ExecutionResult, ExecutionError> {
        self.invoked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(task.id.clone());

        let queued = self
            .outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        // Default outcome: echo the task amount with no yield.
        queued.unwrap_or_else(|| {
            Ok(ExecutionResult {
                amount: task.params.amount,
                gas_used: 21_000,
                yield_earned: Decimal::ZERO,
                tx_ref: synthetic_tx_ref(),
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use wl_core::types::{
        Advisory, Asset, Complexity, Frequency, MarketContext, Protocol, RiskLevel, Sentiment,
        StrategyParams, Volatility,
    };

    fn task(action: ActionKind) -> AgentTask {
        let params = StrategyParams {
            amount: dec!(500),
            asset: Asset::Usdc,
            protocol: Protocol::Aave,
            frequency: Frequency::Weekly,
            gas_ceiling_gwei: 25,
            min_yield_percent: dec!(4.0),
            action,
            advisory: Advisory {
                confidence: 80,
                risk_level: RiskLevel::Medium,
                complexity: Complexity::Simple,
                optimizations: vec![],
                market_context: MarketContext {
                    sentiment: Sentiment::Neutral,
                    volatility: Volatility::Medium,
                    recommendation: String::new(),
                },
            },
        };
        AgentTask::new("owner-1", params, "grant-1")
    }

    fn ctx_with_pool(apy: Decimal) -> ExecutionContext {
        ExecutionContext {
            gas_price_gwei: 20.0,
            best_pool: Some(PoolInfo {
                asset: Asset::Usdc,
                apy,
                pool_address: "mock:USDC".into(),
            }),
        }
    }

    #[test]
    fn weekly_yield_model() {
        // 500 at 4.2% APY: one week accrues 500 * 0.042 / 52.
        assert_eq!(weekly_yield(dec!(500), dec!(4.2)), Some(dec!(21) / dec!(52)));
        assert_eq!(weekly_yield(dec!(1000), Decimal::ZERO), Some(Decimal::ZERO));
    }

    #[test]
    fn weekly_yield_overflow_is_none() {
        assert_eq!(weekly_yield(Decimal::MAX, dec!(6)), None);
    }

    #[test]
    fn tx_refs_are_well_formed_and_unique() {
        let a = synthetic_tx_ref();
        let b = synthetic_tx_ref();
        assert!(a.starts_with("0x"));
        assert_eq!(a.len(), 66);
        assert!(a[2..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn yield_deposit_uses_pool_apy() {
        let result = YieldDepositExecutor
            .execute(&task(ActionKind::Yield), &ctx_with_pool(dec!(6)))
            .await
            .unwrap();

        assert_eq!(result.amount, dec!(500));
        assert_eq!(result.gas_used, 150_000);
        assert_eq!(result.yield_earned, weekly_yield(dec!(500), dec!(6)).unwrap());
    }

    #[tokio::test]
    async fn yield_deposit_rejects_oversized_amount() {
        let mut task = task(ActionKind::Yield);
        task.params.amount = Decimal::MAX;

        let err = YieldDepositExecutor
            .execute(&task, &ctx_with_pool(dec!(6)))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Overflow { .. }));
    }

    #[tokio::test]
    async fn yield_deposit_without_pool_fails() {
        let ctx = ExecutionContext {
            gas_price_gwei: 20.0,
            best_pool: None,
        };
        let err = YieldDepositExecutor
            .execute(&task(ActionKind::Yield), &ctx)
            .await
            .unwrap_err();
        assert_eq!(err, ExecutionError::PoolUnavailable);
    }

    #[tokio::test]
    async fn swap_and_dca_accrue_no_yield() {
        let ctx = ExecutionContext {
            gas_price_gwei: 20.0,
            best_pool: None,
        };

        let swap = SwapExecutor.execute(&task(ActionKind::Swap), &ctx).await.unwrap();
        assert_eq!(swap.gas_used, 120_000);
        assert_eq!(swap.yield_earned, Decimal::ZERO);

        let dca = DcaExecutor.execute(&task(ActionKind::Dca), &ctx).await.unwrap();
        assert_eq!(dca.gas_used, 180_000);
        assert_eq!(dca.yield_earned, Decimal::ZERO);
    }

    #[test]
    fn executor_set_dispatches_by_action() {
        let set = ExecutorSet::builtin();
        assert_eq!(set.for_action(ActionKind::Yield).action(), ActionKind::Yield);
        assert_eq!(set.for_action(ActionKind::Swap).action(), ActionKind::Swap);
        assert_eq!(set.for_action(ActionKind::Dca).action(), ActionKind::Dca);
    }

    #[tokio::test]
    async fn mock_executor_replays_outcomes_and_records_calls() {
        let task = task(ActionKind::Swap);
        let ctx = ExecutionContext {
            gas_price_gwei: 20.0,
            best_pool: None,
        };
        let mock = MockExecutor::new(ActionKind::Swap)
            .with_error(ExecutionError::Submission("nonce too low".into()));

        let first = mock.execute(&task, &ctx).await;
        assert!(matches!(first, Err(ExecutionError::Submission(_))));

        // Queue exhausted: default success.
        let second = mock.execute(&task, &ctx).await.unwrap();
        assert_eq!(second.amount, dec!(500));

        assert_eq!(mock.invocations(), vec![task.id.clone(), task.id.clone()]);
    }
}
