use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    Usdc,
    Usdt,
    Dai,
    Eth,
    Weth,
    Wbtc,
}

impl Asset {
    pub fn symbol(&self) -> &'static str {
        match self {
            Asset::Usdc => "USDC",
            Asset::Usdt => "USDT",
            Asset::Dai => "DAI",
            Asset::Eth => "ETH",
            Asset::Weth => "WETH",
            Asset::Wbtc => "WBTC",
        }
    }

    pub fn is_stablecoin(&self) -> bool {
        matches!(self, Asset::Usdc | Asset::Usdt | Asset::Dai)
    }

    /// Case-insensitive symbol lookup, used by the rule-based parser.
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "usdc" => Some(Asset::Usdc),
            "usdt" => Some(Asset::Usdt),
            "dai" => Some(Asset::Dai),
            "eth" => Some(Asset::Eth),
            "weth" => Some(Asset::Weth),
            "wbtc" => Some(Asset::Wbtc),
            _ => None,
        }
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Aave,
    Compound,
    Uniswap,
    Curve,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Aave => "aave",
            Protocol::Compound => "compound",
            Protocol::Uniswap => "uniswap",
            Protocol::Curve => "curve",
        }
    }

    /// Name lookup with the short aliases users actually type.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "aave" => Some(Protocol::Aave),
            "compound" | "comp" => Some(Protocol::Compound),
            "uniswap" | "uni" => Some(Protocol::Uniswap),
            "curve" => Some(Protocol::Curve),
            _ => None,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Frequency
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// The scheduling interval this frequency advances a task by.
    /// Monthly is a fixed 30 days, not a calendar month.
    pub fn interval(&self) -> Duration {
        match self {
            Frequency::Hourly => Duration::hours(1),
            Frequency::Daily => Duration::hours(24),
            Frequency::Weekly => Duration::days(7),
            Frequency::Monthly => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Hourly => "hourly",
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }

    /// Lookup accepting both the adjective and bare-noun spellings
    /// ("weekly", "week"). Unrecognized spellings return `None`; the parser
    /// substitutes the weekly default at that point.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "hourly" | "hour" => Some(Frequency::Hourly),
            "daily" | "day" => Some(Frequency::Daily),
            "weekly" | "week" => Some(Frequency::Weekly),
            "monthly" | "month" => Some(Frequency::Monthly),
            _ => None,
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

/// The strategy a task executes. `invest` is accepted on the wire as an
/// alias for `yield`; the model vocabulary uses both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    #[serde(alias = "invest")]
    Yield,
    Swap,
    Dca,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Yield => "yield",
            ActionKind::Swap => "swap",
            ActionKind::Dca => "dca",
        }
    }

    /// Name lookup accepting the `invest` alias, for parsers that receive
    /// the action as free text rather than through serde.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "yield" | "invest" => Some(ActionKind::Yield),
            "swap" => Some(ActionKind::Swap),
            "dca" => Some(ActionKind::Dca),
            _ => None,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Advisory enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    Moderate,
    Complex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Volatility {
    Low,
    Medium,
    High,
}

/// Advisory market snapshot attached to a classification. Informational
/// only; nothing in scheduling reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    pub sentiment: Sentiment,
    pub volatility: Volatility,
    pub recommendation: String,
}

/// Advisory outputs of the classifier. None of these gate execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    /// 0-100, additive heuristic over which fields matched.
    pub confidence: u8,
    pub risk_level: RiskLevel,
    pub complexity: Complexity,
    pub optimizations: Vec<String>,
    pub market_context: MarketContext,
}

// ---------------------------------------------------------------------------
// StrategyParams
// ---------------------------------------------------------------------------

/// Validated strategy descriptor produced by the intent classifier.
/// Immutable once a task is created from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    pub amount: Decimal,
    pub asset: Asset,
    pub protocol: Protocol,
    pub frequency: Frequency,
    pub gas_ceiling_gwei: u32,
    pub min_yield_percent: Decimal,
    pub action: ActionKind,
    pub advisory: Advisory,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParamsError {
    #[error("amount must be positive, got {0}")]
    NonPositiveAmount(String),
    #[error("gas ceiling must be positive")]
    ZeroGasCeiling,
    #[error("minimum yield must not be negative, got {0}")]
    NegativeMinYield(String),
}

impl StrategyParams {
    /// Numeric invariants the type system cannot express. Task creation
    /// rejects params that fail this.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.amount <= Decimal::ZERO {
            return Err(ParamsError::NonPositiveAmount(self.amount.to_string()));
        }
        if self.gas_ceiling_gwei == 0 {
            return Err(ParamsError::ZeroGasCeiling);
        }
        if self.min_yield_percent < Decimal::ZERO {
            return Err(ParamsError::NegativeMinYield(
                self.min_yield_percent.to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TaskStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Active,
    Paused,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Returns `true` when a transition from `self` to `target` is valid.
    /// Completed and Failed are terminal; tasks are retained for audit.
    pub fn can_transition_to(&self, target: &TaskStatus) -> bool {
        matches!(
            (self, target),
            (TaskStatus::Active, TaskStatus::Paused)
                | (TaskStatus::Active, TaskStatus::Completed)
                | (TaskStatus::Active, TaskStatus::Failed)
                | (TaskStatus::Paused, TaskStatus::Active)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Active => "active",
            TaskStatus::Paused => "paused",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// TaskId
// ---------------------------------------------------------------------------

/// Opaque task identifier. The string form encodes creation order
/// (`task_<millis>_<suffix>`, `subagent_<millis>_<suffix>`), which is also
/// the original wire format callers already parse.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new_task() -> Self {
        Self::generate("task")
    }

    pub fn new_sub_agent() -> Self {
        Self::generate("subagent")
    }

    fn generate(prefix: &str) -> Self {
        let millis = Utc::now().timestamp_millis();
        let entropy = Uuid::new_v4().as_simple().to_string();
        TaskId(format!("{prefix}_{millis}_{}", &entropy[..9]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_sub_agent(&self) -> bool {
        self.0.starts_with("subagent_")
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// AgentTask
// ---------------------------------------------------------------------------

/// A recurring automation task owned by the engine. Never deleted; terminal
/// tasks stay in the registry as the audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: TaskId,
    pub owner_id: String,
    pub params: StrategyParams,
    /// Opaque reference to an externally issued capability grant. Stored
    /// and passed through only; never validated here.
    pub grant_ref: String,
    pub status: TaskStatus,
    pub execution_count: u32,
    pub total_invested: Decimal,
    pub total_yield_earned: Decimal,
    pub last_execution_at: Option<DateTime<Utc>>,
    pub next_execution_at: Option<DateTime<Utc>>,
    /// Back-reference for delegated sub-agents. Lifecycle stays independent
    /// of the parent.
    pub parent_task_id: Option<TaskId>,
    pub created_at: DateTime<Utc>,
}

impl AgentTask {
    /// Create a top-level Active task. The first execution is scheduled one
    /// full frequency interval out.
    pub fn new(
        owner_id: impl Into<String>,
        params: StrategyParams,
        grant_ref: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new_task(),
            owner_id: owner_id.into(),
            next_execution_at: Some(now + params.frequency.interval()),
            params,
            grant_ref: grant_ref.into(),
            status: TaskStatus::Active,
            execution_count: 0,
            total_invested: Decimal::ZERO,
            total_yield_earned: Decimal::ZERO,
            last_execution_at: None,
            parent_task_id: None,
            created_at: now,
        }
    }

    /// Create a delegated sub-agent task under `parent` with the already
    /// narrowed `params`. The grant reference is derived from the parent's,
    /// marking it as a sub-scope for the issuer.
    pub fn new_sub_agent(parent: &AgentTask, params: StrategyParams) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new_sub_agent(),
            owner_id: parent.owner_id.clone(),
            next_execution_at: Some(now + params.frequency.interval()),
            params,
            grant_ref: format!("sub_{}", parent.grant_ref),
            status: TaskStatus::Active,
            execution_count: 0,
            total_invested: Decimal::ZERO,
            total_yield_earned: Decimal::ZERO,
            last_execution_at: None,
            parent_task_id: Some(parent.id.clone()),
            created_at: now,
        }
    }

    /// Due for execution: Active and the schedule time has arrived.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == TaskStatus::Active
            && self.next_execution_at.is_some_and(|at| at <= now)
    }

    /// Record one successful execution: bump counters, stamp
    /// `last_execution_at`, and advance the schedule by exactly one
    /// frequency interval from `now`. Lifetime totals clamp at the numeric
    /// ceiling instead of overflowing.
    pub fn record_execution(&mut self, now: DateTime<Utc>, amount: Decimal, yield_earned: Decimal) {
        self.execution_count = self.execution_count.saturating_add(1);
        self.last_execution_at = Some(now);
        self.next_execution_at = Some(now + self.params.frequency.interval());
        self.total_invested = self.total_invested.saturating_add(amount);
        self.total_yield_earned = self.total_yield_earned.saturating_add(yield_earned);
    }

    /// Push the next attempt to `until` without touching counters.
    pub fn reschedule(&mut self, until: DateTime<Utc>) {
        self.next_execution_at = Some(until);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
