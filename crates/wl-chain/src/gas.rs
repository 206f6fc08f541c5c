use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use wl_core::config::GasConfig;

/// Fallback answer when the fee oracle cannot be reached. Gating must never
/// hard-fail on monitor unavailability.
pub const FALLBACK_GAS_PRICE_GWEI: f64 = 25.0;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// GasMonitor trait
// ---------------------------------------------------------------------------

/// Network fee oracle seam. Implementations absorb transport failures into
/// a documented fallback value instead of returning errors; the scan loop
/// calls this on every gating decision.
#[async_trait]
pub trait GasMonitor: Send + Sync {
    /// Current gas price, rounded to whole gwei.
    async fn current_gas_price_gwei(&self) -> f64;

    /// Poll interval used by [`wait_for_ceiling`](Self::wait_for_ceiling).
    fn poll_interval(&self) -> Duration {
        DEFAULT_POLL_INTERVAL
    }

    /// Give-up bound for [`wait_for_ceiling`](Self::wait_for_ceiling).
    fn wait_timeout(&self) -> Duration {
        DEFAULT_WAIT_TIMEOUT
    }

    /// Block until the gas price drops to `max_gwei` or below, polling at
    /// [`poll_interval`](Self::poll_interval). Returns false once
    /// [`wait_timeout`](Self::wait_timeout) elapses. For interactive callers
    /// only; the scan loop never waits on this.
    async fn wait_for_ceiling(&self, max_gwei: f64) -> bool {
        let deadline = tokio::time::Instant::now() + self.wait_timeout();
        loop {
            if self.current_gas_price_gwei().await <= max_gwei {
                return true;
            }
            if tokio::time::Instant::now() + self.poll_interval() > deadline {
                return false;
            }
            tokio::time::sleep(self.poll_interval()).await;
        }
    }
}

// ---------------------------------------------------------------------------
// RpcGasMonitor
// ---------------------------------------------------------------------------

/// Gas monitor backed by an Ethereum JSON-RPC endpoint (`eth_gasPrice`).
/// Without a configured endpoint, or on any request/parse failure, it
/// answers with the configured fallback.
pub struct RpcGasMonitor {
    client: reqwest::Client,
    rpc_url: Option<String>,
    fallback_gwei: f64,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl RpcGasMonitor {
    pub fn new(config: &GasConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            rpc_url: config.rpc_url.clone(),
            fallback_gwei: config.fallback_gwei,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            wait_timeout: Duration::from_secs(config.wait_timeout_secs),
        }
    }

    async fn query(&self, url: &str) -> Option<f64> {
        let response = self
            .client
            .post(url)
            .json(&rpc_request_body())
            .send()
            .await
            .ok()?;
        let body: serde_json::Value = response.json().await.ok()?;
        parse_gas_price_hex(body.get("result")?.as_str()?)
    }
}

#[async_trait]
impl GasMonitor for RpcGasMonitor {
    async fn current_gas_price_gwei(&self) -> f64 {
        let Some(url) = self.rpc_url.as_deref() else {
            debug!(fallback = self.fallback_gwei, "no fee oracle configured");
            return self.fallback_gwei;
        };
        match self.query(url).await {
            Some(gwei) => gwei,
            None => {
                warn!(fallback = self.fallback_gwei, "fee oracle query failed");
                self.fallback_gwei
            }
        }
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }
}

/// `eth_gasPrice` request payload. Split out so the wire shape is testable
/// without a server.
fn rpc_request_body() -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "eth_gasPrice",
        "params": [],
    })
}

/// Parse a 0x-prefixed hex wei quantity into whole gwei.
fn parse_gas_price_hex(hex: &str) -> Option<f64> {
    let wei = u128::from_str_radix(hex.strip_prefix("0x")?, 16).ok()?;
    Some((wei as f64 / 1e9).round())
}

// ---------------------------------------------------------------------------
// MockGasMonitor
// ---------------------------------------------------------------------------

/// Scripted gas monitor for tests: answers queued prices in order, then the
/// steady price once the queue is exhausted.
pub struct MockGasMonitor {
    steady_gwei: f64,
    queued: Mutex<VecDeque<f64>>,
    poll_interval: Duration,
    wait_timeout: Duration,
}

impl MockGasMonitor {
    pub fn new(steady_gwei: f64) -> Self {
        Self {
            steady_gwei,
            queued: Mutex::new(VecDeque::new()),
            poll_interval: Duration::from_millis(10),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }

    pub fn with_sequence(mut self, prices: impl IntoIterator<Item = f64>) -> Self {
        self.queued = Mutex::new(prices.into_iter().collect());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout;
        self
    }
}

#[async_trait]
impl GasMonitor for MockGasMonitor {
    async fn current_gas_price_gwei(&self) -> f64 {
        let mut queued = self.queued.lock().unwrap_or_else(|e| e.into_inner());
        queued.pop_front().unwrap_or(self.steady_gwei)
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    fn wait_timeout(&self) -> Duration {
        self.wait_timeout
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
