use std::sync::Mutex;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use wl_core::types::Asset;

// ---------------------------------------------------------------------------
// PoolInfo
// ---------------------------------------------------------------------------

/// One yield opportunity as reported by the yield data source. The address
/// is an opaque reference for the transaction submitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolInfo {
    pub asset: Asset,
    /// Quoted annual percentage yield.
    pub apy: Decimal,
    pub pool_address: String,
}

// ---------------------------------------------------------------------------
// YieldMonitor trait
// ---------------------------------------------------------------------------

/// Yield data source seam. `best_pool` drives the scheduler's yield gate.
#[async_trait]
pub trait YieldMonitor: Send + Sync {
    /// All currently known pools, in the source's stable order.
    async fn pools(&self) -> Vec<PoolInfo>;

    /// Highest-APY pool with `apy >= min_apy`, or `None` when nothing
    /// qualifies. Equal APYs resolve to the earlier pool in source order,
    /// keeping selection deterministic.
    async fn best_pool(&self, min_apy: Decimal) -> Option<PoolInfo> {
        let mut best: Option<PoolInfo> = None;
        for pool in self.pools().await {
            if pool.apy < min_apy {
                continue;
            }
            match &best {
                Some(current) if pool.apy <= current.apy => {}
                _ => best = Some(pool),
            }
        }
        best
    }
}

// ---------------------------------------------------------------------------
// StaticYieldMonitor
// ---------------------------------------------------------------------------

/// Yield monitor over a fixed pool table. The default table mirrors the
/// stable-lending rates the product demos against; a live data source
/// implements the same trait.
pub struct StaticYieldMonitor {
    pools: Vec<PoolInfo>,
}

impl StaticYieldMonitor {
    pub fn new(pools: Vec<PoolInfo>) -> Self {
        Self { pools }
    }

    pub fn with_default_pools() -> Self {
        Self::new(vec![
            PoolInfo {
                asset: Asset::Usdc,
                apy: dec!(4.2),
                pool_address: "aave-v3:USDC".into(),
            },
            PoolInfo {
                asset: Asset::Usdt,
                apy: dec!(4.1),
                pool_address: "aave-v3:USDT".into(),
            },
            PoolInfo {
                asset: Asset::Dai,
                apy: dec!(3.9),
                pool_address: "aave-v3:DAI".into(),
            },
        ])
    }
}

#[async_trait]
impl YieldMonitor for StaticYieldMonitor {
    async fn pools(&self) -> Vec<PoolInfo> {
        self.pools.clone()
    }
}

// ---------------------------------------------------------------------------
// MockYieldMonitor
// ---------------------------------------------------------------------------

/// Test double whose pool table can be swapped mid-test.
#[derive(Default)]
pub struct MockYieldMonitor {
    pools: Mutex<Vec<PoolInfo>>,
}

impl MockYieldMonitor {
    pub fn new(pools: Vec<PoolInfo>) -> Self {
        Self {
            pools: Mutex::new(pools),
        }
    }

    /// Convenience: a single USDC pool at the given APY.
    pub fn single(apy: Decimal) -> Self {
        Self::new(vec![PoolInfo {
            asset: Asset::Usdc,
            apy,
            pool_address: "mock:USDC".into(),
        }])
    }

    /// No qualifying pools at all.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn set_pools(&self, pools: Vec<PoolInfo>) {
        *self.pools.lock().unwrap_or_else(|e| e.into_inner()) = pools;
    }
}

#[async_trait]
impl YieldMonitor for MockYieldMonitor {
    async fn pools(&self) -> Vec<PoolInfo> {
        self.pools.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
