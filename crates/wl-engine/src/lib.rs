//! Task scheduling for windlass agents: a condition-gated periodic
//! scheduler with specialized sub-agent delegation.

pub mod delegation;
pub mod engine;
pub mod events;
pub mod policy;
pub mod registry;
pub mod shutdown;

pub use delegation::{DelegationError, Specialization, SubAgentSpec};
pub use engine::{AutomationEngine, EngineError, ScanReport};
pub use events::{EngineEvent, EventBus, RescheduleReason};
pub use registry::TaskRegistry;
pub use shutdown::ShutdownSignal;
