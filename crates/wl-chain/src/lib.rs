pub mod executor;
pub mod gas;
pub mod pools;
