//! Adaptive test sessions: the runner state machine, its result
//! records, and the per-item observer hook.

pub mod observer;
pub mod runner;
pub mod types;

pub use observer::{ItemEvent, ObserverError, RunObserver};
pub use runner::{AdaptiveTestRunner, FailurePolicy, RunnerConfig, RunnerError};
pub use types::{
    ability_band, now_epoch_ms, AbilityBand, AbilityEstimate, ResponsePattern, ResponseRecord,
    RunStatus, StopReason, TestRun,
};
