#![forbid(unsafe_code)]

//! # fluid-harness
//!
//! Adaptive competence measurement for black-box subjects.
//!
//! Instead of running every test item against every candidate method
//! (slow, expensive, and mostly uninformative), fluid-harness
//! administers items adaptively using the two-parameter logistic model
//! from item response theory: each next item is the one most
//! informative about the subject's current ability estimate, and the
//! session stops as soon as the ability is pinned down precisely
//! enough. Completed runs then feed batch analyses: flagging items
//! whose outcomes contradict the fitted model (candidate mislabels) and
//! statistically comparing two subjects' abilities.
//!
//! The subject under test and the grading of its raw responses live
//! behind the [`subject::Subject`] and [`scoring::ScoringFunction`]
//! seams; the engine itself never talks to a provider or stores
//! anything.

pub mod bank;
pub mod compare;
pub mod estimator;
pub mod mislabel;
pub mod model;
pub mod scoring;
pub mod selector;
pub mod session;
pub mod simulation;
pub mod subject;

pub use bank::{BankConfig, BankError, ExposureStore, InProcessExposureStore, Item, ItemBank};
pub use compare::{compare, ComparisonResult, ComparisonVerdict, DEFAULT_ALPHA};
pub use estimator::{estimate, EstimateError, EstimatorConfig, ThetaEstimate};
pub use mislabel::{
    outcomes_from_runs, DetectorConfig, ItemDiagnosis, ItemOutcome, MislabelDetector,
    MislabelFlag, Verdict,
};
pub use scoring::{ExactMatch, ExternalJudge, RubricGrader, ScoringError, ScoringFunction};
pub use selector::{select_next, SelectionStrategy, SelectorError};
pub use session::{
    ability_band, AbilityBand, AbilityEstimate, AdaptiveTestRunner, FailurePolicy, ItemEvent,
    ObserverError, ResponsePattern, ResponseRecord, RunObserver, RunStatus, RunnerConfig,
    RunnerError, StopReason, TestRun,
};
pub use simulation::{simulate_profile, simulate_run, SimulatedSubject, SimulationStat};
pub use subject::{Subject, SubjectError};
