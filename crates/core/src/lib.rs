// crates/core/src/lib.rs
//! Task lifecycle, workflows and runners for applykit.
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod runner;
pub mod worker;
pub mod workflows;

pub use error::{TaskError, WorkflowError};
pub use lifecycle::{DispatchMode, TaskManager, TransitionPayload};
pub use runner::{create_runner, RunnerConfig, RunnerError, RunnerMode, TaskRunner};
pub use worker::{spawn_reaper, spawn_worker_pool, TaskQueue};
pub use workflows::{TaskInput, WorkflowOutput, Workflows, NO_RESUME_MESSAGE};
