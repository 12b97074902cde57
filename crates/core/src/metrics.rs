//! Task lifecycle metrics.
//!
//! Recorded through the `metrics` facade; whichever recorder the binary
//! installs (Prometheus in the server) collects them.

use std::time::Duration;

use applykit_types::{TaskKind, TaskStatus};
use metrics::{counter, describe_counter, describe_histogram, histogram};

pub const TRANSITIONS_TOTAL: &str = "applykit_task_transitions_total";
pub const EXECUTION_SECONDS: &str = "applykit_task_execution_seconds";
pub const REAPED_TOTAL: &str = "applykit_tasks_reaped_total";

/// Register descriptions for the task metrics.
pub fn describe_task_metrics() {
    describe_counter!(
        TRANSITIONS_TOTAL,
        "Task status transitions, by kind and target status"
    );
    describe_histogram!(
        EXECUTION_SECONDS,
        "Time spent running a task's workflow, by kind and outcome"
    );
    describe_counter!(REAPED_TOTAL, "Stale tasks failed by the reaper");
}

pub fn record_transition(kind: TaskKind, status: TaskStatus) {
    counter!(TRANSITIONS_TOTAL, "kind" => kind.as_str(), "status" => status.as_str()).increment(1);
}

pub fn record_execution(kind: TaskKind, outcome: TaskStatus, duration: Duration) {
    histogram!(EXECUTION_SECONDS, "kind" => kind.as_str(), "outcome" => outcome.as_str())
        .record(duration.as_secs_f64());
}

pub fn record_reaped(count: usize) {
    counter!(REAPED_TOTAL).increment(count as u64);
}
