// crates/core/src/runner/factory.rs
//! Runner factory: creates a TaskRunner from configuration.

use std::sync::Arc;

use super::config::{RunnerConfig, RunnerMode};
use super::http::HttpTaskRunner;
use super::mock::MockTaskRunner;
use super::types::RunnerError;
use super::TaskRunner;

/// Create the task runner `config` asks for.
///
/// Live mode requires both API keys.
pub fn create_runner(config: &RunnerConfig) -> Result<Arc<dyn TaskRunner>, RunnerError> {
    match config.mode {
        RunnerMode::Mock => Ok(Arc::new(MockTaskRunner::new())),
        RunnerMode::Live => {
            let missing = [
                ("research_api_key", &config.research_api_key),
                ("browsing_api_key", &config.browsing_api_key),
            ]
            .into_iter()
            .filter(|(_, key)| key.as_deref().map_or(true, str::is_empty))
            .map(|(name, _)| name)
            .collect::<Vec<_>>();
            if !missing.is_empty() {
                return Err(RunnerError::NotConfigured(format!(
                    "live mode requires {}",
                    missing.join(" and ")
                )));
            }
            Ok(Arc::new(HttpTaskRunner::new(config)?))
        }
    }
}
