// crates/core/src/runner/config.rs
//! Task runner configuration types.

use std::time::Duration;

use applykit_types::TaskKind;
use serde::Deserialize;

/// Which runner implementation to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerMode {
    /// Deterministic canned results, no network.
    #[default]
    Mock,
    /// Research and browsing HTTP APIs.
    Live,
}

/// Configuration for a task runner instance. Deserialized from the
/// `[runner]` table of the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub mode: RunnerMode,
    pub research_base_url: String,
    pub browsing_url: String,
    pub research_api_key: Option<String>,
    pub browsing_api_key: Option<String>,
    pub search_timeout_secs: u64,
    pub kit_timeout_secs: u64,
    pub fill_timeout_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            mode: RunnerMode::Mock,
            research_base_url: "https://api.yutori.com".into(),
            browsing_url: "https://mino.ai/v1/automation/run".into(),
            research_api_key: None,
            browsing_api_key: None,
            search_timeout_secs: 300,
            kit_timeout_secs: 90,
            fill_timeout_secs: 320,
            poll_interval_secs: 5,
        }
    }
}

impl RunnerConfig {
    /// Upper bound on one runner call for `kind`.
    pub fn timeout_for(&self, kind: TaskKind) -> Duration {
        let secs = match kind {
            TaskKind::JobSearch => self.search_timeout_secs,
            TaskKind::KitGeneration => self.kit_timeout_secs,
            TaskKind::FormFill => self.fill_timeout_secs,
        };
        Duration::from_secs(secs)
    }

    /// The largest per-kind timeout.
    pub fn longest_timeout(&self) -> Duration {
        [TaskKind::JobSearch, TaskKind::KitGeneration, TaskKind::FormFill]
            .into_iter()
            .map(|kind| self.timeout_for(kind))
            .max()
            .unwrap_or_default()
    }
}
