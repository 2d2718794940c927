//! Simulation configuration (`marketsim.toml`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::catalog::{JobTemplate, default_catalog};
use crate::core::types::{GoalThresholds, Role};

pub const DEFAULT_CONFIG_PATH: &str = "marketsim.toml";

/// Simulation configuration (TOML).
///
/// Every table is optional; missing fields fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    pub actors: ActorCounts,
    pub goals: GoalThresholds,
    pub run: RunLimits,
    pub llm: LlmConfig,
    pub job_catalog: Vec<JobTemplate>,
}

/// How many identities to provision per role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ActorCounts {
    pub job_poster_individual: usize,
    pub job_poster_organization: usize,
    pub service_provider: usize,
    pub admin: usize,
    pub viewer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunLimits {
    pub max_iterations: u32,
    /// Iterations an actor may go without a successful action before it is
    /// skipped while nothing changes.
    pub max_wait_cycles: u32,
    /// The run fails once recorded errors exceed this count.
    pub error_ceiling: usize,
    /// Pause after each actor turn, in milliseconds.
    pub turn_delay_ms: u64,
    /// Fixed RNG seed; a random seed is drawn when absent.
    pub seed: Option<u64>,
    /// Keep provisioned identities after the run.
    pub skip_cleanup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    /// Decision command and arguments; receives the prompt on stdin.
    pub command: Vec<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub output_limit_bytes: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            actors: ActorCounts::default(),
            goals: GoalThresholds::default(),
            run: RunLimits::default(),
            llm: LlmConfig::default(),
            job_catalog: default_catalog(),
        }
    }
}

impl Default for ActorCounts {
    fn default() -> Self {
        Self {
            job_poster_individual: 2,
            job_poster_organization: 1,
            service_provider: 3,
            admin: 0,
            viewer: 0,
        }
    }
}

impl Default for RunLimits {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            max_wait_cycles: 3,
            error_ceiling: 20,
            turn_delay_ms: 0,
            seed: None,
            skip_cleanup: false,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: vec!["llm".to_string()],
            timeout_secs: 60,
            temperature: 0.7,
            output_limit_bytes: 64_000,
        }
    }
}

impl ActorCounts {
    /// Provisioning plan in a stable role order.
    pub fn plan(&self) -> Vec<(Role, usize)> {
        vec![
            (Role::JobPosterIndividual, self.job_poster_individual),
            (Role::JobPosterOrganization, self.job_poster_organization),
            (Role::ServiceProvider, self.service_provider),
            (Role::Admin, self.admin),
            (Role::Viewer, self.viewer),
        ]
    }

    pub fn posters(&self) -> usize {
        self.job_poster_individual + self.job_poster_organization
    }
}

impl SimConfig {
    pub fn validate(&self) -> Result<()> {
        if self.actors.posters() == 0 {
            return Err(anyhow!("actors: at least one job poster is required"));
        }
        if self.actors.service_provider == 0 {
            return Err(anyhow!("actors.service_provider must be > 0"));
        }
        if self.run.max_iterations == 0 {
            return Err(anyhow!("run.max_iterations must be > 0"));
        }
        if self.run.error_ceiling == 0 {
            return Err(anyhow!("run.error_ceiling must be > 0"));
        }
        if self.job_catalog.is_empty() {
            return Err(anyhow!("job_catalog must contain at least one template"));
        }
        for template in &self.job_catalog {
            template.validate().map_err(|err| anyhow!("job_catalog: {err}"))?;
        }
        if self.llm.enabled {
            if self.llm.command.first().is_none_or(|program| program.trim().is_empty()) {
                return Err(anyhow!("llm.command must be a non-empty array"));
            }
            if self.llm.timeout_secs == 0 {
                return Err(anyhow!("llm.timeout_secs must be > 0"));
            }
            if self.llm.output_limit_bytes == 0 {
                return Err(anyhow!("llm.output_limit_bytes must be > 0"));
            }
            if !(0.0..=2.0).contains(&self.llm.temperature) {
                return Err(anyhow!("llm.temperature must be within 0.0..=2.0"));
            }
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SimConfig::default()`.
pub fn load_config(path: &Path) -> Result<SimConfig> {
    if !path.exists() {
        let cfg = SimConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SimConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &SimConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let tmp_path = path.with_extension("toml.tmp");
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
