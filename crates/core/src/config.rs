use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root application configuration. Loaded from an optional TOML file and
/// environment variables with the prefix `CLUE__`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub experiment: ExperimentConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub expert: ExpertConfig,
    #[serde(default = "default_panels")]
    pub panels: Vec<PanelSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default = "default_num_chance")]
    pub num_chance: usize,
    #[serde(default = "default_num_decision")]
    pub num_decision: usize,
    #[serde(default = "default_env_seed")]
    pub seed: u64,
    #[serde(default = "default_reward_min")]
    pub reward_min: f64,
    #[serde(default = "default_reward_max")]
    pub reward_max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default = "default_trials")]
    pub trials: usize,
    #[serde(default = "default_runs")]
    pub runs: usize,
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_display_interval")]
    pub display_interval: usize,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub random_envs: bool,
}

/// Hyper-parameters shared by every agent kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_eps_start")]
    pub eps_start: f64,
    #[serde(default)]
    pub eps_end: f64,
    #[serde(default = "default_fraction")]
    pub eps_fraction: f64,
    #[serde(default)]
    pub q0: f64,
    /// Constant learning rate; `None` uses the visit-count rate.
    #[serde(default)]
    pub alpha: Option<f64>,
    #[serde(default = "default_ucb_c")]
    pub ucb_c: f64,
    #[serde(default = "default_ete_fraction")]
    pub ete_fraction: f64,
    #[serde(default = "default_eps_start")]
    pub adaptive_z_start: f64,
    #[serde(default = "default_adaptive_z_end")]
    pub adaptive_z_end: f64,
    #[serde(default = "default_linucb_alpha")]
    pub linucb_alpha: f64,
    #[serde(default = "default_eps_start")]
    pub ts_alpha: f64,
    #[serde(default = "default_ts_beta")]
    pub ts_beta: f64,
    #[serde(default = "default_ts_mu0")]
    pub ts_mu0: f64,
    /// CLUE threshold T; `None` uses `min(2/|A|, 0.5)`.
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default = "default_initial_estimate")]
    pub initial_estimate: [f64; 2],
    #[serde(default = "default_true")]
    pub regular_update: bool,
    #[serde(default)]
    pub sliding_window: Option<usize>,
    #[serde(default)]
    pub recency: Option<f64>,
    #[serde(default = "default_eps_start")]
    pub initial_reliance: f64,
    #[serde(default)]
    pub final_reliance: f64,
    #[serde(default = "default_fraction")]
    pub reliance_fraction: f64,
    #[serde(default)]
    pub prq_temperature: f64,
    #[serde(default = "default_prq_temperature_step")]
    pub prq_temperature_step: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertConfig {
    /// Minimum number of trials between two pieces of advice.
    #[serde(default = "default_mu")]
    pub mu: u64,
    /// Minimum average regret per trial before advice is given.
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    #[serde(default = "default_degrade_factor")]
    pub degrade_factor: f64,
}

/// A named panel of experts described by their true reliabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelSpec {
    pub name: String,
    pub rhos: Vec<f64>,
}

impl PanelSpec {
    pub fn new(name: impl Into<String>, rhos: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            rhos,
        }
    }
}

// Default functions
fn default_num_chance() -> usize {
    7
}
fn default_num_decision() -> usize {
    3
}
fn default_env_seed() -> u64 {
    1
}
fn default_reward_min() -> f64 {
    -1.0
}
fn default_reward_max() -> f64 {
    1.0
}
fn default_trials() -> usize {
    10_000
}
fn default_runs() -> usize {
    10
}
fn default_display_interval() -> usize {
    10
}
fn default_output_dir() -> String {
    "results".to_string()
}
fn default_workers() -> usize {
    4
}
fn default_eps_start() -> f64 {
    1.0
}
fn default_fraction() -> f64 {
    0.8
}
fn default_ucb_c() -> f64 {
    0.25
}
fn default_ete_fraction() -> f64 {
    0.25
}
fn default_adaptive_z_end() -> f64 {
    -1.0
}
fn default_linucb_alpha() -> f64 {
    2.0
}
fn default_ts_beta() -> f64 {
    10.0
}
fn default_ts_mu0() -> f64 {
    3.0
}
fn default_initial_estimate() -> [f64; 2] {
    [1.0, 1.0]
}
fn default_true() -> bool {
    true
}
fn default_prq_temperature_step() -> f64 {
    0.05
}
fn default_mu() -> u64 {
    10
}
fn default_gamma() -> f64 {
    0.01
}
fn default_degrade_factor() -> f64 {
    0.99
}

/// The three panels every study compares against.
pub fn default_panels() -> Vec<PanelSpec> {
    vec![
        PanelSpec::new("Single_Bad", vec![0.0]),
        PanelSpec::new("Single_Good", vec![1.0]),
        PanelSpec::new("Varied_Panel", vec![0.0, 0.1, 0.25, 0.5, 0.75, 0.9, 1.0]),
    ]
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            num_chance: default_num_chance(),
            num_decision: default_num_decision(),
            seed: default_env_seed(),
            reward_min: default_reward_min(),
            reward_max: default_reward_max(),
        }
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            trials: default_trials(),
            runs: default_runs(),
            seed: 0,
            display_interval: default_display_interval(),
            output_dir: default_output_dir(),
            workers: default_workers(),
            random_envs: false,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            eps_start: default_eps_start(),
            eps_end: 0.0,
            eps_fraction: default_fraction(),
            q0: 0.0,
            alpha: None,
            ucb_c: default_ucb_c(),
            ete_fraction: default_ete_fraction(),
            adaptive_z_start: default_eps_start(),
            adaptive_z_end: default_adaptive_z_end(),
            linucb_alpha: default_linucb_alpha(),
            ts_alpha: default_eps_start(),
            ts_beta: default_ts_beta(),
            ts_mu0: default_ts_mu0(),
            threshold: None,
            initial_estimate: default_initial_estimate(),
            regular_update: default_true(),
            sliding_window: None,
            recency: None,
            initial_reliance: default_eps_start(),
            final_reliance: 0.0,
            reliance_fraction: default_fraction(),
            prq_temperature: 0.0,
            prq_temperature_step: default_prq_temperature_step(),
        }
    }
}

impl Default for ExpertConfig {
    fn default() -> Self {
        Self {
            mu: default_mu(),
            gamma: default_gamma(),
            degrade_factor: default_degrade_factor(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: EnvironmentConfig::default(),
            experiment: ExperimentConfig::default(),
            agent: AgentConfig::default(),
            expert: ExpertConfig::default(),
            panels: default_panels(),
        }
    }
}

/// Read when no configuration file is named.
pub const DEFAULT_CONFIG_FILE: &str = "clue.toml";

impl AppConfig {
    /// Load configuration from a TOML file (`clue.toml` unless `path` names
    /// another; a missing file is skipped), then environment variables
    /// (`CLUE__EXPERIMENT__TRIALS=500`).
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from(Self::config_path(path)).required(false))
            .add_source(
                config::Environment::with_prefix("CLUE")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn config_path(path: Option<&Path>) -> &Path {
        path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE))
    }
}
