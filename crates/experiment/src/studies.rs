//! The named studies behind the `clue-sim` subcommands and job scripts.

use crate::regret::{beta_param_test, expert_param_test, partial_observability_test, regret_test};
use crate::results::ResultsWriter;
use crate::runner::{named_agents, unreliable_panels, AgentBlueprint, ExperimentRunner, PanelBlueprint, World};
use clue_agents::{make_agent, LearnerKind};
use clue_core::config::{AgentConfig, AppConfig};
use clue_core::{derive_seed, hash_label, seeded_rng, ClueError, ClueResult, StateTable};
use clue_env::Oracle;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Job names accepted from the cluster job scripts.
pub const JOB_NAMES: [&str; 6] = [
    "Epsilon Greedy",
    "ETE",
    "Adaptive Greedy",
    "UCB",
    "beta_param",
    "expert_param",
];

pub const PARAM_VALUES: [f64; 4] = [1.0, 10.0, 100.0, 1000.0];
pub const EXPERT_MUS: [u64; 4] = [1, 10, 100, 1000];
pub const EXPERT_GAMMAS: [f64; 4] = [0.001, 0.01, 0.1, 1.0];
pub const PARTIAL_HIDDEN: [usize; 5] = [0, 1, 3, 5, 7];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Study {
    /// The baseline, CLUE and NAF, all built on the same learner.
    Baseline(LearnerKind),
    BetaParam,
    ExpertParam,
    PanelComparison,
    Degrading,
    Nonuniform,
    PartialObservability,
}

impl Study {
    pub fn from_job(name: &str) -> ClueResult<Self> {
        match name {
            "Epsilon Greedy" => Ok(Study::Baseline(LearnerKind::EpsilonGreedy)),
            "ETE" => Ok(Study::Baseline(LearnerKind::Ete)),
            "Adaptive Greedy" => Ok(Study::Baseline(LearnerKind::AdaptiveGreedy)),
            "UCB" => Ok(Study::Baseline(LearnerKind::Ucb)),
            "beta_param" => Ok(Study::BetaParam),
            "expert_param" => Ok(Study::ExpertParam),
            other => Err(ClueError::unknown("Job", other, &JOB_NAMES)),
        }
    }

    /// Directory the study writes into, below the environment's directory.
    pub fn dir_name(&self, random_envs: bool) -> String {
        match self {
            Study::Baseline(kind) => format!("{}_test", kind.label().to_lowercase().replace(' ', "_")),
            Study::BetaParam => "beta_param_test".to_string(),
            Study::ExpertParam => "expert_param_test".to_string(),
            Study::PanelComparison if random_envs => "panel_comparison_random_envs".to_string(),
            Study::PanelComparison => "panel_comparison".to_string(),
            Study::Degrading => "degrading_expert_test".to_string(),
            Study::Nonuniform => "nonuniform".to_string(),
            Study::PartialObservability => "partially_reliable_experts".to_string(),
        }
    }

    fn random_envs(&self, config: &AppConfig) -> bool {
        match self {
            Study::PanelComparison => config.experiment.random_envs,
            Study::PartialObservability => true,
            _ => false,
        }
    }
}

/// The configured environment, solved.
pub fn build_oracle(config: &AppConfig) -> ClueResult<Arc<Oracle>> {
    let diagram = clue_env::make("RandomSSDP", &config.environment)?;
    Ok(Arc::new(Oracle::new(Arc::new(diagram))?))
}

/// Run `study` with `config` and write its results. Returns the directory
/// the results were written to.
pub async fn run_study(study: &Study, config: &AppConfig) -> ClueResult<PathBuf> {
    let exp = &config.experiment;
    let runner = ExperimentRunner::new(exp)?;
    let random_envs = study.random_envs(config);
    let world = Arc::new(if random_envs {
        World::random_per_run(&config.environment, exp.runs)?
    } else {
        World::fixed(build_oracle(config)?)
    });

    let dir_name = study.dir_name(random_envs);
    let writer = ResultsWriter::new(&exp.output_dir, &world.name(), &dir_name, exp.trials, exp.runs);
    info!(study = %dir_name, env = %world.name(), trials = exp.trials, runs = exp.runs, "study started");

    let trials = exp.trials;
    let agent_config = &config.agent;
    let expert = &config.expert;
    let base = LearnerKind::default();
    match study {
        Study::Baseline(kind) => {
            let label = make_agent("Baseline Agent", *kind, world.oracle(0), trials, agent_config)?
                .name()
                .to_string();
            let agents = vec![
                AgentBlueprint::named_as(&label, "Baseline Agent", *kind, trials, agent_config),
                AgentBlueprint::named("CLUE", *kind, trials, agent_config),
                AgentBlueprint::named("NAF", *kind, trials, agent_config),
            ];
            let panels = unreliable_panels(&config.panels, expert.mu, expert.gamma);
            let results = runner.panel_comparison(&world, &agents, &panels).await?;
            writer.write_comparison(&results)?;
        }
        Study::BetaParam => {
            let others = named_agents(&["True Policy Agent", "Baseline Agent", "NAF"], base, trials, agent_config);
            let panels = unreliable_panels(&config.panels, expert.mu, expert.gamma);
            let (table, grid) = beta_param_test(
                &runner,
                &world,
                &others,
                &PARAM_VALUES,
                &PARAM_VALUES,
                &panels,
                base,
                agent_config,
            )
            .await?;
            writer.write_regret(&table)?;
            writer.write_grid(&grid)?;
        }
        Study::ExpertParam => {
            let agents = named_agents(
                &["True Policy Agent", "Baseline Agent", "NAF", "CLUE", "Decayed Reliance"],
                base,
                trials,
                agent_config,
            );
            let grid = expert_param_test(&runner, &world, &agents, &config.panels, &EXPERT_MUS, &EXPERT_GAMMAS).await?;
            writer.write_grid(&grid)?;
        }
        Study::PanelComparison => {
            let agents = named_agents(&["True Policy Agent", "Baseline Agent", "NAF", "CLUE"], base, trials, agent_config);
            let panels = unreliable_panels(&config.panels, expert.mu, expert.gamma);
            let (results, _) = regret_test(&runner, &world, &agents, &panels).await?;
            writer.write_comparison(&results)?;
        }
        Study::Degrading => {
            let degrading_config = AgentConfig {
                threshold: Some(0.25),
                recency: Some(0.5),
                ..agent_config.clone()
            };
            let agents = named_agents(
                &["True Policy Agent", "Baseline Agent", "CLUE", "NAF", "Decayed Reliance", "PRQ"],
                base,
                trials,
                &degrading_config,
            );
            let panels: Vec<PanelBlueprint> = config
                .panels
                .iter()
                .map(|spec| PanelBlueprint::degrading(spec, expert.degrade_factor, expert.mu, expert.gamma))
                .collect();
            let results = runner.panel_comparison(&world, &agents, &panels).await?;
            writer.write_comparison(&results)?;
        }
        Study::Nonuniform => {
            let oracle = world.oracle(0);
            let mut rng = seeded_rng(derive_seed(exp.seed, &[hash_label("regions")]));
            let regions = Arc::new(StateTable::with_random_values(
                oracle.env().state_space().clone(),
                &[0usize, 1],
                &mut rng,
            )?);
            let panels = vec![PanelBlueprint::nonuniform(
                "Single_Extreme",
                vec![vec![1.0, 0.0]],
                regions,
                expert.mu,
                expert.gamma,
            )];
            let agents = named_agents(&["Baseline Agent", "NAF", "CLUE"], base, trials, agent_config);
            let results = runner.panel_comparison(&world, &agents, &panels).await?;
            writer.write_comparison(&results)?;
        }
        Study::PartialObservability => {
            let max_hidden = config.environment.num_chance;
            let counts: Vec<usize> = PARTIAL_HIDDEN.iter().copied().filter(|h| *h <= max_hidden).collect();
            let mut panels: Vec<PanelBlueprint> = counts
                .iter()
                .map(|h| PanelBlueprint::partial(&h.to_string(), vec![*h], expert.mu, expert.gamma))
                .collect();
            panels.push(PanelBlueprint::partial("Varied", counts.clone(), expert.mu, expert.gamma));
            let agents = named_agents(&["True Policy Agent", "Baseline Agent", "NAF", "CLUE"], base, trials, agent_config);
            let (results, _) = regret_test(&runner, &world, &agents, &panels).await?;
            writer.write_comparison(&results)?;

            let mut rng = seeded_rng(derive_seed(exp.seed, &[hash_label("agreement")]));
            let rows = partial_observability_test(world.oracle(0), max_hidden, exp.runs, exp.trials, &mut rng)?;
            writer.write_agreement(&rows)?;
        }
    }

    writer.write_manifest(config)?;
    info!(dir = %writer.dir().display(), "study finished");
    Ok(writer.dir().to_path_buf())
}
