//! clue-sim — runs the CLUE advice-taking experiments.
//!
//! Every study reads the layered configuration, applies the command-line
//! overrides and writes its results below the output directory.

use clap::{Parser, Subcommand};
use clue_agents::LearnerKind;
use clue_core::config::AppConfig;
use clue_experiment::{build_oracle, run_study, Study};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "clue-sim")]
#[command(about = "Simulate agents learning from unreliable expert advice")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file (default: ./clue.toml, skipped when missing)
    #[arg(long, global = true, env = "CLUE_CONFIG")]
    config: Option<PathBuf>,

    /// Trials per run (overrides config)
    #[arg(long, global = true)]
    trials: Option<usize>,

    /// Independent runs (overrides config)
    #[arg(long, global = true)]
    runs: Option<usize>,

    /// Base seed for every session (overrides config)
    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Concurrent sessions (overrides config)
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Results directory (overrides config)
    #[arg(long, global = true)]
    output_dir: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the study named by a cluster job script
    Job {
        /// "Epsilon Greedy", "ETE", "Adaptive Greedy", "UCB", "beta_param" or "expert_param"
        name: String,
    },

    /// Baseline learner against CLUE and NAF built on the same learner
    Baseline {
        /// Learner kind, e.g. "UCB" or "Epsilon Greedy"
        kind: LearnerKind,
    },

    /// True policy, baseline, NAF and CLUE against every configured panel
    PanelComparison {
        /// Generate a fresh environment for every run
        #[arg(long, default_value_t = false)]
        random_envs: bool,
    },

    /// Sweep CLUE's initial reliability estimate
    BetaParam,

    /// Sweep the experts' advice period and regret tolerance
    ExpertParam,

    /// Experts whose reliability decays as they advise
    Degrading,

    /// An expert whose reliability depends on the state
    Nonuniform,

    /// Experts blind to some chance variables
    PartialObservability,

    /// Print the configured environment
    Describe {
        /// Include every probability and reward table
        #[arg(long, default_value_t = false)]
        tables: bool,
    },
}

impl Cli {
    fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(trials) = self.trials {
            config.experiment.trials = trials;
        }
        if let Some(runs) = self.runs {
            config.experiment.runs = runs;
        }
        if let Some(seed) = self.seed {
            config.experiment.seed = seed;
        }
        if let Some(workers) = self.workers {
            config.experiment.workers = workers;
        }
        if let Some(dir) = &self.output_dir {
            config.experiment.output_dir = dir.clone();
        }
        if let Commands::PanelComparison { random_envs: true } = self.command {
            config.experiment.random_envs = true;
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "clue_sim=info,clue_experiment=info".into());
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let mut config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    cli.apply_overrides(&mut config);

    info!(
        trials = config.experiment.trials,
        runs = config.experiment.runs,
        seed = config.experiment.seed,
        workers = config.experiment.workers,
        "Configuration loaded"
    );

    let study = match &cli.command {
        Commands::Job { name } => Study::from_job(name)?,
        Commands::Baseline { kind } => Study::Baseline(*kind),
        Commands::PanelComparison { .. } => Study::PanelComparison,
        Commands::BetaParam => Study::BetaParam,
        Commands::ExpertParam => Study::ExpertParam,
        Commands::Degrading => Study::Degrading,
        Commands::Nonuniform => Study::Nonuniform,
        Commands::PartialObservability => Study::PartialObservability,
        Commands::Describe { tables } => {
            let oracle = build_oracle(&config)?;
            println!("{}", oracle.env());
            println!("optimal expected utility: {:.4}", oracle.value());
            if *tables {
                print!("{}", oracle.env().describe_tables());
            }
            return Ok(());
        }
    };

    let dir = run_study(&study, &config).await?;
    info!(dir = %dir.display(), "Results written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_overrides_after_subcommand() {
        let cli = Cli::parse_from(["clue-sim", "panel-comparison", "--random-envs", "--trials", "50", "--seed", "3"]);
        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.experiment.trials, 50);
        assert_eq!(config.experiment.seed, 3);
        assert!(config.experiment.random_envs);
        assert_eq!(config.experiment.runs, AppConfig::default().experiment.runs);
    }

    #[test]
    fn test_baseline_kind_parsed() {
        let cli = Cli::parse_from(["clue-sim", "baseline", "UCB"]);
        assert!(matches!(cli.command, Commands::Baseline { kind: LearnerKind::Ucb }));
        assert!(Cli::try_parse_from(["clue-sim", "baseline", "SARSA"]).is_err());
    }

    #[test]
    fn test_job_name_with_spaces() {
        let cli = Cli::parse_from(["clue-sim", "job", "Epsilon Greedy"]);
        match cli.command {
            Commands::Job { name } => assert_eq!(Study::from_job(&name).unwrap(), Study::Baseline(LearnerKind::EpsilonGreedy)),
            other => panic!("unexpected command {:?}", other),
        }
    }
}
