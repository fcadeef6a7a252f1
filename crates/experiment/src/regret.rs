//! Regret-based comparisons and parameter sweeps.

use crate::results::{AgreementRow, ComparisonResults, ParamGrid, RegretTable};
use crate::runner::{AgentBlueprint, ExperimentRunner, PanelBlueprint, World};
use clue_agents::{make_agent, LearnerKind};
use clue_core::config::{AgentConfig, PanelSpec};
use clue_core::{ClueError, ClueResult, SimRng};
use clue_env::Oracle;
use rand::seq::index::sample;
use std::sync::Arc;
use tracing::info;

/// Mean total regret of every agent against every panel.
pub async fn regret_test(
    runner: &ExperimentRunner,
    world: &Arc<World>,
    agents: &[AgentBlueprint],
    panels: &[PanelBlueprint],
) -> ClueResult<(ComparisonResults, RegretTable)> {
    let results = runner.panel_comparison(world, agents, panels).await?;
    let table = results.regret_table();
    Ok((results, table))
}

pub fn beta_label(alpha: f64, beta: f64) -> String {
    format!("CLUE_{}_{}", alpha, beta)
}

/// CLUE with every initial reliability estimate `[alpha, beta]`, alongside
/// the `others`. The grid holds CLUE's mean regret per panel.
pub async fn beta_param_test(
    runner: &ExperimentRunner,
    world: &Arc<World>,
    others: &[AgentBlueprint],
    alphas: &[f64],
    betas: &[f64],
    panels: &[PanelBlueprint],
    base: LearnerKind,
    config: &AgentConfig,
) -> ClueResult<(RegretTable, ParamGrid)> {
    let mut agents = others.to_vec();
    for &alpha in alphas {
        for &beta in betas {
            let config = AgentConfig {
                initial_estimate: [alpha, beta],
                ..config.clone()
            };
            let trials = runner.trials();
            agents.push(AgentBlueprint::new(beta_label(alpha, beta), move |oracle| {
                make_agent("CLUE", base, oracle, trials, &config)
            }));
        }
    }

    let (_, table) = regret_test(runner, world, &agents, panels).await?;
    let mut grid = ParamGrid::new("beta_param", "alpha", "beta", alphas.to_vec(), betas.to_vec());
    for (i, &alpha) in alphas.iter().enumerate() {
        for (j, &beta) in betas.iter().enumerate() {
            for panel in panels {
                if let Some(row) = table.get(&beta_label(alpha, beta), Some(panel.name())) {
                    grid.set("CLUE", panel.name(), i, j, row.mean);
                }
            }
        }
    }
    Ok((table, grid))
}

/// Regret of every advice-taking agent with panels rebuilt for each expert
/// setting `(mu, gamma)`.
pub async fn expert_param_test(
    runner: &ExperimentRunner,
    world: &Arc<World>,
    agents: &[AgentBlueprint],
    specs: &[PanelSpec],
    mus: &[u64],
    gammas: &[f64],
) -> ClueResult<ParamGrid> {
    let mut grid = ParamGrid::new(
        "expert_param",
        "mu",
        "gamma",
        mus.iter().map(|m| *m as f64).collect(),
        gammas.to_vec(),
    );
    for (i, &mu) in mus.iter().enumerate() {
        for (j, &gamma) in gammas.iter().enumerate() {
            info!(mu, gamma, "expert setting");
            let panels: Vec<PanelBlueprint> = specs
                .iter()
                .map(|s| PanelBlueprint::unreliable(s, mu, gamma))
                .collect();
            let results = runner.panel_comparison(world, agents, &panels).await?;
            for row in results.regret_table().rows {
                if let Some(panel) = &row.panel {
                    grid.set(&row.agent, panel, i, j, row.mean);
                }
            }
        }
    }
    Ok(grid)
}

/// For every number of hidden chance variables up to `max_hidden`, the
/// fraction of `samples` sampled states in which an observer blind to a
/// random subset of that size picks the oracle's action. Each size is tried
/// with `configs` random subsets.
pub fn partial_observability_test(
    oracle: &Oracle,
    max_hidden: usize,
    configs: usize,
    samples: usize,
    rng: &mut SimRng,
) -> ClueResult<Vec<AgreementRow>> {
    let env = oracle.env();
    let chance = env.chance_ids();
    if max_hidden > chance.len() {
        return Err(ClueError::InvalidParameter(format!(
            "cannot hide {} of {} chance variables",
            max_hidden,
            chance.len()
        )));
    }
    if configs == 0 || samples == 0 {
        return Err(ClueError::InvalidParameter(
            "partial observability needs at least one configuration and one sample".to_string(),
        ));
    }

    let mut rows = Vec::with_capacity(max_hidden + 1);
    for hidden_count in 0..=max_hidden {
        let mut agreements = Vec::with_capacity(configs);
        for _ in 0..configs {
            let hidden: Vec<usize> = sample(rng, chance.len(), hidden_count)
                .into_iter()
                .map(|i| chance[i])
                .collect();
            let policy = oracle.partial_policy(&hidden)?;
            let mut agree = 0usize;
            for _ in 0..samples {
                let state = env.reset(rng)?;
                if policy.act(&state) == oracle.act(&state) {
                    agree += 1;
                }
            }
            agreements.push(agree as f64 / samples as f64);
        }
        let mean = agreements.iter().sum::<f64>() / agreements.len() as f64;
        let min = agreements.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = agreements.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        info!(hidden = hidden_count, mean, "partial observability");
        rows.push(AgreementRow {
            hidden: hidden_count,
            mean,
            min,
            max,
        });
    }
    Ok(rows)
}
