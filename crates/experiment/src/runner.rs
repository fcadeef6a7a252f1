//! Learning sessions, and the worker pool that runs many of them.

use crate::results::ComparisonResults;
use clue_agents::{make_agent, Agent, LearnerKind};
use clue_core::config::{AgentConfig, EnvironmentConfig, ExperimentConfig, PanelSpec};
use clue_core::{derive_seed, hash_label, seeded_rng, ClueError, ClueResult, SimRng, StateTable};
use clue_env::{Oracle, RandomSsdp};
use clue_experts::{make_degrading_panels, make_nonuniform_panels, make_partial_panels, Panel};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

/// Outcome of one learning session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub rewards: Vec<f64>,
    /// Summed expected-utility gap to the optimal policy.
    pub regret: f64,
    /// Reliability estimates per trial, one entry per expert.
    pub rhos: Option<Vec<Vec<f64>>>,
    pub experts: Vec<String>,
}

/// One session of `trials` trials. The agent is reset first and advised by
/// `panel` when one is given.
pub fn run_session(
    oracle: &Oracle,
    agent: &mut dyn Agent,
    mut panel: Option<&mut Panel>,
    trials: usize,
    rng: &mut SimRng,
) -> ClueResult<Session> {
    let env = oracle.env();
    let experts = panel.as_ref().map(|p| p.expert_names()).unwrap_or_default();
    agent.reset(&experts);
    if let Some(p) = panel.as_deref_mut() {
        p.reset();
    }

    let mut rewards = Vec::with_capacity(trials);
    let mut regret = 0.0;
    let mut advised = 0u64;
    for _ in 0..trials {
        let state = env.reset(rng)?;
        let action = agent.act(&state, true, rng);
        let reward = env.step(&state, &action)?;
        regret += oracle.expected_utility(&state, &oracle.act(&state)) - oracle.expected_utility(&state, &action);
        let advice = match panel.as_deref_mut() {
            Some(p) => p.advise(&state, &action, reward, rng),
            None => Vec::new(),
        };
        advised += advice.iter().filter(|a| a.is_some()).count() as u64;
        agent.learn(&state, &action, reward, &advice);
        rewards.push(reward);
    }

    metrics::counter!("clue_trials_total").increment(trials as u64);
    metrics::counter!("clue_advice_given_total").increment(advised);
    Ok(Session {
        rewards,
        regret,
        rhos: agent.rho_history().map(|h| h.to_vec()),
        experts,
    })
}

pub fn run_panel(
    oracle: &Oracle,
    agent: &mut dyn Agent,
    panel: &mut Panel,
    trials: usize,
    rng: &mut SimRng,
) -> ClueResult<Vec<f64>> {
    Ok(run_session(oracle, agent, Some(panel), trials, rng)?.rewards)
}

pub fn run_standard(oracle: &Oracle, agent: &mut dyn Agent, trials: usize, rng: &mut SimRng) -> ClueResult<Vec<f64>> {
    Ok(run_session(oracle, agent, None, trials, rng)?.rewards)
}

/// Total regret of one session against the oracle's policy.
pub fn regret(
    oracle: &Oracle,
    agent: &mut dyn Agent,
    panel: Option<&mut Panel>,
    trials: usize,
    rng: &mut SimRng,
) -> ClueResult<f64> {
    Ok(run_session(oracle, agent, panel, trials, rng)?.regret)
}

/// The environment(s) an experiment runs in.
#[derive(Debug, Clone)]
pub enum World {
    Fixed(Arc<Oracle>),
    /// A freshly generated random SSDP per run, seeded by the run index.
    RandomPerRun { name: String, oracles: Vec<Arc<Oracle>> },
}

impl World {
    pub fn fixed(oracle: Arc<Oracle>) -> Self {
        World::Fixed(oracle)
    }

    pub fn random_per_run(config: &EnvironmentConfig, runs: usize) -> ClueResult<Self> {
        let generator = RandomSsdp::new(config.num_chance, config.num_decision, (config.reward_min, config.reward_max));
        let oracles = (0..runs.max(1))
            .map(|run| {
                let env = generator.build(run as u64)?;
                Ok(Arc::new(Oracle::new(Arc::new(env))?))
            })
            .collect::<ClueResult<Vec<_>>>()?;
        Ok(World::RandomPerRun {
            name: generator.name(),
            oracles,
        })
    }

    pub fn name(&self) -> String {
        match self {
            World::Fixed(oracle) => oracle.env().name().to_string(),
            World::RandomPerRun { name, .. } => name.clone(),
        }
    }

    pub fn oracle(&self, run: usize) -> &Arc<Oracle> {
        match self {
            World::Fixed(oracle) => oracle,
            World::RandomPerRun { oracles, .. } => &oracles[run % oracles.len()],
        }
    }
}

type AgentFactory = dyn Fn(&Arc<Oracle>) -> ClueResult<Box<dyn Agent>> + Send + Sync;
type PanelFactory = dyn Fn(&Arc<Oracle>, &mut SimRng) -> ClueResult<Panel> + Send + Sync;

/// A labelled recipe for a fresh agent. Every session builds its own agent,
/// so sessions share no state.
#[derive(Clone)]
pub struct AgentBlueprint {
    label: String,
    factory: Arc<AgentFactory>,
}

impl AgentBlueprint {
    pub fn new(
        label: impl Into<String>,
        factory: impl Fn(&Arc<Oracle>) -> ClueResult<Box<dyn Agent>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            factory: Arc::new(factory),
        }
    }

    /// An agent from the named catalogue, labelled with its catalogue name.
    pub fn named(name: &str, base: LearnerKind, trials: usize, config: &AgentConfig) -> Self {
        Self::named_as(name, name, base, trials, config)
    }

    pub fn named_as(label: &str, name: &str, base: LearnerKind, trials: usize, config: &AgentConfig) -> Self {
        let name = name.to_string();
        let config = config.clone();
        Self::new(label, move |oracle| make_agent(&name, base, oracle, trials, &config))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn build(&self, oracle: &Arc<Oracle>) -> ClueResult<Box<dyn Agent>> {
        (self.factory)(oracle)
    }
}

pub fn named_agents(names: &[&str], base: LearnerKind, trials: usize, config: &AgentConfig) -> Vec<AgentBlueprint> {
    names
        .iter()
        .map(|name| AgentBlueprint::named(name, base, trials, config))
        .collect()
}

/// A named recipe for a fresh panel of experts.
#[derive(Clone)]
pub struct PanelBlueprint {
    name: String,
    factory: Arc<PanelFactory>,
}

impl PanelBlueprint {
    pub fn new(
        name: impl Into<String>,
        factory: impl Fn(&Arc<Oracle>, &mut SimRng) -> ClueResult<Panel> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    /// Unreliable experts with fixed reliabilities.
    pub fn unreliable(spec: &PanelSpec, mu: u64, gamma: f64) -> Self {
        let spec = spec.clone();
        Self::new(spec.name.clone(), move |oracle, _| {
            Panel::from_rhos(spec.name.clone(), &spec.rhos, oracle, mu, gamma)
        })
    }

    pub fn degrading(spec: &PanelSpec, degrade_factor: f64, mu: u64, gamma: f64) -> Self {
        let spec = spec.clone();
        Self::new(spec.name.clone(), move |oracle, _| {
            single(make_degrading_panels(std::slice::from_ref(&spec), oracle, degrade_factor, mu, gamma)?)
        })
    }

    pub fn nonuniform(
        name: &str,
        experts: Vec<Vec<f64>>,
        regions: Arc<StateTable<usize>>,
        mu: u64,
        gamma: f64,
    ) -> Self {
        let spec = vec![(name.to_string(), experts)];
        Self::new(name, move |oracle, _| {
            single(make_nonuniform_panels(&spec, oracle, &regions, mu, gamma)?)
        })
    }

    /// Experts blind to a random subset of chance variables, one entry per
    /// expert giving the size of that subset.
    pub fn partial(name: &str, hidden_counts: Vec<usize>, mu: u64, gamma: f64) -> Self {
        let spec = vec![(name.to_string(), hidden_counts)];
        Self::new(name, move |oracle, rng| single(make_partial_panels(&spec, oracle, mu, gamma, rng)?))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build(&self, oracle: &Arc<Oracle>, rng: &mut SimRng) -> ClueResult<Panel> {
        (self.factory)(oracle, rng)
    }
}

fn single(panels: Vec<Panel>) -> ClueResult<Panel> {
    panels
        .into_iter()
        .next()
        .ok_or_else(|| ClueError::Model("panel builder produced no panel".to_string()))
}

pub fn unreliable_panels(specs: &[PanelSpec], mu: u64, gamma: f64) -> Vec<PanelBlueprint> {
    specs.iter().map(|s| PanelBlueprint::unreliable(s, mu, gamma)).collect()
}

#[derive(Debug, Clone, Copy)]
struct Job {
    agent: usize,
    panel: Option<usize>,
    run: usize,
}

/// Runs agent/panel/run sessions on a bounded pool of blocking workers.
#[derive(Debug, Clone)]
pub struct ExperimentRunner {
    trials: usize,
    runs: usize,
    seed: u64,
    workers: usize,
    display_interval: usize,
}

impl ExperimentRunner {
    pub fn new(config: &ExperimentConfig) -> ClueResult<Self> {
        if config.trials == 0 || config.runs == 0 {
            return Err(ClueError::InvalidParameter(format!(
                "an experiment needs at least one trial and one run (got {} trials, {} runs)",
                config.trials, config.runs
            )));
        }
        Ok(Self {
            trials: config.trials,
            runs: config.runs,
            seed: config.seed,
            workers: config.workers.max(1),
            display_interval: config.display_interval.max(1),
        })
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    pub fn runs(&self) -> usize {
        self.runs
    }

    /// Seed of the session for `(agent, panel, run)`. Independent of the
    /// number of workers and of the order jobs finish in.
    pub fn session_seed(&self, agent: &str, panel: Option<&str>, run: usize) -> u64 {
        derive_seed(
            self.seed,
            &[hash_label(agent), hash_label(panel.unwrap_or("")), run as u64],
        )
    }

    /// Seed used to build `panel` in `run`, shared by every agent so they
    /// all face the same experts.
    fn panel_seed(&self, panel: &str, run: usize) -> u64 {
        derive_seed(self.seed, &[hash_label(panel), run as u64, 1])
    }

    /// Every agent against every panel, `runs` times. Agents that ignore
    /// advice run once per run, without a panel.
    pub async fn panel_comparison(
        &self,
        world: &Arc<World>,
        agents: &[AgentBlueprint],
        panels: &[PanelBlueprint],
    ) -> ClueResult<ComparisonResults> {
        check_unique("agent", agents.iter().map(|a| a.label()))?;
        check_unique("panel", panels.iter().map(|p| p.name()))?;

        let mut jobs = Vec::new();
        for (a, blueprint) in agents.iter().enumerate() {
            let takes_advice = blueprint.build(world.oracle(0))?.takes_advice();
            for run in 0..self.runs {
                if takes_advice && !panels.is_empty() {
                    jobs.extend((0..panels.len()).map(|p| Job {
                        agent: a,
                        panel: Some(p),
                        run,
                    }));
                } else {
                    jobs.push(Job { agent: a, panel: None, run });
                }
            }
        }

        info!(
            world = %world.name(),
            agents = agents.len(),
            panels = panels.len(),
            jobs = jobs.len(),
            workers = self.workers,
            trials = self.trials,
            "starting panel comparison"
        );

        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut set = JoinSet::new();
        for job in jobs {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| ClueError::Internal(e.into()))?;
            let world = Arc::clone(world);
            let agent = agents[job.agent].clone();
            let panel = job.panel.map(|p| panels[p].clone());
            let trials = self.trials;
            let seed = self.session_seed(agent.label(), panel.as_ref().map(|p| p.name()), job.run);
            let panel_seed = panel.as_ref().map(|p| self.panel_seed(p.name(), job.run));

            set.spawn_blocking(move || {
                let _permit = permit;
                let oracle = world.oracle(job.run);
                let mut learner = agent.build(oracle)?;
                let mut experts = match (&panel, panel_seed) {
                    (Some(blueprint), Some(s)) => Some(blueprint.build(oracle, &mut seeded_rng(s))?),
                    _ => None,
                };
                let mut rng = seeded_rng(seed);
                let session = run_session(oracle, learner.as_mut(), experts.as_mut(), trials, &mut rng)?;
                debug!(agent = %agent.label(), run = job.run, regret = session.regret, "session finished");
                Ok::<_, ClueError>((job, session))
            });
        }

        let mut results = ComparisonResults::new(
            self.trials,
            self.runs,
            agents.iter().map(|a| a.label().to_string()).collect(),
            panels.iter().map(|p| p.name().to_string()).collect(),
        );
        while let Some(joined) = set.join_next().await {
            let (job, session) = joined.map_err(|e| ClueError::Internal(e.into()))??;
            let agent = agents[job.agent].label();
            let panel = job.panel.map(|p| panels[p].name());
            if job.run % self.display_interval == 0 {
                info!(agent = %agent, panel = panel.unwrap_or("-"), run = job.run, "run complete");
            }
            metrics::counter!("clue_runs_completed_total").increment(1);
            results.insert(agent, panel, job.run, session);
        }
        Ok(results)
    }
}

fn check_unique<'a>(kind: &str, labels: impl IntoIterator<Item = &'a str>) -> ClueResult<()> {
    let mut seen = HashSet::new();
    for label in labels {
        if !seen.insert(label) {
            return Err(ClueError::InvalidParameter(format!("duplicate {} label '{}'", kind, label)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clue_core::config::{default_panels, PanelSpec};

    fn oracle() -> Arc<Oracle> {
        let env = RandomSsdp::new(3, 2, (-1.0, 1.0)).build(2).unwrap();
        Arc::new(Oracle::new(Arc::new(env)).unwrap())
    }

    #[test]
    fn test_true_policy_has_no_regret() {
        let oracle = oracle();
        let mut agent = make_agent("True Policy Agent", LearnerKind::default(), &oracle, 50, &AgentConfig::default()).unwrap();
        let mut rng = seeded_rng(0);
        let total = regret(&oracle, agent.as_mut(), None, 50, &mut rng).unwrap();
        assert!(total.abs() < 1e-9);
    }

    #[test]
    fn test_panel_session_records_rhos() {
        let oracle = oracle();
        let mut agent = make_agent("CLUE", LearnerKind::default(), &oracle, 200, &AgentConfig::default()).unwrap();
        let mut panel = Panel::from_rhos("Varied", &[0.0, 1.0], &oracle, 1, 0.0).unwrap();
        let mut rng = seeded_rng(1);
        let session = run_session(&oracle, agent.as_mut(), Some(&mut panel), 200, &mut rng).unwrap();
        assert_eq!(session.rewards.len(), 200);
        assert_eq!(session.experts, vec!["0", "1"]);
        let rhos = session.rhos.unwrap();
        assert_eq!(rhos.len(), 200);
        assert!(rhos.iter().all(|row| row.len() == 2));
    }

    #[test]
    fn test_rejects_empty_experiment() {
        let config = ExperimentConfig {
            runs: 0,
            ..ExperimentConfig::default()
        };
        assert!(ExperimentRunner::new(&config).is_err());
    }

    #[test]
    fn test_session_seed_depends_on_every_component() {
        let runner = ExperimentRunner::new(&ExperimentConfig::default()).unwrap();
        let base = runner.session_seed("CLUE", Some("Single_Bad"), 0);
        assert_ne!(base, runner.session_seed("NAF", Some("Single_Bad"), 0));
        assert_ne!(base, runner.session_seed("CLUE", Some("Single_Good"), 0));
        assert_ne!(base, runner.session_seed("CLUE", Some("Single_Bad"), 1));
    }

    #[tokio::test]
    async fn test_results_independent_of_worker_count() {
        let world = Arc::new(World::fixed(oracle()));
        let agents = named_agents(&["Baseline Agent", "CLUE"], LearnerKind::default(), 60, &AgentConfig::default());
        let panels = unreliable_panels(&default_panels(), 5, 0.0);

        let mut outputs = Vec::new();
        for workers in [1, 3] {
            let config = ExperimentConfig {
                trials: 60,
                runs: 3,
                workers,
                ..ExperimentConfig::default()
            };
            let runner = ExperimentRunner::new(&config).unwrap();
            outputs.push(runner.panel_comparison(&world, &agents, &panels).await.unwrap());
        }
        assert_eq!(
            outputs[0].rewards("CLUE", Some("Single_Good")),
            outputs[1].rewards("CLUE", Some("Single_Good"))
        );
        assert_eq!(outputs[0].rewards("Baseline Agent", None), outputs[1].rewards("Baseline Agent", None));
        assert!(outputs[0].rewards("Baseline Agent", Some("Single_Good")).is_none());
    }

    #[tokio::test]
    async fn test_duplicate_labels_rejected() {
        let world = Arc::new(World::fixed(oracle()));
        let agents = named_agents(&["CLUE", "CLUE"], LearnerKind::default(), 10, &AgentConfig::default());
        let runner = ExperimentRunner::new(&ExperimentConfig::default()).unwrap();
        assert!(runner.panel_comparison(&world, &agents, &[]).await.is_err());

        let agents = named_agents(&["CLUE"], LearnerKind::default(), 10, &AgentConfig::default());
        let panels = unreliable_panels(&[PanelSpec::new("Good", vec![1.0]), PanelSpec::new("Good", vec![0.0])], 1, 0.0);
        assert!(runner.panel_comparison(&world, &agents, &panels).await.is_err());
    }

    #[tokio::test]
    async fn test_panel_may_share_an_agent_label() {
        let world = Arc::new(World::fixed(oracle()));
        let agents = named_agents(&["CLUE", "NAF"], LearnerKind::default(), 10, &AgentConfig::default());
        let panels = unreliable_panels(&[PanelSpec::new("CLUE", vec![1.0])], 1, 0.0);
        let runner = ExperimentRunner::new(&ExperimentConfig {
            trials: 10,
            runs: 1,
            ..ExperimentConfig::default()
        })
        .unwrap();
        let results = runner.panel_comparison(&world, &agents, &panels).await.unwrap();
        assert_eq!(results.rewards("CLUE", Some("CLUE")).unwrap().len(), 1);
        assert!(results.rewards("NAF", Some("CLUE")).is_some());
    }

    #[test]
    fn test_random_world_differs_per_run() {
        let config = EnvironmentConfig {
            num_chance: 3,
            num_decision: 1,
            ..EnvironmentConfig::default()
        };
        let world = World::random_per_run(&config, 2).unwrap();
        assert_eq!(world.name(), "Random (3,1)");
        assert_ne!(
            world.oracle(0).env().describe_tables(),
            world.oracle(1).env().describe_tables()
        );
    }
}
