//! CLUE: cautiously learning with unreliable experts.
//!
//! The agent wraps an unassisted learner. While exploring it may replace a
//! random action by the action its experts recommend, weighing every expert
//! by an estimated reliability `rho`. Reliability is estimated from how often
//! an expert's advice agrees with the learner's own best estimate.

use crate::advice::{advice_posterior, AdviceBook};
use crate::agent::{chance, check_trials, check_unit, Agent, Learner, LinearSchedule};
use clue_core::config::AgentConfig;
use clue_core::{argmax, Action, ClueError, ClueResult, SimRng, State};
use clue_env::InfluenceDiagram;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Reliability estimate of one expert.
#[derive(Debug, Clone)]
struct Belief {
    optimal: f64,
    suboptimal: f64,
    rho: f64,
    recent_rho: f64,
    window: VecDeque<bool>,
}

impl Belief {
    fn new(prior: [f64; 2]) -> Self {
        let rho = prior[0] / (prior[0] + prior[1]);
        Self {
            optimal: prior[0],
            suboptimal: prior[1],
            rho,
            recent_rho: rho,
            window: VecDeque::new(),
        }
    }

    fn refresh(&mut self, recency: Option<f64>) -> f64 {
        self.rho = match recency {
            Some(_) => self.recent_rho.max(0.0),
            None => {
                let total = self.optimal + self.suboptimal;
                if total > 0.0 {
                    (self.optimal / total).max(0.0)
                } else {
                    self.rho
                }
            }
        };
        self.rho
    }

    fn evaluate(&mut self, optimal: bool, sliding_window: Option<usize>, recency: Option<f64>) {
        match sliding_window {
            Some(size) => {
                self.window.push_back(optimal);
                while self.window.len() > size {
                    self.window.pop_front();
                }
                self.optimal = self.window.iter().filter(|o| **o).count() as f64;
                self.suboptimal = self.window.len() as f64 - self.optimal;
            }
            None if optimal => self.optimal += 1.0,
            None => self.suboptimal += 1.0,
        }
        if let Some(lambda) = recency {
            let hit = if optimal { 1.0 } else { 0.0 };
            self.recent_rho = (1.0 - lambda) * self.recent_rho + lambda * hit;
        }
    }
}

pub struct ClueAgent {
    env: Arc<InfluenceDiagram>,
    learner: Box<dyn Learner>,
    naive: bool,
    threshold: f64,
    schedule: LinearSchedule,
    prior: [f64; 2],
    regular_update: bool,
    sliding_window: Option<usize>,
    recency: Option<f64>,
    book: AdviceBook,
    beliefs: Vec<Belief>,
    history: Vec<Vec<f64>>,
    trial_count: u64,
}

impl ClueAgent {
    pub fn new(
        env: Arc<InfluenceDiagram>,
        learner: Box<dyn Learner>,
        trials: usize,
        naive: bool,
        config: &AgentConfig,
    ) -> ClueResult<Self> {
        let trials = check_trials(trials)?;
        let [a, b] = config.initial_estimate;
        if a < 0.0 || b < 0.0 || a + b <= 0.0 {
            return Err(ClueError::InvalidParameter(format!(
                "initial_estimate [{}, {}] must be non-negative with a positive sum",
                a, b
            )));
        }
        if config.sliding_window == Some(0) {
            return Err(ClueError::InvalidParameter(
                "sliding_window must hold at least one evaluation".to_string(),
            ));
        }
        if let Some(lambda) = config.recency {
            check_unit("recency", lambda)?;
        }
        let (_, size_a) = env.size();
        let threshold = match config.threshold {
            Some(t) => check_unit("threshold", t)?,
            None => (2.0 / size_a as f64).min(0.5),
        };

        Ok(Self {
            env,
            learner,
            naive,
            threshold,
            schedule: LinearSchedule::new(config.eps_start, config.eps_end, config.eps_fraction, trials),
            prior: config.initial_estimate,
            regular_update: config.regular_update,
            sliding_window: config.sliding_window,
            recency: config.recency,
            book: AdviceBook::default(),
            beliefs: Vec::new(),
            history: Vec::new(),
            trial_count: 0,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn epsilon(&self) -> f64 {
        self.schedule.value(self.trial_count)
    }

    /// Current reliability estimate of every expert.
    pub fn rhos(&self) -> Vec<f64> {
        self.beliefs.iter().map(|b| b.rho).collect()
    }

    /// The advised action to follow in `state`, if the agent decides to trust
    /// its experts this time.
    fn trusted_advice(&self, state: &State, rng: &mut SimRng) -> Option<Action> {
        let stored = self.book.for_state(state);
        if stored.is_empty() {
            return None;
        }
        if self.naive {
            let rhos: Vec<f64> = stored.iter().map(|(e, _)| self.beliefs[*e].rho).collect();
            let best = argmax(&rhos);
            return chance(rhos[best], rng).then(|| stored[best].1.clone());
        }

        let advice: Vec<(usize, usize)> = stored
            .iter()
            .map(|(e, a)| (*e, self.env.action_index(a)))
            .collect();
        let (_, size_a) = self.env.size();
        let (best, p) = advice_posterior(&advice, &self.rhos(), size_a)?;
        if p < self.threshold {
            return None;
        }
        chance(p, rng).then(|| self.env.action_at(best))
    }
}

impl Agent for ClueAgent {
    fn name(&self) -> &str {
        if self.naive {
            "CLUE (Naive)"
        } else {
            "CLUE"
        }
    }

    fn act(&mut self, state: &State, explore: bool, rng: &mut SimRng) -> Action {
        let epsilon = self.epsilon();
        let recency = self.recency;
        let rhos: Vec<f64> = self.beliefs.iter_mut().map(|b| b.refresh(recency)).collect();
        self.history.push(rhos);

        if !explore || !chance(epsilon, rng) {
            return self.learner.act(state, false, rng);
        }
        if let Some(action) = self.trusted_advice(state, rng) {
            metrics::counter!("clue_advice_followed_total", "agent" => self.name().to_string()).increment(1);
            return action;
        }
        let (_, size_a) = self.env.size();
        self.env.action_at(rng.gen_range(0..size_a))
    }

    fn learn(&mut self, state: &State, action: &Action, reward: f64, advice: &[Option<Action>]) {
        self.trial_count += 1;
        self.learner.learn(state, action, reward, &[]);
        self.book.record(state, advice);

        let best = self.learner.best_estimate(state);
        for (expert, belief) in self.beliefs.iter_mut().enumerate() {
            let latest = if self.regular_update {
                self.book.latest(expert, state)
            } else {
                advice.get(expert).and_then(Option::as_ref)
            };
            if let Some(advised) = latest {
                let optimal = self.learner.estimate(state, advised) >= best;
                belief.evaluate(optimal, self.sliding_window, self.recency);
            }
        }
    }

    fn reset(&mut self, experts: &[String]) {
        self.trial_count = 0;
        self.learner.reset(experts);
        self.book = AdviceBook::new(experts, self.env.state_space());
        self.beliefs = experts.iter().map(|_| Belief::new(self.prior)).collect();
        self.history.clear();
        debug!(agent = %self.name(), experts = experts.len(), "reset");
    }

    fn takes_advice(&self) -> bool {
        true
    }

    fn rho_history(&self) -> Option<&[Vec<f64>]> {
        Some(&self.history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EpsilonGreedyAgent, TruePolicyAgent};
    use clue_core::seeded_rng;
    use clue_env::{Oracle, RandomSsdp};

    fn env() -> Arc<InfluenceDiagram> {
        Arc::new(RandomSsdp::new(2, 2, (-1.0, 1.0)).build(9).unwrap())
    }

    fn experts(n: usize) -> Vec<String> {
        (0..n).map(|i| i.to_string()).collect()
    }

    fn clue(env: &Arc<InfluenceDiagram>, naive: bool, config: &AgentConfig) -> ClueAgent {
        let learner = EpsilonGreedyAgent::new(env.clone(), 100, config).unwrap();
        ClueAgent::new(env.clone(), Box::new(learner), 100, naive, config).unwrap()
    }

    #[test]
    fn test_default_threshold() {
        let agent = clue(&env(), false, &AgentConfig::default());
        // |A| = 4
        assert_eq!(agent.threshold(), 0.5);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let env = env();
        let learner = || Box::new(EpsilonGreedyAgent::new(env.clone(), 10, &AgentConfig::default()).unwrap());
        let bad_prior = AgentConfig {
            initial_estimate: [0.0, 0.0],
            ..AgentConfig::default()
        };
        assert!(ClueAgent::new(env.clone(), learner(), 10, false, &bad_prior).is_err());
        let bad_window = AgentConfig {
            sliding_window: Some(0),
            ..AgentConfig::default()
        };
        assert!(ClueAgent::new(env.clone(), learner(), 10, false, &bad_window).is_err());
        assert!(ClueAgent::new(env.clone(), learner(), 0, false, &AgentConfig::default()).is_err());
    }

    #[test]
    fn test_rho_tracks_agreement_with_learner() {
        let env = env();
        let oracle = Arc::new(Oracle::new(env.clone()).unwrap());
        let learner = TruePolicyAgent::new(oracle.clone());
        let mut agent = ClueAgent::new(env.clone(), Box::new(learner), 100, false, &AgentConfig::default()).unwrap();
        agent.reset(&experts(2));

        let mut rng = seeded_rng(0);
        let state = State(vec![1, 0]);
        let good = oracle.act(&state);
        let bad = (0..4)
            .map(|a| env.action_at(a))
            .find(|a| oracle.expected_utility(&state, a) < oracle.expected_utility(&state, &good))
            .unwrap();
        for _ in 0..8 {
            agent.act(&state, true, &mut rng);
            agent.learn(&state, &good, 0.0, &[Some(good.clone()), Some(bad.clone())]);
        }
        agent.act(&state, true, &mut rng);
        let rhos = agent.rhos();
        // Prior [1, 1] plus eight evaluations each.
        assert!((rhos[0] - 0.9).abs() < 1e-12);
        assert!((rhos[1] - 0.1).abs() < 1e-12);
        let history = agent.rho_history().unwrap();
        assert_eq!(history.len(), 9);
        assert_eq!(history[0], vec![0.5, 0.5]);
    }

    #[test]
    fn test_sliding_window_forgets() {
        let env = env();
        let oracle = Arc::new(Oracle::new(env.clone()).unwrap());
        let config = AgentConfig {
            sliding_window: Some(2),
            ..AgentConfig::default()
        };
        let learner = TruePolicyAgent::new(oracle.clone());
        let mut agent = ClueAgent::new(env.clone(), Box::new(learner), 100, false, &config).unwrap();
        agent.reset(&experts(1));
        let state = State(vec![0, 0]);
        let good = oracle.act(&state);
        let bad = (0..4)
            .map(|a| env.action_at(a))
            .find(|a| oracle.expected_utility(&state, a) < oracle.expected_utility(&state, &good))
            .unwrap();

        let mut rng = seeded_rng(0);
        for _ in 0..5 {
            agent.learn(&state, &good, 0.0, &[Some(bad.clone())]);
        }
        agent.learn(&state, &good, 0.0, &[Some(good.clone())]);
        agent.learn(&state, &good, 0.0, &[Some(good.clone())]);
        agent.act(&state, true, &mut rng);
        assert_eq!(agent.rhos(), vec![1.0]);
    }

    #[test]
    fn test_recency_weighting() {
        let env = env();
        let oracle = Arc::new(Oracle::new(env.clone()).unwrap());
        let config = AgentConfig {
            recency: Some(0.5),
            ..AgentConfig::default()
        };
        let learner = TruePolicyAgent::new(oracle.clone());
        let mut agent = ClueAgent::new(env.clone(), Box::new(learner), 100, false, &config).unwrap();
        agent.reset(&experts(1));
        let state = State(vec![1, 1]);
        let good = oracle.act(&state);
        agent.learn(&state, &good, 0.0, &[Some(good.clone())]);
        let mut rng = seeded_rng(0);
        agent.act(&state, true, &mut rng);
        assert!((agent.rhos()[0] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_irregular_update_only_judges_new_advice() {
        let env = env();
        let oracle = Arc::new(Oracle::new(env.clone()).unwrap());
        let config = AgentConfig {
            regular_update: false,
            ..AgentConfig::default()
        };
        let learner = TruePolicyAgent::new(oracle.clone());
        let mut agent = ClueAgent::new(env.clone(), Box::new(learner), 100, false, &config).unwrap();
        agent.reset(&experts(1));
        let state = State(vec![0, 1]);
        let good = oracle.act(&state);
        agent.learn(&state, &good, 0.0, &[Some(good.clone())]);
        agent.learn(&state, &good, 0.0, &[None]);
        agent.learn(&state, &good, 0.0, &[None]);
        let mut rng = seeded_rng(0);
        agent.act(&state, true, &mut rng);
        // One evaluation on top of the uniform prior.
        assert!((agent.rhos()[0] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_follows_reliable_advice_while_exploring() {
        let env = env();
        let mut agent = clue(&env, false, &AgentConfig::default());
        agent.reset(&experts(1));
        let state = State(vec![1, 0]);
        let advised = Action(vec![1, 1]);
        // The epsilon-greedy learner has Q = 0 everywhere, so the advice is
        // judged optimal every time.
        for _ in 0..20 {
            agent.learn(&State(vec![1, 0]), &Action(vec![0, 0]), 0.0, &[Some(advised.clone())]);
        }
        let mut rng = seeded_rng(4);
        let followed = (0..200)
            .filter(|_| agent.act(&state, true, &mut rng) == advised)
            .count();
        // rho = 21/22 and epsilon = 0.75: the advice is followed far more often
        // than the 1/4 chance of a random or greedy action hitting it.
        assert!(followed > 120, "followed {} times", followed);
    }

    #[test]
    fn test_naive_uses_single_best_expert() {
        let env = env();
        let config = AgentConfig {
            eps_start: 1.0,
            eps_end: 1.0,
            ..AgentConfig::default()
        };
        let mut agent = clue(&env, true, &config);
        assert_eq!(agent.name(), "CLUE (Naive)");
        agent.reset(&experts(1));
        let state = State(vec![0, 0]);
        let advised = Action(vec![0, 1]);
        for _ in 0..50 {
            agent.learn(&state, &Action(vec![1, 1]), 0.0, &[Some(advised.clone())]);
        }
        let mut rng = seeded_rng(5);
        let followed = (0..200).filter(|_| agent.act(&state, true, &mut rng) == advised).count();
        assert!(followed > 170, "followed {} times", followed);
    }

    #[test]
    fn test_no_advice_means_no_rho_bias() {
        let env = env();
        let mut agent = clue(&env, false, &AgentConfig::default());
        agent.reset(&[]);
        let mut rng = seeded_rng(0);
        agent.act(&State(vec![0, 0]), true, &mut rng);
        assert_eq!(agent.rho_history().unwrap(), &[Vec::<f64>::new()]);
    }
}
