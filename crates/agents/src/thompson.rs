use crate::agent::{argmax_random, Agent, Learner};
use clue_core::config::AgentConfig;
use clue_core::{argmax, Action, SimRng, State};
use clue_env::InfluenceDiagram;
use rand_distr::{Distribution, Gamma, Normal};
use std::sync::Arc;

const MIN_PRECISION: f64 = 0.001;

#[derive(Debug, Clone, Copy)]
struct NormalGamma {
    alpha: f64,
    beta: f64,
    mean: f64,
    visits: u64,
}

/// Thompson sampling with a Normal-Gamma posterior per state-action pair.
#[derive(Debug, Clone)]
pub struct ThompsonAgent {
    env: Arc<InfluenceDiagram>,
    prior: NormalGamma,
    posteriors: Vec<NormalGamma>,
}

impl ThompsonAgent {
    pub fn new(env: Arc<InfluenceDiagram>, config: &AgentConfig) -> Self {
        let (size_s, size_a) = env.size();
        let prior = NormalGamma {
            alpha: config.ts_alpha,
            beta: config.ts_beta,
            mean: config.ts_mu0,
            visits: 0,
        };
        Self {
            env,
            prior,
            posteriors: vec![prior; size_s * size_a],
        }
    }

    fn row(&self, state: &State) -> &[NormalGamma] {
        let (_, size_a) = self.env.size();
        let start = self.env.state_index(state) * size_a;
        &self.posteriors[start..start + size_a]
    }

    /// One posterior draw of the mean reward for every action in `state`.
    pub fn sample(&self, state: &State, rng: &mut SimRng) -> Vec<f64> {
        self.row(state)
            .iter()
            .map(|p| {
                let tau = match Gamma::new(p.alpha, 1.0 / p.beta) {
                    Ok(gamma) if p.visits > 0 => gamma.sample(rng),
                    _ => MIN_PRECISION,
                };
                let tau = if tau > 0.0 { tau } else { MIN_PRECISION };
                match Normal::new(p.mean, (1.0 / tau).sqrt()) {
                    Ok(normal) => normal.sample(rng),
                    Err(_) => p.mean,
                }
            })
            .collect()
    }

    fn means(&self, state: &State) -> Vec<f64> {
        self.row(state).iter().map(|p| p.mean).collect()
    }
}

impl Agent for ThompsonAgent {
    fn name(&self) -> &str {
        "Thompson Sampling Baseline Agent"
    }

    fn act(&mut self, state: &State, explore: bool, rng: &mut SimRng) -> Action {
        let best = if explore {
            argmax_random(&self.sample(state, rng), rng)
        } else {
            argmax(&self.means(state))
        };
        self.env.action_at(best)
    }

    fn learn(&mut self, state: &State, action: &Action, reward: f64, _advice: &[Option<Action>]) {
        let (_, size_a) = self.env.size();
        let index = self.env.state_index(state) * size_a + self.env.action_index(action);
        let mu0 = self.prior.mean;
        let p = &mut self.posteriors[index];
        let v = p.visits as f64;
        p.alpha += 0.5;
        p.beta += v / (v + 1.0) * (reward - mu0).powi(2) / 2.0;
        p.mean = if p.visits == 0 {
            reward
        } else {
            p.mean + (reward - p.mean) / (v + 1.0)
        };
        p.visits += 1;
    }

    fn reset(&mut self, _experts: &[String]) {
        let prior = self.prior;
        self.posteriors.iter_mut().for_each(|p| *p = prior);
    }
}

impl Learner for ThompsonAgent {
    fn estimate(&self, state: &State, action: &Action) -> f64 {
        self.row(state)[self.env.action_index(action)].mean
    }

    fn best_estimate(&self, state: &State) -> f64 {
        self.means(state).into_iter().fold(f64::NEG_INFINITY, f64::max)
    }

    fn into_agent(self: Box<Self>) -> Box<dyn Agent> {
        self
    }
}
