use crate::advice::AdviceBook;
use crate::agent::{Agent, Learner};
use clue_core::config::AgentConfig;
use clue_core::{Action, SimRng, State};
use clue_env::InfluenceDiagram;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default)]
struct RunningMean {
    mean: f64,
    count: f64,
}

impl RunningMean {
    fn push(&mut self, x: f64) {
        self.mean = (self.mean * self.count + x) / (self.count + 1.0);
        self.count += 1.0;
    }
}

/// Probabilistic policy reuse: with stored advice, picks between its own
/// policy and each advising expert by a softmax over their mean rewards.
pub struct PrqAgent {
    env: Arc<InfluenceDiagram>,
    learner: Box<dyn Learner>,
    book: AdviceBook,
    initial_temperature: f64,
    temperature_step: f64,
    temperature: f64,
    own: RunningMean,
    experts: Vec<RunningMean>,
    chosen: Option<usize>,
}

impl PrqAgent {
    pub fn new(env: Arc<InfluenceDiagram>, learner: Box<dyn Learner>, config: &AgentConfig) -> Self {
        Self {
            env,
            learner,
            book: AdviceBook::default(),
            initial_temperature: config.prq_temperature,
            temperature_step: config.prq_temperature_step,
            temperature: config.prq_temperature,
            own: RunningMean::default(),
            experts: Vec::new(),
            chosen: None,
        }
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Selection weight `exp(temperature^w)` of a policy with mean reward `w`.
    fn weight(&self, mean: f64) -> f64 {
        self.temperature.powf(mean).exp()
    }
}

/// Index into `weights` drawn proportionally. Infinite weights share all of
/// the mass; a NaN weight falls back to the first entry.
fn choose_weighted(weights: &[f64], rng: &mut SimRng) -> usize {
    if weights.iter().any(|w| w.is_nan()) {
        return 0;
    }
    let infinite: Vec<usize> = (0..weights.len()).filter(|i| weights[*i].is_infinite()).collect();
    if !infinite.is_empty() {
        return infinite.choose(rng).copied().unwrap_or(0);
    }
    WeightedIndex::new(weights).map(|dist| dist.sample(rng)).unwrap_or(0)
}

impl Agent for PrqAgent {
    fn name(&self) -> &str {
        "PRQ"
    }

    fn act(&mut self, state: &State, explore: bool, rng: &mut SimRng) -> Action {
        let stored: Vec<(usize, Action)> = self
            .book
            .for_state(state)
            .into_iter()
            .map(|(e, a)| (e, a.clone()))
            .collect();
        if stored.is_empty() {
            self.chosen = None;
            return self.learner.act(state, explore, rng);
        }

        let mut weights = vec![self.weight(self.own.mean)];
        weights.extend(stored.iter().map(|(e, _)| self.weight(self.experts[*e].mean)));
        match choose_weighted(&weights, rng) {
            0 => {
                self.chosen = None;
                self.learner.act(state, explore, rng)
            }
            i => {
                let (expert, action) = &stored[i - 1];
                self.chosen = Some(*expert);
                action.clone()
            }
        }
    }

    fn learn(&mut self, state: &State, action: &Action, reward: f64, advice: &[Option<Action>]) {
        self.learner.learn(state, action, reward, &[]);
        self.book.record(state, advice);
        match self.chosen {
            Some(expert) => self.experts[expert].push(reward),
            None => self.own.push(reward),
        }
        self.temperature += self.temperature_step;
    }

    fn reset(&mut self, experts: &[String]) {
        self.learner.reset(experts);
        self.book = AdviceBook::new(experts, self.env.state_space());
        self.temperature = self.initial_temperature;
        self.own = RunningMean::default();
        self.experts = vec![RunningMean::default(); experts.len()];
        self.chosen = None;
    }

    fn takes_advice(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EpsilonGreedyAgent;
    use clue_core::seeded_rng;
    use clue_env::RandomSsdp;

    fn agent() -> PrqAgent {
        let env = Arc::new(RandomSsdp::new(2, 1, (-1.0, 1.0)).build(11).unwrap());
        let config = AgentConfig::default();
        let learner = EpsilonGreedyAgent::new(env.clone(), 10, &config).unwrap();
        PrqAgent::new(env, Box::new(learner), &config)
    }

    #[test]
    fn test_choose_weighted_guards() {
        let mut rng = seeded_rng(0);
        assert_eq!(choose_weighted(&[1.0, f64::NAN], &mut rng), 0);
        for _ in 0..20 {
            assert_ne!(choose_weighted(&[1.0, f64::INFINITY, f64::INFINITY], &mut rng), 0);
        }
        assert_eq!(choose_weighted(&[0.0, 1.0], &mut rng), 1);
    }

    #[test]
    fn test_temperature_and_means() {
        let mut agent = agent();
        agent.reset(&["0".to_string()]);
        let state = State(vec![0, 0]);
        let mut rng = seeded_rng(1);
        agent.act(&state, true, &mut rng);
        agent.learn(&state, &Action(vec![1]), 0.5, &[Some(Action(vec![1]))]);
        assert!((agent.temperature() - 0.05).abs() < 1e-12);
        assert!((agent.own.mean - 0.5).abs() < 1e-12);

        agent.act(&state, true, &mut rng);
        assert!(matches!(agent.chosen, None | Some(0)));
        let expected = vec![agent.weight(0.5), agent.weight(0.0)];
        assert!(expected[1] > expected[0]);
    }
}
