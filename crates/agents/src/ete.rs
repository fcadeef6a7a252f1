use crate::agent::{check_trials, Agent, Learner};
use clue_core::config::AgentConfig;
use clue_core::{argmax, Action, ClueResult, SimRng, State, ValueTable};
use clue_env::InfluenceDiagram;
use rand::Rng;
use std::sync::Arc;

/// Explore-then-exploit: uniformly random for the first `exp_trials`
/// trials, greedy afterwards.
#[derive(Debug, Clone)]
pub struct EteAgent {
    env: Arc<InfluenceDiagram>,
    exp_trials: f64,
    q0: f64,
    q: ValueTable,
    trial_count: u64,
}

impl EteAgent {
    pub fn new(env: Arc<InfluenceDiagram>, trials: usize, config: &AgentConfig) -> ClueResult<Self> {
        let trials = check_trials(trials)?;
        let (size_s, size_a) = env.size();
        Ok(Self {
            exp_trials: config.ete_fraction * trials as f64,
            q0: config.q0,
            q: ValueTable::new(size_s, size_a, config.q0, config.alpha)?,
            trial_count: 0,
            env,
        })
    }

    pub fn exploring(&self) -> bool {
        (self.trial_count as f64) < self.exp_trials
    }
}

impl Agent for EteAgent {
    fn name(&self) -> &str {
        "ETE Baseline Agent"
    }

    fn act(&mut self, state: &State, explore: bool, rng: &mut SimRng) -> Action {
        let (_, size_a) = self.env.size();
        if explore && self.exploring() {
            return self.env.action_at(rng.gen_range(0..size_a));
        }
        self.env.action_at(argmax(self.q.row(self.env.state_index(state))))
    }

    fn learn(&mut self, state: &State, action: &Action, reward: f64, _advice: &[Option<Action>]) {
        self.trial_count += 1;
        self.q
            .update(self.env.state_index(state), self.env.action_index(action), reward);
    }

    fn reset(&mut self, _experts: &[String]) {
        self.trial_count = 0;
        self.q.reset(self.q0);
    }
}

impl Learner for EteAgent {
    fn estimate(&self, state: &State, action: &Action) -> f64 {
        self.q.get(self.env.state_index(state), self.env.action_index(action))
    }

    fn best_estimate(&self, state: &State) -> f64 {
        let row = self.q.row(self.env.state_index(state));
        row[argmax(row)]
    }

    fn into_agent(self: Box<Self>) -> Box<dyn Agent> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clue_core::seeded_rng;
    use clue_env::RandomSsdp;

    #[test]
    fn test_switches_to_exploitation() {
        let env = Arc::new(RandomSsdp::new(2, 2, (-1.0, 1.0)).build(1).unwrap());
        let mut agent = EteAgent::new(env, 8, &AgentConfig::default()).unwrap();
        let state = State(vec![0, 1]);
        assert!(agent.exploring());
        agent.learn(&state, &Action(vec![1, 1]), 1.0, &[]);
        agent.learn(&state, &Action(vec![0, 0]), -1.0, &[]);
        assert!(!agent.exploring());

        let mut rng = seeded_rng(2);
        for _ in 0..10 {
            assert_eq!(agent.act(&state, true, &mut rng), Action(vec![1, 1]));
        }
    }
}
