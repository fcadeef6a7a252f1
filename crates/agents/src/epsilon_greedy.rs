use crate::agent::{check_trials, chance, Agent, Learner, LinearSchedule};
use clue_core::config::AgentConfig;
use clue_core::{argmax, Action, ClueResult, SimRng, State, ValueTable};
use clue_env::InfluenceDiagram;
use rand::Rng;
use std::sync::Arc;

/// Tabular epsilon-greedy learner with a linearly decaying epsilon.
#[derive(Debug, Clone)]
pub struct EpsilonGreedyAgent {
    env: Arc<InfluenceDiagram>,
    schedule: LinearSchedule,
    q0: f64,
    q: ValueTable,
    trial_count: u64,
}

impl EpsilonGreedyAgent {
    pub fn new(env: Arc<InfluenceDiagram>, trials: usize, config: &AgentConfig) -> ClueResult<Self> {
        let trials = check_trials(trials)?;
        let (size_s, size_a) = env.size();
        let q = ValueTable::new(size_s, size_a, config.q0, config.alpha)?;
        Ok(Self {
            schedule: LinearSchedule::new(config.eps_start, config.eps_end, config.eps_fraction, trials),
            q0: config.q0,
            q,
            trial_count: 0,
            env,
        })
    }

    pub fn epsilon(&self) -> f64 {
        self.schedule.value(self.trial_count)
    }
}

impl Agent for EpsilonGreedyAgent {
    fn name(&self) -> &str {
        "Baseline Agent"
    }

    fn act(&mut self, state: &State, explore: bool, rng: &mut SimRng) -> Action {
        let (_, size_a) = self.env.size();
        if explore && chance(self.epsilon(), rng) {
            return self.env.action_at(rng.gen_range(0..size_a));
        }
        let row = self.q.row(self.env.state_index(state));
        self.env.action_at(argmax(row))
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

impl Learner for EpsilonGreedyAgent {
    fn estimate(&self, state: &State, action: &Action) -> f64 {
        self.q.get(self.env.state_index(state), self.env.action_index(action))
    }

    fn best_estimate(&self, state: &State) -> f64 {
        self.q
            .row(self.env.state_index(state))
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max)
    }

    fn into_agent(self: Box<Self>) -> Box<dyn Agent> {
        self
    }
}
