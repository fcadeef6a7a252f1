use crate::agent::{check_trials, Agent, Learner, LinearSchedule};
use clue_core::config::AgentConfig;
use clue_core::{argmax, Action, ClueResult, SimRng, State, ValueTable};
use clue_env::InfluenceDiagram;
use rand::Rng;
use std::sync::Arc;

/// Greedy whenever the best estimate clears a threshold `z` that decays
/// linearly; random otherwise.
#[derive(Debug, Clone)]
pub struct AdaptiveGreedyAgent {
    env: Arc<InfluenceDiagram>,
    schedule: LinearSchedule,
    q0: f64,
    q: ValueTable,
    trial_count: u64,
}

impl AdaptiveGreedyAgent {
    pub fn new(env: Arc<InfluenceDiagram>, trials: usize, config: &AgentConfig) -> ClueResult<Self> {
        let trials = check_trials(trials)?;
        let (size_s, size_a) = env.size();
        Ok(Self {
            schedule: LinearSchedule::new(
                config.adaptive_z_start,
                config.adaptive_z_end,
                config.eps_fraction,
                trials,
            ),
            q0: config.q0,
            q: ValueTable::new(size_s, size_a, config.q0, config.alpha)?,
            trial_count: 0,
            env,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.schedule.value(self.trial_count)
    }
}

impl Agent for AdaptiveGreedyAgent {
    fn name(&self) -> &str {
        "Adaptive Greedy Baseline Agent"
    }

    fn act(&mut self, state: &State, explore: bool, rng: &mut SimRng) -> Action {
        let row = self.q.row(self.env.state_index(state));
        let best = argmax(row);
        if !explore || row[best] > self.threshold() {
            return self.env.action_at(best);
        }
        let (_, size_a) = self.env.size();
        self.env.action_at(rng.gen_range(0..size_a))
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

impl Learner for AdaptiveGreedyAgent {
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
