use crate::agent::{Agent, Learner};
use clue_core::{Action, SimRng, State};
use clue_env::Oracle;
use std::sync::Arc;

/// Acts optimally with full knowledge of the environment. Never learns.
#[derive(Debug, Clone)]
pub struct TruePolicyAgent {
    oracle: Arc<Oracle>,
}

impl TruePolicyAgent {
    pub fn new(oracle: Arc<Oracle>) -> Self {
        Self { oracle }
    }
}

impl Agent for TruePolicyAgent {
    fn name(&self) -> &str {
        "True Policy Agent"
    }

    fn act(&mut self, state: &State, _explore: bool, _rng: &mut SimRng) -> Action {
        self.oracle.act(state)
    }

    fn learn(&mut self, _state: &State, _action: &Action, _reward: f64, _advice: &[Option<Action>]) {}

    fn reset(&mut self, _experts: &[String]) {}
}

impl Learner for TruePolicyAgent {
    fn estimate(&self, state: &State, action: &Action) -> f64 {
        self.oracle.expected_utility(state, action)
    }

    fn best_estimate(&self, state: &State) -> f64 {
        self.oracle.expected_utility(state, &self.oracle.act(state))
    }

    fn into_agent(self: Box<Self>) -> Box<dyn Agent> {
        self
    }
}
