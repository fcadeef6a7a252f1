use crate::advice::AdviceBook;
use crate::agent::{Agent, Learner};
use clue_core::{Action, SimRng, State};
use clue_env::InfluenceDiagram;
use rand::seq::SliceRandom;
use std::sync::Arc;

/// Follows any advice it has ever received for a state, blindly.
pub struct NaiveAdviceFollower {
    env: Arc<InfluenceDiagram>,
    learner: Box<dyn Learner>,
    book: AdviceBook,
}

impl NaiveAdviceFollower {
    pub fn new(env: Arc<InfluenceDiagram>, learner: Box<dyn Learner>) -> Self {
        Self {
            env,
            learner,
            book: AdviceBook::default(),
        }
    }
}

impl Agent for NaiveAdviceFollower {
    fn name(&self) -> &str {
        "NAF"
    }

    fn act(&mut self, state: &State, explore: bool, rng: &mut SimRng) -> Action {
        match self.book.for_state(state).choose(rng) {
            Some((_, advice)) => (*advice).clone(),
            None => self.learner.act(state, explore, rng),
        }
    }

    fn learn(&mut self, state: &State, action: &Action, reward: f64, advice: &[Option<Action>]) {
        self.learner.learn(state, action, reward, &[]);
        self.book.record(state, advice);
    }

    fn reset(&mut self, experts: &[String]) {
        self.learner.reset(experts);
        self.book = AdviceBook::new(experts, self.env.state_space());
    }

    fn takes_advice(&self) -> bool {
        true
    }
}
