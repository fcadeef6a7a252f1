use crate::advice::{advice_posterior, AdviceBook};
use crate::agent::{chance, check_trials, check_unit, Agent, Learner, LinearSchedule};
use clue_core::config::AgentConfig;
use clue_core::{Action, ClueResult, SimRng, State};
use clue_env::InfluenceDiagram;
use std::sync::Arc;

/// CLUE's Bayesian advice combination, but with every expert assumed to be
/// as reliable as a linearly decaying reliance instead of an estimate.
pub struct ClueDecayedAgent {
    env: Arc<InfluenceDiagram>,
    learner: Box<dyn Learner>,
    schedule: LinearSchedule,
    threshold: f64,
    book: AdviceBook,
    rhos: Vec<f64>,
    history: Vec<Vec<f64>>,
    trial_count: u64,
}

impl ClueDecayedAgent {
    pub fn new(
        env: Arc<InfluenceDiagram>,
        learner: Box<dyn Learner>,
        trials: usize,
        config: &AgentConfig,
    ) -> ClueResult<Self> {
        let trials = check_trials(trials)?;
        let initial = check_unit("initial_reliance", config.initial_reliance)?;
        let fraction = check_unit("reliance_fraction", config.reliance_fraction)?;
        let (_, size_a) = env.size();
        let threshold = match config.threshold {
            Some(t) => check_unit("threshold", t)?,
            None => (2.0 / size_a as f64).min(0.5),
        };
        Ok(Self {
            env,
            learner,
            schedule: LinearSchedule::new(initial, 0.0, fraction, trials),
            threshold,
            book: AdviceBook::default(),
            rhos: Vec::new(),
            history: Vec::new(),
            trial_count: 0,
        })
    }

    pub fn reliance(&self) -> f64 {
        self.schedule.value(self.trial_count)
    }
}

impl Agent for ClueDecayedAgent {
    fn name(&self) -> &str {
        "CLUE Decayed"
    }

    fn act(&mut self, state: &State, explore: bool, rng: &mut SimRng) -> Action {
        let advice: Vec<(usize, usize)> = self
            .book
            .for_state(state)
            .into_iter()
            .map(|(e, a)| (e, self.env.action_index(a)))
            .collect();
        if advice.is_empty() {
            // Last known reliance carries over.
            self.history.push(self.rhos.clone());
            return self.learner.act(state, explore, rng);
        }

        let reliance = self.reliance();
        self.rhos.iter_mut().for_each(|rho| *rho = reliance);
        self.history.push(self.rhos.clone());

        let (_, size_a) = self.env.size();
        if explore {
            if let Some((best, p)) = advice_posterior(&advice, &self.rhos, size_a) {
                if p >= self.threshold && chance(p, rng) {
                    return self.env.action_at(best);
                }
            }
        }
        self.learner.act(state, explore, rng)
    }

    fn learn(&mut self, state: &State, action: &Action, reward: f64, advice: &[Option<Action>]) {
        self.trial_count += 1;
        self.learner.learn(state, action, reward, &[]);
        self.book.record(state, advice);
    }

    fn reset(&mut self, experts: &[String]) {
        self.trial_count = 0;
        self.learner.reset(experts);
        self.book = AdviceBook::new(experts, self.env.state_space());
        self.rhos = vec![self.schedule.value(0); experts.len()];
        self.history.clear();
    }

    fn takes_advice(&self) -> bool {
        true
    }

    fn rho_history(&self) -> Option<&[Vec<f64>]> {
        Some(&self.history)
    }
}
