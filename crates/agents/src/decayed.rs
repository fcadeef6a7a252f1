use crate::advice::AdviceBook;
use crate::agent::{chance, check_trials, check_unit, Agent, Learner, LinearSchedule};
use clue_core::config::AgentConfig;
use clue_core::{Action, ClueError, ClueResult, SimRng, State};
use clue_env::InfluenceDiagram;
use rand::seq::SliceRandom;
use std::sync::Arc;

/// Follows stored advice with a probability that decays linearly from
/// `initial_reliance` to `final_reliance`.
pub struct DecayedRelianceAgent {
    env: Arc<InfluenceDiagram>,
    learner: Box<dyn Learner>,
    schedule: LinearSchedule,
    book: AdviceBook,
    trial_count: u64,
}

impl DecayedRelianceAgent {
    pub fn new(
        env: Arc<InfluenceDiagram>,
        learner: Box<dyn Learner>,
        trials: usize,
        config: &AgentConfig,
    ) -> ClueResult<Self> {
        let trials = check_trials(trials)?;
        let initial = check_unit("initial_reliance", config.initial_reliance)?;
        let last = check_unit("final_reliance", config.final_reliance)?;
        if last > initial {
            return Err(ClueError::InvalidParameter(format!(
                "final_reliance {} must be smaller than initial_reliance {}",
                last, initial
            )));
        }
        let fraction = check_unit("reliance_fraction", config.reliance_fraction)?;
        Ok(Self {
            env,
            learner,
            schedule: LinearSchedule::new(initial, last, fraction, trials),
            book: AdviceBook::default(),
            trial_count: 0,
        })
    }

    pub fn reliance(&self) -> f64 {
        self.schedule.value(self.trial_count)
    }
}

impl Agent for DecayedRelianceAgent {
    fn name(&self) -> &str {
        "Decayed Reliance"
    }

    fn act(&mut self, state: &State, explore: bool, rng: &mut SimRng) -> Action {
        let reliance = self.reliance();
        let stored = self.book.for_state(state);
        if !stored.is_empty() && chance(reliance, rng) {
            if let Some((_, advice)) = stored.choose(rng) {
                return (*advice).clone();
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

    fn build(config: &AgentConfig) -> ClueResult<DecayedRelianceAgent> {
        let env = Arc::new(RandomSsdp::new(2, 1, (-1.0, 1.0)).build(8).unwrap());
        let learner = EpsilonGreedyAgent::new(env.clone(), 10, config).unwrap();
        DecayedRelianceAgent::new(env, Box::new(learner), 10, config)
    }

    #[test]
    fn test_rejects_increasing_reliance() {
        let config = AgentConfig {
            initial_reliance: 0.2,
            final_reliance: 0.5,
            ..AgentConfig::default()
        };
        assert!(build(&config).is_err());
        let config = AgentConfig {
            reliance_fraction: 1.5,
            ..AgentConfig::default()
        };
        assert!(build(&config).is_err());
    }

    #[test]
    fn test_full_reliance_then_none() {
        let mut agent = build(&AgentConfig::default()).unwrap();
        agent.reset(&["0".to_string()]);
        let state = State(vec![0, 1]);
        let advised = Action(vec![1]);
        agent.learn(&state, &Action(vec![0]), -1.0, &[Some(advised.clone())]);
        // Reliance drops by 1/8 per trial over the first eight trials.
        assert!((agent.reliance() - 0.875).abs() < 1e-12);
        for _ in 0..7 {
            agent.learn(&State(vec![1, 1]), &Action(vec![0]), 0.0, &[None]);
        }
        assert_eq!(agent.reliance(), 0.0);

        agent.reset(&["0".to_string()]);
        agent.learn(&state, &Action(vec![0]), -1.0, &[Some(advised.clone())]);
        let mut rng = seeded_rng(1);
        let followed = (0..100).filter(|_| agent.act(&state, true, &mut rng) == advised).count();
        assert!(followed >= 80);
    }
}
