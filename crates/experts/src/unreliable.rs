use crate::expert::{check_rho, format_rho, unreliable_choice, AdviceGate, Expert};
use clue_core::{Action, ClueResult, SimRng, State};
use clue_env::Oracle;
use std::sync::Arc;

/// Gives the optimal action with probability `rho`, otherwise a random
/// suboptimal one.
#[derive(Debug, Clone)]
pub struct UnreliableExpert {
    name: String,
    oracle: Arc<Oracle>,
    rho: f64,
    gate: AdviceGate,
}

impl UnreliableExpert {
    pub fn new(oracle: Arc<Oracle>, rho: f64, mu: u64, gamma: f64) -> ClueResult<Self> {
        let rho = check_rho(rho)?;
        Ok(Self {
            name: format_rho(rho),
            oracle,
            rho,
            gate: AdviceGate::new(mu, gamma)?,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn rho(&self) -> f64 {
        self.rho
    }

    pub(crate) fn set_rho(&mut self, rho: f64) {
        self.rho = rho;
    }
}

impl Expert for UnreliableExpert {
    fn name(&self) -> &str {
        &self.name
    }

    fn advise(&self, state: &State, rng: &mut SimRng) -> Action {
        let env = self.oracle.env();
        let optimal = self.oracle.optimal_index(env.state_index(state));
        let (_, size_a) = env.size();
        env.action_at(unreliable_choice(optimal, self.rho, size_a, rng))
    }

    fn deliberate(&mut self, state: &State, action: &Action, _reward: f64, rng: &mut SimRng) -> Option<Action> {
        let optimal = self.oracle.act(state);
        let optimal_utility = self.oracle.expected_utility(state, &optimal);
        let agent_utility = self.oracle.expected_utility(state, action);
        if self.gate.observe(optimal_utility, agent_utility) {
            Some(self.advise(state, rng))
        } else {
            None
        }
    }

    fn reset(&mut self) {
        self.gate.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clue_core::seeded_rng;
    use clue_env::RandomSsdp;

    fn oracle() -> Arc<Oracle> {
        let env = RandomSsdp::new(3, 2, (-1.0, 1.0)).build(4).unwrap();
        Arc::new(Oracle::new(Arc::new(env)).unwrap())
    }

    #[test]
    fn test_perfect_expert_advises_optimal() {
        let oracle = oracle();
        let expert = UnreliableExpert::new(Arc::clone(&oracle), 1.0, 1, 0.0).unwrap();
        let mut rng = seeded_rng(0);
        for s in 0..oracle.env().size().0 {
            let state = oracle.env().state_at(s);
            assert_eq!(expert.advise(&state, &mut rng), oracle.act(&state));
        }
    }

    #[test]
    fn test_adversarial_expert_never_advises_optimal() {
        let oracle = oracle();
        let expert = UnreliableExpert::new(Arc::clone(&oracle), 0.0, 1, 0.0).unwrap();
        let mut rng = seeded_rng(0);
        let state = oracle.env().state_at(5);
        for _ in 0..50 {
            assert_ne!(expert.advise(&state, &mut rng), oracle.act(&state));
        }
    }

    #[test]
    fn test_silent_when_agent_is_optimal() {
        let oracle = oracle();
        let mut expert = UnreliableExpert::new(Arc::clone(&oracle), 1.0, 1, 0.01).unwrap();
        let mut rng = seeded_rng(0);
        let state = oracle.env().state_at(2);
        let best = oracle.act(&state);
        for _ in 0..20 {
            assert!(expert.deliberate(&state, &best, 0.0, &mut rng).is_none());
        }
    }

    #[test]
    fn test_invalid_rho_rejected() {
        assert!(UnreliableExpert::new(oracle(), -0.1, 10, 0.01).is_err());
        assert_eq!(UnreliableExpert::new(oracle(), 0.25, 10, 0.01).unwrap().name(), "0.25");
    }
}
