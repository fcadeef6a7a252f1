use crate::expert::{check_rho, unreliable_choice, AdviceGate, Expert};
use clue_core::{Action, ClueError, ClueResult, SimRng, State, StateTable};
use clue_env::Oracle;
use std::sync::Arc;

/// An unreliable expert whose reliability depends on the region of the
/// state space the current state belongs to.
#[derive(Debug, Clone)]
pub struct NonuniformExpert {
    name: String,
    oracle: Arc<Oracle>,
    rhos: Vec<f64>,
    regions: Arc<StateTable<usize>>,
    gate: AdviceGate,
}

impl NonuniformExpert {
    pub fn new(
        name: impl Into<String>,
        oracle: Arc<Oracle>,
        rhos: Vec<f64>,
        regions: Arc<StateTable<usize>>,
        mu: u64,
        gamma: f64,
    ) -> ClueResult<Self> {
        for rho in &rhos {
            check_rho(*rho)?;
        }
        if let Some(region) = regions.values().iter().find(|r| **r >= rhos.len()) {
            return Err(ClueError::InvalidParameter(format!(
                "value {} outside of range defined by list of rhos ({})",
                region,
                rhos.len()
            )));
        }
        Ok(Self {
            name: name.into(),
            oracle,
            rhos,
            regions,
            gate: AdviceGate::new(mu, gamma)?,
        })
    }

    pub fn rho_in(&self, state: &State) -> f64 {
        self.rhos[*self.regions.get(state)]
    }
}

impl Expert for NonuniformExpert {
    fn name(&self) -> &str {
        &self.name
    }

    fn advise(&self, state: &State, rng: &mut SimRng) -> Action {
        let env = self.oracle.env();
        let optimal = self.oracle.optimal_index(env.state_index(state));
        let (_, size_a) = env.size();
        env.action_at(unreliable_choice(optimal, self.rho_in(state), size_a, rng))
    }

    fn deliberate(&mut self, state: &State, action: &Action, _reward: f64, rng: &mut SimRng) -> Option<Action> {
        let optimal = self.oracle.act(state);
        let optimal_utility = self.oracle.expected_utility(state, &optimal);
        let agent_utility = self.oracle.expected_utility(state, action);
        self.gate
            .observe(optimal_utility, agent_utility)
            .then(|| self.advise(state, rng))
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

    fn setup() -> (Arc<Oracle>, Arc<StateTable<usize>>) {
        let env = RandomSsdp::new(3, 2, (-1.0, 1.0)).build(2).unwrap();
        let oracle = Arc::new(Oracle::new(Arc::new(env)).unwrap());
        let mut regions = StateTable::new(oracle.env().state_space().clone(), 0usize);
        for i in 4..regions.len() {
            regions.set_index(i, 1);
        }
        (oracle, Arc::new(regions))
    }

    #[test]
    fn test_reliability_follows_region() {
        let (oracle, regions) = setup();
        let expert = NonuniformExpert::new("0", Arc::clone(&oracle), vec![1.0, 0.0], regions, 1, 0.0).unwrap();
        let mut rng = seeded_rng(3);
        let easy = oracle.env().state_at(1);
        let hard = oracle.env().state_at(6);
        assert_eq!(expert.advise(&easy, &mut rng), oracle.act(&easy));
        assert_ne!(expert.advise(&hard, &mut rng), oracle.act(&hard));
    }

    #[test]
    fn test_region_out_of_range_rejected() {
        let (oracle, regions) = setup();
        assert!(NonuniformExpert::new("0", oracle, vec![1.0], regions, 1, 0.0).is_err());
    }
}
