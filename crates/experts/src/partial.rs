use crate::expert::{AdviceGate, Expert};
use clue_core::{Action, ClueResult, SimRng, State};
use clue_env::{Oracle, PartialPolicy};
use clue_pgm::VarId;
use std::sync::Arc;

/// An expert that cannot see some chance variables. It always advises the
/// best action given what it does see, and judges the agent by its own
/// expected utilities.
#[derive(Debug, Clone)]
pub struct PartiallyReliableExpert {
    name: String,
    policy: Arc<PartialPolicy>,
    gate: AdviceGate,
}

impl PartiallyReliableExpert {
    pub fn new(name: impl Into<String>, oracle: &Oracle, hidden: &[VarId], mu: u64, gamma: f64) -> ClueResult<Self> {
        Ok(Self {
            name: name.into(),
            policy: Arc::new(oracle.partial_policy(hidden)?),
            gate: AdviceGate::new(mu, gamma)?,
        })
    }

    pub fn hidden(&self) -> &[String] {
        self.policy.hidden()
    }
}

impl Expert for PartiallyReliableExpert {
    fn name(&self) -> &str {
        &self.name
    }

    fn advise(&self, state: &State, _rng: &mut SimRng) -> Action {
        self.policy.act(state)
    }

    fn deliberate(&mut self, state: &State, action: &Action, _reward: f64, _rng: &mut SimRng) -> Option<Action> {
        let best = self.policy.act(state);
        let optimal_utility = self.policy.expected_utility(state, &best);
        let agent_utility = self.policy.expected_utility(state, action);
        self.gate.observe(optimal_utility, agent_utility).then_some(best)
    }

    fn reset(&mut self) {
        self.gate.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UnreliableExpert;
    use clue_core::seeded_rng;
    use clue_env::RandomSsdp;

    fn oracle(seed: u64) -> Arc<Oracle> {
        let env = RandomSsdp::new(3, 1, (-1.0, 1.0)).build(seed).unwrap();
        Arc::new(Oracle::new(Arc::new(env)).unwrap())
    }

    /// A network, hidden variable and state where the blind expert's best
    /// action is strictly worse than the oracle's.
    fn blind_spot() -> (Arc<Oracle>, Vec<VarId>, State) {
        for seed in 0..50 {
            let oracle = oracle(seed);
            let env = oracle.env();
            let (size_s, _) = env.size();
            for &id in env.chance_ids() {
                let policy = oracle.partial_policy(&[id]).unwrap();
                for s in 0..size_s {
                    let state = env.state_at(s);
                    let best = oracle.act(&state);
                    let blind = policy.act(&state);
                    let gap = oracle.expected_utility(&state, &best) - oracle.expected_utility(&state, &blind);
                    if gap > 1e-3 {
                        return (Arc::clone(&oracle), vec![id], state);
                    }
                }
            }
        }
        panic!("no state where hiding a variable changes the best action");
    }

    #[test]
    fn test_advises_partial_optimal_action() {
        let (oracle, hidden, _) = blind_spot();
        let expert = PartiallyReliableExpert::new("1", &oracle, &hidden, 1, 0.0).unwrap();
        let policy = oracle.partial_policy(&hidden).unwrap();
        let mut rng = seeded_rng(0);
        let (size_s, _) = oracle.env().size();
        for s in 0..size_s {
            let state = oracle.env().state_at(s);
            assert_eq!(expert.advise(&state, &mut rng), policy.act(&state));
        }
        assert_eq!(expert.hidden().len(), 1);
    }

    #[test]
    fn test_nothing_hidden_matches_oracle() {
        let oracle = oracle(4);
        let expert = PartiallyReliableExpert::new("0", &oracle, &[], 1, 0.0).unwrap();
        let mut rng = seeded_rng(0);
        let (size_s, _) = oracle.env().size();
        for s in 0..size_s {
            let state = oracle.env().state_at(s);
            assert_eq!(expert.advise(&state, &mut rng), oracle.act(&state));
        }
        assert!(expert.hidden().is_empty());
    }

    #[test]
    fn test_gate_judges_by_own_expected_utility() {
        let (oracle, hidden, state) = blind_spot();
        let gamma = 1e-4;
        let mut blind = PartiallyReliableExpert::new("1", &oracle, &hidden, 1, gamma).unwrap();
        let mut informed = UnreliableExpert::new(Arc::clone(&oracle), 1.0, 1, gamma).unwrap();
        let mut rng = seeded_rng(1);

        // The blind expert's own choice costs it nothing by its own table,
        // while the oracle-backed expert sees the regret at once.
        let action = blind.advise(&state, &mut rng);
        assert_ne!(action, oracle.act(&state));
        for _ in 0..20 {
            assert_eq!(blind.deliberate(&state, &action, 0.0, &mut rng), None);
        }
        assert_eq!(informed.deliberate(&state, &action, 0.0, &mut rng), Some(oracle.act(&state)));
    }

    #[test]
    fn test_rejects_hiding_a_decision() {
        let oracle = oracle(0);
        let decision = oracle.env().network().decision_order()[0];
        assert!(PartiallyReliableExpert::new("x", &oracle, &[decision], 1, 0.0).is_err());
    }
}
