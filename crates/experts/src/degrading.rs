use crate::expert::Expert;
use crate::unreliable::UnreliableExpert;
use clue_core::{Action, ClueError, ClueResult, SimRng, State};
use clue_env::Oracle;
use std::sync::Arc;

/// An unreliable expert whose reliability shrinks by `degrade_factor` after
/// every trial it observes.
#[derive(Debug, Clone)]
pub struct DegradingExpert {
    inner: UnreliableExpert,
    initial_rho: f64,
    degrade_factor: f64,
}

impl DegradingExpert {
    pub fn new(oracle: Arc<Oracle>, rho: f64, degrade_factor: f64, mu: u64, gamma: f64) -> ClueResult<Self> {
        if !(0.0..=1.0).contains(&degrade_factor) {
            return Err(ClueError::InvalidParameter(format!(
                "invalid degrade factor = {}! Must be in interval [0,1]",
                degrade_factor
            )));
        }
        let inner = UnreliableExpert::new(oracle, rho, mu, gamma)?;
        Ok(Self {
            inner,
            initial_rho: rho,
            degrade_factor,
        })
    }

    pub fn rho(&self) -> f64 {
        self.inner.rho()
    }
}

impl Expert for DegradingExpert {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn advise(&self, state: &State, rng: &mut SimRng) -> Action {
        self.inner.advise(state, rng)
    }

    fn deliberate(&mut self, state: &State, action: &Action, reward: f64, rng: &mut SimRng) -> Option<Action> {
        let advice = self.inner.deliberate(state, action, reward, rng);
        let rho = self.inner.rho() * self.degrade_factor;
        self.inner.set_rho(rho);
        advice
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.inner.set_rho(self.initial_rho);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clue_core::seeded_rng;
    use clue_env::RandomSsdp;

    #[test]
    fn test_rho_decays_and_resets() {
        let env = RandomSsdp::new(2, 1, (-1.0, 1.0)).build(1).unwrap();
        let oracle = Arc::new(Oracle::new(Arc::new(env)).unwrap());
        let mut expert = DegradingExpert::new(Arc::clone(&oracle), 1.0, 0.5, 10, 0.0).unwrap();
        let mut rng = seeded_rng(0);
        let state = oracle.env().state_at(0);
        let action = oracle.act(&state);
        expert.deliberate(&state, &action, 0.0, &mut rng);
        expert.deliberate(&state, &action, 0.0, &mut rng);
        assert!((expert.rho() - 0.25).abs() < 1e-12);
        expert.reset();
        assert_eq!(expert.rho(), 1.0);
        assert_eq!(expert.name(), "1");
    }

    #[test]
    fn test_invalid_factor_rejected() {
        let env = RandomSsdp::new(2, 1, (-1.0, 1.0)).build(1).unwrap();
        let oracle = Arc::new(Oracle::new(Arc::new(env)).unwrap());
        assert!(DegradingExpert::new(oracle, 0.5, 1.5, 10, 0.0).is_err());
    }
}
