//! Storage of past advice and the Bayesian combination of several experts'
//! recommendations.

use clue_core::{Action, Space, State, StateTable};

/// Most recent advice of every expert, per state.
#[derive(Debug, Clone, Default)]
pub struct AdviceBook {
    experts: Vec<String>,
    tables: Vec<StateTable<Option<Action>>>,
}

impl AdviceBook {
    pub fn new(experts: &[String], state_space: &Space) -> Self {
        Self {
            experts: experts.to_vec(),
            tables: experts
                .iter()
                .map(|_| StateTable::new(state_space.clone(), None))
                .collect(),
        }
    }

    pub fn experts(&self) -> &[String] {
        &self.experts
    }

    pub fn len(&self) -> usize {
        self.experts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experts.is_empty()
    }

    /// Store every piece of advice given this trial, replacing older advice
    /// for the same state.
    pub fn record(&mut self, state: &State, advice: &[Option<Action>]) {
        for (table, given) in self.tables.iter_mut().zip(advice) {
            if let Some(action) = given {
                table.set(state, Some(action.clone()));
            }
        }
    }

    pub fn latest(&self, expert: usize, state: &State) -> Option<&Action> {
        self.tables.get(expert).and_then(|t| t.get(state).as_ref())
    }

    /// `(expert index, advice)` for every expert that has advised in `state`.
    pub fn for_state(&self, state: &State) -> Vec<(usize, &Action)> {
        self.tables
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.get(state).as_ref().map(|a| (i, a)))
            .collect()
    }
}

/// Posterior over actions given advice and expert reliabilities.
///
/// `advice` holds `(expert, action index)` pairs. An expert advising `a` has
/// likelihood `rho` for `a` and `(1 - rho) / (|A| - 1)` for every other
/// action. Returns the most probable action and its probability, or `None`
/// when every likelihood is zero.
pub fn advice_posterior(advice: &[(usize, usize)], rhos: &[f64], num_actions: usize) -> Option<(usize, f64)> {
    if num_actions <= 1 {
        return Some((0, 1.0));
    }
    let others = (num_actions - 1) as f64;
    let likelihoods: Vec<f64> = (0..num_actions)
        .map(|candidate| {
            advice.iter().fold(1.0, |acc, (expert, advised)| {
                let rho = rhos[*expert];
                if *advised == candidate {
                    acc * rho
                } else {
                    acc * (1.0 - rho) / others
                }
            })
        })
        .collect();

    let total: f64 = likelihoods.iter().sum();
    if total <= 0.0 || !total.is_finite() {
        return None;
    }
    let best = clue_core::argmax(&likelihoods);
    Some((best, likelihoods[best] / total))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clue_core::Dimension;

    fn space() -> Space {
        Space::new(vec![Dimension::boolean("C0"), Dimension::boolean("C1")])
    }

    #[test]
    fn test_book_keeps_latest_advice() {
        let experts = vec!["0".to_string(), "1".to_string()];
        let mut book = AdviceBook::new(&experts, &space());
        let state = State(vec![1, 0]);
        book.record(&state, &[Some(Action(vec![0])), None]);
        book.record(&state, &[Some(Action(vec![1])), None]);
        assert_eq!(book.latest(0, &state), Some(&Action(vec![1])));
        assert_eq!(book.latest(1, &state), None);
        assert_eq!(book.for_state(&state).len(), 1);
        assert!(book.for_state(&State(vec![0, 0])).is_empty());
    }

    #[test]
    fn test_posterior_single_reliable_expert() {
        let (best, p) = advice_posterior(&[(0, 2)], &[1.0], 4).unwrap();
        assert_eq!(best, 2);
        assert!((p - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_posterior_agreeing_experts_reinforce() {
        let (_, one) = advice_posterior(&[(0, 1)], &[0.6, 0.6], 4).unwrap();
        let (best, two) = advice_posterior(&[(0, 1), (1, 1)], &[0.6, 0.6], 4).unwrap();
        assert_eq!(best, 1);
        assert!(two > one);
    }

    #[test]
    fn test_posterior_contradicting_certain_experts() {
        // Both experts claim certainty about different actions.
        assert!(advice_posterior(&[(0, 0), (1, 1)], &[1.0, 1.0], 4).is_none());
    }

    #[test]
    fn test_posterior_adversarial_expert_spreads_mass() {
        let (best, p) = advice_posterior(&[(0, 0)], &[0.0], 4).unwrap();
        assert_eq!(best, 1);
        assert!((p - 1.0 / 3.0).abs() < 1e-12);
    }
}
