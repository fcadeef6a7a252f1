use crate::diagram::InfluenceDiagram;
use clue_core::{argmax, Action, ClueError, ClueResult, Dimension, Space, State};
use clue_pgm::{VarId, VariableEliminator};
use std::sync::Arc;
use tracing::{debug, info};

/// Knows the optimal policy of an environment.
///
/// The diagram is solved once by variable elimination; the optimal action
/// and the utility of every state-action pair are then tabulated so lookups
/// during a session are infallible.
#[derive(Debug, Clone)]
pub struct Oracle {
    env: Arc<InfluenceDiagram>,
    value: f64,
    optimal: Vec<usize>,
    utilities: Vec<f64>,
}

impl Oracle {
    pub fn new(env: Arc<InfluenceDiagram>) -> ClueResult<Self> {
        let solution = VariableEliminator::new(env.network()).optimize()?;
        let (size_s, size_a) = env.size();

        let mut optimal = Vec::with_capacity(size_s);
        let mut utilities = Vec::with_capacity(size_s * size_a);
        for state_index in 0..size_s {
            let state = env.state_at(state_index);
            let mut evidence = env.state_evidence(&state);
            for function in &solution.policy {
                let choice = function.choose(&evidence)?;
                evidence.set(function.decision(), choice);
            }
            let action = Action(env.decision_ids().iter().filter_map(|d| evidence.get(*d)).collect());
            optimal.push(env.action_index(&action));

            for action_index in 0..size_a {
                utilities.push(env.step(&state, &env.action_at(action_index))?);
            }
        }

        info!(env = %env.name(), value = solution.value, "oracle solved environment");
        Ok(Self {
            env,
            value: solution.value,
            optimal,
            utilities,
        })
    }

    pub fn env(&self) -> &Arc<InfluenceDiagram> {
        &self.env
    }

    /// Maximum expected utility of the environment.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn optimal_index(&self, state_index: usize) -> usize {
        self.optimal[state_index]
    }

    pub fn act(&self, state: &State) -> Action {
        self.env.action_at(self.optimal[self.env.state_index(state)])
    }

    /// Utility of `action` in the fully observed `state`.
    pub fn expected_utility(&self, state: &State, action: &Action) -> f64 {
        let (_, size_a) = self.env.size();
        self.utilities[self.env.state_index(state) * size_a + self.env.action_index(action)]
    }

    /// Optimal policy of an observer blind to the `hidden` chance variables.
    pub fn partial_policy(&self, hidden: &[VarId]) -> ClueResult<PartialPolicy> {
        let env = &self.env;
        for id in hidden {
            if !env.chance_ids().contains(id) {
                return Err(ClueError::InvalidParameter(format!(
                    "hidden variable {} is not a chance variable",
                    id
                )));
            }
        }

        let visible_positions: Vec<usize> = env
            .chance_ids()
            .iter()
            .enumerate()
            .filter(|(_, id)| !hidden.contains(id))
            .map(|(pos, _)| pos)
            .collect();
        let visible_space = Space::new(
            visible_positions
                .iter()
                .map(|pos| env.state_space().dims()[*pos].clone())
                .collect::<Vec<Dimension>>(),
        );

        let eliminator = VariableEliminator::new(env.network());
        let (_, size_a) = env.size();
        let mut utilities = Vec::with_capacity(visible_space.size() * size_a);
        let mut best = Vec::with_capacity(visible_space.size());
        for visible_index in 0..visible_space.size() {
            let values = visible_space.values_at(visible_index);
            let mut evidence = env.network().empty_evidence();
            for (pos, value) in visible_positions.iter().zip(&values) {
                evidence.set(env.chance_ids()[*pos], *value);
            }
            let start = utilities.len();
            // Unreachable observations keep a zero row.
            if eliminator.evidence_probability(&evidence)? <= 0.0 {
                utilities.extend(std::iter::repeat(0.0).take(size_a));
                best.push(0);
                continue;
            }
            for action_index in 0..size_a {
                let action = env.action_at(action_index);
                let mut joint = evidence.clone();
                for (id, value) in env.decision_ids().iter().zip(action.iter()) {
                    joint.set(*id, *value);
                }
                utilities.push(eliminator.expected_utility(&joint)?);
            }
            best.push(argmax(&utilities[start..]));
        }

        let hidden_names: Vec<String> = hidden
            .iter()
            .filter_map(|id| env.network().variable(*id))
            .map(|v| v.name.clone())
            .collect();
        debug!(hidden = ?hidden_names, "partial policy computed");
        Ok(PartialPolicy {
            env: Arc::clone(env),
            hidden: hidden_names,
            visible_positions,
            visible_space,
            utilities,
            best,
        })
    }
}

/// Best actions and expected utilities for an observer that cannot see
/// some chance variables.
#[derive(Debug, Clone)]
pub struct PartialPolicy {
    env: Arc<InfluenceDiagram>,
    hidden: Vec<String>,
    visible_positions: Vec<usize>,
    visible_space: Space,
    utilities: Vec<f64>,
    best: Vec<usize>,
}

impl PartialPolicy {
    pub fn hidden(&self) -> &[String] {
        &self.hidden
    }

    fn visible_index(&self, state: &State) -> usize {
        let values: Vec<usize> = self.visible_positions.iter().map(|pos| state[*pos]).collect();
        self.visible_space.index_of(&values)
    }

    pub fn act(&self, state: &State) -> Action {
        self.env.action_at(self.best[self.visible_index(state)])
    }

    /// E[U | visible part of `state`, `action`].
    pub fn expected_utility(&self, state: &State, action: &Action) -> f64 {
        let (_, size_a) = self.env.size();
        self.utilities[self.visible_index(state) * size_a + self.env.action_index(action)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random_ssdp::RandomSsdp;

    fn oracle(seed: u64) -> Oracle {
        let env = RandomSsdp::new(4, 2, (-1.0, 1.0)).build(seed).unwrap();
        Oracle::new(Arc::new(env)).unwrap()
    }

    #[test]
    fn test_oracle_action_is_best_in_every_state() {
        let oracle = oracle(2);
        let env = Arc::clone(oracle.env());
        let (size_s, size_a) = env.size();
        for s in 0..size_s {
            let state = env.state_at(s);
            let best = oracle.expected_utility(&state, &oracle.act(&state));
            for a in 0..size_a {
                assert!(oracle.expected_utility(&state, &env.action_at(a)) <= best + 1e-12);
            }
        }
    }

    #[test]
    fn test_value_matches_state_average() {
        let oracle = oracle(5);
        let env = Arc::clone(oracle.env());
        let eliminator = VariableEliminator::new(env.network());
        let mut expected = 0.0;
        for s in 0..env.size().0 {
            let state = env.state_at(s);
            let evidence = env.state_evidence(&state);
            let probability = eliminator.evidence_probability(&evidence).unwrap();
            expected += probability * oracle.expected_utility(&state, &oracle.act(&state));
        }
        assert!((expected - oracle.value()).abs() < 1e-9);
    }

    #[test]
    fn test_nothing_hidden_matches_oracle() {
        let oracle = oracle(7);
        let partial = oracle.partial_policy(&[]).unwrap();
        let env = Arc::clone(oracle.env());
        for s in 0..env.size().0 {
            let state = env.state_at(s);
            let a = partial.act(&state);
            assert!(
                (oracle.expected_utility(&state, &a) - oracle.expected_utility(&state, &oracle.act(&state))).abs()
                    < 1e-12
            );
        }
    }

    #[test]
    fn test_partial_policy_ignores_hidden_variable() {
        let oracle = oracle(11);
        let partial = oracle.partial_policy(&[0]).unwrap();
        assert_eq!(partial.hidden(), &["C0".to_string()]);
        let a = State(vec![0, 1, 0, 1]);
        let b = State(vec![1, 1, 0, 1]);
        assert_eq!(partial.act(&a), partial.act(&b));
        assert!(oracle.partial_policy(&[4]).is_err());
    }
}
