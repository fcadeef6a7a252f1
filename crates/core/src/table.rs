//! Dense tables indexed by assignments of a [`Space`].

use crate::error::{ClueError, ClueResult};
use crate::types::{SimRng, Space};
use rand::seq::SliceRandom;
use std::fmt;

/// One value per joint assignment of a space.
#[derive(Debug, Clone)]
pub struct StateTable<T> {
    space: Space,
    values: Vec<T>,
}

impl<T: Clone> StateTable<T> {
    pub fn new(space: Space, default: T) -> Self {
        let values = vec![default; space.size()];
        Self { space, values }
    }

    /// Every cell drawn uniformly from `choices`.
    pub fn with_random_values(space: Space, choices: &[T], rng: &mut SimRng) -> ClueResult<Self> {
        if choices.is_empty() {
            return Err(ClueError::InvalidParameter(
                "random table needs at least one choice".to_string(),
            ));
        }
        let values = (0..space.size())
            .map(|_| choices.choose(rng).cloned())
            .collect::<Option<Vec<T>>>()
            .ok_or_else(|| ClueError::InvalidParameter("no choice available".to_string()))?;
        Ok(Self { space, values })
    }
}

impl<T> StateTable<T> {
    pub fn space(&self) -> &Space {
        &self.space
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn get(&self, assignment: &[usize]) -> &T {
        &self.values[self.space.index_of(assignment)]
    }

    pub fn get_mut(&mut self, assignment: &[usize]) -> &mut T {
        let index = self.space.index_of(assignment);
        &mut self.values[index]
    }

    pub fn set(&mut self, assignment: &[usize], value: T) {
        let index = self.space.index_of(assignment);
        self.values[index] = value;
    }

    pub fn get_index(&self, index: usize) -> &T {
        &self.values[index]
    }

    pub fn set_index(&mut self, index: usize, value: T) {
        self.values[index] = value;
    }
}

impl<T: fmt::Debug> fmt::Display for StateTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "==State Table==")?;
        for (i, value) in self.values.iter().enumerate() {
            writeln!(f, "{} : {:?}", self.space.describe(&self.space.values_at(i)), value)?;
        }
        Ok(())
    }
}

/// Action-value estimates Q(s,a), stored row-major by state.
#[derive(Debug, Clone)]
pub struct ValueTable {
    num_actions: usize,
    values: Vec<f64>,
    counts: Vec<u64>,
    alpha: Option<f64>,
}

impl ValueTable {
    /// `alpha = None` selects the count-based rate `1 / n(s,a)`.
    pub fn new(num_states: usize, num_actions: usize, q0: f64, alpha: Option<f64>) -> ClueResult<Self> {
        Self::from_values(num_actions, vec![q0; num_states * num_actions], alpha)
    }

    /// Start from an explicit table of initial estimates.
    pub fn from_values(num_actions: usize, values: Vec<f64>, alpha: Option<f64>) -> ClueResult<Self> {
        if num_actions == 0 || values.len() % num_actions != 0 {
            return Err(ClueError::InvalidParameter(format!(
                "size of Q0 does not match state-action space size ({} values, {} actions)",
                values.len(),
                num_actions
            )));
        }
        if let Some(a) = alpha {
            if !(a > 0.0 && a <= 1.0) {
                return Err(ClueError::InvalidParameter(format!("invalid alpha: {}", a)));
            }
        }
        let counts = vec![0; values.len()];
        Ok(Self {
            num_actions,
            values,
            counts,
            alpha,
        })
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    pub fn get(&self, state_index: usize, action_index: usize) -> f64 {
        self.values[state_index * self.num_actions + action_index]
    }

    pub fn row(&self, state_index: usize) -> &[f64] {
        let start = state_index * self.num_actions;
        &self.values[start..start + self.num_actions]
    }

    /// Every estimate back to `q0`, every count to zero.
    pub fn reset(&mut self, q0: f64) {
        self.values.iter_mut().for_each(|v| *v = q0);
        self.counts.iter_mut().for_each(|c| *c = 0);
    }

    pub fn update(&mut self, state_index: usize, action_index: usize, reward: f64) {
        let index = state_index * self.num_actions + action_index;
        self.counts[index] += 1;
        let alpha = match self.alpha {
            Some(a) => a,
            None => 1.0 / self.counts[index] as f64,
        };
        self.values[index] += alpha * (reward - self.values[index]);
    }
}

/// Index of the first maximum (strict `>` scan).
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

/// Indices of every maximal entry.
pub fn argmax_all(values: &[f64]) -> Vec<usize> {
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v == max)
        .map(|(i, _)| i)
        .collect()
}
