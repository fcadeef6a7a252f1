use crate::agent::{argmax_random, Agent, Learner};
use clue_core::config::AgentConfig;
use clue_core::{argmax, Action, SimRng, State};
use clue_env::InfluenceDiagram;
use ndarray::{Array1, Array2, Axis};
use std::sync::Arc;

#[derive(Debug, Clone)]
struct Arm {
    a: Array2<f64>,
    b: Array1<f64>,
}

impl Arm {
    fn new(dim: usize) -> Self {
        Self {
            a: Array2::eye(dim),
            b: Array1::zeros(dim),
        }
    }

    /// `(theta . x, x' A^-1 x)`.
    fn evaluate(&self, x: &Array1<f64>) -> (f64, f64) {
        let theta = cholesky_solve(&self.a, &self.b);
        let z = cholesky_solve(&self.a, x);
        (theta.dot(x), x.dot(&z).max(0.0))
    }
}

/// Solve `A y = rhs` for symmetric positive definite `A`.
fn cholesky_solve(a: &Array2<f64>, rhs: &Array1<f64>) -> Array1<f64> {
    let n = rhs.len();
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let s: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                l[[i, j]] = (a[[i, i]] - s).max(f64::EPSILON).sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - s) / l[[j, j]];
            }
        }
    }
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let s: f64 = (0..i).map(|k| l[[i, k]] * y[k]).sum();
        y[i] = (rhs[i] - s) / l[[i, i]];
    }
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let s: f64 = (i + 1..n).map(|k| l[[k, i]] * x[k]).sum();
        x[i] = (y[i] - s) / l[[i, i]];
    }
    x
}

/// Disjoint LinUCB with one arm per joint action and the chance variables as
/// context.
#[derive(Debug, Clone)]
pub struct LinUcbAgent {
    env: Arc<InfluenceDiagram>,
    alpha: f64,
    arms: Vec<Arm>,
}

impl LinUcbAgent {
    pub fn new(env: Arc<InfluenceDiagram>, config: &AgentConfig) -> Self {
        let (_, size_a) = env.size();
        let dim = env.state_space().len();
        Self {
            alpha: config.linucb_alpha,
            arms: (0..size_a).map(|_| Arm::new(dim)).collect(),
            env,
        }
    }

    /// Unit-length indicator vector of the chance variables that are set.
    pub fn context(&self, state: &State) -> Array1<f64> {
        let x: Array1<f64> = state.iter().map(|&v| if v >= 1 { 1.0 } else { 0.0 }).collect();
        let norm = x.dot(&x).sqrt();
        if norm == 0.0 {
            x
        } else {
            x / norm
        }
    }

    pub fn upper_bounds(&self, state: &State) -> Vec<f64> {
        let x = self.context(state);
        self.arms
            .iter()
            .map(|arm| {
                let (mean, var) = arm.evaluate(&x);
                mean + self.alpha * var.sqrt()
            })
            .collect()
    }

    fn predictions(&self, state: &State) -> Vec<f64> {
        let x = self.context(state);
        self.arms.iter().map(|arm| arm.evaluate(&x).0).collect()
    }
}

impl Agent for LinUcbAgent {
    fn name(&self) -> &str {
        "LinUCB Baseline Agent"
    }

    fn act(&mut self, state: &State, explore: bool, rng: &mut SimRng) -> Action {
        let best = if explore {
            argmax_random(&self.upper_bounds(state), rng)
        } else {
            argmax(&self.predictions(state))
        };
        self.env.action_at(best)
    }

    fn learn(&mut self, state: &State, action: &Action, reward: f64, _advice: &[Option<Action>]) {
        // Rewards are mapped from [-1, 1] onto [0, 1].
        let reward = (reward + 1.0) / 2.0;
        let x = self.context(state);
        let arm = &mut self.arms[self.env.action_index(action)];
        let column = x.view().insert_axis(Axis(1));
        let row = x.view().insert_axis(Axis(0));
        arm.a += &column.dot(&row);
        arm.b.scaled_add(reward, &x);
    }

    fn reset(&mut self, _experts: &[String]) {
        let dim = self.env.state_space().len();
        self.arms.iter_mut().for_each(|arm| *arm = Arm::new(dim));
    }
}

impl Learner for LinUcbAgent {
    /// Predicted reward mapped back onto [-1, 1].
    fn estimate(&self, state: &State, action: &Action) -> f64 {
        let x = self.context(state);
        2.0 * self.arms[self.env.action_index(action)].evaluate(&x).0 - 1.0
    }

    fn best_estimate(&self, state: &State) -> f64 {
        self.predictions(state)
            .into_iter()
            .map(|p| 2.0 * p - 1.0)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    fn into_agent(self: Box<Self>) -> Box<dyn Agent> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clue_core::seeded_rng;
    use clue_env::RandomSsdp;
    use ndarray::array;

    fn agent() -> LinUcbAgent {
        let env = Arc::new(RandomSsdp::new(2, 1, (-1.0, 1.0)).build(5).unwrap());
        LinUcbAgent::new(env, &AgentConfig::default())
    }

    #[test]
    fn test_cholesky_solve() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let x = cholesky_solve(&a, &array![2.0, 1.0]);
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);
    }

    #[test]
    fn test_context_is_normalised() {
        let agent = agent();
        let x = agent.context(&State(vec![1, 1]));
        assert!((x.dot(&x) - 1.0).abs() < 1e-12);
        assert_eq!(agent.context(&State(vec![0, 0])), array![0.0, 0.0]);
    }

    #[test]
    fn test_learns_rewarding_arm() {
        let mut agent = agent();
        let state = State(vec![1, 0]);
        for _ in 0..50 {
            agent.learn(&state, &Action(vec![1]), 1.0, &[]);
            agent.learn(&state, &Action(vec![0]), -1.0, &[]);
        }
        let mut rng = seeded_rng(0);
        assert_eq!(agent.act(&state, true, &mut rng), Action(vec![1]));
        assert!(agent.estimate(&state, &Action(vec![1])) > 0.9);
        assert!(agent.estimate(&state, &Action(vec![0])) < -0.9);
    }

    #[test]
    fn test_fresh_arms_tie() {
        let agent = agent();
        let bounds = agent.upper_bounds(&State(vec![1, 1]));
        assert!((bounds[0] - bounds[1]).abs() < 1e-12);
        assert!((bounds[0] - 2.0).abs() < 1e-12);
    }
}
