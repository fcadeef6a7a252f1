use clue_core::{argmax_all, Action, ClueError, ClueResult, SimRng, State};
use rand::seq::SliceRandom;
use rand::Rng;

/// Something that acts in an SSDP and may learn from rewards and advice.
pub trait Agent: Send {
    fn name(&self) -> &str;

    /// Choose an action. With `explore = false` the agent exploits its
    /// current estimates.
    fn act(&mut self, state: &State, explore: bool, rng: &mut SimRng) -> Action;

    /// Learn from one trial. `advice` is aligned with the expert names given
    /// to [`Agent::reset`]; agents that ignore advice accept an empty slice.
    fn learn(&mut self, state: &State, action: &Action, reward: f64, advice: &[Option<Action>]);

    /// Start a fresh run advised by `experts`.
    fn reset(&mut self, experts: &[String]);

    fn takes_advice(&self) -> bool {
        false
    }

    /// Estimated reliability of every expert, one entry per `act` call.
    fn rho_history(&self) -> Option<&[Vec<f64>]> {
        None
    }
}

/// An unassisted learner whose estimates can be used to judge advice.
pub trait Learner: Agent {
    /// Current value estimate of `action` in `state`.
    fn estimate(&self, state: &State, action: &Action) -> f64;

    /// Highest value estimate over all actions in `state`.
    fn best_estimate(&self, state: &State) -> f64;

    fn into_agent(self: Box<Self>) -> Box<dyn Agent>;
}

/// Linear interpolation from `start` to `end` over `steps` trials, constant
/// afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearSchedule {
    start: f64,
    end: f64,
    steps: f64,
}

impl LinearSchedule {
    pub fn new(start: f64, end: f64, fraction: f64, trials: usize) -> Self {
        Self {
            start,
            end,
            steps: fraction * trials as f64,
        }
    }

    pub fn value(&self, trial_count: u64) -> f64 {
        let fraction = if self.steps > 0.0 {
            (trial_count as f64 / self.steps).min(1.0)
        } else {
            1.0
        };
        self.start + fraction * (self.end - self.start)
    }
}

pub(crate) fn check_trials(trials: usize) -> ClueResult<usize> {
    if trials == 0 {
        return Err(ClueError::InvalidParameter(
            "0 is an invalid number of trials (must be > 0)".to_string(),
        ));
    }
    Ok(trials)
}

pub(crate) fn check_unit(name: &str, value: f64) -> ClueResult<f64> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ClueError::InvalidParameter(format!(
            "{} {} must be on interval [0,1]",
            name, value
        )))
    }
}

/// Uniformly random among the maximal entries.
pub(crate) fn argmax_random(values: &[f64], rng: &mut SimRng) -> usize {
    argmax_all(values).choose(rng).copied().unwrap_or(0)
}

/// Bernoulli draw that is always false for `p <= 0` and true for `p >= 1`.
pub(crate) fn chance(p: f64, rng: &mut SimRng) -> bool {
    rng.gen::<f64>() < p
}
