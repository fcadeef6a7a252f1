use clue_core::{Action, ClueError, ClueResult, SimRng, State};
use rand::Rng;

/// An advisor that watches the agent and occasionally recommends an action.
pub trait Expert: Send {
    fn name(&self) -> &str;

    /// The action this expert recommends in `state`.
    fn advise(&self, state: &State, rng: &mut SimRng) -> Action;

    /// Observe one trial and decide whether to advise. Called once per trial.
    fn deliberate(&mut self, state: &State, action: &Action, reward: f64, rng: &mut SimRng) -> Option<Action>;

    /// Forget everything observed so far.
    fn reset(&mut self);
}

/// Decides when an expert speaks up.
///
/// Advice is given only if at least `mu` trials passed since the last
/// advice and the agent's average regret over those trials is at least
/// `gamma`.
#[derive(Debug, Clone)]
pub struct AdviceGate {
    mu: u64,
    gamma: f64,
    current_trial: u64,
    last_advice: u64,
    optimal_sum: f64,
    agent_sum: f64,
}

impl AdviceGate {
    pub fn new(mu: u64, gamma: f64) -> ClueResult<Self> {
        if !gamma.is_finite() {
            return Err(ClueError::InvalidParameter(format!("invalid gamma = {}", gamma)));
        }
        Ok(Self {
            mu,
            gamma,
            current_trial: 0,
            last_advice: 0,
            optimal_sum: 0.0,
            agent_sum: 0.0,
        })
    }

    pub fn mu(&self) -> u64 {
        self.mu
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Record one trial's expected utilities; returns whether to advise.
    pub fn observe(&mut self, optimal_utility: f64, agent_utility: f64) -> bool {
        self.current_trial += 1;
        self.optimal_sum += optimal_utility;
        self.agent_sum += agent_utility;

        let elapsed = self.current_trial - self.last_advice;
        if elapsed < self.mu {
            return false;
        }
        if (self.optimal_sum - self.agent_sum) / (elapsed as f64) < self.gamma {
            return false;
        }

        self.last_advice = self.current_trial;
        self.optimal_sum = 0.0;
        self.agent_sum = 0.0;
        true
    }

    pub fn reset(&mut self) {
        self.current_trial = 0;
        self.last_advice = 0;
        self.optimal_sum = 0.0;
        self.agent_sum = 0.0;
    }
}

pub(crate) fn check_rho(rho: f64) -> ClueResult<f64> {
    if (0.0..=1.0).contains(&rho) {
        Ok(rho)
    } else {
        Err(ClueError::InvalidParameter(format!(
            "invalid rho = {}! Must be in interval [0,1]",
            rho
        )))
    }
}

/// The optimal action index with probability `rho`, otherwise a uniformly
/// chosen different index.
pub(crate) fn unreliable_choice(optimal: usize, rho: f64, num_actions: usize, rng: &mut SimRng) -> usize {
    if num_actions <= 1 || rng.gen::<f64>() < rho {
        return optimal;
    }
    let other = rng.gen_range(0..num_actions - 1);
    if other >= optimal {
        other + 1
    } else {
        other
    }
}

/// Render a reliability the way result files name experts (`0`, `0.1`, `1`).
pub fn format_rho(rho: f64) -> String {
    format!("{}", rho)
}
