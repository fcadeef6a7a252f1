use crate::agent::{Agent, Learner};
use clue_core::config::AgentConfig;
use clue_core::{argmax, Action, ClueResult, SimRng, State, ValueTable};
use clue_env::InfluenceDiagram;
use std::sync::Arc;

/// Upper confidence bound learner: `Q(s,a) + c * sqrt(ln(t + 1) / n(s,a))`
/// with visit counts starting at one.
#[derive(Debug, Clone)]
pub struct UcbAgent {
    env: Arc<InfluenceDiagram>,
    c: f64,
    q0: f64,
    q: ValueTable,
    visits: Vec<f64>,
    trial_count: u64,
}

impl UcbAgent {
    pub fn new(env: Arc<InfluenceDiagram>, config: &AgentConfig) -> ClueResult<Self> {
        let (size_s, size_a) = env.size();
        Ok(Self {
            c: config.ucb_c,
            q0: config.q0,
            q: ValueTable::new(size_s, size_a, config.q0, config.alpha)?,
            visits: vec![1.0; size_s * size_a],
            trial_count: 0,
            env,
        })
    }

    /// Exploration-adjusted score of every action in `state`.
    pub fn scores(&self, state: &State) -> Vec<f64> {
        let state_index = self.env.state_index(state);
        let (_, size_a) = self.env.size();
        let log_t = ((self.trial_count + 1) as f64).ln();
        self.q
            .row(state_index)
            .iter()
            .enumerate()
            .map(|(a, q)| q + self.c * (log_t / self.visits[state_index * size_a + a]).sqrt())
            .collect()
    }
}

impl Agent for UcbAgent {
    fn name(&self) -> &str {
        "UCB Baseline Agent"
    }

    fn act(&mut self, state: &State, explore: bool, _rng: &mut SimRng) -> Action {
        let best = if explore {
            argmax(&self.scores(state))
        } else {
            argmax(self.q.row(self.env.state_index(state)))
        };
        self.env.action_at(best)
    }

    fn learn(&mut self, state: &State, action: &Action, reward: f64, _advice: &[Option<Action>]) {
        self.trial_count += 1;
        let (_, size_a) = self.env.size();
        let (s, a) = (self.env.state_index(state), self.env.action_index(action));
        self.q.update(s, a, reward);
        self.visits[s * size_a + a] += 1.0;
    }

    fn reset(&mut self, _experts: &[String]) {
        self.trial_count = 0;
        self.q.reset(self.q0);
        self.visits.iter_mut().for_each(|v| *v = 1.0);
    }
}

impl Learner for UcbAgent {
    fn estimate(&self, state: &State, action: &Action) -> f64 {
        self.q.get(self.env.state_index(state), self.env.action_index(action))
    }

    fn best_estimate(&self, state: &State) -> f64 {
        let row = self.q.row(self.env.state_index(state));
        row[argmax(row)]
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

    #[test]
    fn test_unvisited_actions_get_bonus() {
        let env = Arc::new(RandomSsdp::new(2, 1, (-1.0, 1.0)).build(2).unwrap());
        let mut agent = UcbAgent::new(env, &AgentConfig::default()).unwrap();
        let state = State(vec![0, 1]);
        for _ in 0..5 {
            agent.learn(&state, &Action(vec![0]), 0.1, &[]);
        }
        let scores = agent.scores(&state);
        // Action 1 was never tried: Q = 0 but its bonus dominates.
        assert!(scores[1] > scores[0]);
        let mut rng = seeded_rng(0);
        assert_eq!(agent.act(&state, true, &mut rng), Action(vec![1]));
        assert_eq!(agent.act(&state, false, &mut rng), Action(vec![0]));
    }
}
