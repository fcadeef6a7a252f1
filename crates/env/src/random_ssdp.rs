use crate::diagram::InfluenceDiagram;
use clue_core::{seeded_rng, ClueError, ClueResult, SimRng};
use clue_pgm::{Cpd, DecisionNetwork, Factor, VarId, Variable};
use rand::seq::index::sample;
use rand::Rng;
use tracing::debug;

/// Largest number of chance variables a generated diagram may have; CPD and
/// utility tables grow as `2^n`.
pub const MAX_CHANCE: usize = 20;

/// Generator for random boolean SSDPs.
///
/// Chance variable `Ci` draws its parents from `C0..C(i-1)`; decision `Aj`
/// observes every chance variable and every earlier decision; the reward
/// depends on a random subset of chance variables and on every decision.
#[derive(Debug, Clone, PartialEq)]
pub struct RandomSsdp {
    pub num_chance: usize,
    pub num_decision: usize,
    pub reward_range: (f64, f64),
}

fn boolean() -> Vec<String> {
    vec!["False".to_string(), "True".to_string()]
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

/// `count` distinct elements of `0..len`, drawn uniformly, sorted.
fn choose_subset(len: usize, rng: &mut SimRng) -> Vec<usize> {
    let count = rng.gen_range(0..=len);
    let mut chosen = sample(rng, len, count).into_vec();
    chosen.sort_unstable();
    chosen
}

impl RandomSsdp {
    pub fn new(num_chance: usize, num_decision: usize, reward_range: (f64, f64)) -> Self {
        Self {
            num_chance,
            num_decision,
            reward_range,
        }
    }

    pub fn name(&self) -> String {
        format!("Random ({},{})", self.num_chance, self.num_decision)
    }

    /// Build the diagram. The same seed always yields the same network.
    pub fn build(&self, seed: u64) -> ClueResult<InfluenceDiagram> {
        if self.num_decision == 0 {
            return Err(ClueError::InvalidParameter(
                "a random SSDP needs at least one decision".to_string(),
            ));
        }
        if self.num_chance > MAX_CHANCE || self.num_chance + self.num_decision > MAX_CHANCE + 4 {
            return Err(ClueError::InvalidParameter(format!(
                "random SSDP with {} chance and {} decision variables is too large",
                self.num_chance, self.num_decision
            )));
        }
        let (low, high) = self.reward_range;
        if !(low < high) {
            return Err(ClueError::InvalidParameter(format!(
                "reward range [{}, {}] is empty",
                low, high
            )));
        }

        let mut rng = seeded_rng(seed);
        let n = self.num_chance;

        let mut variables: Vec<Variable> = (0..n)
            .map(|i| Variable::chance(i, format!("C{}", i), boolean()))
            .collect();
        for j in 0..self.num_decision {
            let parents: Vec<VarId> = (0..n + j).collect();
            variables.push(Variable::decision(n + j, format!("A{}", j), boolean(), parents));
        }

        let mut cpds = Vec::with_capacity(n);
        for child in 0..n {
            let parents = choose_subset(child, &mut rng);
            let rows = 1usize << parents.len();
            let mut values = Vec::with_capacity(rows * 2);
            for _ in 0..rows {
                let p = round3(rng.gen_range(0.0..1.0));
                values.push(p);
                values.push(round3(1.0 - p));
            }
            let mut cards = vec![2; parents.len()];
            cards.push(2);
            cpds.push(Cpd::new(child, parents, cards, values)?);
        }

        let mut reward_parents = choose_subset(n, &mut rng);
        reward_parents.extend(n..n + self.num_decision);
        let size = 1usize << reward_parents.len();
        let utility_values: Vec<f64> = (0..size).map(|_| rng.gen_range(low..high)).collect();
        let cards = vec![2; reward_parents.len()];
        let utility = Factor::new(reward_parents, cards, utility_values)?;

        let network = DecisionNetwork::new(variables, cpds, utility)?;
        debug!(
            name = %self.name(),
            seed,
            reward_parents = network.utility().vars().len(),
            "random SSDP built"
        );
        InfluenceDiagram::new(self.name(), network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_network() {
        let generator = RandomSsdp::new(5, 2, (-1.0, 1.0));
        let a = generator.build(3).unwrap();
        let b = generator.build(3).unwrap();
        assert_eq!(a.describe_tables(), b.describe_tables());
        assert_ne!(a.describe_tables(), generator.build(4).unwrap().describe_tables());
    }

    #[test]
    fn test_structure() {
        let env = RandomSsdp::new(6, 3, (-1.0, 1.0)).build(1).unwrap();
        assert_eq!(env.name(), "Random (6,3)");
        assert_eq!(env.size(), (64, 8));

        let network = env.network();
        for id in env.chance_ids() {
            let cpd = network.cpd(*id).unwrap();
            assert!(cpd.parents().iter().all(|p| p < id));
            for p in cpd.factor().values() {
                assert_eq!(*p, round3(*p));
            }
        }
        let reward = network.utility().vars();
        for decision in env.decision_ids() {
            assert!(reward.contains(decision));
        }
        assert!(network.utility().values().iter().all(|u| (-1.0..1.0).contains(u)));
    }

    #[test]
    fn test_decisions_observe_all_chance_and_earlier_decisions() {
        let env = RandomSsdp::new(3, 3, (-1.0, 1.0)).build(9).unwrap();
        let last = env.network().variable(env.decision_ids()[2]).unwrap();
        assert_eq!(last.parents(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(RandomSsdp::new(3, 0, (-1.0, 1.0)).build(1).is_err());
        assert!(RandomSsdp::new(3, 1, (1.0, 1.0)).build(1).is_err());
        assert!(RandomSsdp::new(MAX_CHANCE + 1, 1, (-1.0, 1.0)).build(1).is_err());
    }
}
