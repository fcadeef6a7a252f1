use clue_core::{Action, ClueError, ClueResult, Dimension, SimRng, Space, State};
use clue_pgm::{DecisionNetwork, Evidence, VarId};
use rand::Rng;
use std::fmt;

/// A single-stage decision problem: sample a state from the chance
/// variables, let the agent set the decision variables, pay the utility.
///
/// Chance variables form the state space in network order and decisions
/// form the action space in decision order. No decision may be a parent of
/// a chance variable.
#[derive(Debug, Clone)]
pub struct InfluenceDiagram {
    name: String,
    network: DecisionNetwork,
    state_space: Space,
    action_space: Space,
    chance_ids: Vec<VarId>,
    decision_ids: Vec<VarId>,
}

impl InfluenceDiagram {
    pub fn new(name: impl Into<String>, network: DecisionNetwork) -> ClueResult<Self> {
        let chance_ids = network.chance_ids();
        let decision_ids = network.decision_order().to_vec();
        if decision_ids.is_empty() {
            return Err(ClueError::Model("an SSDP needs at least one decision".to_string()));
        }

        let dimension = |id: &VarId| -> ClueResult<Dimension> {
            let var = network
                .variable(*id)
                .ok_or_else(|| ClueError::Model(format!("unknown variable {}", id)))?;
            Ok(Dimension::new(var.name.clone(), var.labels.clone()))
        };
        let state_space = Space::new(chance_ids.iter().map(dimension).collect::<ClueResult<_>>()?);
        let action_space = Space::new(decision_ids.iter().map(dimension).collect::<ClueResult<_>>()?);

        Ok(Self {
            name: name.into(),
            network,
            state_space,
            action_space,
            chance_ids,
            decision_ids,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn network(&self) -> &DecisionNetwork {
        &self.network
    }

    pub fn state_space(&self) -> &Space {
        &self.state_space
    }

    pub fn action_space(&self) -> &Space {
        &self.action_space
    }

    pub fn chance_ids(&self) -> &[VarId] {
        &self.chance_ids
    }

    pub fn decision_ids(&self) -> &[VarId] {
        &self.decision_ids
    }

    /// `(|S|, |A|)`.
    pub fn size(&self) -> (usize, usize) {
        (self.state_space.size(), self.action_space.size())
    }

    pub fn state_index(&self, state: &State) -> usize {
        self.state_space.index_of(state)
    }

    pub fn action_index(&self, action: &Action) -> usize {
        self.action_space.index_of(action)
    }

    pub fn state_at(&self, index: usize) -> State {
        State(self.state_space.values_at(index))
    }

    pub fn action_at(&self, index: usize) -> Action {
        Action(self.action_space.values_at(index))
    }

    /// Evidence assigning every chance variable from `state`.
    pub fn state_evidence(&self, state: &State) -> Evidence {
        let mut evidence = self.network.empty_evidence();
        for (id, value) in self.chance_ids.iter().zip(state.iter()) {
            evidence.set(*id, *value);
        }
        evidence
    }

    /// Evidence assigning the state and the action.
    pub fn joint_evidence(&self, state: &State, action: &Action) -> Evidence {
        let mut evidence = self.state_evidence(state);
        for (id, value) in self.decision_ids.iter().zip(action.iter()) {
            evidence.set(*id, *value);
        }
        evidence
    }

    /// Sample a fresh state, chance variables in network order.
    pub fn reset(&self, rng: &mut SimRng) -> ClueResult<State> {
        let mut evidence = self.network.empty_evidence();
        let mut state = Vec::with_capacity(self.chance_ids.len());
        for id in &self.chance_ids {
            let cpd = self
                .network
                .cpd(*id)
                .ok_or_else(|| ClueError::Model(format!("chance variable {} has no CPD", id)))?;
            let distribution = cpd.distribution(&evidence)?;
            let value = sample_index(distribution, rng);
            evidence.set(*id, value);
            state.push(value);
        }
        Ok(State(state))
    }

    /// Reward for taking `action` in `state`.
    pub fn step(&self, state: &State, action: &Action) -> ClueResult<f64> {
        self.network.utility().value(&self.joint_evidence(state, action))
    }

    /// Every CPD and the utility table, one row per assignment.
    pub fn describe_tables(&self) -> String {
        let mut text = format!("====={}=====\n", self.name);
        for cpd in self.network.cpds() {
            let name = self.var_name(cpd.child());
            text.push_str(&format!("==={}===\n", name));
            text.push_str(&self.render_factor(cpd.factor().vars(), cpd.factor().values()));
        }
        text.push_str("===reward===\n");
        let utility = self.network.utility();
        text.push_str(&self.render_factor(utility.vars(), utility.values()));
        text
    }

    fn var_name(&self, id: VarId) -> String {
        self.network
            .variable(id)
            .map(|v| v.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn render_factor(&self, vars: &[VarId], values: &[f64]) -> String {
        let space = Space::new(
            vars.iter()
                .filter_map(|id| self.network.variable(*id))
                .map(|v| Dimension::new(v.name.clone(), v.labels.clone()))
                .collect(),
        );
        let mut text = String::new();
        for (index, value) in values.iter().enumerate() {
            text.push_str(&format!("{} : {:.3}\n", space.describe(&space.values_at(index)), value));
        }
        text
    }

    /// Parents of every node, reward last.
    pub fn parents(&self) -> Vec<(String, Vec<String>)> {
        let names = |ids: &[VarId]| ids.iter().map(|id| self.var_name(*id)).collect::<Vec<_>>();
        let mut parents = Vec::new();
        for var in self.network.variables() {
            let ids = match self.network.cpd(var.id) {
                Some(cpd) => cpd.parents().to_vec(),
                None => var.parents().to_vec(),
            };
            parents.push((var.name.clone(), names(&ids)));
        }
        parents.push(("reward".to_string(), names(self.network.utility().vars())));
        parents
    }
}

fn sample_index(distribution: &[f64], rng: &mut SimRng) -> usize {
    let draw: f64 = rng.gen();
    let mut cumulative = 0.0;
    for (i, p) in distribution.iter().enumerate() {
        cumulative += p;
        if draw < cumulative {
            return i;
        }
    }
    distribution.len().saturating_sub(1)
}

impl fmt::Display for InfluenceDiagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (size_s, size_a) = self.size();
        writeln!(f, "====={}=====", self.name)?;
        writeln!(f, "State Variables : {} (|S|={})", self.state_space.len(), size_s)?;
        for dim in self.state_space.dims() {
            writeln!(f, "\t{} : {:?}", dim.name, dim.labels)?;
        }
        writeln!(f, "Action Variables : {} (|A|={})", self.action_space.len(), size_a)?;
        for dim in self.action_space.dims() {
            writeln!(f, "\t{} : {:?}", dim.name, dim.labels)?;
        }
        writeln!(f, "Parents")?;
        for (node, parents) in self.parents() {
            writeln!(f, "\t{} : {:?}", node, parents)?;
        }
        write!(f, "For CPDs and reward function, run `clue-sim describe --tables`")
    }
}
