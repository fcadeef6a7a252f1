use serde::{Deserialize, Serialize};

/// Index of a variable inside its network.
pub type VarId = usize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableKind {
    Chance,
    /// A decision observes its parents before it is made.
    Decision { parents: Vec<VarId> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub id: VarId,
    pub name: String,
    pub labels: Vec<String>,
    pub kind: VariableKind,
}

impl Variable {
    pub fn chance(id: VarId, name: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            id,
            name: name.into(),
            labels,
            kind: VariableKind::Chance,
        }
    }

    pub fn decision(id: VarId, name: impl Into<String>, labels: Vec<String>, parents: Vec<VarId>) -> Self {
        Self {
            id,
            name: name.into(),
            labels,
            kind: VariableKind::Decision { parents },
        }
    }

    pub fn cardinality(&self) -> usize {
        self.labels.len()
    }

    pub fn is_decision(&self) -> bool {
        matches!(self.kind, VariableKind::Decision { .. })
    }

    pub fn parents(&self) -> &[VarId] {
        match &self.kind {
            VariableKind::Decision { parents } => parents,
            VariableKind::Chance => &[],
        }
    }

    /// Parents of a decision plus the decision itself.
    pub fn information_set(&self) -> Vec<VarId> {
        let mut set = self.parents().to_vec();
        set.push(self.id);
        set
    }
}
