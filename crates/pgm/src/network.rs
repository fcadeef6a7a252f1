use crate::factor::{Cpd, Evidence, Factor};
use crate::variable::{VarId, Variable, VariableKind};
use clue_core::{ClueError, ClueResult};
use tracing::debug;

/// Influence diagram with a single utility node.
///
/// Every chance variable owns exactly one CPD whose parents are chance
/// variables with a lower id, so sampling in id order is ancestral. Decision
/// variables carry no CPD; their parents are their information set.
#[derive(Debug, Clone)]
pub struct DecisionNetwork {
    variables: Vec<Variable>,
    cpds: Vec<Option<Cpd>>,
    utility: Factor,
    decision_order: Vec<VarId>,
}

impl DecisionNetwork {
    pub fn new(variables: Vec<Variable>, cpds: Vec<Cpd>, utility: Factor) -> ClueResult<Self> {
        for (i, var) in variables.iter().enumerate() {
            if var.id != i {
                return Err(ClueError::Model(format!(
                    "variable '{}' has id {} but sits at position {}",
                    var.name, var.id, i
                )));
            }
            if var.cardinality() == 0 {
                return Err(ClueError::Model(format!("variable '{}' has no values", var.name)));
            }
            if variables[..i].iter().any(|v| v.name == var.name) {
                return Err(ClueError::Model(format!("duplicate variable name '{}'", var.name)));
            }
            for parent in var.parents() {
                if *parent >= variables.len() || *parent == i {
                    return Err(ClueError::Model(format!(
                        "decision '{}' has invalid parent {}",
                        var.name, parent
                    )));
                }
            }
        }

        let mut slots: Vec<Option<Cpd>> = vec![None; variables.len()];
        for cpd in cpds {
            let child = cpd.child();
            let var = variables
                .get(child)
                .ok_or_else(|| ClueError::Model(format!("CPD for unknown variable {}", child)))?;
            if var.is_decision() {
                return Err(ClueError::Model(format!("decision '{}' cannot have a CPD", var.name)));
            }
            if slots[child].is_some() {
                return Err(ClueError::Model(format!("variable '{}' has two CPDs", var.name)));
            }
            for (scope_var, card) in cpd.factor().vars().iter().zip(cpd.factor().cards()) {
                let scope = variables.get(*scope_var).ok_or_else(|| {
                    ClueError::Model(format!("CPD of '{}' mentions unknown variable {}", var.name, scope_var))
                })?;
                if scope.cardinality() != *card {
                    return Err(ClueError::Model(format!(
                        "CPD of '{}' gives '{}' cardinality {} instead of {}",
                        var.name,
                        scope.name,
                        card,
                        scope.cardinality()
                    )));
                }
            }
            for parent in cpd.parents() {
                if *parent >= child || variables[*parent].is_decision() {
                    return Err(ClueError::Model(format!(
                        "CPD of '{}' has parent '{}' which is not an earlier chance variable",
                        var.name, variables[*parent].name
                    )));
                }
            }
            slots[child] = Some(cpd);
        }
        for var in &variables {
            if !var.is_decision() && slots[var.id].is_none() {
                return Err(ClueError::Model(format!("chance variable '{}' has no CPD", var.name)));
            }
        }

        for (scope_var, card) in utility.vars().iter().zip(utility.cards()) {
            match variables.get(*scope_var) {
                Some(v) if v.cardinality() == *card => {}
                _ => {
                    return Err(ClueError::Model(format!(
                        "utility mentions unknown or mis-sized variable {}",
                        scope_var
                    )))
                }
            }
        }

        let decision_order = order_decisions(&variables)?;
        debug!(
            variables = variables.len(),
            decisions = decision_order.len(),
            "decision network validated"
        );
        Ok(Self {
            variables,
            cpds: slots,
            utility,
            decision_order,
        })
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, id: VarId) -> Option<&Variable> {
        self.variables.get(id)
    }

    pub fn id_of(&self, name: &str) -> Option<VarId> {
        self.variables.iter().position(|v| v.name == name)
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn chance_ids(&self) -> Vec<VarId> {
        self.variables
            .iter()
            .filter(|v| matches!(v.kind, VariableKind::Chance))
            .map(|v| v.id)
            .collect()
    }

    /// Decisions ordered so that every decision comes after the decisions
    /// it observes.
    pub fn decision_order(&self) -> &[VarId] {
        &self.decision_order
    }

    pub fn cpd(&self, id: VarId) -> Option<&Cpd> {
        self.cpds.get(id).and_then(Option::as_ref)
    }

    pub fn cpds(&self) -> impl Iterator<Item = &Cpd> {
        self.cpds.iter().flatten()
    }

    pub fn utility(&self) -> &Factor {
        &self.utility
    }

    pub fn empty_evidence(&self) -> Evidence {
        Evidence::new(self.variables.len())
    }
}

fn order_decisions(variables: &[Variable]) -> ClueResult<Vec<VarId>> {
    let decisions: Vec<&Variable> = variables.iter().filter(|v| v.is_decision()).collect();
    let mut order: Vec<VarId> = Vec::with_capacity(decisions.len());
    while order.len() < decisions.len() {
        let next = decisions.iter().find(|d| {
            !order.contains(&d.id)
                && d
                    .parents()
                    .iter()
                    .all(|p| !variables[*p].is_decision() || order.contains(p))
        });
        match next {
            Some(d) => order.push(d.id),
            None => return Err(ClueError::Model("decisions observe each other in a cycle".to_string())),
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["False".to_string(), "True".to_string()]
    }

    fn tiny() -> (Vec<Variable>, Vec<Cpd>, Factor) {
        let variables = vec![
            Variable::chance(0, "C0", labels()),
            Variable::decision(1, "A0", labels(), vec![0]),
        ];
        let cpds = vec![Cpd::new(0, vec![], vec![2], vec![0.4, 0.6]).unwrap()];
        let utility = Factor::new(vec![0, 1], vec![2, 2], vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        (variables, cpds, utility)
    }

    #[test]
    fn test_valid_network() {
        let (variables, cpds, utility) = tiny();
        let network = DecisionNetwork::new(variables, cpds, utility).unwrap();
        assert_eq!(network.chance_ids(), vec![0]);
        assert_eq!(network.decision_order(), &[1]);
        assert_eq!(network.id_of("A0"), Some(1));
    }

    #[test]
    fn test_missing_cpd_rejected() {
        let (variables, _, utility) = tiny();
        assert!(DecisionNetwork::new(variables, vec![], utility).is_err());
    }

    #[test]
    fn test_decision_cpd_rejected() {
        let (variables, mut cpds, utility) = tiny();
        cpds.push(Cpd::new(1, vec![], vec![2], vec![0.5, 0.5]).unwrap());
        assert!(DecisionNetwork::new(variables, cpds, utility).is_err());
    }

    #[test]
    fn test_later_decision_ordered_after_its_parent() {
        let variables = vec![
            Variable::chance(0, "C0", labels()),
            Variable::decision(1, "A1", labels(), vec![0, 2]),
            Variable::decision(2, "A0", labels(), vec![0]),
        ];
        let cpds = vec![Cpd::new(0, vec![], vec![2], vec![0.5, 0.5]).unwrap()];
        let network = DecisionNetwork::new(variables, cpds, Factor::scalar(0.0)).unwrap();
        assert_eq!(network.decision_order(), &[2, 1]);
    }
}
