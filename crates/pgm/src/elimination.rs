//! Variable elimination over a [`DecisionNetwork`].
//!
//! Optimisation follows the information stages of the diagram: chance
//! variables no decision observes are summed out first, then the last
//! decision is maximised, then the chance variables first observed by that
//! decision are summed, and so on back to the first decision.

use crate::factor::{DecisionFunction, Evidence, Factor};
use crate::network::DecisionNetwork;
use crate::variable::VarId;
use clue_core::{ClueError, ClueResult};
use tracing::trace;

/// Maximum expected utility together with one decision function per
/// decision, in decision order.
#[derive(Debug, Clone)]
pub struct Solution {
    pub value: f64,
    pub policy: Vec<DecisionFunction>,
}

pub struct VariableEliminator<'a> {
    network: &'a DecisionNetwork,
}

impl<'a> VariableEliminator<'a> {
    pub fn new(network: &'a DecisionNetwork) -> Self {
        Self { network }
    }

    fn probability_factors(&self, evidence: &Evidence) -> Vec<Factor> {
        self.network.cpds().map(|cpd| cpd.factor().observe(evidence)).collect()
    }

    /// Posterior distribution of `var` given `evidence`.
    pub fn query(&self, var: VarId, evidence: &Evidence) -> ClueResult<Vec<f64>> {
        let variable = self
            .network
            .variable(var)
            .ok_or_else(|| ClueError::Model(format!("unknown variable {}", var)))?;
        if variable.is_decision() {
            return Err(ClueError::Model(format!(
                "cannot query decision '{}'",
                variable.name
            )));
        }
        if let Some(v) = evidence.get(var) {
            let mut one_hot = vec![0.0; variable.cardinality()];
            one_hot[v] = 1.0;
            return Ok(one_hot);
        }

        let mut factors = self.probability_factors(evidence);
        for other in self.network.chance_ids().into_iter().rev() {
            if other != var && !evidence.is_observed(other) {
                sum_out(&mut factors, other)?;
            }
        }
        let mut joint = multiply_all(factors)?;
        joint.normalize()?;
        Ok(joint.values().to_vec())
    }

    /// Probability of the observed chance variables.
    pub fn evidence_probability(&self, evidence: &Evidence) -> ClueResult<f64> {
        let mut factors = self.probability_factors(evidence);
        for var in self.network.chance_ids().into_iter().rev() {
            if !evidence.is_observed(var) {
                sum_out(&mut factors, var)?;
            }
        }
        Ok(multiply_all(factors)?.total())
    }

    /// E[U | evidence]. Every decision the utility depends on must be
    /// assigned; unobserved chance variables are marginalised exactly.
    pub fn expected_utility(&self, evidence: &Evidence) -> ClueResult<f64> {
        let utility = self.network.utility();
        for var in utility.vars() {
            let decision = self.network.variable(*var).filter(|v| v.is_decision());
            if let Some(decision) = decision {
                if !evidence.is_observed(*var) {
                    return Err(ClueError::Model(format!(
                        "expected utility needs a value for decision '{}'",
                        decision.name
                    )));
                }
            }
        }
        if utility.vars().iter().all(|v| evidence.is_observed(*v)) {
            return utility.value(evidence);
        }

        let mut factors = self.probability_factors(evidence);
        factors.push(utility.observe(evidence));
        for var in self.network.chance_ids().into_iter().rev() {
            if !evidence.is_observed(var) {
                sum_out(&mut factors, var)?;
            }
        }
        let weighted = multiply_all(factors)?.total();
        let normaliser = self.evidence_probability(evidence)?;
        if normaliser <= 0.0 {
            return Err(ClueError::Model("evidence has zero probability".to_string()));
        }
        Ok(weighted / normaliser)
    }

    /// Maximum expected utility and the optimal decision functions.
    pub fn optimize(&self) -> ClueResult<Solution> {
        let network = self.network;
        let decisions = network.decision_order();
        let stages = decisions.len();

        // Stage k holds the chance variables first observed by decision k;
        // stage `stages` holds those never observed.
        let mut by_stage: Vec<Vec<VarId>> = vec![Vec::new(); stages + 1];
        for var in network.chance_ids() {
            let stage = decisions
                .iter()
                .position(|d| {
                    network
                        .variable(*d)
                        .map(|v| v.parents().contains(&var))
                        .unwrap_or(false)
                })
                .unwrap_or(stages);
            by_stage[stage].push(var);
        }

        let mut factors: Vec<Factor> = network.cpds().map(|c| c.factor().clone()).collect();
        factors.push(network.utility().clone());

        let mut policy: Vec<DecisionFunction> = Vec::with_capacity(stages);
        for stage in (0..=stages).rev() {
            for var in by_stage[stage].iter().rev() {
                sum_out(&mut factors, *var)?;
            }
            if stage == 0 {
                break;
            }
            let decision = decisions[stage - 1];
            policy.push(max_out(network, &mut factors, decision)?);
        }
        policy.reverse();

        let value = multiply_all(factors)?.total();
        trace!(value, "influence diagram solved");
        Ok(Solution { value, policy })
    }
}

fn multiply_all(factors: Vec<Factor>) -> ClueResult<Factor> {
    factors
        .into_iter()
        .try_fold(Factor::scalar(1.0), |acc, f| acc.product(&f))
}

fn take_containing(factors: &mut Vec<Factor>, var: VarId) -> Vec<Factor> {
    let (with, without): (Vec<Factor>, Vec<Factor>) =
        std::mem::take(factors).into_iter().partition(|f| f.contains(var));
    *factors = without;
    with
}

fn sum_out(factors: &mut Vec<Factor>, var: VarId) -> ClueResult<()> {
    let related = take_containing(factors, var);
    if related.is_empty() {
        return Ok(());
    }
    let product = multiply_all(related)?;
    factors.push(product.sum_out(var));
    Ok(())
}

fn max_out(network: &DecisionNetwork, factors: &mut Vec<Factor>, decision: VarId) -> ClueResult<DecisionFunction> {
    let related = take_containing(factors, decision);
    if related.is_empty() {
        return Ok(DecisionFunction::constant(decision, 0));
    }
    let variable = network
        .variable(decision)
        .ok_or_else(|| ClueError::Model(format!("unknown decision {}", decision)))?;
    let allowed = variable.information_set();
    let product = multiply_all(related)?;
    if let Some(outside) = product.vars().iter().find(|v| !allowed.contains(v)) {
        let outside_name = network
            .variable(*outside)
            .map(|v| v.name.clone())
            .unwrap_or_else(|| outside.to_string());
        return Err(ClueError::Model(format!(
            "decision '{}' would depend on '{}' which it does not observe",
            variable.name, outside_name
        )));
    }
    let (reduced, function) = product.max_out(decision);
    factors.push(reduced);
    Ok(function)
}
