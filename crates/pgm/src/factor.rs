//! Table factors over discrete variables.
//!
//! A factor stores one value per joint assignment of its scope. Assignments
//! are laid out in mixed radix with the last scope variable varying fastest,
//! the same convention [`clue_core::Space`] uses.

use crate::variable::VarId;
use clue_core::{ClueError, ClueResult};

/// Partial assignment of network variables, indexed by [`VarId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evidence {
    values: Vec<Option<usize>>,
}

impl Evidence {
    pub fn new(num_vars: usize) -> Self {
        Self {
            values: vec![None; num_vars],
        }
    }

    pub fn get(&self, var: VarId) -> Option<usize> {
        self.values.get(var).copied().flatten()
    }

    pub fn set(&mut self, var: VarId, value: usize) {
        if var >= self.values.len() {
            self.values.resize(var + 1, None);
        }
        self.values[var] = Some(value);
    }

    pub fn clear(&mut self, var: VarId) {
        if let Some(slot) = self.values.get_mut(var) {
            *slot = None;
        }
    }

    pub fn with(mut self, var: VarId, value: usize) -> Self {
        self.set(var, value);
        self
    }

    pub fn is_observed(&self, var: VarId) -> bool {
        self.get(var).is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Factor {
    vars: Vec<VarId>,
    cards: Vec<usize>,
    strides: Vec<usize>,
    values: Vec<f64>,
}

fn strides_for(cards: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; cards.len()];
    for i in (0..cards.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * cards[i + 1];
    }
    strides
}

/// Decode a flat index into one value per variable.
fn decode(mut index: usize, cards: &[usize], out: &mut [usize]) {
    for (slot, card) in out.iter_mut().zip(cards).rev() {
        *slot = index % card;
        index /= card;
    }
}

impl Factor {
    pub fn new(vars: Vec<VarId>, cards: Vec<usize>, values: Vec<f64>) -> ClueResult<Self> {
        if vars.len() != cards.len() {
            return Err(ClueError::Model(format!(
                "factor has {} variables but {} cardinalities",
                vars.len(),
                cards.len()
            )));
        }
        for (i, v) in vars.iter().enumerate() {
            if vars[..i].contains(v) {
                return Err(ClueError::Model(format!("variable {} repeated in factor scope", v)));
            }
        }
        if cards.iter().any(|c| *c == 0) {
            return Err(ClueError::Model("factor variable with empty domain".to_string()));
        }
        let size: usize = cards.iter().product();
        if values.len() != size {
            return Err(ClueError::Model(format!(
                "factor expects {} values, got {}",
                size,
                values.len()
            )));
        }
        let strides = strides_for(&cards);
        Ok(Self {
            vars,
            cards,
            strides,
            values,
        })
    }

    pub fn scalar(value: f64) -> Self {
        Self {
            vars: Vec::new(),
            cards: Vec::new(),
            strides: Vec::new(),
            values: vec![value],
        }
    }

    pub fn vars(&self) -> &[VarId] {
        &self.vars
    }

    pub fn cards(&self) -> &[usize] {
        &self.cards
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn contains(&self, var: VarId) -> bool {
        self.vars.contains(&var)
    }

    pub fn cardinality_of(&self, var: VarId) -> Option<usize> {
        self.vars.iter().position(|v| *v == var).map(|i| self.cards[i])
    }

    /// Value of a scalar factor, or the sum of all entries otherwise.
    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Entry for a full assignment of the scope.
    pub fn value(&self, evidence: &Evidence) -> ClueResult<f64> {
        let mut index = 0;
        for ((var, card), stride) in self.vars.iter().zip(&self.cards).zip(&self.strides) {
            let v = evidence
                .get(*var)
                .ok_or_else(|| ClueError::Model(format!("variable {} is not assigned", var)))?;
            if v >= *card {
                return Err(ClueError::Model(format!(
                    "value {} out of range for variable {} (cardinality {})",
                    v, var, card
                )));
            }
            index += v * stride;
        }
        Ok(self.values[index])
    }

    /// Restrict the factor to the observed values of `evidence`. Observed
    /// variables leave the scope.
    pub fn observe(&self, evidence: &Evidence) -> Factor {
        let kept: Vec<usize> = (0..self.vars.len())
            .filter(|i| !evidence.is_observed(self.vars[*i]))
            .collect();
        if kept.len() == self.vars.len() {
            return self.clone();
        }

        let mut offset = 0;
        for (i, var) in self.vars.iter().enumerate() {
            if let Some(v) = evidence.get(*var) {
                offset += v.min(self.cards[i] - 1) * self.strides[i];
            }
        }

        let vars: Vec<VarId> = kept.iter().map(|i| self.vars[*i]).collect();
        let cards: Vec<usize> = kept.iter().map(|i| self.cards[*i]).collect();
        let size: usize = cards.iter().product();
        let mut assignment = vec![0; vars.len()];
        let mut values = Vec::with_capacity(size);
        for index in 0..size {
            decode(index, &cards, &mut assignment);
            let source = kept
                .iter()
                .zip(&assignment)
                .fold(offset, |acc, (i, v)| acc + v * self.strides[*i]);
            values.push(self.values[source]);
        }
        let strides = strides_for(&cards);
        Factor {
            vars,
            cards,
            strides,
            values,
        }
    }

    /// Pointwise product. The result's scope is `self`'s scope followed by
    /// the variables only `other` mentions.
    pub fn product(&self, other: &Factor) -> ClueResult<Factor> {
        let mut vars = self.vars.clone();
        let mut cards = self.cards.clone();
        for (var, card) in other.vars.iter().zip(&other.cards) {
            match self.cardinality_of(*var) {
                Some(existing) if existing != *card => {
                    return Err(ClueError::Model(format!(
                        "variable {} has cardinality {} and {} in two factors",
                        var, existing, card
                    )));
                }
                Some(_) => {}
                None => {
                    vars.push(*var);
                    cards.push(*card);
                }
            }
        }

        let self_pos: Vec<usize> = (0..self.vars.len()).collect();
        let other_pos: Vec<usize> = other
            .vars
            .iter()
            .filter_map(|v| vars.iter().position(|x| x == v))
            .collect();

        let size: usize = cards.iter().product();
        let mut assignment = vec![0; vars.len()];
        let mut values = Vec::with_capacity(size);
        for index in 0..size {
            decode(index, &cards, &mut assignment);
            let a = self_pos
                .iter()
                .zip(&self.strides)
                .fold(0, |acc, (p, s)| acc + assignment[*p] * s);
            let b = other_pos
                .iter()
                .zip(&other.strides)
                .fold(0, |acc, (p, s)| acc + assignment[*p] * s);
            values.push(self.values[a] * other.values[b]);
        }
        let strides = strides_for(&cards);
        Ok(Factor {
            vars,
            cards,
            strides,
            values,
        })
    }

    /// Marginalise `var` out by summation.
    pub fn sum_out(&self, var: VarId) -> Factor {
        self.reduce(var, |acc, _, v| (acc.0 + v, 0), 0.0).0
    }

    /// Maximise `var` out, also returning the arg-max choice for every
    /// assignment of the remaining scope. Ties keep the lowest value index.
    pub fn max_out(&self, var: VarId) -> (Factor, DecisionFunction) {
        let (factor, choices) = self.reduce(
            var,
            |acc, value_index, v| {
                if v > acc.0 {
                    (v, value_index)
                } else {
                    acc
                }
            },
            f64::NEG_INFINITY,
        );
        let function = DecisionFunction {
            decision: var,
            scope: factor.vars.clone(),
            cards: factor.cards.clone(),
            choices,
        };
        (factor, function)
    }

    fn reduce<F>(&self, var: VarId, step: F, init: f64) -> (Factor, Vec<usize>)
    where
        F: Fn((f64, usize), usize, f64) -> (f64, usize),
    {
        let Some(pos) = self.vars.iter().position(|v| *v == var) else {
            let choices = vec![0; self.values.len()];
            return (self.clone(), choices);
        };

        let mut vars = self.vars.clone();
        let mut cards = self.cards.clone();
        vars.remove(pos);
        cards.remove(pos);
        let kept_strides: Vec<usize> = self
            .strides
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != pos)
            .map(|(_, s)| *s)
            .collect();

        let size: usize = cards.iter().product();
        let mut assignment = vec![0; vars.len()];
        let mut values = Vec::with_capacity(size);
        let mut choices = Vec::with_capacity(size);
        for index in 0..size {
            decode(index, &cards, &mut assignment);
            let base = assignment
                .iter()
                .zip(&kept_strides)
                .fold(0, |acc, (v, s)| acc + v * s);
            let mut acc = (init, 0);
            for value_index in 0..self.cards[pos] {
                acc = step(acc, value_index, self.values[base + value_index * self.strides[pos]]);
            }
            values.push(acc.0);
            choices.push(acc.1);
        }
        let strides = strides_for(&cards);
        (
            Factor {
                vars,
                cards,
                strides,
                values,
            },
            choices,
        )
    }

    /// Divide every entry by the total mass. Fails on a zero total.
    pub fn normalize(&mut self) -> ClueResult<()> {
        let total = self.total();
        if total <= 0.0 || !total.is_finite() {
            return Err(ClueError::Model(format!("cannot normalise factor with mass {}", total)));
        }
        for v in &mut self.values {
            *v /= total;
        }
        Ok(())
    }
}

/// Optimal choice of one decision for each assignment of the variables it
/// depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionFunction {
    decision: VarId,
    scope: Vec<VarId>,
    cards: Vec<usize>,
    choices: Vec<usize>,
}

impl DecisionFunction {
    /// A decision that no factor depends on; any value is optimal.
    pub fn constant(decision: VarId, choice: usize) -> Self {
        Self {
            decision,
            scope: Vec::new(),
            cards: Vec::new(),
            choices: vec![choice],
        }
    }

    pub fn decision(&self) -> VarId {
        self.decision
    }

    pub fn scope(&self) -> &[VarId] {
        &self.scope
    }

    pub fn choose(&self, evidence: &Evidence) -> ClueResult<usize> {
        let mut index = 0;
        for (var, card) in self.scope.iter().zip(&self.cards) {
            let v = evidence.get(*var).ok_or_else(|| {
                ClueError::Model(format!(
                    "decision {} depends on unassigned variable {}",
                    self.decision, var
                ))
            })?;
            index = index * card + v.min(card - 1);
        }
        Ok(self.choices[index])
    }
}

/// Conditional probability table P(child | parents). The factor scope is
/// the parents followed by the child, so each parent row is contiguous.
#[derive(Debug, Clone, PartialEq)]
pub struct Cpd {
    child: VarId,
    parents: Vec<VarId>,
    factor: Factor,
}

const ROW_TOLERANCE: f64 = 1e-6;

impl Cpd {
    pub fn new(child: VarId, parents: Vec<VarId>, cards: Vec<usize>, values: Vec<f64>) -> ClueResult<Self> {
        let mut vars = parents.clone();
        vars.push(child);
        let factor = Factor::new(vars, cards, values)?;
        let child_card = factor.cards[factor.cards.len() - 1];
        for (row_index, row) in factor.values.chunks(child_card).enumerate() {
            if row.iter().any(|p| *p < 0.0) {
                return Err(ClueError::Model(format!(
                    "negative probability in CPD of variable {} (row {})",
                    child, row_index
                )));
            }
            let total: f64 = row.iter().sum();
            if (total - 1.0).abs() > ROW_TOLERANCE {
                return Err(ClueError::Model(format!(
                    "CPD row {} of variable {} sums to {}",
                    row_index, child, total
                )));
            }
        }
        Ok(Self {
            child,
            parents,
            factor,
        })
    }

    pub fn child(&self) -> VarId {
        self.child
    }

    pub fn parents(&self) -> &[VarId] {
        &self.parents
    }

    pub fn factor(&self) -> &Factor {
        &self.factor
    }

    pub fn child_cardinality(&self) -> usize {
        self.factor.cards[self.factor.cards.len() - 1]
    }

    /// Distribution of the child given fully observed parents.
    pub fn distribution(&self, evidence: &Evidence) -> ClueResult<&[f64]> {
        let card = self.child_cardinality();
        let mut row = 0;
        for (i, parent) in self.parents.iter().enumerate() {
            let v = evidence.get(*parent).ok_or_else(|| {
                ClueError::Model(format!("parent {} of variable {} is not assigned", parent, self.child))
            })?;
            row += v * self.factor.strides[i];
        }
        Ok(&self.factor.values[row..row + card])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(vars: &[VarId], cards: &[usize], values: &[f64]) -> Factor {
        Factor::new(vars.to_vec(), cards.to_vec(), values.to_vec()).unwrap()
    }

    #[test]
    fn test_value_lookup_last_variable_fastest() {
        let factor = f(&[0, 1], &[2, 3], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        let evidence = Evidence::new(2).with(0, 1).with(1, 2);
        assert_eq!(factor.value(&evidence).unwrap(), 5.0);
        assert!(factor.value(&Evidence::new(2).with(0, 1)).is_err());
    }

    #[test]
    fn test_product_aligns_shared_variables() {
        let a = f(&[0], &[2], &[0.3, 0.7]);
        let b = f(&[1, 0], &[2, 2], &[1.0, 2.0, 3.0, 4.0]);
        let p = a.product(&b).unwrap();
        assert_eq!(p.vars(), &[0, 1]);
        // (x0, x1): a(x0) * b(x1, x0)
        assert_eq!(p.values(), &[0.3 * 1.0, 0.3 * 3.0, 0.7 * 2.0, 0.7 * 4.0]);
    }

    #[test]
    fn test_product_rejects_cardinality_mismatch() {
        let a = f(&[0], &[2], &[1.0, 1.0]);
        let b = f(&[0], &[3], &[1.0, 1.0, 1.0]);
        assert!(a.product(&b).is_err());
    }

    #[test]
    fn test_sum_out_marginalises() {
        let factor = f(&[0, 1], &[2, 2], &[0.1, 0.2, 0.3, 0.4]);
        let summed = factor.sum_out(0);
        assert_eq!(summed.vars(), &[1]);
        assert!((summed.values()[0] - 0.4).abs() < 1e-12);
        assert!((summed.values()[1] - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_max_out_records_first_argmax() {
        let factor = f(&[0, 1], &[2, 2], &[1.0, 1.0, 0.5, 2.0]);
        let (maxed, decision) = factor.max_out(1);
        assert_eq!(maxed.values(), &[1.0, 2.0]);
        assert_eq!(decision.choose(&Evidence::new(2).with(0, 0)).unwrap(), 0);
        assert_eq!(decision.choose(&Evidence::new(2).with(0, 1)).unwrap(), 1);
    }

    #[test]
    fn test_observe_restricts_scope() {
        let factor = f(&[0, 1, 2], &[2, 2, 2], &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let restricted = factor.observe(&Evidence::new(3).with(1, 1));
        assert_eq!(restricted.vars(), &[0, 2]);
        assert_eq!(restricted.values(), &[2.0, 3.0, 6.0, 7.0]);
    }

    #[test]
    fn test_cpd_rows_must_sum_to_one() {
        assert!(Cpd::new(1, vec![0], vec![2, 2], vec![0.5, 0.5, 0.2, 0.8]).is_ok());
        assert!(Cpd::new(1, vec![0], vec![2, 2], vec![0.5, 0.4, 0.2, 0.8]).is_err());
    }

    #[test]
    fn test_cpd_distribution_given_parents() {
        let cpd = Cpd::new(1, vec![0], vec![2, 2], vec![0.9, 0.1, 0.2, 0.8]).unwrap();
        let row = cpd.distribution(&Evidence::new(2).with(0, 1)).unwrap();
        assert_eq!(row, &[0.2, 0.8]);
    }
}
