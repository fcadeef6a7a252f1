use crate::degrading::DegradingExpert;
use crate::expert::Expert;
use crate::nonuniform::NonuniformExpert;
use crate::partial::PartiallyReliableExpert;
use crate::unreliable::UnreliableExpert;
use clue_core::config::PanelSpec;
use clue_core::{Action, ClueError, ClueResult, SimRng, State, StateTable};
use clue_env::Oracle;
use rand::seq::index::sample;
use std::sync::Arc;
use tracing::debug;

/// A named group of experts consulted together after every trial.
pub struct Panel {
    name: String,
    experts: Vec<Box<dyn Expert>>,
}

impl Panel {
    pub fn new(name: impl Into<String>, experts: Vec<Box<dyn Expert>>) -> ClueResult<Self> {
        let name = name.into();
        for (i, expert) in experts.iter().enumerate() {
            if experts[..i].iter().any(|e| e.name() == expert.name()) {
                return Err(ClueError::InvalidParameter(format!(
                    "panel '{}' has two experts named '{}'",
                    name,
                    expert.name()
                )));
            }
        }
        Ok(Self { name, experts })
    }

    /// One [`UnreliableExpert`] per reliability, named after it.
    pub fn from_rhos(name: impl Into<String>, rhos: &[f64], oracle: &Arc<Oracle>, mu: u64, gamma: f64) -> ClueResult<Self> {
        let experts = rhos
            .iter()
            .map(|rho| {
                UnreliableExpert::new(Arc::clone(oracle), *rho, mu, gamma).map(|e| Box::new(e) as Box<dyn Expert>)
            })
            .collect::<ClueResult<Vec<_>>>()?;
        Self::new(name, experts)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.experts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experts.is_empty()
    }

    pub fn expert_names(&self) -> Vec<String> {
        self.experts.iter().map(|e| e.name().to_string()).collect()
    }

    /// Every expert deliberates on the trial; the result is aligned with
    /// [`Panel::expert_names`].
    pub fn advise(&mut self, state: &State, action: &Action, reward: f64, rng: &mut SimRng) -> Vec<Option<Action>> {
        self.experts
            .iter_mut()
            .map(|expert| expert.deliberate(state, action, reward, rng))
            .collect()
    }

    pub fn reset(&mut self) {
        for expert in &mut self.experts {
            expert.reset();
        }
    }
}

impl std::fmt::Debug for Panel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Panel")
            .field("name", &self.name)
            .field("experts", &self.expert_names())
            .finish()
    }
}

pub fn make_panels(specs: &[PanelSpec], oracle: &Arc<Oracle>, mu: u64, gamma: f64) -> ClueResult<Vec<Panel>> {
    specs
        .iter()
        .map(|spec| Panel::from_rhos(spec.name.clone(), &spec.rhos, oracle, mu, gamma))
        .collect()
}

pub fn make_degrading_panels(
    specs: &[PanelSpec],
    oracle: &Arc<Oracle>,
    degrade_factor: f64,
    mu: u64,
    gamma: f64,
) -> ClueResult<Vec<Panel>> {
    specs
        .iter()
        .map(|spec| {
            let experts = spec
                .rhos
                .iter()
                .map(|rho| {
                    DegradingExpert::new(Arc::clone(oracle), *rho, degrade_factor, mu, gamma)
                        .map(|e| Box::new(e) as Box<dyn Expert>)
                })
                .collect::<ClueResult<Vec<_>>>()?;
            Panel::new(spec.name.clone(), experts)
        })
        .collect()
}

/// Each panel entry is one expert given as a list of per-region
/// reliabilities. Experts are named by their position in the panel.
pub fn make_nonuniform_panels(
    specs: &[(String, Vec<Vec<f64>>)],
    oracle: &Arc<Oracle>,
    regions: &Arc<StateTable<usize>>,
    mu: u64,
    gamma: f64,
) -> ClueResult<Vec<Panel>> {
    specs
        .iter()
        .map(|(name, experts)| {
            let experts = experts
                .iter()
                .enumerate()
                .map(|(i, rhos)| {
                    NonuniformExpert::new(i.to_string(), Arc::clone(oracle), rhos.clone(), Arc::clone(regions), mu, gamma)
                        .map(|e| Box::new(e) as Box<dyn Expert>)
                })
                .collect::<ClueResult<Vec<_>>>()?;
            Panel::new(name.clone(), experts)
        })
        .collect()
}

/// Each panel entry is the number of chance variables one expert cannot
/// see; the hidden variables are drawn without replacement.
pub fn make_partial_panels(
    specs: &[(String, Vec<usize>)],
    oracle: &Arc<Oracle>,
    mu: u64,
    gamma: f64,
    rng: &mut SimRng,
) -> ClueResult<Vec<Panel>> {
    let chance = oracle.env().chance_ids().to_vec();
    let mut panels = Vec::with_capacity(specs.len());
    for (name, hidden_counts) in specs {
        let mut experts: Vec<Box<dyn Expert>> = Vec::with_capacity(hidden_counts.len());
        for count in hidden_counts {
            if *count > chance.len() {
                return Err(ClueError::InvalidParameter(format!(
                    "cannot hide {} of {} chance variables",
                    count,
                    chance.len()
                )));
            }
            let hidden: Vec<usize> = sample(rng, chance.len(), *count)
                .into_iter()
                .map(|i| chance[i])
                .collect();
            let expert = PartiallyReliableExpert::new(count.to_string(), oracle, &hidden, mu, gamma)?;
            debug!(panel = %name, hidden = ?expert.hidden(), "partially observing expert created");
            experts.push(Box::new(expert));
        }
        panels.push(Panel::new(name.clone(), experts)?);
    }
    Ok(panels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clue_core::config::default_panels;
    use clue_core::seeded_rng;
    use clue_env::RandomSsdp;

    fn oracle() -> Arc<Oracle> {
        let env = RandomSsdp::new(4, 2, (-1.0, 1.0)).build(3).unwrap();
        Arc::new(Oracle::new(Arc::new(env)).unwrap())
    }

    #[test]
    fn test_default_panels_and_names() {
        let panels = make_panels(&default_panels(), &oracle(), 10, 0.01).unwrap();
        assert_eq!(panels.len(), 3);
        assert_eq!(panels[0].expert_names(), vec!["0"]);
        assert_eq!(
            panels[2].expert_names(),
            vec!["0", "0.1", "0.25", "0.5", "0.75", "0.9", "1"]
        );
    }

    #[test]
    fn test_advice_aligned_with_experts() {
        let oracle = oracle();
        let mut panel = Panel::from_rhos("Pair", &[0.0, 1.0], &oracle, 1, -1.0).unwrap();
        let mut rng = seeded_rng(0);
        let state = oracle.env().state_at(3);
        let action = oracle.act(&state);
        let advice = panel.advise(&state, &action, 0.0, &mut rng);
        assert_eq!(advice.len(), 2);
        assert_ne!(advice[0].as_ref(), Some(&action));
        assert_eq!(advice[1].as_ref(), Some(&action));
    }

    #[test]
    fn test_duplicate_expert_names_rejected() {
        assert!(Panel::from_rhos("Twins", &[0.5, 0.5], &oracle(), 10, 0.01).is_err());
    }

    #[test]
    fn test_partial_panels_hide_requested_count() {
        let oracle = oracle();
        let mut rng = seeded_rng(4);
        let specs = vec![("Varied".to_string(), vec![0, 1, 3])];
        let panels = make_partial_panels(&specs, &oracle, 10, 0.01, &mut rng).unwrap();
        assert_eq!(panels[0].expert_names(), vec!["0", "1", "3"]);
        let too_many = vec![("Blind".to_string(), vec![5])];
        assert!(make_partial_panels(&too_many, &oracle, 10, 0.01, &mut rng).is_err());
    }

    #[test]
    fn test_nonuniform_panel_names_experts_by_position() {
        let oracle = oracle();
        let regions = Arc::new(StateTable::new(oracle.env().state_space().clone(), 0usize));
        let specs = vec![("Single_Extreme".to_string(), vec![vec![1.0, 0.0], vec![0.5, 0.5]])];
        let panels = make_nonuniform_panels(&specs, &oracle, &regions, 10, 0.01).unwrap();
        assert_eq!(panels[0].expert_names(), vec!["0", "1"]);
    }
}
