use crate::agent::{Agent, Learner};
use crate::{
    AdaptiveGreedyAgent, ClueAgent, ClueDecayedAgent, DecayedRelianceAgent, EpsilonGreedyAgent, EteAgent,
    LinUcbAgent, NaiveAdviceFollower, PrqAgent, ThompsonAgent, TruePolicyAgent, UcbAgent,
};
use clue_core::config::AgentConfig;
use clue_core::{ClueError, ClueResult};
use clue_env::Oracle;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Every agent name accepted by [`make_agent`].
pub const AGENT_NAMES: [&str; 13] = [
    "True Policy Agent",
    "Baseline Agent",
    "NAF",
    "CLUE",
    "Naive CLUE",
    "Decayed Reliance",
    "CLUE Decayed",
    "PRQ",
    "ETE Baseline Agent",
    "UCB Baseline Agent",
    "Adaptive Greedy",
    "Thompson Sampling",
    "LinUCB",
];

/// The unassisted learner that advice-taking agents are wrapped around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LearnerKind {
    #[default]
    EpsilonGreedy,
    Ete,
    AdaptiveGreedy,
    Ucb,
    Thompson,
    LinUcb,
}

impl LearnerKind {
    pub const ALL: [LearnerKind; 6] = [
        LearnerKind::EpsilonGreedy,
        LearnerKind::Ete,
        LearnerKind::AdaptiveGreedy,
        LearnerKind::Ucb,
        LearnerKind::Thompson,
        LearnerKind::LinUcb,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            LearnerKind::EpsilonGreedy => "Epsilon Greedy",
            LearnerKind::Ete => "ETE",
            LearnerKind::AdaptiveGreedy => "Adaptive Greedy",
            LearnerKind::Ucb => "UCB",
            LearnerKind::Thompson => "Thompson Sampling",
            LearnerKind::LinUcb => "LinUCB",
        }
    }
}

impl fmt::Display for LearnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LearnerKind {
    type Err = ClueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let labels: Vec<&str> = Self::ALL.iter().map(|k| k.label()).collect();
                ClueError::unknown("Learner", s, &labels)
            })
    }
}

pub fn make_learner(
    kind: LearnerKind,
    oracle: &Arc<Oracle>,
    trials: usize,
    config: &AgentConfig,
) -> ClueResult<Box<dyn Learner>> {
    let env = oracle.env().clone();
    let learner: Box<dyn Learner> = match kind {
        LearnerKind::EpsilonGreedy => Box::new(EpsilonGreedyAgent::new(env, trials, config)?),
        LearnerKind::Ete => Box::new(EteAgent::new(env, trials, config)?),
        LearnerKind::AdaptiveGreedy => Box::new(AdaptiveGreedyAgent::new(env, trials, config)?),
        LearnerKind::Ucb => Box::new(UcbAgent::new(env, config)?),
        LearnerKind::Thompson => Box::new(ThompsonAgent::new(env, config)),
        LearnerKind::LinUcb => Box::new(LinUcbAgent::new(env, config)),
    };
    Ok(learner)
}

/// Build the agent called `name`. Advice-taking agents wrap a fresh learner
/// of kind `base`, as does `"Baseline Agent"` itself.
pub fn make_agent(
    name: &str,
    base: LearnerKind,
    oracle: &Arc<Oracle>,
    trials: usize,
    config: &AgentConfig,
) -> ClueResult<Box<dyn Agent>> {
    let env = oracle.env().clone();
    let learner = || make_learner(base, oracle, trials, config);
    let agent: Box<dyn Agent> = match name {
        "True Policy Agent" => Box::new(TruePolicyAgent::new(oracle.clone())),
        "Baseline Agent" => learner()?.into_agent(),
        "NAF" => Box::new(NaiveAdviceFollower::new(env, learner()?)),
        "CLUE" => Box::new(ClueAgent::new(env, learner()?, trials, false, config)?),
        "Naive CLUE" => Box::new(ClueAgent::new(env, learner()?, trials, true, config)?),
        "Decayed Reliance" => Box::new(DecayedRelianceAgent::new(env, learner()?, trials, config)?),
        "CLUE Decayed" => Box::new(ClueDecayedAgent::new(env, learner()?, trials, config)?),
        "PRQ" => Box::new(PrqAgent::new(env, learner()?, config)),
        "ETE Baseline Agent" => make_learner(LearnerKind::Ete, oracle, trials, config)?.into_agent(),
        "UCB Baseline Agent" => make_learner(LearnerKind::Ucb, oracle, trials, config)?.into_agent(),
        "Adaptive Greedy" => make_learner(LearnerKind::AdaptiveGreedy, oracle, trials, config)?.into_agent(),
        "Thompson Sampling" => make_learner(LearnerKind::Thompson, oracle, trials, config)?.into_agent(),
        "LinUCB" => make_learner(LearnerKind::LinUcb, oracle, trials, config)?.into_agent(),
        other => return Err(ClueError::unknown("Agent", other, &AGENT_NAMES)),
    };
    Ok(agent)
}

/// Build every agent in `names`, paired with the name it was requested by.
pub fn make_agents<S: AsRef<str>>(
    names: &[S],
    base: LearnerKind,
    oracle: &Arc<Oracle>,
    trials: usize,
    config: &AgentConfig,
) -> ClueResult<Vec<(String, Box<dyn Agent>)>> {
    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            make_agent(name, base, oracle, trials, config).map(|agent| (name.to_string(), agent))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clue_env::RandomSsdp;

    fn oracle() -> Arc<Oracle> {
        let env = Arc::new(RandomSsdp::new(3, 1, (-1.0, 1.0)).build(12).unwrap());
        Arc::new(Oracle::new(env).unwrap())
    }

    #[test]
    fn test_every_name_builds() {
        let agents = make_agents(&AGENT_NAMES, LearnerKind::default(), &oracle(), 50, &AgentConfig::default()).unwrap();
        assert_eq!(agents.len(), AGENT_NAMES.len());
        let advised: Vec<&str> = agents
            .iter()
            .filter(|(_, a)| a.takes_advice())
            .map(|(n, _)| n.as_str())
            .collect();
        assert_eq!(
            advised,
            vec!["NAF", "CLUE", "Naive CLUE", "Decayed Reliance", "CLUE Decayed", "PRQ"]
        );
    }

    #[test]
    fn test_unknown_agent() {
        let err = make_agent("Oracle", LearnerKind::default(), &oracle(), 50, &AgentConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, ClueError::UnknownName { .. }));
    }

    #[test]
    fn test_learner_kind_parsing() {
        assert_eq!("UCB".parse::<LearnerKind>().unwrap(), LearnerKind::Ucb);
        assert_eq!("epsilon greedy".parse::<LearnerKind>().unwrap(), LearnerKind::EpsilonGreedy);
        assert!("SARSA".parse::<LearnerKind>().is_err());
        for kind in LearnerKind::ALL {
            assert_eq!(kind.to_string().parse::<LearnerKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_baseline_follows_base_kind() {
        let agent = make_agent("Baseline Agent", LearnerKind::Ucb, &oracle(), 50, &AgentConfig::default()).unwrap();
        assert_eq!(agent.name(), "UCB Baseline Agent");
    }
}
