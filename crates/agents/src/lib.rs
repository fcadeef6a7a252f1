//! Learning agents for single-stage decision problems: unassisted bandit
//! learners and the wrappers that fold expert advice into them.

pub mod adaptive;
pub mod advice;
pub mod agent;
pub mod clue;
pub mod clue_decayed;
pub mod decayed;
pub mod epsilon_greedy;
pub mod ete;
pub mod factory;
pub mod linucb;
pub mod naf;
pub mod prq;
pub mod thompson;
pub mod true_policy;
pub mod ucb;

pub use adaptive::AdaptiveGreedyAgent;
pub use advice::AdviceBook;
pub use agent::{Agent, LinearSchedule, Learner};
pub use clue::ClueAgent;
pub use clue_decayed::ClueDecayedAgent;
pub use decayed::DecayedRelianceAgent;
pub use epsilon_greedy::EpsilonGreedyAgent;
pub use ete::EteAgent;
pub use factory::{make_agent, make_agents, make_learner, LearnerKind, AGENT_NAMES};
pub use linucb::LinUcbAgent;
pub use naf::NaiveAdviceFollower;
pub use prq::PrqAgent;
pub use thompson::ThompsonAgent;
pub use true_policy::TruePolicyAgent;
pub use ucb::UcbAgent;
