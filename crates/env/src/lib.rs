//! Single-stage decision environments backed by influence diagrams, and the
//! oracle that knows their optimal policy.

pub mod diagram;
pub mod oracle;
pub mod random_ssdp;

pub use diagram::InfluenceDiagram;
pub use oracle::{Oracle, PartialPolicy};
pub use random_ssdp::RandomSsdp;

use clue_core::config::EnvironmentConfig;
use clue_core::{ClueError, ClueResult};

/// Environment kinds `make` can build.
pub const ENVIRONMENTS: &[&str] = &["RandomSSDP"];

/// Build an environment by name.
pub fn make(name: &str, params: &EnvironmentConfig) -> ClueResult<InfluenceDiagram> {
    match name {
        "RandomSSDP" => RandomSsdp::new(
            params.num_chance,
            params.num_decision,
            (params.reward_min, params.reward_max),
        )
        .build(params.seed),
        other => Err(ClueError::unknown("environment", other, ENVIRONMENTS)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_random_ssdp() {
        let env = make("RandomSSDP", &EnvironmentConfig::default()).unwrap();
        assert_eq!(env.name(), "Random (7,3)");
        assert_eq!(env.size(), (128, 8));
    }

    #[test]
    fn test_make_unknown_lists_choices() {
        let err = make("GridWorld", &EnvironmentConfig::default()).unwrap_err();
        assert!(err.to_string().contains("RandomSSDP"));
    }
}
