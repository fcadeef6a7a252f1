//! Experiment harness: runs agents against panels of experts, measures
//! rewards and regret, and writes the results to disk.

pub mod regret;
pub mod results;
pub mod runner;
pub mod studies;

pub use regret::{beta_param_test, expert_param_test, partial_observability_test, regret_test};
pub use results::{AgreementRow, ComparisonResults, Manifest, ParamGrid, RegretRow, RegretTable, ResultsWriter};
pub use runner::{
    named_agents, regret, run_panel, run_session, run_standard, unreliable_panels, AgentBlueprint, ExperimentRunner,
    PanelBlueprint, Session, World,
};
pub use studies::{build_oracle, run_study, Study, JOB_NAMES};
