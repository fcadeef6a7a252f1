//! Discrete probabilistic graphical models: factors, decision networks and
//! variable elimination for influence diagrams.

pub mod elimination;
pub mod factor;
pub mod network;
pub mod variable;

pub use elimination::{Solution, VariableEliminator};
pub use factor::{Cpd, DecisionFunction, Evidence, Factor};
pub use network::DecisionNetwork;
pub use variable::{VarId, Variable, VariableKind};
