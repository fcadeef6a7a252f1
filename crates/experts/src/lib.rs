//! Simulated expert advisors of varying reliability, and panels of them.

pub mod degrading;
pub mod expert;
pub mod nonuniform;
pub mod panel;
pub mod partial;
pub mod unreliable;

pub use degrading::DegradingExpert;
pub use expert::{format_rho, AdviceGate, Expert};
pub use nonuniform::NonuniformExpert;
pub use panel::{make_degrading_panels, make_nonuniform_panels, make_panels, make_partial_panels, Panel};
pub use partial::PartiallyReliableExpert;
pub use unreliable::UnreliableExpert;
