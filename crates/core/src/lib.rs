//! Shared building blocks for the CLUE simulator: discrete spaces, dense
//! tables, configuration and the error type used across the workspace.

pub mod config;
pub mod error;
pub mod table;
pub mod types;

pub use config::AppConfig;
pub use error::{ClueError, ClueResult};
pub use table::{argmax, argmax_all, StateTable, ValueTable};
pub use types::{derive_seed, hash_label, seeded_rng, Action, Dimension, SimRng, Space, State};
