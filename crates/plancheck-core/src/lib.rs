pub mod checks;
pub mod config;
pub mod error;
pub mod finding;
pub mod index;
pub mod io;
pub mod matcher;
pub mod naming;
pub mod paths;
pub mod plan;
pub mod precedent;
pub mod report;
pub mod scorer;
pub mod types;
pub mod verdict;
pub mod verify;

pub use error::{PlanCheckError, Result};
