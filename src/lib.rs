pub mod batch;
pub mod calendar;
pub mod config;
pub mod error;
pub mod model;
pub mod observability;
pub mod planner;
pub mod recovery;
pub mod slots;
pub mod store;
pub mod tz;

pub use batch::{run_generation, run_purge, GenerationReport, PurgeReport};
pub use error::BatchError;
