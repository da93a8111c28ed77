pub mod aggregate;
pub mod config;
pub mod error;
pub mod feed;
pub mod fetch;
pub mod optimizer;
pub mod output;
pub mod pipeline;
pub mod spatial;
pub mod stats;

pub use config::PlannerConfig;
pub use error::{ParseError, PlanError};
pub use pipeline::{PlanReport, plan};
