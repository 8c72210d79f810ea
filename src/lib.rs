pub mod cleaning;
pub mod cli;
pub mod config;
pub mod constants;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod run;
pub mod store;

pub use error::{CleaningError, Result};
