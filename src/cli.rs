use clap::Parser;
use serde::Serialize;

use crate::cleaning::PriceRange;

/// Mandated step to clean data
#[derive(Parser, Debug, Clone, Serialize)]
#[command(name = "basic_cleaning")]
#[command(about = "Clean the raw listings artifact and log the result as a new artifact")]
#[command(version)]
pub struct Args {
    /// Fully-qualified name for the input artifact
    #[arg(long = "input_artifact")]
    pub input_artifact: String,

    /// Name for the artifact
    #[arg(long = "artifact_name")]
    pub artifact_name: String,

    /// Type for the artifact
    #[arg(long = "artifact_type")]
    pub artifact_type: String,

    /// Description for the artifact
    #[arg(long = "artifact_description")]
    pub artifact_description: String,

    /// Minimum price of the rental
    #[arg(long = "min_price", allow_negative_numbers = true)]
    pub min_price: i64,

    /// Maximum price of the rental
    #[arg(long = "max_price", allow_negative_numbers = true)]
    pub max_price: i64,
}

impl Args {
    pub fn price_range(&self) -> PriceRange {
        PriceRange::new(self.min_price, self.max_price)
    }
}
