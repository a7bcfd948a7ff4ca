//!
//! Options of the training objective
//!
use clap::Args;
use serde::{Deserialize, Serialize};

///
/// TrainingOptions
///
/// Can be flattened into the command line of a training binary with
/// `#[clap(flatten)]`.
///
#[derive(Args, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingOptions {
    /// Scale on the denominator term in the objective function; you can set
    /// it to e.g. 0.9 to encourage the probabilities to sum to one more
    /// closely.
    #[clap(long = "denominator-scale", default_value = "1.0")]
    #[serde(default = "default_denominator_scale")]
    pub denominator_scale: f32,
}

fn default_denominator_scale() -> f32 {
    1.0
}

impl TrainingOptions {
    pub fn new(denominator_scale: f32) -> TrainingOptions {
        TrainingOptions { denominator_scale }
    }
}

impl Default for TrainingOptions {
    fn default() -> Self {
        TrainingOptions {
            denominator_scale: default_denominator_scale(),
        }
    }
}

impl std::fmt::Display for TrainingOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "denominator_scale: {}", self.denominator_scale)
    }
}
