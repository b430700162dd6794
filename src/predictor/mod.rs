//! Forward simulation to event: the `Predictor` interface and its Monte
//! Carlo implementation.

pub mod monte_carlo;

pub use monte_carlo::MonteCarlo;

use crate::error::Result;
use crate::model::Prediction;
use crate::udata::UData;

/// Rolls a posterior state estimate forward to produce event-time and
/// trajectory distributions.
pub trait Predictor {
    fn predict(&mut self, t0: f64, state_est: &[UData]) -> Result<Prediction>;
}
