//! Future-input sampling: the `LoadEstimator` interface and its two
//! strategies, `ConstLoad` and `MovingAverage`.

pub mod const_load;
pub mod moving_average;

pub use const_load::ConstLoad;
pub use moving_average::MovingAverage;

use crate::error::Result;

/// Supplies the Monte Carlo predictor with a hypothetical future input
/// vector, one sample at a time.
pub trait LoadEstimator {
    /// Draws a loading sample at time `t` for Monte Carlo sample index `k`.
    /// `k` lets sample-based strategies vary per rollout while historical
    /// ones ignore it.
    fn estimate_load(&mut self, t: f64, k: usize) -> Vec<f64>;

    /// Folds in an observed input vector. Strategies that are not
    /// historical reject this with `Unsupported`.
    fn add_load(&mut self, u: &[f64]) -> Result<()>;

    /// Whether this strategy needs `add_load` calls to track state.
    fn uses_historical_loading(&self) -> bool;

    /// Whether successive `estimate_load` calls at the same `(t, k)` can
    /// differ (i.e. the strategy draws random samples).
    fn is_sample_based(&self) -> bool;
}

/// A tagged variant over the supported load-estimator strategies.
#[derive(Debug, Clone)]
pub enum AnyLoadEstimator {
    Const(ConstLoad),
    MovingAverage(MovingAverage),
}

impl LoadEstimator for AnyLoadEstimator {
    fn estimate_load(&mut self, t: f64, k: usize) -> Vec<f64> {
        match self {
            AnyLoadEstimator::Const(e) => e.estimate_load(t, k),
            AnyLoadEstimator::MovingAverage(e) => e.estimate_load(t, k),
        }
    }

    fn add_load(&mut self, u: &[f64]) -> Result<()> {
        match self {
            AnyLoadEstimator::Const(e) => e.add_load(u),
            AnyLoadEstimator::MovingAverage(e) => e.add_load(u),
        }
    }

    fn uses_historical_loading(&self) -> bool {
        match self {
            AnyLoadEstimator::Const(e) => e.uses_historical_loading(),
            AnyLoadEstimator::MovingAverage(e) => e.uses_historical_loading(),
        }
    }

    fn is_sample_based(&self) -> bool {
        match self {
            AnyLoadEstimator::Const(e) => e.is_sample_based(),
            AnyLoadEstimator::MovingAverage(e) => e.is_sample_based(),
        }
    }
}
