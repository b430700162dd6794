//! Recursive Bayesian state estimation: the `Observer` interface and its
//! two strategies, `Ukf` and `ParticleFilter`, dispatched through a closed
//! tagged enum rather than a virtual base class.

pub mod particle_filter;
pub mod ukf;

pub use particle_filter::ParticleFilter;
pub use ukf::Ukf;

use crate::error::Result;
use crate::model::Model;
use crate::udata::UData;

/// A recursive Bayesian state estimator bound to a (non-owning) `Model`.
pub trait Observer {
    /// Seeds the filter's internal state at `t0` from an initial
    /// input/output observation.
    fn initialize(&mut self, t0: f64, x0: &[f64], u0: &[f64]);

    /// Folds in one new `(t, u, z)` observation. `t` must strictly exceed
    /// the time of the previous call.
    fn step(&mut self, t: f64, u: &[f64], z: &[f64]) -> Result<()>;

    /// The current posterior state estimate, one `UData` per state
    /// component.
    fn state_estimate(&self) -> Vec<UData>;

    /// The most recently applied input vector.
    fn last_input(&self) -> &[f64];

    /// The current time of the estimator.
    fn current_time(&self) -> f64;
}

/// A tagged variant over the supported observer strategies, so a factory
/// can build one from a config string without a trait object or deep
/// class hierarchy.
pub enum AnyObserver<M: Model> {
    Ukf(Ukf<M>),
    ParticleFilter(ParticleFilter<M>),
}

impl<M: Model> Observer for AnyObserver<M> {
    fn initialize(&mut self, t0: f64, x0: &[f64], u0: &[f64]) {
        match self {
            AnyObserver::Ukf(o) => o.initialize(t0, x0, u0),
            AnyObserver::ParticleFilter(o) => o.initialize(t0, x0, u0),
        }
    }

    fn step(&mut self, t: f64, u: &[f64], z: &[f64]) -> Result<()> {
        match self {
            AnyObserver::Ukf(o) => o.step(t, u, z),
            AnyObserver::ParticleFilter(o) => o.step(t, u, z),
        }
    }

    fn state_estimate(&self) -> Vec<UData> {
        match self {
            AnyObserver::Ukf(o) => o.state_estimate(),
            AnyObserver::ParticleFilter(o) => o.state_estimate(),
        }
    }

    fn last_input(&self) -> &[f64] {
        match self {
            AnyObserver::Ukf(o) => o.last_input(),
            AnyObserver::ParticleFilter(o) => o.last_input(),
        }
    }

    fn current_time(&self) -> f64 {
        match self {
            AnyObserver::Ukf(o) => o.current_time(),
            AnyObserver::ParticleFilter(o) => o.current_time(),
        }
    }
}
