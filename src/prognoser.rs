//! Orchestration: initialise-once, step loop, result assembly. Holds its
//! collaborators by value, steps them in lockstep, logs and keeps going on
//! a recoverable error.

use log::{debug, warn};

use crate::error::{PrognosticsError, Result};
use crate::load_estimator::LoadEstimator;
use crate::model::{DataMap, Model, Prediction, PrognosticsModel};
use crate::observer::Observer;
use crate::predictor::Predictor;

/// Binds a model, observer, predictor and load estimator into one steppable
/// pipeline. `initialize`s itself lazily on the first fully-populated
/// `step` call.
pub struct Prognoser<M, O, P, L>
where
    M: PrognosticsModel,
    O: Observer,
    P: Predictor,
    L: LoadEstimator,
{
    model: M,
    observer: O,
    predictor: P,
    load_estimator: L,
    initialized: bool,
    last_time: f64,
}

impl<M, O, P, L> Prognoser<M, O, P, L>
where
    M: PrognosticsModel,
    O: Observer,
    P: Predictor,
    L: LoadEstimator,
{
    pub fn new(model: M, observer: O, predictor: P, load_estimator: L) -> Self {
        Prognoser {
            model,
            observer,
            predictor,
            load_estimator,
            initialized: false,
            last_time: f64::NEG_INFINITY,
        }
    }

    /// Extracts the input/output vectors from `data` by the model's ordered
    /// names, and the observation time as the earliest timestamp among
    /// them. Returns `None` if any required value is not yet set.
    fn extract(&self, data: &DataMap) -> Option<(f64, Vec<f64>, Vec<f64>)> {
        let mut t_now = f64::NEG_INFINITY;
        let mut u = Vec::with_capacity(self.model.input_len());
        for name in self.model.input_names() {
            let datum = data.get(*name)?;
            if !datum.is_set {
                return None;
            }
            t_now = t_now.max(datum.timestamp);
            u.push(datum.value);
        }
        let mut z = Vec::with_capacity(self.model.output_len());
        for name in self.model.output_names() {
            let datum = data.get(*name)?;
            if !datum.is_set {
                return None;
            }
            t_now = t_now.max(datum.timestamp);
            z.push(datum.value);
        }
        Some((t_now, u, z))
    }

    /// Folds in one new reading. Returns an empty `Prediction` on every
    /// path that does not produce a fresh forecast (missing data,
    /// first-ever call, non-advancing time, or a caught numerical error).
    /// Numerical errors (`Singular`, `NotSpd`) are caught and logged as a
    /// skipped step; every other error propagates to the caller.
    pub fn step(&mut self, data: &DataMap) -> Result<Prediction> {
        let (t_now, u, z) = match self.extract(data) {
            Some(v) => v,
            None => {
                debug!("prognoser step skipped: input/output not fully set yet");
                return Ok(Prediction::empty());
            }
        };

        if !self.initialized {
            let x0 = self.model.initialize(&u, &z);
            self.observer.initialize(t_now, &x0, &u);
            self.last_time = t_now;
            self.initialized = true;
            debug!("prognoser initialised at t={}", t_now);
            return Ok(Prediction::empty());
        }

        if t_now <= self.last_time {
            debug!("prognoser step skipped: time {} did not advance past {}", t_now, self.last_time);
            return Ok(Prediction::empty());
        }

        match self.observer.step(t_now, &u, &z) {
            Ok(()) => {}
            Err(e @ (PrognosticsError::Singular | PrognosticsError::NotSpd)) => {
                warn!("observer hit a numerical error at t={}: {}", t_now, e);
                self.last_time = t_now;
                return Ok(Prediction::empty());
            }
            Err(e) => return Err(e),
        }

        if self.load_estimator.uses_historical_loading() {
            if let Err(e) = self.load_estimator.add_load(&u) {
                warn!("load estimator rejected addLoad: {}", e);
            }
        }

        self.last_time = t_now;

        let state_est = self.observer.state_estimate();
        match self.predictor.predict(t_now, &state_est) {
            Ok(prediction) => Ok(prediction),
            Err(e @ (PrognosticsError::Singular | PrognosticsError::NotSpd)) => {
                warn!("predictor hit a numerical error at t={}: {}", t_now, e);
                Ok(Prediction::empty())
            }
            Err(e) => Err(e),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn last_time(&self) -> f64 {
        self.last_time
    }
}
