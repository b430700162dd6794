//! `prognoser-rs`: a generic model-based prognostics runtime.
//!
//! Wires together a discrete-time state-space `Model`, a recursive-Bayesian
//! `Observer`, a future-input `LoadEstimator` and a Monte Carlo `Predictor`
//! into one steppable `Prognoser`. See each module for the piece it owns.

pub mod config;
pub mod error;
pub mod load_estimator;
pub mod matrix;
pub mod model;
pub mod observer;
pub mod playback;
pub mod predictor;
pub mod prognoser;
pub mod udata;

pub use error::{PrognosticsError, Result};
pub use model::{DataMap, Datum, Event, Model, Prediction, PrognosticsModel, SystemTrajectory};
pub use prognoser::Prognoser;
