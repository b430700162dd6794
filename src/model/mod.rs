//! The state-space `Model` abstraction and its `PrognosticsModel` extension,
//! plus the concrete `Tank3` and `Battery` implementations.
//!
//! Sizes (`S`/`I`/`O` in the source) are plain runtime `usize`s rather than
//! `nalgebra::DimName` type parameters: every model the pipeline deals with
//! is a concrete, fixed-size type, not a dimension-polymorphic library
//! surface, so the extra generic machinery a dimension-parameterized
//! dynamics trait would carry buys nothing here.

pub mod battery;
pub mod tank3;

pub use battery::Battery;
pub use tank3::Tank3;

/// A discrete-time, time-varying nonlinear state-space model.
pub trait Model {
    /// Number of state variables.
    fn state_len(&self) -> usize;
    /// Number of inputs.
    fn input_len(&self) -> usize;
    /// Number of outputs.
    fn output_len(&self) -> usize;

    /// Ordered names of the inputs, for binding to a sensor stream.
    fn input_names(&self) -> &[&str];
    /// Ordered names of the outputs, for binding to a sensor stream.
    fn output_names(&self) -> &[&str];

    /// Default time step used when the caller has no better estimate.
    fn default_dt(&self) -> f64;

    /// Seeds a plausible initial state from a first observation.
    fn initialize(&self, u: &[f64], z: &[f64]) -> Vec<f64>;

    /// Advances the state by one step of `dt`, given additive process-noise
    /// sample `n` (same length as the state).
    fn state_eqn(&self, t: f64, x: &[f64], u: &[f64], n: &[f64], dt: f64) -> Vec<f64>;

    /// Computes the observation at state `x`, given additive sensor-noise
    /// sample `n` (same length as the output).
    fn output_eqn(&self, t: f64, x: &[f64], n: &[f64]) -> Vec<f64>;

    /// A correctly-sized, zeroed input vector.
    fn input_vector(&self) -> Vec<f64> {
        vec![0.0; self.input_len()]
    }
    /// A correctly-sized, zeroed output vector.
    fn output_vector(&self) -> Vec<f64> {
        vec![0.0; self.output_len()]
    }
    /// A correctly-sized, zeroed state vector.
    fn state_vector(&self) -> Vec<f64> {
        vec![0.0; self.state_len()]
    }
}

/// A `Model` extended with an event-threshold predicate and the hooks the
/// Monte Carlo predictor needs to roll a trajectory forward to that event.
pub trait PrognosticsModel: Model {
    /// Number of auxiliary predicted outputs (e.g. state-of-charge).
    fn predicted_output_len(&self) -> usize;
    /// Ordered names of the events this model can terminate on.
    fn event_names(&self) -> &[&str];
    /// Ordered names of the auxiliary predicted outputs.
    fn predicted_output_names(&self) -> &[&str];

    /// Per-event termination predicate; `true` means the event has occurred.
    fn threshold_eqn(&self, t: f64, x: &[f64], u: &[f64]) -> Vec<bool>;

    /// Synthesizes a future input from a load estimator's sample.
    fn input_eqn(&self, t: f64, load_sample: &[f64]) -> Vec<f64>;

    /// Auxiliary outputs saved during prediction (e.g. state-of-charge).
    fn predicted_output_eqn(&self, t: f64, x: &[f64], u: &[f64]) -> Vec<f64>;
}

/// A single sensor reading: a value, the time it was taken, and whether it
/// has been set at all (unset readings must not be consumed by a step).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Datum {
    pub value: f64,
    pub timestamp: f64,
    pub is_set: bool,
}

impl Datum {
    pub fn new(value: f64, timestamp: f64) -> Self {
        Datum {
            value,
            timestamp,
            is_set: true,
        }
    }

    pub fn unset() -> Self {
        Datum {
            value: f64::NAN,
            timestamp: f64::NAN,
            is_set: false,
        }
    }
}

impl Default for Datum {
    fn default() -> Self {
        Datum::unset()
    }
}

/// A symbolic-id -> `Datum` mapping, the concrete carrier `Prognoser::step`
/// consumes.
pub type DataMap = std::collections::HashMap<String, Datum>;

/// The time-of-event estimate, and optionally a probability-of-occurrence
/// time series, for one named event.
///
/// `not_reached` carries one flag per sample backing `time_of_event`: `true`
/// means that sample's rollout hit the prediction horizon before the event
/// fired, and its recorded time is the horizon bound rather than an observed
/// crossing.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: String,
    pub time_of_event: crate::udata::UData,
    pub not_reached: Vec<bool>,
    pub probability_over_time: Option<Vec<(f64, f64)>>,
}

/// A time-indexed list of predicted-output distributions for one output.
#[derive(Debug, Clone)]
pub struct SystemTrajectory {
    pub name: String,
    /// `(time offset from prediction start, predicted value distribution)`.
    pub points: Vec<(f64, crate::udata::UData)>,
}

/// The result of one `Predictor::predict` call.
#[derive(Debug, Clone, Default)]
pub struct Prediction {
    pub events: Vec<Event>,
    pub trajectories: Vec<SystemTrajectory>,
}

impl Prediction {
    pub fn empty() -> Self {
        Prediction::default()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.trajectories.is_empty()
    }
}

/// A tagged variant over the supported models, so a factory can build one
/// from a config string without a trait object.
#[derive(Debug, Clone)]
pub enum AnyModel {
    Tank3(Tank3),
    Battery(Battery),
}

macro_rules! any_model_dispatch {
    ($self:ident, $method:ident ($($arg:expr),*)) => {
        match $self {
            AnyModel::Tank3(m) => m.$method($($arg),*),
            AnyModel::Battery(m) => m.$method($($arg),*),
        }
    };
}

impl Model for AnyModel {
    fn state_len(&self) -> usize {
        any_model_dispatch!(self, state_len())
    }
    fn input_len(&self) -> usize {
        any_model_dispatch!(self, input_len())
    }
    fn output_len(&self) -> usize {
        any_model_dispatch!(self, output_len())
    }
    fn input_names(&self) -> &[&str] {
        any_model_dispatch!(self, input_names())
    }
    fn output_names(&self) -> &[&str] {
        any_model_dispatch!(self, output_names())
    }
    fn default_dt(&self) -> f64 {
        any_model_dispatch!(self, default_dt())
    }
    fn initialize(&self, u: &[f64], z: &[f64]) -> Vec<f64> {
        any_model_dispatch!(self, initialize(u, z))
    }
    fn state_eqn(&self, t: f64, x: &[f64], u: &[f64], n: &[f64], dt: f64) -> Vec<f64> {
        any_model_dispatch!(self, state_eqn(t, x, u, n, dt))
    }
    fn output_eqn(&self, t: f64, x: &[f64], n: &[f64]) -> Vec<f64> {
        any_model_dispatch!(self, output_eqn(t, x, n))
    }
}

impl PrognosticsModel for AnyModel {
    fn predicted_output_len(&self) -> usize {
        match self {
            AnyModel::Tank3(_) => 0,
            AnyModel::Battery(m) => m.predicted_output_len(),
        }
    }
    fn event_names(&self) -> &[&str] {
        match self {
            AnyModel::Tank3(_) => &[],
            AnyModel::Battery(m) => m.event_names(),
        }
    }
    fn predicted_output_names(&self) -> &[&str] {
        match self {
            AnyModel::Tank3(_) => &[],
            AnyModel::Battery(m) => m.predicted_output_names(),
        }
    }
    fn threshold_eqn(&self, t: f64, x: &[f64], u: &[f64]) -> Vec<bool> {
        match self {
            AnyModel::Tank3(_) => Vec::new(),
            AnyModel::Battery(m) => m.threshold_eqn(t, x, u),
        }
    }
    fn input_eqn(&self, t: f64, load_sample: &[f64]) -> Vec<f64> {
        match self {
            AnyModel::Tank3(_) => load_sample.to_vec(),
            AnyModel::Battery(m) => m.input_eqn(t, load_sample),
        }
    }
    fn predicted_output_eqn(&self, t: f64, x: &[f64], u: &[f64]) -> Vec<f64> {
        match self {
            AnyModel::Tank3(_) => Vec::new(),
            AnyModel::Battery(m) => m.predicted_output_eqn(t, x, u),
        }
    }
}
