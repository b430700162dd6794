//! Monte Carlo prediction: K state samples rolled forward independently to
//! each event's threshold crossing (or the horizon), in parallel via rayon.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution as _, Normal};
use rayon::prelude::*;

use crate::error::{PrognosticsError, Result};
use crate::load_estimator::LoadEstimator;
use crate::matrix::Matrix;
use crate::model::{Event, Prediction, PrognosticsModel, SystemTrajectory};
use crate::udata::{UData, UncertaintyKind};

use super::Predictor;

#[derive(Debug, Clone)]
pub struct MonteCarloParameters {
    pub num_samples: usize,
    pub horizon: f64,
    pub interval: f64,
    pub process_noise_variance: Vec<f64>,
    pub seed: u64,
}

pub struct MonteCarlo<M: PrognosticsModel, L: LoadEstimator + Clone> {
    model: Arc<M>,
    load_estimator: L,
    params: MonteCarloParameters,
}

/// One sample's rollout outcome: the time each event fired (or the horizon
/// if not reached) and the per-slot predicted-output values.
struct RolloutResult {
    event_times: Vec<f64>,
    event_reached: Vec<bool>,
    /// `trajectory_values[output_index][slot_index]`.
    trajectory_values: Vec<Vec<f64>>,
}

impl<M: PrognosticsModel, L: LoadEstimator + Clone> MonteCarlo<M, L> {
    pub fn new(model: Arc<M>, load_estimator: L, params: MonteCarloParameters) -> Result<Self> {
        if params.process_noise_variance.len() != model.state_len() {
            return Err(PrognosticsError::DimensionMismatch(
                "process noise variance must have one entry per state".into(),
            ));
        }
        if params.num_samples == 0 {
            return Err(PrognosticsError::Config(
                "Predictor.SampleCount must be positive".into(),
            ));
        }
        if params.interval <= 0.0 || params.horizon <= 0.0 {
            return Err(PrognosticsError::Config(
                "Predictor.Horizon and interval must be positive".into(),
            ));
        }
        Ok(MonteCarlo {
            model,
            load_estimator,
            params,
        })
    }

    /// Draws `K` initial state vectors from the observer's posterior
    /// estimate, per the kind it is carried in.
    fn sample_initial_states(&self, state_est: &[UData], rng: &mut StdRng) -> Result<Vec<Vec<f64>>> {
        let s = state_est.len();
        let k = self.params.num_samples;
        if s == 0 {
            return Err(PrognosticsError::DimensionMismatch(
                "state estimate must have at least one component".into(),
            ));
        }
        let kind = state_est[0].kind();
        match kind {
            UncertaintyKind::Point => {
                let mean: Vec<f64> = state_est.iter().map(|u| u.mean()).collect::<Result<_>>()?;
                Ok(vec![mean; k])
            }
            UncertaintyKind::MeanCovar => {
                let mean: Vec<f64> = state_est.iter().map(|u| u.mean()).collect::<Result<_>>()?;
                let mut rows = Vec::with_capacity(s);
                for u in state_est {
                    let mut row = Vec::with_capacity(s);
                    for i in 0..s {
                        row.push(u.get(crate::udata::UIndex::Covar(i))?);
                    }
                    rows.push(row);
                }
                let covar = Matrix::from_row_major(s, s, rows.into_iter().flatten().collect())?;
                let l = covar.cholesky()?;
                let normal = Normal::new(0.0, 1.0).expect("standard normal");
                let mut samples = Vec::with_capacity(k);
                for _ in 0..k {
                    let z: Vec<f64> = (0..s).map(|_| normal.sample(rng)).collect();
                    let mut x = mean.clone();
                    for i in 0..s {
                        let mut acc = 0.0;
                        for j in 0..=i {
                            acc += l.get(i, j) * z[j];
                        }
                        x[i] += acc;
                    }
                    samples.push(x);
                }
                Ok(samples)
            }
            UncertaintyKind::Samples => {
                let npoints = state_est[0].npoints();
                let mut samples = Vec::with_capacity(k);
                for _ in 0..k {
                    let j = rand::Rng::gen_range(rng, 0..npoints);
                    let x: Vec<f64> = state_est.iter().map(|u| u.as_slice()[j]).collect();
                    samples.push(x);
                }
                Ok(samples)
            }
            UncertaintyKind::WSamples => {
                let npoints = state_est[0].npoints();
                let weights: Vec<f64> = (0..npoints)
                    .map(|i| state_est[0].get_pair(i).map(|(_, w)| w))
                    .collect::<Result<_>>()?;
                let mut cdf = vec![0.0; npoints];
                let mut acc = 0.0;
                for (i, w) in weights.iter().enumerate() {
                    acc += w;
                    cdf[i] = acc;
                }
                let mut samples = Vec::with_capacity(k);
                for _ in 0..k {
                    let draw: f64 = rand::Rng::gen_range(rng, 0.0..acc.max(1e-12));
                    let j = cdf.iter().position(|c| *c >= draw).unwrap_or(npoints - 1);
                    let x: Vec<f64> = state_est
                        .iter()
                        .map(|u| u.get_pair(j).map(|(v, _)| v))
                        .collect::<Result<_>>()?;
                    samples.push(x);
                }
                Ok(samples)
            }
            UncertaintyKind::Percentiles => Err(PrognosticsError::Unsupported(
                "Monte Carlo sampling from a Percentiles state estimate is not supported".into(),
            )),
        }
    }

    fn rollout_one(&self, t0: f64, x0: Vec<f64>, k: usize, rng_seed: u64) -> RolloutResult {
        let event_count = self.model.event_names().len();
        let output_count = self.model.predicted_output_names().len();
        let num_slots = (self.params.horizon / self.params.interval).floor() as usize + 1;

        let mut rng = StdRng::seed_from_u64(rng_seed);
        let mut load_estimator = self.load_estimator.clone();
        // Burn in `k` draws so parallel rollouts sharing a cloned, identically
        // seeded load estimator decorrelate instead of drawing in lockstep.
        for _ in 0..k {
            let _ = load_estimator.estimate_load(t0, k);
        }

        let process_normals: Vec<Normal<f64>> = self
            .params
            .process_noise_variance
            .iter()
            .map(|v| Normal::new(0.0, v.max(0.0).sqrt()).expect("non-negative variance"))
            .collect();

        let mut x = x0;
        let mut tau = t0;
        let dt = self.model.default_dt();
        let mut fired = vec![false; event_count];
        let mut event_times = vec![t0 + self.params.horizon; event_count];
        let mut trajectory_values = vec![vec![f64::NAN; num_slots]; output_count];

        loop {
            let load_sample = load_estimator.estimate_load(tau, k);
            let u = self.model.input_eqn(tau, &load_sample);
            let thresholds = self.model.threshold_eqn(tau, &x, &u);
            for (e, crossed) in thresholds.iter().enumerate() {
                if *crossed && !fired[e] {
                    fired[e] = true;
                    event_times[e] = tau;
                }
            }

            let offset = tau - t0;
            let slot = (offset / self.params.interval).round();
            if (offset - slot * self.params.interval).abs() < dt.max(1e-9) / 2.0 {
                let slot_idx = slot as usize;
                if slot_idx < num_slots {
                    let pz = self.model.predicted_output_eqn(tau, &x, &u);
                    for (out_idx, v) in pz.into_iter().enumerate() {
                        trajectory_values[out_idx][slot_idx] = v;
                    }
                }
            }

            if fired.iter().all(|f| *f) || offset >= self.params.horizon {
                break;
            }

            let n: Vec<f64> = process_normals.iter().map(|d| d.sample(&mut rng)).collect();
            x = self.model.state_eqn(tau, &x, &u, &n, dt);
            tau += dt;
        }

        RolloutResult {
            event_reached: fired,
            event_times,
            trajectory_values,
        }
    }
}

impl<M, L> Predictor for MonteCarlo<M, L>
where
    M: PrognosticsModel + Sync,
    L: LoadEstimator + Clone + Sync,
{
    fn predict(&mut self, t0: f64, state_est: &[UData]) -> Result<Prediction> {
        let mut seed_rng = StdRng::seed_from_u64(self.params.seed);
        let x0_samples = self.sample_initial_states(state_est, &mut seed_rng)?;
        let base_seed = self.params.seed;

        let results: Vec<RolloutResult> = x0_samples
            .into_par_iter()
            .enumerate()
            .map(|(k, x0)| self.rollout_one(t0, x0, k, base_seed.wrapping_add(k as u64 + 1)))
            .collect();

        let event_count = self.model.event_names().len();
        let mut events = Vec::with_capacity(event_count);
        for (e, name) in self.model.event_names().iter().enumerate() {
            let times: Vec<f64> = results.iter().map(|r| r.event_times[e]).collect();
            let reached: Vec<bool> = results.iter().map(|r| r.event_reached[e]).collect();
            events.push(Event {
                name: (*name).to_string(),
                time_of_event: UData::samples(&times),
                not_reached: reached.into_iter().map(|r| !r).collect(),
                probability_over_time: None,
            });
        }

        let output_count = self.model.predicted_output_names().len();
        let num_slots = (self.params.horizon / self.params.interval).floor() as usize + 1;
        let mut trajectories = Vec::with_capacity(output_count);
        for (o, name) in self.model.predicted_output_names().iter().enumerate() {
            let mut points = Vec::with_capacity(num_slots);
            for slot in 0..num_slots {
                let values: Vec<f64> = results.iter().map(|r| r.trajectory_values[o][slot]).collect();
                let offset = slot as f64 * self.params.interval;
                points.push((offset, UData::samples(&values)));
            }
            trajectories.push(SystemTrajectory {
                name: (*name).to_string(),
                points,
            });
        }

        Ok(Prediction { events, trajectories })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_estimator::ConstLoad;
    use crate::model::battery::{Battery, BatteryParameters};
    use crate::model::Model;
    use crate::udata::UData;

    fn battery_model() -> Arc<Battery> {
        Arc::new(Battery::new(BatteryParameters::new(7600.0), 1.0))
    }

    fn scenario() -> MonteCarlo<Battery, ConstLoad> {
        let model = battery_model();
        let load = ConstLoad::new(vec![8.0], None, 1).unwrap();
        let params = MonteCarloParameters {
            num_samples: 10,
            horizon: 5000.0,
            interval: 1000.0,
            process_noise_variance: vec![0.0; model.state_len()],
            seed: 42,
        };
        MonteCarlo::new(model, load, params).unwrap()
    }

    fn point_state_estimate(x0: &[f64]) -> Vec<UData> {
        x0.iter().map(|v| UData::point(*v)).collect()
    }

    #[test]
    fn degenerate_const_load_zero_noise_all_samples_coincide() {
        let mut mc = scenario();
        let x0 = mc.model.initialize(&[0.4], &[20.0, 4.0]);
        let state_est = point_state_estimate(&x0);
        let prediction = mc.predict(0.0, &state_est).unwrap();
        let eod = &prediction.events[0];
        assert_eq!(eod.time_of_event.npoints(), 10);
        let first = eod.time_of_event.as_slice()[0];
        for v in eod.time_of_event.as_slice() {
            assert_eq!(*v, first);
        }
    }

    #[test]
    fn rejects_mismatched_process_noise_length() {
        let model = battery_model();
        let load = ConstLoad::new(vec![8.0], None, 1).unwrap();
        let params = MonteCarloParameters {
            num_samples: 10,
            horizon: 5000.0,
            interval: 1000.0,
            process_noise_variance: vec![0.0; 3],
            seed: 42,
        };
        assert!(MonteCarlo::new(model, load, params).is_err());
    }
}
