//! Particle filter: a weighted sample cloud propagated through the raw
//! `stateEqn`/`outputEqn`, with systematic resampling when the effective
//! sample size collapses. No Gaussian assumption, unlike `Ukf`.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution as _, Normal};

use crate::error::{PrognosticsError, Result};
use crate::model::Model;
use crate::udata::UData;

use super::Observer;

/// Diagonal process/sensor noise variances and particle-filter tuning
/// knobs.
#[derive(Debug, Clone)]
pub struct ParticleFilterParameters {
    pub num_particles: usize,
    pub process_noise_variance: Vec<f64>,
    pub sensor_noise_variance: Vec<f64>,
    /// Fraction of `num_particles` below which the effective sample size
    /// triggers a resample.
    pub min_effective_fraction: f64,
    pub seed: u64,
}

pub struct ParticleFilter<M: Model> {
    model: Arc<M>,
    params: ParticleFilterParameters,
    particles: Vec<Vec<f64>>,
    weights: Vec<f64>,
    u: Vec<f64>,
    t: f64,
    initialized: bool,
    rng: StdRng,
}

fn log_gaussian_density(residual: &[f64], variance: &[f64]) -> f64 {
    let mut log_w = 0.0;
    for (r, v) in residual.iter().zip(variance.iter()) {
        let v = v.max(1e-12);
        log_w += -0.5 * (r * r) / v - 0.5 * (2.0 * std::f64::consts::PI * v).ln();
    }
    log_w
}

impl<M: Model> ParticleFilter<M> {
    pub fn new(model: Arc<M>, params: ParticleFilterParameters) -> Result<Self> {
        if params.process_noise_variance.len() != model.state_len() {
            return Err(PrognosticsError::DimensionMismatch(
                "process noise variance must have one entry per state".into(),
            ));
        }
        if params.sensor_noise_variance.len() != model.output_len() {
            return Err(PrognosticsError::DimensionMismatch(
                "sensor noise variance must have one entry per output".into(),
            ));
        }
        if params.num_particles == 0 {
            return Err(PrognosticsError::Config(
                "num_particles must be positive".into(),
            ));
        }
        let n = params.num_particles;
        let rng = StdRng::seed_from_u64(params.seed);
        Ok(ParticleFilter {
            u: model.input_vector(),
            particles: vec![model.state_vector(); n],
            weights: vec![1.0 / n as f64; n],
            t: 0.0,
            initialized: false,
            model,
            params,
            rng,
        })
    }

    fn effective_sample_size(&self) -> f64 {
        let sum_sq: f64 = self.weights.iter().map(|w| w * w).sum();
        if sum_sq <= 0.0 {
            0.0
        } else {
            1.0 / sum_sq
        }
    }

    /// Systematic resampling: draws `N` evenly spaced offsets through the
    /// weight CDF, so the expected resample count per particle is
    /// proportional to its weight with minimal variance.
    fn resample(&mut self) {
        let n = self.particles.len();
        let mut cdf = vec![0.0; n];
        let mut acc = 0.0;
        for (i, w) in self.weights.iter().enumerate() {
            acc += w;
            cdf[i] = acc;
        }
        let start: f64 = rand::Rng::gen_range(&mut self.rng, 0.0..(1.0 / n as f64));
        let mut new_particles = Vec::with_capacity(n);
        let mut j = 0;
        for i in 0..n {
            let target = start + i as f64 / n as f64;
            while j < n - 1 && cdf[j] < target {
                j += 1;
            }
            new_particles.push(self.particles[j].clone());
        }
        self.particles = new_particles;
        self.weights = vec![1.0 / n as f64; n];
    }
}

impl<M: Model> Observer for ParticleFilter<M> {
    fn initialize(&mut self, t0: f64, x0: &[f64], u0: &[f64]) {
        self.particles = vec![x0.to_vec(); self.particles.len()];
        self.weights = vec![1.0 / self.particles.len() as f64; self.particles.len()];
        self.u = u0.to_vec();
        self.t = t0;
        self.initialized = true;
    }

    fn step(&mut self, t: f64, u: &[f64], z: &[f64]) -> Result<()> {
        if !self.initialized {
            return Err(PrognosticsError::NotInitialised);
        }
        if t <= self.t {
            return Err(PrognosticsError::TimeNotAdvanced);
        }
        let dt = t - self.t;

        let process_normals: Vec<Normal<f64>> = self
            .params
            .process_noise_variance
            .iter()
            .map(|v| Normal::new(0.0, v.max(0.0).sqrt()).expect("non-negative variance"))
            .collect();

        for particle in self.particles.iter_mut() {
            let noise: Vec<f64> = process_normals.iter().map(|d| d.sample(&mut self.rng)).collect();
            let advanced = self.model.state_eqn(self.t, particle, u, &noise, dt);
            *particle = advanced;
        }

        let zero_out_noise = vec![0.0; self.model.output_len()];
        let mut log_weights = Vec::with_capacity(self.particles.len());
        for particle in &self.particles {
            let predicted = self.model.output_eqn(t, particle, &zero_out_noise);
            let residual: Vec<f64> = z
                .iter()
                .zip(predicted.iter())
                .map(|(a, b)| a - b)
                .collect();
            log_weights.push(log_gaussian_density(&residual, &self.params.sensor_noise_variance));
        }
        let max_log_w = log_weights
            .iter()
            .cloned()
            .fold(f64::NEG_INFINITY, f64::max);
        let mut unnormalized: Vec<f64> = log_weights
            .iter()
            .zip(self.weights.iter())
            .map(|(lw, w)| w * (lw - max_log_w).exp())
            .collect();
        let sum: f64 = unnormalized.iter().sum();
        if sum <= 0.0 || !sum.is_finite() {
            return Err(PrognosticsError::Singular);
        }
        for w in unnormalized.iter_mut() {
            *w /= sum;
        }
        self.weights = unnormalized;

        let threshold = self.params.min_effective_fraction * self.particles.len() as f64;
        if self.effective_sample_size() < threshold {
            self.resample();
        }

        self.u = u.to_vec();
        self.t = t;
        Ok(())
    }

    fn state_estimate(&self) -> Vec<UData> {
        let s = self.model.state_len();
        (0..s)
            .map(|i| {
                let samples: Vec<f64> = self.particles.iter().map(|p| p[i]).collect();
                UData::weighted_samples(&samples, &self.weights).expect("matching lengths")
            })
            .collect()
    }

    fn last_input(&self) -> &[f64] {
        &self.u
    }

    fn current_time(&self) -> f64 {
        self.t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tank3::{Tank3, Tank3Parameters};

    fn scenario(seed: u64) -> ParticleFilter<Tank3> {
        let model = Arc::new(Tank3::new(Tank3Parameters::default(), 0.1));
        let params = ParticleFilterParameters {
            num_particles: 50,
            process_noise_variance: vec![1e-6; 3],
            sensor_noise_variance: vec![1e-4; 3],
            min_effective_fraction: 0.5,
            seed,
        };
        ParticleFilter::new(model, params).unwrap()
    }

    #[test]
    fn rejects_mismatched_noise_vectors() {
        let model = Arc::new(Tank3::new(Tank3Parameters::default(), 0.1));
        let params = ParticleFilterParameters {
            num_particles: 10,
            process_noise_variance: vec![1e-6; 2],
            sensor_noise_variance: vec![1e-4; 3],
            min_effective_fraction: 0.5,
            seed: 1,
        };
        assert_eq!(
            ParticleFilter::new(model, params).unwrap_err(),
            PrognosticsError::DimensionMismatch(
                "process noise variance must have one entry per state".into()
            )
        );
    }

    #[test]
    fn step_before_initialize_fails() {
        let mut pf = scenario(1);
        assert_eq!(
            pf.step(0.1, &[1.0, 1.0, 1.0], &[0.1, 0.1, 0.1]).unwrap_err(),
            PrognosticsError::NotInitialised
        );
    }

    #[test]
    fn step_rejects_non_advancing_time() {
        let mut pf = scenario(1);
        pf.initialize(0.0, &[0.0, 0.0, 0.0], &[1.0, 1.0, 1.0]);
        assert_eq!(
            pf.step(-1.0, &[1.0, 1.0, 1.0], &[0.1, 0.1, 0.1]).unwrap_err(),
            PrognosticsError::TimeNotAdvanced
        );
    }

    #[test]
    fn weights_sum_to_one_after_step() {
        let mut pf = scenario(42);
        pf.initialize(0.0, &[0.0, 0.0, 0.0], &[1.0, 1.0, 1.0]);
        pf.step(0.1, &[1.0, 1.0, 1.0], &[0.1, 0.1, 0.1]).unwrap();
        let sum: f64 = pf.weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn state_estimate_tracks_converging_particles() {
        let mut pf = scenario(7);
        pf.initialize(0.0, &[0.0, 0.0, 0.0], &[1.0, 1.0, 1.0]);
        for i in 1..20 {
            let t = i as f64 * 0.1;
            pf.step(t, &[1.0, 1.0, 1.0], &[0.1 * i as f64, 0.1 * i as f64, 0.1 * i as f64])
                .unwrap();
        }
        let est = pf.state_estimate();
        assert_eq!(est.len(), 3);
        for u in &est {
            assert!(u.mean().unwrap().is_finite());
        }
    }
}
