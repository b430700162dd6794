//! Fixed loading vector, optionally perturbed by an independent Gaussian
//! draw per component.

use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution as _, Normal};

use crate::error::{PrognosticsError, Result};

use super::LoadEstimator;

#[derive(Debug, Clone)]
pub struct ConstLoad {
    mean: Vec<f64>,
    std_dev: Option<Vec<f64>>,
    rng: StdRng,
}

impl ConstLoad {
    pub fn new(mean: Vec<f64>, std_dev: Option<Vec<f64>>, seed: u64) -> Result<Self> {
        if let Some(sd) = &std_dev {
            if sd.len() != mean.len() {
                return Err(PrognosticsError::DimensionMismatch(
                    "StdDev must match Loading length".into(),
                ));
            }
        }
        Ok(ConstLoad {
            mean,
            std_dev,
            rng: StdRng::seed_from_u64(seed),
        })
    }
}

impl LoadEstimator for ConstLoad {
    fn estimate_load(&mut self, _t: f64, _k: usize) -> Vec<f64> {
        match &self.std_dev {
            None => self.mean.clone(),
            Some(sd) => self
                .mean
                .iter()
                .zip(sd.iter())
                .map(|(m, s)| {
                    if *s <= 0.0 {
                        *m
                    } else {
                        let normal = Normal::new(*m, *s).expect("positive std dev");
                        normal.sample(&mut self.rng)
                    }
                })
                .collect(),
        }
    }

    fn add_load(&mut self, _u: &[f64]) -> Result<()> {
        Err(PrognosticsError::Unsupported(
            "ConstLoad does not track historical loading".into(),
        ))
    }

    fn uses_historical_loading(&self) -> bool {
        false
    }

    fn is_sample_based(&self) -> bool {
        self.std_dev.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn without_std_dev_returns_mean_exactly_every_call() {
        let mut load = ConstLoad::new(vec![1.0, 2.0, 3.0], None, 1).unwrap();
        for _ in 0..5 {
            assert_eq!(load.estimate_load(0.0, 0), vec![1.0, 2.0, 3.0]);
        }
    }

    #[test]
    fn with_std_dev_samples_stay_near_mean_but_vary() {
        let mut load = ConstLoad::new(
            vec![1.0, 2.0, 3.0],
            Some(vec![0.1, 0.1, 0.1]),
            7,
        )
        .unwrap();
        let a = load.estimate_load(0.0, 0);
        let b = load.estimate_load(0.0, 0);
        for (v, m) in a.iter().zip([1.0, 2.0, 3.0].iter()) {
            assert!((v - m).abs() < 1.0);
        }
        assert_ne!(a, b);
    }

    #[test]
    fn add_load_is_unsupported() {
        let mut load = ConstLoad::new(vec![1.0], None, 1).unwrap();
        assert_eq!(
            load.add_load(&[1.0]).unwrap_err(),
            PrognosticsError::Unsupported("ConstLoad does not track historical loading".into())
        );
    }

    #[test]
    fn mismatched_std_dev_length_is_dimension_mismatch() {
        assert!(ConstLoad::new(vec![1.0, 2.0], Some(vec![0.1]), 1).is_err());
    }
}
