//! Ring buffer of the last `W` observed input vectors; estimates load as
//! their componentwise mean.

use std::collections::VecDeque;

use crate::error::{PrognosticsError, Result};

use super::LoadEstimator;

#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: usize,
    buffer: VecDeque<Vec<f64>>,
}

impl MovingAverage {
    pub fn new(window: usize) -> Result<Self> {
        if window == 0 {
            return Err(PrognosticsError::Config(
                "MovingAverage.WindowSize must be positive".into(),
            ));
        }
        Ok(MovingAverage {
            window,
            buffer: VecDeque::with_capacity(window),
        })
    }
}

impl LoadEstimator for MovingAverage {
    fn estimate_load(&mut self, _t: f64, _k: usize) -> Vec<f64> {
        if self.buffer.is_empty() {
            return Vec::new();
        }
        let len = self.buffer[0].len();
        let mut mean = vec![0.0; len];
        for sample in &self.buffer {
            for (acc, v) in mean.iter_mut().zip(sample.iter()) {
                *acc += v;
            }
        }
        let n = self.buffer.len() as f64;
        for v in mean.iter_mut() {
            *v /= n;
        }
        mean
    }

    fn add_load(&mut self, u: &[f64]) -> Result<()> {
        if self.buffer.len() == self.window {
            self.buffer.pop_front();
        }
        self.buffer.push_back(u.to_vec());
        Ok(())
    }

    fn uses_historical_loading(&self) -> bool {
        true
    }

    fn is_sample_based(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_before_any_add() {
        let mut ma = MovingAverage::new(2).unwrap();
        assert_eq!(ma.estimate_load(0.0, 0), Vec::<f64>::new());
    }

    #[test]
    fn one_add_returns_that_vector_exactly() {
        let mut ma = MovingAverage::new(2).unwrap();
        ma.add_load(&[5.0, 1e10, -5e10]).unwrap();
        assert_eq!(ma.estimate_load(0.0, 0), vec![5.0, 1e10, -5e10]);
    }

    #[test]
    fn two_adds_return_elementwise_mean() {
        let mut ma = MovingAverage::new(2).unwrap();
        ma.add_load(&[5.0, 1e10, -5e10]).unwrap();
        ma.add_load(&[4.5, 5e9, -4e10]).unwrap();
        let est = ma.estimate_load(0.0, 0);
        assert_relative_eq!(est[0], 4.75, epsilon = 2.0 * f64::EPSILON * 10.0);
        assert_relative_eq!(est[1], 7.5e9, epsilon = 2.0 * f64::EPSILON * 1e10);
        assert_relative_eq!(est[2], -4.5e10, epsilon = 2.0 * f64::EPSILON * 1e10);
    }

    #[test]
    fn third_add_evicts_the_first() {
        let mut ma = MovingAverage::new(2).unwrap();
        ma.add_load(&[5.0, 1e10, -5e10]).unwrap();
        ma.add_load(&[4.5, 5e9, -4e10]).unwrap();
        ma.add_load(&[4.5, 5e9, -4e10]).unwrap();
        assert_eq!(ma.estimate_load(0.0, 0), vec![4.5, 5e9, -4e10]);
    }

    #[test]
    fn rejects_zero_window() {
        assert!(MovingAverage::new(0).is_err());
    }
}
