//! Unscented Kalman Filter: Gaussian posterior propagated through the
//! nonlinear `stateEqn`/`outputEqn` via sigma points, avoiding the need for
//! a linearized Jacobian/STM.

use std::sync::Arc;

use crate::error::{PrognosticsError, Result};
use crate::matrix::Matrix;
use crate::model::Model;
use crate::udata::UData;

use super::Observer;

/// Unscented-transform tuning constants. Defaults (`alpha=1, beta=2,
/// kappa=0`) match the standard UT formulae.
#[derive(Debug, Clone, Copy)]
pub struct UkfParameters {
    pub alpha: f64,
    pub beta: f64,
    pub kappa: f64,
}

impl Default for UkfParameters {
    fn default() -> Self {
        UkfParameters {
            alpha: 1.0,
            beta: 2.0,
            kappa: 0.0,
        }
    }
}

pub struct Ukf<M: Model> {
    model: Arc<M>,
    params: UkfParameters,
    q: Matrix,
    r: Matrix,
    x_hat: Vec<f64>,
    p: Matrix,
    u: Vec<f64>,
    t: f64,
    /// Output estimate computed during `initialize`, for inspection/tests.
    pub z_hat: Vec<f64>,
    initialized: bool,
    wm: Vec<f64>,
    wc: Vec<f64>,
    lambda: f64,
}

impl<M: Model> Ukf<M> {
    pub fn new(model: Arc<M>, q: Matrix, r: Matrix, params: UkfParameters) -> Result<Self> {
        let s = model.state_len();
        let o = model.output_len();
        if q.rows() != s || q.cols() != s {
            return Err(PrognosticsError::DimensionMismatch(
                "Q must be S x S".into(),
            ));
        }
        if r.rows() != o || r.cols() != o {
            return Err(PrognosticsError::DimensionMismatch(
                "R must be O x O".into(),
            ));
        }
        let lambda = params.alpha * params.alpha * (s as f64 + params.kappa) - s as f64;
        let mut wm = vec![0.0; 2 * s + 1];
        let mut wc = vec![0.0; 2 * s + 1];
        wm[0] = lambda / (s as f64 + lambda);
        wc[0] = wm[0] + (1.0 - params.alpha * params.alpha + params.beta);
        for i in 1..=2 * s {
            wm[i] = 1.0 / (2.0 * (s as f64 + lambda));
            wc[i] = wm[i];
        }

        Ok(Ukf {
            model,
            params,
            q,
            r,
            x_hat: vec![0.0; s],
            p: Matrix::zeros(s, s),
            u: vec![0.0; model.input_len()],
            t: 0.0,
            z_hat: vec![0.0; o],
            initialized: false,
            wm,
            wc,
            lambda,
        })
    }

    pub fn state_covariance(&self) -> &Matrix {
        &self.p
    }

    pub fn state_mean(&self) -> &[f64] {
        &self.x_hat
    }

    /// Generates the `2S+1` sigma points of `(mean, covar)` as columns of an
    /// `S x (2S+1)` matrix.
    fn sigma_points(&self, mean: &[f64], covar: &Matrix) -> Result<Matrix> {
        let s = mean.len();
        let scaled = covar.scale(s as f64 + self.lambda);
        let l = scaled.cholesky()?;
        let mut points = Matrix::zeros(s, 2 * s + 1);
        points.set_column(0, mean)?;
        for i in 0..s {
            let col_l = l.column(i)?;
            let mut plus = vec![0.0; s];
            let mut minus = vec![0.0; s];
            for r in 0..s {
                plus[r] = mean[r] + col_l[r];
                minus[r] = mean[r] - col_l[r];
            }
            points.set_column(1 + i, &plus)?;
            points.set_column(1 + s + i, &minus)?;
        }
        Ok(points)
    }

    fn cross_covariance(
        &self,
        x_sigma: &Matrix,
        x_mean: &Matrix,
        z_sigma: &Matrix,
        z_mean: &Matrix,
    ) -> Result<Matrix> {
        let s = x_sigma.rows();
        let o = z_sigma.rows();
        let mut cov = Matrix::zeros(s, o);
        for j in 0..x_sigma.cols() {
            let w = self.wc[j];
            for a in 0..s {
                let dx = x_sigma.get(a, j) - x_mean.get(a, 0);
                for b in 0..o {
                    let dz = z_sigma.get(b, j) - z_mean.get(b, 0);
                    let cur = cov.get(a, b);
                    cov.set(a, b, cur + w * dx * dz);
                }
            }
        }
        Ok(cov)
    }
}

impl<M: Model> Observer for Ukf<M> {
    fn initialize(&mut self, t0: f64, x0: &[f64], u0: &[f64]) {
        self.x_hat = x0.to_vec();
        self.p = self.q.clone();
        self.u = u0.to_vec();
        self.t = t0;
        self.initialized = true;

        let zero_noise = vec![0.0; self.model.output_len()];
        let sigma = self
            .sigma_points(&self.x_hat, &self.p)
            .expect("Q is SPD by construction");
        let mut z_sigma = Matrix::zeros(self.model.output_len(), sigma.cols());
        for j in 0..sigma.cols() {
            let col = sigma.column(j).unwrap();
            let z = self.model.output_eqn(t0, &col, &zero_noise);
            z_sigma.set_column(j, &z).unwrap();
        }
        let z_hat = z_sigma.weighted_mean(&self.wm).unwrap();
        self.z_hat = z_hat.column(0).unwrap();
    }

    fn step(&mut self, t: f64, u: &[f64], z: &[f64]) -> Result<()> {
        if !self.initialized {
            return Err(PrognosticsError::NotInitialised);
        }
        if t <= self.t {
            return Err(PrognosticsError::TimeNotAdvanced);
        }
        let dt = t - self.t;
        let s = self.model.state_len();
        let o = self.model.output_len();
        let zero_state_noise = vec![0.0; s];
        let zero_out_noise = vec![0.0; o];

        // 1-2: sigma points through the state equation.
        let sigma = self.sigma_points(&self.x_hat, &self.p)?;
        let mut x_sigma = Matrix::zeros(s, sigma.cols());
        for j in 0..sigma.cols() {
            let col = sigma.column(j)?;
            let xp = self
                .model
                .state_eqn(self.t, &col, u, &zero_state_noise, dt);
            x_sigma.set_column(j, &xp)?;
        }

        // 3: predicted mean/covariance.
        let x_bar = x_sigma.weighted_mean(&self.wm)?;
        let p_bar = x_sigma
            .weighted_covariance(&self.wc, &x_bar, 0.0)?
            .add(&self.q)?;

        // 4: output sigma points.
        let mut z_sigma = Matrix::zeros(o, sigma.cols());
        for j in 0..sigma.cols() {
            let col = x_sigma.column(j)?;
            let zp = self.model.output_eqn(t, &col, &zero_out_noise);
            z_sigma.set_column(j, &zp)?;
        }
        let z_bar = z_sigma.weighted_mean(&self.wm)?;
        let pzz = z_sigma
            .weighted_covariance(&self.wc, &z_bar, 0.0)?
            .add(&self.r)?;
        let pxz = self.cross_covariance(&x_sigma, &x_bar, &z_sigma, &z_bar)?;

        // 5: gain, posterior mean and covariance.
        let pzz_inv = pzz.inverse()?;
        let gain = pxz.mul(&pzz_inv)?;

        let innovation = Matrix::column_vector(
            &z.iter()
                .zip(z_bar.column(0)?.iter())
                .map(|(a, b)| a - b)
                .collect::<Vec<_>>(),
        );
        let correction = gain.mul(&innovation)?;
        let x_hat: Vec<f64> = x_bar
            .column(0)?
            .iter()
            .zip(correction.column(0)?.iter())
            .map(|(a, b)| a + b)
            .collect();

        let p_new = p_bar.sub(&gain.mul(&pzz)?.mul(&gain.transpose())?)?;

        self.x_hat = x_hat;
        self.p = p_new;
        self.u = u.to_vec();
        self.t = t;
        Ok(())
    }

    fn state_estimate(&self) -> Vec<UData> {
        let s = self.x_hat.len();
        (0..s)
            .map(|i| {
                let row = self.p.row(i).unwrap_or_default();
                UData::mean_covar(self.x_hat[i], &row)
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
    use approx::assert_relative_eq;

    fn scenario() -> Ukf<Tank3> {
        let model = Arc::new(Tank3::new(
            Tank3Parameters {
                k1: 1.0,
                k2: 2.0,
                k3: 3.0,
                r1: 1.0,
                r2: 2.0,
                r3: 3.0,
                r1c2: 1.0,
                r2c3: 2.0,
            },
            0.1,
        ));
        let q = Matrix::identity(3).scale(1e-5);
        let r = Matrix::identity(3).scale(1e-2);
        Ukf::new(model, q, r, UkfParameters::default()).unwrap()
    }

    #[test]
    fn initialize_sets_covariance_to_q_and_mean_to_x0() {
        let mut ukf = scenario();
        let q = ukf.q.clone();
        ukf.initialize(0.0, &[0.0, 0.0, 0.0], &[1.0, 1.0, 1.0]);
        assert_eq!(ukf.state_mean(), &[0.0, 0.0, 0.0]);
        assert_eq!(*ukf.state_covariance(), q);
    }

    #[test]
    fn step_before_initialize_fails() {
        let mut ukf = scenario();
        assert_eq!(
            ukf.step(0.1, &[1.0, 1.0, 1.0], &[0.1, 0.05, 0.03]).unwrap_err(),
            PrognosticsError::NotInitialised
        );
    }

    #[test]
    fn step_rejects_non_advancing_time() {
        let mut ukf = scenario();
        ukf.initialize(0.0, &[0.0, 0.0, 0.0], &[1.0, 1.0, 1.0]);
        assert_eq!(
            ukf.step(0.0, &[1.0, 1.0, 1.0], &[0.1, 0.05, 0.03]).unwrap_err(),
            PrognosticsError::TimeNotAdvanced
        );
    }

    #[test]
    fn tank3_one_step_matches_scenario_within_tolerance() {
        let mut ukf = scenario();
        ukf.initialize(0.0, &[0.0, 0.0, 0.0], &[1.0, 1.0, 1.0]);
        let u = [1.0, 1.0, 1.0];
        let z = [0.1000071, 0.0500027, 0.0333344];
        ukf.step(0.1, &u, &z).unwrap();
        assert_relative_eq!(ukf.state_mean()[0], 0.1000071, epsilon = 1e-3);
        assert_relative_eq!(ukf.state_mean()[1], 0.1000055, epsilon = 1e-3);
        assert_relative_eq!(ukf.state_mean()[2], 0.1000034, epsilon = 1e-3);
        assert!(ukf.state_covariance().get(0, 0) > 0.0);
    }
}
