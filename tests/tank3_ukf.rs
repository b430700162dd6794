//! Tank3 + UKF: a constant-inflow scenario tracked by the filter, checking
//! the posterior state estimate stays close to the true simulated state.

use std::sync::Arc;

use approx::assert_relative_eq;

use prognoser_rs::matrix::Matrix;
use prognoser_rs::model::tank3::{Tank3, Tank3Parameters};
use prognoser_rs::model::Model;
use prognoser_rs::observer::ukf::{Ukf, UkfParameters};
use prognoser_rs::observer::Observer;

#[test]
fn ukf_tracks_a_constant_inflow_tank3_simulation() {
    let model = Arc::new(Tank3::new(Tank3Parameters::default(), 0.1));
    let q = Matrix::identity(3).scale(1e-8);
    let r = Matrix::identity(3).scale(1e-6);
    let mut ukf = Ukf::new(model.clone(), q, r, UkfParameters::default()).unwrap();

    let u = vec![1.0, 0.5, 0.2];
    let zero_noise_state = vec![0.0; 3];
    let mut x_true = vec![0.0, 0.0, 0.0];
    let z0 = model.output_eqn(0.0, &x_true, &zero_noise_state);
    ukf.initialize(0.0, &x_true, &u);
    assert_relative_eq!(ukf.z_hat[0], z0[0], epsilon = 1e-3);

    for step in 1..30 {
        let t = step as f64 * 0.1;
        x_true = model.state_eqn(t - 0.1, &x_true, &u, &zero_noise_state, 0.1);
        let z = model.output_eqn(t, &x_true, &zero_noise_state);
        ukf.step(t, &u, &z).unwrap();
    }

    let estimate = ukf.state_estimate();
    assert_eq!(estimate.len(), 3);
    for (est, truth) in estimate.iter().zip(x_true.iter()) {
        assert_relative_eq!(est.mean().unwrap(), *truth, epsilon = 1e-2);
    }
}
