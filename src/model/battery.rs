//! Eight-state lumped electrochemical/thermal battery model: `Tb` (cell
//! temperature), `Vo`/`Vsn`/`Vsp` (ohmic and concentration overpotentials),
//! and `qnB`/`qnS`/`qpB`/`qpS` (bulk/surface charge reservoirs of the two
//! electrodes). One input (current), two outputs (terminal voltage `Vm`,
//! case temperature `Tbm`), one event (`EOD`, end of discharge).
//!
//! The full Redlich-Kister electrochemistry underlying a real electrode
//! pair is reduced here to low-order open-circuit-voltage polynomials,
//! chosen to be monotonic and physically plausible (see `DESIGN.md`)
//! rather than calibrated against a reference cell.

use super::{Model, PrognosticsModel};

/// Reference current (A) used by `initialize` to seed the ohmic
/// overpotential, independent of the actual input current at t=0.
const INIT_REFERENCE_CURRENT: f64 = 0.1;

const INPUT_NAMES: [&str; 1] = ["current"];
const OUTPUT_NAMES: [&str; 2] = ["temperature", "voltage"];
const EVENT_NAMES: [&str; 1] = ["EOD"];
const PREDICTED_OUTPUT_NAMES: [&str; 1] = ["SOC"];

#[derive(Debug, Clone, Copy)]
pub struct BatteryParameters {
    /// Total mobile charge capacity, in Coulombs.
    pub q_mobile: f64,
    pub x_n_max: f64,
    pub x_n_min: f64,
    pub x_p_max: f64,
    pub x_p_min: f64,
    /// Ohmic resistance (Ohm).
    pub r_o: f64,
    /// Concentration-overpotential resistances (Ohm).
    pub r_sn: f64,
    pub r_sp: f64,
    /// Relaxation time constants (s).
    pub tau_o: f64,
    pub tau_sn: f64,
    pub tau_sp: f64,
    /// Fraction of each electrode's capacity held in the bulk reservoir
    /// (the remainder is the surface reservoir that directly feeds the
    /// reaction).
    pub bulk_fraction: f64,
    /// Bulk <-> surface diffusion rate (1/s).
    pub diffusion_rate: f64,
    /// Lumped thermal mass (J/K).
    pub c_th: f64,
    /// Thermal resistance to ambient (K/W).
    pub r_th: f64,
    /// Ambient / initial temperature (K).
    pub tb0: f64,
    /// End-of-discharge voltage threshold (V).
    pub v_eod: f64,

    // Derived (recomputed by `set_parameters`).
    qnb_max: f64,
    qns_max: f64,
    qpb_max: f64,
    qps_max: f64,
}

impl BatteryParameters {
    pub fn new(q_mobile: f64) -> Self {
        let mut p = BatteryParameters {
            q_mobile,
            x_n_max: 0.6,
            x_n_min: 0.0,
            x_p_max: 1.0,
            x_p_min: 0.4,
            r_o: 0.117215,
            r_sn: 0.2,
            r_sp: 0.2,
            tau_o: 10.0,
            tau_sn: 90.0,
            tau_sp: 90.0,
            bulk_fraction: 0.9,
            diffusion_rate: 7e-4,
            c_th: 70.0,
            r_th: 2.0,
            tb0: 293.15,
            v_eod: 3.2,
            qnb_max: 0.0,
            qns_max: 0.0,
            qpb_max: 0.0,
            qps_max: 0.0,
        };
        p.recompute_derived();
        p
    }

    /// Recomputes the derived bulk/surface capacities from `q_mobile`.
    pub fn set_parameters(&mut self, q_mobile: f64) {
        self.q_mobile = q_mobile;
        self.recompute_derived();
    }

    fn recompute_derived(&mut self) {
        let qn_max_total = self.q_mobile / (self.x_n_max - self.x_n_min);
        let qp_max_total = self.q_mobile / (self.x_p_max - self.x_p_min);
        self.qnb_max = self.bulk_fraction * qn_max_total;
        self.qns_max = (1.0 - self.bulk_fraction) * qn_max_total;
        self.qpb_max = self.bulk_fraction * qp_max_total;
        self.qps_max = (1.0 - self.bulk_fraction) * qp_max_total;
    }

    fn un(&self, xn: f64) -> f64 {
        0.6 - 0.6 * xn
    }

    fn up(&self, xp: f64) -> f64 {
        4.3 - 2.1667 * (xp - self.x_p_min)
    }

    /// Open-circuit voltage at state of charge `z` (1 = fully charged).
    fn ocv(&self, z: f64) -> f64 {
        let xn = self.x_n_min + z * (self.x_n_max - self.x_n_min);
        let xp = self.x_p_min + (1.0 - z) * (self.x_p_max - self.x_p_min);
        self.up(xp) - self.un(xn)
    }
}

impl Default for BatteryParameters {
    fn default() -> Self {
        BatteryParameters::new(7600.0)
    }
}

/// State vector indices.
pub mod state_index {
    pub const TB: usize = 0;
    pub const VO: usize = 1;
    pub const VSN: usize = 2;
    pub const VSP: usize = 3;
    pub const QNB: usize = 4;
    pub const QNS: usize = 5;
    pub const QPB: usize = 6;
    pub const QPS: usize = 7;
}

#[derive(Debug, Clone)]
pub struct Battery {
    pub parameters: BatteryParameters,
    dt: f64,
}

impl Battery {
    pub fn new(parameters: BatteryParameters, dt: f64) -> Self {
        Battery { parameters, dt }
    }

    fn soc_fraction(&self, x: &[f64]) -> f64 {
        use state_index::*;
        let p = &self.parameters;
        (x[QNB] + x[QNS]) / (p.qnb_max + p.qns_max)
    }

    fn terminal_voltage(&self, x: &[f64]) -> f64 {
        use state_index::*;
        let z = self.soc_fraction(x);
        self.parameters.ocv(z) - x[VO] - x[VSN] - x[VSP]
    }

    /// Solves for the state-of-charge fraction `z` such that `ocv(z)`
    /// matches `target` via bisection; `ocv` is monotonically increasing in
    /// `z` by construction.
    fn invert_ocv(&self, target: f64) -> f64 {
        let mut lo = 0.0_f64;
        let mut hi = 1.0_f64;
        for _ in 0..100 {
            let mid = 0.5 * (lo + hi);
            if self.parameters.ocv(mid) < target {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }
}

impl Default for Battery {
    fn default() -> Self {
        Battery::new(BatteryParameters::default(), 1.0)
    }
}

impl Model for Battery {
    fn state_len(&self) -> usize {
        8
    }
    fn input_len(&self) -> usize {
        1
    }
    fn output_len(&self) -> usize {
        2
    }
    fn input_names(&self) -> &[&str] {
        &INPUT_NAMES
    }
    fn output_names(&self) -> &[&str] {
        &OUTPUT_NAMES
    }
    fn default_dt(&self) -> f64 {
        self.dt
    }

    fn initialize(&self, _u: &[f64], z: &[f64]) -> Vec<f64> {
        use state_index::*;
        let p = &self.parameters;
        let vo = p.r_o * INIT_REFERENCE_CURRENT;
        // z is ordered per OUTPUT_NAMES: [temperature, voltage].
        let target_ocv = z[1] + vo;
        let soc = self.invert_ocv(target_ocv);

        let mut x = vec![0.0; 8];
        x[TB] = p.tb0;
        x[VO] = vo;
        x[VSN] = 0.0;
        x[VSP] = 0.0;
        x[QNB] = soc * p.qnb_max;
        x[QNS] = soc * p.qns_max;
        x[QPB] = (1.0 - soc) * p.qpb_max;
        x[QPS] = (1.0 - soc) * p.qps_max;
        x
    }

    fn state_eqn(&self, _t: f64, x: &[f64], u: &[f64], n: &[f64], dt: f64) -> Vec<f64> {
        use state_index::*;
        let p = &self.parameters;
        let i = u[0];

        let bulk_n_diff = p.diffusion_rate * (x[QNB] / p.qnb_max - x[QNS] / p.qns_max);
        let bulk_p_diff = p.diffusion_rate * (x[QPB] / p.qpb_max - x[QPS] / p.qps_max);

        let qnb_dot = -bulk_n_diff;
        let qns_dot = -i + bulk_n_diff;
        let qpb_dot = -bulk_p_diff;
        let qps_dot = i + bulk_p_diff;

        let vo_dot = (p.r_o * i - x[VO]) / p.tau_o;
        let vsn_dot = (p.r_sn * i - x[VSN]) / p.tau_sn;
        let vsp_dot = (p.r_sp * i - x[VSP]) / p.tau_sp;

        let heat_in = i * i * p.r_o;
        let heat_out = (x[TB] - p.tb0) / p.r_th;
        let tb_dot = (heat_in - heat_out) / p.c_th;

        let mut out = vec![0.0; 8];
        out[TB] = x[TB] + tb_dot * dt + n.first().copied().unwrap_or(0.0);
        out[VO] = x[VO] + vo_dot * dt + n.get(1).copied().unwrap_or(0.0);
        out[VSN] = x[VSN] + vsn_dot * dt + n.get(2).copied().unwrap_or(0.0);
        out[VSP] = x[VSP] + vsp_dot * dt + n.get(3).copied().unwrap_or(0.0);
        out[QNB] = (x[QNB] + qnb_dot * dt + n.get(4).copied().unwrap_or(0.0)).max(0.0);
        out[QNS] = (x[QNS] + qns_dot * dt + n.get(5).copied().unwrap_or(0.0)).max(0.0);
        out[QPB] = (x[QPB] + qpb_dot * dt + n.get(6).copied().unwrap_or(0.0)).max(0.0);
        out[QPS] = (x[QPS] + qps_dot * dt + n.get(7).copied().unwrap_or(0.0)).max(0.0);
        out
    }

    fn output_eqn(&self, _t: f64, x: &[f64], n: &[f64]) -> Vec<f64> {
        use state_index::*;
        let vm = self.terminal_voltage(x) + n.first().copied().unwrap_or(0.0);
        let tbm = x[TB] + n.get(1).copied().unwrap_or(0.0);
        vec![vm, tbm]
    }
}

impl PrognosticsModel for Battery {
    fn predicted_output_len(&self) -> usize {
        1
    }
    fn event_names(&self) -> &[&str] {
        &EVENT_NAMES
    }
    fn predicted_output_names(&self) -> &[&str] {
        &PREDICTED_OUTPUT_NAMES
    }

    fn threshold_eqn(&self, t: f64, x: &[f64], _u: &[f64]) -> Vec<bool> {
        let no_noise = self.output_vector();
        let z = self.output_eqn(t, x, &no_noise);
        vec![z[0] < self.parameters.v_eod]
    }

    fn input_eqn(&self, _t: f64, load_sample: &[f64]) -> Vec<f64> {
        vec![load_sample[0]]
    }

    fn predicted_output_eqn(&self, _t: f64, x: &[f64], _u: &[f64]) -> Vec<f64> {
        vec![self.soc_fraction(x)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn battery(q_mobile: f64, v_eod: f64) -> Battery {
        let mut params = BatteryParameters::new(q_mobile);
        params.v_eod = v_eod;
        Battery::new(params, 1.0)
    }

    #[test]
    fn initialize_sets_ambient_temperature_and_zero_concentration_overpotentials() {
        let b = battery(7600.0, 3.2);
        let x = b.initialize(&[0.4], &[20.0, 4.0]);
        use state_index::*;
        assert_relative_eq!(x[TB], 293.15, epsilon = 1e-9);
        assert_relative_eq!(x[VSN], 0.0, epsilon = 1e-12);
        assert_relative_eq!(x[VSP], 0.0, epsilon = 1e-12);
        assert_relative_eq!(x[VO], b.parameters.r_o * INIT_REFERENCE_CURRENT, epsilon = 1e-12);
    }

    #[test]
    fn initialize_recovers_the_observed_voltage() {
        let b = battery(7600.0, 3.2);
        let x = b.initialize(&[0.4], &[20.0, 4.0]);
        let zero_noise = b.output_vector();
        let z = b.output_eqn(0.0, &x, &zero_noise);
        assert_relative_eq!(z[0], 4.0, epsilon = 1e-6);
    }

    #[test]
    fn initialized_charge_states_are_within_capacity_bounds() {
        let b = battery(7600.0, 3.2);
        let x = b.initialize(&[0.4], &[20.0, 4.0]);
        use state_index::*;
        assert!(x[QNB] >= 0.0 && x[QNB] <= b.parameters.qnb_max);
        assert!(x[QPB] >= 0.0 && x[QPB] <= b.parameters.qpb_max);
    }

    #[test]
    fn threshold_true_below_veod_false_above() {
        let b = battery(7600.0, 3.2);
        let x_low = b.initialize(&[0.3], &[20.0, 3.0]);
        assert_eq!(b.threshold_eqn(0.0, &x_low, &[0.3]), vec![true]);

        let x_high = b.initialize(&[0.4], &[20.0, 4.0]);
        assert_eq!(b.threshold_eqn(0.0, &x_high, &[0.4]), vec![false]);
    }

    #[test]
    fn discharge_drains_charge_and_voltage_monotonically() {
        let b = battery(7600.0, 3.2);
        let mut x = b.initialize(&[8.0], &[20.0, 4.0]);
        let zero_noise = b.output_vector();
        let mut last_v = b.output_eqn(0.0, &x, &zero_noise)[0];
        for step in 1..50 {
            let t = step as f64;
            x = b.state_eqn(t, &x, &[8.0], &b.state_vector(), 1.0);
            let v = b.output_eqn(t, &x, &zero_noise)[0];
            assert!(v <= last_v + 1e-9, "voltage should not increase under sustained discharge");
            last_v = v;
        }
    }

    #[test]
    fn state_and_output_eqn_are_deterministic() {
        let b = battery(7600.0, 3.2);
        let x = b.initialize(&[1.0], &[20.0, 3.7]);
        let zero_noise_state = b.state_vector();
        let x1 = b.state_eqn(0.0, &x, &[1.0], &zero_noise_state, 1.0);
        let x2 = b.state_eqn(0.0, &x, &[1.0], &zero_noise_state, 1.0);
        assert_eq!(x1, x2);
    }
}
