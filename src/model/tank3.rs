//! Three interconnected tanks, linear mass-balance dynamics discretised by
//! explicit Euler. Same state/constraint structure and parameter names as
//! the textbook three-tank benchmark.

use super::Model;

/// Tank3 parameters: flow resistances `R*` and capacitances `K*`.
#[derive(Debug, Clone, Copy)]
pub struct Tank3Parameters {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub r1c2: f64,
    pub r2c3: f64,
}

impl Default for Tank3Parameters {
    fn default() -> Self {
        Tank3Parameters {
            k1: 1.0,
            k2: 1.0,
            k3: 1.0,
            r1: 1.0,
            r2: 1.0,
            r3: 1.0,
            r1c2: 1.0,
            r2c3: 1.0,
        }
    }
}

/// Three tanks with cross-flow between adjacent pairs. States are the
/// masses `m1, m2, m3`; inputs are the inflows `u1, u2, u3`; outputs are
/// the pressures `p1m, p2m, p3m`.
#[derive(Debug, Clone)]
pub struct Tank3 {
    pub parameters: Tank3Parameters,
    dt: f64,
}

const INPUT_NAMES: [&str; 3] = ["u1", "u2", "u3"];
const OUTPUT_NAMES: [&str; 3] = ["p1m", "p2m", "p3m"];

impl Tank3 {
    pub fn new(parameters: Tank3Parameters, dt: f64) -> Self {
        Tank3 { parameters, dt }
    }
}

impl Default for Tank3 {
    fn default() -> Self {
        Tank3::new(Tank3Parameters::default(), 1.0)
    }
}

impl Model for Tank3 {
    fn state_len(&self) -> usize {
        3
    }
    fn input_len(&self) -> usize {
        3
    }
    fn output_len(&self) -> usize {
        3
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

    fn initialize(&self, _u: &[f64], _z: &[f64]) -> Vec<f64> {
        vec![0.0, 0.0, 0.0]
    }

    fn state_eqn(&self, _t: f64, x: &[f64], u: &[f64], n: &[f64], dt: f64) -> Vec<f64> {
        let p = &self.parameters;
        let m1 = x[0];
        let m2 = x[1];
        let m3 = x[2];
        let u1 = u[0];
        let u2 = u[1];
        let u3 = u[2];

        let p3 = m3 / p.k3;
        let p1 = m1 / p.k1;
        let q3 = p3 / p.r3;
        let p2 = m2 / p.k2;
        let q2c3 = (p2 - p3) / p.r2c3;
        let q2 = p2 / p.r2;
        let q1c2 = (p1 - p2) / p.r1c2;
        let m3dot = q2c3 - q3 + u3;
        let q1 = p1 / p.r1;
        let m2dot = q1c2 - q2 - q2c3 + u2;
        let m1dot = -q1 - q1c2 + u1;

        vec![
            m1 + m1dot * dt + n.first().copied().unwrap_or(0.0),
            m2 + m2dot * dt + n.get(1).copied().unwrap_or(0.0),
            m3 + m3dot * dt + n.get(2).copied().unwrap_or(0.0),
        ]
    }

    fn output_eqn(&self, _t: f64, x: &[f64], n: &[f64]) -> Vec<f64> {
        let p = &self.parameters;
        let m1 = x[0];
        let m2 = x[1];
        let m3 = x[2];
        vec![
            m1 / p.k1 + n.first().copied().unwrap_or(0.0),
            m2 / p.k2 + n.get(1).copied().unwrap_or(0.0),
            m3 / p.k3 + n.get(2).copied().unwrap_or(0.0),
        ]
    }
}
