//! TOML-backed configuration and factory functions: `ConfigMap` -> a
//! concrete `Prognoser`, the way a scenario file drives the CLI.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::{PrognosticsError, Result};
use crate::load_estimator::{AnyLoadEstimator, ConstLoad, MovingAverage};
use crate::matrix::Matrix;
use crate::model::battery::{Battery, BatteryParameters};
use crate::model::tank3::{Tank3, Tank3Parameters};
use crate::model::AnyModel;
use crate::observer::particle_filter::{ParticleFilter, ParticleFilterParameters};
use crate::observer::ukf::{Ukf, UkfParameters};
use crate::observer::AnyObserver;
use crate::predictor::monte_carlo::{MonteCarlo, MonteCarloParameters};
use crate::prognoser::Prognoser;

/// A string-keyed, string-list-valued configuration, as parsed from a TOML
/// scenario file. Every value is kept as a string vector so a single key
/// can hold either a scalar or a row-major matrix dump.
pub type ConfigMap = HashMap<String, Vec<String>>;

/// Loads a TOML file at `path` into a flat `ConfigMap`. Nested tables are
/// flattened into dotted keys (`Observer.Q`, `Model.ProcessNoise`).
pub fn load_config_map(path: &Path) -> Result<ConfigMap> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .build()
        .map_err(|e| PrognosticsError::Config(e.to_string()))?;
    let raw: HashMap<String, config::Value> = settings
        .try_deserialize()
        .map_err(|e| PrognosticsError::Config(e.to_string()))?;
    flatten(&raw, "")
}

fn flatten(table: &HashMap<String, config::Value>, prefix: &str) -> Result<ConfigMap> {
    let mut out = ConfigMap::new();
    for (k, v) in table {
        let key = if prefix.is_empty() {
            k.clone()
        } else {
            format!("{prefix}.{k}")
        };
        match v.clone().into_table() {
            Ok(nested) => out.extend(flatten(&nested, &key)?),
            Err(_) => {
                out.insert(key, value_to_strings(v)?);
            }
        }
    }
    Ok(out)
}

fn value_to_strings(v: &config::Value) -> Result<Vec<String>> {
    if let Ok(arr) = v.clone().into_array() {
        arr.iter()
            .map(|item| item.clone().into_string().map_err(|e| PrognosticsError::Config(e.to_string())))
            .collect()
    } else {
        v.clone()
            .into_string()
            .map(|s| vec![s])
            .map_err(|e| PrognosticsError::Config(e.to_string()))
    }
}

fn get_strings<'a>(cfg: &'a ConfigMap, key: &str) -> Result<&'a [String]> {
    cfg.get(key)
        .map(|v| v.as_slice())
        .ok_or_else(|| PrognosticsError::Config(format!("missing required key {key}")))
}

fn get_string<'a>(cfg: &'a ConfigMap, key: &str) -> Result<&'a str> {
    let v = get_strings(cfg, key)?;
    v.first()
        .map(|s| s.as_str())
        .ok_or_else(|| PrognosticsError::Config(format!("{key} must have at least one value")))
}

fn get_f64(cfg: &ConfigMap, key: &str) -> Result<f64> {
    get_string(cfg, key)?
        .parse()
        .map_err(|_| PrognosticsError::Config(format!("{key} is not a number")))
}

fn get_usize(cfg: &ConfigMap, key: &str) -> Result<usize> {
    get_string(cfg, key)?
        .parse()
        .map_err(|_| PrognosticsError::Config(format!("{key} is not a non-negative integer")))
}

fn get_f64_vec(cfg: &ConfigMap, key: &str) -> Result<Vec<f64>> {
    get_strings(cfg, key)?
        .iter()
        .map(|s| s.parse::<f64>().map_err(|_| PrognosticsError::Config(format!("{key} contains a non-numeric entry"))))
        .collect()
}

fn get_f64_vec_opt(cfg: &ConfigMap, key: &str) -> Result<Option<Vec<f64>>> {
    if cfg.contains_key(key) {
        Ok(Some(get_f64_vec(cfg, key)?))
    } else {
        Ok(None)
    }
}

fn square_matrix(values: Vec<f64>, key: &str) -> Result<Matrix> {
    let n = (values.len() as f64).sqrt().round() as usize;
    if n * n != values.len() {
        return Err(PrognosticsError::Config(format!("{key} is not a square row-major matrix")));
    }
    Matrix::from_row_major(n, n, values)
}

/// Builds the concrete model named by the `model` key (`"tank3"` or
/// `"battery"`).
pub fn build_model(cfg: &ConfigMap) -> Result<AnyModel> {
    match get_string(cfg, "model")? {
        "tank3" => {
            let dt = cfg.get("Model.dt").map(|_| get_f64(cfg, "Model.dt")).transpose()?.unwrap_or(1.0);
            Ok(AnyModel::Tank3(Tank3::new(Tank3Parameters::default(), dt)))
        }
        "battery" => {
            let dt = cfg.get("Model.dt").map(|_| get_f64(cfg, "Model.dt")).transpose()?.unwrap_or(1.0);
            let q_mobile = cfg
                .get("Model.QMobile")
                .map(|_| get_f64(cfg, "Model.QMobile"))
                .transpose()?
                .unwrap_or(7600.0);
            Ok(AnyModel::Battery(Battery::new(BatteryParameters::new(q_mobile), dt)))
        }
        other => Err(PrognosticsError::Config(format!("unknown model {other}"))),
    }
}

/// Builds the observer named by the `observer` key (`"ukf"` or
/// `"particle_filter"`) bound to `model`.
pub fn build_observer(cfg: &ConfigMap, model: Arc<AnyModel>) -> Result<AnyObserver<AnyModel>> {
    match get_string(cfg, "observer")? {
        "ukf" => {
            let q = square_matrix(get_f64_vec(cfg, "Observer.Q")?, "Observer.Q")?;
            let r = square_matrix(get_f64_vec(cfg, "Observer.R")?, "Observer.R")?;
            let ukf = Ukf::new(model, q, r, UkfParameters::default())?;
            Ok(AnyObserver::Ukf(ukf))
        }
        "particle_filter" => {
            let params = ParticleFilterParameters {
                num_particles: get_usize(cfg, "Observer.ParticleCount")?,
                process_noise_variance: get_f64_vec(cfg, "Observer.ProcessNoise")?,
                sensor_noise_variance: get_f64_vec(cfg, "Observer.SensorNoise")?,
                min_effective_fraction: get_f64(cfg, "Observer.MinEffective")?,
                seed: cfg.get("Observer.Seed").map(|_| get_usize(cfg, "Observer.Seed")).transpose()?.unwrap_or(0) as u64,
            };
            Ok(AnyObserver::ParticleFilter(ParticleFilter::new(model, params)?))
        }
        other => Err(PrognosticsError::Config(format!("unknown observer {other}"))),
    }
}

/// Builds the load estimator named by the `Predictor.loadEstimator` key
/// (`"const"` or `"moving_average"`).
pub fn build_load_estimator(cfg: &ConfigMap) -> Result<AnyLoadEstimator> {
    match get_string(cfg, "Predictor.loadEstimator")? {
        "const" => {
            let mean = get_f64_vec(cfg, "LoadEstimator.Loading")?;
            let std_dev = get_f64_vec_opt(cfg, "LoadEstimator.StdDev")?;
            let seed = cfg.get("LoadEstimator.Seed").map(|_| get_usize(cfg, "LoadEstimator.Seed")).transpose()?.unwrap_or(0) as u64;
            Ok(AnyLoadEstimator::Const(ConstLoad::new(mean, std_dev, seed)?))
        }
        "moving_average" => {
            let window = get_usize(cfg, "MovingAverage.WindowSize")?;
            Ok(AnyLoadEstimator::MovingAverage(MovingAverage::new(window)?))
        }
        other => Err(PrognosticsError::Config(format!("unknown load estimator {other}"))),
    }
}

/// Builds the Monte Carlo predictor named by the `predictor` key (only
/// `"monte_carlo"` is recognised).
pub fn build_predictor(
    cfg: &ConfigMap,
    model: Arc<AnyModel>,
    load_estimator: AnyLoadEstimator,
) -> Result<MonteCarlo<AnyModel, AnyLoadEstimator>> {
    match get_string(cfg, "predictor")? {
        "monte_carlo" => {
            let process_noise_variance = get_f64_vec(cfg, "Model.ProcessNoise")?;
            let interval = cfg.get("Predictor.Interval").map(|_| get_f64(cfg, "Predictor.Interval")).transpose()?.unwrap_or(1.0);
            let params = MonteCarloParameters {
                num_samples: get_usize(cfg, "Predictor.SampleCount")?,
                horizon: get_f64(cfg, "Predictor.Horizon")?,
                interval,
                process_noise_variance,
                seed: cfg.get("Predictor.Seed").map(|_| get_usize(cfg, "Predictor.Seed")).transpose()?.unwrap_or(0) as u64,
            };
            MonteCarlo::new(model, load_estimator, params)
        }
        other => Err(PrognosticsError::Config(format!("unknown predictor {other}"))),
    }
}

/// Builds an entire pipeline from one `ConfigMap`, the way the CLI wires a
/// scenario file in one call.
pub fn build_prognoser(
    cfg: &ConfigMap,
) -> Result<Prognoser<AnyModel, AnyObserver<AnyModel>, MonteCarlo<AnyModel, AnyLoadEstimator>, AnyLoadEstimator>> {
    let model = Arc::new(build_model(cfg)?);
    let observer = build_observer(cfg, model.clone())?;
    let load_estimator = build_load_estimator(cfg)?;
    let predictor_load_estimator = load_estimator.clone();
    let predictor = build_predictor(cfg, model.clone(), predictor_load_estimator)?;
    Ok(Prognoser::new((*model).clone(), observer, predictor, load_estimator))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tank3_cfg() -> ConfigMap {
        let mut cfg = ConfigMap::new();
        cfg.insert("model".into(), vec!["tank3".into()]);
        cfg.insert("observer".into(), vec!["ukf".into()]);
        cfg.insert("predictor".into(), vec!["monte_carlo".into()]);
        cfg.insert(
            "Observer.Q".into(),
            (0..9).map(|i| if i % 4 == 0 { "1e-6" } else { "0.0" }.to_string()).collect(),
        );
        cfg.insert(
            "Observer.R".into(),
            (0..9).map(|i| if i % 4 == 0 { "1e-3" } else { "0.0" }.to_string()).collect(),
        );
        cfg.insert("Model.ProcessNoise".into(), vec!["0.0".into(), "0.0".into(), "0.0".into()]);
        cfg.insert("Predictor.SampleCount".into(), vec!["5".into()]);
        cfg.insert("Predictor.Horizon".into(), vec!["10.0".into()]);
        cfg.insert("Predictor.loadEstimator".into(), vec!["const".into()]);
        cfg.insert("LoadEstimator.Loading".into(), vec!["1.0".into(), "1.0".into(), "1.0".into()]);
        cfg
    }

    #[test]
    fn builds_a_full_pipeline_from_a_config_map() {
        let cfg = tank3_cfg();
        let prognoser = build_prognoser(&cfg);
        assert!(prognoser.is_ok());
    }

    #[test]
    fn missing_required_key_fails_with_config_error() {
        let mut cfg = tank3_cfg();
        cfg.remove("Predictor.Horizon");
        assert!(matches!(build_prognoser(&cfg), Err(PrognosticsError::Config(_))));
    }

    #[test]
    fn unknown_model_name_is_rejected() {
        let mut cfg = tank3_cfg();
        cfg.insert("model".into(), vec!["unobtanium".into()]);
        assert!(matches!(build_model(&cfg), Err(PrognosticsError::Config(_))));
    }
}
