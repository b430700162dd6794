//! CSV playback feeding a config-built prognoser end to end, mirroring the
//! CLI binary's own driver loop.

use std::fs::File;
use std::io::Write;

use prognoser_rs::config::{build_prognoser, ConfigMap};
use prognoser_rs::playback::PlaybackCommunicator;

fn tank3_config() -> ConfigMap {
    let mut cfg = ConfigMap::new();
    cfg.insert("model".into(), vec!["tank3".into()]);
    cfg.insert("observer".into(), vec!["ukf".into()]);
    cfg.insert("predictor".into(), vec!["monte_carlo".into()]);
    let mut q = vec!["0.0".to_string(); 9];
    for i in 0..3 {
        q[i * 3 + i] = "1e-6".to_string();
    }
    cfg.insert("Observer.Q".into(), q);
    let mut r = vec!["0.0".to_string(); 9];
    for i in 0..3 {
        r[i * 3 + i] = "1e-4".to_string();
    }
    cfg.insert("Observer.R".into(), r);
    cfg.insert("Model.ProcessNoise".into(), vec!["0.0".into(); 3]);
    cfg.insert("Predictor.SampleCount".into(), vec!["4".into()]);
    cfg.insert("Predictor.Horizon".into(), vec!["1.0".into()]);
    cfg.insert("Predictor.loadEstimator".into(), vec!["const".into()]);
    cfg.insert("LoadEstimator.Loading".into(), vec!["1.0".into(), "1.0".into(), "1.0".into()]);
    cfg
}

#[test]
fn playback_csv_drives_the_prognoser_through_several_steps() {
    let dir = std::env::temp_dir();
    let path = dir.join(format!("prognoser_roundtrip_test_{}.csv", std::process::id()));
    {
        let mut f = File::create(&path).unwrap();
        writeln!(f, "time,u1,u2,u3,p1m,p2m,p3m").unwrap();
        for step in 0..5 {
            let t = step as f64 * 0.1;
            writeln!(f, "{t},1.0,1.0,1.0,{:.3},{:.3},{:.3}", 0.1 * t, 0.05 * t, 0.02 * t).unwrap();
        }
    }

    let cfg = tank3_config();
    let mut prognoser = build_prognoser(&cfg).unwrap();
    let mut playback = PlaybackCommunicator::open(&path).unwrap();

    let mut steps = 0;
    while let Some(row) = playback.next().unwrap() {
        prognoser.step(&row).unwrap();
        steps += 1;
    }
    assert_eq!(steps, 5);
    assert!(prognoser.is_initialized());

    std::fs::remove_file(&path).ok();
}
