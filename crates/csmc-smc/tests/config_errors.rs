mod common;

use std::io::Write;

use common::{config, MismatchOracle};
use csmc_core::CsmcError;
use csmc_smc::{run_with_oracle, RateLaw, RunConfig, Sampler};

#[test]
fn zero_particles_is_an_input_error() {
    let err = Sampler::new(&config(0, 1), MismatchOracle::shared(&['A', 'C'])).unwrap_err();
    assert!(matches!(err, CsmcError::Input(_)));
    assert_eq!(err.info().code, "empty-population");
}

#[test]
fn single_tip_is_an_input_error() {
    let err = run_with_oracle(&config(4, 1), MismatchOracle::shared(&['A'])).unwrap_err();
    assert!(matches!(err, CsmcError::Input(_)));
    assert_eq!(err.info().code, "too-few-tips");
}

#[test]
fn invalid_model_is_a_config_error() {
    let mut cfg = config(4, 1);
    cfg.model.category_rates = vec![1.0, -2.0];
    let err = Sampler::new(&cfg, MismatchOracle::shared(&['A', 'C'])).unwrap_err();
    assert!(matches!(err, CsmcError::Config(_)));
    assert_eq!(err.info().code, "model-categories");
}

#[test]
fn yaml_file_round_trips_through_load() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "particles: 64\nseed_policy:\n  master_seed: 5\n  label: nightly\nrate_law: stirling\nmodel:\n  frequencies: [0.25, 0.25, 0.25, 0.25]\n  category_rates: [1.0]\n"
    )
    .unwrap();
    let config = RunConfig::load(file.path()).unwrap();
    assert_eq!(config.particles, 64);
    assert_eq!(config.seed_policy.master_seed, 5);
    assert_eq!(config.seed_policy.label.as_deref(), Some("nightly"));
    assert_eq!(config.rate_law, RateLaw::Stirling);
    assert_eq!(config.model.category_rates, vec![1.0]);
    assert!((config.ess_warning_fraction - 0.1).abs() < 1e-12);
    config.validate().unwrap();
}

#[test]
fn malformed_yaml_names_the_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "particles: [oops").unwrap();
    let err = RunConfig::load(file.path()).unwrap_err();
    assert!(matches!(err, CsmcError::Config(_)));
    assert_eq!(err.info().code, "config-parse");
    assert!(err.info().context.contains_key("path"));
}
