// tests/contract_config.rs
//
// The checked-in config files must stay in step with the built-in defaults,
// so a missing file and a fresh checkout behave the same.

use std::path::Path;

use paddock_pub_chat::{PipelineConfig, PipelineContract};

#[test]
fn shipped_contract_matches_builtin() {
    let loaded = PipelineContract::load_from(Path::new("config/contract.toml")).expect("contract.toml");
    assert_eq!(loaded, PipelineContract::paddock_default());
    assert!(loaded.validate().is_ok());
}

#[test]
fn shipped_pipeline_config_matches_defaults() {
    let loaded = PipelineConfig::load_from(Path::new("config/pipeline.toml")).expect("pipeline.toml");
    assert_eq!(loaded, PipelineConfig::default());
    assert_eq!(loaded.feeds.len(), 6);
    assert_eq!(loaded.persist.kind, "none");
    assert!(loaded.schedule_interval_secs.is_none());
}

#[test]
fn missing_contract_falls_back_to_builtin() {
    let tmp = tempfile::tempdir().unwrap();
    let c = PipelineContract::load_or_default(&tmp.path().join("nope.toml")).unwrap();
    assert_eq!(c, PipelineContract::paddock_default());
}

#[test]
fn invalid_contract_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let p = tmp.path().join("contract.toml");
    std::fs::write(&p, "this is = = not toml").unwrap();
    assert!(PipelineContract::load_or_default(&p).is_err());
}
