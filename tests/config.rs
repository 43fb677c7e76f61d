use std::path::PathBuf;

use assert_matches::assert_matches;

use kira_assembly_fetch::config::{Config, ConfigLoader};
use kira_assembly_fetch::error::KiraError;
use kira_assembly_fetch::throttle::Throttle;

#[test]
fn command_line_overrides_file_settings() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-af.json");
    std::fs::write(
        &path,
        r#"{
            "acs": "from-file.tsv",
            "outdir": "file-out",
            "batch_size": 25,
            "folder_prefix": "batch",
            "throttle_min_ms": 0,
            "throttle_max_ms": 0
        }"#,
    )
    .unwrap();

    let file = ConfigLoader::load(path.to_str()).unwrap();
    let overrides = Config {
        outdir: Some(PathBuf::from("cli-out")),
        folder_size: Some(10),
        ..Config::default()
    };
    let resolved = ConfigLoader::resolve_config(file, overrides).unwrap();

    assert_eq!(resolved.acs, PathBuf::from("from-file.tsv"));
    assert_eq!(resolved.outdir, PathBuf::from("cli-out"));
    assert_eq!(resolved.batch_size, 25);
    assert_eq!(resolved.folder_size, 10);
    assert_eq!(resolved.folder_prefix, "batch");
    assert_eq!(resolved.throttle, Throttle::disabled());
}

#[test]
fn explicit_missing_file_is_an_error() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("absent.json");
    assert_matches!(
        ConfigLoader::load(path.to_str()),
        Err(KiraError::ConfigRead(_))
    );
}

#[test]
fn malformed_file_is_rejected() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("kira-af.json");
    std::fs::write(&path, "{ batch_size: ").unwrap();
    assert_matches!(
        ConfigLoader::load(path.to_str()),
        Err(KiraError::ConfigParse(_))
    );
}

#[test]
fn inverted_throttle_bounds_are_rejected() {
    let overrides = Config {
        acs: Some(PathBuf::from("acs.tsv")),
        outdir: Some(PathBuf::from("out")),
        throttle_min_ms: Some(500),
        throttle_max_ms: Some(100),
        ..Config::default()
    };
    assert_matches!(
        ConfigLoader::resolve_config(Config::default(), overrides),
        Err(KiraError::InvalidConfig(_))
    );
}

#[test]
fn missing_required_paths_are_reported() {
    assert_matches!(
        ConfigLoader::resolve_config(Config::default(), Config::default()),
        Err(KiraError::InvalidConfig(_))
    );
}
