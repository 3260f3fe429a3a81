//! Configuration loading and resolution tests
//!
//! Tests that touch SLOWVERB_* environment variables are marked #[serial]
//! so they do not race each other.

use serial_test::serial;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use slowverb_common::config::CONFIG_FILE_ENV;
use slowverb_server::config::ServiceConfig;
use slowverb_server::pipeline::{OverflowPolicy, TransformStrategy};

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("slowverb.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = ServiceConfig::load(Some(&dir.path().join("absent.toml"))).unwrap();
    assert_eq!(config, ServiceConfig::default());
}

#[test]
#[serial]
fn test_cli_path_is_loaded() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
        [pipeline]
        strategy = "in_process"

        [pipeline.effects]
        overflow = "saturate"
        "#,
    );

    let config = ServiceConfig::load(Some(&path)).unwrap();
    assert_eq!(config.pipeline.strategy, TransformStrategy::InProcess);
    assert_eq!(config.pipeline.effects.overflow, OverflowPolicy::Saturate);
    assert_eq!(config.pipeline.effects.decimation_factor, 2);
}

#[test]
#[serial]
fn test_env_path_used_without_cli() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "working_dir = \"/tmp/from-env-config\"\n");

    std::env::set_var(CONFIG_FILE_ENV, &path);
    let config = ServiceConfig::load(None);
    std::env::remove_var(CONFIG_FILE_ENV);

    assert_eq!(
        config.unwrap().working_dir.as_deref(),
        Some(Path::new("/tmp/from-env-config"))
    );
}

#[test]
#[serial]
fn test_unparsable_file_is_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[pipeline\nstrategy = ");
    assert!(ServiceConfig::load(Some(&path)).is_err());
}

#[test]
#[serial]
fn test_invalid_effects_fail_validation() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[pipeline.effects]\necho_gain_denominator = 0\n");
    assert!(ServiceConfig::load(Some(&path)).is_err());
}

#[tokio::test]
#[serial]
async fn test_build_orchestrator_uses_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
        [pipeline]
        strategy = "in_process"
        keep_intermediate_files = false
        transform_timeout_secs = 42
        "#,
    );
    let config = ServiceConfig::load(Some(&path)).unwrap();

    let orchestrator = config
        .build_orchestrator(dir.path(), tokio_util::sync::CancellationToken::new())
        .unwrap();

    assert_eq!(orchestrator.strategy(), TransformStrategy::InProcess);
    assert!(!orchestrator.options().keep_intermediate_files);
    assert_eq!(orchestrator.options().transform_timeout.as_secs(), 42);
}
