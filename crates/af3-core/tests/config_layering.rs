//! 配置分层加载集成测试
//!
//! 验证默认值 → TOML 文件的合并顺序，以及缺失文件的容忍行为。

use af3_core::config::{
    CommonConfig, ConfigLoadOptions, ConfigLoader, ConfigSource,
};
use std::io::Write;
use tempfile::tempdir;

fn write_config(dir: &tempfile::TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("node.toml");
    let mut file = std::fs::File::create(&path).expect("create config file");
    file.write_all(contents.as_bytes()).expect("write config");
    path
}

#[test]
fn test_defaults_only() {
    let cfg: CommonConfig = ConfigLoader::new()
        .add_source(ConfigSource::Defaults)
        .load()
        .expect("load defaults");

    assert_eq!(cfg.registry.url, "https://chat.nanda-registry.com:6900");
    assert_eq!(cfg.registry.poll_interval_sec, 30);
    assert_eq!(cfg.telemetry.log_level, "info");
}

#[test]
fn test_file_overrides_defaults() {
    let dir = tempdir().expect("tempdir");
    let path = write_config(
        &dir,
        r#"
[registry]
url = "https://registry.internal:6900"
poll_interval_sec = 5

[telemetry]
log_level = "debug"
"#,
    );

    let cfg: CommonConfig = ConfigLoader::new()
        .add_source(ConfigSource::Defaults)
        .add_source(ConfigSource::File(path))
        .load()
        .expect("load layered config");

    assert_eq!(cfg.registry.url, "https://registry.internal:6900");
    assert_eq!(cfg.registry.poll_interval_sec, 5);
    // 文件未覆盖的字段保持默认值
    assert_eq!(cfg.registry.heartbeat_interval_sec, 15);
    assert_eq!(cfg.telemetry.log_level, "debug");
}

#[test]
fn test_missing_file_is_tolerated() {
    let cfg: CommonConfig = ConfigLoader::new()
        .add_source(ConfigSource::Defaults)
        .add_source(ConfigSource::File("/nonexistent/node.toml".into()))
        .load()
        .expect("missing file should fall back to defaults");

    assert_eq!(cfg.registry.url, "https://chat.nanda-registry.com:6900");
}

#[test]
fn test_missing_file_fails_when_required() {
    let result: Result<CommonConfig, _> = ConfigLoader::new()
        .add_source(ConfigSource::Defaults)
        .add_source(ConfigSource::File("/nonexistent/node.toml".into()))
        .with_options(ConfigLoadOptions {
            validate: true,
            fail_on_missing_file: true,
        })
        .load();

    assert!(result.is_err());
}

#[test]
fn test_invalid_file_values_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let path = write_config(
        &dir,
        r#"
[registry]
mode = "carrier-pigeon"
"#,
    );

    let result: Result<CommonConfig, _> = ConfigLoader::new()
        .add_source(ConfigSource::Defaults)
        .add_source(ConfigSource::File(path))
        .load();

    assert!(result.is_err());
}
