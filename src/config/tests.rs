use super::load_config;
use super::settings::Settings;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

/// Run `f` with `dir` as the working directory, restoring it afterwards.
fn in_dir<T>(dir: &std::path::Path, f: impl FnOnce() -> T) -> T {
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(dir).expect("set current dir");
    let out = f();
    env::set_current_dir(orig).expect("restore cwd");
    out
}

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 8080);
    assert_eq!(settings.server.idle_timeout_secs, 60);
    assert!(settings.server.tcp_nodelay);
    assert!(settings.server.close_on_malformed);
    assert_eq!(settings.broker.max_connections, 1000);
    assert_eq!(settings.broker.rot13sort_workers, 4);
    assert_eq!(settings.broker.sumall_workers, 4);
    assert_eq!(settings.logging.level, "info");
    assert_eq!(settings.bind_addr(), "127.0.0.1:8080");
}

#[test]
#[serial]
fn test_load_config_without_sources_uses_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    let cfg = in_dir(tmp.path(), load_config).expect("load_config failed");
    assert_eq!(cfg, Settings::default());
}

#[test]
#[serial]
fn test_load_config_from_file_overrides_defaults() {
    let tmp = TempDir::new().expect("create tempdir");
    fs::create_dir_all(tmp.path().join("config")).expect("create config dir");
    let toml = r#"
        [server]
        host = "0.0.0.0"
        port = 9000
        idle_timeout_secs = 5

        [broker]
        sumall_workers = 2
    "#;
    fs::write(tmp.path().join("config/default.toml"), toml).expect("write config file");

    let cfg = in_dir(tmp.path(), load_config).expect("load_config failed");
    assert_eq!(cfg.server.host, "0.0.0.0");
    assert_eq!(cfg.server.port, 9000);
    assert_eq!(cfg.server.idle_timeout_secs, 5);
    assert!(cfg.server.tcp_nodelay);
    assert_eq!(cfg.broker.sumall_workers, 2);
    assert_eq!(cfg.broker.rot13sort_workers, 4);
}

#[test]
#[serial]
fn test_environment_overrides_file() {
    let tmp = TempDir::new().expect("create tempdir");
    fs::create_dir_all(tmp.path().join("config")).expect("create config dir");
    fs::write(
        tmp.path().join("config/default.toml"),
        "[server]\nport = 9000\n",
    )
    .expect("write config file");

    let cfg = temp_env::with_vars(
        [
            ("SUBCAST__SERVER__PORT", Some("9100")),
            ("SUBCAST__BROKER__ROT13SORT_WORKERS", Some("1")),
            ("SUBCAST__LOGGING__LEVEL", Some("debug")),
        ],
        || in_dir(tmp.path(), load_config),
    )
    .expect("load_config failed");

    assert_eq!(cfg.server.port, 9100);
    assert_eq!(cfg.broker.rot13sort_workers, 1);
    assert_eq!(cfg.logging.level, "debug");
}
