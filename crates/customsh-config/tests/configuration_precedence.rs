//! Layering tests: defaults, configuration file, environment, command line.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::sync::{Mutex, MutexGuard};

use once_cell::sync::Lazy;
use ortho_config::OrthoConfig;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use customsh_config::{Config, DEFAULT_WORKERS, ListenerEndpoint, LogFormat, default_listener};

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct Harness {
    temp_dir: TempDir,
    args: Vec<OsString>,
    env_overrides: Vec<(&'static str, Option<OsString>)>,
    _env_guard: MutexGuard<'static, ()>,
}

impl Harness {
    fn write_config(&mut self, toml: &str) {
        let path = self.temp_dir.path().join("customsh.toml");
        fs::write(&path, toml).expect("write configuration");
        self.args.push(OsString::from("--config-path"));
        self.args.push(path.into_os_string());
    }

    fn set_env(&mut self, key: &'static str, value: &OsStr) {
        let previous = std::env::var_os(key);
        // Environment mutation is `unsafe` on edition 2024; the harness holds
        // the environment mutex and restores every override in `Drop`.
        unsafe { std::env::set_var(key, value) };
        self.env_overrides.push((key, previous));
    }

    fn load(&self) -> Config {
        Config::load_from_iter(self.args.clone()).expect("configuration should load")
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        while let Some((key, previous)) = self.env_overrides.pop() {
            match previous {
                Some(value) => unsafe { std::env::set_var(key, value) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }
}

#[fixture]
fn harness() -> Harness {
    let guard = ENV_MUTEX
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    Harness {
        temp_dir: TempDir::new().expect("create temp dir"),
        args: vec![OsString::from("customshd")],
        env_overrides: Vec::new(),
        _env_guard: guard,
    }
}

#[rstest]
fn defaults_apply_without_overrides(harness: Harness) {
    let config = harness.load();
    assert_eq!(config.workers, DEFAULT_WORKERS);
    assert_eq!(config.log_format(), LogFormat::Json);
    assert_eq!(config.listener_endpoints(), vec![default_listener()]);
}

#[rstest]
fn file_values_are_loaded(mut harness: Harness) {
    harness.write_config(
        "workers = 3\nlog_format = \"compact\"\nlisteners = [\"unix:@from_file?netns=isolated\"]\n",
    );
    let config = harness.load();
    let expected: ListenerEndpoint = "unix:@from_file?netns=isolated"
        .parse()
        .expect("endpoint");
    assert_eq!(config.workers, 3);
    assert_eq!(config.log_format(), LogFormat::Compact);
    assert_eq!(config.listener_endpoints(), vec![expected]);
}

#[rstest]
fn environment_overrides_file(mut harness: Harness) {
    harness.write_config("workers = 3\n");
    harness.set_env("CUSTOMSH_WORKERS", OsStr::new("7"));
    let config = harness.load();
    assert_eq!(config.workers, 7);
}

#[rstest]
fn command_line_overrides_environment(mut harness: Harness) {
    harness.set_env("CUSTOMSH_WORKERS", OsStr::new("7"));
    harness.args.push(OsString::from("--workers"));
    harness.args.push(OsString::from("2"));
    let config = harness.load();
    assert_eq!(config.workers, 2);
}

#[rstest]
fn malformed_file_is_reported(mut harness: Harness) {
    harness.write_config("workers = \"many\"\n");
    let error = Config::load_from_iter(harness.args.clone()).expect_err("loading must fail");
    assert!(!error.to_string().is_empty());
}
