// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use tempfile::TempDir;
use yare::parameterized;

fn write(temp: &TempDir, content: &str) -> PathBuf {
    let path = temp.path().join(CONFIG_FILE_NAME);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn missing_file_yields_defaults() {
    let temp = TempDir::new().unwrap();
    let config = Config::load(&temp.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());
    assert_eq!(config.remote.base_url, "http://localhost:8000/api");
    assert_eq!(config.probe_interval(), Duration::from_secs(30));
}

#[test]
fn empty_file_is_valid() {
    let temp = TempDir::new().unwrap();
    let config = Config::load(&write(&temp, "")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn partial_sections_keep_other_defaults() {
    let temp = TempDir::new().unwrap();
    let path = write(
        &temp,
        r#"
[remote]
base_url = "https://events.test/api"

[realtime]
url = "wss://events.test/ws/events/"
backoff = "exponential"
max_reconnect_attempts = 0

[auth]
user_id = "17"
"#,
    );
    let config = Config::load(&path).unwrap();
    assert_eq!(config.remote.base_url, "https://events.test/api");
    assert_eq!(config.remote.timeout_secs, 60);
    assert_eq!(config.auth.user_id.as_deref(), Some("17"));
    assert!(config.auth.token.is_none());

    let channel = config.channel_config();
    assert_eq!(channel.mode, ChannelMode::Auto);
    assert_eq!(channel.policy.backoff, Backoff::Exponential);
    assert_eq!(channel.policy.max_attempts, 0);
    assert_eq!(channel.policy.delay, Duration::from_millis(5_000));
    assert_eq!(channel.poll_interval, Duration::from_secs(30));
}

#[test]
fn unparseable_file_is_an_error() {
    let temp = TempDir::new().unwrap();
    let err = Config::load(&write(&temp, "[remote\nbase_url =")).unwrap_err();
    assert!(err.to_string().contains("failed to parse"));
}

#[parameterized(
    ftp_base = { "[remote]\nbase_url = \"ftp://x\"" },
    http_channel = { "[realtime]\nurl = \"http://x\"" },
    socket_without_url = { "[realtime]\nmode = \"socket\"" },
    zero_probe = { "[connectivity]\nprobe_interval_secs = 0" },
    zero_poll = { "[realtime]\npoll_interval_secs = 0" },
)]
fn invalid_configs_are_rejected(content: &str) {
    let temp = TempDir::new().unwrap();
    let err = Config::load(&write(&temp, content)).unwrap_err();
    assert!(matches!(err, Error::Config(_)), "{err}");
}

#[test]
fn save_and_reload() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join(CONFIG_FILE_NAME);
    let mut config = Config::default();
    config.realtime.url = Some("ws://localhost:8000/ws/events/".into());
    config.storage.dir = Some(temp.path().join("state"));
    config.save(&path).unwrap();

    let loaded = Config::load(&path).unwrap();
    assert_eq!(loaded, config);
    assert_eq!(loaded.storage_dir(), temp.path().join("state"));
}
