use super::{load_settings_from, normalize_database_url, Settings};

use std::{collections::HashMap, fs};

fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |name| vars.get(name).cloned()
}

#[test]
fn defaults_apply_without_file_or_environment() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("bridge");

    let settings = load_settings_from(file.to_str().expect("utf8 path"), env(&[])).expect("load");
    assert_eq!(settings, Settings::default());
    assert_eq!(settings.irc_bind(), "0.0.0.0:6060");
    assert_eq!(settings.public_url(), "http://localhost:3000");
}

#[test]
fn legacy_variables_set_ports_and_host() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("bridge");

    let settings = load_settings_from(
        file.to_str().expect("utf8 path"),
        env(&[
            ("HOST", "chat.example.org"),
            ("IRC_SERVER_PORT", "7000"),
            ("FILE_SERVER_PORT", "8080"),
            ("DATABASE_URL", "  "),
        ]),
    )
    .expect("load");

    assert_eq!(settings.irc_port, 7000);
    assert_eq!(settings.file_server_bind(), "0.0.0.0:8080");
    assert_eq!(settings.public_url(), "http://chat.example.org:8080");
    assert_eq!(settings.database_url, Settings::default().database_url);
}

#[test]
fn config_file_wins_over_legacy_variables() {
    let dir = tempfile::tempdir().expect("tempdir");
    fs::write(
        dir.path().join("bridge.toml"),
        "irc_port = 7100\npublic_url = \"https://files.example.org/\"\ndatabase_url = \"./state/bridge.db\"\n",
    )
    .expect("write config");
    let file = dir.path().join("bridge");

    let settings = load_settings_from(
        file.to_str().expect("utf8 path"),
        env(&[("IRC_SERVER_PORT", "7000")]),
    )
    .expect("load");

    assert_eq!(settings.irc_port, 7100);
    assert_eq!(settings.public_url(), "https://files.example.org/");
    assert_eq!(settings.database_url, "sqlite://./state/bridge.db");
}

#[test]
fn normalizes_plain_file_path_to_sqlite_url() {
    assert_eq!(
        normalize_database_url("./data/test.db"),
        "sqlite://./data/test.db"
    );
    assert_eq!(
        normalize_database_url("sqlite::memory:"),
        "sqlite::memory:"
    );
    assert_eq!(
        normalize_database_url(""),
        Settings::default().database_url
    );
}
