use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;

/// Plain variables older deployments set, mapped onto settings keys.
const LEGACY_ENV: [(&str, &str); 4] = [
    ("host", "HOST"),
    ("file_server_port", "FILE_SERVER_PORT"),
    ("irc_port", "IRC_SERVER_PORT"),
    ("database_url", "DATABASE_URL"),
];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Name the file server is reachable under from IRC clients.
    pub host: String,
    pub irc_port: u16,
    pub file_server_port: u16,
    pub api_bind: String,
    pub database_url: String,
    pub files_dir: String,
    pub public_url: Option<String>,
    pub event_queue_capacity: usize,
    pub persist_queue_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            irc_port: 6060,
            file_server_port: 3000,
            api_bind: "127.0.0.1:6061".into(),
            database_url: "sqlite://./db/users.db".into(),
            files_dir: "files".into(),
            public_url: None,
            event_queue_capacity: 256,
            persist_queue_capacity: 1024,
        }
    }
}

impl Settings {
    pub fn irc_bind(&self) -> String {
        format!("0.0.0.0:{}", self.irc_port)
    }

    pub fn file_server_bind(&self) -> String {
        format!("0.0.0.0:{}", self.file_server_port)
    }

    pub fn public_url(&self) -> String {
        self.public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.file_server_port))
    }
}

pub fn load_settings() -> anyhow::Result<Settings> {
    load_settings_from("bridge", |name| std::env::var(name).ok())
}

/// Defaults, then the legacy variables, then `<file>.toml`, then `APP__*`.
pub fn load_settings_from(
    file: &str,
    legacy_env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut builder = Config::builder();
    for (key, name) in LEGACY_ENV {
        if let Some(value) = legacy_env(name).filter(|value| !value.trim().is_empty()) {
            builder = builder
                .set_default(key, value)
                .with_context(|| format!("invalid value in {name}"))?;
        }
    }

    let mut settings: Settings = builder
        .add_source(File::with_name(file).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("failed to read configuration")?
        .try_deserialize()
        .context("invalid configuration")?;

    settings.database_url = normalize_database_url(&settings.database_url);
    Ok(settings)
}

pub fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite:") || raw_database_url.contains("://") {
        return raw_database_url.to_string();
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
