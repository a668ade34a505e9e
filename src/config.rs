use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    pub db_path: PathBuf,
    /// Operator ids allowed to issue commands.
    pub authorized_users: Vec<i64>,
    pub queue_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("devices.json"),
            authorized_users: Vec::new(),
            queue_depth: 32,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(Self::figment())
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("devreg.toml"))
            .merge(Json::file("devreg.json"))
            // Comma-separated lists are handled below.
            .merge(Env::prefixed("DEVREG_").ignore(&["authorized_users"]))
    }

    fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let mut config: Config = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

        if let Ok(list) = std::env::var("DEVREG_AUTHORIZED_USERS") {
            config.authorized_users = parse_user_list(&list)?;
        }

        // Support Docker-style secrets
        if let Ok(secret_file) = std::env::var("DEVREG_AUTHORIZED_USERS_FILE") {
            config.authorized_users = parse_user_list(&std::fs::read_to_string(secret_file)?)?;
        }

        Ok(config)
    }
}

/// Parse `"1, 2,3"` into ids, skipping blank entries.
fn parse_user_list(raw: &str) -> anyhow::Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|e| anyhow::anyhow!("Invalid operator id {:?}: {}", s, e))
        })
        .collect()
}
