use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use url::Url;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub web: WebConfig,

    #[serde(default)]
    pub client: ClientConfig,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

#[derive(Debug, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

/// Where `delete-venue` sends its request.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_db_path() -> String {
    "fyyur.db".to_string()
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_timeout() -> u64 {
    30
}

/// Load configuration from config.toml and environment variables
pub fn load() -> Result<Config, figment::Error> {
    figment().extract()
}

fn figment() -> Figment {
    Figment::new()
        .merge(Toml::file("config.toml"))
        // Use double-underscore nesting for snake_case keys
        .merge(Env::prefixed("FYYUR_").split("__"))
}

/// Validate configuration and return a user-friendly error
pub fn validate(config: &Config) -> Result<(), String> {
    if config.database.path.trim().is_empty() {
        return Err("database.path must not be empty".into());
    }

    if config.web.port == 0 {
        return Err("web.port must be greater than 0".into());
    }

    if config.client.timeout_seconds == 0 {
        return Err("client.timeout_seconds must be greater than 0".into());
    }

    match Url::parse(&config.client.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => {
            return Err(format!(
                "client.base_url must use http or https, got {}",
                url.scheme()
            ));
        }
        Err(err) => return Err(format!("client.base_url is not a valid URL: {err}")),
    }

    Ok(())
}
