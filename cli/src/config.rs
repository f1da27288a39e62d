use std::path::PathBuf;
use std::time::Duration;
use std::{env, fs};

use anyhow::anyhow;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use url::Url;

static DEFAULT_API_URL: Lazy<Url> = Lazy::new(|| {
    Url::parse("http://localhost:8000").expect("Failed to parse default orchestration API URL")
});

const API_URL_ENV: &str = "CONDUCTOR_API_URL";
const API_TOKEN_ENV: &str = "CONDUCTOR_API_TOKEN";

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the orchestration server.
    pub api_url: Option<Url>,
    /// Bearer token sent with every request.
    pub api_token: Option<String>,
    /// Default interval for `conductor watch`.
    pub poll_interval_ms: Option<u64>,
}

impl Config {
    pub fn load_or_create() -> anyhow::Result<Self> {
        match Self::load() {
            Ok(config) => Ok(config),
            Err(err) => {
                log::debug!("Using default config: {err}");
                let config = Self::default();
                config.save()?;
                Ok(config)
            }
        }
    }

    pub fn load() -> anyhow::Result<Self> {
        let text = fs::read_to_string(Self::filepath()?)?;
        let config = toml::from_str(&text)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let text = toml::to_string(self)?;
        let path = Self::filepath()?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, text)?;
        Ok(())
    }

    pub fn filepath() -> anyhow::Result<PathBuf> {
        Ok(dirs::config_dir()
            .ok_or(anyhow!("Failed to locate appropriate config directory"))?
            .join("conductor")
            .join("config.toml"))
    }

    pub fn api_url(&self) -> anyhow::Result<Url> {
        self.api_url_with(|key| env::var(key).ok())
    }

    pub fn api_token(&self) -> Option<String> {
        self.api_token_with(|key| env::var(key).ok())
    }

    pub fn poll_interval(&self) -> Duration {
        match self.poll_interval_ms {
            Some(ms) if ms > 0 => Duration::from_millis(ms),
            _ => task_api::poll::DEFAULT_POLL_INTERVAL,
        }
    }

    fn api_url_with(&self, env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Url> {
        if let Some(raw) = env(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            return Url::parse(raw.trim())
                .map_err(|err| anyhow!("Invalid {API_URL_ENV} value {raw:?}: {err}"));
        }
        Ok(self
            .api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.clone()))
    }

    fn api_token_with(&self, env: impl Fn(&str) -> Option<String>) -> Option<String> {
        env(API_TOKEN_ENV)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.api_token.clone())
    }
}

/// Hides all but the last four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if secret.chars().count() <= 4 {
        "*".repeat(secret.chars().count())
    } else {
        format!("****{visible}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn falls_back_to_local_server() {
        let config = Config::default();
        assert_eq!(
            config.api_url_with(no_env).unwrap().as_str(),
            "http://localhost:8000/"
        );
        assert_eq!(config.poll_interval(), Duration::from_millis(3000));
    }

    #[test]
    fn environment_wins_over_file() {
        let config = Config {
            api_url: Some(Url::parse("https://file.example.com").unwrap()),
            api_token: Some("from-file".into()),
            poll_interval_ms: Some(500),
        };
        let env = |key: &str| match key {
            API_URL_ENV => Some("https://env.example.com/".to_owned()),
            API_TOKEN_ENV => Some("from-env".to_owned()),
            _ => None,
        };
        assert_eq!(
            config.api_url_with(env).unwrap().as_str(),
            "https://env.example.com/"
        );
        assert_eq!(config.api_token_with(env).as_deref(), Some("from-env"));
        assert_eq!(config.api_token_with(no_env).as_deref(), Some("from-file"));
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn rejects_malformed_url_from_environment() {
        let env = |_: &str| Some("not a url".to_owned());
        assert!(Config::default().api_url_with(env).is_err());
    }

    #[test]
    fn zero_interval_uses_default() {
        let config = Config {
            poll_interval_ms: Some(0),
            ..Config::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(3000));
    }

    #[test]
    fn masks_secrets() {
        assert_eq!(mask_secret("abcdefgh"), "****efgh");
        assert_eq!(mask_secret("abc"), "***");
    }

    #[test]
    fn parses_partial_config_file() {
        let config: Config = toml::from_str("api_url = \"https://api.example.com\"\n").unwrap();
        assert!(config.api_token.is_none());
        assert_eq!(config.api_url.unwrap().host_str(), Some("api.example.com"));
    }
}
