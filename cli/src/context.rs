use std::time::Duration;

use task_api::Client;

use crate::config::Config;

pub struct Context {
    /// Client for the orchestration API.
    pub client: Client,
    /// Interval `watch` uses unless told otherwise.
    pub poll_interval: Duration,
    /// Print JSON instead of human-readable text.
    pub json: bool,
}

impl Context {
    pub fn from_config(config: &Config, json: bool) -> anyhow::Result<Self> {
        let api_url = config.api_url()?;
        log::debug!("Using orchestration API at {api_url}");
        Ok(Self {
            client: Client::new(api_url, config.api_token())?,
            poll_interval: config.poll_interval(),
            json,
        })
    }

    /// Prints `value` as pretty JSON.
    pub fn print_json<T: serde::Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}
