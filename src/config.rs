//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};
use clap::Parser;

use crate::{
    audio::{SoundLibrary, DEFAULT_SOUND},
    error::GatewayError,
    gateway::RestGateway,
    state::DEFAULT_TIMER_COUNT,
};

/// CLI argument parsing structure
#[derive(Parser, Debug)]
#[command(name = "countertop")]
#[command(about = "Shop-floor countdown timers and back-office automation")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Number of timers in the pool
    #[arg(short, long, default_value_t = DEFAULT_TIMER_COUNT)]
    pub timers: usize,

    /// Directory holding alarm clips (<id>.mp3, <id>.wav or <id>.ogg)
    #[arg(long)]
    pub sounds_dir: Option<PathBuf>,

    /// Sound every timer starts with
    #[arg(long, default_value = DEFAULT_SOUND)]
    pub default_sound: String,

    /// Base URL of the hosted database
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// API key for the hosted database
    #[arg(long, env = "DATABASE_KEY", hide_env_values = true)]
    pub database_key: Option<String>,

    /// Hours between monthly-expense triggers (0 disables the schedule)
    #[arg(long, default_value = "24")]
    pub expenses_every_hours: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    pub fn sound_library(&self) -> SoundLibrary {
        match &self.sounds_dir {
            Some(dir) => SoundLibrary::new(dir),
            None => SoundLibrary::headless(),
        }
    }

    /// Database client, or `None` when no URL is configured
    pub fn gateway(&self) -> Result<Option<RestGateway>, GatewayError> {
        self.database_url
            .as_ref()
            .map(|url| RestGateway::new(url.as_str(), self.database_key.clone()))
            .transpose()
    }

    /// Period of the monthly-expense schedule, if enabled
    pub fn expenses_period(&self) -> Option<Duration> {
        (self.expenses_every_hours > 0)
            .then(|| Duration::from_secs(self.expenses_every_hours * 3600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["countertop"]).unwrap();
        assert_eq!(config.timers, 6);
        assert_eq!(config.default_sound, "alarm");
        assert_eq!(config.address(), "0.0.0.0:20554");
        assert_eq!(config.log_level(), "info");
        assert_eq!(config.expenses_period(), Some(Duration::from_secs(86_400)));
        assert!(config.sound_library().dir().is_none());
    }

    #[test]
    fn schedule_can_be_disabled() {
        let config =
            Config::try_parse_from(["countertop", "--expenses-every-hours", "0", "-v"]).unwrap();
        assert_eq!(config.expenses_period(), None);
        assert_eq!(config.log_level(), "debug");
    }

    #[test]
    fn gateway_follows_database_url() {
        let config = Config::try_parse_from([
            "countertop",
            "--database-url",
            "https://db.example.com/",
            "--database-key",
            "k",
        ])
        .unwrap();
        let gateway = config.gateway().unwrap().unwrap();
        assert_eq!(gateway.base_url(), "https://db.example.com");
    }
}
