use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use eyre::Result;
use serde::Deserialize;
use ticket_market_core::Config;
use tracing::info;

const SETTINGS_FILE: &str = "market.toml";

/// Settings read from `market.toml`
///
/// The file is looked up in the working directory and its ancestors. Every
/// field is optional; command line flags override what the file says.
#[derive(Clone, Deserialize, Default, Debug)]
#[serde(rename_all = "kebab-case", default)]
pub struct MarketSettings {
    /// Directory the settings file was found in
    #[serde(skip)]
    pub settings_root: Option<PathBuf>,

    pub host: Option<String>,
    pub port: Option<u16>,
    pub handler_threads: Option<u32>,
    pub status_interval_ms: Option<u64>,
    /// JSON file backing the configuration store
    pub config_store: Option<PathBuf>,

    /// Initial market configuration
    pub market: Config,
}

impl MarketSettings {
    pub fn load() -> Result<Self> {
        let mut path = std::env::current_dir()?;
        let contents = loop {
            path.push(SETTINGS_FILE);

            match std::fs::read_to_string(&path) {
                Ok(s) => break Some(s),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }

            path.pop();
            if !path.pop() {
                break None;
            }
        };

        let mut settings = match contents {
            Some(contents) => {
                info!(path = %path.display(), "loaded settings");
                path.pop();
                let mut settings: MarketSettings = toml::from_str(&contents)?;
                if let Some(store) = &settings.config_store {
                    if store.is_relative() {
                        settings.config_store = Some(Path::join(&path, store));
                    }
                }
                settings.settings_root = Some(path);
                settings
            }
            None => MarketSettings::default(),
        };

        if let Some(v) = std::env::var_os("MARKET_CONFIG_STORE") {
            settings.config_store = Some(PathBuf::from(v));
        }
        if let Some(v) = std::env::var_os("MARKET_PORT") {
            settings.port = v.to_str().and_then(|s| s.parse().ok()).or(settings.port);
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let settings: MarketSettings = toml::from_str(
            r#"
            port = 9090
            config-store = "records.json"

            [market]
            totalTickets = 100
            maxTicketCapacity = 10
            ticketReleaseRate = 2
            "#,
        )
        .unwrap();
        assert_eq!(settings.port, Some(9090));
        assert_eq!(settings.host, None);
        assert_eq!(settings.config_store, Some(PathBuf::from("records.json")));
        assert_eq!(settings.market.total_tickets, 100);
        assert_eq!(settings.market.ticket_release_rate, 2);
        assert_eq!(settings.market.customer_retrieval_rate, 0);
        assert_eq!(settings.market.release_interval_ms, 2_000);
    }
}
