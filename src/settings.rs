use crate::api::{ClientOptions, Error};
use crate::display::DisplayConfig;
use config::Config;
use serde::Deserialize;
use std::time::Duration;

const ENV_PREFIX: &str = "ENPHASE";

fn default_true() -> bool {
    true
}

fn default_refresh_interval() -> u64 {
    60_000
}

fn default_request_timeout() -> u64 {
    10_000
}

fn default_last_update_format() -> String {
    String::from("%a %H:%M:%S")
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub gateway_host: String,
    #[serde(default)]
    pub token: String,
    /// Poll interval in milliseconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    #[serde(default = "default_true")]
    pub live_data: bool,
    #[serde(default)]
    pub production_details: bool,
    #[serde(default = "default_true")]
    pub display_current_production: bool,
    #[serde(default = "default_true")]
    pub display_current_usage: bool,
    #[serde(default = "default_true")]
    pub display_net_output: bool,
    #[serde(default = "default_true")]
    pub display_todays_production: bool,
    #[serde(default = "default_true")]
    pub display_todays_usage: bool,
    #[serde(default = "default_true")]
    pub display_batteries: bool,
    #[serde(default = "default_true")]
    pub display_last_update: bool,
    #[serde(default = "default_last_update_format")]
    pub display_last_update_format: String,
    #[serde(default)]
    pub debug: bool,
}

impl Settings {
    pub fn from_config(settings: Config) -> Result<Settings, Error> {
        settings
            .try_into::<Settings>()
            .map_err(|e| Error::ConfigError(e.to_string()))
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval.max(1))
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            timeout: Duration::from_millis(self.request_timeout),
            live_data: self.live_data,
            production_details: self.production_details,
        }
    }

    pub fn display_config(&self) -> DisplayConfig {
        DisplayConfig {
            gateway_host: self.gateway_host.clone(),
            token: self.token.clone(),
            debug: self.debug,
            display_current_production: self.display_current_production,
            display_current_usage: self.display_current_usage,
            display_net_output: self.display_net_output,
            display_todays_production: self.display_todays_production,
            display_todays_usage: self.display_todays_usage,
            display_batteries: self.display_batteries,
            display_last_update: self.display_last_update,
            display_last_update_format: self.display_last_update_format.clone(),
        }
    }
}

/// Read settings from `ENPHASE_*` environment variables, e.g. `ENPHASE_GATEWAY_HOST`.
pub fn read_settings() -> Result<Settings, Error> {
    let mut settings = Config::default();
    settings
        .merge(config::Environment::with_prefix(ENV_PREFIX))
        .map_err(|e| Error::ConfigError(e.to_string()))?;

    Settings::from_config(settings)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let settings = Settings::from_config(Config::default()).unwrap();

        assert_eq!("", settings.gateway_host);
        assert_eq!(Duration::from_secs(60), settings.refresh_interval());
        assert_eq!(Duration::from_secs(10), settings.client_options().timeout);
        assert!(settings.live_data);
        assert!(!settings.production_details);
        assert!(!settings.debug);
        assert_eq!(DisplayConfig::default(), settings.display_config());
    }

    #[test]
    fn overrides() {
        let mut config = Config::default();
        config.set("gateway_host", "envoy.local").unwrap();
        config.set("token", "api-token").unwrap();
        config.set("refresh_interval", 30_000i64).unwrap();
        config.set("live_data", false).unwrap();
        config.set("display_batteries", false).unwrap();

        let settings = Settings::from_config(config).unwrap();
        let display = settings.display_config();

        assert_eq!(Duration::from_secs(30), settings.refresh_interval());
        assert!(!settings.client_options().live_data);
        assert_eq!("envoy.local", display.gateway_host);
        assert_eq!("api-token", display.token);
        assert!(!display.display_batteries);
        assert!(display.display_net_output);
    }

    #[test]
    fn invalid_value_is_config_error() {
        let mut config = Config::default();
        config.set("refresh_interval", "soon").unwrap();

        assert!(matches!(
            Settings::from_config(config),
            Err(Error::ConfigError(_))
        ));
    }
}
