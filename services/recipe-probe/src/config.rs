//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The refresh token is loaded from RECIFIT_REFRESH_TOKEN or
//! refresh_token_file, never stored in the TOML directly to avoid leaking
//! secrets.

use common::Secret;
use dispatch::{ClientOptions, WaiterPolicy};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use transport::{HeaderInjection, RequestKey};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub client: ClientConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub headers: Vec<HeaderConfig>,
}

/// Backend location and dispatch behavior
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,
    #[serde(default = "default_exempt")]
    pub exempt: Vec<String>,
    #[serde(default)]
    pub waiter_policy: WaiterPolicy,
}

/// Cookie session seeding
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(skip)]
    pub refresh_token: Option<Secret<String>>,
    /// Path to a file containing the refresh token (alternative to RECIFIT_REFRESH_TOKEN)
    #[serde(default)]
    pub refresh_token_file: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            refresh_token: None,
            refresh_token_file: None,
        }
    }
}

/// Header applied to every request
#[derive(Debug, Clone, Deserialize)]
pub struct HeaderConfig {
    pub name: String,
    pub value: String,
}

fn default_api_prefix() -> String {
    dispatch::API_PREFIX.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_refresh_path() -> String {
    dispatch::REFRESH_PATH.to_string()
}

fn default_exempt() -> Vec<String> {
    dispatch::DEFAULT_EXEMPT_KEYS
        .iter()
        .map(|k| k.to_string())
        .collect()
}

fn default_cookie_name() -> String {
    dispatch::REFRESH_COOKIE_NAME.to_string()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Refresh token resolution order:
    /// 1. RECIFIT_REFRESH_TOKEN env var
    /// 2. refresh_token_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if !config.client.base_url.starts_with("http://")
            && !config.client.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "base_url must start with http:// or https://, got: {}",
                config.client.base_url
            )));
        }

        if config.client.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        for (name, path) in [
            ("api_prefix", &config.client.api_prefix),
            ("refresh_path", &config.client.refresh_path),
        ] {
            if !path.starts_with('/') {
                return Err(common::Error::Config(format!(
                    "{name} must start with '/', got: {path}"
                )));
            }
        }

        // Surface malformed exemption keys at load time
        config.exempt_keys()?;

        if let Ok(token) = std::env::var("RECIFIT_REFRESH_TOKEN") {
            config.session.refresh_token = Some(Secret::new(token));
        } else if let Some(ref token_file) = config.session.refresh_token_file {
            let token = std::fs::read_to_string(token_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read refresh_token_file {}: {e}",
                    token_file.display()
                ))
            })?;
            let token = token.trim().to_owned();
            if !token.is_empty() {
                config.session.refresh_token = Some(Secret::new(token));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("recifit-probe.toml")
    }

    pub fn exempt_keys(&self) -> common::Result<Vec<RequestKey>> {
        self.client
            .exempt
            .iter()
            .map(|k| {
                k.parse::<RequestKey>()
                    .map_err(|e| common::Error::Config(format!("exempt: {e}")))
            })
            .collect()
    }

    pub fn client_options(&self) -> common::Result<ClientOptions> {
        Ok(ClientOptions {
            exempt: self.exempt_keys()?,
            refresh_path: self.client.refresh_path.clone(),
            waiter_policy: self.client.waiter_policy,
        })
    }

    /// Base URL of the authenticated API client.
    pub fn api_url(&self) -> String {
        format!(
            "{}{}",
            self.client.base_url.trim_end_matches('/'),
            self.client.api_prefix
        )
    }

    pub fn header_injections(&self) -> Vec<HeaderInjection> {
        self.headers
            .iter()
            .map(|h| HeaderInjection {
                name: h.name.clone(),
                value: h.value.clone(),
            })
            .collect()
    }
}
