use std::{env, str::FromStr, time::Duration};

use chrono_tz::Tz;
use thiserror::Error;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

/// The default endpoint used to generate product photos
pub const DEFAULT_IMAGE_ENDPOINT: &str = "https://api.openai.com/v1/images/generations";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got \"{value}\"")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("{key} is required when {reason}")]
    Missing {
        key: &'static str,
        reason: &'static str,
    },
}

/// Which backend the gateway talks to
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
    /// The hosted backend-as-a-service
    Supabase,
    /// An in-process backend, for local development
    #[default]
    Memory,
}

/// Credentials of an admin account created on start by the in-process backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminBootstrap {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// The configuration of a tokenhub instance
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub gateway: GatewayKind,
    /// Base url of the hosted backend, like `https://xyz.supabase.co`
    pub supabase_url: Option<String>,
    /// The public (anon) key sent with every backend request
    pub supabase_anon_key: Option<String>,
    /// Bearer credential of the image generation api
    pub image_api_key: Option<String>,
    pub image_endpoint: String,
    /// How often to check whether the profile of a new account exists
    pub signup_poll_interval: Duration,
    /// How long to wait for the profile of a new account before giving up
    pub signup_poll_timeout: Duration,
    /// The time zone dates are displayed and filtered in
    pub time_zone: Tz,
    /// How many requests a page of the admin listing holds
    pub items_per_page: usize,
    /// How long a client session may go unused before it is dropped
    pub session_idle_timeout: Duration,
    pub bootstrap_admin: Option<AdminBootstrap>,
}

impl Config {
    /// Reads the configuration from `TOKENHUB_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let server_port = match get("TOKENHUB_SERVER_PORT") {
            Some(value) => parse(&value, "TOKENHUB_SERVER_PORT", "a port number")?,
            None => defaults.server_port,
        };

        let gateway = match get("TOKENHUB_GATEWAY").as_deref() {
            Some("supabase") => GatewayKind::Supabase,
            Some("memory") => GatewayKind::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "TOKENHUB_GATEWAY",
                    expected: "\"supabase\" or \"memory\"",
                    value: other.to_string(),
                })
            }
            None if get("TOKENHUB_SUPABASE_URL").is_some() => GatewayKind::Supabase,
            None => defaults.gateway,
        };

        let supabase_url = get("TOKENHUB_SUPABASE_URL");
        let supabase_anon_key = get("TOKENHUB_SUPABASE_ANON_KEY");

        if gateway == GatewayKind::Supabase {
            if supabase_url.is_none() {
                return Err(ConfigError::Missing {
                    key: "TOKENHUB_SUPABASE_URL",
                    reason: "the supabase gateway is used",
                });
            }

            if supabase_anon_key.is_none() {
                return Err(ConfigError::Missing {
                    key: "TOKENHUB_SUPABASE_ANON_KEY",
                    reason: "the supabase gateway is used",
                });
            }
        }

        let signup_poll_interval = match get("TOKENHUB_SIGNUP_POLL_INTERVAL_MS") {
            Some(value) => Duration::from_millis(parse(
                &value,
                "TOKENHUB_SIGNUP_POLL_INTERVAL_MS",
                "milliseconds",
            )?),
            None => defaults.signup_poll_interval,
        };

        let signup_poll_timeout = match get("TOKENHUB_SIGNUP_POLL_TIMEOUT_MS") {
            Some(value) => Duration::from_millis(parse(
                &value,
                "TOKENHUB_SIGNUP_POLL_TIMEOUT_MS",
                "milliseconds",
            )?),
            None => defaults.signup_poll_timeout,
        };

        let time_zone = match get("TOKENHUB_TIME_ZONE") {
            Some(value) => parse(&value, "TOKENHUB_TIME_ZONE", "an IANA time zone")?,
            None => defaults.time_zone,
        };

        let items_per_page = match get("TOKENHUB_ITEMS_PER_PAGE") {
            Some(value) => parse(&value, "TOKENHUB_ITEMS_PER_PAGE", "a positive number")?,
            None => defaults.items_per_page,
        };

        if items_per_page == 0 {
            return Err(ConfigError::Invalid {
                key: "TOKENHUB_ITEMS_PER_PAGE",
                expected: "a positive number",
                value: "0".to_string(),
            });
        }

        let session_idle_timeout = match get("TOKENHUB_SESSION_IDLE_TIMEOUT_SECS") {
            Some(value) => Duration::from_secs(parse(
                &value,
                "TOKENHUB_SESSION_IDLE_TIMEOUT_SECS",
                "seconds",
            )?),
            None => defaults.session_idle_timeout,
        };

        let bootstrap_admin = match (
            get("TOKENHUB_ADMIN_EMAIL"),
            get("TOKENHUB_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(AdminBootstrap {
                email,
                password,
                name: get("TOKENHUB_ADMIN_NAME").unwrap_or_else(|| "Admin".to_string()),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Missing {
                    key: "TOKENHUB_ADMIN_PASSWORD",
                    reason: "TOKENHUB_ADMIN_EMAIL is set",
                })
            }
            _ => None,
        };

        Ok(Self {
            server_port,
            gateway,
            supabase_url,
            supabase_anon_key,
            image_api_key: get("TOKENHUB_IMAGE_API_KEY"),
            image_endpoint: get("TOKENHUB_IMAGE_ENDPOINT").unwrap_or(defaults.image_endpoint),
            signup_poll_interval,
            signup_poll_timeout,
            time_zone,
            items_per_page,
            session_idle_timeout,
            bootstrap_admin,
        })
    }
}

fn parse<T: FromStr>(value: &str, key: &'static str, expected: &'static str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        expected,
        value: value.to_string(),
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: DEFAULT_PORT,
            gateway: GatewayKind::Memory,
            supabase_url: None,
            supabase_anon_key: None,
            image_api_key: None,
            image_endpoint: DEFAULT_IMAGE_ENDPOINT.to_string(),
            // The profile trigger usually finishes well within a second
            signup_poll_interval: Duration::from_millis(250),
            signup_poll_timeout: Duration::from_secs(5),
            time_zone: chrono_tz::Asia::Jakarta,
            items_per_page: 10,
            session_idle_timeout: Duration::from_secs(24 * 60 * 60),
            bootstrap_admin: None,
        }
    }
}
