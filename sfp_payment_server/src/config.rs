use std::{env, fmt::Display, net::IpAddr, str::FromStr, time::Duration};

use log::*;
use sfp_common::{parse_boolean_flag, Secret};

use crate::errors::ServerError;

const DEFAULT_SFP_HOST: &str = "127.0.0.1";
const DEFAULT_SFP_PORT: u16 = 8460;
const DEFAULT_SIGNATURE_HEADER: &str = "Stripe-Signature";
const DEFAULT_TOLERANCE_SECS: u64 = 300;
const DEFAULT_WEBHOOK_BUDGET_MS: u64 = 250;
const DEFAULT_NOTIFICATION_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 25;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_forwarded: bool,
    pub webhook: WebhookConfig,
    pub notifications: NotificationConfig,
    /// Capacity of each event hook queue.
    pub event_buffer_size: usize,
}

#[derive(Clone, Debug)]
pub struct WebhookConfig {
    /// The shared secret for webhook signatures. Required.
    pub secret: Secret<String>,
    pub signature_header: String,
    /// The maximum age of a signed webhook. Older deliveries are rejected as replays.
    pub tolerance: Duration,
    /// Processing time above which the webhook handler logs a warning.
    pub processing_budget: Duration,
    /// If supplied, calls to the webhook endpoint are checked against this list of provider IP addresses.
    pub whitelist: Option<Vec<IpAddr>>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            secret: Secret::default(),
            signature_header: DEFAULT_SIGNATURE_HEADER.to_string(),
            tolerance: Duration::from_secs(DEFAULT_TOLERANCE_SECS),
            processing_budget: Duration::from_millis(DEFAULT_WEBHOOK_BUDGET_MS),
            whitelist: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NotificationConfig {
    /// The operational inbox. Required.
    pub operator_email: String,
    /// When set, notifications are relayed to this url. Otherwise they are written to the log.
    pub relay_url: Option<String>,
    pub timeout: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            operator_email: String::default(),
            relay_url: None,
            timeout: Duration::from_millis(DEFAULT_NOTIFICATION_TIMEOUT_MS),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SFP_HOST.to_string(),
            port: DEFAULT_SFP_PORT,
            database_url: String::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
            webhook: WebhookConfig::default(),
            notifications: NotificationConfig::default(),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    /// Reads the configuration from the environment. Missing or invalid optional values are logged and replaced with
    /// defaults. Required values are checked by [`ServerConfig::validate`].
    pub fn from_env_or_default() -> Self {
        let host = env::var("SFP_HOST").ok().unwrap_or_else(|| DEFAULT_SFP_HOST.into());
        let port = parse_env("SFP_PORT", DEFAULT_SFP_PORT);
        let database_url = env::var("SFP_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SFP_DATABASE_URL is not set. Please set it to the URL for the storefront database.");
            String::default()
        });
        let use_x_forwarded_for = parse_boolean_flag(env::var("SFP_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("SFP_USE_FORWARDED").ok(), false);
        let event_buffer_size = parse_env("SFP_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE);
        Self {
            host,
            port,
            database_url,
            use_x_forwarded_for,
            use_forwarded,
            webhook: WebhookConfig::from_env_or_default(),
            notifications: NotificationConfig::from_env_or_default(),
            event_buffer_size,
        }
    }

    /// Checks that every required value is present. The server must not start otherwise.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.webhook.secret.is_empty() {
            return Err(ServerError::ConfigurationError(
                "SFP_WEBHOOK_SECRET is not set. Webhooks cannot be authenticated without it.".into(),
            ));
        }
        if self.webhook.signature_header.trim().is_empty() {
            return Err(ServerError::ConfigurationError("SFP_WEBHOOK_SIGNATURE_HEADER cannot be empty.".into()));
        }
        if self.notifications.operator_email.trim().is_empty() {
            return Err(ServerError::ConfigurationError(
                "SFP_OPERATOR_EMAIL is not set. Operator notifications need a destination.".into(),
            ));
        }
        if self.database_url.is_empty() {
            return Err(ServerError::ConfigurationError("SFP_DATABASE_URL is not set.".into()));
        }
        Ok(())
    }
}

impl WebhookConfig {
    pub fn from_env_or_default() -> Self {
        let secret = env::var("SFP_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ SFP_WEBHOOK_SECRET is not set. Please set it to the webhook signing secret for your provider.");
            String::default()
        });
        let signature_header =
            env::var("SFP_WEBHOOK_SIGNATURE_HEADER").ok().unwrap_or_else(|| DEFAULT_SIGNATURE_HEADER.into());
        let tolerance = Duration::from_secs(parse_env("SFP_WEBHOOK_TOLERANCE_SECS", DEFAULT_TOLERANCE_SECS));
        let processing_budget = Duration::from_millis(parse_env("SFP_WEBHOOK_BUDGET_MS", DEFAULT_WEBHOOK_BUDGET_MS));
        let whitelist = env::var("SFP_PROVIDER_IP_WHITELIST").ok().and_then(|s| parse_whitelist(&s));
        match &whitelist {
            Some(whitelist) if whitelist.is_empty() => {
                warn!(
                    "🚨️ The provider IP whitelist was configured, but is empty. The server will run, but won't \
                     accept any webhook calls."
                );
            },
            None => {
                info!("🪛️ No provider IP whitelist is set. Only signature validation will be used.");
            },
            Some(v) => {
                let addrs = v.iter().map(|a| a.to_string()).collect::<Vec<_>>().join(", ");
                info!("🪛️ Provider IP whitelist: {addrs}");
            },
        }
        Self { secret: Secret::new(secret), signature_header, tolerance, processing_budget, whitelist }
    }
}

impl NotificationConfig {
    pub fn from_env_or_default() -> Self {
        let operator_email = env::var("SFP_OPERATOR_EMAIL").ok().unwrap_or_else(|| {
            error!("🪛️ SFP_OPERATOR_EMAIL is not set. Please set it to the address of the operations inbox.");
            String::default()
        });
        let relay_url = env::var("SFP_NOTIFICATION_RELAY_URL").ok().filter(|s| !s.trim().is_empty());
        if relay_url.is_none() {
            info!("🪛️ SFP_NOTIFICATION_RELAY_URL is not set. Notifications will only be logged.");
        }
        let timeout = Duration::from_millis(parse_env("SFP_NOTIFICATION_TIMEOUT_MS", DEFAULT_NOTIFICATION_TIMEOUT_MS));
        Self { operator_email, relay_url, timeout }
    }
}

/// Parses an optional environment variable, falling back to the default (with a log message) if it is missing or
/// invalid.
fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

/// Parses a comma-separated list of IP addresses. "none", "false" or "0" disable the whitelist.
pub fn parse_whitelist(s: &str) -> Option<Vec<IpAddr>> {
    if ["none", "false", "0", ""].contains(&s.trim().to_lowercase().as_str()) {
        info!(
            "🪛️ Provider IP whitelist is disabled. If this is not what you want, set SFP_PROVIDER_IP_WHITELIST to a \
             comma-separated list of IP addresses to enable it."
        );
        return None;
    }
    let ip_addrs = s
        .split(',')
        .filter_map(|s| {
            s.trim()
                .parse()
                .map_err(|e| {
                    warn!("🪛️ Ignoring invalid IP address ({s}) in SFP_PROVIDER_IP_WHITELIST: {e}");
                })
                .ok()
        })
        .collect::<Vec<IpAddr>>();
    Some(ip_addrs)
}

//-------------------------------------------------  ServerOptions  ----------------------------------------------------
/// A subset of the server configuration that is used to configure the server's behaviour. Generally we try to keep this
/// as small as possible, and exclude secrets to avoid passing sensitive information around the system.
#[derive(Clone, Copy, Debug)]
pub struct ServerOptions {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub webhook_budget: Duration,
}

impl ServerOptions {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self {
            use_x_forwarded_for: config.use_x_forwarded_for,
            use_forwarded: config.use_forwarded,
            webhook_budget: config.webhook.processing_budget,
        }
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self::from_config(&ServerConfig::default())
    }
}
