//! Environment-shaped configuration loading.
//!
//! Connection settings arrive as a flat key/value map (the shape of process
//! environment variables). They are validated once here and turned into a
//! [`ConnectionConfig`]; nothing downstream sees the raw map.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use super::error::{Error, Result};
use super::traits::{Backoff, ConnectionConfig, Password, TransportMode};

pub const HOST: &str = "ORACLE_HOST";
pub const PORT: &str = "ORACLE_PORT";
pub const SERVICE_NAME: &str = "ORACLE_SERVICE_NAME";
pub const USERNAME: &str = "ORACLE_USERNAME";
pub const PASSWORD: &str = "ORACLE_PASSWORD";
pub const PROTOCOL: &str = "ORACLE_PROTOCOL";
pub const SSL_SERVER_DN_MATCH: &str = "ORACLE_SSL_SERVER_DN_MATCH";
pub const CONNECT_TIMEOUT: &str = "ORACLE_CONNECT_TIMEOUT";
pub const RETRY_COUNT: &str = "ORACLE_RETRY_COUNT";
pub const RETRY_DELAY: &str = "ORACLE_RETRY_DELAY";
pub const FALLBACK_PORT: &str = "ORACLE_FALLBACK_PORT";
pub const RETRY_BACKOFF: &str = "ORACLE_RETRY_BACKOFF";
pub const RETRY_MAX_DELAY: &str = "ORACLE_RETRY_MAX_DELAY";

/// Keys that must be present in every configuration map.
pub const REQUIRED_KEYS: &[&str] = &[
    HOST,
    PORT,
    SERVICE_NAME,
    USERNAME,
    PASSWORD,
    PROTOCOL,
    SSL_SERVER_DN_MATCH,
    CONNECT_TIMEOUT,
    RETRY_COUNT,
    RETRY_DELAY,
];

const ALL_KEYS: &[&str] = &[
    HOST,
    PORT,
    SERVICE_NAME,
    USERNAME,
    PASSWORD,
    PROTOCOL,
    SSL_SERVER_DN_MATCH,
    CONNECT_TIMEOUT,
    RETRY_COUNT,
    RETRY_DELAY,
    FALLBACK_PORT,
    RETRY_BACKOFF,
    RETRY_MAX_DELAY,
];

impl ConnectionConfig {
    /// Build a configuration from an environment-shaped map.
    ///
    /// # Errors
    ///
    /// - `MissingConfig` naming the first absent required key
    /// - `Configuration` for unparsable values or failed validation
    pub fn from_env_map(vars: &HashMap<String, String>) -> Result<Self> {
        let required = |key: &str| required(vars, key);
        let optional = |key: &str| optional(vars, key);

        for key in REQUIRED_KEYS.iter().copied() {
            required(key)?;
        }

        let port = parse_port(PORT, required(PORT)?)?;
        let transport_mode = TransportMode::parse(required(PROTOCOL)?).ok_or_else(|| {
            Error::configuration(format!(
                "{} must be one of tcps, tcp, secure, plain; got `{}`",
                PROTOCOL,
                required(PROTOCOL).unwrap_or_default()
            ))
        })?;
        let verify_identity = parse_bool(SSL_SERVER_DN_MATCH, required(SSL_SERVER_DN_MATCH)?)?;
        let connect_timeout = parse_seconds(CONNECT_TIMEOUT, required(CONNECT_TIMEOUT)?)?;
        let retry_count = required(RETRY_COUNT)?.parse::<i64>().map_err(|_| {
            Error::configuration(format!("{} must be an integer", RETRY_COUNT))
        })?;
        let retry_delay = parse_seconds(RETRY_DELAY, required(RETRY_DELAY)?)?;

        let fallback_port = optional(FALLBACK_PORT)
            .map(|v| parse_port(FALLBACK_PORT, v))
            .transpose()?;

        let backoff = match optional(RETRY_BACKOFF).map(str::to_lowercase).as_deref() {
            None | Some("linear") => Backoff::Linear,
            Some("exponential") => {
                let max_delay = optional(RETRY_MAX_DELAY)
                    .map(|v| parse_seconds(RETRY_MAX_DELAY, v))
                    .transpose()?
                    .unwrap_or_else(|| retry_delay.saturating_mul(8));
                Backoff::Exponential { max_delay }
            }
            Some(other) => {
                return Err(Error::configuration(format!(
                    "{} must be linear or exponential; got `{}`",
                    RETRY_BACKOFF, other
                )));
            }
        };

        ConnectionConfig::builder(
            required(HOST)?,
            required(SERVICE_NAME)?,
            required(USERNAME)?,
            // Passwords are taken verbatim, surrounding whitespace included.
            vars.get(PASSWORD).map(String::as_str).unwrap_or_default(),
        )
        .port(port)
        .transport_mode(transport_mode)
        .verify_identity(verify_identity)
        .connect_timeout(connect_timeout)
        .retry_count(retry_count)
        .retry_delay(retry_delay)
        .backoff(backoff)
        .fallback_port(fallback_port)
        .build()
        .map(|config| {
            config.with_env_source(
                vars.iter()
                    .filter(|(k, _)| *k != PASSWORD && ALL_KEYS.contains(&k.as_str()))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            )
        })
    }

    /// Build a configuration from the process environment.
    pub fn from_process_env() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars()
            .filter(|(k, _)| ALL_KEYS.contains(&k.as_str()))
            .collect();
        Self::from_env_map(&vars)
    }

    /// Serialize back to the key/value shape, with the password redacted.
    ///
    /// Keys that came from [`from_env_map`](Self::from_env_map) come back
    /// exactly as supplied (`secure`, `on`, an explicit `linear`). Everything
    /// else is rendered canonically: `tcps`/`tcp`, `true`/`false`, seconds.
    pub fn to_env_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        let mut put = |k: &str, v: String| {
            map.insert(k.to_string(), v);
        };

        put(HOST, self.host().to_string());
        put(PORT, self.port().to_string());
        put(SERVICE_NAME, self.service_name().to_string());
        put(USERNAME, self.username().to_string());
        put(PASSWORD, Password::REDACTED.to_string());
        put(PROTOCOL, self.transport_mode().protocol().to_string());
        put(SSL_SERVER_DN_MATCH, self.verify_identity().to_string());
        put(CONNECT_TIMEOUT, format_seconds(self.connect_timeout()));
        put(RETRY_COUNT, self.retry_policy().retry_count.to_string());
        put(RETRY_DELAY, format_seconds(self.retry_policy().retry_delay));
        if let Some(port) = self.fallback_port() {
            put(FALLBACK_PORT, port.to_string());
        }
        if let Backoff::Exponential { max_delay } = self.retry_policy().backoff {
            put(RETRY_BACKOFF, "exponential".to_string());
            put(RETRY_MAX_DELAY, format_seconds(max_delay));
        }
        for (key, value) in self.env_source() {
            map.insert(key.clone(), value.clone());
        }
        map
    }
}

/// Parse a dotenv-style file into a key/value map.
///
/// Supports blank lines, `#` comments, an optional `export ` prefix and
/// single or double quoted values. Later keys override earlier ones.
pub fn load_env_file(path: impl AsRef<Path>) -> Result<HashMap<String, String>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        Error::configuration(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_env_lines(&contents)
}

fn required<'a>(vars: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    vars.get(key)
        .map(|v| v.trim())
        .ok_or_else(|| Error::missing_config(key))
}

fn optional<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse_env_lines(contents: &str) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();

    for (index, raw) in contents.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let (key, value) = line.split_once('=').ok_or_else(|| {
            Error::configuration(format!("line {}: expected KEY=VALUE", index + 1))
        })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(Error::configuration(format!("line {}: empty key", index + 1)));
        }
        vars.insert(key.to_string(), unquote(value.trim()).to_string());
    }

    Ok(vars)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn parse_port(key: &str, value: &str) -> Result<u16> {
    match value.parse::<u16>() {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(Error::configuration(format!(
            "{} must be a port number between 1 and 65535; got `{}`",
            key, value
        ))),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::configuration(format!(
            "{} must be a boolean; got `{}`",
            key, value
        ))),
    }
}

fn parse_seconds(key: &str, value: &str) -> Result<Duration> {
    value
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
        .ok_or_else(|| {
            Error::configuration(format!(
                "{} must be a non-negative number of seconds; got `{}`",
                key, value
            ))
        })
}

fn format_seconds(duration: Duration) -> String {
    duration.as_secs_f64().to_string()
}
