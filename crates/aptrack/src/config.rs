//! Connection settings and where they come from.

use std::env;
use std::fmt;

use crate::AptrackError;

const DEFAULT_SCHEME: &str = "wss";
const DEFAULT_HOST: &str = "archipelago.gg";

/// Everything needed to reach and authenticate against one room.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// `ws` or `wss`.
    pub scheme: String,
    pub host: String,
    pub port: Option<u16>,
    pub slot_name: String,
    pub password: Option<String>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            scheme: DEFAULT_SCHEME.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: None,
            slot_name: String::new(),
            password: None,
        }
    }
}

// Hand-written so the password never lands in a log line.
impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("scheme", &self.scheme)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("slot_name", &self.slot_name)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ConnectionSettings {
    /// Reads `APTRACK_SCHEME`, `APTRACK_HOST`, `APTRACK_PORT`,
    /// `APTRACK_SLOT` and `APTRACK_PASSWORD` over the defaults.
    ///
    /// # Errors
    /// Returns [`AptrackError::InvalidSettings`] if `APTRACK_PORT` is set
    /// but is not a port number.
    pub fn from_env() -> Result<Self, AptrackError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, AptrackError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let port = match optional_trimmed("APTRACK_PORT", &mut lookup) {
            Some(raw) => Some(raw.parse::<u16>().map_err(|e| {
                AptrackError::InvalidSettings(format!("APTRACK_PORT={raw:?}: {e}"))
            })?),
            None => None,
        };

        Ok(Self {
            scheme: optional_trimmed("APTRACK_SCHEME", &mut lookup)
                .unwrap_or(defaults.scheme),
            host: optional_trimmed("APTRACK_HOST", &mut lookup)
                .unwrap_or(defaults.host),
            port,
            slot_name: optional_trimmed("APTRACK_SLOT", &mut lookup)
                .unwrap_or_default(),
            password: optional_trimmed("APTRACK_PASSWORD", &mut lookup),
        })
    }

    /// `{scheme}://{host}:{port}`, or without the port when unset.
    pub fn url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}", self.scheme, self.host.trim(), port),
            None => format!("{}://{}", self.scheme, self.host.trim()),
        }
    }

    /// Checks that host, port and slot name are present.
    ///
    /// # Errors
    /// Returns [`AptrackError::InvalidSettings`] naming the first
    /// missing field.
    pub fn validate(&self) -> Result<(), AptrackError> {
        if self.host.trim().is_empty() {
            return Err(AptrackError::InvalidSettings("host is required".into()));
        }
        match self.port {
            None | Some(0) => {
                return Err(AptrackError::InvalidSettings("port is required".into()));
            }
            Some(_) => {}
        }
        if self.slot_name.trim().is_empty() {
            return Err(AptrackError::InvalidSettings("slot name is required".into()));
        }
        if !matches!(self.scheme.as_str(), "ws" | "wss") {
            return Err(AptrackError::InvalidSettings(format!(
                "unsupported scheme {:?}",
                self.scheme
            )));
        }
        Ok(())
    }
}

fn optional_trimmed<F>(key: &str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Supplies settings at the start of every connection attempt.
pub trait SettingsProvider: Send + Sync + 'static {
    fn settings(&self) -> ConnectionSettings;
}

impl SettingsProvider for ConnectionSettings {
    fn settings(&self) -> ConnectionSettings {
        self.clone()
    }
}
