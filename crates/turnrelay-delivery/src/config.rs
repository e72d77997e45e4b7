//! Configuration for the note-taking API
//!
//! Credentials are two opaque secrets. Either one missing is a
//! configuration error reported per attempt, never a transient failure.

use std::env;
use std::fmt;
use std::time::Duration;

/// Error types for configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Default API base URL
pub const DEFAULT_API_URL: &str = "https://api.notion.com";

/// API version sent with every request
pub const DEFAULT_API_VERSION: &str = "2022-06-28";

/// Access token plus destination database
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Integration access token
    pub token: String,
    /// Destination database identifier
    pub database_id: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"[REDACTED]")
            .field("database_id", &self.database_id)
            .finish()
    }
}

/// Note-taking API configuration
#[derive(Clone)]
pub struct NotesConfig {
    /// Access token (env: NOTION_TOKEN)
    pub token: Option<String>,
    /// Destination database (env: NOTION_DATABASE_ID)
    pub database_id: Option<String>,
    /// Base URL (env: NOTION_API_URL)
    pub api_url: String,
    /// API version header (env: NOTION_API_VERSION)
    pub api_version: String,
    /// Request timeout; transport default when unset (env: TURNRELAY_HTTP_TIMEOUT_SECS)
    pub timeout: Option<Duration>,
}

impl fmt::Debug for NotesConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotesConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("database_id", &self.database_id)
            .field("api_url", &self.api_url)
            .field("api_version", &self.api_version)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Default for NotesConfig {
    fn default() -> Self {
        Self {
            token: None,
            database_id: None,
            api_url: DEFAULT_API_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            timeout: None,
        }
    }
}

impl NotesConfig {
    /// Configuration with both credentials set
    pub fn new(token: &str, database_id: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            database_id: Some(database_id.to_string()),
            ..Default::default()
        }
    }

    /// Point at a different base URL
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let timeout = match env::var("TURNRELAY_HTTP_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    ConfigError::Invalid(format!("TURNRELAY_HTTP_TIMEOUT_SECS={raw}"))
                })?;
                Some(Duration::from_secs(secs))
            }
            Err(_) => None,
        };

        Ok(Self {
            token: non_empty_var("NOTION_TOKEN"),
            database_id: non_empty_var("NOTION_DATABASE_ID"),
            api_url: env::var("NOTION_API_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            api_version: env::var("NOTION_API_VERSION")
                .unwrap_or_else(|_| DEFAULT_API_VERSION.to_string()),
            timeout,
        })
    }

    /// Both credentials, if both are present and non-blank
    pub fn credentials(&self) -> Option<Credentials> {
        let token = self.token.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
        let database_id = self
            .database_id
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())?;

        Some(Credentials {
            token: token.to_string(),
            database_id: database_id.to_string(),
        })
    }

    /// Whether deliveries can be attempted at all
    pub fn is_configured(&self) -> bool {
        self.credentials().is_some()
    }

    /// Like [`credentials`](Self::credentials) but names what is missing
    pub fn require_credentials(&self) -> Result<Credentials, ConfigError> {
        if self.token.as_deref().map_or(true, |t| t.trim().is_empty()) {
            return Err(ConfigError::MissingEnvVar("NOTION_TOKEN".to_string()));
        }
        self.credentials()
            .ok_or_else(|| ConfigError::MissingEnvVar("NOTION_DATABASE_ID".to_string()))
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NotesConfig::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
        assert!(!config.is_configured());
        assert!(config.timeout.is_none());
    }

    #[test]
    fn test_credentials_require_both() {
        let config = NotesConfig::new("secret", "db-1");
        assert_eq!(
            config.credentials(),
            Some(Credentials {
                token: "secret".to_string(),
                database_id: "db-1".to_string(),
            })
        );

        let mut missing_db = config.clone();
        missing_db.database_id = None;
        assert!(missing_db.credentials().is_none());
        assert!(matches!(
            missing_db.require_credentials(),
            Err(ConfigError::MissingEnvVar(ref v)) if v == "NOTION_DATABASE_ID"
        ));

        let mut blank_token = config;
        blank_token.token = Some("  ".to_string());
        assert!(!blank_token.is_configured());
        assert!(matches!(
            blank_token.require_credentials(),
            Err(ConfigError::MissingEnvVar(ref v)) if v == "NOTION_TOKEN"
        ));
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = NotesConfig::new("super-secret", "db-1");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));

        let creds = config.credentials().unwrap();
        assert!(!format!("{:?}", creds).contains("super-secret"));
    }

    #[test]
    fn test_api_url_trailing_slash() {
        let config = NotesConfig::default().with_api_url("http://localhost:9000/");
        assert_eq!(config.api_url, "http://localhost:9000");
    }
}
