//! Configuration types for phone-enrich

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Client configuration
///
/// Works out of the box against a local collaborator; every field has a
/// sensible default and can be overridden individually when deserializing
/// from an embedding application's config file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Endpoint the job request is POSTed to (default: "http://localhost:3001/api/scrape")
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Cap on a single buffered wire line in bytes (default: 1 MiB)
    ///
    /// A collaborator that never emits a line terminator would otherwise
    /// grow the framer's carry-over buffer without bound; past this cap the
    /// job fails with a transport error. Legitimate batch frames grow with
    /// batch size, so the cap is configurable.
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,

    /// Capacity of the job event broadcast channel (default: 256)
    ///
    /// Slow subscribers that fall more than this many events behind observe
    /// a lag error, not corrupted state.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            max_line_bytes: default_max_line_bytes(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl ClientConfig {
    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the offending key if the endpoint
    /// is not an http(s) URL or a capacity field is zero.
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.endpoint).map_err(|e| Error::Config {
            message: format!("endpoint '{}' is not a valid URL: {}", self.endpoint, e),
            key: Some("endpoint".to_string()),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::Config {
                message: format!(
                    "endpoint scheme '{}' is not supported (expected http or https)",
                    parsed.scheme()
                ),
                key: Some("endpoint".to_string()),
            });
        }
        if self.max_line_bytes == 0 {
            return Err(Error::Config {
                message: "max_line_bytes must be non-zero".to_string(),
                key: Some("max_line_bytes".to_string()),
            });
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::Config {
                message: "event_channel_capacity must be non-zero".to_string(),
                key: Some("event_channel_capacity".to_string()),
            });
        }
        Ok(())
    }
}

fn default_endpoint() -> String {
    "http://localhost:3001/api/scrape".to_string()
}

fn default_max_line_bytes() -> usize {
    1024 * 1024
}

fn default_event_channel_capacity() -> usize {
    256
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_url_endpoint_rejected() {
        let config = ClientConfig {
            endpoint: "not a url".to_string(),
            ..Default::default()
        };
        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("endpoint")),
            other => panic!("expected Config error, got: {:?}", other),
        }
    }

    #[test]
    fn test_non_http_scheme_rejected() {
        let config = ClientConfig {
            endpoint: "ftp://example.com/scrape".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_line_cap_rejected() {
        let config = ClientConfig {
            max_line_bytes: 0,
            ..Default::default()
        };
        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("max_line_bytes"));
            }
            other => panic!("expected Config error, got: {:?}", other),
        }
    }

    #[test]
    fn test_partial_deserialization_fills_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"endpoint":"https://example.com/api/scrape"}"#).unwrap();
        assert_eq!(config.endpoint, "https://example.com/api/scrape");
        assert_eq!(config.max_line_bytes, 1024 * 1024);
        assert_eq!(config.event_channel_capacity, 256);
    }
}
