//! HTTP Server Configuration
//!
//! Bind address and CORS settings. Values come from the `http` section of the
//! service config, `KVLOOKUP_HOST` / `KVLOOKUP_PORT` / `KVLOOKUP_CORS_ORIGINS`,
//! and finally the `--port` flag.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpConfigError {
    #[error("http.host must be an IP address, got '{0}'")]
    Host(String),

    #[error("CORS origin '{0}' must be an http(s) origin")]
    Origin(String),
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpServerConfig {
    /// IP address to bind to (default: "0.0.0.0")
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to (default: 8080)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Origins allowed by CORS. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
        }
    }
}

impl HttpServerConfig {
    /// A `--port` flag wins over file and environment values
    pub fn override_port(&mut self, port: Option<u16>) {
        if let Some(port) = port {
            self.port = port;
        }
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, HttpConfigError> {
        let ip: IpAddr = self
            .host
            .trim()
            .parse()
            .map_err(|_| HttpConfigError::Host(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Configured origins as header values; empty means "any origin"
    pub fn allowed_origins(&self) -> Result<Vec<HeaderValue>, HttpConfigError> {
        self.cors_origins
            .iter()
            .map(|origin| {
                let trimmed = origin.trim_end_matches('/');
                let is_http = trimmed.starts_with("http://") || trimmed.starts_with("https://");
                match HeaderValue::from_str(trimmed) {
                    Ok(value) if is_http => Ok(value),
                    _ => Err(HttpConfigError::Origin(origin.clone())),
                }
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), HttpConfigError> {
        self.bind_addr()?;
        self.allowed_origins()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpServerConfig::default();
        assert_eq!(config.socket_addr(), "0.0.0.0:8080");
        assert!(config.cors_origins.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_port_flag_overrides() {
        let mut config = HttpServerConfig {
            port: 8181,
            ..Default::default()
        };
        config.override_port(None);
        assert_eq!(config.port, 8181);
        config.override_port(Some(9090));
        assert_eq!(
            config.bind_addr().unwrap(),
            "0.0.0.0:9090".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_host_must_be_ip() {
        let config = HttpServerConfig {
            host: "localhost".to_string(),
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(HttpConfigError::Host("localhost".to_string()))
        );

        let config = HttpServerConfig {
            host: "::1".to_string(),
            ..Default::default()
        };
        assert_eq!(config.bind_addr().unwrap().to_string(), "[::1]:8080");
    }

    #[test]
    fn test_cors_origins() {
        let config = HttpServerConfig {
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "https://lookup.example.com/".to_string(),
            ],
            ..Default::default()
        };
        let origins = config.allowed_origins().unwrap();
        assert_eq!(origins[1], "https://lookup.example.com");

        let config = HttpServerConfig {
            cors_origins: vec!["*".to_string()],
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(HttpConfigError::Origin("*".to_string()))
        );
    }
}
