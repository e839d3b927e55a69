//! Server configuration loaded from environment variables.
//!
//! Every setting has a default so the server starts with zero configuration
//! for local development. A `.env` file is read in `main` before this runs.

use std::net::SocketAddr;
use std::path::PathBuf;

use catalog_shared::constants::{DEFAULT_HTTP_PORT, MAX_UPLOAD_SIZE};

const DEV_JWT_SECRET: &str = "catalog-dev-secret-change-me";

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP API.
    /// Env: `HTTP_ADDR`, or `PORT` to change only the port.
    /// Default: `0.0.0.0:8000`
    pub http_addr: SocketAddr,

    /// SQLite database file.
    /// Env: `DATABASE_PATH`
    /// Default: `./catalog.db`
    pub database_path: PathBuf,

    /// HMAC secret for access and refresh tokens.
    /// Env: `JWT_SECRET`
    pub jwt_secret: String,

    /// Directory uploaded files are written to and served from.
    /// Env: `UPLOAD_DIR`
    /// Default: `./uploads`
    pub upload_dir: PathBuf,

    /// Largest accepted upload in bytes.
    /// Env: `MAX_UPLOAD_SIZE`
    pub max_upload_size: usize,

    /// Origins allowed by CORS.
    /// Env: `CORS_ORIGINS` (comma separated)
    pub cors_origins: Vec<String>,
}

// The secret stays out of logs.
impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("http_addr", &self.http_addr)
            .field("database_path", &self.database_path)
            .field("upload_dir", &self.upload_dir)
            .field("max_upload_size", &self.max_upload_size)
            .field("cors_origins", &self.cors_origins)
            .finish_non_exhaustive()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./catalog.db"),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            upload_dir: PathBuf::from("./uploads"),
            max_upload_size: MAX_UPLOAD_SIZE,
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:5174".to_string(),
            ],
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = var("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        } else if let Some(port) = var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => config.http_addr.set_port(port),
                Err(_) => tracing::warn!(value = %port, "Invalid PORT, using default"),
            }
        }

        if let Some(path) = var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        match var("JWT_SECRET") {
            Some(secret) if !secret.is_empty() => config.jwt_secret = secret,
            _ => tracing::warn!("JWT_SECRET not set, using the development secret"),
        }

        if let Some(path) = var("UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(path);
        }

        if let Some(val) = var("MAX_UPLOAD_SIZE") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.max_upload_size = n,
                _ => tracing::warn!(value = %val, "Invalid MAX_UPLOAD_SIZE, using default"),
            }
        }

        if let Some(origins) = var("CORS_ORIGINS") {
            let parsed: Vec<String> = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_string)
                .collect();
            if !parsed.is_empty() {
                config.cors_origins = parsed;
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> ServerConfig {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8000).into());
        assert_eq!(config.max_upload_size, 100 * 1024 * 1024);
        assert_eq!(config.cors_origins.len(), 2);
    }

    #[test]
    fn test_port_overrides_default_port() {
        let config = load(&[("PORT", "9100")]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 9100).into());
    }

    #[test]
    fn test_http_addr_wins_over_port() {
        let config = load(&[("HTTP_ADDR", "127.0.0.1:7000"), ("PORT", "9100")]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 7000).into());
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = load(&[("HTTP_ADDR", "nope"), ("MAX_UPLOAD_SIZE", "-1")]);
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 8000).into());
        assert_eq!(config.max_upload_size, MAX_UPLOAD_SIZE);
    }

    #[test]
    fn test_cors_origins_split() {
        let config = load(&[("CORS_ORIGINS", " https://a.example , ,https://b.example")]);
        assert_eq!(
            config.cors_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn test_debug_hides_secret() {
        let config = load(&[("JWT_SECRET", "super-secret-value")]);
        assert_eq!(config.jwt_secret, "super-secret-value");
        assert!(!format!("{config:?}").contains("super-secret-value"));
    }
}
