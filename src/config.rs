//! Deployment configuration read from the environment
use std::{env, path::PathBuf};

const DEFAULT_API_BASE_URL: &str = "http://localhost:4000/";
const DEFAULT_ENVIRONMENT: &str = "production";
const DATA_DIR_NAME: &str = "cactus";

/// Settings that are fixed for a deployment.
///
/// Every value has a fallback so the client starts even with an empty
/// environment.  Login is only enforced in the production environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// The client identifier registered with the identity provider
    pub google_client_id: String,
    /// Base URL of the backend that issues signed upload URLs
    pub api_base_url: String,
    /// Deployment environment name (e.g. production, development)
    pub environment: String,
    /// Directory holding the persisted session
    pub data_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            google_client_id: env::var("CACTUS_GOOGLE_CLIENT_ID").unwrap_or_default(),
            api_base_url: env::var("CACTUS_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
            environment: env::var("CACTUS_ENV")
                .unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string()),
            data_dir: env::var_os("CACTUS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(Self::default_data_dir),
        }
    }

    fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .map(|dir| dir.join(DATA_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(format!(".{DATA_DIR_NAME}")))
    }

    /// True when the uploader may only be used by a signed in user
    pub fn login_required(&self) -> bool {
        self.environment.trim().eq_ignore_ascii_case(DEFAULT_ENVIRONMENT)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            google_client_id: String::new(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
            data_dir: Self::default_data_dir(),
        }
    }
}

#[cfg(test)]
mod tests {
    use all_asserts::{assert_false, assert_true};
    use serial_test::serial;

    use super::*;

    const VARS: [&str; 4] = [
        "CACTUS_GOOGLE_CLIENT_ID",
        "CACTUS_API_BASE_URL",
        "CACTUS_ENV",
        "CACTUS_DATA_DIR",
    ];

    fn clear_vars() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn falls_back_to_defaults() {
        clear_vars();

        let config = AppConfig::from_env();

        assert_eq!(config.api_base_url, "http://localhost:4000/");
        assert_eq!(config.google_client_id, "");
        assert_eq!(config.environment, "production");
        assert_true!(config.login_required());
        assert_true!(config.data_dir.ends_with("cactus") || config.data_dir.ends_with(".cactus"));
    }

    #[test]
    #[serial]
    fn reads_overrides() {
        clear_vars();
        env::set_var("CACTUS_GOOGLE_CLIENT_ID", "client-123");
        env::set_var("CACTUS_API_BASE_URL", "https://api.example.com/");
        env::set_var("CACTUS_ENV", "development");
        env::set_var("CACTUS_DATA_DIR", "/tmp/cactus-test");

        let config = AppConfig::from_env();
        clear_vars();

        assert_eq!(config.google_client_id, "client-123");
        assert_eq!(config.api_base_url, "https://api.example.com/");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/cactus-test"));
        assert_false!(config.login_required());
    }

    #[test]
    fn production_is_case_insensitive() {
        let config = AppConfig {
            environment: " Production ".to_string(),
            ..Default::default()
        };
        assert_true!(config.login_required());
    }
}
