use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::WorkflowError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub polling: PollingConfig,
    pub admission: AdmissionConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub key: Option<String>,
    pub url: Option<String>,
    pub version: String,
    pub key_header: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub attempts: u32,
    pub backoff_factor: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    pub import_interval_secs: u64,
    pub import_timeout_secs: u64,
    pub mesh_interval_secs: u64,
    pub run_interval_secs: u64,
    pub report_interval_secs: u64,
    pub report_timeout_secs: u64,
    pub min_timeout_secs: u64,
    pub fallback_max_runtime_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdmissionConfig {
    pub mesh_ceiling: f64,
    pub run_ceiling: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub results_dir: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            key: None,
            url: None,
            version: "/v0".to_string(),
            key_header: "X-API-KEY".to_string(),
            request_timeout_secs: 120,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff_factor: 0.2,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            import_interval_secs: 10,
            import_timeout_secs: 900,
            mesh_interval_secs: 30,
            run_interval_secs: 30,
            report_interval_secs: 30,
            report_timeout_secs: 3600,
            min_timeout_secs: 3600,
            fallback_max_runtime_secs: 36000,
        }
    }
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            mesh_ceiling: 150.0,
            run_ceiling: 200.0,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("results"),
        }
    }
}

/// Resolved connection settings for the remote service.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub api_key: String,
    pub base_url: String,
    pub key_header: String,
}

impl AppConfig {
    /// Load configuration from environment variables and config file
    pub fn load() -> anyhow::Result<Self> {
        let mut config = config::Config::builder();

        // Add default configuration
        config = config.add_source(config::Config::try_from(&AppConfig::default())?);

        // Add config file if it exists
        config = config.add_source(config::File::with_name("cht-runner").required(false));

        // Add environment variables with prefix "CHT_", nested keys joined by "__"
        config = config.add_source(
            config::Environment::with_prefix("CHT")
                .prefix_separator("_")
                .separator("__"),
        );

        let config = config.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        Ok(app_config)
    }

    /// Get the API credentials from config or the conventional environment variables
    pub fn credentials(&self) -> Result<Credentials, WorkflowError> {
        let api_key = self
            .api
            .key
            .clone()
            .or_else(|| std::env::var("SIMSCALE_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                WorkflowError::Configuration(
                    "API key missing: set api.key or SIMSCALE_API_KEY".to_string(),
                )
            })?;

        let url = self
            .api
            .url
            .clone()
            .or_else(|| std::env::var("SIMSCALE_API_URL").ok())
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                WorkflowError::Configuration(
                    "API URL missing: set api.url or SIMSCALE_API_URL".to_string(),
                )
            })?;

        Ok(Credentials {
            api_key,
            base_url: format!("{}{}", url.trim_end_matches('/'), self.api.version),
            key_header: self.api.key_header.clone(),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_constants() {
        let config = AppConfig::default();
        assert_eq!(config.retry.attempts, 5);
        assert_eq!(config.polling.import_interval_secs, 10);
        assert_eq!(config.polling.import_timeout_secs, 900);
        assert_eq!(config.polling.fallback_max_runtime_secs, 36000);
        assert_eq!(config.admission.mesh_ceiling, 150.0);
        assert_eq!(config.admission.run_ceiling, 200.0);
    }

    #[test]
    fn test_explicit_credentials_build_versioned_url() {
        let mut config = AppConfig::default();
        config.api.key = Some("secret".to_string());
        config.api.url = Some("https://api.example.invalid/".to_string());

        let credentials = config.credentials().unwrap();
        assert_eq!(credentials.base_url, "https://api.example.invalid/v0");
        assert_eq!(credentials.key_header, "X-API-KEY");
    }

    #[test]
    fn test_blank_key_is_a_configuration_error() {
        let mut config = AppConfig::default();
        config.api.key = Some("  ".to_string());
        config.api.url = Some("https://api.example.invalid".to_string());

        assert!(matches!(
            config.credentials(),
            Err(WorkflowError::Configuration(_))
        ));
    }
}
