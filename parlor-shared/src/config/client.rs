use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, time::Duration};
use tracing::debug;
use url::Url;

/// The main configuration structure for the Parlor chat client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL of the chat REST API
    pub api_url: Url,

    /// Value sent in the `lang` header of every API request
    pub lang: String,

    /// Page size used for list requests
    pub page_size: u32,

    /// User id placed in the envelope of login and registration requests
    pub system_user_id: i64,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,

    /// Logging level
    pub log_level: String,
}

impl ClientConfig {
    /// Generates a default configuration.
    ///
    /// # Panics
    /// Never in practice: the default API URL is a valid literal.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            api_url: Url::parse("http://localhost:8080").expect("valid default API URL"),
            lang: "fr".to_string(),
            page_size: 100,
            system_user_id: 1,
            request_timeout_secs: 30,
            log_level: "info".to_string(),
        }
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// # Arguments
    /// * `config_path` - Optional path to the configuration file.
    /// * `api_url_override` - Optional API URL taking precedence over every other source.
    ///
    /// # Returns
    /// A [`ClientConfig`] with all values resolved.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, if an environment
    /// override is malformed, or if the resolved configuration is invalid.
    pub fn load_config(
        config_path: Option<PathBuf>,
        api_url_override: Option<Url>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let defaults = ClientConfig::with_defaults();
        let mut config = defaults.clone();

        // Load from file if provided
        if let Some(path) = config_path {
            let content = fs::read_to_string(&path)?;
            let file_config: ClientConfig =
                match path.extension().and_then(|ext| ext.to_str()) {
                    Some("yaml" | "yml") => serde_yml::from_str(&content)?,
                    Some("json") => serde_json::from_str(&content)?,
                    _ => {
                        return Err("Unsupported configuration format. Use 'yaml' or 'json'.".into());
                    }
                };
            debug!(path = %path.display(), "loaded client configuration file");
            config = file_config;
        }

        // Use environment variables only if values are not already set
        if config.api_url == defaults.api_url {
            if let Ok(api_url) = env::var("PARLOR_API_URL") {
                config.api_url = Url::parse(&api_url)
                    .map_err(|_| "Invalid PARLOR_API_URL value: must be an absolute URL")?;
            }
        }
        if config.lang == defaults.lang {
            if let Ok(lang) = env::var("PARLOR_LANG") {
                config.lang = lang;
            }
        }
        if config.page_size == defaults.page_size {
            if let Ok(size) = env::var("PARLOR_PAGE_SIZE") {
                config.page_size = size
                    .parse()
                    .map_err(|_| "Invalid PARLOR_PAGE_SIZE value: must be a positive number")?;
            }
        }
        if config.log_level == defaults.log_level {
            if let Ok(log_level) = env::var("PARLOR_LOG_LEVEL") {
                config.log_level = log_level;
            }
        }

        // Override with command-line arguments if provided
        if let Some(api_url) = api_url_override {
            config.api_url = api_url;
        }

        if let Err(errors) = config.validate() {
            return Err(errors.join("; ").into());
        }

        Ok(config)
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the resolved configuration.
    ///
    /// # Errors
    /// Returns every validation problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !matches!(self.api_url.scheme(), "http" | "https") {
            errors.push(format!(
                "Invalid API URL scheme '{}'. Use http or https.",
                self.api_url.scheme()
            ));
        }

        if self.page_size == 0 {
            errors.push("Invalid page size. Must be greater than 0.".to_string());
        }

        if self.request_timeout_secs == 0 {
            errors.push("Invalid request timeout. Must be greater than 0.".to_string());
        }

        if self.lang.trim().is_empty() {
            errors.push("Language header must not be empty.".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}
