use serde::Deserialize;

/// Configuration for the HTTP change source.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Whether the HTTP server is started by the supervisor.
    #[serde(default = "default_server_enabled")]
    pub enabled: bool,

    /// Address and port for the HTTP server to listen on.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Optional API key for securing flag writes.
    /// If not set in config, falls back to `HOMEWATCH_API_KEY` env var.
    #[serde(default = "default_api_key_from_env")]
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: default_server_enabled(),
            listen_address: default_listen_address(),
            api_key: None,
        }
    }
}

fn default_server_enabled() -> bool {
    true
}

fn default_listen_address() -> String {
    "0.0.0.0:8080".to_string()
}

/// Loads the API key from the `HOMEWATCH_API_KEY` environment variable.
fn default_api_key_from_env() -> Option<String> {
    std::env::var("HOMEWATCH_API_KEY").ok()
}

#[cfg(test)]
mod tests {
    use config::Config;

    use super::*;

    #[test]
    fn test_default_server_config() {
        let yaml = r#""#;
        let config = Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<ServerConfig>()
            .unwrap();
        assert_eq!(config.listen_address, default_listen_address());
        assert!(config.enabled);
    }

    #[test]
    fn test_custom_server_config() {
        let yaml = r#"
          enabled: false
          listen_address: "127.0.0.1:3333"
          api_key: "secret"
        "#;
        let config = Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<ServerConfig>()
            .unwrap();
        assert_eq!(config.listen_address, "127.0.0.1:3333");
        assert!(!config.enabled);
        assert_eq!(config.api_key.as_deref(), Some("secret"));
    }
}
