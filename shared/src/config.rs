use serde::Deserialize;

use crate::assembler::{BOOTSTRAP_SERVERS_CONFIG, SASL_JAAS_CONFIG};

fn default_env_keys() -> String {
    "BOOTSTRAP_SERVERS,KAFKA_KEY,KAFKA_SECRET,SCHEMA_REGISTRY_URL,SCHEMA_REGISTRY_KEY,SCHEMA_REGISTRY_SECRET".into()
}

fn default_required() -> String {
    format!("{BOOTSTRAP_SERVERS_CONFIG},{SASL_JAAS_CONFIG}")
}

/// Startup settings, read from `PROBE_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Properties file merged before the environment; skipped when unset.
    #[serde(default)]
    pub properties_file: Option<String>,
    #[serde(default = "default_env_keys")]
    pub env_keys: String,
    #[serde(default = "default_required")]
    pub required: String,
    #[serde(default)]
    pub topics: String,
}

impl Settings {
    pub fn new() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("PROBE"))
            .build()?
            .try_deserialize()
    }

    pub fn env_keys(&self) -> Vec<String> {
        split_list(&self.env_keys)
    }

    pub fn required(&self) -> Vec<String> {
        split_list(&self.required)
    }

    pub fn topics(&self) -> Vec<String> {
        split_list(&self.topics)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "PROBE_PROPERTIES_FILE",
        "PROBE_ENV_KEYS",
        "PROBE_REQUIRED",
        "PROBE_TOPICS",
    ];

    fn clear() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[serial]
    #[test]
    fn defaults() {
        clear();
        let settings = Settings::new().unwrap();
        assert_eq!(settings.properties_file, None);
        assert_eq!(settings.env_keys().len(), 6);
        assert_eq!(settings.required(), vec!["bootstrap.servers", "sasl.jaas.config"]);
        assert!(settings.topics().is_empty());
    }

    #[serial]
    #[test]
    fn reads_prefixed_environment() {
        clear();
        std::env::set_var("PROBE_PROPERTIES_FILE", "/etc/kafka/client.properties");
        std::env::set_var("PROBE_ENV_KEYS", "BOOTSTRAP_SERVERS, KAFKA_KEY");
        std::env::set_var("PROBE_TOPICS", "orders,,payments ");
        let settings = Settings::new().unwrap();
        clear();
        assert_eq!(
            settings.properties_file.as_deref(),
            Some("/etc/kafka/client.properties")
        );
        assert_eq!(settings.env_keys(), vec!["BOOTSTRAP_SERVERS", "KAFKA_KEY"]);
        assert_eq!(settings.topics(), vec!["orders", "payments"]);
    }
}
