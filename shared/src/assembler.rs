//! Assembles client [`Properties`] from a properties file and from a fixed set
//! of environment variables, and checks that required keys made it in.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, PropertiesError, Result};
use crate::properties::Properties;

pub const BOOTSTRAP_SERVERS_CONFIG: &str = "bootstrap.servers";
pub const SASL_JAAS_CONFIG: &str = "sasl.jaas.config";
pub const SCHEMA_REGISTRY_URL_CONFIG: &str = "schema.registry.url";
pub const BASIC_AUTH_CREDENTIALS_SOURCE: &str = "basic.auth.credentials.source";
pub const USER_INFO_CONFIG: &str = "basic.auth.user.info";

/// Value written under [`BASIC_AUTH_CREDENTIALS_SOURCE`].
pub const USER_INFO_SOURCE: &str = "USER_INFO";

pub const PLAIN_LOGIN_MODULE: &str = "org.apache.kafka.common.security.plain.PlainLoginModule";

/// Environment variables understood by [`load_from_environment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, AsRefStr, Display, EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvKey {
    BootstrapServers,
    KafkaKey,
    KafkaSecret,
    SchemaRegistryUrl,
    SchemaRegistryKey,
    SchemaRegistrySecret,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialOwner {
    Kafka,
    SchemaRegistry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialRole {
    Key,
    Secret,
}

/// What a resolved environment variable contributes to the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvEffect {
    /// Copy the value verbatim under the given property key.
    DirectWrite(&'static str),
    /// Hold the value until the composite credential strings are built.
    CredentialPart(CredentialOwner, CredentialRole),
}

impl EnvKey {
    pub fn effect(self) -> EnvEffect {
        use CredentialOwner::*;
        use CredentialRole::*;
        match self {
            EnvKey::BootstrapServers => EnvEffect::DirectWrite(BOOTSTRAP_SERVERS_CONFIG),
            EnvKey::KafkaKey => EnvEffect::CredentialPart(Kafka, Key),
            EnvKey::KafkaSecret => EnvEffect::CredentialPart(Kafka, Secret),
            EnvKey::SchemaRegistryUrl => EnvEffect::DirectWrite(SCHEMA_REGISTRY_URL_CONFIG),
            EnvKey::SchemaRegistryKey => EnvEffect::CredentialPart(SchemaRegistry, Key),
            EnvKey::SchemaRegistrySecret => EnvEffect::CredentialPart(SchemaRegistry, Secret),
        }
    }
}

/// Read-only view of environment variables.
pub trait EnvSource {
    fn var(&self, name: &str) -> Option<String>;
}

/// The environment of the running process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Checks that every key in `required` is present.
///
/// All absent keys are collected before failing. A key that is present with
/// an empty or whitespace-only value passes, but is logged as a warning.
pub fn validate_required<S: AsRef<str>>(config: &Properties, required: &[S]) -> Result<()> {
    let mut missing = Vec::new();
    for key in required {
        let key = key.as_ref();
        match config.get(key) {
            None => missing.push(key.to_string()),
            Some(v) if v.trim().is_empty() => warn!(key, "required property is empty"),
            Some(_) => {}
        }
    }
    if missing.is_empty() {
        return Ok(());
    }
    Err(ConfigError::MissingConfig { missing })
}

/// Merges the entries of the properties file at `path` into `config`.
pub fn load_from_file(config: &mut Properties, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::ConfigFileNotFound {
            path: path.to_path_buf(),
        });
    }
    let file_err = |source: PropertiesError| ConfigError::ConfigFile {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(|e| file_err(e.into()))?;
    let count = config.load(file).map_err(file_err)?;
    info!(path = %path.display(), entries = count, "loaded properties file");
    Ok(())
}

/// [`load_from_environment_with`] against the process environment.
pub fn load_from_environment<S: AsRef<str>>(config: &mut Properties, requested: &[S]) -> Result<()> {
    load_from_environment_with(config, requested, &ProcessEnv)
}

/// Resolves each requested environment variable and writes its translation
/// into `config`.
///
/// Every name is checked against [`EnvKey`] before anything is written, so an
/// unknown name leaves `config` untouched. Unset variables are skipped.
///
/// The JAAS config, the credentials source and the schema-registry user info
/// are always written, even when none of their parts were requested; in that
/// case they carry empty credentials and will overwrite values that came from
/// a properties file. This matches the behavior existing deployments rely on
/// but is most likely unintended.
pub fn load_from_environment_with<S: AsRef<str>, E: EnvSource + ?Sized>(
    config: &mut Properties,
    requested: &[S],
    env: &E,
) -> Result<()> {
    let keys = requested
        .iter()
        .map(|name| {
            let name = name.as_ref();
            EnvKey::from_str(name).map_err(|_| ConfigError::UnknownConfigKey(name.to_string()))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut kafka = Credentials::default();
    let mut registry = Credentials::default();

    for key in keys {
        let value = env.var(key.as_ref());
        match (key.effect(), value) {
            (EnvEffect::DirectWrite(property), Some(value)) => {
                debug!(env = %key, property, "setting property from environment");
                config.insert(property, value);
            }
            (EnvEffect::CredentialPart(owner, role), Some(value)) => {
                let creds = match owner {
                    CredentialOwner::Kafka => &mut kafka,
                    CredentialOwner::SchemaRegistry => &mut registry,
                };
                creds.set(role, value);
            }
            (_, None) => warn!(env = %key, "requested environment variable is not set"),
        }
    }

    config.insert(SASL_JAAS_CONFIG, jaas_config(&kafka.key, &kafka.secret));
    config.insert(BASIC_AUTH_CREDENTIALS_SOURCE, USER_INFO_SOURCE);
    config.insert(USER_INFO_CONFIG, format!("{}:{}", registry.key, registry.secret));
    Ok(())
}

/// PLAIN login module entry for the given credentials.
///
/// Quotes and backslashes inside the credentials are backslash-escaped.
pub fn jaas_config(username: &str, password: &str) -> String {
    let username = jaas_quote(username);
    let password = jaas_quote(password);
    format!("{PLAIN_LOGIN_MODULE} required username='{username}' password='{password}';")
}

fn jaas_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '\'') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Debug, Default)]
struct Credentials {
    key: String,
    secret: String,
}

impl Credentials {
    fn set(&mut self, role: CredentialRole, value: String) {
        match role {
            CredentialRole::Key => self.key = value,
            CredentialRole::Secret => self.secret = value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn env(vars: &[(&str, &str)]) -> HashMap<String, String> {
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn env_key_names() {
        let names: Vec<String> = EnvKey::iter().map(|k| k.to_string()).collect();
        assert_eq!(
            names,
            [
                "BOOTSTRAP_SERVERS",
                "KAFKA_KEY",
                "KAFKA_SECRET",
                "SCHEMA_REGISTRY_URL",
                "SCHEMA_REGISTRY_KEY",
                "SCHEMA_REGISTRY_SECRET",
            ]
        );
        assert_eq!(EnvKey::from_str("KAFKA_SECRET").unwrap(), EnvKey::KafkaSecret);
        assert!(EnvKey::from_str("kafka_secret").is_err());
    }

    #[test]
    fn validate_passes_when_all_present() {
        let props: Properties = [("a", "1"), ("b", "2")].into_iter().collect();
        assert!(validate_required(&props, &["a", "b"]).is_ok());
        assert!(validate_required::<&str>(&props, &[]).is_ok());
    }

    #[test]
    fn validate_lists_every_missing_key() {
        let props: Properties = [("present", "x")].into_iter().collect();
        let err = validate_required(&props, &["B", "present", "A"]).unwrap_err();
        match err {
            ConfigError::MissingConfig { missing } => assert_eq!(missing, vec!["B", "A"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn validate_accepts_present_empty_values() {
        let props: Properties = [("a", ""), ("blank", "  ")].into_iter().collect();
        assert!(validate_required(&props, &["a", "blank"]).is_ok());
    }

    #[test]
    fn validate_reports_only_absent_keys() {
        let props: Properties = [("blank", "  "), ("ok", "v")].into_iter().collect();
        let err = validate_required(&props, &["blank", "absent", "ok"]).unwrap_err();
        let ConfigError::MissingConfig { missing } = err else {
            panic!("expected MissingConfig");
        };
        assert_eq!(missing, vec!["absent"]);
    }

    #[test]
    fn kafka_credentials_build_jaas() {
        let mut props = Properties::new();
        let env = env(&[("KAFKA_KEY", "user"), ("KAFKA_SECRET", "pass")]);
        load_from_environment_with(&mut props, &["KAFKA_KEY", "KAFKA_SECRET"], &env).unwrap();
        assert_eq!(
            props.get(SASL_JAAS_CONFIG),
            Some("org.apache.kafka.common.security.plain.PlainLoginModule required username='user' password='pass';")
        );
        assert_eq!(props.get(USER_INFO_CONFIG), Some(":"));
        assert_eq!(props.get(BASIC_AUTH_CREDENTIALS_SOURCE), Some("USER_INFO"));
    }

    #[test]
    fn kafka_secret_does_not_leak_into_registry_url() {
        let mut props = Properties::new();
        let env = env(&[("KAFKA_SECRET", "pass")]);
        load_from_environment_with(&mut props, &["KAFKA_SECRET"], &env).unwrap();
        assert!(!props.contains_key(SCHEMA_REGISTRY_URL_CONFIG));
    }

    #[test]
    fn bootstrap_only_still_writes_credentials() {
        let mut props = Properties::new();
        let env = env(&[("BOOTSTRAP_SERVERS", "broker1:9092")]);
        load_from_environment_with(&mut props, &["BOOTSTRAP_SERVERS"], &env).unwrap();
        assert_eq!(props.get(BOOTSTRAP_SERVERS_CONFIG), Some("broker1:9092"));
        assert_eq!(props.get(SASL_JAAS_CONFIG), Some(jaas_config("", "").as_str()));
        assert_eq!(props.get(USER_INFO_CONFIG), Some(":"));
        assert_eq!(props.len(), 4);
    }

    #[test]
    fn schema_registry_settings() {
        let mut props = Properties::new();
        let env = env(&[
            ("SCHEMA_REGISTRY_URL", "https://sr.example:8081"),
            ("SCHEMA_REGISTRY_KEY", "srk"),
            ("SCHEMA_REGISTRY_SECRET", "srs"),
        ]);
        let requested = ["SCHEMA_REGISTRY_URL", "SCHEMA_REGISTRY_KEY", "SCHEMA_REGISTRY_SECRET"];
        load_from_environment_with(&mut props, &requested, &env).unwrap();
        assert_eq!(props.get(SCHEMA_REGISTRY_URL_CONFIG), Some("https://sr.example:8081"));
        assert_eq!(props.get(USER_INFO_CONFIG), Some("srk:srs"));
        assert_eq!(props.get(BASIC_AUTH_CREDENTIALS_SOURCE), Some(USER_INFO_SOURCE));
    }

    #[test]
    fn unknown_key_fails_without_writing() {
        let mut props: Properties = [("existing", "1")].into_iter().collect();
        let before = props.clone();
        let env = env(&[("BOOTSTRAP_SERVERS", "b:9092")]);
        let err = load_from_environment_with(&mut props, &["BOOTSTRAP_SERVERS", "FOO"], &env)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownConfigKey(ref k) if k == "FOO"));
        assert_eq!(props, before);
    }

    #[test]
    fn unset_variable_is_skipped() {
        let mut props = Properties::new();
        load_from_environment_with(&mut props, &["BOOTSTRAP_SERVERS"], &HashMap::<String, String>::new()).unwrap();
        assert!(!props.contains_key(BOOTSTRAP_SERVERS_CONFIG));
        let err = validate_required(&props, &[BOOTSTRAP_SERVERS_CONFIG]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingConfig { .. }));
    }

    #[test]
    fn environment_overrides_file_values() {
        let mut props: Properties = [(BOOTSTRAP_SERVERS_CONFIG, "file:9092")].into_iter().collect();
        let env = env(&[("BOOTSTRAP_SERVERS", "env:9092")]);
        load_from_environment_with(&mut props, &["BOOTSTRAP_SERVERS"], &env).unwrap();
        assert_eq!(props.get(BOOTSTRAP_SERVERS_CONFIG), Some("env:9092"));
    }
}
