//! Bridges assembled [`Properties`] to `rdkafka` and provides the topic
//! bootstrap helper used at client startup.

use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::ClientConfig;
use tracing::{debug, info, warn};

use crate::assembler::{
    BASIC_AUTH_CREDENTIALS_SOURCE, SASL_JAAS_CONFIG, SCHEMA_REGISTRY_URL_CONFIG, USER_INFO_CONFIG,
    USER_INFO_SOURCE,
};
use crate::properties::Properties;

/// Java client settings librdkafka rejects as unknown.
const JVM_ONLY_KEYS: &[&str] = &[
    "client.dns.lookup",
    "key.serializer",
    "value.serializer",
    "key.deserializer",
    "value.deserializer",
    "specific.avro.reader",
];

/// Prefixes of keys meant for the schema-registry client, not the broker client.
const REGISTRY_PREFIXES: &[&str] = &["schema.registry.", "basic.auth."];

/// Extracts `(username, password)` from a PLAIN login module JAAS entry.
pub fn parse_jaas_plain(jaas: &str) -> Option<(String, String)> {
    let (module, options) = jaas.split_once(" required")?;
    if !module.trim_end().ends_with("PlainLoginModule") {
        return None;
    }
    let options = jaas_options(options)?;
    let find = |name: &str| {
        options
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    };
    Some((find("username")?, find("password")?))
}

/// Parses `name='value' name="value" ...;` in order. Quoted values honour
/// backslash escapes. Returns `None` on malformed input.
fn jaas_options(input: &str) -> Option<Vec<(String, String)>> {
    let mut options = Vec::new();
    let mut chars = input.chars().peekable();
    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        match chars.peek() {
            None | Some(';') => return Some(options),
            _ => {}
        }
        let mut name = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
            name.push(c);
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        chars.next_if_eq(&'=')?;
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        let quote = chars.next_if(|c| *c == '\'' || *c == '"')?;
        let mut value = String::new();
        loop {
            match chars.next()? {
                '\\' => value.push(chars.next()?),
                c if c == quote => break,
                c => value.push(c),
            }
        }
        options.push((name, value));
    }
}

/// Builds an `rdkafka` client configuration from the assembled properties.
///
/// The JAAS entry is translated into `sasl.username`/`sasl.password`; keys
/// only the JVM or schema-registry clients understand are left out.
pub fn client_config(props: &Properties) -> ClientConfig {
    let mut cfg = ClientConfig::new();
    for (key, value) in props.iter() {
        if key == SASL_JAAS_CONFIG
            || JVM_ONLY_KEYS.contains(&key)
            || REGISTRY_PREFIXES.iter().any(|p| key.starts_with(p))
        {
            debug!(key, "not passed to librdkafka");
            continue;
        }
        cfg.set(key, value);
    }

    let credentials = props.get(SASL_JAAS_CONFIG).and_then(parse_jaas_plain);
    match credentials {
        Some((username, password)) if !username.is_empty() => {
            cfg.set("sasl.username", username);
            cfg.set("sasl.password", password);
            if cfg.get("sasl.mechanisms").is_none() && cfg.get("sasl.mechanism").is_none() {
                cfg.set("sasl.mechanisms", "PLAIN");
            }
            if cfg.get("security.protocol").is_none() {
                cfg.set("security.protocol", "SASL_SSL");
            }
        }
        Some(_) => warn!("JAAS config carries an empty username, SASL not configured"),
        None => {}
    }
    cfg
}

/// Connection settings for a schema-registry client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRegistryConfig {
    pub url: String,
    /// `(key, secret)` when basic auth is configured with non-empty parts.
    pub basic_auth: Option<(String, String)>,
}

impl SchemaRegistryConfig {
    /// Returns `None` when no registry URL is configured.
    pub fn from_properties(props: &Properties) -> Option<Self> {
        let url = props.get(SCHEMA_REGISTRY_URL_CONFIG)?.to_string();
        let basic_auth = match props.get(BASIC_AUTH_CREDENTIALS_SOURCE) {
            Some(USER_INFO_SOURCE) => props
                .get(USER_INFO_CONFIG)
                .and_then(|info| info.split_once(':'))
                .filter(|(key, secret)| !key.is_empty() || !secret.is_empty())
                .map(|(key, secret)| (key.to_string(), secret.to_string())),
            _ => None,
        };
        Some(Self { url, basic_auth })
    }
}

/// Ensure that the given Kafka topics exist.
///
/// Attempts to create each topic with a single partition and replication
/// factor 1. If the topic already exists the error is ignored.
pub async fn ensure_topics(config: &ClientConfig, topics: &[&str]) -> Result<(), KafkaError> {
    let admin: AdminClient<DefaultClientContext> = config.create()?;
    let new_topics: Vec<NewTopic> = topics
        .iter()
        .map(|t| NewTopic::new(t, 1, TopicReplication::Fixed(1)))
        .collect();
    let results = admin
        .create_topics(new_topics.iter(), &AdminOptions::new())
        .await?;
    for result in results {
        match result {
            Ok(name) => info!(topic = %name, "topic created"),
            Err((name, err)) if err == RDKafkaErrorCode::TopicAlreadyExists => {
                info!(topic = %name, "topic already exists")
            }
            Err((name, err)) => warn!(topic = %name, %err, "failed to create topic"),
        }
    }
    Ok(())
}
