use anyhow::Context;
use kafka_props::config::Settings;
use kafka_props::kafka::{client_config, ensure_topics, SchemaRegistryConfig};
use kafka_props::{load_from_environment, load_from_file, validate_required, Properties};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::new().context("reading PROBE_* settings")?;
    info!(?settings, "client-probe starting");

    let mut props = Properties::new();
    if let Some(path) = &settings.properties_file {
        load_from_file(&mut props, path).map_err(|e| {
            error!(%e, "loading properties file failed");
            e
        })?;
    }
    load_from_environment(&mut props, &settings.env_keys()).map_err(|e| {
        error!(%e, "reading environment failed");
        e
    })?;
    validate_required(&props, &settings.required()).map_err(|e| {
        error!(%e, "configuration incomplete");
        e
    })?;
    info!(config = ?props.redacted(), "client configuration assembled");

    match SchemaRegistryConfig::from_properties(&props) {
        Some(registry) => info!(
            url = %registry.url,
            basic_auth = registry.basic_auth.is_some(),
            "schema registry configured"
        ),
        None => info!("no schema registry configured"),
    }

    let topics = settings.topics();
    if !topics.is_empty() {
        let names: Vec<&str> = topics.iter().map(String::as_str).collect();
        ensure_topics(&client_config(&props), &names)
            .await
            .context("creating topics")?;
    }

    info!("client-probe finished");
    Ok(())
}
