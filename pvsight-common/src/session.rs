use zenoh::Session;

use crate::config::{TlsConfig, ZenohConfig};
use crate::error::{Error, Result};

/// Build a `zenoh::Config` from the bridge's Zenoh settings.
pub fn build_config(config: &ZenohConfig) -> Result<zenoh::Config> {
    config.validate()?;

    let mut zenoh_config = zenoh::Config::default();

    insert(&mut zenoh_config, "mode", &format!("\"{}\"", config.mode))?;

    if !config.connect.is_empty() {
        let endpoints_json = serde_json::to_string(&config.connect)?;
        insert(&mut zenoh_config, "connect/endpoints", &endpoints_json)?;
    }

    if !config.listen.is_empty() {
        let endpoints_json = serde_json::to_string(&config.listen)?;
        insert(&mut zenoh_config, "listen/endpoints", &endpoints_json)?;
    }

    if let Some(tls) = &config.tls {
        apply_tls(&mut zenoh_config, tls)?;
    }

    Ok(zenoh_config)
}

fn apply_tls(zenoh_config: &mut zenoh::Config, tls: &TlsConfig) -> Result<()> {
    let path_json = |path: &std::path::Path| serde_json::to_string(&path.display().to_string());

    insert(
        zenoh_config,
        "transport/link/tls/root_ca_certificate",
        &path_json(tls.root_ca_certificate.as_path())?,
    )?;
    insert(
        zenoh_config,
        "transport/link/tls/verify_name_on_connect",
        &tls.verify_name_on_connect.to_string(),
    )?;

    if let (Some(cert), Some(key)) = (&tls.connect_certificate, &tls.connect_private_key) {
        insert(zenoh_config, "transport/link/tls/enable_mtls", "true")?;
        insert(
            zenoh_config,
            "transport/link/tls/connect_certificate",
            &path_json(cert.as_path())?,
        )?;
        insert(
            zenoh_config,
            "transport/link/tls/connect_private_key",
            &path_json(key.as_path())?,
        )?;
    }

    Ok(())
}

fn insert(zenoh_config: &mut zenoh::Config, key: &str, value: &str) -> Result<()> {
    zenoh_config
        .insert_json5(key, value)
        .map_err(|e| Error::Config(format!("Failed to set {}: {}", key, e)))
}

/// Open a Zenoh session using the provided configuration.
pub async fn connect(config: &ZenohConfig) -> Result<Session> {
    let zenoh_config = build_config(config)?;

    tracing::info!(
        mode = %config.mode,
        connect = ?config.connect,
        listen = ?config.listen,
        tls = config.tls.is_some(),
        mtls = config.tls.as_ref().is_some_and(TlsConfig::is_mtls),
        "Connecting to Zenoh"
    );

    let session = zenoh::open(zenoh_config).await?;

    tracing::info!(zid = %session.zid(), "Connected to Zenoh");

    Ok(session)
}
