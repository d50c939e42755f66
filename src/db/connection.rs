use std::time::Duration;

use anyhow::{Context, Result};
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod};
use postgres_native_tls::MakeTlsConnector;
use serde::{Deserialize, Serialize};
use tokio_postgres::{Client, NoTls};
use tracing::{error, info};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub ssl_mode: SslMode,
    /// Skip certificate verification. Use with caution.
    pub accept_invalid_certs: bool,
    /// Optional PEM file with extra root certificates.
    pub ca_cert_path: Option<String>,
    /// Connections kept by [`pool`].
    pub pool_size: usize,
}

/// Subset of the libpq `sslmode` values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    Require,
}

impl ConnectionConfig {
    pub fn connection_string(&self) -> String {
        let sslmode = match self.ssl_mode {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
        };
        format!(
            "host={} port={} dbname={} user={} password={} sslmode={} connect_timeout=10",
            quote_conn_value(&self.host),
            self.port,
            quote_conn_value(&self.database),
            quote_conn_value(&self.username),
            quote_conn_value(&self.password),
            sslmode
        )
    }

    pub fn display_string(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: 5432,
            database: String::from("postgres"),
            username: String::from("postgres"),
            password: String::new(),
            ssl_mode: SslMode::default(),
            accept_invalid_certs: false,
            ca_cert_path: None,
            pool_size: 8,
        }
    }
}

/// Open a single client. The connection task is spawned on the current
/// runtime.
pub async fn connect(config: &ConnectionConfig) -> Result<Client> {
    let conn_string = config.connection_string();
    let client = match config.ssl_mode {
        SslMode::Disable => {
            let (client, connection) =
                tokio::time::timeout(CONNECT_TIMEOUT, tokio_postgres::connect(&conn_string, NoTls))
                    .await
                    .map_err(|_| anyhow::anyhow!("Connection timed out after 15s"))?
                    .context("Failed to connect to PostgreSQL")?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Connection error: {}", e);
                }
            });
            client
        }
        SslMode::Prefer | SslMode::Require => {
            let tls = build_tls_connector(config)?;
            let (client, connection) =
                tokio::time::timeout(CONNECT_TIMEOUT, tokio_postgres::connect(&conn_string, tls))
                    .await
                    .map_err(|_| anyhow::anyhow!("Connection timed out after 15s"))?
                    .context("Failed to connect to PostgreSQL")?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Connection error: {}", e);
                }
            });
            client
        }
    };
    info!(server = %config.display_string(), "connected");
    Ok(client)
}

/// Build a connection pool. Connections are opened lazily.
pub fn pool(config: &ConnectionConfig) -> Result<Pool> {
    let pg_config: tokio_postgres::Config = config
        .connection_string()
        .parse()
        .context("Invalid connection settings")?;
    let manager_config = ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    };
    let manager = match config.ssl_mode {
        SslMode::Disable => Manager::from_config(pg_config, NoTls, manager_config),
        SslMode::Prefer | SslMode::Require => {
            Manager::from_config(pg_config, build_tls_connector(config)?, manager_config)
        }
    };
    let pool = Pool::builder(manager)
        .max_size(config.pool_size)
        .build()
        .context("Failed to build connection pool")?;
    info!(server = %config.display_string(), size = config.pool_size, "pool ready");
    Ok(pool)
}

fn build_tls_connector(config: &ConnectionConfig) -> Result<MakeTlsConnector> {
    let mut builder = native_tls::TlsConnector::builder();
    if config.accept_invalid_certs {
        builder.danger_accept_invalid_certs(true);
        builder.danger_accept_invalid_hostnames(true);
    } else if let Some(ca_path) = &config.ca_cert_path {
        let pem = std::fs::read(ca_path)
            .with_context(|| format!("Failed to read CA certificate file: {}", ca_path))?;
        let cert = native_tls::Certificate::from_pem(&pem)
            .with_context(|| format!("Failed to parse CA certificate: {}", ca_path))?;
        builder.add_root_certificate(cert);
    }
    let connector = builder.build().context("Failed to build TLS connector")?;
    Ok(MakeTlsConnector::new(connector))
}

/// Quote a value for use in a libpq key=value connection string.
fn quote_conn_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}
