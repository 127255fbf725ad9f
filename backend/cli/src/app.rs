//! Wiring: config, logging, storage and the portal client for one command.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use portalchat_config::{config_dir, config_file_path, database_path, load_and_prepare, PortalChatConfig};
use portalchat_core::CredentialVault;
use portalchat_logging::init_logger;
use portalchat_portal::{Collaborators, PortalClient};
use portalchat_store::{
    MemoryCredentialVault, SqliteDatabase, SqlitePortalConfigRepository, SqliteSessionStore,
};
use portalchat_transport::{ReqwestTransport, RetryPolicy, SystemConnectivity, TransportSettings};
use tracing::debug;

pub struct App {
    pub config: PortalChatConfig,
    pub config_path: PathBuf,
    pub client: PortalClient,
    pub portal_configs: SqlitePortalConfigRepository,
    pub vault: Arc<dyn CredentialVault>,
}

impl App {
    pub async fn bootstrap(config_override: Option<PathBuf>) -> Result<Self> {
        let dir = config_dir();
        let config_path = config_override.unwrap_or_else(|| config_file_path(&dir));
        let config = load_and_prepare(&config_path).await?;

        let log_dir = config.logging.dir.as_ref().map(PathBuf::from);
        init_logger(&config.logging.level, log_dir.as_deref(), config.logging.json);

        let db_path = database_path(&config, &dir);
        debug!(config = %config_path.display(), db = %db_path.display(), "Bootstrapping");
        let db = SqliteDatabase::open(&db_path)?;

        let transport = ReqwestTransport::new(transport_settings(&config))
            .context("Failed to build HTTP transport")?;
        let vault: Arc<dyn CredentialVault> = Arc::new(MemoryCredentialVault::new());
        let client = PortalClient::from_config(
            &config,
            Collaborators {
                transport: Arc::new(transport),
                connectivity: Arc::new(SystemConnectivity::new()),
                store: Arc::new(SqliteSessionStore::new(db.clone())),
                vault: vault.clone(),
            },
        );

        Ok(Self {
            config,
            config_path,
            client,
            portal_configs: SqlitePortalConfigRepository::new(db),
            vault,
        })
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.config.session.ttl_hours)
    }
}

pub fn transport_settings(config: &PortalChatConfig) -> TransportSettings {
    let http = &config.http;
    let defaults = TransportSettings::default();
    TransportSettings {
        connect_timeout: Duration::from_secs(http.connect_timeout_secs),
        request_timeout: Duration::from_secs(http.request_timeout_secs),
        user_agent: http.user_agent.clone().unwrap_or(defaults.user_agent),
        retry: RetryPolicy {
            max_attempts: http.max_attempts,
            base_delay_ms: http.retry_base_delay_ms,
            ..RetryPolicy::default()
        },
    }
}
