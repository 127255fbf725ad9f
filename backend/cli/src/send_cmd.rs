//! `portalchat send`

use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::debug;
use portalchat_core::{Attachment, CredentialVault, PortalConfig, PortalConfigRepository, PortalId};
use portalchat_portal::ChatRequest;

use crate::app::App;
use crate::terminal_output::note_error;

pub struct SendArgs {
    pub message: String,
    pub portal: Option<String>,
    pub file: Option<std::path::PathBuf>,
    pub password: Option<String>,
}

pub async fn run(app: &App, args: SendArgs) -> Result<()> {
    // Each invocation is a fresh process, so the vault starts empty.
    if let Some(password) = args.password.as_deref() {
        if let Some(username) = app.client.sessions().stored_username().await? {
            app.vault.store(&username, password, app.session_ttl()).await?;
        }
    }

    let mut request = ChatRequest::new(args.message);
    if let Some(path) = args.file.as_deref() {
        request = request.with_attachment(read_attachment(path).await?);
    }
    if let Some(id) = args.portal {
        let id = PortalId::new(id.as_str());
        let config = match app.portal_configs.load(&id).await? {
            Some(saved) => saved,
            None => {
                debug!(portal_id = %id, "No saved parameters; using the default form");
                PortalConfig::new(id, "")
            }
        };
        request = request.with_portal_config(config);
    }

    let response = app.client.send_chat_message(&request).await;
    if response.success {
        println!("{}", response.message);
        Ok(())
    } else {
        note_error(&response.message);
        let tag = response.error_kind.map(|k| k.tag()).unwrap_or_default();
        bail!("send failed {tag}");
    }
}

async fn read_attachment(path: &Path) -> Result<Attachment> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Ok(Attachment::new(mime.essence_str(), bytes))
}
