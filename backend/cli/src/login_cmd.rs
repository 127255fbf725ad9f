//! `portalchat login` / `portalchat logout`

use anyhow::{bail, Result};
use portalchat_core::{Credentials, ErrorKind, PortalAvailability};

use crate::app::App;
use crate::terminal_output::{note_error, note_success, note_warn};

pub async fn login(
    app: &App,
    username: String,
    password: String,
    base_url: Option<String>,
) -> Result<()> {
    let Some(base_url) = base_url.or_else(|| app.config.backend.base_url.clone()) else {
        bail!("No backend URL: pass --base-url or set backend.baseUrl / PORTALCHAT_BASE_URL");
    };
    let credentials = Credentials::new(username, password, base_url);

    let result = app.client.login(&credentials).await;
    if !result.success {
        note_error(&result.message);
        bail!("login failed");
    }

    match (&result.error_kind, &result.availability) {
        (Some(ErrorKind::InsufficientPortalPermissions), _) => note_warn(&result.message),
        (_, Some(PortalAvailability::StaleFallback(_))) => {
            note_success(&result.message);
            note_warn("No writable portal confirmed; using configured fallback portals.");
        }
        _ => note_success(&result.message),
    }
    Ok(())
}

pub async fn logout(app: &App) -> Result<()> {
    app.client.logout().await?;
    note_success("Logged out.");
    Ok(())
}
