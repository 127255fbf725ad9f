//! `portalchat portals ...`: published portals and saved portal configs.

use anyhow::{bail, Result};
use portalchat_core::{PortalConfig, PortalConfigRepository, PortalId, PortalParameter};

use crate::app::App;
use crate::terminal_output::{note_error, note_info, note_success, render_table};

const DESCRIPTION_WIDTH: usize = 48;

/// Published portals visible to the current session. With `save`, each one
/// is stored as a portal config seeded from its input settings.
pub async fn list(app: &App, save: bool) -> Result<()> {
    let result = app.client.list_portals().await;
    if !result.success {
        note_error(&result.message);
        bail!("portal list unavailable");
    }
    if result.portals.is_empty() {
        note_info("No published portals.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = result
        .portals
        .iter()
        .map(|p| {
            vec![
                p.id.to_string(),
                p.name.clone(),
                p.parameters.len().to_string(),
                p.description.clone(),
            ]
        })
        .collect();
    print!(
        "{}",
        render_table(&["ID", "Name", "Params", "Description"], &rows, DESCRIPTION_WIDTH)
    );

    if save {
        for portal in &result.portals {
            app.portal_configs.save(&portal.to_portal_config()).await?;
        }
        note_success(&format!("Saved {} portal config(s).", result.portals.len()));
    }
    Ok(())
}

pub async fn saved(app: &App) -> Result<()> {
    let configs = app.portal_configs.list().await?;
    if configs.is_empty() {
        note_info("No saved portal configs.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = configs
        .iter()
        .map(|c| {
            let params = c
                .parameters
                .iter()
                .map(|(k, p)| format!("{k}={}", p.value))
                .collect::<Vec<_>>()
                .join(" ");
            vec![c.id.to_string(), c.name.clone(), params]
        })
        .collect();
    print!("{}", render_table(&["ID", "Name", "Parameters"], &rows, DESCRIPTION_WIDTH));
    Ok(())
}

/// Create or update a saved config. Existing parameters keep their position;
/// new ones are appended.
pub async fn set(
    app: &App,
    id: String,
    name: Option<String>,
    params: Vec<String>,
) -> Result<()> {
    let id = PortalId::new(id.as_str());
    let mut config = app
        .portal_configs
        .load(&id)
        .await?
        .unwrap_or_else(|| PortalConfig::new(id.clone(), ""));
    if let Some(name) = name {
        config.name = name;
    }
    apply_params(&mut config, &params)?;
    app.portal_configs.save(&config).await?;
    note_success(&format!("Saved portal config {id}."));
    Ok(())
}

pub async fn remove(app: &App, id: String) -> Result<()> {
    app.portal_configs.delete(&PortalId::new(id.as_str())).await?;
    note_success(&format!("Removed portal config {id}."));
    Ok(())
}

fn apply_params(config: &mut PortalConfig, params: &[String]) -> Result<()> {
    for raw in params {
        let Some((key, value)) = raw.split_once('=') else {
            bail!("Parameter must be KEY=VALUE, got {raw:?}");
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("Parameter name is empty in {raw:?}");
        }
        config
            .parameters
            .entry(key.to_string())
            .and_modify(|p| p.value = value.to_string())
            .or_insert_with(|| PortalParameter::text(value));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_update_in_place_and_append() {
        let mut config = PortalConfig::new("7", "Legal")
            .with_parameter("USERPROMPT", PortalParameter::text("old"))
            .with_parameter("LANG", PortalParameter::text("en"));

        apply_params(
            &mut config,
            &["LANG=zh-TW".to_string(), "TONE=formal=strict".to_string()],
        )
        .unwrap();

        let pairs: Vec<(&str, &str)> = config
            .parameters
            .iter()
            .map(|(k, p)| (k.as_str(), p.value.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![("USERPROMPT", "old"), ("LANG", "zh-TW"), ("TONE", "formal=strict")]
        );
    }

    #[test]
    fn malformed_params_are_rejected() {
        let mut config = PortalConfig::new("7", "Legal");
        assert!(apply_params(&mut config, &["novalue".to_string()]).is_err());
        assert!(apply_params(&mut config, &["=x".to_string()]).is_err());
        assert!(config.parameters.is_empty());
    }
}
