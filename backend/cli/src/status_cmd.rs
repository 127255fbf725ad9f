//! `portalchat status`: stored session, portal availability, and config.

use anyhow::Result;
use portalchat_core::{PortalAvailability, PortalId};

use crate::app::App;
use crate::terminal_output::{field, note_info, note_warn};

pub async fn run(app: &App) -> Result<()> {
    let sessions = app.client.sessions();

    println!("\nPortalChat status\n");
    println!("{}", field("config", &app.config_path.display().to_string()));
    println!("{}", field("mode", &app.config.backend.mode.to_string()));

    let username = sessions.stored_username().await?;
    let base_url = sessions.stored_base_url().await?;
    println!("{}", field("user", username.as_deref().unwrap_or("-")));
    println!(
        "{}",
        field(
            "backend",
            base_url
                .as_deref()
                .or(app.config.backend.base_url.as_deref())
                .unwrap_or("-")
        )
    );

    match sessions.current_session().await? {
        Some(session) => {
            let expires = session.created_at + session.ttl;
            println!("{}", field("session", &format!("valid until {}", expires.to_rfc3339())));
        }
        None if username.is_some() => note_warn("Session expired; run `portalchat login` again."),
        None => note_info("Not logged in."),
    }

    if let Some(availability) = sessions.availability().await? {
        println!("{}", field("portals", &describe_availability(&availability)));
    }
    if let Some(default_id) = sessions.default_portal_id().await? {
        println!("{}", field("default portal", default_id.as_str()));
    }
    println!();
    Ok(())
}

fn describe_availability(availability: &PortalAvailability) -> String {
    let join = |ids: &[PortalId]| {
        ids.iter()
            .map(PortalId::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };
    match availability {
        PortalAvailability::Writable(writable) => format!("writable: {}", join(writable.ids())),
        PortalAvailability::StaleFallback(stale) => format!("fallback only: {}", join(stale)),
        PortalAvailability::NoSubmitPermission => "no submit permission".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portalchat_core::AvailablePortalIds;

    #[test]
    fn availability_descriptions() {
        let writable = PortalAvailability::Writable(AvailablePortalIds::new(vec![
            PortalId::from("7"),
            PortalId::from("9"),
        ]));
        assert_eq!(describe_availability(&writable), "writable: 7, 9");
        assert_eq!(
            describe_availability(&PortalAvailability::StaleFallback(vec![PortalId::from("1")])),
            "fallback only: 1"
        );
        assert_eq!(
            describe_availability(&PortalAvailability::NoSubmitPermission),
            "no submit permission"
        );
    }
}
