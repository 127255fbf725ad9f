//! User-managed portal configurations in SQLite. Parameters are stored as a
//! JSON object; `IndexMap` keeps their order across the round trip.

use anyhow::{Context, Result};
use async_trait::async_trait;
use indexmap::IndexMap;
use portalchat_core::{PortalConfig, PortalConfigRepository, PortalId, PortalParameter};
use rusqlite::{params, OptionalExtension, Row};

use crate::sqlite::SqliteDatabase;

#[derive(Clone)]
pub struct SqlitePortalConfigRepository {
    db: SqliteDatabase,
}

impl SqlitePortalConfigRepository {
    pub fn new(db: SqliteDatabase) -> Self {
        Self { db }
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<(String, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn to_config((id, name, description, parameters): (String, String, String, String)) -> Result<PortalConfig> {
    let parameters: IndexMap<String, PortalParameter> = serde_json::from_str(&parameters)
        .with_context(|| format!("Corrupt parameters for portal {id}"))?;
    Ok(PortalConfig {
        id: PortalId::new(id),
        name,
        description,
        parameters,
    })
}

#[async_trait]
impl PortalConfigRepository for SqlitePortalConfigRepository {
    async fn save(&self, config: &PortalConfig) -> Result<()> {
        let parameters = serde_json::to_string(&config.parameters)?;
        let config = config.clone();
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO portal_configs (id, name, description, parameters, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(id) DO UPDATE SET name = excluded.name,
                        description = excluded.description,
                        parameters = excluded.parameters,
                        updated_at = excluded.updated_at",
                    params![
                        config.id.as_str(),
                        config.name,
                        config.description,
                        parameters,
                        chrono::Utc::now().to_rfc3339(),
                    ],
                )
                .context("Failed to save portal config")?;
                Ok(())
            })
            .await
    }

    async fn load(&self, id: &PortalId) -> Result<Option<PortalConfig>> {
        let id = id.as_str().to_string();
        let row = self
            .db
            .call(move |conn| {
                conn.query_row(
                    "SELECT id, name, description, parameters FROM portal_configs WHERE id = ?1",
                    params![id],
                    read_row,
                )
                .optional()
                .context("Failed to load portal config")
            })
            .await?;
        row.map(to_config).transpose()
    }

    async fn list(&self) -> Result<Vec<PortalConfig>> {
        let rows = self
            .db
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, description, parameters FROM portal_configs
                     ORDER BY name COLLATE NOCASE, id",
                )?;
                let rows = stmt
                    .query_map([], read_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(rows)
            })
            .await?;
        rows.into_iter().map(to_config).collect()
    }

    async fn delete(&self, id: &PortalId) -> Result<()> {
        let id = id.as_str().to_string();
        self.db
            .call(move |conn| {
                conn.execute("DELETE FROM portal_configs WHERE id = ?1", params![id])
                    .context("Failed to delete portal config")?;
                Ok(())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> SqlitePortalConfigRepository {
        SqlitePortalConfigRepository::new(SqliteDatabase::in_memory().unwrap())
    }

    fn contracts() -> PortalConfig {
        let mut question = PortalParameter::text("");
        question.kind = "textarea".into();
        question.required = true;
        question.description = "Your question".into();

        let mut file = PortalParameter::text("data:application/pdf;base64,JVBERi0=");
        file.kind = "file".into();

        PortalConfig::new("12", "Contracts")
            .with_parameter("ZETA", PortalParameter::text("last-alphabetically"))
            .with_parameter("QUESTION", question)
            .with_parameter("ATTACHMENT", file)
    }

    #[tokio::test]
    async fn test_round_trip_preserves_parameters() {
        let repo = repo();
        let saved = contracts();
        repo.save(&saved).await.unwrap();

        let loaded = repo.load(&PortalId::from("12")).await.unwrap().unwrap();
        assert_eq!(loaded, saved);
        let keys: Vec<&str> = loaded.parameters.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["ZETA", "QUESTION", "ATTACHMENT"]);
        for (name, param) in &saved.parameters {
            let other = &loaded.parameters[name];
            assert_eq!(
                (&other.value, &other.kind, other.required),
                (&param.value, &param.kind, param.required)
            );
        }
    }

    #[tokio::test]
    async fn test_save_overwrites_and_delete() {
        let repo = repo();
        repo.save(&contracts()).await.unwrap();
        repo.save(&PortalConfig::new("12", "Contracts v2")).await.unwrap();
        repo.save(&PortalConfig::new("3", "Archive")).await.unwrap();

        let names: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Archive", "Contracts v2"]);

        repo.delete(&PortalId::from("12")).await.unwrap();
        assert!(repo.load(&PortalId::from("12")).await.unwrap().is_none());
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }
}
