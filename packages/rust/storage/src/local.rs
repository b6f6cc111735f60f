//! libSQL-backed local record store (offline mode).
//!
//! Filters are evaluated in-process; records come back in insertion order.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use contentpipe_formula::Formula;
use contentpipe_shared::{ContentPipeError, FieldValue, Fields, Record, RecordId, Result};
use libsql::{Connection, Database, params};
use tracing::instrument;
use uuid::Uuid;

use crate::{RecordSource, migrations};

fn storage_err(e: libsql::Error) -> ContentPipeError {
    ContentPipeError::Storage(e.to_string())
}

/// Record store in a local libSQL file.
pub struct LocalStore {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl LocalStore {
    /// Open or create a database at `path` and apply pending migrations.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| ContentPipeError::io(parent, e))?;
            }
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let store = Self { db, conn };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    ContentPipeError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 before the first migration.
    async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    /// Every record in insertion order.
    pub async fn all(&self) -> Result<Vec<Record>> {
        let mut rows = self
            .conn
            .query("SELECT id, fields_json FROM records ORDER BY seq", params![])
            .await
            .map_err(storage_err)?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await.map_err(storage_err)? {
            let id = row.get::<String>(0).map_err(storage_err)?;
            let json = row.get::<String>(1).map_err(storage_err)?;
            records.push(Record::new(id, decode_fields(&json)?));
        }
        Ok(records)
    }
}

fn encode_fields(fields: &Fields) -> Result<String> {
    let map: serde_json::Map<String, serde_json::Value> = fields
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect();
    serde_json::to_string(&map).map_err(|e| ContentPipeError::Storage(e.to_string()))
}

fn decode_fields(json: &str) -> Result<Fields> {
    let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(json)
        .map_err(|e| ContentPipeError::Storage(format!("corrupt fields_json: {e}")))?;
    Ok(map
        .iter()
        .map(|(k, v)| (k.clone(), FieldValue::from_json(v)))
        .collect())
}

#[async_trait]
impl RecordSource for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    #[instrument(skip_all, fields(formula = %filter))]
    async fn list(&self, filter: &Formula) -> Result<Vec<Record>> {
        Ok(self
            .all()
            .await?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect())
    }

    /// Merges `fields` into the stored object in one statement. A null value
    /// removes the field.
    #[instrument(skip_all, fields(record = %id))]
    async fn update(&self, id: &RecordId, fields: &Fields) -> Result<()> {
        let patch = encode_fields(fields)?;
        let now = Utc::now().to_rfc3339();
        let changed = self
            .conn
            .execute(
                "UPDATE records SET fields_json = json_patch(fields_json, ?1), updated_at = ?2
                 WHERE id = ?3",
                params![patch.as_str(), now.as_str(), id.as_str()],
            )
            .await
            .map_err(storage_err)?;

        if changed == 0 {
            return Err(ContentPipeError::Storage(format!("record {id} not found")));
        }
        Ok(())
    }

    #[instrument(skip_all)]
    async fn create(&self, fields: &Fields) -> Result<RecordId> {
        let id = format!("rec{}", Uuid::now_v7().simple());
        let json = encode_fields(fields)?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO records (id, fields_json, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![id.as_str(), json.as_str(), now.as_str(), now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        Ok(RecordId(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> LocalStore {
        let tmp = std::env::temp_dir().join(format!("cp_test_{}.db", Uuid::now_v7()));
        LocalStore::open(&tmp).await.expect("open test db")
    }

    fn fields(pairs: &[(&str, &str)]) -> Fields {
        pairs.iter().map(|(k, v)| (k.to_string(), FieldValue::from(*v))).collect()
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let store = test_store().await;
        assert_eq!(store.schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let tmp = std::env::temp_dir().join(format!("cp_test_{}.db", Uuid::now_v7()));
        let first = LocalStore::open(&tmp).await.expect("first open");
        drop(first);
        let second = LocalStore::open(&tmp).await.expect("second open");
        assert_eq!(second.schema_version().await, 1);
    }

    #[tokio::test]
    async fn list_filters_in_insertion_order() {
        let store = test_store().await;
        let a = store.create(&fields(&[("state", "INIT"), ("title", "a")])).await.unwrap();
        store.create(&fields(&[("state", "PUBLISHED"), ("title", "b")])).await.unwrap();
        let c = store.create(&fields(&[("title", "c")])).await.unwrap();

        let formula = Formula::parse("OR({state} = 'INIT', {state} = '')").unwrap();
        let ids: Vec<_> = store.list(&formula).await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a, c]);
    }

    #[tokio::test]
    async fn update_merges_fields() {
        let store = test_store().await;
        let id = store
            .create(&fields(&[("state", "INIT"), ("source_content_text", "body")]))
            .await
            .unwrap();

        store
            .update(&id, &fields(&[("state", "REVIEW_REQUIRED"), ("article_text", "draft")]))
            .await
            .unwrap();

        let record = store.all().await.unwrap().remove(0);
        assert_eq!(record.text("state"), "REVIEW_REQUIRED");
        assert_eq!(record.text("article_text"), "draft");
        assert_eq!(record.text("source_content_text"), "body");
    }

    #[tokio::test]
    async fn update_missing_record_fails() {
        let store = test_store().await;
        let err = store
            .update(&RecordId::from("recMISSING"), &fields(&[("state", "INIT")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("recMISSING"));
    }
}
