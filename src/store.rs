//! Generic document collections for the business data (sessions, materials,
//! payments, bookings). Filters are exact-match on top-level fields.

use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use sqlx::{types::Json, FromRow, PgPool};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tokio::sync::RwLock;
use uuid::Uuid;

pub type Document = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Sessions,
    Materials,
    Payments,
    Booked,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Sessions => "sessions",
            Collection::Materials => "materials",
            Collection::Payments => "payments",
            Collection::Booked => "booked",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InsertSummary {
    pub inserted_id: Uuid,
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSummary {
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSummary {
    pub deleted_count: u64,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, collection: Collection, doc: Document) -> anyhow::Result<InsertSummary>;
    /// Every document whose top-level fields include all of `filter`.
    async fn find(&self, collection: Collection, filter: Document) -> anyhow::Result<Vec<Document>>;
    async fn find_by_id(&self, collection: Collection, id: Uuid) -> anyhow::Result<Option<Document>>;
    /// Shallow-merges `patch` into the document.
    async fn update_by_id(
        &self,
        collection: Collection,
        id: Uuid,
        patch: Document,
    ) -> anyhow::Result<UpdateSummary>;
    async fn delete_by_id(&self, collection: Collection, id: Uuid) -> anyhow::Result<DeleteSummary>;
}

pub fn to_document<T: Serialize>(value: &T) -> anyhow::Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("expected a JSON object, got {other}"),
    }
}

/// Current time as stored in `createdAt` / `updatedAt` fields.
pub fn timestamp() -> anyhow::Result<Value> {
    Ok(Value::String(OffsetDateTime::now_utc().format(&Rfc3339)?))
}

/// Exposes the row id to clients the way the document carries it.
fn with_id(id: Uuid, mut doc: Document) -> Document {
    doc.insert("_id".into(), Value::String(id.to_string()));
    doc
}

fn matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(k, v)| doc.get(k) == Some(v))
}

#[derive(FromRow)]
struct DocumentRow {
    id: Uuid,
    body: Json<Document>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        with_id(row.id, row.body.0)
    }
}

#[derive(Clone)]
pub struct PgDocumentStore {
    db: PgPool,
}

impl PgDocumentStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert(&self, collection: Collection, mut doc: Document) -> anyhow::Result<InsertSummary> {
        doc.remove("_id");
        let (inserted_id,) = sqlx::query_as::<_, (Uuid,)>(
            r#"
            INSERT INTO documents (collection, body)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(collection.as_str())
        .bind(Json(doc))
        .fetch_one(&self.db)
        .await
        .with_context(|| format!("insert into {}", collection.as_str()))?;
        Ok(InsertSummary { inserted_id })
    }

    async fn find(&self, collection: Collection, filter: Document) -> anyhow::Result<Vec<Document>> {
        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, body
              FROM documents
             WHERE collection = $1 AND body @> $2
             ORDER BY created_at ASC
            "#,
        )
        .bind(collection.as_str())
        .bind(Json(filter))
        .fetch_all(&self.db)
        .await
        .with_context(|| format!("find in {}", collection.as_str()))?;
        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn find_by_id(&self, collection: Collection, id: Uuid) -> anyhow::Result<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, body
              FROM documents
             WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .with_context(|| format!("find {} by id", collection.as_str()))?;
        Ok(row.map(Document::from))
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        id: Uuid,
        mut patch: Document,
    ) -> anyhow::Result<UpdateSummary> {
        patch.remove("_id");
        let (matched, modified) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            WITH target AS (
                SELECT id, body @> $3 AS unchanged
                  FROM documents
                 WHERE collection = $1 AND id = $2
                   FOR UPDATE
            ), changed AS (
                UPDATE documents d
                   SET body = d.body || $3, updated_at = now()
                  FROM target t
                 WHERE d.id = t.id AND NOT t.unchanged
                RETURNING d.id
            )
            SELECT (SELECT count(*) FROM target), (SELECT count(*) FROM changed)
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Json(patch))
        .fetch_one(&self.db)
        .await
        .with_context(|| format!("update {} by id", collection.as_str()))?;
        Ok(UpdateSummary {
            matched_count: matched as u64,
            modified_count: modified as u64,
        })
    }

    async fn delete_by_id(&self, collection: Collection, id: Uuid) -> anyhow::Result<DeleteSummary> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.db)
            .await
            .with_context(|| format!("delete {} by id", collection.as_str()))?;
        Ok(DeleteSummary {
            deleted_count: result.rows_affected(),
        })
    }
}

/// In-process store with the same filter semantics, used by tests.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<Collection, Vec<(Uuid, Document)>>>,
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, collection: Collection, mut doc: Document) -> anyhow::Result<InsertSummary> {
        doc.remove("_id");
        let id = Uuid::new_v4();
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .push((id, doc));
        Ok(InsertSummary { inserted_id: id })
    }

    async fn find(&self, collection: Collection, filter: Document) -> anyhow::Result<Vec<Document>> {
        let guard = self.collections.read().await;
        Ok(guard
            .get(&collection)
            .into_iter()
            .flatten()
            .filter(|(_, doc)| matches(doc, &filter))
            .map(|(id, doc)| with_id(*id, doc.clone()))
            .collect())
    }

    async fn find_by_id(&self, collection: Collection, id: Uuid) -> anyhow::Result<Option<Document>> {
        let guard = self.collections.read().await;
        Ok(guard
            .get(&collection)
            .and_then(|docs| docs.iter().find(|(doc_id, _)| *doc_id == id))
            .map(|(id, doc)| with_id(*id, doc.clone())))
    }

    async fn update_by_id(
        &self,
        collection: Collection,
        id: Uuid,
        mut patch: Document,
    ) -> anyhow::Result<UpdateSummary> {
        patch.remove("_id");
        let mut guard = self.collections.write().await;
        let Some((_, doc)) = guard
            .get_mut(&collection)
            .and_then(|docs| docs.iter_mut().find(|(doc_id, _)| *doc_id == id))
        else {
            return Ok(UpdateSummary::default());
        };
        let modified = !matches(doc, &patch);
        doc.extend(patch);
        Ok(UpdateSummary {
            matched_count: 1,
            modified_count: modified as u64,
        })
    }

    async fn delete_by_id(&self, collection: Collection, id: Uuid) -> anyhow::Result<DeleteSummary> {
        let mut guard = self.collections.write().await;
        let docs = guard.entry(collection).or_default();
        let before = docs.len();
        docs.retain(|(doc_id, _)| *doc_id != id);
        Ok(DeleteSummary {
            deleted_count: (before - docs.len()) as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Value) -> Document {
        match v {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[tokio::test]
    async fn find_filters_on_exact_top_level_fields() {
        let store = MemoryDocumentStore::default();
        store
            .insert(Collection::Sessions, doc(json!({ "tutorEmail": "t@x.com", "title": "Rust" })))
            .await
            .unwrap();
        store
            .insert(Collection::Sessions, doc(json!({ "tutorEmail": "T@x.com", "title": "Go" })))
            .await
            .unwrap();
        store
            .insert(Collection::Materials, doc(json!({ "tutorEmail": "t@x.com" })))
            .await
            .unwrap();

        let found = store
            .find(Collection::Sessions, doc(json!({ "tutorEmail": "t@x.com" })))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["title"], json!("Rust"));
        assert!(found[0].contains_key("_id"));

        let all = store.find(Collection::Sessions, Document::new()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn update_reports_matched_and_modified() {
        let store = MemoryDocumentStore::default();
        let InsertSummary { inserted_id } = store
            .insert(Collection::Sessions, doc(json!({ "status": "pending" })))
            .await
            .unwrap();

        let first = store
            .update_by_id(Collection::Sessions, inserted_id, doc(json!({ "status": "approved" })))
            .await
            .unwrap();
        assert_eq!(first, UpdateSummary { matched_count: 1, modified_count: 1 });

        let again = store
            .update_by_id(Collection::Sessions, inserted_id, doc(json!({ "status": "approved" })))
            .await
            .unwrap();
        assert_eq!(again, UpdateSummary { matched_count: 1, modified_count: 0 });

        let missing = store
            .update_by_id(Collection::Sessions, Uuid::new_v4(), doc(json!({ "status": "x" })))
            .await
            .unwrap();
        assert_eq!(missing, UpdateSummary::default());
    }

    #[tokio::test]
    async fn delete_only_touches_its_collection() {
        let store = MemoryDocumentStore::default();
        let InsertSummary { inserted_id } = store
            .insert(Collection::Materials, doc(json!({ "link": "https://a" })))
            .await
            .unwrap();

        let wrong = store.delete_by_id(Collection::Sessions, inserted_id).await.unwrap();
        assert_eq!(wrong.deleted_count, 0);
        let right = store.delete_by_id(Collection::Materials, inserted_id).await.unwrap();
        assert_eq!(right.deleted_count, 1);
        assert!(store
            .find_by_id(Collection::Materials, inserted_id)
            .await
            .unwrap()
            .is_none());
    }
}
