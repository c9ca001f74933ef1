use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, PointId, PointStruct, ScrollPointsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

use crate::database::qdrant_config::create_qdrant_client;
use crate::database::vector_db::{IndexEntry, ListedEntry, ScoredEntry, VectorStore};
use crate::error::{RagError, Result};

const BACKEND: &str = "qdrant";

#[derive(Debug, Clone)]
pub struct QdrantSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub collection: String,
    pub dimensions: usize,
    pub page_size: u32,
}

/// [`VectorStore`] over one Qdrant collection with cosine distance.
///
/// The client is built at most once, on first use, no matter how many requests race
/// for it. The collection is created (if missing) once, before the first operation.
pub struct QdrantStore {
    settings: QdrantSettings,
    client: OnceCell<Qdrant>,
    collection_ready: OnceCell<()>,
}

impl QdrantStore {
    pub fn new(settings: QdrantSettings) -> Self {
        Self {
            settings,
            client: OnceCell::new(),
            collection_ready: OnceCell::new(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.settings.collection
    }

    /// The shared client handle, created on the first call.
    pub async fn client(&self) -> Result<&Qdrant> {
        self.client
            .get_or_try_init(|| async {
                create_qdrant_client(&self.settings.url, self.settings.api_key.clone())
            })
            .await
    }

    async fn ready_client(&self) -> std::result::Result<&Qdrant, String> {
        let client = self.client().await.map_err(|e| e.to_string())?;
        self.collection_ready
            .get_or_try_init(|| self.ensure_collection(client))
            .await?;
        Ok(client)
    }

    async fn ensure_collection(&self, client: &Qdrant) -> std::result::Result<(), String> {
        let name = &self.settings.collection;
        let exists = client
            .collection_exists(name.as_str())
            .await
            .map_err(|e| e.to_string())?;
        if exists {
            debug!(collection = %name, "qdrant collection already exists");
            return Ok(());
        }

        client
            .create_collection(CreateCollectionBuilder::new(name.as_str()).vectors_config(
                VectorParamsBuilder::new(self.settings.dimensions as u64, Distance::Cosine),
            ))
            .await
            .map_err(|e| e.to_string())?;

        info!(collection = %name, dimensions = self.settings.dimensions, "created qdrant collection");
        Ok(())
    }

    fn check_dimensions(&self, vector: &[f32]) -> std::result::Result<(), String> {
        if vector.len() != self.settings.dimensions {
            return Err(format!(
                "vector has {} dimensions, index expects {}",
                vector.len(),
                self.settings.dimensions
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    fn dimensions(&self) -> usize {
        self.settings.dimensions
    }

    async fn upsert(&self, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let client = self
            .ready_client()
            .await
            .map_err(|e| RagError::index_write(BACKEND, e))?;

        let points = entries
            .iter()
            .map(|entry| {
                self.check_dimensions(&entry.vector)
                    .map_err(|e| RagError::index_write(BACKEND, e))?;
                let payload = Payload::try_from(Value::Object(entry.metadata.clone()))
                    .map_err(|e| RagError::index_write(BACKEND, e))?;
                Ok(PointStruct::new(entry.id.clone(), entry.vector.clone(), payload))
            })
            .collect::<Result<Vec<_>>>()?;

        client
            .upsert_points(UpsertPointsBuilder::new(self.collection(), points).wait(true))
            .await
            .map_err(|e| {
                error!(collection = %self.collection(), error = %e, "qdrant upsert failed");
                RagError::index_write(BACKEND, e)
            })?;

        debug!(collection = %self.collection(), count = entries.len(), "upserted entries");
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<ScoredEntry>> {
        self.check_dimensions(vector).map_err(RagError::Retrieval)?;
        let client = self.ready_client().await.map_err(RagError::Retrieval)?;

        let response = client
            .search_points(
                SearchPointsBuilder::new(self.collection(), vector.to_vec(), top_k as u64)
                    .with_payload(true),
            )
            .await
            .map_err(|e| RagError::Retrieval(format!("qdrant search failed: {}", e)))?;

        Ok(response
            .result
            .into_iter()
            .map(|point| ScoredEntry {
                id: point_id_string(point.id.as_ref()),
                score: point.score,
                metadata: payload_to_json(point.payload),
            })
            .collect())
    }

    async fn list(&self) -> Result<Vec<ListedEntry>> {
        let client = self.ready_client().await.map_err(RagError::Retrieval)?;

        let mut entries = Vec::new();
        let mut offset: Option<PointId> = None;
        loop {
            let mut request = ScrollPointsBuilder::new(self.collection())
                .limit(self.settings.page_size)
                .with_payload(true);
            if let Some(next) = offset.take() {
                request = request.offset(next);
            }

            let response = client
                .scroll(request)
                .await
                .map_err(|e| RagError::Retrieval(format!("qdrant scroll failed: {}", e)))?;

            entries.extend(response.result.into_iter().map(|point| ListedEntry {
                id: point_id_string(point.id.as_ref()),
                metadata: payload_to_json(point.payload),
            }));

            match response.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        debug!(collection = %self.collection(), count = entries.len(), "listed entries");
        Ok(entries)
    }
}

fn point_id_string(id: Option<&PointId>) -> String {
    match id.and_then(|id| id.point_id_options.as_ref()) {
        Some(PointIdOptions::Uuid(uuid)) => uuid.clone(),
        Some(PointIdOptions::Num(n)) => n.to_string(),
        None => String::new(),
    }
}

fn payload_to_json(payload: HashMap<String, QdrantValue>) -> Map<String, Value> {
    payload
        .into_iter()
        .map(|(key, value)| (key, value_to_json(value)))
        .collect()
}

fn value_to_json(value: QdrantValue) -> Value {
    match value.kind {
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(d)) => Number::from_f64(d).map(Value::Number).unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => {
            Value::Array(list.values.into_iter().map(value_to_json).collect())
        }
        Some(Kind::StructValue(object)) => Value::Object(payload_to_json(object.fields)),
        Some(Kind::NullValue(_)) | None => Value::Null,
    }
}
