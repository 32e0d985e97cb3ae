use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::instrument;
use uuid::Uuid;

use occ_core::Embedder;
use occ_vector::{VectorFilter, VectorGateway, VectorHit};

use crate::error::Result;
use crate::types::{ResultType, SearchOptions, UnifiedResult};

const MEMORY_COLLECTION: &str = "user-memory";
const ARTIFACT_COLLECTION: &str = "user-artifacts";
const DOCUMENT_COLLECTION: &str = "app-documentation";

/// Fuses vector search across the collection families named in a `Search`
/// call, ranks the combined hits, and records a query/result-count analytics
/// row (§4.F). The document-privacy rule is layered in as post-search
/// filtering because `VectorFilter` only expresses AND-equality, not the
/// "owner OR not-private" disjunction §4.F requires.
pub struct RetrievalOrchestrator {
    vectors: VectorGateway,
    embedder: Box<dyn Embedder>,
    log: Mutex<Connection>,
}

impl RetrievalOrchestrator {
    pub fn new(vectors: VectorGateway, embedder: Box<dyn Embedder>, log_conn: Connection) -> Result<Self> {
        crate::db::init_db(&log_conn)?;
        Ok(Self { vectors, embedder, log: Mutex::new(log_conn) })
    }

    #[instrument(skip(self, options), fields(user_id, query))]
    pub async fn search(&self, query: &str, user_id: &str, options: &SearchOptions) -> Result<Vec<UnifiedResult>> {
        let query_embedding = self.embedder.embed(query).await?;

        let mut results = Vec::new();
        // Over-fetch per family so post-filtering (threshold/time/privacy)
        // doesn't starve the final truncation below `limit`.
        let per_family_k = options.limit.saturating_mul(3).max(options.limit).max(1);

        if options.include_memories && type_allowed(options, ResultType::Memory) {
            results.extend(self.search_family(MEMORY_COLLECTION, ResultType::Memory, &query_embedding, per_family_k, user_id)?);
        }
        if options.include_artifacts && type_allowed(options, ResultType::Artifact) {
            results.extend(self.search_family(ARTIFACT_COLLECTION, ResultType::Artifact, &query_embedding, per_family_k, user_id)?);
        }
        if options.include_documents && type_allowed(options, ResultType::Document) {
            results.extend(self.search_family(DOCUMENT_COLLECTION, ResultType::Document, &query_embedding, per_family_k, user_id)?);
        }

        results.retain(|r| r.score >= options.threshold);
        if let Some(cutoff) = options.time_filter {
            results.retain(|r| r.created_at.map(|t| t >= cutoff).unwrap_or(true));
        }
        if !options.metadata_filters.is_empty() {
            // Metadata predicates were already applied per-family via
            // VectorFilter; nothing further to do here.
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(options.limit);

        self.record_search(user_id, query, results.len())?;
        Ok(results)
    }

    fn search_family(
        &self,
        collection: &str,
        result_type: ResultType,
        query_embedding: &[f32],
        k: usize,
        user_id: &str,
    ) -> Result<Vec<UnifiedResult>> {
        let filter = VectorFilter::default();
        let hits = match self.vectors.search(collection, query_embedding, k, &filter) {
            Ok(hits) => hits,
            // A family collection that was never provisioned yields no hits
            // rather than failing the whole search.
            Err(occ_vector::VectorError::CollectionMissing(_)) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(hits
            .into_iter()
            .filter(|hit| passes_privacy(hit, user_id))
            .map(|hit| to_unified(hit, result_type, collection))
            .collect())
    }

    fn record_search(&self, user_id: &str, query: &str, result_count: usize) -> Result<()> {
        let conn = self.log.lock().unwrap();
        conn.execute(
            "INSERT INTO retrieval_search_log (id, user_id, query, result_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Uuid::now_v7().to_string(),
                user_id,
                query,
                result_count as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

fn type_allowed(options: &SearchOptions, ty: ResultType) -> bool {
    options.types.is_empty() || options.types.contains(&ty)
}

fn passes_privacy(hit: &VectorHit, user_id: &str) -> bool {
    let is_private = hit.metadata.get("is_private").and_then(|v| v.as_bool()).unwrap_or(false);
    if !is_private {
        return true;
    }
    hit.metadata.get("owner_user_id").and_then(|v| v.as_str()) == Some(user_id)
}

fn to_unified(hit: VectorHit, result_type: ResultType, source: &str) -> UnifiedResult {
    let title = hit.metadata.get("title").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let content = hit.metadata.get("content").and_then(|v| v.as_str()).unwrap_or_default().to_string();
    let owner = hit.metadata.get("owner_user_id").and_then(|v| v.as_str()).map(str::to_string);
    let created_at = hit
        .metadata
        .get("created_at")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc));
    let reasons = hit
        .metadata
        .get("reasons")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();

    UnifiedResult {
        id: hit.id,
        result_type,
        title,
        content,
        score: hit.score,
        source: source.to_string(),
        user_id: owner,
        created_at,
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use occ_vector::{CollectionSchema, VectorRow};

    use super::*;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> occ_core::Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn orchestrator() -> RetrievalOrchestrator {
        let vectors = VectorGateway::new(Connection::open_in_memory().unwrap()).unwrap();
        vectors.ensure_collection(MEMORY_COLLECTION, CollectionSchema { dimension: 2 }).unwrap();
        vectors.ensure_collection(DOCUMENT_COLLECTION, CollectionSchema { dimension: 2 }).unwrap();
        RetrievalOrchestrator::new(
            vectors,
            Box::new(FixedEmbedder(vec![1.0, 0.0])),
            Connection::open_in_memory().unwrap(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn private_document_is_hidden_from_other_users() {
        let orch = orchestrator();
        orch.vectors
            .insert(
                DOCUMENT_COLLECTION,
                &[VectorRow {
                    id: "doc1".into(),
                    embedding: vec![1.0, 0.0],
                    metadata: json!({"title": "t", "content": "c", "is_private": true, "owner_user_id": "alice"}),
                    owner_user_id: Some("alice".into()),
                }],
            )
            .unwrap();

        let opts = SearchOptions::default();
        let as_owner = orch.search("q", "alice", &opts).await.unwrap();
        assert_eq!(as_owner.len(), 1);

        let as_other = orch.search("q", "bob", &opts).await.unwrap();
        assert!(as_other.is_empty());
    }

    #[tokio::test]
    async fn results_are_sorted_and_truncated_to_limit() {
        let orch = orchestrator();
        orch.vectors
            .insert(
                MEMORY_COLLECTION,
                &[
                    VectorRow { id: "m1".into(), embedding: vec![1.0, 0.0], metadata: json!({"title": "a"}), owner_user_id: None },
                    VectorRow { id: "m2".into(), embedding: vec![0.0, 1.0], metadata: json!({"title": "b"}), owner_user_id: None },
                ],
            )
            .unwrap();

        let opts = SearchOptions { limit: 1, ..SearchOptions::default() };
        let results = orch.search("q", "alice", &opts).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "m1");
    }

    #[tokio::test]
    async fn search_log_records_one_row_per_call() {
        let orch = orchestrator();
        orch.search("hello", "alice", &SearchOptions::default()).await.unwrap();
        orch.search("world", "alice", &SearchOptions::default()).await.unwrap();

        let count: i64 = orch
            .log
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM retrieval_search_log", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
