use std::time::Duration;

use tracing::instrument;

use occ_core::Embedder;
use occ_vector::{VectorFilter, VectorGateway, VectorRow};

use crate::cache::SelectionCache;
use crate::error::Result;
use crate::repository::TemplateRepository;
use crate::types::{ScoredCandidate, SelectionContext, Template, TemplateStats};

const TEMPLATE_COLLECTION: &str = "prompt-templates";
const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default per-trigger bonus weight (§4.G step 3).
const TRIGGER_MATCH_WEIGHT: f32 = 2.0;
const GROUP_MATCH_BONUS: f32 = 1.0;
const DEFAULT_TIEBREAK_BONUS: f32 = 0.05;

/// Selects a system-prompt template by semantic intent and user group, with
/// a bounded TTL cache in front of the scoring pass (§4.G).
pub struct PromptTemplateRouter {
    vectors: VectorGateway,
    embedder: Box<dyn Embedder>,
    repo: TemplateRepository,
    pub(crate) cache: SelectionCache,
    score_floor: f32,
    candidate_pool: usize,
}

impl PromptTemplateRouter {
    pub fn new(vectors: VectorGateway, embedder: Box<dyn Embedder>, repo: TemplateRepository) -> Self {
        Self {
            vectors,
            embedder,
            repo,
            cache: SelectionCache::new(DEFAULT_TTL),
            score_floor: 0.2,
            candidate_pool: 5,
        }
    }

    pub fn with_score_floor(mut self, floor: f32) -> Self {
        self.score_floor = floor;
        self
    }

    #[instrument(skip(self, context), fields(user_id, query))]
    pub async fn select_template_for_query(
        &self,
        user_id: &str,
        query: &str,
        context: Option<&SelectionContext>,
    ) -> Result<Template> {
        if let Some(cached) = self.cache.get(user_id, query) {
            return Ok(cached);
        }

        let embed_text = match context.map(|c| c.recent_messages.as_slice()) {
            Some(recent) if !recent.is_empty() => format!("{}\n{}", recent.join("\n"), query),
            _ => query.to_string(),
        };
        let query_embedding = self.embedder.embed(&embed_text).await?;

        let hits = match self.vectors.search(
            TEMPLATE_COLLECTION,
            &query_embedding,
            self.candidate_pool,
            &VectorFilter::default(),
        ) {
            Ok(hits) => hits,
            Err(occ_vector::VectorError::CollectionMissing(_)) => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let user_groups = context.map(|c| c.user_groups.as_slice()).unwrap_or(&[]);
        let mut candidates = Vec::new();
        for hit in hits {
            if hit.score < self.score_floor {
                continue;
            }
            let template = match self.repo.get(&hit.id) {
                Ok(t) if t.is_active => t,
                _ => continue,
            };
            let bonus = trigger_bonus(&template, query) + group_bonus(&template, user_groups) + default_bonus(&template);
            candidates.push(ScoredCandidate { template, score: hit.score + bonus });
        }

        let selected = candidates
            .into_iter()
            .max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
            .map(|c| c.template)
            .map(Ok)
            .unwrap_or_else(|| self.repo.get_default())?;

        self.repo.record_selection(&selected.id)?;
        self.cache.put(user_id, query, selected.clone());
        Ok(selected)
    }

    pub fn get_default(&self) -> Result<Template> {
        self.repo.get_default()
    }

    #[instrument(skip(self))]
    pub fn assign(&self, user_id: &str, template_id: &str, by: &str) -> Result<()> {
        self.repo.assign(user_id, template_id, by)?;
        self.cache.invalidate_user(user_id);
        Ok(())
    }

    pub fn create(&self, template: &Template) -> Result<()> {
        self.repo.create(template)?;
        self.vectors.ensure_collection(TEMPLATE_COLLECTION, occ_vector::CollectionSchema::default())?;
        self.vectors.insert(
            TEMPLATE_COLLECTION,
            &[VectorRow {
                id: template.id.clone(),
                embedding: vec![0.0; occ_vector::CollectionSchema::default().dimension],
                metadata: serde_json::json!({"name": template.name, "template_id": template.id}),
                owner_user_id: None,
            }],
        )?;
        self.cache.invalidate_all();
        Ok(())
    }

    /// Re-embeds and stores the template's vector alongside its row. Kept
    /// separate from `create` so callers that already computed an embedding
    /// (e.g. the admin UI) don't pay for a redundant one.
    pub fn index_embedding(&self, template_id: &str, embedding: Vec<f32>) -> Result<()> {
        self.vectors.insert(
            TEMPLATE_COLLECTION,
            &[VectorRow { id: template_id.to_string(), embedding, metadata: serde_json::json!({}), owner_user_id: None }],
        )?;
        Ok(())
    }

    pub fn update(&self, template: &Template) -> Result<()> {
        self.repo.update(template)?;
        self.cache.invalidate_all();
        Ok(())
    }

    pub fn delete(&self, template_id: &str) -> Result<()> {
        self.repo.delete(template_id)?;
        let filter = VectorFilter {
            owner_user_id: None,
            metadata_equals: vec![("template_id".to_string(), serde_json::json!(template_id))],
        };
        self.vectors.delete(TEMPLATE_COLLECTION, &filter)?;
        self.cache.invalidate_all();
        Ok(())
    }

    pub fn get(&self, template_id: &str) -> Result<Template> {
        self.repo.get(template_id)
    }

    pub fn list(&self) -> Result<Vec<Template>> {
        self.repo.list()
    }

    pub fn get_stats(&self) -> Result<Vec<TemplateStats>> {
        self.repo.get_stats()
    }
}

fn trigger_bonus(template: &Template, query: &str) -> f32 {
    let query_lower = query.to_lowercase();
    let matches = template
        .triggers
        .iter()
        .filter(|trigger| query_lower.contains(&trigger.to_lowercase()))
        .count();
    matches as f32 * TRIGGER_MATCH_WEIGHT
}

fn group_bonus(template: &Template, user_groups: &[String]) -> f32 {
    if template.allowed_groups.is_empty() {
        return 0.0;
    }
    if user_groups.iter().any(|g| template.allowed_groups.contains(g)) {
        GROUP_MATCH_BONUS
    } else {
        0.0
    }
}

fn default_bonus(template: &Template) -> f32 {
    if template.is_default {
        DEFAULT_TIEBREAK_BONUS
    } else {
        0.0
    }
}
