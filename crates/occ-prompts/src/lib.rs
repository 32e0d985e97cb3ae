pub mod cache;
pub mod db;
pub mod error;
pub mod repository;
pub mod router;
pub mod types;

pub use error::{PromptError, Result};
pub use repository::TemplateRepository;
pub use router::PromptTemplateRouter;
pub use types::{SelectionContext, Template, TemplateStats};

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rusqlite::Connection;

    use occ_vector::VectorGateway;

    use super::*;

    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl occ_core::Embedder for FixedEmbedder {
        async fn embed(&self, _text: &str) -> occ_core::Result<Vec<f32>> {
            Ok(self.0.clone())
        }
    }

    fn router(score: Vec<f32>) -> PromptTemplateRouter {
        let vectors = VectorGateway::new(Connection::open_in_memory().unwrap()).unwrap();
        let repo = TemplateRepository::new(Connection::open_in_memory().unwrap()).unwrap();
        PromptTemplateRouter::new(vectors, Box::new(FixedEmbedder(score)), repo)
    }

    fn template(id: &str, is_default: bool) -> Template {
        Template {
            id: id.to_string(),
            name: id.to_string(),
            content: format!("content for {id}"),
            category: "general".to_string(),
            triggers: vec!["debug".to_string()],
            allowed_groups: vec![],
            is_default,
            is_active: true,
            model_preferences: vec![],
        }
    }

    #[tokio::test]
    async fn falls_back_to_default_when_no_candidate_clears_the_floor() {
        let r = router(vec![1.0, 0.0]).with_score_floor(0.9);
        r.create(&template("fallback-default", true)).unwrap();
        // No embedding indexed, so search against the zero vector never
        // clears the floor; the router must fall back to the default.
        let selected = r.select_template_for_query("u1", "hello", None).await.unwrap();
        assert_eq!(selected.id, "fallback-default");
    }

    #[tokio::test]
    async fn select_template_for_query_is_cached() {
        let r = router(vec![1.0, 0.0]).with_score_floor(0.9);
        r.create(&template("fallback-default", true)).unwrap();
        r.select_template_for_query("u1", "hello", None).await.unwrap();

        let stats_after_first = r.get_stats().unwrap();
        let selections_after_first: u64 = stats_after_first.iter().map(|s| s.selections).sum();

        r.select_template_for_query("u1", "hello", None).await.unwrap();
        let stats_after_second = r.get_stats().unwrap();
        let selections_after_second: u64 = stats_after_second.iter().map(|s| s.selections).sum();

        assert_eq!(selections_after_first, selections_after_second);
    }

    #[tokio::test]
    async fn assign_invalidates_only_that_users_cache_entries() {
        let r = router(vec![1.0, 0.0]).with_score_floor(0.9);
        r.create(&template("fallback-default", true)).unwrap();
        r.select_template_for_query("u1", "hello", None).await.unwrap();
        r.assign("u1", "fallback-default", "admin").unwrap();
        assert!(r.cache.get("u1", "hello").is_none());
    }
}
