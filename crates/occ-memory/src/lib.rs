pub mod db;
pub mod error;
pub mod manager;
pub mod types;

pub use error::{MemoryError, Result};
pub use manager::MemoryManager;
pub use types::{Memory, MemoryFilters, MemoryKind, MemoryTier};

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::*;

    fn manager() -> MemoryManager {
        MemoryManager::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn recent_tier_is_ordered_by_recency_not_score() {
        let mgr = manager();
        mgr.record("u1", MemoryKind::ConversationSummary, "turn one", None, 0.9, &[], 10).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(2));
        mgr.record("u1", MemoryKind::ConversationSummary, "turn two", None, 0.1, &[], 10).unwrap();

        let results = mgr.search("u1", "", &MemoryFilters::default(), 10).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "turn two");
        assert!(results.iter().all(|m| matches!(m.tier, MemoryTier::Recent)));
    }

    #[test]
    fn long_term_tier_orders_by_composite_score() {
        let mgr = manager();
        mgr.record("u1", MemoryKind::DomainKnowledge, "likes rust programming", None, 0.9, &[], 5).unwrap();
        mgr.record("u1", MemoryKind::EntityFact, "likes rust climbing gear", None, 0.1, &[], 5).unwrap();

        let results = mgr.search("u1", "rust", &MemoryFilters::default(), 10).unwrap();
        let long_term: Vec<_> = results.iter().filter(|m| matches!(m.tier, MemoryTier::LongTerm)).collect();
        assert_eq!(long_term.len(), 2);
        assert!(long_term[0].score() >= long_term[1].score());
    }

    #[test]
    fn forget_removes_entry_and_its_index_row() {
        let mgr = manager();
        let id = mgr.record("u1", MemoryKind::DomainKnowledge, "temporary fact", None, 0.5, &[], 3).unwrap();
        mgr.forget(&id).unwrap();
        let results = mgr.search("u1", "temporary", &MemoryFilters::default(), 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn filters_restrict_to_requested_kinds() {
        let mgr = manager();
        mgr.record("u1", MemoryKind::DomainKnowledge, "python facts", None, 0.8, &[], 5).unwrap();
        mgr.record("u1", MemoryKind::EntityFact, "python the snake", None, 0.8, &[], 5).unwrap();

        let filters = MemoryFilters { kinds: vec![MemoryKind::EntityFact], min_relevance: None };
        let results = mgr.search("u1", "python", &filters, 10).unwrap();
        assert!(results.iter().all(|m| matches!(m.kind, MemoryKind::EntityFact)));
    }
}
