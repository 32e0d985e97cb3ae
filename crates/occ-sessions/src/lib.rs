pub mod db;
pub mod error;
pub mod manager;
pub mod types;

pub use error::{Result, SessionError};
pub use manager::SessionManager;
pub use types::Session;

#[cfg(test)]
mod tests {
    use occ_core::types::Message;
    use rusqlite::Connection;

    use super::*;

    fn manager() -> SessionManager {
        SessionManager::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn create_then_get_round_trips() {
        let mgr = manager();
        let session = mgr.create("u1", Some("trip planning")).unwrap();
        let fetched = mgr.get(&session.id).unwrap().unwrap();
        assert_eq!(fetched.user_id, "u1");
        assert_eq!(fetched.title.as_deref(), Some("trip planning"));
        assert!(!fetched.deleted);
    }

    #[test]
    fn soft_delete_hides_from_default_listing() {
        let mgr = manager();
        let session = mgr.create("u1", None).unwrap();
        mgr.soft_delete(&session.id).unwrap();
        assert!(mgr.list_for_user("u1", 10, false).unwrap().is_empty());
        assert_eq!(mgr.list_for_user("u1", 10, true).unwrap().len(), 1);
        assert!(mgr.get(&session.id).unwrap().unwrap().deleted);
    }

    #[test]
    fn hard_delete_cascades_to_messages() {
        let mgr = manager();
        let session = mgr.create("u1", None).unwrap();
        let msg = Message::user(&session.id, "m1", "hello", "2026-01-01T00:00:00Z");
        mgr.append_message(&msg).unwrap();
        mgr.hard_delete(&session.id).unwrap();
        assert!(mgr.get(&session.id).unwrap().is_none());
        assert!(mgr.history(&session.id, 10).unwrap().is_empty());
    }

    #[test]
    fn history_is_chronological() {
        let mgr = manager();
        let session = mgr.create("u1", None).unwrap();
        mgr.append_message(&Message::user(&session.id, "m1", "first", "2026-01-01T00:00:00Z")).unwrap();
        mgr.append_message(&Message::user(&session.id, "m2", "second", "2026-01-01T00:00:01Z")).unwrap();
        let history = mgr.history(&session.id, 10).unwrap();
        assert_eq!(history[0].content, "first");
        assert_eq!(history[1].content, "second");
    }

    #[test]
    fn missing_session_operations_report_not_found() {
        let mgr = manager();
        let err = mgr.soft_delete("ghost").unwrap_err();
        assert!(matches!(err, SessionError::NotFound { .. }));
    }
}
