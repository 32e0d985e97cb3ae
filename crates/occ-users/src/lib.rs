pub mod admin;
pub mod apikey;
pub mod db;
pub mod error;
pub mod manager;
pub mod types;

pub use admin::AdminControlPlane;
pub use error::{Result, UserError};
pub use manager::UserManager;
pub use types::{AccessRequest, AccessRequestStatus, ApiKeyRecord, RateLimitTier, RateLimits, User};

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::*;

    #[test]
    fn create_or_get_is_idempotent() {
        let mgr = UserManager::new(Connection::open_in_memory().unwrap()).unwrap();
        let a = mgr.create_or_get("u1").unwrap();
        let b = mgr.create_or_get("u1").unwrap();
        assert_eq!(a.id, b.id);
        assert!(!a.is_admin);
    }

    #[test]
    fn issued_key_verifies_and_revocation_blocks_it() {
        let mgr = UserManager::new(Connection::open_in_memory().unwrap()).unwrap();
        mgr.create_or_get("u1").unwrap();
        let (plaintext, record) = mgr.issue_api_key("u1", false, RateLimitTier::Standard, None).unwrap();

        let verified = mgr.verify_api_key(&plaintext).unwrap();
        assert_eq!(verified.user_id, "u1");

        mgr.revoke_api_key(&record.id).unwrap();
        assert!(mgr.verify_api_key(&plaintext).is_err());
    }

    #[test]
    fn admin_control_plane_bumps_invalidation_on_write() {
        let admin = AdminControlPlane::new(Connection::open_in_memory().unwrap()).unwrap();
        let mut rx = admin.subscribe_invalidation();
        let before = *rx.borrow();
        admin.set_runtime_config("routing.default_model", "gpt-5").unwrap();
        rx.mark_changed();
        let after = *rx.borrow();
        assert!(after > before);
        assert_eq!(admin.get_runtime_config("routing.default_model").unwrap().as_deref(), Some("gpt-5"));
    }

    #[test]
    fn access_request_lifecycle() {
        let admin = AdminControlPlane::new(Connection::open_in_memory().unwrap()).unwrap();
        let req = admin.request_access("u1", "install_software").unwrap();
        assert_eq!(admin.list_pending_requests().unwrap().len(), 1);
        admin.decide_request(&req.id, true, "admin-1").unwrap();
        assert!(admin.list_pending_requests().unwrap().is_empty());
        assert!(admin.decide_request(&req.id, true, "admin-1").is_err());
    }

    #[test]
    fn allowed_user_list_round_trips() {
        let admin = AdminControlPlane::new(Connection::open_in_memory().unwrap()).unwrap();
        assert!(!admin.is_user_allowed("u1").unwrap());
        admin.allow_user("u1").unwrap();
        assert!(admin.is_user_allowed("u1").unwrap());
        admin.disallow_user("u1").unwrap();
        assert!(!admin.is_user_allowed("u1").unwrap());
    }
}
