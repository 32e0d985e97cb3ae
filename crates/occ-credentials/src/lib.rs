pub mod db;
pub mod error;
pub mod provider;
pub mod store;
pub mod types;

pub use error::{CredentialError, Result};
pub use provider::{IdentityProvider, OAuthIdentityProvider};
pub use store::CredentialStore;
pub use types::{CredentialRecord, RefreshedToken, SERVICE_PRINCIPAL_SENTINEL};

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use rusqlite::Connection;

    use super::*;

    struct CountingProvider {
        calls: AtomicUsize,
        delay_ms: u64,
    }

    #[async_trait]
    impl IdentityProvider for CountingProvider {
        async fn refresh(
            &self,
            _user_id: &str,
            _refresh_token: &str,
        ) -> std::result::Result<RefreshedToken, CredentialError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(self.delay_ms)).await;
            Ok(RefreshedToken {
                access_token: "new-access-token".to_string(),
                id_token: None,
                refresh_token: None,
                expires_at: Utc::now() + Duration::hours(1),
                scope: "openid".to_string(),
            })
        }
    }

    fn store_with(provider: Arc<CountingProvider>) -> CredentialStore {
        let conn = Connection::open_in_memory().unwrap();
        CredentialStore::new(conn, provider).unwrap()
    }

    #[tokio::test]
    async fn get_returns_expired_without_refreshing() {
        let provider = Arc::new(CountingProvider { calls: AtomicUsize::new(0), delay_ms: 0 });
        let store = store_with(provider.clone());
        store
            .store(&CredentialRecord {
                user_id: "u1".into(),
                access_token: "old".into(),
                id_token: None,
                refresh_token: Some("r1".into()),
                expires_at: Utc::now() - Duration::seconds(5),
                scope: "openid".into(),
                tenant_id: None,
            })
            .unwrap();

        let (record, expired) = store.get("u1").unwrap();
        assert!(expired);
        assert_eq!(record.access_token, "old");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn service_principal_is_never_refreshed() {
        let provider = Arc::new(CountingProvider { calls: AtomicUsize::new(0), delay_ms: 0 });
        let store = store_with(provider.clone());
        store
            .store(&CredentialRecord {
                user_id: "svc".into(),
                access_token: "svc-token".into(),
                id_token: None,
                refresh_token: Some(SERVICE_PRINCIPAL_SENTINEL.to_string()),
                expires_at: Utc::now() - Duration::days(1),
                scope: "".into(),
                tenant_id: None,
            })
            .unwrap();

        let record = store.get_or_refresh("svc").await.unwrap();
        assert_eq!(record.access_token, "svc-token");
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    /// §8 scenario 6 / P5: two concurrent `get_or_refresh` calls for the same
    /// expired user perform exactly one upstream refresh and both observe
    /// the same, now-fresh, record.
    #[tokio::test]
    async fn concurrent_refresh_is_single_flight() {
        let provider = Arc::new(CountingProvider { calls: AtomicUsize::new(0), delay_ms: 50 });
        let store = Arc::new(store_with(provider.clone()));
        store
            .store(&CredentialRecord {
                user_id: "u1".into(),
                access_token: "old".into(),
                id_token: None,
                refresh_token: Some("r1".into()),
                expires_at: Utc::now() - Duration::seconds(5),
                scope: "openid".into(),
                tenant_id: None,
            })
            .unwrap();

        let s1 = Arc::clone(&store);
        let s2 = Arc::clone(&store);
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { s1.get_or_refresh("u1").await }),
            tokio::spawn(async move { s2.get_or_refresh("u1").await }),
        );

        let r1 = r1.unwrap().unwrap();
        let r2 = r2.unwrap().unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(r1.access_token, "new-access-token");
        assert_eq!(r2.access_token, "new-access-token");
        assert!(r1.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn missing_refresh_token_fails_without_calling_provider() {
        let provider = Arc::new(CountingProvider { calls: AtomicUsize::new(0), delay_ms: 0 });
        let store = store_with(provider.clone());
        store
            .store(&CredentialRecord {
                user_id: "u1".into(),
                access_token: "old".into(),
                id_token: None,
                refresh_token: None,
                expires_at: Utc::now() - Duration::seconds(5),
                scope: "".into(),
                tenant_id: None,
            })
            .unwrap();

        let err = store.get_or_refresh("u1").await.unwrap_err();
        assert!(matches!(err, CredentialError::TokenExpiredNoRefresh { .. }));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
