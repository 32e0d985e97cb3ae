use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::types::Template;

/// TTL cache keyed by `(userId, hash(query))` (§4.G "Cache"). Entries expire
/// lazily on read; mutation paths call `invalidate_user`/`invalidate_all`
/// rather than waiting out the TTL.
pub struct SelectionCache {
    entries: DashMap<(String, u64), (Template, Instant)>,
    ttl: Duration,
}

impl SelectionCache {
    pub fn new(ttl: Duration) -> Self {
        Self { entries: DashMap::new(), ttl }
    }

    pub fn get(&self, user_id: &str, query: &str) -> Option<Template> {
        let key = (user_id.to_string(), hash_query(query));
        let hit = self.entries.get(&key)?;
        let (template, inserted_at) = hit.value();
        if inserted_at.elapsed() > self.ttl {
            drop(hit);
            self.entries.remove(&key);
            return None;
        }
        Some(template.clone())
    }

    pub fn put(&self, user_id: &str, query: &str, template: Template) {
        let key = (user_id.to_string(), hash_query(query));
        self.entries.insert(key, (template, Instant::now()));
    }

    /// Invalidated on template create/update/delete: any user could have a
    /// stale cache entry referencing the changed template.
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }

    /// Invalidated on assignment change for a single user.
    pub fn invalidate_user(&self, user_id: &str) {
        self.entries.retain(|(uid, _), _| uid != user_id);
    }
}

fn hash_query(query: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    query.hash(&mut hasher);
    hasher.finish()
}
