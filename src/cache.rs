//! Memoization of resolved group memberships.

use crate::entry::{GroupEntry, normalize_dn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Which cached entries an invalidation affects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheScope {
    /// One subject's cached memberships.
    Subject(String),
    /// Everything. Used when an external event signals a directory-wide
    /// group change, since targeted invalidation cannot know which subjects
    /// are affected.
    All,
}

/// Memoizes resolved membership sets keyed by subject DN.
///
/// Entries expire after the configured TTL; expiry is lazy, enforced on
/// read, so no background sweep thread is needed while staleness stays
/// bounded. The cache is safe for concurrent get/put/invalidate but is not
/// a synchronization point: two concurrent callers may both miss and both
/// resolve, and the last writer wins. Resolution is idempotent and
/// read-mostly, so recomputation is cheaper than coordination.
///
/// One instance is created at service startup, handed to the
/// authenticator, reset through the external invalidation hook, and torn
/// down at shutdown. There is no ambient global cache.
#[derive(Debug)]
pub struct MembershipCache {
    groups: moka::sync::Cache<String, Arc<HashSet<GroupEntry>>>,
}

impl MembershipCache {
    /// Creates a cache whose entries expire `ttl` after they were stored.
    pub fn new(ttl: Duration) -> Self {
        MembershipCache {
            groups: moka::sync::Cache::builder()
                .max_capacity(10_000)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// The cached membership set for the subject, unless absent or expired.
    pub fn get(&self, subject_dn: &str) -> Option<Arc<HashSet<GroupEntry>>> {
        self.groups.get(&normalize_dn(subject_dn))
    }

    /// Stores the membership set for the subject, stamped now.
    pub fn put(&self, subject_dn: &str, groups: HashSet<GroupEntry>) {
        self.groups.insert(normalize_dn(subject_dn), Arc::new(groups));
    }

    /// Removes one subject's cached memberships.
    pub fn invalidate(&self, subject_dn: &str) {
        self.groups.invalidate(&normalize_dn(subject_dn));
    }

    /// Clears the entire cache.
    pub fn reset_all(&self) {
        self.groups.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups(names: &[&str]) -> HashSet<GroupEntry> {
        names
            .iter()
            .map(|n| GroupEntry::new(format!("cn={n},ou=groups,dc=example,dc=com"), vec![]))
            .collect()
    }

    #[test]
    fn get_after_put_returns_stored_set() {
        let cache = MembershipCache::new(Duration::from_secs(60));
        let dn = "uid=alice,ou=people,dc=example,dc=com";
        cache.put(dn, groups(&["eng", "staff"]));

        let hit = cache.get(dn).expect("fresh entry should be present");
        assert_eq!(hit.len(), 2);
    }

    #[test]
    fn subject_keys_compare_case_insensitively() {
        let cache = MembershipCache::new(Duration::from_secs(60));
        cache.put("UID=Alice,OU=People,DC=example,DC=com", groups(&["eng"]));
        assert!(cache.get("uid=alice,ou=people,dc=example,dc=com").is_some());
    }

    #[test]
    fn expired_entries_read_as_misses() {
        let cache = MembershipCache::new(Duration::from_millis(40));
        let dn = "uid=alice,ou=people,dc=example,dc=com";
        cache.put(dn, groups(&["eng"]));
        assert!(cache.get(dn).is_some());

        std::thread::sleep(Duration::from_millis(80));
        assert!(cache.get(dn).is_none(), "entry past its TTL must be a miss");
    }

    #[test]
    fn invalidate_removes_only_the_subject() {
        let cache = MembershipCache::new(Duration::from_secs(60));
        cache.put("uid=alice,ou=people,dc=example,dc=com", groups(&["eng"]));
        cache.put("uid=bob,ou=people,dc=example,dc=com", groups(&["ops"]));

        cache.invalidate("uid=alice,ou=people,dc=example,dc=com");
        assert!(cache.get("uid=alice,ou=people,dc=example,dc=com").is_none());
        assert!(cache.get("uid=bob,ou=people,dc=example,dc=com").is_some());
    }

    #[test]
    fn reset_all_flushes_every_subject() {
        let cache = MembershipCache::new(Duration::from_secs(60));
        cache.put("uid=alice,ou=people,dc=example,dc=com", groups(&["eng"]));
        cache.put("uid=bob,ou=people,dc=example,dc=com", groups(&["ops"]));

        cache.reset_all();
        assert!(cache.get("uid=alice,ou=people,dc=example,dc=com").is_none());
        assert!(cache.get("uid=bob,ou=people,dc=example,dc=com").is_none());
    }
}
