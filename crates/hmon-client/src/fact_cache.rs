//! Last-known fact values per session, with a TTL so a caller reading
//! `get_fact` long after the last poll gets `None` instead of stale data.

use crate::session_id::SessionId;
use hmon_protocol::{Fact, FactKind};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct CachedFact {
    fact: Fact,
    fetched_at: Instant,
}

#[derive(Clone)]
pub struct FactCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<(SessionId, FactKind), CachedFact>>>,
}

impl FactCache {
    pub fn new(ttl: Duration) -> Self {
        FactCache { ttl, entries: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub async fn record(&self, session_id: SessionId, facts: impl IntoIterator<Item = Fact>) {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        for fact in facts {
            entries.insert((session_id, fact.kind()), CachedFact { fact, fetched_at: now });
        }
    }

    pub async fn get(&self, session_id: SessionId, kind: FactKind) -> Option<Fact> {
        self.get_with_timestamp(session_id, kind).await.map(|(fact, _)| fact)
    }

    /// A stale entry is removed here, not just hidden — spec.md §3 treats "on
    /// read, remove and report absent" as the TTL contract, not "report
    /// absent and leave it for later".
    pub async fn get_with_timestamp(&self, session_id: SessionId, kind: FactKind) -> Option<(Fact, Instant)> {
        let mut entries = self.entries.write().await;
        let key = (session_id, kind);
        let expired = entries.get(&key).is_some_and(|cached| cached.fetched_at.elapsed() > self.ttl);
        if expired {
            entries.remove(&key);
            return None;
        }
        entries.get(&key).map(|cached| (cached.fact.clone(), cached.fetched_at))
    }

    /// Drop every cached fact for a session once its connection is gone —
    /// stale snapshots from a dead session should not answer `get_fact`.
    pub async fn clear_session(&self, session_id: SessionId) {
        let mut entries = self.entries.write().await;
        entries.retain(|(sid, _), _| *sid != session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hmon_protocol::{FactValue, ThreadCountFact};

    fn fact() -> Fact {
        Fact::new(FactValue::ThreadCount(ThreadCountFact { total: 4, suspended: 1 }))
    }

    #[tokio::test]
    async fn records_and_reads_back() {
        let cache = FactCache::new(Duration::from_secs(60));
        let session = SessionId::new();
        cache.record(session, vec![fact()]).await;
        let got = cache.get(session, FactKind::ThreadCount).await.unwrap();
        assert_eq!(got, fact());
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let cache = FactCache::new(Duration::from_millis(1));
        let session = SessionId::new();
        cache.record(session, vec![fact()]).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get(session, FactKind::ThreadCount).await.is_none());
    }

    #[tokio::test]
    async fn clear_session_drops_only_that_session() {
        let cache = FactCache::new(Duration::from_secs(60));
        let a = SessionId::new();
        let b = SessionId::new();
        cache.record(a, vec![fact()]).await;
        cache.record(b, vec![fact()]).await;
        cache.clear_session(a).await;
        assert!(cache.get(a, FactKind::ThreadCount).await.is_none());
        assert!(cache.get(b, FactKind::ThreadCount).await.is_some());
    }
}
