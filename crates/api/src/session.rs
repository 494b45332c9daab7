use advisor_core::questionnaire::AnswerSet;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_MAX_SESSIONS: usize = 10_000;

#[derive(Debug, Clone)]
struct Entry {
    answers: AnswerSet,
    last_seen: Instant,
}

/// Per-session answer sets, held in process memory only. Idle sessions expire after `ttl`, and
/// the least recently seen one is dropped once `max_sessions` is reached.
#[derive(Debug, Clone)]
pub struct SessionStore {
    entries: Arc<RwLock<HashMap<Uuid, Entry>>>,
    ttl: Duration,
    max_sessions: usize,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_limits(DEFAULT_TTL, DEFAULT_MAX_SESSIONS)
    }
}

impl SessionStore {
    pub fn with_limits(ttl: Duration, max_sessions: usize) -> Self {
        Self {
            entries: Arc::default(),
            ttl,
            max_sessions: max_sessions.max(1),
        }
    }

    pub fn new_session_id() -> Uuid {
        Uuid::new_v4()
    }

    /// Stores (or replaces) the session's answers. Returns true when live answers existed.
    pub async fn put_answers(&self, session_id: Uuid, answers: AnswerSet) -> bool {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let before = entries.len();
        entries.retain(|_, e| now.duration_since(e.last_seen) < self.ttl);
        let expired = before - entries.len();
        if expired > 0 {
            tracing::debug!(expired, "evicted idle sessions");
        }

        if !entries.contains_key(&session_id) && entries.len() >= self.max_sessions {
            let oldest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_seen)
                .map(|(id, _)| *id);
            if let Some(id) = oldest {
                entries.remove(&id);
                tracing::debug!(session_id = %id, "session store full, evicted oldest");
            }
        }

        entries
            .insert(
                session_id,
                Entry {
                    answers,
                    last_seen: now,
                },
            )
            .is_some()
    }

    /// Live answers for the session. Reading keeps the session alive.
    pub async fn answers(&self, session_id: Uuid) -> Option<AnswerSet> {
        let now = Instant::now();
        let mut entries = self.entries.write().await;

        let last_seen = entries.get(&session_id)?.last_seen;
        if now.duration_since(last_seen) >= self.ttl {
            entries.remove(&session_id);
            return None;
        }

        let entry = entries.get_mut(&session_id)?;
        entry.last_seen = now;
        Some(entry.answers.clone())
    }

    #[cfg(test)]
    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::questionnaire::questions;

    fn answers() -> AnswerSet {
        AnswerSet::collect(questions().iter().map(|q| q.choices[0])).unwrap()
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = SessionStore::default();
        let a = SessionStore::new_session_id();
        let b = SessionStore::new_session_id();

        assert!(!store.put_answers(a, answers()).await);
        assert!(store.answers(a).await.is_some());
        assert!(store.answers(b).await.is_none());
    }

    #[tokio::test]
    async fn resubmitting_replaces_answers() {
        let store = SessionStore::default();
        let id = SessionStore::new_session_id();
        store.put_answers(id, answers()).await;

        let mut changed: Vec<&str> = questions().iter().map(|q| q.choices[0]).collect();
        changed[0] = "50+";
        let changed = AnswerSet::collect(changed).unwrap();

        assert!(store.put_answers(id, changed.clone()).await);
        assert_eq!(store.answers(id).await, Some(changed));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_expire_and_are_evicted_on_write() {
        let store = SessionStore::with_limits(Duration::from_secs(60), 100);
        let idle = SessionStore::new_session_id();
        let active = SessionStore::new_session_id();
        store.put_answers(idle, answers()).await;
        store.put_answers(active, answers()).await;

        tokio::time::advance(Duration::from_secs(40)).await;
        assert!(store.answers(active).await.is_some());

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(store.answers(idle).await.is_none());
        assert!(store.answers(active).await.is_some());

        tokio::time::advance(Duration::from_secs(61)).await;
        store.put_answers(SessionStore::new_session_id(), answers()).await;
        assert_eq!(store.len().await, 1);
        assert!(store.answers(active).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn full_store_drops_least_recently_seen() {
        let store = SessionStore::with_limits(Duration::from_secs(3600), 2);
        let first = SessionStore::new_session_id();
        let second = SessionStore::new_session_id();
        store.put_answers(first, answers()).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        store.put_answers(second, answers()).await;
        tokio::time::advance(Duration::from_secs(1)).await;

        // Touching `first` makes `second` the oldest.
        assert!(store.answers(first).await.is_some());
        tokio::time::advance(Duration::from_secs(1)).await;

        let third = SessionStore::new_session_id();
        store.put_answers(third, answers()).await;

        assert_eq!(store.len().await, 2);
        assert!(store.answers(second).await.is_none());
        assert!(store.answers(first).await.is_some());
        assert!(store.answers(third).await.is_some());

        // Replacing an existing session never evicts another.
        assert!(store.put_answers(first, answers()).await);
        assert_eq!(store.len().await, 2);
    }
}
